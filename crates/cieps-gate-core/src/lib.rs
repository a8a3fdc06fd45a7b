// crates/cieps-gate-core/src/lib.rs
// ============================================================================
// Module: CIEPS Gate Core Library
// Description: Public API surface for the CIEPS Gate core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! CIEPS Gate core decides whether a certificate signing request may be issued
//! and, when it may, signs a leaf certificate under a local demonstration CA.
//! It is transport-agnostic: the server crate decodes wire requests into
//! [`SigningRequest`] values and encodes the resulting [`IssuanceResponse`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::IssuanceAuditEvent;
pub use interfaces::IssuanceAuditEventParams;
pub use interfaces::IssuanceAuditSink;
pub use interfaces::IssuanceOutcomeLabel;
pub use interfaces::NoopIssuanceAuditSink;
pub use interfaces::SubjectSummary;
pub use runtime::AuthorityConfig;
pub use runtime::AuthorityError;
pub use runtime::CertificateAuthority;
pub use runtime::CertificateAuthorityProvider;
pub use runtime::DecisionError;
pub use runtime::DecisionService;
pub use runtime::DecisionServiceConfig;
pub use runtime::KeyAlgorithm;
pub use runtime::PolicyEvaluator;
pub use runtime::PolicyRules;
pub use runtime::RootCertificate;
pub use runtime::SynthesisError;
pub use runtime::synthesize;
