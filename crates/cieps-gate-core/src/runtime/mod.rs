// crates/cieps-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: CIEPS Gate Runtime
// Description: Certificate authority, policy evaluation, signing, and service.
// Purpose: Execute the issuance pipeline for one signing request at a time.
// Dependencies: crate::{core, interfaces}, rcgen, x509-parser
// ============================================================================

//! ## Overview
//! Runtime modules implement the issuance pipeline. Every transport calls into
//! the same [`DecisionService`] so outcomes do not depend on how a request
//! arrived.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod authority;
pub mod evaluator;
pub mod service;
pub mod synthesizer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use authority::AuthorityConfig;
pub use authority::AuthorityError;
pub use authority::CertificateAuthority;
pub use authority::CertificateAuthorityProvider;
pub use authority::KeyAlgorithm;
pub use authority::RootCertificate;
pub use evaluator::PolicyEvaluator;
pub use evaluator::PolicyRules;
pub use service::DecisionError;
pub use service::DecisionService;
pub use service::DecisionServiceConfig;
pub use synthesizer::SynthesisError;
pub use synthesizer::synthesize;
