// crates/cieps-gate-core/src/core/mod.rs
// ============================================================================
// Module: CIEPS Gate Core Types
// Description: Request, decision, and response data model.
// Purpose: Provide the shared types passed between pipeline stages.
// Dependencies: serde, x509-parser, rustls-pki-types
// ============================================================================

//! ## Overview
//! Core types describe one issuance round trip: the parsed CSR and caller
//! metadata going in, the policy decision in the middle, and the issuance
//! response coming out. They carry no behavior beyond validation on decode.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod csr;
pub mod decision;
pub mod identifiers;
pub mod request;
pub mod response;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use csr::CsrError;
pub use csr::CsrPublicKey;
pub use csr::ParsedCsr;
pub use csr::PublicKeyAlgorithm;
pub use csr::SubjectAltName;
pub use csr::SubjectAttribute;
pub use decision::CertificateTemplate;
pub use decision::CustomExtension;
pub use decision::ExtendedKeyUsage;
pub use decision::ExtensionValue;
pub use decision::KeyUsage;
pub use decision::PolicyDecision;
pub use decision::RejectionReason;
pub use decision::SerialNumber;
pub use decision::ValidityWindow;
pub use identifiers::CorrelationId;
pub use identifiers::IssuerRef;
pub use request::COMMON_NAME_FIELD;
pub use request::SigningRequest;
pub use response::IssuanceOutcome;
pub use response::IssuanceResponse;
pub use response::IssuedCertificate;
pub use response::ResponseError;
