// crates/cieps-gate-core/src/core/decision.rs
// ============================================================================
// Module: Policy Decisions
// Description: Approve/reject outcomes and the certificate template.
// Purpose: Carry the evaluator's verdict to the decision service.
// Dependencies: serde, time, crate::core
// ============================================================================

//! ## Overview
//! A [`PolicyDecision`] is either an approval carrying a fully resolved
//! [`CertificateTemplate`] or a rejection carrying a [`RejectionReason`].
//! Templates are plain data; turning one into a signed certificate is the
//! synthesizer's job.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

use crate::core::csr::CsrPublicKey;
use crate::core::csr::SubjectAltName;
use crate::core::csr::SubjectAttribute;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome of evaluating one signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The request satisfies policy; sign this template.
    Approved {
        /// Template to sign.
        template: Box<CertificateTemplate>,
    },
    /// The request violates policy.
    Rejected {
        /// Reason reported to the caller.
        reason: RejectionReason,
    },
}

impl PolicyDecision {
    /// Returns true when the decision is an approval.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

/// Reason a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// No non-empty common name was supplied.
    MissingCommonName,
    /// The common name falls under a denied domain suffix.
    DeniedDomain {
        /// Requested domain.
        domain: String,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCommonName => f.write_str("request rejected: Common Name is required"),
            Self::DeniedDomain {
                domain,
            } => write!(f, "domain \"{domain}\" is not authorized"),
        }
    }
}

// ============================================================================
// SECTION: Template
// ============================================================================

/// X.509 key usage bits requested for a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyUsage {
    /// digitalSignature.
    DigitalSignature,
    /// keyEncipherment.
    KeyEncipherment,
    /// dataEncipherment.
    DataEncipherment,
    /// keyAgreement.
    KeyAgreement,
}

/// Extended key usage purposes requested for a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendedKeyUsage {
    /// TLS server authentication.
    ServerAuth,
    /// TLS client authentication.
    ClientAuth,
}

/// Inclusive validity window of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    /// First instant the certificate is valid.
    pub not_before: OffsetDateTime,
    /// Last instant the certificate is valid.
    pub not_after: OffsetDateTime,
}

/// Non-standard extension appended to the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomExtension {
    /// Extension OID arcs.
    pub oid: Vec<u64>,
    /// Criticality flag.
    pub critical: bool,
    /// Extension value, before DER encoding.
    pub value: ExtensionValue,
}

/// Value carried by a custom extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    /// Text encoded as a DER `PrintableString` at synthesis time.
    PrintableString(String),
    /// Pre-encoded DER bytes.
    Der(Vec<u8>),
}

/// 128-bit certificate serial number.
///
/// # Invariants
/// - The most significant bit is clear so the DER integer is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialNumber([u8; 16]);

impl SerialNumber {
    /// Creates a serial from raw bytes, clearing the sign bit.
    #[must_use]
    pub const fn from_bytes(mut bytes: [u8; 16]) -> Self {
        bytes[0] &= 0x7f;
        Self(bytes)
    }

    /// Returns the serial bytes, big-endian.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the serial as colon-free lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Everything needed to sign one leaf certificate.
///
/// # Invariants
/// - `public_key` and `raw_subject` are copied verbatim from the CSR.
/// - `is_ca` is false for every template the evaluator produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    /// Subject public key from the CSR.
    pub public_key: CsrPublicKey,
    /// Raw DER subject from the CSR.
    pub raw_subject: Vec<u8>,
    /// Parsed subject attributes from the CSR.
    pub subject: Vec<SubjectAttribute>,
    /// Subject alternative names to embed.
    pub subject_alt_names: Vec<SubjectAltName>,
    /// Subject key identifier bytes.
    pub subject_key_identifier: Vec<u8>,
    /// Key usage bits.
    pub key_usages: Vec<KeyUsage>,
    /// Extended key usage purposes.
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
    /// Validity window.
    pub validity: ValidityWindow,
    /// Additional non-standard extensions.
    pub custom_extensions: Vec<CustomExtension>,
    /// Basic constraints CA flag.
    pub is_ca: bool,
    /// Serial number.
    pub serial: SerialNumber,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
