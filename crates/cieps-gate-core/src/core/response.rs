// crates/cieps-gate-core/src/core/response.rs
// ============================================================================
// Module: Issuance Responses
// Description: The structured decision returned to the issuing engine.
// Purpose: Encode approved certificates or errors with echoed identifiers.
// Dependencies: pem, rustls-pki-types, serde, crate::core
// ============================================================================

//! ## Overview
//! An [`IssuanceResponse`] holds exactly one [`IssuanceOutcome`]: an issued
//! certificate or an error message. The wire form flattens that outcome into
//! optional `certificate` and `error` fields, and decoding refuses payloads
//! where both or neither are present.

// ============================================================================
// SECTION: Imports
// ============================================================================

use pem::EncodeConfig;
use pem::LineEnding;
use pem::Pem;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::IssuerRef;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// PEM label for X.509 certificates.
const CERTIFICATE_LABEL: &str = "CERTIFICATE";
/// PEM framing: LF line endings, 64-column body lines.
const PEM_CONFIG: EncodeConfig = EncodeConfig::new().set_line_ending(LineEnding::LF);

// ============================================================================
// SECTION: Issued Certificate
// ============================================================================

/// Signed certificate in both DER and PEM forms.
///
/// # Invariants
/// - `pem` is derived from `der` exactly once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// DER encoding.
    der: CertificateDer<'static>,
    /// PEM encoding of `der`.
    pem: String,
}

impl IssuedCertificate {
    /// Wraps DER bytes and derives the PEM encoding.
    #[must_use]
    pub fn from_der(der: CertificateDer<'static>) -> Self {
        let pem = pem::encode_config(&Pem::new(CERTIFICATE_LABEL, der.as_ref()), PEM_CONFIG);
        Self {
            der,
            pem,
        }
    }

    /// Decodes a PEM `CERTIFICATE` block.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Certificate`] when the PEM block is invalid.
    pub fn from_pem(pem: &str) -> Result<Self, ResponseError> {
        let der = CertificateDer::from_pem_slice(pem.as_bytes())
            .map_err(|err| ResponseError::Certificate(err.to_string()))?;
        Ok(Self::from_der(der))
    }

    /// Returns the DER encoding.
    #[must_use]
    pub const fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    /// Returns the PEM encoding.
    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Either an issued certificate or an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// The request was approved and signed.
    Issued(IssuedCertificate),
    /// The request was rejected or could not be processed.
    Failed {
        /// Message reported to the caller.
        error: String,
    },
}

/// Decision returned to the issuing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ResponseWire", into = "ResponseWire")]
pub struct IssuanceResponse {
    /// Certificate or error.
    pub outcome: IssuanceOutcome,
    /// Advisory warnings, in order.
    pub warnings: Vec<String>,
    /// Echoed issuer reference.
    pub issuer_ref: IssuerRef,
    /// Echoed correlation identifier.
    pub correlation_id: CorrelationId,
    /// Whether the engine should persist the certificate.
    pub store_certificate: bool,
}

impl IssuanceResponse {
    /// Builds an approved response.
    #[must_use]
    pub const fn issued(
        certificate: IssuedCertificate,
        issuer_ref: IssuerRef,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            outcome: IssuanceOutcome::Issued(certificate),
            warnings: Vec::new(),
            issuer_ref,
            correlation_id,
            store_certificate: false,
        }
    }

    /// Builds a failed response.
    #[must_use]
    pub fn failed(
        error: impl Into<String>,
        issuer_ref: IssuerRef,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            outcome: IssuanceOutcome::Failed {
                error: error.into(),
            },
            warnings: Vec::new(),
            issuer_ref,
            correlation_id,
            store_certificate: false,
        }
    }

    /// Returns the issued certificate, if any.
    #[must_use]
    pub const fn certificate(&self) -> Option<&IssuedCertificate> {
        match &self.outcome {
            IssuanceOutcome::Issued(certificate) => Some(certificate),
            IssuanceOutcome::Failed {
                ..
            } => None,
        }
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            IssuanceOutcome::Issued(_) => None,
            IssuanceOutcome::Failed {
                error,
            } => Some(error),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Response decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    /// The certificate PEM was invalid.
    #[error("invalid certificate pem: {0}")]
    Certificate(String),
    /// Both a certificate and an error were present.
    #[error("response carries both a certificate and an error")]
    Ambiguous,
    /// Neither a certificate nor an error was present.
    #[error("response carries neither a certificate nor an error")]
    Empty,
}

// ============================================================================
// SECTION: Wire Form
// ============================================================================

/// Serialized response layout.
#[derive(Debug, Serialize, Deserialize)]
struct ResponseWire {
    /// Echoed request UUID.
    request_uuid: CorrelationId,
    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Advisory warnings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    /// PEM certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    certificate: Option<String>,
    /// Echoed issuer reference.
    issuer_ref: IssuerRef,
    /// Persistence hint.
    #[serde(default)]
    store_certificate: bool,
    /// Lease hint; the gate never asks for leases.
    #[serde(default)]
    generate_lease: bool,
}

impl From<IssuanceResponse> for ResponseWire {
    fn from(response: IssuanceResponse) -> Self {
        let (certificate, error) = match response.outcome {
            IssuanceOutcome::Issued(certificate) => (Some(certificate.pem), None),
            IssuanceOutcome::Failed {
                error,
            } => (None, Some(error)),
        };
        Self {
            request_uuid: response.correlation_id,
            error,
            warnings: response.warnings,
            certificate,
            issuer_ref: response.issuer_ref,
            store_certificate: response.store_certificate,
            generate_lease: false,
        }
    }
}

impl TryFrom<ResponseWire> for IssuanceResponse {
    type Error = ResponseError;

    fn try_from(wire: ResponseWire) -> Result<Self, Self::Error> {
        let outcome = match (wire.certificate, wire.error) {
            (Some(_), Some(_)) => return Err(ResponseError::Ambiguous),
            (None, None) => return Err(ResponseError::Empty),
            (Some(pem), None) => IssuanceOutcome::Issued(IssuedCertificate::from_pem(&pem)?),
            (None, Some(error)) => IssuanceOutcome::Failed {
                error,
            },
        };
        Ok(Self {
            outcome,
            warnings: wire.warnings,
            issuer_ref: wire.issuer_ref,
            correlation_id: wire.request_uuid,
            store_certificate: wire.store_certificate,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
