// crates/cieps-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: CIEPS Gate Interfaces
// Description: Audit surfaces consumed by the decision service.
// Purpose: Keep observability pluggable without embedding a logging backend.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! The decision service reports every outcome through an [`IssuanceAuditSink`].
//! Events are redacted by construction: subject details only appear when the
//! caller opts in, and public key material never appears at all.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::csr::ParsedCsr;
use crate::core::csr::SubjectAltName;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::IssuerRef;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label recorded for one issuance decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceOutcomeLabel {
    /// Certificate issued.
    Approved,
    /// Policy rejected the request.
    Rejected,
    /// Policy approved but processing failed.
    Error,
}

/// Subject details copied from a CSR for audit logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    /// Requested common name (user field).
    pub common_name: Option<String>,
    /// CSR subject organization.
    pub organization: Option<String>,
    /// CSR subject country.
    pub country: Option<String>,
    /// CSR DNS names.
    pub dns_names: Vec<String>,
    /// CSR e-mail addresses.
    pub email_addresses: Vec<String>,
    /// CSR IP addresses.
    pub ip_addresses: Vec<IpAddr>,
    /// CSR URIs.
    pub uris: Vec<String>,
}

impl SubjectSummary {
    /// Summarizes the subject of a CSR.
    #[must_use]
    pub fn from_csr(csr: &ParsedCsr, common_name: Option<&str>) -> Self {
        let mut summary = Self {
            common_name: common_name.map(ToString::to_string),
            organization: csr.organization().map(ToString::to_string),
            country: csr.country().map(ToString::to_string),
            ..Self::default()
        };
        for name in csr.subject_alt_names() {
            match name {
                SubjectAltName::Dns(value) => summary.dns_names.push(value.clone()),
                SubjectAltName::Email(value) => summary.email_addresses.push(value.clone()),
                SubjectAltName::Ip(value) => summary.ip_addresses.push(*value),
                SubjectAltName::Uri(value) => summary.uris.push(value.clone()),
            }
        }
        summary
    }
}

/// Audit payload for one issuance decision.
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Echoed request UUID.
    pub request_uuid: CorrelationId,
    /// Echoed issuer reference.
    pub issuer_ref: IssuerRef,
    /// Decision outcome.
    pub outcome: IssuanceOutcomeLabel,
    /// Rejection or error message.
    pub reason: Option<String>,
    /// Subject details (explicit opt-in only).
    pub subject: Option<SubjectSummary>,
    /// Dotted OID of the CSR signature algorithm.
    pub signature_algorithm: String,
    /// Issued serial number (hex).
    pub serial: Option<String>,
    /// Issued `not_before` (unix seconds).
    pub not_before: Option<i64>,
    /// Issued `not_after` (unix seconds).
    pub not_after: Option<i64>,
}

/// Inputs required to construct an issuance audit event.
pub struct IssuanceAuditEventParams {
    /// Echoed request UUID.
    pub request_uuid: CorrelationId,
    /// Echoed issuer reference.
    pub issuer_ref: IssuerRef,
    /// Decision outcome.
    pub outcome: IssuanceOutcomeLabel,
    /// Rejection or error message.
    pub reason: Option<String>,
    /// Subject details (explicit opt-in only).
    pub subject: Option<SubjectSummary>,
    /// Dotted OID of the CSR signature algorithm.
    pub signature_algorithm: String,
    /// Issued serial number (hex).
    pub serial: Option<String>,
    /// Issued `not_before` (unix seconds).
    pub not_before: Option<i64>,
    /// Issued `not_after` (unix seconds).
    pub not_after: Option<i64>,
}

impl IssuanceAuditEvent {
    /// Creates a new issuance audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: IssuanceAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "issuance_decision",
            timestamp_ms,
            request_uuid: params.request_uuid,
            issuer_ref: params.issuer_ref,
            outcome: params.outcome,
            reason: params.reason,
            subject: params.subject,
            signature_algorithm: params.signature_algorithm,
            serial: params.serial,
            not_before: params.not_before,
            not_after: params.not_after,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for issuance decisions.
pub trait IssuanceAuditSink: Send + Sync {
    /// Record an issuance decision.
    fn record_issuance(&self, event: &IssuanceAuditEvent);
}

/// No-op issuance audit sink.
pub struct NoopIssuanceAuditSink;

impl IssuanceAuditSink for NoopIssuanceAuditSink {
    fn record_issuance(&self, _event: &IssuanceAuditEvent) {}
}
