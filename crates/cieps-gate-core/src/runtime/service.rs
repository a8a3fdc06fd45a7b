// crates/cieps-gate-core/src/runtime/service.rs
// ============================================================================
// Module: Decision Service
// Description: Orchestrates evaluation, signing, and response assembly.
// Purpose: Produce one issuance response per signing request.
// Dependencies: time, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`DecisionService`] is the single entry point used by every transport.
//! Policy rejections and synthesis failures are ordinary responses; only an
//! unavailable certificate authority is surfaced as an error. Every outcome is
//! reported to the configured audit sink.
//!
//! Security posture: error messages returned to callers are fixed strings and
//! never carry key material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::decision::CertificateTemplate;
use crate::core::decision::PolicyDecision;
use crate::core::request::SigningRequest;
use crate::core::response::IssuanceResponse;
use crate::core::response::IssuedCertificate;
use crate::interfaces::IssuanceAuditEvent;
use crate::interfaces::IssuanceAuditEventParams;
use crate::interfaces::IssuanceAuditSink;
use crate::interfaces::IssuanceOutcomeLabel;
use crate::interfaces::NoopIssuanceAuditSink;
use crate::interfaces::SubjectSummary;
use crate::runtime::authority::AuthorityError;
use crate::runtime::authority::CertificateAuthorityProvider;
use crate::runtime::evaluator::PolicyEvaluator;
use crate::runtime::synthesizer::synthesize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message returned when an approved template cannot be signed.
pub const SYNTHESIS_FAILED_MESSAGE: &str = "internal error: failed to synthesize certificate";
/// Warning attached to every issued certificate.
pub const DEMO_CA_WARNING: &str =
    "certificate was signed by an ephemeral demonstration CA and must not be trusted in production";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Response and audit options for the decision service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionServiceConfig {
    /// Persistence hint returned with issued certificates.
    pub store_certificate: bool,
    /// Extra warnings appended after the standard demo warning.
    pub warnings: Vec<String>,
    /// Include subject details in audit events.
    pub log_subject: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal decision errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    /// The certificate authority could not be obtained.
    #[error("certificate authority unavailable: {0}")]
    AuthorityUnavailable(#[from] AuthorityError),
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Policy decision pipeline shared by all request handlers.
pub struct DecisionService {
    /// Shared authority provider.
    authority: Arc<CertificateAuthorityProvider>,
    /// Policy evaluator.
    evaluator: PolicyEvaluator,
    /// Audit sink.
    audit: Arc<dyn IssuanceAuditSink>,
    /// Response and audit options.
    config: DecisionServiceConfig,
}

impl DecisionService {
    /// Creates a service with a no-op audit sink.
    #[must_use]
    pub fn new(
        authority: Arc<CertificateAuthorityProvider>,
        evaluator: PolicyEvaluator,
        config: DecisionServiceConfig,
    ) -> Self {
        Self {
            authority,
            evaluator,
            audit: Arc::new(NoopIssuanceAuditSink),
            config,
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn IssuanceAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the shared authority provider.
    #[must_use]
    pub const fn authority(&self) -> &Arc<CertificateAuthorityProvider> {
        &self.authority
    }

    /// Handles one request using the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] when the certificate authority is unavailable.
    pub fn handle_request(
        &self,
        request: &SigningRequest,
    ) -> Result<IssuanceResponse, DecisionError> {
        self.handle_request_at(request, OffsetDateTime::now_utc())
    }

    /// Handles one request as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] when the certificate authority is unavailable.
    pub fn handle_request_at(
        &self,
        request: &SigningRequest,
        now: OffsetDateTime,
    ) -> Result<IssuanceResponse, DecisionError> {
        let template = match self.evaluator.evaluate(request, now) {
            PolicyDecision::Approved {
                template,
            } => template,
            PolicyDecision::Rejected {
                reason,
            } => {
                let message = reason.to_string();
                self.record(request, IssuanceOutcomeLabel::Rejected, Some(message.clone()), None);
                return Ok(IssuanceResponse::failed(
                    message,
                    request.issuer_ref.clone(),
                    request.correlation_id.clone(),
                ));
            }
        };

        let authority = match self.authority.get_or_create_root() {
            Ok(authority) => authority,
            Err(err) => {
                let error = DecisionError::from(err);
                self.record(request, IssuanceOutcomeLabel::Error, Some(error.to_string()), None);
                return Err(error);
            }
        };

        match synthesize(&template, &authority) {
            Ok(der) => {
                self.record(request, IssuanceOutcomeLabel::Approved, None, Some(&template));
                let mut response = IssuanceResponse::issued(
                    IssuedCertificate::from_der(der),
                    request.issuer_ref.clone(),
                    request.correlation_id.clone(),
                );
                response.store_certificate = self.config.store_certificate;
                response.warnings.push(DEMO_CA_WARNING.to_string());
                response.warnings.extend(self.config.warnings.iter().cloned());
                Ok(response)
            }
            Err(err) => {
                self.record(
                    request,
                    IssuanceOutcomeLabel::Error,
                    Some(format!("{SYNTHESIS_FAILED_MESSAGE}: {err}")),
                    None,
                );
                Ok(IssuanceResponse::failed(
                    SYNTHESIS_FAILED_MESSAGE,
                    request.issuer_ref.clone(),
                    request.correlation_id.clone(),
                ))
            }
        }
    }

    /// Emits one issuance audit event.
    fn record(
        &self,
        request: &SigningRequest,
        outcome: IssuanceOutcomeLabel,
        reason: Option<String>,
        template: Option<&CertificateTemplate>,
    ) {
        let subject = self
            .config
            .log_subject
            .then(|| SubjectSummary::from_csr(&request.parsed_csr, request.common_name()));
        let event = IssuanceAuditEvent::new(IssuanceAuditEventParams {
            request_uuid: request.correlation_id.clone(),
            issuer_ref: request.issuer_ref.clone(),
            outcome,
            reason,
            subject,
            signature_algorithm: request.parsed_csr.signature_algorithm().to_string(),
            serial: template.map(|template| template.serial.to_hex()),
            not_before: template.map(|template| template.validity.not_before.unix_timestamp()),
            not_after: template.map(|template| template.validity.not_after.unix_timestamp()),
        });
        self.audit.record_issuance(&event);
    }
}
