// crates/cieps-gate-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Policy Evaluator
// Description: Fixed issuance rules applied to one signing request.
// Purpose: Decide approve/reject and resolve the certificate template.
// Dependencies: time, crate::core, crate::runtime::authority
// ============================================================================

//! ## Overview
//! [`PolicyEvaluator::evaluate`] is a pure function of the request, the
//! configured rules, and the supplied clock reading. It never signs and never
//! logs. Checks run in order and stop at the first rejection:
//! 1. A non-empty `common_name` user field is required.
//! 2. The common name must not end with a denied domain suffix.
//!
//! Approval yields a [`CertificateTemplate`] whose serial is the only
//! non-deterministic field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::Duration;
use time::OffsetDateTime;

use crate::core::csr::SubjectAltName;
use crate::core::decision::CertificateTemplate;
use crate::core::decision::CustomExtension;
use crate::core::decision::ExtendedKeyUsage;
use crate::core::decision::ExtensionValue;
use crate::core::decision::KeyUsage;
use crate::core::decision::PolicyDecision;
use crate::core::decision::RejectionReason;
use crate::core::decision::SerialNumber;
use crate::core::decision::ValidityWindow;
use crate::core::request::SigningRequest;
use crate::runtime::authority::key_identifier;
use crate::runtime::authority::random_serial;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default denied domain suffix.
pub const DEFAULT_DENIED_DOMAIN_SUFFIX: &str = ".unauthorized.example";
/// Clock skew allowance subtracted from `not_before`.
pub const CLOCK_SKEW_ALLOWANCE: Duration = Duration::seconds(30);
/// Leaf certificate lifetime measured from evaluation time.
pub const LEAF_LIFETIME: Duration = Duration::days(10);
/// OID of the informational comment extension.
pub const COMMENT_EXTENSION_OID: &[u64] = &[2, 16, 840, 1, 113_730, 1, 13];
/// Text carried by the informational comment extension.
pub const COMMENT_EXTENSION_TEXT: &str = "CIEPS Demo Server Certificate";

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Configurable inputs to the fixed rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRules {
    /// Domain suffixes that are never issued (ASCII case-insensitive).
    pub denied_domain_suffixes: Vec<String>,
}

impl Default for PolicyRules {
    fn default() -> Self {
        Self {
            denied_domain_suffixes: vec![DEFAULT_DENIED_DOMAIN_SUFFIX.to_string()],
        }
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Applies [`PolicyRules`] to signing requests.
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    /// Active rules.
    rules: PolicyRules,
}

impl PolicyEvaluator {
    /// Creates an evaluator for the given rules.
    #[must_use]
    pub const fn new(rules: PolicyRules) -> Self {
        Self {
            rules,
        }
    }

    /// Returns the active rules.
    #[must_use]
    pub const fn rules(&self) -> &PolicyRules {
        &self.rules
    }

    /// Evaluates one request as of `now`.
    #[must_use]
    pub fn evaluate(&self, request: &SigningRequest, now: OffsetDateTime) -> PolicyDecision {
        let Some(common_name) = request.common_name() else {
            return PolicyDecision::Rejected {
                reason: RejectionReason::MissingCommonName,
            };
        };
        if self.is_denied(common_name) {
            return PolicyDecision::Rejected {
                reason: RejectionReason::DeniedDomain {
                    domain: common_name.to_string(),
                },
            };
        }
        PolicyDecision::Approved {
            template: Box::new(build_template(request, common_name, now)),
        }
    }

    /// Returns true when `domain` ends with any denied suffix.
    fn is_denied(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        self.rules
            .denied_domain_suffixes
            .iter()
            .any(|suffix| domain.ends_with(&suffix.to_ascii_lowercase()))
    }
}

// ============================================================================
// SECTION: Template
// ============================================================================

/// Resolves the leaf template for an approved request.
fn build_template(
    request: &SigningRequest,
    common_name: &str,
    now: OffsetDateTime,
) -> CertificateTemplate {
    let csr = &request.parsed_csr;
    let subject_alt_names = if csr.subject_alt_names().is_empty() {
        vec![SubjectAltName::Dns(common_name.to_string())]
    } else {
        csr.subject_alt_names().to_vec()
    };
    CertificateTemplate {
        public_key: csr.public_key().clone(),
        raw_subject: csr.raw_subject().to_vec(),
        subject: csr.subject().to_vec(),
        subject_alt_names,
        subject_key_identifier: key_identifier(&csr.public_key().subject_public_key),
        key_usages: vec![
            KeyUsage::DigitalSignature,
            KeyUsage::KeyEncipherment,
            KeyUsage::DataEncipherment,
            KeyUsage::KeyAgreement,
        ],
        extended_key_usages: vec![ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth],
        validity: ValidityWindow {
            not_before: now - CLOCK_SKEW_ALLOWANCE,
            not_after: now + LEAF_LIFETIME,
        },
        custom_extensions: vec![CustomExtension {
            oid: COMMENT_EXTENSION_OID.to_vec(),
            critical: false,
            value: ExtensionValue::PrintableString(COMMENT_EXTENSION_TEXT.to_string()),
        }],
        is_ca: false,
        serial: SerialNumber::from_bytes(random_serial()),
    }
}
