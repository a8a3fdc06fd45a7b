// crates/cieps-gate-core/tests/policy.rs
// ============================================================================
// Module: Policy Evaluator Tests
// Description: Ordered issuance rules and template resolution.
// Purpose: Ensure rejections are exact and approvals carry the expected template.
// Dependencies: cieps-gate-core, rcgen, serde_json, time
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test-only panic-based assertions are permitted."
)]

mod support;

use cieps_gate_core::COMMON_NAME_FIELD;
use cieps_gate_core::CertificateTemplate;
use cieps_gate_core::ExtendedKeyUsage;
use cieps_gate_core::ExtensionValue;
use cieps_gate_core::KeyUsage;
use cieps_gate_core::PolicyDecision;
use cieps_gate_core::PolicyEvaluator;
use cieps_gate_core::PolicyRules;
use cieps_gate_core::RejectionReason;
use cieps_gate_core::SubjectAltName;
use serde_json::json;
use time::Duration;
use time::OffsetDateTime;

fn approved(decision: PolicyDecision) -> CertificateTemplate {
    match decision {
        PolicyDecision::Approved {
            template,
        } => *template,
        PolicyDecision::Rejected {
            reason,
        } => panic!("unexpected rejection: {reason}"),
    }
}

fn rejected(decision: PolicyDecision) -> RejectionReason {
    match decision {
        PolicyDecision::Rejected {
            reason,
        } => reason,
        PolicyDecision::Approved {
            ..
        } => panic!("unexpected approval"),
    }
}

#[test]
fn missing_common_name_is_rejected() {
    let evaluator = PolicyEvaluator::default();
    let request = support::request(support::csr("svc.example.com"), None);
    let reason = rejected(evaluator.evaluate(&request, OffsetDateTime::now_utc()));
    assert_eq!(reason, RejectionReason::MissingCommonName);
    assert_eq!(reason.to_string(), "request rejected: Common Name is required");
}

#[test]
fn empty_common_name_matches_missing() {
    let evaluator = PolicyEvaluator::default();
    let request = support::request(support::csr("svc.example.com"), Some(""));
    let reason = rejected(evaluator.evaluate(&request, OffsetDateTime::now_utc()));
    assert_eq!(reason, RejectionReason::MissingCommonName);
}

#[test]
fn non_string_common_name_matches_missing() {
    let evaluator = PolicyEvaluator::default();
    let request = support::request(support::csr("svc.example.com"), None)
        .with_field(COMMON_NAME_FIELD, json!(42));
    let reason = rejected(evaluator.evaluate(&request, OffsetDateTime::now_utc()));
    assert_eq!(reason, RejectionReason::MissingCommonName);
}

#[test]
fn denied_suffix_names_the_domain() {
    let evaluator = PolicyEvaluator::default();
    let request =
        support::request(support::csr("x"), Some("bad.unauthorized.example"));
    let reason = rejected(evaluator.evaluate(&request, OffsetDateTime::now_utc()));
    assert_eq!(reason.to_string(), "domain \"bad.unauthorized.example\" is not authorized");
}

#[test]
fn denied_suffix_ignores_ascii_case() {
    let evaluator = PolicyEvaluator::default();
    let request = support::request(support::csr("x"), Some("Api.UNAUTHORIZED.Example"));
    let reason = rejected(evaluator.evaluate(&request, OffsetDateTime::now_utc()));
    assert_eq!(
        reason,
        RejectionReason::DeniedDomain {
            domain: "Api.UNAUTHORIZED.Example".to_string(),
        }
    );
}

#[test]
fn missing_common_name_wins_over_denied_subject() {
    let evaluator = PolicyEvaluator::default();
    let request = support::request(support::csr("bad.unauthorized.example"), None);
    let reason = rejected(evaluator.evaluate(&request, OffsetDateTime::now_utc()));
    assert_eq!(reason, RejectionReason::MissingCommonName);
}

#[test]
fn configured_suffixes_replace_default() {
    let evaluator = PolicyEvaluator::new(PolicyRules {
        denied_domain_suffixes: vec![".internal".to_string()],
    });
    let now = OffsetDateTime::now_utc();
    let denied = support::request(support::csr("x"), Some("db.internal"));
    assert!(!evaluator.evaluate(&denied, now).is_approved());
    let allowed = support::request(support::csr("x"), Some("bad.unauthorized.example"));
    assert!(evaluator.evaluate(&allowed, now).is_approved());
}

#[test]
fn approval_resolves_template() {
    let evaluator = PolicyEvaluator::default();
    let csr = support::csr("svc.example.com");
    let request = support::request(csr.clone(), Some("svc.example.com"));
    let now = OffsetDateTime::now_utc();
    let template = approved(evaluator.evaluate(&request, now));

    assert_eq!(template.public_key, *csr.public_key());
    assert_eq!(template.raw_subject, csr.raw_subject());
    assert_eq!(template.subject, csr.subject());
    assert_eq!(
        template.subject_alt_names,
        vec![SubjectAltName::Dns("svc.example.com".to_string())]
    );
    assert_eq!(
        template.key_usages,
        vec![
            KeyUsage::DigitalSignature,
            KeyUsage::KeyEncipherment,
            KeyUsage::DataEncipherment,
            KeyUsage::KeyAgreement,
        ]
    );
    assert_eq!(
        template.extended_key_usages,
        vec![ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth]
    );
    assert_eq!(template.validity.not_before, now - Duration::seconds(30));
    assert_eq!(template.validity.not_after, now + Duration::days(10));
    assert!(!template.is_ca);
    assert_eq!(template.subject_key_identifier.len(), 20);
    assert_eq!(template.custom_extensions.len(), 1);
    let extension = &template.custom_extensions[0];
    assert_eq!(extension.oid, vec![2, 16, 840, 1, 113_730, 1, 13]);
    assert!(!extension.critical);
    assert_eq!(
        extension.value,
        ExtensionValue::PrintableString("CIEPS Demo Server Certificate".to_string())
    );
}

#[test]
fn csr_names_are_kept_over_common_name() {
    let evaluator = PolicyEvaluator::default();
    let csr = support::csr_with(
        &rcgen::PKCS_ECDSA_P256_SHA256,
        "svc.example.com",
        &["a.example.com", "10.0.0.1"],
    );
    let request = support::request(csr, Some("svc.example.com"));
    let template = approved(evaluator.evaluate(&request, OffsetDateTime::now_utc()));
    assert_eq!(
        template.subject_alt_names,
        vec![
            SubjectAltName::Dns("a.example.com".to_string()),
            SubjectAltName::Ip("10.0.0.1".parse().unwrap()),
        ]
    );
}

#[test]
fn key_identifier_is_deterministic_and_serial_is_not() {
    let evaluator = PolicyEvaluator::default();
    let request = support::request(support::csr("svc.example.com"), Some("svc.example.com"));
    let now = OffsetDateTime::now_utc();
    let first = approved(evaluator.evaluate(&request, now));
    let second = approved(evaluator.evaluate(&request, now));
    assert_eq!(first.subject_key_identifier, second.subject_key_identifier);
    assert_ne!(first.serial, second.serial);
    assert_eq!(first.serial.as_bytes()[0] & 0x80, 0);
}
