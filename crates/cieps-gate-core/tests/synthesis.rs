// crates/cieps-gate-core/tests/synthesis.rs
// ============================================================================
// Module: Certificate Synthesis Tests
// Description: Signed leaves inspected with an independent X.509 parser.
// Purpose: Ensure approved templates become valid, correctly shaped leaves.
// Dependencies: cieps-gate-core, rcgen, time, x509-parser
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test-only panic-based assertions are permitted."
)]

mod support;

use cieps_gate_core::AuthorityConfig;
use cieps_gate_core::CertificateAuthority;
use cieps_gate_core::CertificateTemplate;
use cieps_gate_core::KeyAlgorithm;
use cieps_gate_core::ParsedCsr;
use cieps_gate_core::PolicyDecision;
use cieps_gate_core::PolicyEvaluator;
use cieps_gate_core::PublicKeyAlgorithm;
use cieps_gate_core::SynthesisError;
use cieps_gate_core::synthesize;
use time::OffsetDateTime;
use x509_parser::prelude::FromDer;
use x509_parser::prelude::GeneralName;
use x509_parser::prelude::ParsedExtension;
use x509_parser::prelude::X509Certificate;

fn template_for(csr: ParsedCsr, common_name: &str, now: OffsetDateTime) -> CertificateTemplate {
    let request = support::request(csr, Some(common_name));
    match PolicyEvaluator::default().evaluate(&request, now) {
        PolicyDecision::Approved {
            template,
        } => *template,
        PolicyDecision::Rejected {
            reason,
        } => panic!("unexpected rejection: {reason}"),
    }
}

fn authority() -> CertificateAuthority {
    CertificateAuthority::generate(&AuthorityConfig::default(), OffsetDateTime::now_utc()).unwrap()
}

#[test]
fn leaf_matches_template_and_authority() {
    let authority = authority();
    let csr = support::csr("svc.example.com");
    let now = OffsetDateTime::now_utc();
    let template = template_for(csr.clone(), "svc.example.com", now);
    let der = synthesize(&template, &authority).unwrap();

    let (_, leaf) = X509Certificate::from_der(der.as_ref()).unwrap();
    let (_, root) = X509Certificate::from_der(authority.root().der.as_ref()).unwrap();

    assert_eq!(leaf.issuer().as_raw(), authority.root().raw_subject.as_slice());
    assert_eq!(leaf.subject().as_raw(), csr.raw_subject());
    assert_eq!(leaf.public_key().raw, csr.public_key().subject_public_key_info.as_slice());
    assert!(leaf.validity().not_before.timestamp() <= now.unix_timestamp());
    let lifetime = leaf.validity().not_after.timestamp() - leaf.validity().not_before.timestamp();
    assert_eq!(lifetime, 10 * 86_400 + 30);
    assert!(!leaf.is_ca());
    assert!(leaf.basic_constraints().unwrap().is_none());
    assert_eq!(leaf.raw_serial(), template.serial.as_bytes().as_slice());
    leaf.verify_signature(Some(root.public_key())).unwrap();
}

#[test]
fn leaf_carries_identifiers_and_comment() {
    let authority = authority();
    let template =
        template_for(support::csr("svc.example.com"), "svc.example.com", OffsetDateTime::now_utc());
    let der = synthesize(&template, &authority).unwrap();
    let (_, leaf) = X509Certificate::from_der(der.as_ref()).unwrap();

    let mut subject_key_identifier = None;
    let mut authority_key_identifier = None;
    let mut dns_names = Vec::new();
    for extension in leaf.extensions() {
        match extension.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(id) => {
                subject_key_identifier = Some(id.0.to_vec());
            }
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                authority_key_identifier = aki.key_identifier.as_ref().map(|id| id.0.to_vec());
            }
            ParsedExtension::SubjectAlternativeName(san) => {
                for name in &san.general_names {
                    if let GeneralName::DNSName(dns) = name {
                        dns_names.push((*dns).to_string());
                    }
                }
            }
            _ => {}
        }
    }
    assert_eq!(subject_key_identifier, Some(template.subject_key_identifier.clone()));
    assert_eq!(authority_key_identifier, Some(authority.root().subject_key_identifier.clone()));
    assert_eq!(dns_names, vec!["svc.example.com".to_string()]);

    let comment = leaf
        .extensions()
        .iter()
        .find(|extension| extension.oid.to_id_string() == "2.16.840.1.113730.1.13")
        .expect("comment extension");
    assert!(!comment.critical);
    let mut expected = vec![0x13, 29];
    expected.extend_from_slice(b"CIEPS Demo Server Certificate");
    assert_eq!(comment.value, expected.as_slice());
}

#[test]
fn leaf_accepts_other_requester_key_types() {
    let authority = authority();
    for (alg, expected) in [
        (&rcgen::PKCS_ECDSA_P384_SHA384, PublicKeyAlgorithm::EcdsaP384),
        (&rcgen::PKCS_ED25519, PublicKeyAlgorithm::Ed25519),
    ] {
        let csr = support::csr_with(alg, "svc.example.com", &[]);
        assert_eq!(csr.public_key().algorithm, expected);
        let template = template_for(csr.clone(), "svc.example.com", OffsetDateTime::now_utc());
        let der = synthesize(&template, &authority).unwrap();
        let (_, leaf) = X509Certificate::from_der(der.as_ref()).unwrap();
        assert_eq!(leaf.public_key().raw, csr.public_key().subject_public_key_info.as_slice());
    }
}

#[test]
fn every_authority_algorithm_signs_leaves() {
    for key_algorithm in [KeyAlgorithm::EcdsaP384, KeyAlgorithm::Ed25519] {
        let config = AuthorityConfig {
            key_algorithm,
            ..AuthorityConfig::default()
        };
        let now = OffsetDateTime::now_utc();
        let authority = CertificateAuthority::generate(&config, now).unwrap();
        let template = template_for(support::csr("svc.example.com"), "svc.example.com", now);
        let der = synthesize(&template, &authority).unwrap();
        let (_, leaf) = X509Certificate::from_der(der.as_ref()).unwrap();
        assert_eq!(leaf.issuer().as_raw(), authority.root().raw_subject.as_slice());
    }
}

#[test]
fn unknown_key_type_is_unsupported() {
    let authority = authority();
    let mut template =
        template_for(support::csr("svc.example.com"), "svc.example.com", OffsetDateTime::now_utc());
    template.public_key.algorithm = PublicKeyAlgorithm::Other("1.2.3.4".to_string());
    let err = synthesize(&template, &authority).unwrap_err();
    assert_eq!(err, SynthesisError::UnsupportedKey("1.2.3.4".to_string()));
}

#[test]
fn non_ascii_dns_name_is_an_encoding_error() {
    let authority = authority();
    let template =
        template_for(support::csr("svc.example.com"), "bücher.example", OffsetDateTime::now_utc());
    let err = synthesize(&template, &authority).unwrap_err();
    assert!(matches!(err, SynthesisError::Encoding(_)));
}

fn synthesize_fixture(name: &str) -> (ParsedCsr, Vec<u8>) {
    let authority = authority();
    let csr = support::fixture(name);
    let template = template_for(csr.clone(), "svc.example.com", OffsetDateTime::now_utc());
    let der = synthesize(&template, &authority).unwrap();
    let (_, root) = X509Certificate::from_der(authority.root().der.as_ref()).unwrap();
    let (_, leaf) = X509Certificate::from_der(der.as_ref()).unwrap();
    leaf.verify_signature(Some(root.public_key())).unwrap();
    assert_eq!(leaf.issuer().as_raw(), authority.root().raw_subject.as_slice());
    (csr, der.as_ref().to_vec())
}

#[test]
fn repeated_attribute_types_are_copied_verbatim() {
    let (csr, der) = synthesize_fixture("duplicate_ou.csr.pem");
    let (_, leaf) = X509Certificate::from_der(&der).unwrap();
    assert_eq!(leaf.subject().as_raw(), csr.raw_subject());
    let units: Vec<&str> =
        leaf.subject().iter_organizational_unit().filter_map(|ou| ou.as_str().ok()).collect();
    assert_eq!(units, vec!["Eng", "Ops"]);
}

#[test]
fn multi_valued_rdn_is_copied_verbatim() {
    let (csr, der) = synthesize_fixture("multi_valued_rdn.csr.pem");
    let (_, leaf) = X509Certificate::from_der(&der).unwrap();
    assert_eq!(leaf.subject().as_raw(), csr.raw_subject());
    let sizes: Vec<usize> = leaf.subject().iter().map(|rdn| rdn.iter().count()).collect();
    assert_eq!(sizes, vec![1, 2]);
}

#[test]
fn teletex_subject_is_copied_verbatim() {
    let (csr, der) = synthesize_fixture("t61_organization.csr.pem");
    let (_, leaf) = X509Certificate::from_der(&der).unwrap();
    assert_eq!(leaf.subject().as_raw(), csr.raw_subject());
}

#[test]
fn rsa_requester_key_is_embedded_unchanged() {
    let (csr, der) = synthesize_fixture("rsa_2048.csr.pem");
    assert_eq!(csr.public_key().algorithm, PublicKeyAlgorithm::Rsa);
    let (_, leaf) = X509Certificate::from_der(&der).unwrap();
    assert_eq!(leaf.public_key().raw, csr.public_key().subject_public_key_info.as_slice());
    assert_eq!(leaf.public_key().algorithm.algorithm.to_id_string(), "1.2.840.113549.1.1.1");
    assert_eq!(leaf.subject().as_raw(), csr.raw_subject());
}
