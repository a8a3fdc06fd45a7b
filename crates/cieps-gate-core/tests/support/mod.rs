// crates/cieps-gate-core/tests/support/mod.rs
// ============================================================================
// Module: Core Test Support
// Description: Shared CSR and request builders for integration tests.
// Purpose: Generate signed CSRs and load the openssl-made fixtures.
// Dependencies: cieps-gate-core, rcgen
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    missing_docs,
    reason = "Shared test helpers; not every test binary uses every helper."
)]

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use cieps_gate_core::COMMON_NAME_FIELD;
use cieps_gate_core::IssuanceAuditEvent;
use cieps_gate_core::IssuanceAuditSink;
use cieps_gate_core::ParsedCsr;
use cieps_gate_core::SigningRequest;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::KeyPair;
use rcgen::SignatureAlgorithm;

/// Builds a signed CSR for `subject_cn` with the given SAN strings.
pub fn csr_with(alg: &'static SignatureAlgorithm, subject_cn: &str, names: &[&str]) -> ParsedCsr {
    let key = KeyPair::generate_for(alg).expect("key");
    let names = names.iter().map(|name| (*name).to_string()).collect::<Vec<_>>();
    let mut params = CertificateParams::new(names).expect("params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, subject_cn);
    dn.push(DnType::OrganizationName, "Example Org");
    dn.push(DnType::CountryName, "US");
    params.distinguished_name = dn;
    let pem = params.serialize_request(&key).expect("csr").pem().expect("pem");
    ParsedCsr::from_pem(&pem).expect("parsed csr")
}

/// Builds a P-256 CSR with no SANs.
pub fn csr(subject_cn: &str) -> ParsedCsr {
    csr_with(&rcgen::PKCS_ECDSA_P256_SHA256, subject_cn, &[])
}

/// Loads a committed CSR from `tests/fixtures`.
///
/// Fixtures cover shapes rcgen cannot produce: RSA keys, repeated attribute
/// types, multi-valued RDNs, and `TeletexString` values.
pub fn fixture(name: &str) -> ParsedCsr {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    let pem = std::fs::read_to_string(&path).expect("fixture");
    ParsedCsr::from_pem(&pem).expect("parsed fixture")
}

/// Builds a request with an optional `common_name` user field.
pub fn request(csr: ParsedCsr, common_name: Option<&str>) -> SigningRequest {
    let request =
        SigningRequest::new(csr, "issuer-1".into(), "4b2c7e1e-0000-4000-8000-000000000001".into());
    match common_name {
        Some(name) => request.with_field(COMMON_NAME_FIELD, name),
        None => request,
    }
}

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<IssuanceAuditEvent>>,
}

impl RecordingAuditSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<IssuanceAuditEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl IssuanceAuditSink for RecordingAuditSink {
    fn record_issuance(&self, event: &IssuanceAuditEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}
