// crates/cieps-gate-core/src/core/csr.rs
// ============================================================================
// Module: Certificate Signing Requests
// Description: Decoded, signature-verified PKCS#10 requests.
// Purpose: Give the policy pipeline an owned view of the requester's CSR.
// Dependencies: rustls-pki-types, x509-parser
// ============================================================================

//! ## Overview
//! [`ParsedCsr`] is the owned, read-only form of a PKCS#10 request. Parsing
//! always verifies the self-signature before any field is exposed, so a
//! `ParsedCsr` value is proof that the requester holds the private key.
//! Security posture: CSR bytes are untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use rustls_pki_types::CertificateSigningRequestDer;
use rustls_pki_types::pem::PemObject;
use serde::Serialize;
use thiserror::Error;
use x509_parser::prelude::FromDer;
use x509_parser::prelude::GeneralName;
use x509_parser::prelude::ParsedExtension;
use x509_parser::prelude::X509CertificationRequest;
use x509_parser::x509::AttributeTypeAndValue;
use x509_parser::x509::SubjectPublicKeyInfo;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dotted OID of the X.520 common name attribute.
pub const COMMON_NAME_OID: &str = "2.5.4.3";
/// Dotted OID of the X.520 organization attribute.
const ORGANIZATION_OID: &str = "2.5.4.10";
/// Dotted OID of the X.520 country attribute.
const COUNTRY_OID: &str = "2.5.4.6";
/// ASN.1 universal tag number for `TeletexString`.
const TAG_TELETEX_STRING: u32 = 20;
/// Dotted OID for `id-ecPublicKey`.
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
/// Dotted OID for the NIST P-256 curve.
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
/// Dotted OID for the NIST P-384 curve.
const OID_CURVE_P384: &str = "1.3.132.0.34";
/// Dotted OID for Ed25519 keys.
const OID_ED25519: &str = "1.3.101.112";
/// Dotted OID for `rsaEncryption` keys.
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

// ============================================================================
// SECTION: Types
// ============================================================================

/// One attribute of a distinguished name, in encounter order.
///
/// This is a read-only view for policy checks and audit. Certificates are
/// built from [`ParsedCsr::raw_subject`], never from these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectAttribute {
    /// Attribute type in dotted form.
    pub oid: String,
    /// Attribute value text. `TeletexString` is read as Latin-1 and other
    /// non-UTF-8 forms are decoded lossily.
    pub value: String,
}

/// Public key algorithm carried by a CSR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicKeyAlgorithm {
    /// ECDSA over NIST P-256.
    EcdsaP256,
    /// ECDSA over NIST P-384.
    EcdsaP384,
    /// Ed25519.
    Ed25519,
    /// RSA (any modulus size).
    Rsa,
    /// Any other algorithm, identified by its dotted OID.
    Other(String),
}

/// Public key material copied verbatim from a CSR.
///
/// # Invariants
/// - `subject_public_key_info` is the exact DER of the CSR's SPKI.
/// - `subject_public_key` is the content of the SPKI bit string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrPublicKey {
    /// Key algorithm.
    pub algorithm: PublicKeyAlgorithm,
    /// Raw DER `SubjectPublicKeyInfo`.
    pub subject_public_key_info: Vec<u8>,
    /// Raw subject public key bits.
    pub subject_public_key: Vec<u8>,
}

/// Subject alternative name requested by a CSR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SubjectAltName {
    /// DNS name.
    Dns(String),
    /// RFC 822 e-mail address.
    Email(String),
    /// IP address.
    Ip(IpAddr),
    /// Uniform resource identifier.
    Uri(String),
}

/// Decoded and signature-verified PKCS#10 certificate signing request.
///
/// # Invariants
/// - Constructed only through [`ParsedCsr::from_pem`] or [`ParsedCsr::from_der`],
///   both of which verify the request signature.
/// - Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCsr {
    /// Original DER encoding.
    der: Vec<u8>,
    /// Raw DER subject name.
    raw_subject: Vec<u8>,
    /// Parsed subject attributes.
    subject: Vec<SubjectAttribute>,
    /// Public key material.
    public_key: CsrPublicKey,
    /// Requested subject alternative names.
    subject_alt_names: Vec<SubjectAltName>,
    /// Dotted OID of the CSR signature algorithm.
    signature_algorithm: String,
}

impl ParsedCsr {
    /// Parses a PEM `CERTIFICATE REQUEST` block.
    ///
    /// # Errors
    ///
    /// Returns [`CsrError`] when the PEM framing, DER structure, or signature
    /// is invalid.
    pub fn from_pem(pem: &str) -> Result<Self, CsrError> {
        let der = CertificateSigningRequestDer::from_pem_slice(pem.as_bytes())
            .map_err(|err| CsrError::Pem(err.to_string()))?;
        Self::from_der(der.as_ref())
    }

    /// Parses a DER-encoded CSR.
    ///
    /// # Errors
    ///
    /// Returns [`CsrError`] when the structure or signature is invalid.
    pub fn from_der(der: &[u8]) -> Result<Self, CsrError> {
        let (rest, csr) = X509CertificationRequest::from_der(der)
            .map_err(|err| CsrError::Malformed(err.to_string()))?;
        if !rest.is_empty() {
            return Err(CsrError::Malformed("trailing data after request".to_string()));
        }
        csr.verify_signature().map_err(|_| CsrError::Signature)?;

        let info = &csr.certification_request_info;
        let subject = info.subject.iter_attributes().map(subject_attribute).collect();
        let mut subject_alt_names = Vec::new();
        if let Some(extensions) = csr.requested_extensions() {
            for extension in extensions {
                if let ParsedExtension::SubjectAlternativeName(san) = extension {
                    for name in &san.general_names {
                        if let Some(name) = subject_alt_name(name) {
                            subject_alt_names.push(name);
                        }
                    }
                }
            }
        }

        Ok(Self {
            der: der.to_vec(),
            raw_subject: info.subject.as_raw().to_vec(),
            subject,
            public_key: public_key(&info.subject_pki),
            subject_alt_names,
            signature_algorithm: csr.signature_algorithm.algorithm.to_id_string(),
        })
    }

    /// Returns the original DER bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the raw DER subject.
    #[must_use]
    pub fn raw_subject(&self) -> &[u8] {
        &self.raw_subject
    }

    /// Returns the parsed subject attributes.
    #[must_use]
    pub fn subject(&self) -> &[SubjectAttribute] {
        &self.subject
    }

    /// Returns the public key material.
    #[must_use]
    pub const fn public_key(&self) -> &CsrPublicKey {
        &self.public_key
    }

    /// Returns the requested subject alternative names.
    #[must_use]
    pub fn subject_alt_names(&self) -> &[SubjectAltName] {
        &self.subject_alt_names
    }

    /// Returns the dotted OID of the signature algorithm.
    #[must_use]
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    /// Returns the first subject common name, if any.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.first_attribute(COMMON_NAME_OID)
    }

    /// Returns the first subject organization, if any.
    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.first_attribute(ORGANIZATION_OID)
    }

    /// Returns the first subject country, if any.
    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.first_attribute(COUNTRY_OID)
    }

    /// Returns the requested DNS names.
    pub fn dns_names(&self) -> impl Iterator<Item = &str> {
        self.subject_alt_names.iter().filter_map(|name| match name {
            SubjectAltName::Dns(value) => Some(value.as_str()),
            _ => None,
        })
    }

    /// Finds the first subject attribute with the given dotted OID.
    fn first_attribute(&self, oid: &str) -> Option<&str> {
        self.subject
            .iter()
            .find(|attribute| attribute.oid == oid)
            .map(|attribute| attribute.value.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CSR decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsrError {
    /// PEM framing was missing or invalid.
    #[error("invalid csr pem: {0}")]
    Pem(String),
    /// DER structure could not be decoded.
    #[error("malformed csr: {0}")]
    Malformed(String),
    /// The request signature did not verify against its own public key.
    #[error("csr signature verification failed")]
    Signature,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a parsed name attribute into an owned subject attribute.
fn subject_attribute(attribute: &AttributeTypeAndValue<'_>) -> SubjectAttribute {
    let value = match attribute.as_str() {
        Ok(text) => text.to_string(),
        // T61 in the wild is Latin-1.
        Err(_) if attribute.attr_value().header.tag().0 == TAG_TELETEX_STRING => {
            attribute.as_slice().iter().copied().map(char::from).collect()
        }
        Err(_) => String::from_utf8_lossy(attribute.as_slice()).into_owned(),
    };
    SubjectAttribute {
        oid: attribute.attr_type().to_id_string(),
        value,
    }
}

/// Converts a general name into a subject alternative name when representable.
fn subject_alt_name(name: &GeneralName<'_>) -> Option<SubjectAltName> {
    match name {
        GeneralName::DNSName(value) => Some(SubjectAltName::Dns((*value).to_string())),
        GeneralName::RFC822Name(value) => Some(SubjectAltName::Email((*value).to_string())),
        GeneralName::URI(value) => Some(SubjectAltName::Uri((*value).to_string())),
        GeneralName::IPAddress(bytes) => match bytes.len() {
            4 => <[u8; 4]>::try_from(*bytes)
                .ok()
                .map(|octets| SubjectAltName::Ip(IpAddr::V4(Ipv4Addr::from(octets)))),
            16 => <[u8; 16]>::try_from(*bytes)
                .ok()
                .map(|octets| SubjectAltName::Ip(IpAddr::V6(Ipv6Addr::from(octets)))),
            _ => None,
        },
        _ => None,
    }
}

/// Copies the public key material and classifies its algorithm.
fn public_key(spki: &SubjectPublicKeyInfo<'_>) -> CsrPublicKey {
    let algorithm_oid = spki.algorithm.algorithm.to_id_string();
    let algorithm = match algorithm_oid.as_str() {
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|params| params.as_oid().ok())
                .map(|oid| oid.to_id_string());
            match curve.as_deref() {
                Some(OID_CURVE_P256) => PublicKeyAlgorithm::EcdsaP256,
                Some(OID_CURVE_P384) => PublicKeyAlgorithm::EcdsaP384,
                Some(other) => PublicKeyAlgorithm::Other(format!("{algorithm_oid}/{other}")),
                None => PublicKeyAlgorithm::Other(algorithm_oid),
            }
        }
        OID_ED25519 => PublicKeyAlgorithm::Ed25519,
        OID_RSA_ENCRYPTION => PublicKeyAlgorithm::Rsa,
        _ => PublicKeyAlgorithm::Other(algorithm_oid),
    };
    CsrPublicKey {
        algorithm,
        subject_public_key_info: spki.raw.to_vec(),
        subject_public_key: spki.subject_public_key.data.to_vec(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions."
    )]

    use rcgen::CertificateParams;
    use rcgen::DistinguishedName;
    use rcgen::DnType;
    use rcgen::KeyPair;

    use super::CsrError;
    use super::ParsedCsr;
    use super::PublicKeyAlgorithm;
    use super::SubjectAltName;

    fn request_pem(names: Vec<String>, common_name: &str) -> (String, KeyPair) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(names).unwrap();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, common_name);
        name.push(DnType::OrganizationName, "Example Org");
        params.distinguished_name = name;
        let csr = params.serialize_request(&key).unwrap();
        (csr.pem().unwrap(), key)
    }

    #[test]
    fn parses_subject_and_names() {
        let (pem, key) = request_pem(vec!["svc.example.com".to_string()], "svc.example.com");
        let csr = ParsedCsr::from_pem(&pem).unwrap();
        assert_eq!(csr.common_name(), Some("svc.example.com"));
        assert_eq!(csr.organization(), Some("Example Org"));
        assert_eq!(csr.country(), None);
        assert_eq!(
            csr.subject_alt_names(),
            &[SubjectAltName::Dns("svc.example.com".to_string())]
        );
        assert_eq!(csr.public_key().algorithm, PublicKeyAlgorithm::EcdsaP256);
        assert_eq!(csr.public_key().subject_public_key, key.public_key_raw());
        assert_eq!(csr.signature_algorithm(), "1.2.840.10045.4.3.2");
        assert_eq!(csr.subject()[0].oid, "2.5.4.3");
    }

    #[test]
    fn parses_request_without_names() {
        let (pem, _key) = request_pem(Vec::new(), "bare.example.com");
        let csr = ParsedCsr::from_pem(&pem).unwrap();
        assert!(csr.subject_alt_names().is_empty());
        assert_eq!(csr.dns_names().count(), 0);
    }

    #[test]
    fn rejects_tampered_signature() {
        let (pem, _key) = request_pem(Vec::new(), "tamper.example.com");
        let csr = ParsedCsr::from_pem(&pem).unwrap();
        let mut der = csr.der().to_vec();
        let last = der.len() - 1;
        der[last] ^= 0x01;
        let result = ParsedCsr::from_der(&der);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_garbage_pem() {
        let result = ParsedCsr::from_pem("not a certificate request");
        assert!(matches!(result, Err(CsrError::Pem(_))));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let (pem, _key) = request_pem(Vec::new(), "trail.example.com");
        let csr = ParsedCsr::from_pem(&pem).unwrap();
        let mut der = csr.der().to_vec();
        der.push(0);
        assert!(matches!(ParsedCsr::from_der(&der), Err(CsrError::Malformed(_))));
    }

    #[test]
    fn teletex_subject_values_are_accepted() {
        let pem = include_str!("../../tests/fixtures/t61_organization.csr.pem");
        let csr = ParsedCsr::from_pem(pem).unwrap();
        assert_eq!(csr.organization(), Some("B\u{fc}cher GmbH"));
        assert_eq!(csr.common_name(), Some("svc.example.com"));
    }

    #[test]
    fn classifies_rsa_keys() {
        let pem = include_str!("../../tests/fixtures/rsa_2048.csr.pem");
        let csr = ParsedCsr::from_pem(pem).unwrap();
        assert_eq!(csr.public_key().algorithm, PublicKeyAlgorithm::Rsa);
        assert_eq!(csr.signature_algorithm(), "1.2.840.113549.1.1.11");
        assert_eq!(csr.dns_names().collect::<Vec<_>>(), vec!["svc.example.com"]);
    }

    #[test]
    fn repeated_attribute_types_are_all_listed() {
        let pem = include_str!("../../tests/fixtures/duplicate_ou.csr.pem");
        let csr = ParsedCsr::from_pem(pem).unwrap();
        let units: Vec<&str> = csr
            .subject()
            .iter()
            .filter(|attribute| attribute.oid == "2.5.4.11")
            .map(|attribute| attribute.value.as_str())
            .collect();
        assert_eq!(units, vec!["Eng", "Ops"]);
    }
}
