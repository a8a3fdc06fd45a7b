// crates/cieps-gate-core/src/runtime/synthesizer.rs
// ============================================================================
// Module: Certificate Synthesizer
// Description: Turns an approved template into a signed X.509 certificate.
// Purpose: Materialize leaves under the local certificate authority.
// Dependencies: const-oid, der, flagset, rcgen, x509-cert, crate::core
// ============================================================================

//! ## Overview
//! [`synthesize`] assembles a `TBSCertificate` from a [`CertificateTemplate`],
//! signs its DER encoding with the authority key, and returns the finished
//! certificate. The subject name and `SubjectPublicKeyInfo` are decoded from
//! the bytes the CSR carried and re-emitted unchanged; only the issuer,
//! extensions, and signature come from this side.
//!
//! The signature is informational. Consumers are expected to treat the output
//! as a syntactically valid certificate whose chain may or may not be trusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Display;
use std::net::IpAddr;

use const_oid::AssociatedOid;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc5280::ID_KP_CLIENT_AUTH;
use const_oid::db::rfc5280::ID_KP_SERVER_AUTH;
use const_oid::db::rfc5912::ECDSA_WITH_SHA_256;
use const_oid::db::rfc5912::ECDSA_WITH_SHA_384;
use const_oid::db::rfc8410::ID_ED_25519;
use der::DateTime;
use der::Decode;
use der::Encode;
use der::asn1::BitString;
use der::asn1::GeneralizedTime;
use der::asn1::Ia5String;
use der::asn1::OctetString;
use der::asn1::PrintableStringRef;
use der::asn1::UtcTime;
use flagset::FlagSet;
use rcgen::SigningKey;
use rustls_pki_types::CertificateDer;
use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;
use x509_cert::Certificate;
use x509_cert::TbsCertificate;
use x509_cert::Version;
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::AuthorityKeyIdentifier;
use x509_cert::ext::pkix::BasicConstraints;
use x509_cert::ext::pkix::ExtendedKeyUsage as ExtendedKeyUsageExt;
use x509_cert::ext::pkix::KeyUsage as KeyUsageExt;
use x509_cert::ext::pkix::KeyUsages;
use x509_cert::ext::pkix::SubjectAltName as SubjectAltNameExt;
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Time;
use x509_cert::time::Validity;

use crate::core::csr::PublicKeyAlgorithm;
use crate::core::csr::SubjectAltName;
use crate::core::decision::CertificateTemplate;
use crate::core::decision::CustomExtension;
use crate::core::decision::ExtendedKeyUsage;
use crate::core::decision::ExtensionValue;
use crate::core::decision::KeyUsage;
use crate::runtime::authority::CertificateAuthority;
use crate::runtime::authority::KeyAlgorithm;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// First year that must be encoded as `GeneralizedTime` (RFC 5280 4.1.2.5).
const GENERALIZED_TIME_FROM_YEAR: u16 = 2050;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Certificate synthesis errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    /// The requester's key type cannot be embedded.
    #[error("unsupported public key: {0}")]
    UnsupportedKey(String),
    /// A subject, name, or extension value could not be encoded.
    #[error("certificate encoding failed: {0}")]
    Encoding(String),
    /// Signing with the authority key failed.
    #[error("certificate signing failed: {0}")]
    Signing(String),
}

/// Wraps a DER or OID failure as [`SynthesisError::Encoding`].
fn encoding(err: impl Display) -> SynthesisError {
    SynthesisError::Encoding(err.to_string())
}

// ============================================================================
// SECTION: Synthesis
// ============================================================================

/// Signs `template` under `authority` and returns the DER certificate.
///
/// # Errors
///
/// Returns [`SynthesisError`] when the key type is unsupported, a value cannot
/// be encoded, or signing fails.
pub fn synthesize(
    template: &CertificateTemplate,
    authority: &CertificateAuthority,
) -> Result<CertificateDer<'static>, SynthesisError> {
    if let PublicKeyAlgorithm::Other(oid) = &template.public_key.algorithm {
        return Err(SynthesisError::UnsupportedKey(oid.clone()));
    }
    let subject = verbatim_subject(&template.raw_subject)?;
    let subject_public_key_info =
        SubjectPublicKeyInfoOwned::from_der(&template.public_key.subject_public_key_info)
            .map_err(encoding)?;
    let issuer = Name::from_der(&authority.root().raw_subject).map_err(encoding)?;
    let signature_algorithm = signature_algorithm(authority.key_algorithm());

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(template.serial.as_bytes()).map_err(encoding)?,
        signature: signature_algorithm.clone(),
        issuer,
        validity: Validity {
            not_before: x509_time(template.validity.not_before)?,
            not_after: x509_time(template.validity.not_after)?,
        },
        extensions: Some(extensions(template, authority, subject.0.is_empty())?),
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
    };

    let tbs_der = tbs_certificate.to_der().map_err(encoding)?;
    let signature = authority
        .signing_key()
        .sign(&tbs_der)
        .map_err(|err| SynthesisError::Signing(err.to_string()))?;
    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature).map_err(encoding)?,
    };
    Ok(CertificateDer::from(certificate.to_der().map_err(encoding)?))
}

/// Decodes the CSR subject, refusing names that would not re-encode byte for
/// byte.
fn verbatim_subject(raw_subject: &[u8]) -> Result<Name, SynthesisError> {
    let subject = Name::from_der(raw_subject).map_err(encoding)?;
    if subject.to_der().map_err(encoding)? != raw_subject {
        return Err(SynthesisError::Encoding("subject is not DER encoded".to_string()));
    }
    Ok(subject)
}

/// Returns the signature algorithm identifier for the authority key.
fn signature_algorithm(algorithm: KeyAlgorithm) -> AlgorithmIdentifierOwned {
    let oid = match algorithm {
        KeyAlgorithm::EcdsaP256 => ECDSA_WITH_SHA_256,
        KeyAlgorithm::EcdsaP384 => ECDSA_WITH_SHA_384,
        KeyAlgorithm::Ed25519 => ID_ED_25519,
    };
    AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    }
}

/// Encodes an instant as `UTCTime` before 2050 and `GeneralizedTime` after.
fn x509_time(instant: OffsetDateTime) -> Result<Time, SynthesisError> {
    let utc = instant.to_offset(UtcOffset::UTC);
    let year = u16::try_from(utc.year())
        .map_err(|_| SynthesisError::Encoding(format!("year {} is out of range", utc.year())))?;
    let (hour, minute, second) = utc.to_hms();
    let date_time = DateTime::new(year, u8::from(utc.month()), utc.day(), hour, minute, second)
        .map_err(encoding)?;
    if year < GENERALIZED_TIME_FROM_YEAR {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time).map_err(encoding)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

// ============================================================================
// SECTION: Extensions
// ============================================================================

/// Builds the extension list in a stable order.
fn extensions(
    template: &CertificateTemplate,
    authority: &CertificateAuthority,
    empty_subject: bool,
) -> Result<Vec<Extension>, SynthesisError> {
    let mut extensions = vec![
        extension(
            &SubjectKeyIdentifier(
                OctetString::new(template.subject_key_identifier.clone()).map_err(encoding)?,
            ),
            false,
        )?,
        extension(
            &AuthorityKeyIdentifier {
                key_identifier: Some(
                    OctetString::new(authority.root().subject_key_identifier.clone())
                        .map_err(encoding)?,
                ),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            },
            false,
        )?,
    ];
    if !template.key_usages.is_empty() {
        let flags = template
            .key_usages
            .iter()
            .fold(FlagSet::<KeyUsages>::default(), |flags, usage| flags | key_usage(*usage));
        extensions.push(extension(&KeyUsageExt(flags), true)?);
    }
    if !template.extended_key_usages.is_empty() {
        let purposes =
            template.extended_key_usages.iter().copied().map(extended_key_usage).collect();
        extensions.push(extension(&ExtendedKeyUsageExt(purposes), false)?);
    }
    if template.is_ca {
        let constraints = BasicConstraints {
            ca: true,
            path_len_constraint: None,
        };
        extensions.push(extension(&constraints, true)?);
    }
    if !template.subject_alt_names.is_empty() {
        let names = template
            .subject_alt_names
            .iter()
            .map(general_name)
            .collect::<Result<Vec<_>, _>>()?;
        // RFC 5280 4.2.1.6: critical when the subject is empty.
        extensions.push(extension(&SubjectAltNameExt(names), empty_subject)?);
    }
    for custom in &template.custom_extensions {
        extensions.push(custom_extension(custom)?);
    }
    Ok(extensions)
}

/// Wraps a typed extension value.
fn extension<T: AssociatedOid + Encode>(
    value: &T,
    critical: bool,
) -> Result<Extension, SynthesisError> {
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(value.to_der().map_err(encoding)?).map_err(encoding)?,
    })
}

/// Maps a subject alternative name onto a general name.
fn general_name(name: &SubjectAltName) -> Result<GeneralName, SynthesisError> {
    let ia5 = |value: &str| Ia5String::new(value).map_err(encoding);
    Ok(match name {
        SubjectAltName::Dns(value) => GeneralName::DnsName(ia5(value)?),
        SubjectAltName::Email(value) => GeneralName::Rfc822Name(ia5(value)?),
        SubjectAltName::Uri(value) => GeneralName::UniformResourceIdentifier(ia5(value)?),
        SubjectAltName::Ip(address) => {
            let octets = match address {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            GeneralName::IpAddress(OctetString::new(octets).map_err(encoding)?)
        }
    })
}

/// Maps a key usage bit onto its flag.
const fn key_usage(usage: KeyUsage) -> KeyUsages {
    match usage {
        KeyUsage::DigitalSignature => KeyUsages::DigitalSignature,
        KeyUsage::KeyEncipherment => KeyUsages::KeyEncipherment,
        KeyUsage::DataEncipherment => KeyUsages::DataEncipherment,
        KeyUsage::KeyAgreement => KeyUsages::KeyAgreement,
    }
}

/// Maps an extended key usage purpose onto its OID.
const fn extended_key_usage(usage: ExtendedKeyUsage) -> ObjectIdentifier {
    match usage {
        ExtendedKeyUsage::ServerAuth => ID_KP_SERVER_AUTH,
        ExtendedKeyUsage::ClientAuth => ID_KP_CLIENT_AUTH,
    }
}

/// Encodes a custom extension.
fn custom_extension(custom: &CustomExtension) -> Result<Extension, SynthesisError> {
    let dotted = custom.oid.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
    let extn_id = ObjectIdentifier::new(&dotted).map_err(encoding)?;
    let content = match &custom.value {
        ExtensionValue::PrintableString(text) => {
            PrintableStringRef::new(text).map_err(encoding)?.to_der().map_err(encoding)?
        }
        ExtensionValue::Der(bytes) => bytes.clone(),
    };
    Ok(Extension {
        extn_id,
        critical: custom.critical,
        extn_value: OctetString::new(content).map_err(encoding)?,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
