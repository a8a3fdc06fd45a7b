// crates/cieps-gate-core/src/runtime/authority.rs
// ============================================================================
// Module: Certificate Authority Provider
// Description: Lazily generated, process-local signing authority.
// Purpose: Own the CA key pair and self-signed root used to sign leaves.
// Dependencies: rand, rcgen, sha2, time, x509-parser
// ============================================================================

//! ## Overview
//! [`CertificateAuthorityProvider`] creates the signing authority at most once
//! and then hands out shared, read-only [`CertificateAuthority`] handles.
//! Concurrent first callers serialize on an initialization guard; every later
//! call is a lock-free read.
//!
//! Security posture: the key pair lives only in process memory and is never
//! rotated or persisted. It is suitable for demonstration, not production.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use rand::RngCore;
use rcgen::BasicConstraints;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::ExtendedKeyUsagePurpose;
use rcgen::IsCa;
use rcgen::KeyIdMethod;
use rcgen::KeyPair;
use rcgen::KeyUsagePurpose;
use rcgen::SignatureAlgorithm;
use rustls_pki_types::CertificateDer;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;
use x509_parser::prelude::FromDer;
use x509_parser::prelude::ParsedExtension;
use x509_parser::prelude::X509Certificate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default root common name.
pub const DEFAULT_CA_COMMON_NAME: &str = "Demo Root CA";
/// Default root lifetime in days.
pub const DEFAULT_CA_VALIDITY_DAYS: u32 = 3650;
/// Backdating applied to the root `not_before`.
const ROOT_BACKDATE: Duration = Duration::seconds(60);
/// Length of RFC 7093 method 1 key identifiers.
const KEY_IDENTIFIER_LEN: usize = 20;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Key algorithm used for the CA signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    /// ECDSA over NIST P-256 with SHA-256.
    #[default]
    EcdsaP256,
    /// ECDSA over NIST P-384 with SHA-384.
    EcdsaP384,
    /// Ed25519.
    Ed25519,
}

impl KeyAlgorithm {
    /// Returns the rcgen signature algorithm for this key type.
    #[must_use]
    pub fn signature_algorithm(self) -> &'static SignatureAlgorithm {
        match self {
            Self::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            Self::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            Self::Ed25519 => &rcgen::PKCS_ED25519,
        }
    }

    /// Returns the stable configuration label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EcdsaP256 => "ecdsa_p256",
            Self::EcdsaP384 => "ecdsa_p384",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for generating a certificate authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityConfig {
    /// Root subject common name.
    pub common_name: String,
    /// Signing key algorithm.
    pub key_algorithm: KeyAlgorithm,
    /// Root lifetime in days.
    pub validity_days: u32,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            common_name: DEFAULT_CA_COMMON_NAME.to_string(),
            key_algorithm: KeyAlgorithm::default(),
            validity_days: DEFAULT_CA_VALIDITY_DAYS,
        }
    }
}

// ============================================================================
// SECTION: Authority
// ============================================================================

/// Parsed record of the self-signed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCertificate {
    /// DER encoding.
    pub der: CertificateDer<'static>,
    /// PEM encoding.
    pub pem: String,
    /// Subject rendered as an RFC 4514 string.
    pub subject: String,
    /// Raw DER subject.
    pub raw_subject: Vec<u8>,
    /// Subject key identifier.
    pub subject_key_identifier: Vec<u8>,
    /// Start of validity.
    pub not_before: OffsetDateTime,
    /// End of validity.
    pub not_after: OffsetDateTime,
}

/// Signing key and root certificate, immutable after creation.
pub struct CertificateAuthority {
    /// Signing key.
    key: KeyPair,
    /// Signing key algorithm.
    key_algorithm: KeyAlgorithm,
    /// Parsed root record.
    root: RootCertificate,
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("key_algorithm", &self.key_algorithm)
            .field("root", &self.root.subject)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Generates a fresh key pair and self-signed root valid from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when key generation, signing, or parsing
    /// the resulting root fails.
    pub fn generate(config: &AuthorityConfig, now: OffsetDateTime) -> Result<Self, AuthorityError> {
        let key = KeyPair::generate_for(config.key_algorithm.signature_algorithm())
            .map_err(|err| AuthorityError::KeyGeneration(err.to_string()))?;

        let mut params = CertificateParams::default();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, config.common_name.as_str());
        params.distinguished_name = name;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::CrlSign,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::Any];
        params.not_before = now - ROOT_BACKDATE;
        params.not_after = now
            .checked_add(Duration::days(i64::from(config.validity_days)))
            .ok_or(AuthorityError::Validity(config.validity_days))?;
        params.serial_number = Some(rcgen::SerialNumber::from_slice(&random_serial()));
        params.key_identifier_method =
            KeyIdMethod::PreSpecified(key_identifier(key.public_key_raw()));

        let certificate =
            params.self_signed(&key).map_err(|err| AuthorityError::Signing(err.to_string()))?;
        let root = parse_root(certificate.der().clone(), certificate.pem())?;
        Ok(Self {
            key,
            key_algorithm: config.key_algorithm,
            root,
        })
    }

    /// Returns the key that signs leaves.
    #[must_use]
    pub const fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    /// Returns the signing key algorithm.
    #[must_use]
    pub const fn key_algorithm(&self) -> KeyAlgorithm {
        self.key_algorithm
    }

    /// Returns the parsed root record.
    #[must_use]
    pub const fn root(&self) -> &RootCertificate {
        &self.root
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// At-most-once provider of the shared certificate authority.
///
/// # Invariants
/// - At most one authority is ever published per provider.
/// - Published authorities are never replaced.
#[derive(Debug)]
pub struct CertificateAuthorityProvider {
    /// Generation parameters.
    config: AuthorityConfig,
    /// Published authority.
    authority: OnceLock<Arc<CertificateAuthority>>,
    /// Serializes first-time generation.
    init: Mutex<()>,
}

impl CertificateAuthorityProvider {
    /// Creates a provider that generates lazily on first use.
    #[must_use]
    pub const fn new(config: AuthorityConfig) -> Self {
        Self {
            config,
            authority: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Creates a provider pre-populated with an existing authority.
    #[must_use]
    pub fn with_authority(config: AuthorityConfig, authority: Arc<CertificateAuthority>) -> Self {
        let provider = Self::new(config);
        let _ = provider.authority.set(authority);
        provider
    }

    /// Returns the shared authority, generating it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when generation fails. A failed attempt
    /// publishes nothing, so a later call retries generation.
    pub fn get_or_create_root(&self) -> Result<Arc<CertificateAuthority>, AuthorityError> {
        if let Some(authority) = self.authority.get() {
            return Ok(Arc::clone(authority));
        }
        let _guard = self.init.lock().map_err(|_| AuthorityError::Poisoned)?;
        if let Some(authority) = self.authority.get() {
            return Ok(Arc::clone(authority));
        }
        let authority =
            Arc::new(CertificateAuthority::generate(&self.config, OffsetDateTime::now_utc())?);
        let _ = self.authority.set(Arc::clone(&authority));
        Ok(authority)
    }

    /// Returns true once an authority has been published.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.authority.get().is_some()
    }

    /// Returns the generation parameters.
    #[must_use]
    pub const fn config(&self) -> &AuthorityConfig {
        &self.config
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Certificate authority errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorityError {
    /// Key pair generation failed.
    #[error("ca key generation failed: {0}")]
    KeyGeneration(String),
    /// Self-signing the root failed.
    #[error("ca root signing failed: {0}")]
    Signing(String),
    /// The generated root could not be parsed back.
    #[error("ca root parse failed: {0}")]
    Parse(String),
    /// The configured lifetime does not fit the calendar.
    #[error("ca validity of {0} days is out of range")]
    Validity(u32),
    /// A previous initializer panicked while holding the guard.
    #[error("ca initialization guard poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Computes an RFC 7093 method 1 key identifier over public key bits.
#[must_use]
pub fn key_identifier(public_key_bits: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(public_key_bits);
    digest[.. KEY_IDENTIFIER_LEN].to_vec()
}

/// Returns 16 random bytes usable as a positive, non-zero DER serial.
#[must_use]
pub fn random_serial() -> [u8; 16] {
    let mut bytes = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[0] &= 0x7f;
    bytes[0] |= 0x40;
    bytes
}

/// Parses the self-signed root into its structured record.
fn parse_root(
    der: CertificateDer<'static>,
    pem: String,
) -> Result<RootCertificate, AuthorityError> {
    let (subject, raw_subject, subject_key_identifier, not_before, not_after) = {
        let (_, certificate) = X509Certificate::from_der(der.as_ref())
            .map_err(|err| AuthorityError::Parse(err.to_string()))?;
        let subject_key_identifier = certificate
            .extensions()
            .iter()
            .find_map(|extension| match extension.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0.to_vec()),
                _ => None,
            })
            .ok_or_else(|| AuthorityError::Parse("missing subject key identifier".to_string()))?;
        (
            certificate.subject().to_string(),
            certificate.subject().as_raw().to_vec(),
            subject_key_identifier,
            certificate.validity().not_before.to_datetime(),
            certificate.validity().not_after.to_datetime(),
        )
    };
    Ok(RootCertificate {
        pem,
        der,
        subject,
        raw_subject,
        subject_key_identifier,
        not_before,
        not_after,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
