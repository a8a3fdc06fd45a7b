// crates/cieps-gate-config/src/config.rs
// ============================================================================
// Module: CIEPS Gate Configuration
// Description: Configuration loading and validation for the CIEPS gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: cieps-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! When no file is named and the default file is absent, built-in defaults
//! apply. Invalid configuration fails closed.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use cieps_gate_core::AuthorityConfig;
use cieps_gate_core::DecisionServiceConfig;
use cieps_gate_core::KeyAlgorithm;
use cieps_gate_core::PolicyRules;
use cieps_gate_core::runtime::authority::DEFAULT_CA_COMMON_NAME;
use cieps_gate_core::runtime::authority::DEFAULT_CA_VALIDITY_DAYS;
use cieps_gate_core::runtime::evaluator::DEFAULT_DENIED_DOMAIN_SUFFIX;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "cieps-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CIEPS_GATE_CONFIG";
/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8443";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of denied domain suffixes.
pub(crate) const MAX_DENIED_SUFFIXES: usize = 64;
/// Maximum length of a denied domain suffix (DNS name limit).
pub(crate) const MAX_SUFFIX_LENGTH: usize = 253;
/// Maximum number of configured warnings.
pub(crate) const MAX_WARNINGS: usize = 16;
/// Maximum length of a configured warning.
pub(crate) const MAX_WARNING_LENGTH: usize = 512;
/// Maximum length of the CA common name (X.520 upper bound).
pub(crate) const MAX_COMMON_NAME_LENGTH: usize = 64;
/// Maximum CA lifetime in days.
pub(crate) const MAX_VALIDITY_DAYS: u32 = 36_500;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for the CIEPS gate.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GateConfig {
    /// Listener and transport settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Issuance policy settings.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Certificate authority settings.
    #[serde(default)]
    pub ca: CaConfig,
}

impl GateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit `path`, then `CIEPS_GATE_CONFIG`, then
    /// `cieps-gate.toml` in the working directory. When nothing is named and
    /// the default file does not exist, built-in defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(resolved) = resolve_path(path)? else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.policy.validate()?;
        self.ca.validate()?;
        Ok(())
    }

    /// Applies command-line overrides and revalidates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the overridden configuration is invalid.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(listen) = overrides.listen {
            self.server.bind = listen;
        }
        match (overrides.server_cert, overrides.server_key) {
            (Some(cert_path), Some(key_path)) => {
                self.server.tls = Some(ServerTlsConfig {
                    cert_path,
                    key_path,
                });
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "--server-cert and --server-key must be given together".to_string(),
                ));
            }
        }
        if overrides.allow_plaintext {
            self.server.allow_plaintext = true;
        }
        self.validate()
    }

    /// Returns the parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address is invalid.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_addr()
    }

    /// Returns certificate authority generation parameters.
    #[must_use]
    pub fn authority_config(&self) -> AuthorityConfig {
        AuthorityConfig {
            common_name: self.ca.common_name.clone(),
            key_algorithm: self.ca.key_algorithm,
            validity_days: self.ca.validity_days,
        }
    }

    /// Returns the issuance policy rules.
    #[must_use]
    pub fn policy_rules(&self) -> PolicyRules {
        PolicyRules {
            denied_domain_suffixes: self.policy.denied_domain_suffixes.clone(),
        }
    }

    /// Returns response and audit options for the decision service.
    #[must_use]
    pub fn decision_service_config(&self) -> DecisionServiceConfig {
        DecisionServiceConfig {
            store_certificate: self.policy.store_certificate,
            warnings: self.policy.warnings.clone(),
            log_subject: self.server.audit.log_subject,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Listen address override.
    pub listen: Option<String>,
    /// TLS certificate path override.
    pub server_cert: Option<String>,
    /// TLS private key path override.
    pub server_key: Option<String>,
    /// Permit a plaintext listener.
    pub allow_plaintext: bool,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Permit a plaintext listener on non-loopback addresses.
    #[serde(default)]
    pub allow_plaintext: bool,
    /// TLS listener settings.
    #[serde(default)]
    pub tls: Option<ServerTlsConfig>,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            allow_plaintext: false,
            tls: None,
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed listen address.
    fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        bind.parse().map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates listener configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        let addr = self.bind_addr()?;
        if let Some(tls) = &self.tls {
            tls.validate()?;
        } else if !addr.ip().is_loopback() && !self.allow_plaintext {
            return Err(ConfigError::Invalid(
                "non-loopback bind requires tls or allow_plaintext".to_string(),
            ));
        }
        self.audit.validate()?;
        Ok(())
    }
}

/// TLS listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerTlsConfig {
    /// Server certificate chain (PEM).
    pub cert_path: String,
    /// Server private key (PEM).
    pub key_path: String,
}

impl ServerTlsConfig {
    /// Validates TLS configuration paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("tls.cert_path", &self.cert_path)?;
        validate_path_string("tls.key_path", &self.key_path)?;
        Ok(())
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
    /// Include CSR subject details in issuance events (explicit opt-in).
    #[serde(default)]
    pub log_subject: bool,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
            log_subject: false,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Issuance policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Domain suffixes that are never issued.
    #[serde(default = "default_denied_domain_suffixes")]
    pub denied_domain_suffixes: Vec<String>,
    /// Ask the engine to store issued certificates.
    #[serde(default)]
    pub store_certificate: bool,
    /// Extra advisory warnings attached to issued certificates.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            denied_domain_suffixes: default_denied_domain_suffixes(),
            store_certificate: false,
            warnings: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Validates policy configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.denied_domain_suffixes.len() > MAX_DENIED_SUFFIXES {
            return Err(ConfigError::Invalid(format!(
                "policy.denied_domain_suffixes exceeds {MAX_DENIED_SUFFIXES} entries"
            )));
        }
        for suffix in &self.denied_domain_suffixes {
            if suffix.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "policy.denied_domain_suffixes entries must be non-empty".to_string(),
                ));
            }
            if suffix.len() > MAX_SUFFIX_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "policy.denied_domain_suffixes entry exceeds {MAX_SUFFIX_LENGTH} bytes"
                )));
            }
            if !suffix.is_ascii() {
                return Err(ConfigError::Invalid(
                    "policy.denied_domain_suffixes entries must be ascii".to_string(),
                ));
            }
        }
        if self.warnings.len() > MAX_WARNINGS {
            return Err(ConfigError::Invalid(format!(
                "policy.warnings exceeds {MAX_WARNINGS} entries"
            )));
        }
        if self.warnings.iter().any(|warning| warning.len() > MAX_WARNING_LENGTH) {
            return Err(ConfigError::Invalid(format!(
                "policy.warnings entry exceeds {MAX_WARNING_LENGTH} bytes"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Certificate Authority
// ============================================================================

/// Certificate authority configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaConfig {
    /// Root subject common name.
    #[serde(default = "default_ca_common_name")]
    pub common_name: String,
    /// Signing key algorithm.
    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,
    /// Root lifetime in days.
    #[serde(default = "default_ca_validity_days")]
    pub validity_days: u32,
    /// Generate the authority at startup instead of on first approval.
    #[serde(default = "default_eager_init")]
    pub eager_init: bool,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            common_name: default_ca_common_name(),
            key_algorithm: KeyAlgorithm::default(),
            validity_days: default_ca_validity_days(),
            eager_init: default_eager_init(),
        }
    }
}

impl CaConfig {
    /// Validates certificate authority configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let common_name = self.common_name.trim();
        if common_name.is_empty() {
            return Err(ConfigError::Invalid("ca.common_name must be non-empty".to_string()));
        }
        if common_name.chars().count() > MAX_COMMON_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "ca.common_name exceeds {MAX_COMMON_NAME_LENGTH} characters"
            )));
        }
        if !(1 ..= MAX_VALIDITY_DAYS).contains(&self.validity_days) {
            return Err(ConfigError::Invalid(format!(
                "ca.validity_days must be between 1 and {MAX_VALIDITY_DAYS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// Returns `None` when nothing was named and the default file is absent.
fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(Some(PathBuf::from(env_path)));
    }
    let default_path = PathBuf::from(DEFAULT_CONFIG_NAME);
    Ok(default_path.is_file().then_some(default_path))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default listen address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default audit logging enabled.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

/// Default denied domain suffixes.
fn default_denied_domain_suffixes() -> Vec<String> {
    vec![DEFAULT_DENIED_DOMAIN_SUFFIX.to_string()]
}

/// Default root common name.
fn default_ca_common_name() -> String {
    DEFAULT_CA_COMMON_NAME.to_string()
}

/// Default root lifetime.
const fn default_ca_validity_days() -> u32 {
    DEFAULT_CA_VALIDITY_DAYS
}

/// Default eager authority generation.
const fn default_eager_init() -> bool {
    true
}
