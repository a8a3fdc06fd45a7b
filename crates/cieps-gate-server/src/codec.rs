// crates/cieps-gate-server/src/codec.rs
// ============================================================================
// Module: CIEPS Wire Codec
// Description: JSON request decoding and response encoding for the CIEPS wire.
// Purpose: Turn untrusted request bodies into verified signing requests.
// Dependencies: cieps-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Requests arrive in the CIEPS shape sent by the issuing engine. Top-level
//! fields are decoded strictly; unknown fields are rejected. The CSR travels
//! as PEM under `user_request_key_values.csr` and is parsed and
//! signature-verified here, before any policy logic sees the request.
//! Engine metadata under `vault_request_values` is decoded leniently so new
//! engine versions can add fields.

// ============================================================================
// SECTION: Imports
// ============================================================================

use cieps_gate_core::CorrelationId;
use cieps_gate_core::CsrError;
use cieps_gate_core::IssuanceResponse;
use cieps_gate_core::IssuerRef;
use cieps_gate_core::ParsedCsr;
use cieps_gate_core::SigningRequest;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User field carrying the PEM-encoded CSR.
pub const CSR_FIELD: &str = "csr";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Inbound CIEPS request body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CiepsRequest {
    /// Protocol version chosen by the engine.
    #[serde(default)]
    pub request_version: u32,
    /// Request identifier echoed back as `request_uuid`.
    pub request_uuid: String,
    /// Whether the engine waits for the decision inline.
    #[serde(default)]
    pub synchronous: bool,
    /// Caller-supplied fields, including the CSR.
    pub user_request_key_values: Map<String, Value>,
    /// Identity details of the authenticated caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_request_key_values: Option<Map<String, Value>>,
    /// ACME order details when the request came through ACME.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme_request_key_values: Option<Map<String, Value>>,
    /// Engine-side metadata.
    #[serde(default)]
    pub vault_request_values: VaultRequestValues,
}

/// Engine metadata attached to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VaultRequestValues {
    /// Policy name configured on the engine.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_name: String,
    /// Mount path of the issuing engine.
    #[serde(default)]
    pub mount: String,
    /// Engine namespace.
    #[serde(default, rename = "ns")]
    pub namespace: String,
    /// Cluster identifier of the engine node.
    #[serde(default)]
    pub vault_node_cluster: String,
    /// Node identifier.
    #[serde(default)]
    pub vault_node_id: String,
    /// Human-readable issuer name.
    #[serde(default)]
    pub issuer_name: String,
    /// Issuer identifier echoed as `issuer_ref`.
    #[serde(default)]
    pub issuer_id: String,
}

impl CiepsRequest {
    /// Parses the embedded CSR and builds the core signing request.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the CSR is missing or invalid.
    pub fn into_signing_request(self) -> Result<SigningRequest, CodecError> {
        let pem = self
            .user_request_key_values
            .get(CSR_FIELD)
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingCsr)?;
        let parsed_csr = ParsedCsr::from_pem(pem)?;
        Ok(SigningRequest {
            parsed_csr,
            user_fields: self.user_request_key_values,
            issuer_ref: IssuerRef::new(self.vault_request_values.issuer_id),
            correlation_id: CorrelationId::new(self.request_uuid),
        })
    }
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Decodes a request body into a verified signing request.
///
/// # Errors
///
/// Returns [`CodecError`] when the JSON or the embedded CSR is invalid.
pub fn decode_request(body: &[u8]) -> Result<SigningRequest, CodecError> {
    let request: CiepsRequest =
        serde_json::from_slice(body).map_err(|err| CodecError::Json(err.to_string()))?;
    request.into_signing_request()
}

/// Encodes a response body.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when serialization fails.
pub fn encode_response(response: &IssuanceResponse) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(response).map_err(|err| CodecError::Encode(err.to_string()))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Wire codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The body was not a valid CIEPS request.
    #[error("invalid request json: {0}")]
    Json(String),
    /// `user_request_key_values.csr` was absent or not a string.
    #[error("request carries no csr")]
    MissingCsr,
    /// The CSR could not be parsed or verified.
    #[error(transparent)]
    Csr(#[from] CsrError),
    /// The response could not be serialized.
    #[error("response encoding failed: {0}")]
    Encode(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
