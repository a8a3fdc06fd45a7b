// crates/cieps-gate-core/src/core/request.rs
// ============================================================================
// Module: Signing Requests
// Description: The validated input to one policy decision.
// Purpose: Bundle the parsed CSR with caller metadata.
// Dependencies: serde_json, crate::core
// ============================================================================

//! ## Overview
//! A [`SigningRequest`] is built once per call by the codec and read-only
//! afterwards. User fields are an open map; the gate only interprets the keys
//! it knows about.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::csr::ParsedCsr;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::IssuerRef;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User field carrying the requested common name.
pub const COMMON_NAME_FIELD: &str = "common_name";

// ============================================================================
// SECTION: Types
// ============================================================================

/// One certificate issuance request submitted for a policy decision.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningRequest {
    /// Decoded, signature-verified CSR.
    pub parsed_csr: ParsedCsr,
    /// Caller-supplied key/value fields.
    pub user_fields: Map<String, Value>,
    /// Issuer reference echoed into the response.
    pub issuer_ref: IssuerRef,
    /// Correlation identifier echoed into the response.
    pub correlation_id: CorrelationId,
}

impl SigningRequest {
    /// Creates a request with no user fields.
    #[must_use]
    pub fn new(
        parsed_csr: ParsedCsr,
        issuer_ref: IssuerRef,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            parsed_csr,
            user_fields: Map::new(),
            issuer_ref,
            correlation_id,
        }
    }

    /// Sets a user field, replacing any previous value.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user_fields.insert(key.into(), value.into());
        self
    }

    /// Returns the requested common name when it is a non-empty string.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.user_fields
            .get(COMMON_NAME_FIELD)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}
