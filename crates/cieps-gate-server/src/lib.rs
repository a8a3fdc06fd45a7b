// crates/cieps-gate-server/src/lib.rs
// ============================================================================
// Module: CIEPS Gate Server Library
// Description: HTTP transport, wire codec, and audit sinks for the CIEPS gate.
// Purpose: Expose the policy decision service over HTTP and HTTPS.
// Dependencies: cieps-gate-core, cieps-gate-config, axum
// ============================================================================

//! ## Overview
//! The server crate decodes CIEPS wire requests, hands them to the core
//! [`cieps_gate_core::DecisionService`], and encodes the JSON response.
//! Security posture: request bodies are untrusted and are size-limited and
//! strictly decoded before any policy logic runs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod codec;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::SecurityAuditEvent;
pub use audit::SecurityAuditEventParams;
pub use audit::ServerAuditSink;
pub use audit::StderrAuditSink;
pub use audit::TransportAuditEvent;
pub use audit::TransportAuditEventParams;
pub use codec::CiepsRequest;
pub use codec::CodecError;
pub use codec::VaultRequestValues;
pub use codec::decode_request;
pub use codec::encode_response;
pub use server::EVALUATE_ROUTE;
pub use server::PolicyServer;
pub use server::ServerError;
