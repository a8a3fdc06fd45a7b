// crates/cieps-gate-server/src/audit.rs
// ============================================================================
// Module: Server Audit Logging
// Description: Structured audit events for transport failures and posture.
// Purpose: Emit JSON-line audit records alongside issuance decisions.
// Dependencies: cieps-gate-core, serde
// ============================================================================

//! ## Overview
//! Server sinks extend the core [`IssuanceAuditSink`] with transport and
//! security posture events, so one sink receives every record the gate
//! emits. Sinks write one JSON object per line and never fail the request
//! that produced the event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use cieps_gate_core::IssuanceAuditEvent;
use cieps_gate_core::IssuanceAuditSink;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit payload for a request rejected before the decision service ran.
#[derive(Debug, Clone, Serialize)]
pub struct TransportAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP status returned to the caller.
    pub status: u16,
    /// Normalized error kind label.
    pub kind: &'static str,
    /// Error detail.
    pub message: String,
    /// Request body size in bytes.
    pub request_bytes: usize,
}

/// Inputs required to construct a transport audit event.
pub struct TransportAuditEventParams {
    /// HTTP status returned to the caller.
    pub status: u16,
    /// Normalized error kind label.
    pub kind: &'static str,
    /// Error detail.
    pub message: String,
    /// Request body size in bytes.
    pub request_bytes: usize,
}

/// Security posture audit payload emitted at startup.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Posture kind label.
    pub kind: &'static str,
    /// Human-readable warning.
    pub message: String,
    /// Listen address.
    pub bind: String,
    /// Whether the listener uses TLS.
    pub tls: bool,
}

/// Inputs required to construct a security audit event.
pub struct SecurityAuditEventParams {
    /// Posture kind label.
    pub kind: &'static str,
    /// Human-readable warning.
    pub message: String,
    /// Listen address.
    pub bind: String,
    /// Whether the listener uses TLS.
    pub tls: bool,
}

impl TransportAuditEvent {
    /// Creates a new transport audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: TransportAuditEventParams) -> Self {
        Self {
            event: "transport_error",
            timestamp_ms: now_ms(),
            status: params.status,
            kind: params.kind,
            message: params.message,
            request_bytes: params.request_bytes,
        }
    }
}

impl SecurityAuditEvent {
    /// Creates a new security audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: SecurityAuditEventParams) -> Self {
        Self {
            event: "security_audit",
            timestamp_ms: now_ms(),
            kind: params.kind,
            message: params.message,
            bind: params.bind,
            tls: params.tls,
        }
    }
}

/// Milliseconds since the unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for every event the server emits.
pub trait ServerAuditSink: IssuanceAuditSink {
    /// Record a transport failure.
    fn record_transport(&self, _event: &TransportAuditEvent) {}

    /// Record a security posture warning.
    fn record_security(&self, _event: &SecurityAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event line.
    fn write_line(event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl IssuanceAuditSink for StderrAuditSink {
    fn record_issuance(&self, event: &IssuanceAuditEvent) {
        Self::write_line(event);
    }
}

impl ServerAuditSink for StderrAuditSink {
    fn record_transport(&self, event: &TransportAuditEvent) {
        Self::write_line(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        Self::write_line(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event line.
    fn write_line(&self, event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl IssuanceAuditSink for FileAuditSink {
    fn record_issuance(&self, event: &IssuanceAuditEvent) {
        self.write_line(event);
    }
}

impl ServerAuditSink for FileAuditSink {
    fn record_transport(&self, event: &TransportAuditEvent) {
        self.write_line(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl IssuanceAuditSink for NoopAuditSink {
    fn record_issuance(&self, _event: &IssuanceAuditEvent) {}
}

impl ServerAuditSink for NoopAuditSink {}

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

    use serde_json::Value;

    use super::FileAuditSink;
    use super::SecurityAuditEvent;
    use super::SecurityAuditEventParams;
    use super::ServerAuditSink;
    use super::TransportAuditEvent;
    use super::TransportAuditEventParams;

    #[test]
    fn file_sink_appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).expect("sink");
        sink.record_transport(&TransportAuditEvent::new(TransportAuditEventParams {
            status: 415,
            kind: "unsupported_media_type",
            message: "expected application/json".to_string(),
            request_bytes: 0,
        }));
        sink.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
            kind: "plaintext_listener",
            message: "listener is not using tls".to_string(),
            bind: "127.0.0.1:8443".to_string(),
            tls: false,
        }));

        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<Value> =
            content.lines().map(|line| serde_json::from_str(line).expect("json line")).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "transport_error");
        assert_eq!(lines[0]["status"], 415);
        assert_eq!(lines[1]["event"], "security_audit");
        assert_eq!(lines[1]["kind"], "plaintext_listener");
        assert_eq!(lines[1]["tls"], false);
    }

    #[test]
    fn file_sink_reopens_in_append_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        let event = TransportAuditEvent::new(TransportAuditEventParams {
            status: 400,
            kind: "invalid_request",
            message: "bad".to_string(),
            request_bytes: 3,
        });
        FileAuditSink::new(&path).expect("first").record_transport(&event);
        FileAuditSink::new(&path).expect("second").record_transport(&event);
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content.lines().count(), 2);
    }
}
