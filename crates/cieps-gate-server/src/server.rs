// crates/cieps-gate-server/src/server.rs
// ============================================================================
// Module: Policy Server
// Description: HTTP and HTTPS transport for the CIEPS decision service.
// Purpose: Accept CIEPS requests on one route and return issuance decisions.
// Dependencies: cieps-gate-core, cieps-gate-config, axum, axum-server, http-body-util, tokio
// ============================================================================

//! ## Overview
//! The policy server exposes a single `POST /evaluate` route. Requests are
//! checked for media type and size, strictly decoded, and then handed to the
//! shared [`DecisionService`]. Every policy outcome is a `200` with a JSON
//! body; only transport-level failures use other status codes, with a short
//! `text/plain` body and a `transport_error` audit record.
//! Security posture: request bodies are untrusted; error bodies never echo
//! internal detail for server-side failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use axum_server::tls_rustls::RustlsConfig;
use cieps_gate_config::GateConfig;
use cieps_gate_config::ServerAuditConfig;
use cieps_gate_config::ServerTlsConfig;
use cieps_gate_core::CertificateAuthorityProvider;
use cieps_gate_core::DecisionError;
use cieps_gate_core::DecisionService;
use cieps_gate_core::IssuanceAuditSink;
use cieps_gate_core::PolicyEvaluator;
use http_body_util::LengthLimitError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::SecurityAuditEvent;
use crate::audit::SecurityAuditEventParams;
use crate::audit::ServerAuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::TransportAuditEvent;
use crate::audit::TransportAuditEventParams;
use crate::codec::CodecError;
use crate::codec::decode_request;
use crate::codec::encode_response;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Route accepting CIEPS requests.
pub const EVALUATE_ROUTE: &str = "/evaluate";
/// Media type accepted for requests and returned for decisions.
const JSON_MEDIA_TYPE: &str = "application/json";
/// Media type used for transport error bodies.
const TEXT_MEDIA_TYPE: &str = "text/plain; charset=utf-8";
/// Body returned for server-side failures.
const INTERNAL_ERROR_MESSAGE: &str = "internal error";

// ============================================================================
// SECTION: Policy Server
// ============================================================================

/// Policy server instance.
pub struct PolicyServer {
    /// Server configuration.
    config: GateConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

impl PolicyServer {
    /// Builds a server from configuration using the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration or initialization fails.
    pub fn from_config(config: GateConfig) -> Result<Self, ServerError> {
        let audit = build_audit_sink(&config.server.audit)?;
        Self::with_audit_sink(config, audit)
    }

    /// Builds a server from configuration with an explicit audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration or initialization fails.
    pub fn with_audit_sink(
        config: GateConfig,
        audit: Arc<dyn ServerAuditSink>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let authority = Arc::new(CertificateAuthorityProvider::new(config.authority_config()));
        if config.ca.eager_init {
            authority.get_or_create_root().map_err(|err| ServerError::Init(err.to_string()))?;
        }
        let issuance_audit: Arc<dyn IssuanceAuditSink> = audit.clone();
        let service = DecisionService::new(
            authority,
            PolicyEvaluator::new(config.policy_rules()),
            config.decision_service_config(),
        )
        .with_audit_sink(issuance_audit);
        emit_security_posture(&config, audit.as_ref());
        let state = Arc::new(ServerState {
            service,
            audit,
            max_body_bytes: config.server.max_body_bytes,
        });
        Ok(Self {
            config,
            state,
        })
    }

    /// Returns the shared certificate authority provider.
    #[must_use]
    pub fn authority(&self) -> &Arc<CertificateAuthorityProvider> {
        self.state.service.authority()
    }

    /// Returns the axum router serving [`EVALUATE_ROUTE`].
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Serves requests on the configured address, over TLS when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let app = self.router();
        match &self.config.server.tls {
            Some(tls) => serve_tls(addr, tls, app).await,
            None => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
                serve_plain(listener, app).await
            }
        }
    }

    /// Serves plaintext HTTP on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when serving fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        serve_plain(listener, app).await
    }
}

/// Selects the audit sink named by configuration.
fn build_audit_sink(config: &ServerAuditConfig) -> Result<Arc<dyn ServerAuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Records startup posture warnings.
fn emit_security_posture(config: &GateConfig, audit: &dyn ServerAuditSink) {
    let tls = config.server.tls.is_some();
    if !tls {
        audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
            kind: "plaintext_listener",
            message: "listener serves plaintext http; configure server.tls outside local testing"
                .to_string(),
            bind: config.server.bind.clone(),
            tls,
        }));
    }
    audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
        kind: "demo_certificate_authority",
        message: "certificates are signed by an ephemeral in-memory demonstration ca".to_string(),
        bind: config.server.bind.clone(),
        tls,
    }));
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Builds the router for the evaluate route.
fn build_router(state: Arc<ServerState>) -> Router {
    Router::new().route(EVALUATE_ROUTE, post(handle_evaluate)).with_state(state)
}

/// Serves plaintext HTTP.
async fn serve_plain(listener: TcpListener, app: Router) -> Result<(), ServerError> {
    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|_| ServerError::Transport("http server failed".to_string()))
}

/// Serves HTTPS with rustls.
async fn serve_tls(
    addr: SocketAddr,
    tls: &ServerTlsConfig,
    app: Router,
) -> Result<(), ServerError> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|err| ServerError::Init(format!("tls config load failed: {err}")))?;
    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service())
        .await
        .map_err(|_| ServerError::Transport("https server failed".to_string()))
}

/// Shared state for request handlers.
struct ServerState {
    /// Decision pipeline.
    service: DecisionService,
    /// Audit sink for transport events.
    audit: Arc<dyn ServerAuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

impl ServerState {
    /// Audits a transport failure and builds its response.
    fn reject(&self, error: &TransportError, request_bytes: usize) -> Response {
        let status = error.status();
        self.audit.record_transport(&TransportAuditEvent::new(TransportAuditEventParams {
            status: status.as_u16(),
            kind: error.kind(),
            message: error.to_string(),
            request_bytes,
        }));
        let headers = [(CONTENT_TYPE, HeaderValue::from_static(TEXT_MEDIA_TYPE))];
        (status, headers, error.public_message()).into_response()
    }
}

/// Handles `POST /evaluate`.
async fn handle_evaluate(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if !is_json_content_type(&headers) {
        return state.reject(&TransportError::UnsupportedMediaType, 0);
    }
    let limit = state.max_body_bytes;
    if let Some(declared) = declared_length(&headers)
        && declared > limit
    {
        return state.reject(
            &TransportError::PayloadTooLarge {
                limit,
            },
            declared,
        );
    }
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) if exceeds_length_limit(&err) => {
            return state.reject(
                &TransportError::PayloadTooLarge {
                    limit,
                },
                limit,
            );
        }
        Err(err) => return state.reject(&TransportError::BodyRead(err.to_string()), 0),
    };
    match evaluate_with_blocking(&state, &bytes) {
        Ok(payload) => {
            (StatusCode::OK, [(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE))], payload)
                .into_response()
        }
        Err(err) => state.reject(&err, bytes.len()),
    }
}

/// Returns true when the request declares a JSON body.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
}

/// Returns the declared `Content-Length`, when present and numeric.
fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

// ============================================================================
// SECTION: Request Handling
// ============================================================================

/// Runs the decision pipeline, shifting to a blocking context when available.
fn evaluate_with_blocking(state: &ServerState, body: &[u8]) -> Result<Vec<u8>, TransportError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| evaluate(state, body))
        }
        _ => evaluate(state, body),
    }
}

/// Decodes, decides, and encodes one request.
fn evaluate(state: &ServerState, body: &[u8]) -> Result<Vec<u8>, TransportError> {
    let request = decode_request(body).map_err(TransportError::Decode)?;
    let response = state.service.handle_request(&request)?;
    encode_response(&response).map_err(TransportError::Encode)
}

/// Returns true when a body read stopped at the size limit rather than on an
/// I/O or framing error.
fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures that end a request before a decision is returned.
#[derive(Debug, Error)]
enum TransportError {
    /// The request did not declare a JSON body.
    #[error("unsupported content type; expected application/json")]
    UnsupportedMediaType,
    /// The body exceeded the configured limit.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
    /// The body stream failed before it was fully read.
    #[error("request body could not be read: {0}")]
    BodyRead(String),
    /// The body or its CSR was invalid.
    #[error("invalid request: {0}")]
    Decode(CodecError),
    /// The decision service failed fatally.
    #[error(transparent)]
    Decision(#[from] DecisionError),
    /// The response could not be encoded.
    #[error("{0}")]
    Encode(CodecError),
}

impl TransportError {
    /// HTTP status for this failure.
    const fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge {
                ..
            } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Decision(_) | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Normalized kind label for audit records.
    const fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::PayloadTooLarge {
                ..
            } => "payload_too_large",
            Self::BodyRead(_) => "body_read_failed",
            Self::Decode(_) => "invalid_request",
            Self::Decision(_) => "authority_unavailable",
            Self::Encode(_) => "encoding_failed",
        }
    }

    /// Body returned to the caller.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

/// Policy server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
