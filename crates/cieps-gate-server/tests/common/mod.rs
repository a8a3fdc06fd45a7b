// crates/cieps-gate-server/tests/common/mod.rs
// =============================================================================
// Module: Server Test Helpers
// Description: Spawns a plaintext policy server and sends raw HTTP requests.
// Purpose: Share socket-level fixtures across transport integration tests.
// =============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    missing_docs,
    reason = "Test helpers are selectively used across suites."
)]

use std::net::SocketAddr;

use cieps_gate_config::GateConfig;
use cieps_gate_server::EVALUATE_ROUTE;
use cieps_gate_server::NoopAuditSink;
use cieps_gate_server::PolicyServer;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Request;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::KeyPair;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::net::TcpStream;

/// Running server handle.
pub struct TestServer {
    pub addr: SocketAddr,
    pub root_pem: String,
}

/// Starts a server with default configuration on an ephemeral loopback port.
pub async fn spawn_server() -> TestServer {
    spawn_with(GateConfig::default()).await
}

/// Starts a server with `config` on an ephemeral loopback port.
pub async fn spawn_with(config: GateConfig) -> TestServer {
    let server = PolicyServer::with_audit_sink(config, std::sync::Arc::new(NoopAuditSink))
        .expect("server");
    let root_pem = server.authority().get_or_create_root().expect("root").root().pem.clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(server.serve_listener(listener));
    TestServer {
        addr,
        root_pem,
    }
}

/// Generates a signed CSR PEM for `subject_cn` with optional DNS SANs.
pub fn csr_pem(subject_cn: &str, dns_names: &[&str]) -> String {
    let key = KeyPair::generate().expect("key");
    let names = dns_names.iter().map(|name| (*name).to_string()).collect::<Vec<_>>();
    let mut params = CertificateParams::new(names).expect("params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, subject_cn);
    params.distinguished_name = dn;
    params.serialize_request(&key).expect("csr").pem().expect("pem")
}

/// Builds a CIEPS request body.
pub fn cieps_body(csr: &str, common_name: Option<&str>) -> Vec<u8> {
    let mut user = json!({ "csr": csr });
    if let Some(name) = common_name {
        user["common_name"] = json!(name);
    }
    serde_json::to_vec(&json!({
        "request_version": 1,
        "request_uuid": "3a5e8f10-0000-4000-8000-0000000000c1",
        "synchronous": true,
        "user_request_key_values": user,
        "vault_request_values": {
            "policy_name": "default",
            "mount": "pki-external/",
            "ns": "root",
            "vault_node_cluster": "cluster-1",
            "vault_node_id": "node-1",
            "issuer_name": "external",
            "issuer_id": "6f0d3c55-issuer"
        }
    }))
    .expect("body")
}

/// Sends one POST to the evaluate route and returns status, content type, and body.
pub async fn post(
    addr: SocketAddr,
    content_type: &str,
    body: Vec<u8>,
) -> (StatusCode, String, Vec<u8>) {
    send("POST", addr, content_type, body).await
}

/// Sends one request with `method` to the evaluate route.
pub async fn send(
    method: &str,
    addr: SocketAddr,
    content_type: &str,
    body: Vec<u8>,
) -> (StatusCode, String, Vec<u8>) {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let (mut sender, connection) =
        hyper::client::conn::http1::handshake(TokioIo::new(stream)).await.expect("handshake");
    tokio::spawn(connection);
    let request = Request::builder()
        .method(method)
        .uri(EVALUATE_ROUTE)
        .header(HOST, addr.to_string())
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from(body)))
        .expect("request");
    let response = sender.send_request(request).await.expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, content_type, bytes.to_vec())
}

/// Parses a JSON response body.
pub fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("json body")
}
