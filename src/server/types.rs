//! Request/response types, configuration, and the credential store for the
//! intentd server.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to (defaults to 127.0.0.1:8000; use 0.0.0.0 to expose externally)
    pub bind_addr: SocketAddr,
    /// Rate limit in requests per minute per IP (0 = no limit)
    pub rate_limit_rpm: u32,
    /// Path for JSONL access log
    pub access_log_path: String,
    /// Maximum access log file size in bytes before rotation (0 = no limit)
    pub max_access_log_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000"
                .parse()
                .expect("valid default bind address"),
            rate_limit_rpm: 60,
            access_log_path: "intentd-access.jsonl".to_string(),
            max_access_log_bytes: 50 * 1024 * 1024, // 50 MB
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("access_log_path", &self.access_log_path)
            .field("max_access_log_bytes", &self.max_access_log_bytes)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

/// Credential verification for the model-info endpoint.
///
/// Kept behind a trait so the static placeholder pair can be swapped for a
/// secrets-backed store without touching the HTTP layer.
pub trait CredentialStore: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Fixed username/password pair held in memory.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::new("admin", "password")
    }
}

impl CredentialStore for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        // Compare both fields unconditionally in constant time.
        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = password.as_bytes().ct_eq(self.password.as_bytes());
        bool::from(user_ok & pass_ok)
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request for single-text classification
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

/// Response for single-text classification
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub intent: String,
    pub confidence: f64,
}

/// Request for batch classification
#[derive(Debug, Deserialize)]
pub struct BatchQueryRequest {
    pub texts: Vec<String>,
}

/// One entry of the batch classification response, in input order.
#[derive(Debug, Serialize)]
pub struct BatchQueryResponseItem {
    pub text: String,
    pub intent: String,
    pub confidence: f64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Model introspection response (requires authentication)
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_name: String,
    pub vectorizer_type: String,
    pub num_classes: usize,
    pub classes: Vec<String>,
}

/// Error body shape shared by all failure responses.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
