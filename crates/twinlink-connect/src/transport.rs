//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Wire transports. Providers speak [`WireRequest`]/[`WireResponse`] and
//! never touch a protocol client directly, so the same provider logic runs
//! against HTTP in production and against the in-memory transport in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use url::Url;

use crate::config::{ConnectionConfig, Method, TrustPolicy};
use crate::trust::{CertificateTrustHandler, PinnedCertificateVerifier};
use crate::{AssetConnectionError, Result};

/// Protocol-agnostic request a provider sends through a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    /// Request verb.
    pub method: Method,
    /// Path relative to the transport's base address.
    pub path: String,
    /// Headers for this request, already merged with connection-level ones.
    pub headers: IndexMap<String, String>,
    /// Request body, where the verb carries one.
    pub body: Option<Vec<u8>>,
}

impl WireRequest {
    /// Request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> WireRequest {
        WireRequest {
            method,
            path: path.into(),
            headers: IndexMap::new(),
            body: None,
        }
    }

    /// Same request with a body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Same request with merged headers attached.
    pub fn with_headers(mut self, headers: IndexMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Response a transport hands back to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// Protocol status code.
    pub status: u16,
    /// Raw response payload.
    pub body: Vec<u8>,
}

impl WireResponse {
    /// Successful response with a payload.
    pub fn ok(body: impl Into<Vec<u8>>) -> WireResponse {
        WireResponse {
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is in the success range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response wire transport behind an asset connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the underlying session. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Tear the session down. Idempotent; never fails on an already
    /// disconnected transport.
    async fn disconnect(&self) -> Result<()>;

    /// Execute one request and wait for its response.
    async fn execute(&self, request: WireRequest) -> Result<WireResponse>;

    /// Short transport name for log lines.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct InMemoryInner {
    scripted: VecDeque<WireResponse>,
    recorded: Vec<WireRequest>,
    connected: bool,
}

/// Scriptable transport for tests: responses are queued up front, every
/// executed request is recorded in order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    inner: Arc<Mutex<InMemoryInner>>,
}

impl InMemoryTransport {
    /// Empty transport; executing against it fails until responses are
    /// scripted.
    pub fn new() -> InMemoryTransport {
        InMemoryTransport::default()
    }

    /// Queue one response.
    pub fn script_response(&self, response: WireResponse) {
        self.inner.lock().scripted.push_back(response);
    }

    /// Queue the same successful payload `count` times.
    pub fn script_repeated(&self, body: &str, count: usize) {
        let mut inner = self.inner.lock();
        for _ in 0..count {
            inner.scripted.push_back(WireResponse::ok(body));
        }
    }

    /// Requests executed so far, in order.
    pub fn recorded(&self) -> Vec<WireRequest> {
        self.inner.lock().recorded.clone()
    }

    /// Number of requests executed so far.
    pub fn request_count(&self) -> usize {
        self.inner.lock().recorded.len()
    }

    /// Whether `connect` has been called without a later `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(&self) -> Result<()> {
        self.inner.lock().connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.lock().connected = false;
        Ok(())
    }

    async fn execute(&self, request: WireRequest) -> Result<WireResponse> {
        let mut inner = self.inner.lock();
        inner.recorded.push(request);
        inner.scripted.pop_front().ok_or_else(|| {
            AssetConnectionError::Connection("no scripted response left".into())
        })
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// HTTP transport backed by a shared [`reqwest::Client`].
///
/// The client is built lazily in `connect` so that trust-policy and timeout
/// settings of the connection apply before the first request.
pub struct HttpTransport {
    base_url: Url,
    config: ConnectionConfig,
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    /// Transport for the given connection settings.
    pub fn new(config: &ConnectionConfig) -> HttpTransport {
        HttpTransport {
            base_url: config.base_url.clone(),
            config: config.clone(),
            client: RwLock::new(None),
        }
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.config.request_timeout());
        match &self.config.trust {
            TrustPolicy::SystemRoots => {}
            TrustPolicy::TrustStore { path, .. } => {
                let pem = std::fs::read(path)?;
                let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    AssetConnectionError::Configuration(format!(
                        "trust store {} holds no usable certificate: {e}",
                        path.display()
                    ))
                })?;
                builder = builder
                    .tls_built_in_root_certs(false)
                    .add_root_certificate(certificate);
            }
            TrustPolicy::TrustOnFirstUse { store } => {
                let handler = CertificateTrustHandler::open(store.clone())?;
                let verifier = Arc::new(PinnedCertificateVerifier::new(handler));
                let provider = Arc::new(rustls::crypto::ring::default_provider());
                let tls = rustls::ClientConfig::builder_with_provider(provider)
                    .with_safe_default_protocol_versions()
                    .map_err(|e| {
                        AssetConnectionError::Configuration(format!("tls setup: {e}"))
                    })?
                    .dangerous()
                    .with_custom_certificate_verifier(verifier)
                    .with_no_client_auth();
                builder = builder.use_preconfigured_tls(tls);
            }
        }
        builder
            .build()
            .map_err(|e| AssetConnectionError::Configuration(format!("http client setup: {e}")))
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| {
            AssetConnectionError::Configuration(format!("invalid request path {path:?}: {e}"))
        })
    }

    fn to_reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> Result<()> {
        let mut client = self.client.write();
        if client.is_none() {
            *client = Some(self.build_client()?);
            debug!(base_url = %self.base_url, "http transport ready");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.client.write() = None;
        Ok(())
    }

    async fn execute(&self, request: WireRequest) -> Result<WireResponse> {
        let client = self.client.read().clone().ok_or_else(|| {
            AssetConnectionError::Connection("transport is not connected".into())
        })?;
        let url = self.resolve(&request.path)?;
        let mut builder = client.request(Self::to_reqwest_method(request.method), url);
        if let Some(credentials) = &self.config.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AssetConnectionError::Timeout(format!("{} {}: {e}", request.method.as_str(), request.path))
            } else {
                AssetConnectionError::Connection(e.to_string())
            }
        })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| AssetConnectionError::Connection(e.to_string()))?;
        Ok(WireResponse {
            status,
            body: body.to_vec(),
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
