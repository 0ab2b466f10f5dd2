//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Immutable provider and connection configuration. Every record is produced
//! by a validating constructor that rejects bad input up front; there are no
//! mutable builders.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use twinlink_model::ElementReference;
use url::Url;

use crate::{AssetConnectionError, Result};

/// Smallest poll interval a subscription provider accepts.
pub const MINIMUM_INTERVAL: Duration = Duration::from_millis(100);

/// Default request timeout for a connection.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Request verb for request/response-shaped transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read without side effects.
    Get,
    /// Replace the addressed state.
    Put,
    /// Submit a payload / invoke.
    Post,
    /// Partially update the addressed state.
    Patch,
    /// Remove the addressed state.
    Delete,
}

impl Method {
    /// Canonical verb string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// Username/password pair sent with every request of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    /// Account name.
    pub username: String,
    /// Account secret.
    pub password: String,
}

/// TLS trust material policy for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TrustPolicy {
    /// Verify against the platform root store.
    SystemRoots,
    /// Verify against a private trust store on disk.
    TrustStore {
        /// Path of the trust-store file (PEM bundle).
        path: PathBuf,
        /// Password protecting the store, where the format requires one.
        password: String,
    },
    /// Pin the first certificate the peer presents into the trust store at
    /// `store`; any later certificate change fails the connection.
    TrustOnFirstUse {
        /// Path of the fingerprint store file, one store per peer endpoint.
        store: PathBuf,
    },
}

impl Default for TrustPolicy {
    fn default() -> Self {
        TrustPolicy::SystemRoots
    }
}

fn require_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AssetConnectionError::Configuration(
            "provider path must not be empty".into(),
        ));
    }
    Ok(())
}

fn require_format(format: &str) -> Result<()> {
    // Fails fast on unknown codec keys; the codec itself is resolved again
    // at provider construction.
    crate::format::for_key(format).map(|_| ())
}

/// Settings of one value provider (read/write capability).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueProviderConfig {
    /// Path/topic relative to the connection's base address.
    pub path: String,
    /// Verb used by `read`.
    #[serde(default = "ValueProviderConfig::default_read_method")]
    pub read_method: Method,
    /// Verb used by `write`.
    #[serde(default = "ValueProviderConfig::default_write_method")]
    pub write_method: Method,
    /// Provider-level headers; win over connection-level ones on conflict.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Codec identifier, e.g. `JSON`.
    pub format: String,
    /// Codec-specific extraction expression; absent means whole payload.
    #[serde(default)]
    pub query: Option<String>,
    /// Outbound payload template with `${value}` placeholders; absent means
    /// the canonical rendered value is sent directly.
    #[serde(default)]
    pub template: Option<String>,
}

impl ValueProviderConfig {
    fn default_read_method() -> Method {
        Method::Get
    }

    fn default_write_method() -> Method {
        Method::Put
    }

    /// Validating constructor.
    pub fn new(path: impl Into<String>, format: impl Into<String>) -> Result<ValueProviderConfig> {
        let path = path.into();
        let format = format.into();
        require_path(&path)?;
        require_format(&format)?;
        Ok(ValueProviderConfig {
            path,
            read_method: Self::default_read_method(),
            write_method: Self::default_write_method(),
            headers: IndexMap::new(),
            format,
            query: None,
            template: None,
        })
    }

    /// Same record with an extraction query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Same record with an outbound template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Same record with an additional provider-level header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Same record with explicit read/write verbs.
    pub fn with_methods(mut self, read: Method, write: Method) -> Self {
        self.read_method = read;
        self.write_method = write;
        self
    }
}

/// Settings of one operation provider (invoke capability).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationProviderConfig {
    /// Path/topic relative to the connection's base address. May contain
    /// `${parameter}` placeholders substituted at invocation time.
    pub path: String,
    /// Verb used by `invoke`.
    #[serde(default = "OperationProviderConfig::default_method")]
    pub method: Method,
    /// Provider-level headers; win over connection-level ones on conflict.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Codec identifier, e.g. `JSON`.
    pub format: String,
    /// Outbound payload template with `${parameter}` placeholders; absent
    /// means an empty request body.
    #[serde(default)]
    pub template: Option<String>,
    /// Extraction expression per declared output/inout parameter name.
    #[serde(default)]
    pub queries: IndexMap<String, String>,
}

impl OperationProviderConfig {
    fn default_method() -> Method {
        Method::Post
    }

    /// Validating constructor.
    pub fn new(
        path: impl Into<String>,
        format: impl Into<String>,
    ) -> Result<OperationProviderConfig> {
        let path = path.into();
        let format = format.into();
        require_path(&path)?;
        require_format(&format)?;
        Ok(OperationProviderConfig {
            path,
            method: Self::default_method(),
            headers: IndexMap::new(),
            format,
            template: None,
            queries: IndexMap::new(),
        })
    }

    /// Same record with an outbound template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Same record with an extraction query for one parameter name.
    pub fn with_parameter_query(
        mut self,
        parameter: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        self.queries.insert(parameter.into(), query.into());
        self
    }

    /// Same record with an additional provider-level header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Same record with an explicit verb.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// Settings of one subscription provider (poll capability).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionProviderConfig {
    /// Path/topic relative to the connection's base address.
    pub path: String,
    /// Verb used by each poll tick.
    #[serde(default = "SubscriptionProviderConfig::default_method")]
    pub method: Method,
    /// Provider-level headers; win over connection-level ones on conflict.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Codec identifier, e.g. `JSON`.
    pub format: String,
    /// Codec-specific extraction expression; absent means whole payload.
    #[serde(default)]
    pub query: Option<String>,
    /// Static request payload sent with each tick, where the transport
    /// supports request bodies.
    #[serde(default)]
    pub payload: Option<String>,
    /// Poll interval in milliseconds; at least [`MINIMUM_INTERVAL`].
    pub interval_ms: u64,
}

impl SubscriptionProviderConfig {
    fn default_method() -> Method {
        Method::Get
    }

    /// Validating constructor.
    pub fn new(
        path: impl Into<String>,
        format: impl Into<String>,
        interval: Duration,
    ) -> Result<SubscriptionProviderConfig> {
        let path = path.into();
        let format = format.into();
        require_path(&path)?;
        require_format(&format)?;
        if interval < MINIMUM_INTERVAL {
            return Err(AssetConnectionError::Configuration(format!(
                "poll interval {}ms is below the minimum of {}ms",
                interval.as_millis(),
                MINIMUM_INTERVAL.as_millis()
            )));
        }
        Ok(SubscriptionProviderConfig {
            path,
            method: Self::default_method(),
            headers: IndexMap::new(),
            format,
            query: None,
            payload: None,
            interval_ms: interval.as_millis() as u64,
        })
    }

    /// Poll interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Same record with an extraction query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Same record with an additional provider-level header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Declarative provider registration carried inside a [`ConnectionConfig`];
/// applied when the connection connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRegistration<C> {
    /// Reference the provider is bound to.
    pub reference: ElementReference,
    /// Capability settings.
    pub config: C,
}

/// Settings of one asset connection: the transport endpoint plus the
/// providers declared up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base network address all provider paths are resolved against.
    pub base_url: Url,
    /// Headers shared by every request of this connection.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Optional basic credential pair.
    #[serde(default)]
    pub credentials: Option<BasicCredentials>,
    /// TLS trust material policy.
    #[serde(default)]
    pub trust: TrustPolicy,
    /// Per-request time budget in milliseconds.
    #[serde(default = "ConnectionConfig::default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Value providers registered at connect time.
    #[serde(default)]
    pub value_providers: Vec<ProviderRegistration<ValueProviderConfig>>,
    /// Operation providers registered at connect time.
    #[serde(default)]
    pub operation_providers: Vec<ProviderRegistration<OperationProviderConfig>>,
    /// Subscription providers registered at connect time.
    #[serde(default)]
    pub subscription_providers: Vec<ProviderRegistration<SubscriptionProviderConfig>>,
}

impl ConnectionConfig {
    fn default_timeout_ms() -> u64 {
        DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
    }

    /// Validating constructor.
    pub fn new(base_url: &str) -> Result<ConnectionConfig> {
        let base_url = Url::parse(base_url).map_err(|e| {
            AssetConnectionError::Configuration(format!("invalid base url {base_url:?}: {e}"))
        })?;
        Ok(ConnectionConfig {
            base_url,
            headers: IndexMap::new(),
            credentials: None,
            trust: TrustPolicy::default(),
            request_timeout_ms: Self::default_timeout_ms(),
            value_providers: Vec::new(),
            operation_providers: Vec::new(),
            subscription_providers: Vec::new(),
        })
    }

    /// Same record with an additional shared header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Same record with basic credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(BasicCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Same record with a trust policy.
    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    /// Request time budget as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Merge connection-level and provider-level headers; the provider-level
/// value wins on conflict.
pub fn merge_headers(
    connection: &IndexMap<String, String>,
    provider: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    let mut merged = connection.clone();
    for (name, value) in provider {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
