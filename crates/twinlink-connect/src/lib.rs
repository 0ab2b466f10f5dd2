//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod format;
pub mod manager;
pub mod provider;
pub mod template;
pub mod transport;
pub mod trust;

use twinlink_model::ValueError;

/// Shared result type for connectivity operations.
pub type Result<T> = std::result::Result<T, AssetConnectionError>;

/// Errors raised by asset connections and their providers.
#[derive(Debug, thiserror::Error)]
pub enum AssetConnectionError {
    /// Malformed or missing settings; detected at construction or
    /// registration and fatal there.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The transport endpoint is unreachable or answered outside the
    /// success range.
    #[error("connection error: {0}")]
    Connection(String),
    /// No response arrived within the configured budget.
    #[error("timeout: {0}")]
    Timeout(String),
    /// Extraction, coercion, or mapping of a payload value failed.
    #[error(transparent)]
    Value(#[from] ValueError),
    /// Trust-store file handling failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub use config::{
    BasicCredentials, ConnectionConfig, Method, OperationProviderConfig, ProviderRegistration,
    SubscriptionProviderConfig, TrustPolicy, ValueProviderConfig,
};
pub use connection::AssetConnection;
pub use format::{FragmentSpec, Format};
pub use manager::AssetConnectionManager;
pub use provider::{
    AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider, NewDataListener,
    SubscriptionId,
};
pub use transport::{HttpTransport, InMemoryTransport, Transport, WireRequest, WireResponse};
pub use trust::{
    CertificateTrustHandler, PinnedCertificateVerifier, SecureClient, TrustOnFirstUseClient,
};
