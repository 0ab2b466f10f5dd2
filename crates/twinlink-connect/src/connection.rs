//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! One asset connection: a transport session plus the providers bound to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use twinlink_model::{ElementReference, TypeInformation};

use crate::config::{
    ConnectionConfig, OperationProviderConfig, SubscriptionProviderConfig, ValueProviderConfig,
};
use crate::provider::{
    AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider,
    PollingSubscriptionProvider, WireOperationProvider, WireValueProvider,
};
use crate::transport::{HttpTransport, Transport};
use crate::{AssetConnectionError, Result};

/// Connection to one asset endpoint.
///
/// Holds the shared transport and three provider registries keyed by element
/// reference. Providers declared in the configuration are registered on
/// `connect`; further providers can be registered at any time.
pub struct AssetConnection {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    type_information: Arc<dyn TypeInformation>,
    connected: AtomicBool,
    value_providers: RwLock<IndexMap<ElementReference, Arc<dyn AssetValueProvider>>>,
    operation_providers: RwLock<IndexMap<ElementReference, Arc<dyn AssetOperationProvider>>>,
    subscription_providers: RwLock<IndexMap<ElementReference, Arc<dyn AssetSubscriptionProvider>>>,
}

impl AssetConnection {
    /// Connection over HTTP, the default transport.
    pub fn new(
        config: ConnectionConfig,
        type_information: Arc<dyn TypeInformation>,
    ) -> AssetConnection {
        let transport = Arc::new(HttpTransport::new(&config));
        Self::with_transport(config, transport, type_information)
    }

    /// Connection over an explicit transport; used with the in-memory
    /// transport in tests and by embedders bringing their own protocol.
    pub fn with_transport(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        type_information: Arc<dyn TypeInformation>,
    ) -> AssetConnection {
        AssetConnection {
            config,
            transport,
            type_information,
            connected: AtomicBool::new(false),
            value_providers: RwLock::new(IndexMap::new()),
            operation_providers: RwLock::new(IndexMap::new()),
            subscription_providers: RwLock::new(IndexMap::new()),
        }
    }

    /// Whether `connect` has completed without a later `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Establish the transport session and register all configured
    /// providers. Idempotent; a second call on a connected connection does
    /// nothing.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.transport.connect().await?;
        // On reconnect the providers from an earlier connect are still
        // registered and are kept as they are.
        for registration in self.config.value_providers.clone() {
            if !self.has_value_provider(&registration.reference) {
                self.register_value_provider(registration.reference, registration.config)?;
            }
        }
        for registration in self.config.operation_providers.clone() {
            if !self.has_operation_provider(&registration.reference) {
                self.register_operation_provider(registration.reference, registration.config)?;
            }
        }
        for registration in self.config.subscription_providers.clone() {
            if !self.has_subscription_provider(&registration.reference) {
                self.register_subscription_provider(registration.reference, registration.config)?;
            }
        }
        self.connected.store(true, Ordering::SeqCst);
        info!(base_url = %self.config.base_url, transport = self.transport.name(), "asset connection up");
        Ok(())
    }

    /// Stop all sampling and tear the transport session down. Idempotent.
    /// Registered providers survive a disconnect and resume working after
    /// the next `connect`.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let subscriptions: Vec<Arc<dyn AssetSubscriptionProvider>> =
            self.subscription_providers.read().values().cloned().collect();
        for provider in subscriptions {
            provider.stop().await?;
        }
        self.transport.disconnect().await?;
        info!(base_url = %self.config.base_url, "asset connection down");
        Ok(())
    }

    fn duplicate(&self, what: &str, reference: &ElementReference) -> AssetConnectionError {
        AssetConnectionError::Configuration(format!(
            "a {what} provider for {reference} is already registered on this connection"
        ))
    }

    /// Register a value provider for `reference`.
    ///
    /// Fails when the reference already has a value provider or when the
    /// provider configuration does not validate.
    pub fn register_value_provider(
        &self,
        reference: ElementReference,
        config: ValueProviderConfig,
    ) -> Result<()> {
        let mut providers = self.value_providers.write();
        if providers.contains_key(&reference) {
            return Err(self.duplicate("value", &reference));
        }
        let provider = WireValueProvider::new(
            self.transport.clone(),
            reference.clone(),
            config,
            &self.config.headers,
            self.type_information.as_ref(),
        )?;
        debug!(%reference, "value provider registered");
        providers.insert(reference, Arc::new(provider));
        Ok(())
    }

    /// Register an operation provider for `reference`.
    pub fn register_operation_provider(
        &self,
        reference: ElementReference,
        config: OperationProviderConfig,
    ) -> Result<()> {
        let mut providers = self.operation_providers.write();
        if providers.contains_key(&reference) {
            return Err(self.duplicate("operation", &reference));
        }
        let provider = WireOperationProvider::new(
            self.transport.clone(),
            reference.clone(),
            config,
            &self.config.headers,
            self.type_information.as_ref(),
        )?;
        debug!(%reference, "operation provider registered");
        providers.insert(reference, Arc::new(provider));
        Ok(())
    }

    /// Register a subscription provider for `reference`.
    pub fn register_subscription_provider(
        &self,
        reference: ElementReference,
        config: SubscriptionProviderConfig,
    ) -> Result<()> {
        let mut providers = self.subscription_providers.write();
        if providers.contains_key(&reference) {
            return Err(self.duplicate("subscription", &reference));
        }
        let provider = PollingSubscriptionProvider::new(
            self.transport.clone(),
            reference.clone(),
            config,
            &self.config.headers,
            self.type_information.as_ref(),
        )?;
        debug!(%reference, "subscription provider registered");
        providers.insert(reference, Arc::new(provider));
        Ok(())
    }

    /// Value provider bound to `reference`, if one is registered.
    pub fn value_provider(
        &self,
        reference: &ElementReference,
    ) -> Option<Arc<dyn AssetValueProvider>> {
        self.value_providers.read().get(reference).cloned()
    }

    /// Operation provider bound to `reference`, if one is registered.
    pub fn operation_provider(
        &self,
        reference: &ElementReference,
    ) -> Option<Arc<dyn AssetOperationProvider>> {
        self.operation_providers.read().get(reference).cloned()
    }

    /// Subscription provider bound to `reference`, if one is registered.
    pub fn subscription_provider(
        &self,
        reference: &ElementReference,
    ) -> Option<Arc<dyn AssetSubscriptionProvider>> {
        self.subscription_providers.read().get(reference).cloned()
    }

    /// Snapshot of all registered value providers.
    pub fn value_providers(&self) -> IndexMap<ElementReference, Arc<dyn AssetValueProvider>> {
        self.value_providers.read().clone()
    }

    /// Snapshot of all registered operation providers.
    pub fn operation_providers(
        &self,
    ) -> IndexMap<ElementReference, Arc<dyn AssetOperationProvider>> {
        self.operation_providers.read().clone()
    }

    /// Snapshot of all registered subscription providers.
    pub fn subscription_providers(
        &self,
    ) -> IndexMap<ElementReference, Arc<dyn AssetSubscriptionProvider>> {
        self.subscription_providers.read().clone()
    }

    /// Whether a value provider is registered for `reference`.
    pub fn has_value_provider(&self, reference: &ElementReference) -> bool {
        self.value_providers.read().contains_key(reference)
    }

    /// Whether an operation provider is registered for `reference`.
    pub fn has_operation_provider(&self, reference: &ElementReference) -> bool {
        self.operation_providers.read().contains_key(reference)
    }

    /// Whether a subscription provider is registered for `reference`.
    pub fn has_subscription_provider(&self, reference: &ElementReference) -> bool {
        self.subscription_providers.read().contains_key(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinlink_model::{Datatype, KeyKind, StaticTypeInformation, TypeInfo};

    use crate::transport::InMemoryTransport;

    fn reference(name: &str) -> ElementReference {
        ElementReference::submodel_element("plant", KeyKind::Property, name)
    }

    fn connection(transport: &InMemoryTransport) -> AssetConnection {
        let types = StaticTypeInformation::new()
            .with_type(reference("temperature"), TypeInfo::property(Datatype::Double));
        AssetConnection::with_transport(
            ConnectionConfig::new("http://assets.local/").unwrap(),
            Arc::new(transport.clone()),
            Arc::new(types),
        )
    }

    #[tokio::test]
    async fn connect_and_disconnect_are_idempotent() {
        let transport = InMemoryTransport::new();
        let connection = connection(&transport);
        assert!(!connection.is_connected());

        connection.connect().await.unwrap();
        connection.connect().await.unwrap();
        assert!(connection.is_connected());
        assert!(transport.is_connected());

        connection.disconnect().await.unwrap();
        connection.disconnect().await.unwrap();
        assert!(!connection.is_connected());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let connection = connection(&InMemoryTransport::new());
        let config = ValueProviderConfig::new("/v", "JSON").unwrap();
        connection
            .register_value_provider(reference("temperature"), config.clone())
            .unwrap();
        let result = connection.register_value_provider(reference("temperature"), config);
        assert!(matches!(result, Err(AssetConnectionError::Configuration(_))));
        assert!(connection.has_value_provider(&reference("temperature")));
    }

    #[tokio::test]
    async fn configured_providers_are_registered_on_connect() {
        let transport = InMemoryTransport::new();
        let types = StaticTypeInformation::new()
            .with_type(reference("temperature"), TypeInfo::property(Datatype::Double));
        let mut config = ConnectionConfig::new("http://assets.local/").unwrap();
        config.value_providers.push(crate::config::ProviderRegistration {
            reference: reference("temperature"),
            config: ValueProviderConfig::new("/v", "JSON").unwrap(),
        });
        let connection = AssetConnection::with_transport(
            config,
            Arc::new(transport.clone()),
            Arc::new(types),
        );
        assert!(!connection.has_value_provider(&reference("temperature")));
        connection.connect().await.unwrap();
        assert!(connection.has_value_provider(&reference("temperature")));

        // Reconnecting keeps the existing provider instead of failing on it.
        connection.disconnect().await.unwrap();
        connection.connect().await.unwrap();
        assert!(connection.has_value_provider(&reference("temperature")));
    }

    #[tokio::test]
    async fn registration_against_unknown_references_fails() {
        let connection = connection(&InMemoryTransport::new());
        let config = ValueProviderConfig::new("/v", "JSON").unwrap();
        let result = connection.register_value_provider(reference("unknown"), config);
        assert!(matches!(result, Err(AssetConnectionError::Value(_))));
    }
}
