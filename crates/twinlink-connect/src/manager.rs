//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Registry over all asset connections of one runtime. Lookup is by element
//! reference; the first connection carrying a provider for the reference
//! wins, and references are expected to be bound on at most one connection.

use std::sync::Arc;

use tracing::info;
use twinlink_model::ElementReference;

use crate::connection::AssetConnection;
use crate::provider::{AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider};
use crate::Result;

/// Registry and lifecycle driver for a set of asset connections.
#[derive(Default)]
pub struct AssetConnectionManager {
    connections: Vec<Arc<AssetConnection>>,
}

impl AssetConnectionManager {
    /// Empty registry.
    pub fn new() -> AssetConnectionManager {
        AssetConnectionManager::default()
    }

    /// Add a connection to the registry.
    pub fn add(&mut self, connection: Arc<AssetConnection>) {
        self.connections.push(connection);
    }

    /// All registered connections.
    pub fn connections(&self) -> &[Arc<AssetConnection>] {
        &self.connections
    }

    /// Connect every registered connection, stopping at the first failure.
    pub async fn connect_all(&self) -> Result<()> {
        for connection in &self.connections {
            connection.connect().await?;
        }
        info!(count = self.connections.len(), "asset connections up");
        Ok(())
    }

    /// Disconnect every registered connection, stopping at the first
    /// failure.
    pub async fn disconnect_all(&self) -> Result<()> {
        for connection in &self.connections {
            connection.disconnect().await?;
        }
        info!(count = self.connections.len(), "asset connections down");
        Ok(())
    }

    /// Value provider bound to `reference` on any connection.
    pub fn value_provider(
        &self,
        reference: &ElementReference,
    ) -> Option<Arc<dyn AssetValueProvider>> {
        self.connections
            .iter()
            .find_map(|connection| connection.value_provider(reference))
    }

    /// Operation provider bound to `reference` on any connection.
    pub fn operation_provider(
        &self,
        reference: &ElementReference,
    ) -> Option<Arc<dyn AssetOperationProvider>> {
        self.connections
            .iter()
            .find_map(|connection| connection.operation_provider(reference))
    }

    /// Subscription provider bound to `reference` on any connection.
    pub fn subscription_provider(
        &self,
        reference: &ElementReference,
    ) -> Option<Arc<dyn AssetSubscriptionProvider>> {
        self.connections
            .iter()
            .find_map(|connection| connection.subscription_provider(reference))
    }

    /// Whether any connection carries a value provider for `reference`.
    pub fn has_value_provider(&self, reference: &ElementReference) -> bool {
        self.value_provider(reference).is_some()
    }

    /// Whether any connection carries an operation provider for `reference`.
    pub fn has_operation_provider(&self, reference: &ElementReference) -> bool {
        self.operation_provider(reference).is_some()
    }

    /// Whether any connection carries a subscription provider for
    /// `reference`.
    pub fn has_subscription_provider(&self, reference: &ElementReference) -> bool {
        self.subscription_provider(reference).is_some()
    }
}
