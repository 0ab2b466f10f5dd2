//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Provider capability traits and their wire-backed implementations. One
//! provider serves exactly one element reference; the three capabilities are
//! independent and an embedder registers only the ones an asset supports.

use async_trait::async_trait;
use twinlink_model::{ElementValue, OperationVariable};

use crate::Result;

mod operation;
mod subscription;
mod value;

pub use operation::WireOperationProvider;
pub use subscription::PollingSubscriptionProvider;
pub use value::WireValueProvider;

/// Handle identifying one registered listener of a subscription provider.
pub type SubscriptionId = u64;

/// Callback receiving values produced by a subscription provider.
///
/// Invoked on the provider's poll task; implementations must not block.
pub trait NewDataListener: Send + Sync {
    /// Called once per delivered sample, in sampling order.
    fn on_new_data(&self, value: ElementValue);
}

/// Read/write access to the value of one asset element.
#[async_trait]
pub trait AssetValueProvider: Send + Sync {
    /// Fetch the current value from the asset.
    async fn read(&self) -> Result<ElementValue>;

    /// Push a new value to the asset.
    async fn write(&self, value: &ElementValue) -> Result<()>;
}

/// Invocation access to one asset operation.
#[async_trait]
pub trait AssetOperationProvider: Send + Sync {
    /// Invoke the operation with the given input parameters.
    ///
    /// `inoutputs` are read as additional inputs and updated in place where
    /// the asset reports them back. Returns the declared output parameters
    /// populated from the response.
    async fn invoke(
        &self,
        inputs: &[OperationVariable],
        inoutputs: &mut [OperationVariable],
    ) -> Result<Vec<OperationVariable>>;
}

/// Sampled access to the value of one asset element.
#[async_trait]
pub trait AssetSubscriptionProvider: Send + Sync {
    /// Register a listener; sampling starts with the first one.
    async fn add_listener(&self, listener: std::sync::Arc<dyn NewDataListener>)
        -> Result<SubscriptionId>;

    /// Deregister a listener; sampling stops when the last one is removed.
    async fn remove_listener(&self, id: SubscriptionId) -> Result<()>;

    /// Stop sampling and drop all listeners. Idempotent.
    async fn stop(&self) -> Result<()>;
}
