//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Poll-based subscription provider. Sampling runs on one background task
//! per provider; the task starts with the first listener, stops with the
//! last one, and shuts down cooperatively through a watch channel.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use twinlink_model::{ElementReference, ElementValue, TypeInformation, ValueError};

use crate::config::{merge_headers, SubscriptionProviderConfig};
use crate::format::{self, Format, FragmentSpec};
use crate::provider::{AssetSubscriptionProvider, NewDataListener, SubscriptionId};
use crate::transport::{Transport, WireRequest};
use crate::{AssetConnectionError, Result};

const FRAGMENT: &str = "value";

struct Shared {
    transport: Arc<dyn Transport>,
    reference: ElementReference,
    config: SubscriptionProviderConfig,
    headers: IndexMap<String, String>,
    format: Arc<dyn Format>,
    specs: IndexMap<String, FragmentSpec>,
    listeners: parking_lot::Mutex<IndexMap<SubscriptionId, Arc<dyn NewDataListener>>>,
}

struct PollTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Control {
    next_id: SubscriptionId,
    task: Option<PollTask>,
}

/// Subscription provider sampling an element value at a fixed interval.
///
/// Every successful sample is delivered to every listener, in registration
/// order, whether or not the value changed. Failed samples are logged and
/// skipped; the schedule itself is unaffected by failures.
pub struct PollingSubscriptionProvider {
    shared: Arc<Shared>,
    control: tokio::sync::Mutex<Control>,
}

impl PollingSubscriptionProvider {
    /// Build a provider for one element reference.
    pub fn new(
        transport: Arc<dyn Transport>,
        reference: ElementReference,
        config: SubscriptionProviderConfig,
        connection_headers: &IndexMap<String, String>,
        type_information: &dyn TypeInformation,
    ) -> Result<PollingSubscriptionProvider> {
        let format = format::for_key(&config.format)?;
        let type_info = type_information.type_info(&reference)?;
        let specs = IndexMap::from([(
            FRAGMENT.to_owned(),
            FragmentSpec {
                query: config.query.clone(),
                type_info,
            },
        )]);
        Ok(PollingSubscriptionProvider {
            shared: Arc::new(Shared {
                transport,
                headers: merge_headers(connection_headers, &config.headers),
                reference,
                config,
                format,
                specs,
                listeners: parking_lot::Mutex::new(IndexMap::new()),
            }),
            control: tokio::sync::Mutex::new(Control {
                next_id: 0,
                task: None,
            }),
        })
    }

    async fn sample(shared: &Shared) -> Result<ElementValue> {
        let mut request = WireRequest::new(shared.config.method, &shared.config.path)
            .with_headers(shared.headers.clone());
        if let Some(payload) = &shared.config.payload {
            request = request.with_body(payload.clone().into_bytes());
        }
        let response = shared.transport.execute(request).await?;
        if !response.is_success() {
            return Err(AssetConnectionError::Connection(format!(
                "poll of {} answered with status {}",
                shared.reference, response.status
            )));
        }
        let mut values = shared.format.read(&response.body, &shared.specs)?;
        values.shift_remove(FRAGMENT).ok_or_else(|| {
            ValueError::Mapping(format!("no value decoded for {}", shared.reference)).into()
        })
    }

    fn spawn_poll_task(shared: Arc<Shared>) -> PollTask {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let period = shared.config.interval();
            // First sample one full interval after sampling starts; ticks
            // missed while a sample is in flight are skipped, keeping the
            // schedule fixed.
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(reference = %shared.reference, interval_ms = shared.config.interval_ms, "sampling started");
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticks.tick() => match Self::sample(&shared).await {
                        Ok(value) => {
                            let listeners: Vec<Arc<dyn NewDataListener>> =
                                shared.listeners.lock().values().cloned().collect();
                            for listener in listeners {
                                listener.on_new_data(value.clone());
                            }
                        }
                        Err(error) => {
                            warn!(reference = %shared.reference, %error, "poll tick failed");
                        }
                    },
                }
            }
            debug!(reference = %shared.reference, "sampling stopped");
        });
        PollTask { stop, handle }
    }

    async fn stop_task(task: PollTask) {
        // The task may already have exited; both results are fine.
        let _ = task.stop.send(true);
        let _ = task.handle.await;
    }
}

#[async_trait]
impl AssetSubscriptionProvider for PollingSubscriptionProvider {
    async fn add_listener(
        &self,
        listener: Arc<dyn NewDataListener>,
    ) -> Result<SubscriptionId> {
        let mut control = self.control.lock().await;
        let id = control.next_id;
        control.next_id += 1;
        self.shared.listeners.lock().insert(id, listener);
        if control.task.is_none() {
            control.task = Some(Self::spawn_poll_task(self.shared.clone()));
        }
        Ok(id)
    }

    async fn remove_listener(&self, id: SubscriptionId) -> Result<()> {
        let mut control = self.control.lock().await;
        let remaining = {
            let mut listeners = self.shared.listeners.lock();
            if listeners.shift_remove(&id).is_none() {
                return Err(AssetConnectionError::Configuration(format!(
                    "no listener {id} registered on {}",
                    self.shared.reference
                )));
            }
            listeners.len()
        };
        if remaining == 0 {
            if let Some(task) = control.task.take() {
                Self::stop_task(task).await;
            }
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut control = self.control.lock().await;
        if let Some(task) = control.task.take() {
            Self::stop_task(task).await;
        }
        self.shared.listeners.lock().clear();
        Ok(())
    }
}
