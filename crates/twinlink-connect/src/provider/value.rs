//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;
use twinlink_model::{ElementReference, ElementValue, TypeInformation, ValueError};

use crate::config::{merge_headers, ValueProviderConfig};
use crate::format::{self, Format, FragmentSpec};
use crate::provider::AssetValueProvider;
use crate::transport::{Transport, WireRequest};
use crate::{template, AssetConnectionError, Result};

const VALUE_PLACEHOLDER: &str = "value";
const FRAGMENT: &str = "value";

/// Value provider translating reads and writes into wire requests through a
/// configurable payload codec.
pub struct WireValueProvider {
    transport: Arc<dyn Transport>,
    reference: ElementReference,
    config: ValueProviderConfig,
    headers: IndexMap<String, String>,
    format: Arc<dyn Format>,
    specs: IndexMap<String, FragmentSpec>,
}

impl WireValueProvider {
    /// Build a provider for one element reference.
    ///
    /// Resolves the codec and the expected value shape up front; an unknown
    /// codec key, an unresolvable reference, or a template with placeholders
    /// other than `${value}` is a configuration error.
    pub fn new(
        transport: Arc<dyn Transport>,
        reference: ElementReference,
        config: ValueProviderConfig,
        connection_headers: &IndexMap<String, String>,
        type_information: &dyn TypeInformation,
    ) -> Result<WireValueProvider> {
        let format = format::for_key(&config.format)?;
        let type_info = type_information.type_info(&reference)?;
        if let Some(template) = &config.template {
            for name in template::placeholders(template) {
                if name != VALUE_PLACEHOLDER {
                    return Err(AssetConnectionError::Configuration(format!(
                        "value template for {reference} uses unknown placeholder ${{{name}}}"
                    )));
                }
            }
        }
        let specs = IndexMap::from([(
            FRAGMENT.to_owned(),
            FragmentSpec {
                query: config.query.clone(),
                type_info,
            },
        )]);
        Ok(WireValueProvider {
            transport,
            headers: merge_headers(connection_headers, &config.headers),
            reference,
            config,
            format,
            specs,
        })
    }

    fn check_status(&self, status: u16, action: &str) -> Result<()> {
        if (200..300).contains(&status) {
            return Ok(());
        }
        Err(AssetConnectionError::Connection(format!(
            "{action} of {} answered with status {status}",
            self.reference
        )))
    }
}

#[async_trait]
impl AssetValueProvider for WireValueProvider {
    async fn read(&self) -> Result<ElementValue> {
        let request = WireRequest::new(self.config.read_method, &self.config.path)
            .with_headers(self.headers.clone());
        let response = self.transport.execute(request).await?;
        self.check_status(response.status, "read")?;
        let mut values = self.format.read(&response.body, &self.specs)?;
        values.shift_remove(FRAGMENT).ok_or_else(|| {
            ValueError::Mapping(format!("no value decoded for {}", self.reference)).into()
        })
    }

    async fn write(&self, value: &ElementValue) -> Result<()> {
        let rendered = self.format.write(value)?;
        let body = match &self.config.template {
            Some(tpl) => template::render(
                tpl,
                &IndexMap::from([(VALUE_PLACEHOLDER.to_owned(), rendered)]),
            ),
            None => rendered,
        };
        let mut headers = self.headers.clone();
        headers.insert("Content-Type".to_owned(), self.format.mime_type().to_owned());
        let request = WireRequest::new(self.config.write_method, &self.config.path)
            .with_headers(headers)
            .with_body(body.into_bytes());
        let response = self.transport.execute(request).await?;
        self.check_status(response.status, "write")?;
        debug!(reference = %self.reference, "value written");
        Ok(())
    }
}
