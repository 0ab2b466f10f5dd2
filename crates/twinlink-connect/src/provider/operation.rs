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
use twinlink_model::{
    mapper, ElementReference, OperationVariable, TypeInfo, TypeInformation, ValueError,
};

use crate::config::{merge_headers, OperationProviderConfig};
use crate::format::{self, Format, FragmentSpec};
use crate::provider::AssetOperationProvider;
use crate::transport::{Transport, WireRequest};
use crate::{template, AssetConnectionError, Result};

/// Operation provider translating invocations into one wire request each.
///
/// Input and inout parameter values are substituted into the payload
/// template and the path; output and inout parameters are extracted from the
/// response via the per-parameter queries of the configuration.
pub struct WireOperationProvider {
    transport: Arc<dyn Transport>,
    reference: ElementReference,
    config: OperationProviderConfig,
    headers: IndexMap<String, String>,
    format: Arc<dyn Format>,
    outputs: Vec<OperationVariable>,
}

impl WireOperationProvider {
    /// Build a provider for one operation reference.
    ///
    /// Template and path placeholders are checked against the operation's
    /// declared input and inout parameters; an unknown placeholder is a
    /// configuration error, caught at registration instead of at the first
    /// invocation.
    pub fn new(
        transport: Arc<dyn Transport>,
        reference: ElementReference,
        config: OperationProviderConfig,
        connection_headers: &IndexMap<String, String>,
        type_information: &dyn TypeInformation,
    ) -> Result<WireOperationProvider> {
        let format = format::for_key(&config.format)?;
        let inputs = type_information.operation_inputs(&reference);
        let outputs = type_information.operation_outputs(&reference);
        let mut referenced = config.template.as_deref().map(template::placeholders).unwrap_or_default();
        referenced.extend(template::placeholders(&config.path));
        for name in referenced {
            if !inputs.iter().any(|variable| variable.name() == name) {
                return Err(AssetConnectionError::Configuration(format!(
                    "operation template for {reference} uses placeholder ${{{name}}} \
                     but the operation declares no such input"
                )));
            }
        }
        Ok(WireOperationProvider {
            transport,
            headers: merge_headers(connection_headers, &config.headers),
            reference,
            config,
            format,
            outputs,
        })
    }

    fn replacements(
        &self,
        inputs: &[OperationVariable],
        inoutputs: &[OperationVariable],
    ) -> Result<IndexMap<String, String>> {
        let mut replacements = IndexMap::new();
        for variable in inputs.iter().chain(inoutputs) {
            let name = variable.name().to_owned();
            if replacements.contains_key(&name) {
                return Err(ValueError::Mapping(format!(
                    "operation {} received parameter {name:?} more than once",
                    self.reference
                ))
                .into());
            }
            let value = mapper::to_value(&variable.element)?;
            replacements.insert(name, self.format.write(&value)?);
        }
        Ok(replacements)
    }

    /// Extraction specs for the response: every declared output, plus every
    /// inout a query is configured for.
    fn response_specs(
        &self,
        inoutputs: &[OperationVariable],
    ) -> Result<IndexMap<String, FragmentSpec>> {
        let mut specs = IndexMap::new();
        for variable in &self.outputs {
            specs.insert(
                variable.name().to_owned(),
                FragmentSpec {
                    query: self.config.queries.get(variable.name()).cloned(),
                    type_info: TypeInfo::of(&variable.element)?,
                },
            );
        }
        for variable in inoutputs {
            if let Some(query) = self.config.queries.get(variable.name()) {
                specs.insert(
                    variable.name().to_owned(),
                    FragmentSpec {
                        query: Some(query.clone()),
                        type_info: TypeInfo::of(&variable.element)?,
                    },
                );
            }
        }
        Ok(specs)
    }
}

#[async_trait]
impl AssetOperationProvider for WireOperationProvider {
    async fn invoke(
        &self,
        inputs: &[OperationVariable],
        inoutputs: &mut [OperationVariable],
    ) -> Result<Vec<OperationVariable>> {
        let replacements = self.replacements(inputs, inoutputs)?;
        let path = template::render(&self.config.path, &replacements);
        let mut headers = self.headers.clone();
        let mut request = WireRequest::new(self.config.method, path);
        if let Some(tpl) = &self.config.template {
            headers.insert("Content-Type".to_owned(), self.format.mime_type().to_owned());
            request = request.with_body(template::render(tpl, &replacements).into_bytes());
        }
        let response = self.transport.execute(request.with_headers(headers)).await?;
        if !response.is_success() {
            return Err(AssetConnectionError::Connection(format!(
                "invocation of {} answered with status {}",
                self.reference, response.status
            )));
        }
        debug!(reference = %self.reference, "operation invoked");

        let specs = self.response_specs(inoutputs)?;
        if specs.is_empty() {
            return Ok(Vec::new());
        }
        let mut values = self.format.read(&response.body, &specs)?;
        let mut results = self.outputs.clone();
        for variable in &mut results {
            let value = values.shift_remove(variable.name()).ok_or_else(|| {
                ValueError::Mapping(format!(
                    "response carries no value for declared output {:?}",
                    variable.name()
                ))
            })?;
            mapper::set_value(&mut variable.element, &value)?;
        }
        for variable in inoutputs {
            if let Some(value) = values.shift_remove(variable.name()) {
                mapper::set_value(&mut variable.element, &value)?;
            }
        }
        Ok(results)
    }
}
