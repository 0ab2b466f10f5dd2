//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Payload codecs. A [`Format`] translates between raw wire payloads and
//! typed element values; providers stay codec-agnostic and resolve their
//! codec by key from the registry.

use std::sync::Arc;

use indexmap::IndexMap;
use twinlink_model::{ElementValue, TypeInfo};

use crate::{AssetConnectionError, Result};

mod json;

pub use json::JsonFormat;

/// Extraction instruction for one named fragment of a payload: where to find
/// it and what shape to decode it into.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpec {
    /// Codec-specific extraction expression; `None` selects the whole
    /// payload.
    pub query: Option<String>,
    /// Expected shape of the decoded fragment.
    pub type_info: TypeInfo,
}

impl FragmentSpec {
    /// Spec selecting the whole payload.
    pub fn whole(type_info: TypeInfo) -> FragmentSpec {
        FragmentSpec {
            query: None,
            type_info,
        }
    }

    /// Spec selecting one fragment by extraction expression.
    pub fn query(query: impl Into<String>, type_info: TypeInfo) -> FragmentSpec {
        FragmentSpec {
            query: Some(query.into()),
            type_info,
        }
    }
}

/// Bidirectional payload codec.
///
/// `read` decodes named fragments out of one payload; `write` renders a
/// single element value into the codec's canonical text form, suitable for
/// direct sending or for template substitution.
pub trait Format: Send + Sync {
    /// Registry key, e.g. `JSON`.
    fn key(&self) -> &'static str;

    /// Content type announced on outbound requests.
    fn mime_type(&self) -> &'static str;

    /// Decode the fragments named by `specs` out of `payload`.
    ///
    /// Fails when a query selects nothing or more than one node, or when a
    /// fragment does not match its expected shape.
    fn read(
        &self,
        payload: &[u8],
        specs: &IndexMap<String, FragmentSpec>,
    ) -> Result<IndexMap<String, ElementValue>>;

    /// Render `value` into the codec's canonical text form.
    fn write(&self, value: &ElementValue) -> Result<String>;
}

/// Resolve a codec by its registry key. Keys are matched case-sensitively.
pub fn for_key(key: &str) -> Result<Arc<dyn Format>> {
    match key {
        "JSON" => Ok(Arc::new(JsonFormat::new())),
        other => Err(AssetConnectionError::Configuration(format!(
            "unknown format {other:?}, supported: JSON"
        ))),
    }
}
