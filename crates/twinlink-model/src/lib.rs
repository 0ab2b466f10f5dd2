//! ---
//! twl_section: "01-twin-model"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Typed values, element references, and element value mapping."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod datatype;
pub mod element;
pub mod element_value;
pub mod mapper;
pub mod reference;
pub mod typing;
pub mod value;

/// Shared result type for model operations.
pub type Result<T> = std::result::Result<T, ValueError>;

/// Errors raised when parsing, mapping, or projecting twin element values.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// A textual or wire value could not be parsed into the requested datatype.
    #[error("value format error: {0}")]
    Format(String),
    /// A value could not be applied to an element without losing information.
    #[error("value mapping error: {0}")]
    Mapping(String),
    /// No element/value mapping is registered for the element kind.
    #[error("unsupported element kind: {0}")]
    UnsupportedElementKind(ElementKind),
}

pub use datatype::Datatype;
pub use element::{Element, ElementKind, EntityType, OperationVariable};
pub use element_value::{ElementValue, ValueKind};
pub use mapper::{element_kind_for, set_value, to_value, to_value_opt, value_kind_for};
pub use reference::{ElementReference, Key, KeyId, KeyKind};
pub use typing::{StaticTypeInformation, TypeInfo, TypeInformation};
pub use value::TypedValue;
