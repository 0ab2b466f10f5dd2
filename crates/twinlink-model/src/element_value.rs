//! ---
//! twl_section: "01-twin-model"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Typed values, element references, and element value mapping."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;

use crate::{ElementReference, EntityType, TypedValue};

/// Kind tag of an [`ElementValue`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Single typed value.
    Single,
    /// Min/max pair.
    Range,
    /// Localized-string set.
    LangStrings,
    /// Byte blob plus mime type.
    Blob,
    /// File path plus mime type.
    File,
    /// Single reference.
    Reference,
    /// Reference pair.
    Relationship,
    /// Reference pair with named annotation values.
    AnnotatedRelationship,
    /// Entity with named statement values.
    Entity,
    /// Named-child collection.
    Collection,
    /// Ordered-child list.
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValueKind::Single => "Single",
            ValueKind::Range => "Range",
            ValueKind::LangStrings => "LangStrings",
            ValueKind::Blob => "Blob",
            ValueKind::File => "File",
            ValueKind::Reference => "Reference",
            ValueKind::Relationship => "Relationship",
            ValueKind::AnnotatedRelationship => "AnnotatedRelationship",
            ValueKind::Entity => "Entity",
            ValueKind::Collection => "Collection",
            ValueKind::List => "List",
        };
        f.write_str(label)
    }
}

/// Schema-free, value-only projection of a domain [`crate::Element`].
///
/// Carries no short names or declared datatypes of its own; structural
/// variants nest further element values keyed by name or position. This is
/// the shape providers exchange with wire payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Value of a property element.
    Single(TypedValue),
    /// Value of a range element.
    Range {
        /// Lower bound.
        min: Option<TypedValue>,
        /// Upper bound.
        max: Option<TypedValue>,
    },
    /// Value of a multi-language property: language tag to text.
    LangStrings(IndexMap<String, String>),
    /// Value of a blob element.
    Blob {
        /// Mime type of the payload.
        mime_type: String,
        /// Raw payload.
        value: Vec<u8>,
    },
    /// Value of a file element.
    File {
        /// Mime type of the file content.
        mime_type: String,
        /// Path or URI of the file.
        path: String,
    },
    /// Value of a reference element.
    Reference(Option<ElementReference>),
    /// Value of a relationship element.
    Relationship {
        /// Source of the relationship.
        first: ElementReference,
        /// Target of the relationship.
        second: ElementReference,
    },
    /// Value of an annotated relationship element.
    AnnotatedRelationship {
        /// Source of the relationship.
        first: ElementReference,
        /// Target of the relationship.
        second: ElementReference,
        /// Annotation values keyed by short name.
        annotations: IndexMap<String, ElementValue>,
    },
    /// Value of an entity element.
    Entity {
        /// Management style.
        entity_type: EntityType,
        /// Global asset id for self-managed entities.
        global_asset_id: Option<String>,
        /// Statement values keyed by short name.
        statements: IndexMap<String, ElementValue>,
    },
    /// Values of a collection element, keyed by child short name.
    Collection(IndexMap<String, ElementValue>),
    /// Values of a list element, by position.
    List(Vec<ElementValue>),
}

impl ElementValue {
    /// Kind tag of the value. Total.
    pub fn kind(&self) -> ValueKind {
        match self {
            ElementValue::Single(_) => ValueKind::Single,
            ElementValue::Range { .. } => ValueKind::Range,
            ElementValue::LangStrings(_) => ValueKind::LangStrings,
            ElementValue::Blob { .. } => ValueKind::Blob,
            ElementValue::File { .. } => ValueKind::File,
            ElementValue::Reference(_) => ValueKind::Reference,
            ElementValue::Relationship { .. } => ValueKind::Relationship,
            ElementValue::AnnotatedRelationship { .. } => ValueKind::AnnotatedRelationship,
            ElementValue::Entity { .. } => ValueKind::Entity,
            ElementValue::Collection(_) => ValueKind::Collection,
            ElementValue::List(_) => ValueKind::List,
        }
    }

    /// The typed value of a `Single` variant, if this is one.
    pub fn as_single(&self) -> Option<&TypedValue> {
        match self {
            ElementValue::Single(value) => Some(value),
            _ => None,
        }
    }
}

impl From<TypedValue> for ElementValue {
    fn from(value: TypedValue) -> ElementValue {
        ElementValue::Single(value)
    }
}
