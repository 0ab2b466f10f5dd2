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
use serde::{Deserialize, Serialize};

use crate::{Datatype, ElementReference, TypedValue};

/// Management style of an [`Element::Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    /// Entity managed together with its parent twin.
    CoManaged,
    /// Entity managed by its own twin, addressed by a global asset id.
    SelfManaged,
}

/// Kind tag of a domain [`Element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    /// Single typed value.
    Property,
    /// Min/max pair.
    Range,
    /// Localized-string set.
    MultiLanguageProperty,
    /// Byte blob plus mime type.
    Blob,
    /// External file plus mime type.
    File,
    /// Single reference.
    ReferenceElement,
    /// Reference pair.
    RelationshipElement,
    /// Reference pair with named annotation elements.
    AnnotatedRelationshipElement,
    /// Typed entity with named statement elements.
    Entity,
    /// Named-child collection.
    Collection,
    /// Ordered-child list.
    List,
    /// Remotely invocable operation; has no value projection.
    Operation,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ElementKind::Property => "Property",
            ElementKind::Range => "Range",
            ElementKind::MultiLanguageProperty => "MultiLanguageProperty",
            ElementKind::Blob => "Blob",
            ElementKind::File => "File",
            ElementKind::ReferenceElement => "ReferenceElement",
            ElementKind::RelationshipElement => "RelationshipElement",
            ElementKind::AnnotatedRelationshipElement => "AnnotatedRelationshipElement",
            ElementKind::Entity => "Entity",
            ElementKind::Collection => "Collection",
            ElementKind::List => "List",
            ElementKind::Operation => "Operation",
        };
        f.write_str(label)
    }
}

/// A domain element inside a modeled asset's twin.
///
/// Closed tagged variant over the supported element kinds; mapper dispatch
/// is a match over [`Element::kind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Single typed value.
    Property {
        /// Short name within the parent.
        id_short: String,
        /// Declared datatype; incoming values must match.
        datatype: Datatype,
        /// Current value, if any.
        value: Option<TypedValue>,
    },
    /// Min/max pair sharing one declared datatype.
    Range {
        /// Short name within the parent.
        id_short: String,
        /// Declared datatype of both bounds.
        datatype: Datatype,
        /// Lower bound.
        min: Option<TypedValue>,
        /// Upper bound.
        max: Option<TypedValue>,
    },
    /// Localized-string set keyed by language tag.
    MultiLanguageProperty {
        /// Short name within the parent.
        id_short: String,
        /// Language tag to text.
        values: IndexMap<String, String>,
    },
    /// Byte blob plus mime type.
    Blob {
        /// Short name within the parent.
        id_short: String,
        /// Mime type of the payload.
        mime_type: String,
        /// Raw payload.
        value: Vec<u8>,
    },
    /// External file plus mime type.
    File {
        /// Short name within the parent.
        id_short: String,
        /// Mime type of the file content.
        mime_type: String,
        /// Path or URI of the file.
        path: String,
    },
    /// Single reference to another element.
    ReferenceElement {
        /// Short name within the parent.
        id_short: String,
        /// Referenced element, if set.
        value: Option<ElementReference>,
    },
    /// Directed reference pair.
    RelationshipElement {
        /// Short name within the parent.
        id_short: String,
        /// Source of the relationship.
        first: ElementReference,
        /// Target of the relationship.
        second: ElementReference,
    },
    /// Directed reference pair with named annotation elements.
    AnnotatedRelationshipElement {
        /// Short name within the parent.
        id_short: String,
        /// Source of the relationship.
        first: ElementReference,
        /// Target of the relationship.
        second: ElementReference,
        /// Annotation elements keyed by short name.
        annotations: IndexMap<String, Element>,
    },
    /// Typed entity with named statement elements.
    Entity {
        /// Short name within the parent.
        id_short: String,
        /// Management style.
        entity_type: EntityType,
        /// Global asset id for self-managed entities.
        global_asset_id: Option<String>,
        /// Statement elements keyed by short name.
        statements: IndexMap<String, Element>,
    },
    /// Named-child collection; insertion order is preserved.
    Collection {
        /// Short name within the parent.
        id_short: String,
        /// Children keyed by short name.
        children: IndexMap<String, Element>,
    },
    /// Ordered-child list addressed by position.
    List {
        /// Short name within the parent.
        id_short: String,
        /// Positional children.
        items: Vec<Element>,
    },
    /// Remotely invocable operation with declared parameters.
    Operation {
        /// Short name within the parent.
        id_short: String,
        /// Declared input parameters.
        inputs: Vec<OperationVariable>,
        /// Declared output parameters.
        outputs: Vec<OperationVariable>,
        /// Declared in/out parameters.
        inoutputs: Vec<OperationVariable>,
    },
}

impl Element {
    /// Kind tag of the element. Total.
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Property { .. } => ElementKind::Property,
            Element::Range { .. } => ElementKind::Range,
            Element::MultiLanguageProperty { .. } => ElementKind::MultiLanguageProperty,
            Element::Blob { .. } => ElementKind::Blob,
            Element::File { .. } => ElementKind::File,
            Element::ReferenceElement { .. } => ElementKind::ReferenceElement,
            Element::RelationshipElement { .. } => ElementKind::RelationshipElement,
            Element::AnnotatedRelationshipElement { .. } => {
                ElementKind::AnnotatedRelationshipElement
            }
            Element::Entity { .. } => ElementKind::Entity,
            Element::Collection { .. } => ElementKind::Collection,
            Element::List { .. } => ElementKind::List,
            Element::Operation { .. } => ElementKind::Operation,
        }
    }

    /// Short name of the element within its parent.
    pub fn id_short(&self) -> &str {
        match self {
            Element::Property { id_short, .. }
            | Element::Range { id_short, .. }
            | Element::MultiLanguageProperty { id_short, .. }
            | Element::Blob { id_short, .. }
            | Element::File { id_short, .. }
            | Element::ReferenceElement { id_short, .. }
            | Element::RelationshipElement { id_short, .. }
            | Element::AnnotatedRelationshipElement { id_short, .. }
            | Element::Entity { id_short, .. }
            | Element::Collection { id_short, .. }
            | Element::List { id_short, .. }
            | Element::Operation { id_short, .. } => id_short,
        }
    }

    /// Convenience constructor for a property carrying a value.
    pub fn property(id_short: impl Into<String>, value: TypedValue) -> Element {
        Element::Property {
            id_short: id_short.into(),
            datatype: value.datatype(),
            value: Some(value),
        }
    }

    /// Convenience constructor for a property without a value yet.
    pub fn empty_property(id_short: impl Into<String>, datatype: Datatype) -> Element {
        Element::Property {
            id_short: id_short.into(),
            datatype,
            value: None,
        }
    }
}

/// Declared parameter of an [`Element::Operation`]: a named element acting
/// as the parameter's type template and value carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationVariable {
    /// Element carrying the parameter name, shape, and value.
    pub element: Element,
}

impl OperationVariable {
    /// Wrap an element as an operation parameter.
    pub fn new(element: Element) -> OperationVariable {
        OperationVariable { element }
    }

    /// Parameter name, taken from the element's short name.
    pub fn name(&self) -> &str {
        self.element.id_short()
    }
}
