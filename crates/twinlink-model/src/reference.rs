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
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValueError;

/// Kind tag carried by each [`Key`] of an [`ElementReference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyKind {
    /// Root submodel of an element tree.
    Submodel,
    /// Single-value property element.
    Property,
    /// Min/max range element.
    Range,
    /// Localized-string element.
    MultiLanguageProperty,
    /// Binary blob element.
    Blob,
    /// File element.
    File,
    /// Reference element.
    ReferenceElement,
    /// Relationship element.
    RelationshipElement,
    /// Relationship element with named annotations.
    AnnotatedRelationshipElement,
    /// Entity element.
    Entity,
    /// Named-child collection element.
    Collection,
    /// Ordered-child list element.
    List,
    /// Remotely invocable operation element.
    Operation,
    /// Kind not known to the caller.
    Generic,
}

impl KeyKind {
    fn label(&self) -> &'static str {
        match self {
            KeyKind::Submodel => "Submodel",
            KeyKind::Property => "Property",
            KeyKind::Range => "Range",
            KeyKind::MultiLanguageProperty => "MultiLanguageProperty",
            KeyKind::Blob => "Blob",
            KeyKind::File => "File",
            KeyKind::ReferenceElement => "ReferenceElement",
            KeyKind::RelationshipElement => "RelationshipElement",
            KeyKind::AnnotatedRelationshipElement => "AnnotatedRelationshipElement",
            KeyKind::Entity => "Entity",
            KeyKind::Collection => "Collection",
            KeyKind::List => "List",
            KeyKind::Operation => "Operation",
            KeyKind::Generic => "Generic",
        }
    }

    fn from_label(label: &str) -> Option<KeyKind> {
        [
            KeyKind::Submodel,
            KeyKind::Property,
            KeyKind::Range,
            KeyKind::MultiLanguageProperty,
            KeyKind::Blob,
            KeyKind::File,
            KeyKind::ReferenceElement,
            KeyKind::RelationshipElement,
            KeyKind::AnnotatedRelationshipElement,
            KeyKind::Entity,
            KeyKind::Collection,
            KeyKind::List,
            KeyKind::Operation,
            KeyKind::Generic,
        ]
        .into_iter()
        .find(|kind| kind.label() == label)
    }
}

/// Identifying component of a [`Key`]: a stable name or a positional index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyId {
    /// Stable short name within the parent.
    Name(String),
    /// Position within an ordered-child list.
    Index(usize),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Name(name) => f.write_str(name),
            KeyId::Index(index) => write!(f, "{index}"),
        }
    }
}

/// One step of an [`ElementReference`] path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    /// Kind of the addressed node.
    pub kind: KeyKind,
    /// Name or index identifying the node within its parent.
    pub id: KeyId,
}

impl Key {
    /// Key addressing a named node.
    pub fn named(kind: KeyKind, name: impl Into<String>) -> Key {
        Key {
            kind,
            id: KeyId::Name(name.into()),
        }
    }

    /// Key addressing a positional node inside a list.
    pub fn indexed(kind: KeyKind, index: usize) -> Key {
        Key {
            kind,
            id: KeyId::Index(index),
        }
    }
}

/// Ordered path of typed keys addressing exactly one node in a twin's
/// element tree. Used as the unique lookup key for provider registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementReference {
    keys: Vec<Key>,
}

impl ElementReference {
    /// Reference built from a key path.
    pub fn new(keys: Vec<Key>) -> ElementReference {
        ElementReference { keys }
    }

    /// Shorthand for a `(Submodel)submodel / (kind)name` reference.
    pub fn submodel_element(
        submodel: impl Into<String>,
        kind: KeyKind,
        name: impl Into<String>,
    ) -> ElementReference {
        ElementReference::new(vec![
            Key::named(KeyKind::Submodel, submodel),
            Key::named(kind, name),
        ])
    }

    /// Keys of the path, root first.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Whether the reference addresses anything at all.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Reference extended with a named child key.
    pub fn child_name(&self, kind: KeyKind, name: impl Into<String>) -> ElementReference {
        let mut keys = self.keys.clone();
        keys.push(Key::named(kind, name));
        ElementReference::new(keys)
    }

    /// Reference extended with a positional child key.
    pub fn child_index(&self, kind: KeyKind, index: usize) -> ElementReference {
        let mut keys = self.keys.clone();
        keys.push(Key::indexed(kind, index));
        ElementReference::new(keys)
    }
}

impl fmt::Display for ElementReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "({}){}", key.kind.label(), key.id)?;
        }
        Ok(())
    }
}

impl FromStr for ElementReference {
    type Err = ValueError;

    /// Parse the path form produced by `Display`, e.g.
    /// `(Submodel)plant/(Property)temperature`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut keys = Vec::new();
        for part in s.split('/').filter(|part| !part.is_empty()) {
            let rest = part
                .strip_prefix('(')
                .ok_or_else(|| ValueError::Format(format!("malformed reference key: {part:?}")))?;
            let (label, id) = rest
                .split_once(')')
                .ok_or_else(|| ValueError::Format(format!("malformed reference key: {part:?}")))?;
            let kind = KeyKind::from_label(label)
                .ok_or_else(|| ValueError::Format(format!("unknown key kind: {label:?}")))?;
            // All-digit ids are positional; names are non-numeric by convention.
            let id = match id.parse::<usize>() {
                Ok(index) => KeyId::Index(index),
                Err(_) => KeyId::Name(id.to_owned()),
            };
            keys.push(Key { kind, id });
        }
        if keys.is_empty() {
            return Err(ValueError::Format(format!("empty reference: {s:?}")));
        }
        Ok(ElementReference::new(keys))
    }
}
