//! ---
//! twl_section: "01-twin-model"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Typed values, element references, and element value mapping."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Expected-shape descriptions for wire fragments. Wire payloads carry no
//! schema; providers always obtain the expected shape from a
//! [`TypeInformation`] collaborator and never infer it from the response.

use indexmap::IndexMap;

use crate::element::ElementKind;
use crate::mapper::value_kind_for;
use crate::{Datatype, Element, ElementReference, OperationVariable, Result, ValueError, ValueKind};

/// Expected type and shape of an element value decoded from a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
    /// A non-structural value of the given kind; `datatype` applies to the
    /// `Single` and `Range` kinds.
    Value {
        /// Expected value kind.
        kind: ValueKind,
        /// Expected datatype of typed content.
        datatype: Datatype,
    },
    /// An annotated relationship with typed annotations.
    AnnotatedRelationship {
        /// Annotation shapes keyed by short name.
        annotations: IndexMap<String, TypeInfo>,
    },
    /// An entity with typed statements.
    Entity {
        /// Statement shapes keyed by short name.
        statements: IndexMap<String, TypeInfo>,
    },
    /// A named-child collection.
    Collection(IndexMap<String, TypeInfo>),
    /// An ordered-child list.
    List(Vec<TypeInfo>),
}

impl TypeInfo {
    /// Shorthand for a single-value property shape.
    pub fn property(datatype: Datatype) -> TypeInfo {
        TypeInfo::Value {
            kind: ValueKind::Single,
            datatype,
        }
    }

    /// Shorthand for a range shape.
    pub fn range(datatype: Datatype) -> TypeInfo {
        TypeInfo::Value {
            kind: ValueKind::Range,
            datatype,
        }
    }

    /// Extract the type information of a domain element.
    ///
    /// Fails with [`ValueError::UnsupportedElementKind`] for elements without
    /// a value projection.
    pub fn of(element: &Element) -> Result<TypeInfo> {
        match element {
            Element::Property { datatype, .. } => Ok(TypeInfo::property(*datatype)),
            Element::Range { datatype, .. } => Ok(TypeInfo::range(*datatype)),
            Element::MultiLanguageProperty { .. }
            | Element::Blob { .. }
            | Element::File { .. }
            | Element::ReferenceElement { .. }
            | Element::RelationshipElement { .. } => Ok(TypeInfo::Value {
                kind: value_kind_for(element.kind())?,
                datatype: Datatype::String,
            }),
            Element::AnnotatedRelationshipElement { annotations, .. } => {
                Ok(TypeInfo::AnnotatedRelationship {
                    annotations: Self::of_children(annotations)?,
                })
            }
            Element::Entity { statements, .. } => Ok(TypeInfo::Entity {
                statements: Self::of_children(statements)?,
            }),
            Element::Collection { children, .. } => {
                Ok(TypeInfo::Collection(Self::of_children(children)?))
            }
            Element::List { items, .. } => Ok(TypeInfo::List(
                items.iter().map(TypeInfo::of).collect::<Result<Vec<_>>>()?,
            )),
            Element::Operation { .. } => {
                Err(ValueError::UnsupportedElementKind(ElementKind::Operation))
            }
        }
    }

    fn of_children(children: &IndexMap<String, Element>) -> Result<IndexMap<String, TypeInfo>> {
        children
            .iter()
            .map(|(name, child)| Ok((name.clone(), TypeInfo::of(child)?)))
            .collect()
    }
}

/// Collaborator resolving expected shapes for element references.
///
/// Consumed by every provider; the framework never infers shape from the
/// wire.
pub trait TypeInformation: Send + Sync {
    /// Expected value shape of the element addressed by `reference`.
    fn type_info(&self, reference: &ElementReference) -> Result<TypeInfo>;

    /// Declared input and inout parameters of the operation addressed by
    /// `reference`. Empty when the operation declares none.
    fn operation_inputs(&self, reference: &ElementReference) -> Vec<OperationVariable>;

    /// Declared output parameters of the operation addressed by `reference`.
    /// Empty when the operation declares none.
    fn operation_outputs(&self, reference: &ElementReference) -> Vec<OperationVariable>;
}

/// Map-backed [`TypeInformation`] assembled up front; used by embedders and
/// tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeInformation {
    types: IndexMap<ElementReference, TypeInfo>,
    inputs: IndexMap<ElementReference, Vec<OperationVariable>>,
    outputs: IndexMap<ElementReference, Vec<OperationVariable>>,
}

impl StaticTypeInformation {
    /// Empty table.
    pub fn new() -> StaticTypeInformation {
        StaticTypeInformation::default()
    }

    /// Register the expected shape for a reference.
    pub fn with_type(mut self, reference: ElementReference, info: TypeInfo) -> Self {
        self.types.insert(reference, info);
        self
    }

    /// Register the shape of an existing element for a reference.
    pub fn with_element(self, reference: ElementReference, element: &Element) -> Result<Self> {
        let info = TypeInfo::of(element)?;
        Ok(self.with_type(reference, info))
    }

    /// Register the declared input and inout parameters of an operation
    /// reference.
    pub fn with_operation_inputs(
        mut self,
        reference: ElementReference,
        inputs: Vec<OperationVariable>,
    ) -> Self {
        self.inputs.insert(reference, inputs);
        self
    }

    /// Register the declared outputs of an operation reference.
    pub fn with_operation_outputs(
        mut self,
        reference: ElementReference,
        outputs: Vec<OperationVariable>,
    ) -> Self {
        self.outputs.insert(reference, outputs);
        self
    }
}

impl TypeInformation for StaticTypeInformation {
    fn type_info(&self, reference: &ElementReference) -> Result<TypeInfo> {
        self.types.get(reference).cloned().ok_or_else(|| {
            ValueError::Mapping(format!("no type information registered for {reference}"))
        })
    }

    fn operation_inputs(&self, reference: &ElementReference) -> Vec<OperationVariable> {
        self.inputs.get(reference).cloned().unwrap_or_default()
    }

    fn operation_outputs(&self, reference: &ElementReference) -> Vec<OperationVariable> {
        self.outputs.get(reference).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyKind, TypedValue};

    #[test]
    fn type_info_of_a_property_keeps_the_datatype() {
        let element = Element::property("count", TypedValue::Int(5));
        assert_eq!(
            TypeInfo::of(&element).unwrap(),
            TypeInfo::property(Datatype::Int)
        );
    }

    #[test]
    fn type_info_of_structural_elements_recurses() {
        let element = Element::Collection {
            id_short: "sensors".into(),
            children: IndexMap::from([(
                "t1".to_owned(),
                Element::property("t1", TypedValue::Double(1.0)),
            )]),
        };
        let info = TypeInfo::of(&element).unwrap();
        assert_eq!(
            info,
            TypeInfo::Collection(IndexMap::from([(
                "t1".to_owned(),
                TypeInfo::property(Datatype::Double)
            )]))
        );
    }

    #[test]
    fn static_table_resolves_registered_references_only() {
        let reference = ElementReference::submodel_element("s", KeyKind::Property, "p");
        let table = StaticTypeInformation::new()
            .with_type(reference.clone(), TypeInfo::property(Datatype::Boolean));
        assert!(table.type_info(&reference).is_ok());
        let other = ElementReference::submodel_element("s", KeyKind::Property, "missing");
        assert!(table.type_info(&other).is_err());
        assert!(table.operation_outputs(&other).is_empty());
    }
}
