//! ---
//! twl_section: "01-twin-model"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Typed values, element references, and element value mapping."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Bidirectional mapping between domain elements and their value-only
//! projections. The mapping table is assembled statically; adding an element
//! kind means adding one [`KIND_TABLE`] entry and one match arm here, and no
//! provider code changes.

use indexmap::IndexMap;

use crate::element::ElementKind;
use crate::{Element, ElementValue, Result, TypedValue, ValueError, ValueKind};

/// Element-kind to value-kind table, most specific kind first. The reverse
/// lookup walks this table in order and takes the first match, which makes
/// the tie-break deterministic: `AnnotatedRelationshipElement` wins over
/// `RelationshipElement` for its own value kind, and every other pairing is
/// unique.
const KIND_TABLE: &[(ElementKind, ValueKind)] = &[
    (ElementKind::AnnotatedRelationshipElement, ValueKind::AnnotatedRelationship),
    (ElementKind::RelationshipElement, ValueKind::Relationship),
    (ElementKind::Entity, ValueKind::Entity),
    (ElementKind::Property, ValueKind::Single),
    (ElementKind::Range, ValueKind::Range),
    (ElementKind::MultiLanguageProperty, ValueKind::LangStrings),
    (ElementKind::Blob, ValueKind::Blob),
    (ElementKind::File, ValueKind::File),
    (ElementKind::ReferenceElement, ValueKind::Reference),
    (ElementKind::Collection, ValueKind::Collection),
    (ElementKind::List, ValueKind::List),
];

/// Value kind corresponding to an element kind.
///
/// Fails with [`ValueError::UnsupportedElementKind`] if the kind has no value
/// projection (currently only [`ElementKind::Operation`]).
pub fn value_kind_for(kind: ElementKind) -> Result<ValueKind> {
    KIND_TABLE
        .iter()
        .find(|(element_kind, _)| *element_kind == kind)
        .map(|(_, value_kind)| *value_kind)
        .ok_or(ValueError::UnsupportedElementKind(kind))
}

/// Element kind corresponding to a value kind.
///
/// When several element kinds could carry the value kind, the most specific
/// registered kind wins (see [`KIND_TABLE`] ordering).
pub fn element_kind_for(kind: ValueKind) -> Result<ElementKind> {
    KIND_TABLE
        .iter()
        .find(|(_, value_kind)| *value_kind == kind)
        .map(|(element_kind, _)| *element_kind)
        .ok_or_else(|| ValueError::Mapping(format!("no element kind for value kind {kind}")))
}

/// Extract the value-only projection of an element.
///
/// Structural kinds recurse into their children. Fails with
/// [`ValueError::UnsupportedElementKind`] when no mapping is registered.
pub fn to_value(element: &Element) -> Result<ElementValue> {
    match element {
        Element::Property { value, id_short, .. } => match value {
            Some(value) => Ok(ElementValue::Single(value.clone())),
            None => Err(ValueError::Mapping(format!(
                "property {id_short:?} carries no value to project"
            ))),
        },
        Element::Range { min, max, .. } => Ok(ElementValue::Range {
            min: min.clone(),
            max: max.clone(),
        }),
        Element::MultiLanguageProperty { values, .. } => {
            Ok(ElementValue::LangStrings(values.clone()))
        }
        Element::Blob { mime_type, value, .. } => Ok(ElementValue::Blob {
            mime_type: mime_type.clone(),
            value: value.clone(),
        }),
        Element::File { mime_type, path, .. } => Ok(ElementValue::File {
            mime_type: mime_type.clone(),
            path: path.clone(),
        }),
        Element::ReferenceElement { value, .. } => Ok(ElementValue::Reference(value.clone())),
        Element::RelationshipElement { first, second, .. } => Ok(ElementValue::Relationship {
            first: first.clone(),
            second: second.clone(),
        }),
        Element::AnnotatedRelationshipElement {
            first,
            second,
            annotations,
            ..
        } => Ok(ElementValue::AnnotatedRelationship {
            first: first.clone(),
            second: second.clone(),
            annotations: map_children(annotations)?,
        }),
        Element::Entity {
            entity_type,
            global_asset_id,
            statements,
            ..
        } => Ok(ElementValue::Entity {
            entity_type: *entity_type,
            global_asset_id: global_asset_id.clone(),
            statements: map_children(statements)?,
        }),
        Element::Collection { children, .. } => {
            Ok(ElementValue::Collection(map_children(children)?))
        }
        Element::List { items, .. } => Ok(ElementValue::List(
            items.iter().map(to_value).collect::<Result<Vec<_>>>()?,
        )),
        Element::Operation { .. } => Err(ValueError::UnsupportedElementKind(element.kind())),
    }
}

/// Like [`to_value`] but treats absent input as an explicit empty result
/// rather than an error.
pub fn to_value_opt(element: Option<&Element>) -> Result<Option<ElementValue>> {
    element.map(to_value).transpose()
}

fn map_children(children: &IndexMap<String, Element>) -> Result<IndexMap<String, ElementValue>> {
    children
        .iter()
        .map(|(name, child)| Ok((name.clone(), to_value(child)?)))
        .collect()
}

/// Merge `value` into `element`, preserving element children absent from the
/// value.
///
/// Information loss is rejected with [`ValueError::Mapping`]: list values
/// whose length differs from the element's child count in either direction,
/// named value children without a matching element slot, and typed values
/// whose datatype differs from the element's declared datatype. The merge is
/// all-or-nothing: on any error, nested ones included, `element` is left
/// exactly as it was.
pub fn set_value(element: &mut Element, value: &ElementValue) -> Result<()> {
    // Merge into a working copy so a failure deep inside a structural value
    // cannot leave the element half-updated.
    let mut merged = element.clone();
    apply_value(&mut merged, value)?;
    *element = merged;
    Ok(())
}

fn apply_value(element: &mut Element, value: &ElementValue) -> Result<()> {
    match (element, value) {
        (Element::Property { datatype, value, id_short }, ElementValue::Single(incoming)) => {
            check_datatype(id_short, *datatype, incoming)?;
            *value = Some(incoming.clone());
            Ok(())
        }
        (
            Element::Range { datatype, min, max, id_short },
            ElementValue::Range { min: new_min, max: new_max },
        ) => {
            for bound in [new_min.as_ref(), new_max.as_ref()].into_iter().flatten() {
                check_datatype(id_short, *datatype, bound)?;
            }
            *min = new_min.clone();
            *max = new_max.clone();
            Ok(())
        }
        (Element::MultiLanguageProperty { values, .. }, ElementValue::LangStrings(incoming)) => {
            *values = incoming.clone();
            Ok(())
        }
        (
            Element::Blob { mime_type, value, .. },
            ElementValue::Blob { mime_type: new_mime, value: new_value },
        ) => {
            *mime_type = new_mime.clone();
            *value = new_value.clone();
            Ok(())
        }
        (
            Element::File { mime_type, path, .. },
            ElementValue::File { mime_type: new_mime, path: new_path },
        ) => {
            *mime_type = new_mime.clone();
            *path = new_path.clone();
            Ok(())
        }
        (Element::ReferenceElement { value, .. }, ElementValue::Reference(incoming)) => {
            *value = incoming.clone();
            Ok(())
        }
        (
            Element::RelationshipElement { first, second, .. },
            ElementValue::Relationship { first: new_first, second: new_second },
        ) => {
            *first = new_first.clone();
            *second = new_second.clone();
            Ok(())
        }
        (
            Element::AnnotatedRelationshipElement { first, second, annotations, id_short },
            ElementValue::AnnotatedRelationship {
                first: new_first,
                second: new_second,
                annotations: new_annotations,
            },
        ) => {
            merge_children(id_short, annotations, new_annotations)?;
            *first = new_first.clone();
            *second = new_second.clone();
            Ok(())
        }
        (
            Element::Entity { entity_type, global_asset_id, statements, id_short },
            ElementValue::Entity {
                entity_type: new_type,
                global_asset_id: new_id,
                statements: new_statements,
            },
        ) => {
            merge_children(id_short, statements, new_statements)?;
            *entity_type = *new_type;
            *global_asset_id = new_id.clone();
            Ok(())
        }
        (Element::Collection { children, id_short }, ElementValue::Collection(incoming)) => {
            merge_children(id_short, children, incoming)
        }
        (Element::List { items, id_short }, ElementValue::List(incoming)) => {
            if incoming.len() != items.len() {
                return Err(ValueError::Mapping(format!(
                    "list value for {id_short:?} has {} entries but the element has {} children; \
                     applying it would lose information",
                    incoming.len(),
                    items.len()
                )));
            }
            for (item, new_value) in items.iter_mut().zip(incoming) {
                apply_value(item, new_value)?;
            }
            Ok(())
        }
        (element @ Element::Operation { .. }, _) => {
            Err(ValueError::UnsupportedElementKind(element.kind()))
        }
        (element, value) => Err(ValueError::Mapping(format!(
            "value kind {} cannot be applied to element kind {}",
            value.kind(),
            element.kind()
        ))),
    }
}

fn check_datatype(id_short: &str, declared: crate::Datatype, value: &TypedValue) -> Result<()> {
    if value.datatype() != declared {
        return Err(ValueError::Mapping(format!(
            "element {id_short:?} declares datatype {declared} but the value carries {}",
            value.datatype()
        )));
    }
    Ok(())
}

fn merge_children(
    id_short: &str,
    children: &mut IndexMap<String, Element>,
    incoming: &IndexMap<String, ElementValue>,
) -> Result<()> {
    for (name, child_value) in incoming {
        let child = children.get_mut(name).ok_or_else(|| {
            ValueError::Mapping(format!(
                "value for {id_short:?} names child {name:?} which the element does not have"
            ))
        })?;
        apply_value(child, child_value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Datatype, ElementReference, EntityType, KeyKind};

    fn sample_reference(name: &str) -> ElementReference {
        ElementReference::submodel_element("plant", KeyKind::Property, name)
    }

    fn sample_elements() -> Vec<Element> {
        vec![
            Element::property("temperature", TypedValue::Double(21.5)),
            Element::Range {
                id_short: "operating".into(),
                datatype: Datatype::Int,
                min: Some(TypedValue::Int(-10)),
                max: Some(TypedValue::Int(90)),
            },
            Element::MultiLanguageProperty {
                id_short: "label".into(),
                values: IndexMap::from([
                    ("de".to_owned(), "Kessel".to_owned()),
                    ("en".to_owned(), "Boiler".to_owned()),
                ]),
            },
            Element::Blob {
                id_short: "snapshot".into(),
                mime_type: "image/png".into(),
                value: vec![1, 2, 3],
            },
            Element::File {
                id_short: "manual".into(),
                mime_type: "application/pdf".into(),
                path: "/docs/manual.pdf".into(),
            },
            Element::ReferenceElement {
                id_short: "sibling".into(),
                value: Some(sample_reference("other")),
            },
            Element::RelationshipElement {
                id_short: "feeds".into(),
                first: sample_reference("a"),
                second: sample_reference("b"),
            },
            Element::AnnotatedRelationshipElement {
                id_short: "feeds_annotated".into(),
                first: sample_reference("a"),
                second: sample_reference("b"),
                annotations: IndexMap::from([(
                    "weight".to_owned(),
                    Element::property("weight", TypedValue::Int(3)),
                )]),
            },
            Element::Entity {
                id_short: "pump".into(),
                entity_type: EntityType::SelfManaged,
                global_asset_id: Some("urn:asset:pump-1".into()),
                statements: IndexMap::from([(
                    "rpm".to_owned(),
                    Element::property("rpm", TypedValue::Int(1400)),
                )]),
            },
            Element::Collection {
                id_short: "sensors".into(),
                children: IndexMap::from([(
                    "t1".to_owned(),
                    Element::property("t1", TypedValue::Double(1.0)),
                )]),
            },
            Element::List {
                id_short: "readings".into(),
                items: vec![
                    Element::property("r", TypedValue::Int(1)),
                    Element::property("r", TypedValue::Int(2)),
                ],
            },
        ]
    }

    #[test]
    fn set_value_of_to_value_reconstructs_every_mappable_element() {
        for element in sample_elements() {
            let value = to_value(&element).expect("projection");
            let mut target = element.clone();
            set_value(&mut target, &value).expect("merge");
            assert_eq!(target, element, "{} round trip", element.kind());
        }
    }

    #[test]
    fn absent_input_yields_empty_result_not_an_error() {
        assert!(to_value_opt(None).unwrap().is_none());
    }

    #[test]
    fn operations_have_no_value_projection() {
        let operation = Element::Operation {
            id_short: "calibrate".into(),
            inputs: vec![],
            outputs: vec![],
            inoutputs: vec![],
        };
        assert!(matches!(
            to_value(&operation),
            Err(ValueError::UnsupportedElementKind(ElementKind::Operation))
        ));
        assert!(matches!(
            value_kind_for(ElementKind::Operation),
            Err(ValueError::UnsupportedElementKind(_))
        ));
    }

    #[test]
    fn shorter_list_value_is_rejected() {
        let mut list = Element::List {
            id_short: "readings".into(),
            items: vec![
                Element::property("r", TypedValue::Int(1)),
                Element::property("r", TypedValue::Int(2)),
            ],
        };
        let result = set_value(&mut list, &ElementValue::List(vec![TypedValue::Int(9).into()]));
        assert!(matches!(result, Err(ValueError::Mapping(_))));
    }

    #[test]
    fn longer_list_value_is_rejected_not_truncated() {
        let mut list = Element::List {
            id_short: "readings".into(),
            items: vec![Element::property("r", TypedValue::Int(1))],
        };
        let result = set_value(
            &mut list,
            &ElementValue::List(vec![TypedValue::Int(9).into(), TypedValue::Int(10).into()]),
        );
        assert!(matches!(result, Err(ValueError::Mapping(_))));
        // The element is untouched after the rejection.
        if let Element::List { items, .. } = &list {
            assert_eq!(items.len(), 1);
        }
    }

    #[test]
    fn collection_merge_preserves_children_absent_from_the_value() {
        let mut collection = Element::Collection {
            id_short: "sensors".into(),
            children: IndexMap::from([
                ("t1".to_owned(), Element::property("t1", TypedValue::Double(1.0))),
                ("t2".to_owned(), Element::property("t2", TypedValue::Double(2.0))),
            ]),
        };
        let incoming = ElementValue::Collection(IndexMap::from([(
            "t1".to_owned(),
            TypedValue::Double(5.5).into(),
        )]));
        set_value(&mut collection, &incoming).expect("merge");
        if let Element::Collection { children, .. } = &collection {
            assert_eq!(
                children["t1"],
                Element::property("t1", TypedValue::Double(5.5))
            );
            assert_eq!(
                children["t2"],
                Element::property("t2", TypedValue::Double(2.0))
            );
        }
    }

    #[test]
    fn unknown_named_child_is_rejected_without_partial_merge() {
        let mut collection = Element::Collection {
            id_short: "sensors".into(),
            children: IndexMap::from([(
                "t1".to_owned(),
                Element::property("t1", TypedValue::Double(1.0)),
            )]),
        };
        let incoming = ElementValue::Collection(IndexMap::from([
            ("t1".to_owned(), TypedValue::Double(9.0).into()),
            ("ghost".to_owned(), TypedValue::Double(0.0).into()),
        ]));
        assert!(matches!(
            set_value(&mut collection, &incoming),
            Err(ValueError::Mapping(_))
        ));
        if let Element::Collection { children, .. } = &collection {
            assert_eq!(
                children["t1"],
                Element::property("t1", TypedValue::Double(1.0)),
                "no partial merge"
            );
        }
    }

    #[test]
    fn nested_merge_failure_leaves_the_element_untouched() {
        let pristine = Element::Collection {
            id_short: "sensors".into(),
            children: IndexMap::from([
                ("a".to_owned(), Element::property("a", TypedValue::Int(1))),
                ("b".to_owned(), Element::property("b", TypedValue::Int(2))),
            ]),
        };
        let mut collection = pristine.clone();
        // The first child merges cleanly, the second fails on its datatype.
        let incoming = ElementValue::Collection(IndexMap::from([
            ("a".to_owned(), TypedValue::Int(9).into()),
            ("b".to_owned(), TypedValue::String("two".into()).into()),
        ]));
        assert!(matches!(
            set_value(&mut collection, &incoming),
            Err(ValueError::Mapping(_))
        ));
        assert_eq!(collection, pristine);

        let pristine_list = Element::List {
            id_short: "readings".into(),
            items: vec![
                Element::property("r", TypedValue::Int(1)),
                Element::property("r", TypedValue::Int(2)),
            ],
        };
        let mut list = pristine_list.clone();
        let incoming = ElementValue::List(vec![
            TypedValue::Int(9).into(),
            TypedValue::Double(0.5).into(),
        ]);
        assert!(set_value(&mut list, &incoming).is_err());
        assert_eq!(list, pristine_list);
    }

    #[test]
    fn datatype_mismatch_is_a_mapping_error() {
        let mut property = Element::empty_property("count", Datatype::Int);
        let result = set_value(&mut property, &TypedValue::String("5".into()).into());
        assert!(matches!(result, Err(ValueError::Mapping(_))));
    }

    #[test]
    fn kind_lookup_is_bidirectional_and_deterministic() {
        for (element_kind, value_kind) in KIND_TABLE {
            assert_eq!(value_kind_for(*element_kind).unwrap(), *value_kind);
        }
        assert_eq!(
            element_kind_for(ValueKind::AnnotatedRelationship).unwrap(),
            ElementKind::AnnotatedRelationshipElement
        );
        assert_eq!(
            element_kind_for(ValueKind::Relationship).unwrap(),
            ElementKind::RelationshipElement
        );
        assert_eq!(
            element_kind_for(ValueKind::Single).unwrap(),
            ElementKind::Property
        );
    }
}
