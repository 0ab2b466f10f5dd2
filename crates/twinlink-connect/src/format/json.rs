//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! JSON payload codec. Fragment queries are JSON Pointers (RFC 6901); an
//! empty query or no query selects the whole document.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use twinlink_model::{
    Datatype, ElementReference, ElementValue, EntityType, TypeInfo, TypedValue, ValueError,
    ValueKind,
};

use crate::format::{Format, FragmentSpec};
use crate::Result;

/// JSON implementation of [`Format`].
#[derive(Debug, Clone, Default)]
pub struct JsonFormat;

impl JsonFormat {
    /// Stateless codec instance.
    pub fn new() -> JsonFormat {
        JsonFormat
    }
}

fn decode_error(reason: impl std::fmt::Display) -> ValueError {
    ValueError::Format(reason.to_string())
}

fn select<'a>(document: &'a Value, query: Option<&str>) -> Result<&'a Value> {
    match query {
        None | Some("") => Ok(document),
        Some(pointer) => document.pointer(pointer).ok_or_else(|| {
            decode_error(format!("query {pointer:?} selects nothing in the payload")).into()
        }),
    }
}

/// Coerce a scalar JSON node into its lexical text form. Strings pass
/// through unquoted; numbers and booleans keep their literal form.
fn scalar_text(node: &Value) -> Result<String> {
    match node {
        Value::String(text) => Ok(text.clone()),
        Value::Bool(_) | Value::Number(_) => Ok(node.to_string()),
        other => Err(decode_error(format!(
            "expected a scalar node, found {other}"
        ))
        .into()),
    }
}

fn decode_typed(node: &Value, datatype: Datatype) -> Result<TypedValue> {
    Ok(TypedValue::parse(datatype, &scalar_text(node)?)?)
}

fn as_object<'a>(node: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    node.as_object()
        .ok_or_else(|| decode_error(format!("expected a JSON object for {what}, found {node}")).into())
}

fn field<'a>(object: &'a Map<String, Value>, name: &str, what: &str) -> Result<&'a Value> {
    object
        .get(name)
        .ok_or_else(|| decode_error(format!("{what} is missing the {name:?} field")).into())
}

fn string_field(object: &Map<String, Value>, name: &str, what: &str) -> Result<String> {
    field(object, name, what)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| decode_error(format!("the {name:?} field of {what} is not a string")).into())
}

fn decode_reference(node: &Value) -> Result<ElementReference> {
    let text = node
        .as_str()
        .ok_or_else(|| decode_error(format!("expected a reference string, found {node}")))?;
    Ok(text.parse::<ElementReference>().map_err(decode_error)?)
}

fn decode_children(
    object: &Map<String, Value>,
    shapes: &IndexMap<String, TypeInfo>,
    what: &str,
) -> Result<IndexMap<String, ElementValue>> {
    shapes
        .iter()
        .map(|(name, shape)| {
            let child = field(object, name, what)?;
            Ok((name.clone(), decode(child, shape)?))
        })
        .collect()
}

fn decode(node: &Value, shape: &TypeInfo) -> Result<ElementValue> {
    match shape {
        TypeInfo::Value { kind, datatype } => decode_value(node, *kind, *datatype),
        TypeInfo::AnnotatedRelationship { annotations } => {
            let object = as_object(node, "an annotated relationship value")?;
            let inner = as_object(
                field(object, "annotations", "an annotated relationship value")?,
                "the annotations field",
            )?;
            Ok(ElementValue::AnnotatedRelationship {
                first: decode_reference(field(object, "first", "a relationship value")?)?,
                second: decode_reference(field(object, "second", "a relationship value")?)?,
                annotations: decode_children(inner, annotations, "the annotations field")?,
            })
        }
        TypeInfo::Entity { statements } => {
            let object = as_object(node, "an entity value")?;
            let entity_type: EntityType =
                serde_json::from_value(field(object, "entityType", "an entity value")?.clone())
                    .map_err(decode_error)?;
            let global_asset_id = match object.get("globalAssetId") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Null) | None => None,
                Some(other) => {
                    return Err(decode_error(format!(
                        "the \"globalAssetId\" field of an entity value is not a string: {other}"
                    ))
                    .into())
                }
            };
            let inner = as_object(
                field(object, "statements", "an entity value")?,
                "the statements field",
            )?;
            Ok(ElementValue::Entity {
                entity_type,
                global_asset_id,
                statements: decode_children(inner, statements, "the statements field")?,
            })
        }
        TypeInfo::Collection(children) => {
            let object = as_object(node, "a collection value")?;
            Ok(ElementValue::Collection(decode_children(
                object,
                children,
                "a collection value",
            )?))
        }
        TypeInfo::List(shapes) => {
            let items = node.as_array().ok_or_else(|| {
                decode_error(format!("expected a JSON array for a list value, found {node}"))
            })?;
            if items.len() != shapes.len() {
                return Err(decode_error(format!(
                    "list value has {} items but {} are expected",
                    items.len(),
                    shapes.len()
                ))
                .into());
            }
            Ok(ElementValue::List(
                items
                    .iter()
                    .zip(shapes)
                    .map(|(item, shape)| decode(item, shape))
                    .collect::<Result<Vec<_>>>()?,
            ))
        }
    }
}

fn decode_value(node: &Value, kind: ValueKind, datatype: Datatype) -> Result<ElementValue> {
    match kind {
        ValueKind::Single => Ok(ElementValue::Single(decode_typed(node, datatype)?)),
        ValueKind::Range => {
            let object = as_object(node, "a range value")?;
            let bound = |name: &str| -> Result<Option<TypedValue>> {
                match object.get(name) {
                    None | Some(Value::Null) => Ok(None),
                    Some(node) => Ok(Some(decode_typed(node, datatype)?)),
                }
            };
            Ok(ElementValue::Range {
                min: bound("min")?,
                max: bound("max")?,
            })
        }
        ValueKind::LangStrings => {
            let object = as_object(node, "a multi-language value")?;
            let values = object
                .iter()
                .map(|(language, text)| {
                    let text = text.as_str().ok_or_else(|| {
                        decode_error(format!(
                            "localized text for {language:?} is not a string: {text}"
                        ))
                    })?;
                    Ok((language.clone(), text.to_owned()))
                })
                .collect::<Result<IndexMap<_, _>>>()?;
            Ok(ElementValue::LangStrings(values))
        }
        ValueKind::Blob => {
            let object = as_object(node, "a blob value")?;
            let encoded = string_field(object, "value", "a blob value")?;
            let value = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| decode_error(format!("blob content is not base64: {e}")))?;
            Ok(ElementValue::Blob {
                mime_type: string_field(object, "contentType", "a blob value")?,
                value,
            })
        }
        ValueKind::File => {
            let object = as_object(node, "a file value")?;
            Ok(ElementValue::File {
                mime_type: string_field(object, "contentType", "a file value")?,
                path: string_field(object, "value", "a file value")?,
            })
        }
        ValueKind::Reference => match node {
            Value::Null => Ok(ElementValue::Reference(None)),
            other => Ok(ElementValue::Reference(Some(decode_reference(other)?))),
        },
        ValueKind::Relationship => {
            let object = as_object(node, "a relationship value")?;
            Ok(ElementValue::Relationship {
                first: decode_reference(field(object, "first", "a relationship value")?)?,
                second: decode_reference(field(object, "second", "a relationship value")?)?,
            })
        }
        ValueKind::AnnotatedRelationship
        | ValueKind::Entity
        | ValueKind::Collection
        | ValueKind::List => Err(decode_error(format!(
            "structural kind {kind} requires a structural type description"
        ))
        .into()),
    }
}

/// Encode a typed value as the JSON node matching its datatype. Numeric and
/// boolean datatypes become JSON literals, everything else a JSON string.
/// Values with no exact JSON number form, such as an `xs:integer` beyond the
/// u64 range or a non-finite float, become strings instead of approximated
/// numbers.
fn encode_typed(value: &TypedValue) -> Value {
    match value {
        TypedValue::Boolean(v) => Value::Bool(*v),
        TypedValue::Byte(v) => Value::Number(i64::from(*v).into()),
        TypedValue::Short(v) => Value::Number(i64::from(*v).into()),
        TypedValue::Int(v) => Value::Number(i64::from(*v).into()),
        TypedValue::Long(v) => Value::Number((*v).into()),
        TypedValue::UnsignedByte(v) => Value::Number(u64::from(*v).into()),
        TypedValue::UnsignedShort(v) => Value::Number(u64::from(*v).into()),
        TypedValue::UnsignedInt(v) => Value::Number(u64::from(*v).into()),
        TypedValue::UnsignedLong(v) => Value::Number((*v).into()),
        TypedValue::Integer(v) => i64::try_from(*v)
            .map(|n| Value::Number(n.into()))
            .or_else(|_| u64::try_from(*v).map(|n| Value::Number(n.into())))
            .unwrap_or_else(|_| Value::String(value.render())),
        TypedValue::Float(_) | TypedValue::Double(_) | TypedValue::Decimal(_) => {
            exact_number(value.render())
        }
        other => Value::String(other.render()),
    }
}

/// A JSON number node only when it reproduces the lexical form exactly;
/// otherwise the lexical form as a string. Catches lossy f64 conversions of
/// long decimals as well as non-finite floats.
fn exact_number(rendered: String) -> Value {
    match serde_json::from_str::<Value>(&rendered) {
        Ok(Value::Number(number)) if number.to_string() == rendered => Value::Number(number),
        _ => Value::String(rendered),
    }
}

fn encode(value: &ElementValue) -> Value {
    match value {
        ElementValue::Single(typed) => encode_typed(typed),
        ElementValue::Range { min, max } => {
            let bound = |b: &Option<TypedValue>| match b {
                Some(typed) => encode_typed(typed),
                None => Value::Null,
            };
            json!({ "min": bound(min), "max": bound(max) })
        }
        ElementValue::LangStrings(values) => Value::Object(
            values
                .iter()
                .map(|(language, text)| (language.clone(), Value::String(text.clone())))
                .collect(),
        ),
        ElementValue::Blob { mime_type, value } => json!({
            "contentType": mime_type,
            "value": BASE64.encode(value),
        }),
        ElementValue::File { mime_type, path } => json!({
            "contentType": mime_type,
            "value": path,
        }),
        ElementValue::Reference(reference) => match reference {
            Some(reference) => Value::String(reference.to_string()),
            None => Value::Null,
        },
        ElementValue::Relationship { first, second } => json!({
            "first": first.to_string(),
            "second": second.to_string(),
        }),
        ElementValue::AnnotatedRelationship {
            first,
            second,
            annotations,
        } => json!({
            "first": first.to_string(),
            "second": second.to_string(),
            "annotations": encode_children(annotations),
        }),
        ElementValue::Entity {
            entity_type,
            global_asset_id,
            statements,
        } => {
            let mut object = Map::new();
            object.insert(
                "entityType".into(),
                serde_json::to_value(entity_type).unwrap_or(Value::Null),
            );
            if let Some(id) = global_asset_id {
                object.insert("globalAssetId".into(), Value::String(id.clone()));
            }
            object.insert("statements".into(), encode_children(statements));
            Value::Object(object)
        }
        ElementValue::Collection(children) => encode_children(children),
        ElementValue::List(items) => Value::Array(items.iter().map(encode).collect()),
    }
}

fn encode_children(children: &IndexMap<String, ElementValue>) -> Value {
    Value::Object(
        children
            .iter()
            .map(|(name, child)| (name.clone(), encode(child)))
            .collect(),
    )
}

impl Format for JsonFormat {
    fn key(&self) -> &'static str {
        "JSON"
    }

    fn mime_type(&self) -> &'static str {
        "application/json"
    }

    fn read(
        &self,
        payload: &[u8],
        specs: &IndexMap<String, FragmentSpec>,
    ) -> Result<IndexMap<String, ElementValue>> {
        let document: Value = serde_json::from_slice(payload)
            .map_err(|e| decode_error(format!("payload is not valid JSON: {e}")))?;
        specs
            .iter()
            .map(|(name, spec)| {
                let node = select(&document, spec.query.as_deref())?;
                Ok((name.clone(), decode(node, &spec.type_info)?))
            })
            .collect()
    }

    fn write(&self, value: &ElementValue) -> Result<String> {
        Ok(encode(value).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinlink_model::KeyKind;

    fn read_one(payload: &str, spec: FragmentSpec) -> Result<ElementValue> {
        let format = JsonFormat::new();
        let mut values =
            format.read(payload.as_bytes(), &IndexMap::from([("v".to_owned(), spec)]))?;
        Ok(values.shift_remove("v").unwrap())
    }

    #[test]
    fn whole_payload_scalar_coercion() {
        let value = read_one("7", FragmentSpec::whole(TypeInfo::property(Datatype::Int)));
        assert_eq!(value.unwrap(), ElementValue::Single(TypedValue::Int(7)));
    }

    #[test]
    fn quoted_scalars_parse_against_the_declared_datatype() {
        // Endpoints frequently wrap numbers in strings; the declared
        // datatype wins over the JSON node type.
        let value = read_one(
            "{\"reading\": \"36.6\"}",
            FragmentSpec::query("/reading", TypeInfo::property(Datatype::Double)),
        );
        assert_eq!(
            value.unwrap(),
            ElementValue::Single(TypedValue::Double(36.6))
        );
    }

    #[test]
    fn pointer_query_selects_nested_nodes() {
        let payload = "{\"data\": {\"items\": [10, 20, 30]}}";
        let value = read_one(
            payload,
            FragmentSpec::query("/data/items/1", TypeInfo::property(Datatype::Int)),
        );
        assert_eq!(value.unwrap(), ElementValue::Single(TypedValue::Int(20)));
    }

    #[test]
    fn missing_query_target_is_an_error() {
        let result = read_one(
            "{\"a\": 1}",
            FragmentSpec::query("/b", TypeInfo::property(Datatype::Int)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn multiple_fragments_from_one_payload() {
        let format = JsonFormat::new();
        let specs = IndexMap::from([
            (
                "t".to_owned(),
                FragmentSpec::query("/temp", TypeInfo::property(Datatype::Double)),
            ),
            (
                "h".to_owned(),
                FragmentSpec::query("/humidity", TypeInfo::property(Datatype::Int)),
            ),
        ]);
        let values = format
            .read(b"{\"temp\": 21.5, \"humidity\": 40}", &specs)
            .unwrap();
        assert_eq!(values["t"], ElementValue::Single(TypedValue::Double(21.5)));
        assert_eq!(values["h"], ElementValue::Single(TypedValue::Int(40)));
    }

    #[test]
    fn range_and_langstring_shapes_decode() {
        let range = read_one(
            "{\"min\": 0, \"max\": 100}",
            FragmentSpec::whole(TypeInfo::range(Datatype::Int)),
        )
        .unwrap();
        assert_eq!(
            range,
            ElementValue::Range {
                min: Some(TypedValue::Int(0)),
                max: Some(TypedValue::Int(100)),
            }
        );
        let langs = read_one(
            "{\"de\": \"Ofen\", \"en\": \"furnace\"}",
            FragmentSpec::whole(TypeInfo::Value {
                kind: ValueKind::LangStrings,
                datatype: Datatype::String,
            }),
        )
        .unwrap();
        assert_eq!(
            langs,
            ElementValue::LangStrings(IndexMap::from([
                ("de".to_owned(), "Ofen".to_owned()),
                ("en".to_owned(), "furnace".to_owned()),
            ]))
        );
    }

    #[test]
    fn blob_decodes_base64_content() {
        let value = read_one(
            "{\"contentType\": \"text/plain\", \"value\": \"aGVsbG8=\"}",
            FragmentSpec::whole(TypeInfo::Value {
                kind: ValueKind::Blob,
                datatype: Datatype::String,
            }),
        )
        .unwrap();
        assert_eq!(
            value,
            ElementValue::Blob {
                mime_type: "text/plain".into(),
                value: b"hello".to_vec(),
            }
        );
    }

    #[test]
    fn references_decode_from_display_form() {
        let value = read_one(
            "\"(Submodel)plant/(Property)temperature\"",
            FragmentSpec::whole(TypeInfo::Value {
                kind: ValueKind::Reference,
                datatype: Datatype::String,
            }),
        )
        .unwrap();
        assert_eq!(
            value,
            ElementValue::Reference(Some(ElementReference::submodel_element(
                "plant",
                KeyKind::Property,
                "temperature",
            )))
        );
    }

    #[test]
    fn collection_decodes_each_declared_child() {
        let shape = TypeInfo::Collection(IndexMap::from([
            ("speed".to_owned(), TypeInfo::property(Datatype::Double)),
            ("on".to_owned(), TypeInfo::property(Datatype::Boolean)),
        ]));
        let value = read_one(
            "{\"speed\": 12.5, \"on\": true, \"ignored\": null}",
            FragmentSpec::whole(shape),
        )
        .unwrap();
        assert_eq!(
            value,
            ElementValue::Collection(IndexMap::from([
                (
                    "speed".to_owned(),
                    ElementValue::Single(TypedValue::Double(12.5))
                ),
                (
                    "on".to_owned(),
                    ElementValue::Single(TypedValue::Boolean(true))
                ),
            ]))
        );
    }

    #[test]
    fn list_length_must_match_the_shape() {
        let shape = TypeInfo::List(vec![
            TypeInfo::property(Datatype::Int),
            TypeInfo::property(Datatype::Int),
        ]);
        assert!(read_one("[1, 2, 3]", FragmentSpec::whole(shape)).is_err());
    }

    #[test]
    fn write_renders_json_literals_by_datatype() {
        let format = JsonFormat::new();
        assert_eq!(
            format.write(&ElementValue::Single(TypedValue::Int(5))).unwrap(),
            "5"
        );
        assert_eq!(
            format
                .write(&ElementValue::Single(TypedValue::Boolean(false)))
                .unwrap(),
            "false"
        );
        assert_eq!(
            format
                .write(&ElementValue::Single(TypedValue::String("on".into())))
                .unwrap(),
            "\"on\""
        );
    }

    #[test]
    fn write_keeps_numbers_without_a_json_form_exact() {
        let format = JsonFormat::new();
        let big = TypedValue::Integer(170_141_183_460_469_231_731_687_303_715i128);
        // Beyond u64, so it must leave as a string instead of a rounded
        // JSON number.
        let text = format.write(&ElementValue::Single(big.clone())).unwrap();
        assert_eq!(text, "\"170141183460469231731687303715\"");
        let reread = read_one(&text, FragmentSpec::whole(TypeInfo::property(Datatype::Integer)));
        assert_eq!(reread.unwrap(), ElementValue::Single(big));

        let long_decimal = TypedValue::Decimal("0.10000000000000000001".into());
        let text = format
            .write(&ElementValue::Single(long_decimal.clone()))
            .unwrap();
        assert_eq!(text, "\"0.10000000000000000001\"");
        let reread = read_one(&text, FragmentSpec::whole(TypeInfo::property(Datatype::Decimal)));
        assert_eq!(reread.unwrap(), ElementValue::Single(long_decimal));

        let fits = TypedValue::Integer(-9_000_000_000_000_000_000i128);
        assert_eq!(
            format.write(&ElementValue::Single(fits)).unwrap(),
            "-9000000000000000000"
        );
    }

    #[test]
    fn write_read_round_trips_structural_values() {
        let format = JsonFormat::new();
        let value = ElementValue::Collection(IndexMap::from([
            (
                "limits".to_owned(),
                ElementValue::Range {
                    min: Some(TypedValue::Int(0)),
                    max: None,
                },
            ),
            (
                "label".to_owned(),
                ElementValue::Single(TypedValue::String("line 4".into())),
            ),
        ]));
        let shape = TypeInfo::Collection(IndexMap::from([
            ("limits".to_owned(), TypeInfo::range(Datatype::Int)),
            ("label".to_owned(), TypeInfo::property(Datatype::String)),
        ]));
        let text = format.write(&value).unwrap();
        let reread = read_one(&text, FragmentSpec::whole(shape)).unwrap();
        assert_eq!(reread, value);
    }
}
