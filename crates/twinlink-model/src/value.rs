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

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};

use crate::{Datatype, Result, ValueError};

/// A primitive value tagged with its [`Datatype`].
///
/// Immutable once constructed. Equality is value plus datatype equality, so
/// `Int(1)` and `Long(1)` are distinct. The round-trip law holds for every
/// representable value: `TypedValue::parse(v.datatype(), &v.render())` yields
/// a value equal to `v`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// `xs:boolean`
    Boolean(bool),
    /// `xs:byte`
    Byte(i8),
    /// `xs:short`
    Short(i16),
    /// `xs:int`
    Int(i32),
    /// `xs:long`
    Long(i64),
    /// `xs:unsignedByte`
    UnsignedByte(u8),
    /// `xs:unsignedShort`
    UnsignedShort(u16),
    /// `xs:unsignedInt`
    UnsignedInt(u32),
    /// `xs:unsignedLong`
    UnsignedLong(u64),
    /// `xs:integer`
    Integer(i128),
    /// `xs:float`
    Float(f32),
    /// `xs:double`
    Double(f64),
    /// `xs:decimal`, kept in its validated lexical form
    Decimal(String),
    /// `xs:string`
    String(String),
    /// `xs:anyURI`
    AnyUri(String),
    /// `xs:dateTime`
    DateTime(DateTime<FixedOffset>),
    /// `xs:date`
    Date(NaiveDate),
    /// `xs:time`
    Time(NaiveTime),
    /// `xs:duration`, kept in its validated lexical form
    Duration(String),
    /// `xs:hexBinary`
    HexBinary(Vec<u8>),
    /// `xs:base64Binary`
    Base64Binary(Vec<u8>),
    /// `rdf:langString`, rendered as `text@language`
    LangString {
        /// BCP-47 language tag.
        language: String,
        /// Localized text.
        text: String,
    },
}

fn format_error(datatype: Datatype, text: &str, reason: impl fmt::Display) -> ValueError {
    ValueError::Format(format!(
        "cannot parse {text:?} as {datatype}: {reason}"
    ))
}

fn parse_number<T: std::str::FromStr>(datatype: Datatype, text: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| format_error(datatype, text, e))
}

fn validate_decimal(text: &str) -> Result<String> {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
    let mut parts = unsigned.splitn(2, '.');
    let integral = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or("0");
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integral) || !all_digits(fraction) {
        return Err(format_error(
            Datatype::Decimal,
            text,
            "not a decimal literal",
        ));
    }
    Ok(trimmed.to_owned())
}

fn validate_duration(text: &str) -> Result<String> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let rest = body
        .strip_prefix('P')
        .ok_or_else(|| format_error(Datatype::Duration, text, "missing P designator"))?;
    if rest.is_empty() {
        return Err(format_error(Datatype::Duration, text, "empty duration"));
    }
    Ok(trimmed.to_owned())
}

impl TypedValue {
    /// Parse `text` into a value of the given datatype.
    ///
    /// Fails with [`ValueError::Format`] on malformed input.
    pub fn parse(datatype: Datatype, text: &str) -> Result<TypedValue> {
        match datatype {
            Datatype::Boolean => match text.trim() {
                "true" | "1" => Ok(TypedValue::Boolean(true)),
                "false" | "0" => Ok(TypedValue::Boolean(false)),
                other => Err(format_error(datatype, other, "not a boolean literal")),
            },
            Datatype::Byte => parse_number(datatype, text).map(TypedValue::Byte),
            Datatype::Short => parse_number(datatype, text).map(TypedValue::Short),
            Datatype::Int => parse_number(datatype, text).map(TypedValue::Int),
            Datatype::Long => parse_number(datatype, text).map(TypedValue::Long),
            Datatype::UnsignedByte => parse_number(datatype, text).map(TypedValue::UnsignedByte),
            Datatype::UnsignedShort => parse_number(datatype, text).map(TypedValue::UnsignedShort),
            Datatype::UnsignedInt => parse_number(datatype, text).map(TypedValue::UnsignedInt),
            Datatype::UnsignedLong => parse_number(datatype, text).map(TypedValue::UnsignedLong),
            Datatype::Integer => parse_number(datatype, text).map(TypedValue::Integer),
            Datatype::Float => parse_number(datatype, text).map(TypedValue::Float),
            Datatype::Double => parse_number(datatype, text).map(TypedValue::Double),
            Datatype::Decimal => validate_decimal(text).map(TypedValue::Decimal),
            Datatype::String => Ok(TypedValue::String(text.to_owned())),
            Datatype::AnyUri => Ok(TypedValue::AnyUri(text.trim().to_owned())),
            Datatype::DateTime => DateTime::parse_from_rfc3339(text.trim())
                .map(TypedValue::DateTime)
                .map_err(|e| format_error(datatype, text, e)),
            Datatype::Date => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map(TypedValue::Date)
                .map_err(|e| format_error(datatype, text, e)),
            Datatype::Time => NaiveTime::parse_from_str(text.trim(), "%H:%M:%S%.f")
                .map(TypedValue::Time)
                .map_err(|e| format_error(datatype, text, e)),
            Datatype::Duration => validate_duration(text).map(TypedValue::Duration),
            Datatype::HexBinary => hex::decode(text.trim())
                .map(TypedValue::HexBinary)
                .map_err(|e| format_error(datatype, text, e)),
            Datatype::Base64Binary => BASE64
                .decode(text.trim())
                .map(TypedValue::Base64Binary)
                .map_err(|e| format_error(datatype, text, e)),
            Datatype::LangString => match text.rsplit_once('@') {
                Some((value, language)) if !language.is_empty() => Ok(TypedValue::LangString {
                    language: language.to_owned(),
                    text: value.to_owned(),
                }),
                _ => Err(format_error(
                    datatype,
                    text,
                    "expected `text@language` form",
                )),
            },
        }
    }

    /// Datatype tag fixed at construction.
    pub fn datatype(&self) -> Datatype {
        match self {
            TypedValue::Boolean(_) => Datatype::Boolean,
            TypedValue::Byte(_) => Datatype::Byte,
            TypedValue::Short(_) => Datatype::Short,
            TypedValue::Int(_) => Datatype::Int,
            TypedValue::Long(_) => Datatype::Long,
            TypedValue::UnsignedByte(_) => Datatype::UnsignedByte,
            TypedValue::UnsignedShort(_) => Datatype::UnsignedShort,
            TypedValue::UnsignedInt(_) => Datatype::UnsignedInt,
            TypedValue::UnsignedLong(_) => Datatype::UnsignedLong,
            TypedValue::Integer(_) => Datatype::Integer,
            TypedValue::Float(_) => Datatype::Float,
            TypedValue::Double(_) => Datatype::Double,
            TypedValue::Decimal(_) => Datatype::Decimal,
            TypedValue::String(_) => Datatype::String,
            TypedValue::AnyUri(_) => Datatype::AnyUri,
            TypedValue::DateTime(_) => Datatype::DateTime,
            TypedValue::Date(_) => Datatype::Date,
            TypedValue::Time(_) => Datatype::Time,
            TypedValue::Duration(_) => Datatype::Duration,
            TypedValue::HexBinary(_) => Datatype::HexBinary,
            TypedValue::Base64Binary(_) => Datatype::Base64Binary,
            TypedValue::LangString { .. } => Datatype::LangString,
        }
    }

    /// Canonical string form. Total for every value.
    pub fn render(&self) -> String {
        match self {
            TypedValue::Boolean(v) => v.to_string(),
            TypedValue::Byte(v) => v.to_string(),
            TypedValue::Short(v) => v.to_string(),
            TypedValue::Int(v) => v.to_string(),
            TypedValue::Long(v) => v.to_string(),
            TypedValue::UnsignedByte(v) => v.to_string(),
            TypedValue::UnsignedShort(v) => v.to_string(),
            TypedValue::UnsignedInt(v) => v.to_string(),
            TypedValue::UnsignedLong(v) => v.to_string(),
            TypedValue::Integer(v) => v.to_string(),
            TypedValue::Float(v) => v.to_string(),
            TypedValue::Double(v) => v.to_string(),
            TypedValue::Decimal(v) => v.clone(),
            TypedValue::String(v) => v.clone(),
            TypedValue::AnyUri(v) => v.clone(),
            TypedValue::DateTime(v) => v.to_rfc3339(),
            TypedValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            TypedValue::Time(v) => v.format("%H:%M:%S%.f").to_string(),
            TypedValue::Duration(v) => v.clone(),
            TypedValue::HexBinary(v) => hex::encode_upper(v),
            TypedValue::Base64Binary(v) => BASE64.encode(v),
            TypedValue::LangString { language, text } => format!("{text}@{language}"),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: TypedValue) {
        let rendered = value.render();
        let reparsed = TypedValue::parse(value.datatype(), &rendered)
            .unwrap_or_else(|e| panic!("reparse of {rendered:?} failed: {e}"));
        assert_eq!(reparsed, value);
    }

    #[test]
    fn parse_render_round_trips_for_every_datatype() {
        round_trip(TypedValue::Boolean(true));
        round_trip(TypedValue::Byte(-12));
        round_trip(TypedValue::Short(-1234));
        round_trip(TypedValue::Int(5));
        round_trip(TypedValue::Long(-9_000_000_000));
        round_trip(TypedValue::UnsignedByte(255));
        round_trip(TypedValue::UnsignedShort(65_535));
        round_trip(TypedValue::UnsignedInt(4_000_000_000));
        round_trip(TypedValue::UnsignedLong(u64::MAX));
        round_trip(TypedValue::Integer(170_141_183_460_469_231_731_687_303_715i128));
        round_trip(TypedValue::Float(1.25));
        round_trip(TypedValue::Double(-0.001));
        round_trip(TypedValue::Decimal("3.14159".into()));
        round_trip(TypedValue::String("hello world".into()));
        round_trip(TypedValue::AnyUri("https://example.org/a?b=c".into()));
        round_trip(TypedValue::DateTime(
            DateTime::parse_from_rfc3339("2024-05-17T08:30:00+02:00").unwrap(),
        ));
        round_trip(TypedValue::Date(
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap(),
        ));
        round_trip(TypedValue::Time(
            NaiveTime::from_hms_milli_opt(8, 30, 0, 250).unwrap(),
        ));
        round_trip(TypedValue::Duration("PT5M30S".into()));
        round_trip(TypedValue::HexBinary(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        round_trip(TypedValue::Base64Binary(b"twinlink".to_vec()));
        round_trip(TypedValue::LangString {
            language: "de".into(),
            text: "Temperatur".into(),
        });
    }

    #[test]
    fn lenient_input_forms_are_accepted() {
        assert_eq!(
            TypedValue::parse(Datatype::Boolean, "1").unwrap(),
            TypedValue::Boolean(true)
        );
        assert_eq!(
            TypedValue::parse(Datatype::Int, " 42 ").unwrap(),
            TypedValue::Int(42)
        );
        assert_eq!(
            TypedValue::parse(Datatype::HexBinary, "deadbeef").unwrap(),
            TypedValue::HexBinary(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
    }

    #[test]
    fn malformed_input_is_a_format_error() {
        for (datatype, text) in [
            (Datatype::Boolean, "yes"),
            (Datatype::Int, "five"),
            (Datatype::UnsignedByte, "-1"),
            (Datatype::Decimal, "1.2.3"),
            (Datatype::DateTime, "yesterday"),
            (Datatype::Duration, "5 minutes"),
            (Datatype::HexBinary, "xyz"),
            (Datatype::LangString, "no language tag"),
        ] {
            let result = TypedValue::parse(datatype, text);
            assert!(
                matches!(result, Err(ValueError::Format(_))),
                "{datatype} {text:?} should fail"
            );
        }
    }

    #[test]
    fn equality_includes_the_datatype() {
        assert_ne!(TypedValue::Int(1), TypedValue::Long(1));
        assert_eq!(TypedValue::Int(1), TypedValue::Int(1));
    }
}
