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

use serde::{Deserialize, Serialize};

/// Primitive datatypes a [`crate::TypedValue`] can carry.
///
/// Wire names follow the XSD-style names used by twin descriptions
/// (`xs:int`, `xs:dateTime`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Datatype {
    /// `xs:boolean`
    Boolean,
    /// `xs:byte`
    Byte,
    /// `xs:short`
    Short,
    /// `xs:int`
    Int,
    /// `xs:long`
    Long,
    /// `xs:unsignedByte`
    UnsignedByte,
    /// `xs:unsignedShort`
    UnsignedShort,
    /// `xs:unsignedInt`
    UnsignedInt,
    /// `xs:unsignedLong`
    UnsignedLong,
    /// `xs:integer`, arbitrary precision (i128 backed)
    Integer,
    /// `xs:float`
    Float,
    /// `xs:double`
    Double,
    /// `xs:decimal`, canonical-text backed
    Decimal,
    /// `xs:string`
    String,
    /// `xs:anyURI`
    AnyUri,
    /// `xs:dateTime`
    DateTime,
    /// `xs:date`
    Date,
    /// `xs:time`
    Time,
    /// `xs:duration`, lexical ISO-8601 form
    Duration,
    /// `xs:hexBinary`
    HexBinary,
    /// `xs:base64Binary`
    Base64Binary,
    /// `rdf:langString`
    LangString,
}

const NAME_TABLE: &[(Datatype, &str)] = &[
    (Datatype::Boolean, "xs:boolean"),
    (Datatype::Byte, "xs:byte"),
    (Datatype::Short, "xs:short"),
    (Datatype::Int, "xs:int"),
    (Datatype::Long, "xs:long"),
    (Datatype::UnsignedByte, "xs:unsignedByte"),
    (Datatype::UnsignedShort, "xs:unsignedShort"),
    (Datatype::UnsignedInt, "xs:unsignedInt"),
    (Datatype::UnsignedLong, "xs:unsignedLong"),
    (Datatype::Integer, "xs:integer"),
    (Datatype::Float, "xs:float"),
    (Datatype::Double, "xs:double"),
    (Datatype::Decimal, "xs:decimal"),
    (Datatype::String, "xs:string"),
    (Datatype::AnyUri, "xs:anyURI"),
    (Datatype::DateTime, "xs:dateTime"),
    (Datatype::Date, "xs:date"),
    (Datatype::Time, "xs:time"),
    (Datatype::Duration, "xs:duration"),
    (Datatype::HexBinary, "xs:hexBinary"),
    (Datatype::Base64Binary, "xs:base64Binary"),
    (Datatype::LangString, "rdf:langString"),
];

impl Datatype {
    /// Fallback datatype when a wire name is unknown.
    pub const DEFAULT: Datatype = Datatype::String;

    /// Wire name of the datatype, e.g. `xs:int`.
    pub fn name(&self) -> &'static str {
        NAME_TABLE
            .iter()
            .find(|(datatype, _)| datatype == self)
            .map(|(_, name)| *name)
            .expect("every datatype has a wire name")
    }

    /// Resolve a wire name, falling back to [`Datatype::DEFAULT`] for
    /// unknown names. Matching is case-sensitive.
    pub fn from_name(name: &str) -> Datatype {
        Self::try_from_name(name).unwrap_or(Self::DEFAULT)
    }

    /// Strict variant of [`Datatype::from_name`].
    pub fn try_from_name(name: &str) -> Option<Datatype> {
        NAME_TABLE
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(datatype, _)| *datatype)
    }

    /// Whether values of this datatype render as numeric literals.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Datatype::Byte
                | Datatype::Short
                | Datatype::Int
                | Datatype::Long
                | Datatype::UnsignedByte
                | Datatype::UnsignedShort
                | Datatype::UnsignedInt
                | Datatype::UnsignedLong
                | Datatype::Integer
                | Datatype::Float
                | Datatype::Double
                | Datatype::Decimal
        )
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for (datatype, name) in NAME_TABLE {
            assert_eq!(Datatype::try_from_name(name), Some(*datatype));
            assert_eq!(datatype.name(), *name);
        }
    }

    #[test]
    fn unknown_name_falls_back_to_string() {
        assert_eq!(Datatype::from_name("xs:gMonthDay"), Datatype::String);
        assert_eq!(Datatype::try_from_name("xs:gMonthDay"), None);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(Datatype::try_from_name("XS:INT"), None);
        assert_eq!(Datatype::from_name("XS:INT"), Datatype::String);
    }
}
