//! Typed parameter values
//!
//! Component links carry their properties as opaque scalar payloads. A payload
//! only gets a type once it is matched against the [`ParameterType`] declared
//! by the component, at render time.

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::ser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{CoreError, Result};

/// Declared type of a component parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Bool,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

/// Raw property payload as supplied by a component link
///
/// Strings, numbers and booleans are kept in their textual form. Maps, lists
/// and nulls are accepted on the wire as well, kept as compact JSON, and only
/// rejected when decoded against a parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawProperty {
    text: String,
    structured: bool,
}

impl RawProperty {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            text: raw.into(),
            structured: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the payload was a map, list or null rather than a scalar
    pub fn is_structured(&self) -> bool {
        self.structured
    }
}

impl From<&str> for RawProperty {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for RawProperty {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<JsonValue> for RawProperty {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::String(s) => Self::new(s),
            JsonValue::Bool(b) => Self::new(b.to_string()),
            JsonValue::Number(n) => Self::new(n.to_string()),
            other => Self {
                text: other.to_string(),
                structured: true,
            },
        }
    }
}

impl fmt::Display for RawProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for RawProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.structured {
            serde_json::from_str::<JsonValue>(&self.text)
                .map_err(ser::Error::custom)?
                .serialize(serializer)
        } else {
            serializer.serialize_str(&self.text)
        }
    }
}

impl<'de> Deserialize<'de> for RawProperty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Self::from)
    }
}

impl JsonSchema for RawProperty {
    fn schema_name() -> String {
        "RawProperty".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        crate::api::preserve_unknown_fields(generator)
    }
}

/// A property decoded against its parameter type
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl ParameterValue {
    /// Decode a raw payload for the named parameter
    pub fn decode(parameter: &str, ty: ParameterType, raw: &RawProperty) -> Result<Self> {
        if raw.is_structured() {
            return Err(CoreError::StructuredProperty {
                parameter: parameter.to_string(),
                expected: ty,
                raw: raw.to_string(),
            });
        }
        match ty {
            ParameterType::String => Ok(Self::String(raw.as_str().to_string())),
            ParameterType::Number => raw
                .as_str()
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Self::Number)
                .ok_or_else(|| CoreError::MalformedNumber {
                    parameter: parameter.to_string(),
                    raw: raw.to_string(),
                }),
            ParameterType::Bool => match raw.as_str().trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Self::Bool(true)),
                "false" => Ok(Self::Bool(false)),
                _ => Err(CoreError::MalformedBool {
                    parameter: parameter.to_string(),
                    raw: raw.to_string(),
                }),
            },
        }
    }

    /// Document representation of this value
    ///
    /// Integral numbers are written as integers so that fields such as
    /// `replicas` or `containerPort` stay valid for the API server.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    JsonValue::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            }
        }
    }
}
