//! Raw platform payload layout.
//!
//! The platform is loose about empty values: it sends `[]` where an object
//! or null is expected (`range`, `name`, label entries, item names) and
//! sometimes numbers where strings are expected. The types here absorb those
//! quirks during deserialization so the parser only sees normalised values.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Language-keyed text such as `{"de": "Wie alt bist du?"}`.
///
/// A bare string is kept under the empty key; anything that is not an
/// object or string normalises to no text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub struct LangText(BTreeMap<String, String>);

impl LangText {
    /// Text in `language`, else the first non-empty translation.
    pub fn resolve(&self, language: &str) -> Option<&str> {
        self.0
            .get(language)
            .map(String::as_str)
            .filter(|text| !text.trim().is_empty())
            .or_else(|| {
                self.0
                    .values()
                    .map(String::as_str)
                    .find(|text| !text.trim().is_empty())
            })
    }
}

impl From<Value> for LangText {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(
                map.into_iter()
                    .filter_map(|(lang, text)| scalar_text(text).map(|text| (lang, text)))
                    .collect(),
            ),
            Value::String(text) => Self(BTreeMap::from([(String::new(), text)])),
            _ => Self::default(),
        }
    }
}

/// A scalar that may arrive as a string or a number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub struct RawScalar(pub Option<String>);

impl From<Value> for RawScalar {
    fn from(value: Value) -> Self {
        Self(scalar_text(value))
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Numeric bounds, sent either as `[min, max, step]` or `{"min": .., "max": ..}`.
///
/// `[]` and `null` normalise to [`RawRange::Absent`]; shapes that cannot be
/// read as bounds are kept as [`RawRange::Invalid`] for the parser to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawRange {
    #[default]
    Absent,
    Bounds { min: i64, max: i64 },
    Invalid(Value),
}

impl<'de> Deserialize<'de> for RawRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(RawRange::from(Value::deserialize(deserializer)?))
    }
}

impl From<Value> for RawRange {
    fn from(value: Value) -> Self {
        let bounds = match &value {
            Value::Null => return RawRange::Absent,
            Value::Array(values) if values.is_empty() => return RawRange::Absent,
            Value::Array(values) if values.len() >= 2 => {
                integer_of(&values[0]).zip(integer_of(&values[1]))
            }
            Value::Object(map) => map
                .get("min")
                .and_then(integer_of)
                .zip(map.get("max").and_then(integer_of)),
            _ => None,
        };
        match bounds {
            Some((min, max)) => RawRange::Bounds { min, max },
            None => RawRange::Invalid(value),
        }
    }
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral_f64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Whole floats that fit `i64`; anything else is not a bound.
fn integral_f64(value: f64) -> Option<i64> {
    // 2^63, the first float past `i64::MAX`.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (value.is_finite() && value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value))
        .then(|| value as i64)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(default)]
    pub id: RawScalar,
    #[serde(default)]
    pub name: LangText,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub range: RawRange,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroup {
    #[serde(default)]
    pub name: LangText,
    pub varnames: Option<Vec<RawScalar>>,
    #[serde(default)]
    pub items: Vec<RawItem>,
    #[serde(default)]
    pub labels: Vec<LangText>,
    #[serde(default)]
    pub codes: Vec<RawScalar>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub range: RawRange,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub question: LangText,
    pub position: Option<i64>,
    pub page_id: Option<i64>,
    pub groups: Option<Vec<RawGroup>>,
}
