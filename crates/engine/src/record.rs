use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Property map of one input feature, keyed by upper-cased property name.
///
/// Values are coerced to trimmed text once, here. Empty strings, `null`,
/// arrays and objects are treated as absent. When two source keys differ only
/// in case, the first non-empty one wins.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    values: HashMap<String, String>,
    names: Vec<String>,
}

impl PropertyBag {
    pub fn from_json(properties: &Map<String, Value>) -> Self {
        let mut bag = Self::default();
        for (name, value) in properties {
            bag.insert(name, value);
        }
        bag
    }

    pub fn insert(&mut self, name: &str, value: &Value) {
        self.names.push(name.to_string());
        let Some(text) = coerce(value) else {
            return;
        };
        self.values.entry(name.to_uppercase()).or_insert(text);
    }

    /// Look up by upper-cased key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// First alias with a value.
    pub fn lookup<'a>(&'a self, aliases: &[String]) -> Option<&'a str> {
        aliases.iter().find_map(|alias| self.get(alias))
    }

    /// Property names as they appeared in the source, including empty ones.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn coerce(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// One decoded feature: an opaque geometry plus its properties.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub properties: PropertyBag,
    pub geometry: Value,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::Number((*n).into()),
            Self::Float(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
        }
    }
}

/// A validated record. Field order follows the model's field list; only
/// fields that were present and valid are included.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub fields: Vec<(String, FieldValue)>,
    pub geometry: Value,
}

impl ExtractedRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Render as a GeoJSON feature (`type`, `properties`, `geometry`).
    pub fn to_feature(&self) -> Value {
        let mut properties = Map::new();
        for (name, value) in &self.fields {
            properties.insert(name.clone(), value.to_json());
        }
        let mut feature = Map::new();
        feature.insert("type".into(), Value::String("Feature".into()));
        feature.insert("properties".into(), Value::Object(properties));
        feature.insert("geometry".into(), self.geometry.clone());
        Value::Object(feature)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
