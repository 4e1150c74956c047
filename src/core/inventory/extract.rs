use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};

static FIELD_PATTERNS: LazyLock<Mutex<HashMap<String, Regex>>> = LazyLock::new(Default::default);

/// Returns the value stored under `key` in a JSON object blob, as text.
///
/// Quoted strings come back as their content and non-negative integers in decimal.
/// `null`, a missing key, and every other value shape give `None`. Only the exact key
/// matches: looking up `id` never finds `vmid`. A repeated key yields its first value.
///
/// The blob is parsed structurally when it is valid JSON, in which case only top-level
/// keys count. Anything that fails to parse is scanned lexically instead, so a
/// truncated or otherwise malformed object still yields whatever fields are readable.
pub fn extract_field(object: &str, key: &str) -> Option<String> {
    match serde_json::from_str::<FirstWins>(object) {
        Ok(FirstWins(Value::Object(map))) => map.get(key).and_then(field_text),
        Ok(_) => None,
        Err(_) => scan_field(object, key),
    }
}

/// Text form of a scalar field value. Shared with the structural list walk.
pub(crate) fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => number.as_u64().map(|n| n.to_string()),
        _ => None,
    }
}

/// A JSON value in which a repeated object key keeps its first value, matching what the
/// lexical scan finds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FirstWins(pub Value);

impl<'de> Deserialize<'de> for FirstWins {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FirstWinsVisitor).map(FirstWins)
    }
}

struct FirstWinsVisitor;

impl<'de> Visitor<'de> for FirstWinsVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        FirstWins::deserialize(deserializer).map(|v| v.0)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(FirstWins(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            let FirstWins(value) = access.next_value()?;
            map.entry(key).or_insert(value);
        }
        Ok(Value::Object(map))
    }
}

/// An integer only counts when a delimiter follows it, so `1.5` or `1e3` never reads as `1`.
fn field_pattern(key: &str) -> Option<Regex> {
    let mut cache = FIELD_PATTERNS.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(re) = cache.get(key) {
        return Some(re.clone());
    }
    let pattern = format!(
        r#""{}"\s*:\s*(?:"([^"]*)"|([0-9]+)\s*(?:[,}}\]]|$)|null\b)"#,
        regex::escape(key)
    );
    let re = Regex::new(&pattern).ok()?;
    cache.insert(key.to_string(), re.clone());
    Some(re)
}

fn scan_field(object: &str, key: &str) -> Option<String> {
    let caps = field_pattern(key)?.captures(object)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}
