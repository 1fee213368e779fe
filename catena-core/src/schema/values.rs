use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{ChatMessage, Document, StringifyOptions, stringify_messages};
use crate::error::{CatenaError, Result};

/// A typed value stored under one key of [`ChainValues`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Documents(Vec<Document>),
    Messages(Vec<ChatMessage>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Variant name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Documents(_) => "documents",
            Value::Messages(_) => "messages",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_documents(&self) -> Option<&[Document]> {
        match self {
            Value::Documents(docs) => Some(docs),
            _ => None,
        }
    }

    pub fn as_messages(&self) -> Option<&[ChatMessage]> {
        match self {
            Value::Messages(messages) => Some(messages),
            _ => None,
        }
    }

    /// Text form substituted into templates.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Documents(docs) => docs
                .iter()
                .map(|d| d.page_content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            Value::Messages(messages) => stringify_messages(messages, &StringifyOptions::default()),
            Value::List(items) => items
                .iter()
                .map(Value::render)
                .collect::<Vec<_>>()
                .join("\n"),
            Value::Map(map) => serde_json::to_string(map).unwrap_or_default(),
        }
    }

    /// Convert arbitrary JSON (document metadata, parsed files) into a value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::String(String::new()),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Document>> for Value {
    fn from(docs: Vec<Document>) -> Self {
        Value::Documents(docs)
    }
}

impl From<Vec<ChatMessage>> for Value {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Value::Messages(messages)
    }
}

/// Named inputs/outputs exchanged between components.
///
/// Values are owned: cloning a `ChainValues` gives the receiver an
/// independent view that cannot affect the sender.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainValues(HashMap<String, Value>);

impl ChainValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a required key.
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.0.get(key).ok_or_else(|| {
            CatenaError::InvalidInputValues(format!("no value for input key '{}'", key))
        })
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| wrong_type(key, "string", value))
    }

    pub fn get_number(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value.as_number().ok_or_else(|| wrong_type(key, "number", value))
    }

    pub fn get_messages(&self, key: &str) -> Result<&[ChatMessage]> {
        let value = self.require(key)?;
        value.as_messages().ok_or_else(|| wrong_type(key, "messages", value))
    }

    /// Document list under `key`; an empty list is rejected.
    pub fn get_documents(&self, key: &str) -> Result<&[Document]> {
        let value = self.require(key)?;
        let docs = value
            .as_documents()
            .ok_or_else(|| wrong_type(key, "documents", value))?;
        if docs.is_empty() {
            return Err(CatenaError::InvalidInputValues(format!(
                "no documents under input key '{}'",
                key
            )));
        }
        Ok(docs)
    }

    /// Merge `other` into `self`; keys from `other` overwrite.
    pub fn merge(&mut self, other: ChainValues) {
        self.0.extend(other.0);
    }

    /// Copy without the given keys.
    pub fn omit(&self, keys: &[&str]) -> ChainValues {
        ChainValues(
            self.0
                .iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Copy holding only the given keys that are present.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> ChainValues {
        ChainValues(
            keys.iter()
                .filter_map(|k| {
                    self.0
                        .get_key_value(k.as_ref())
                        .map(|(k, v)| (k.clone(), v.clone()))
                })
                .collect(),
        )
    }

    /// First key from `keys` that is absent, if any.
    pub fn missing_key<S: AsRef<str>>(&self, keys: &[S]) -> Option<String> {
        keys.iter()
            .find(|k| !self.0.contains_key(k.as_ref()))
            .map(|k| k.as_ref().to_string())
    }
}

fn wrong_type(key: &str, expected: &'static str, actual: &Value) -> CatenaError {
    CatenaError::WrongType {
        key: key.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for ChainValues {
    fn from(pairs: [(K, V); N]) -> Self {
        ChainValues(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for ChainValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        ChainValues(iter.into_iter().collect())
    }
}

impl IntoIterator for ChainValues {
    type Item = (String, Value);
    type IntoIter = std::collections::hash_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
