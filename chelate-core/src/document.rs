use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CodecError;
use crate::value::Value;

/// An ordered sequence of named values.
///
/// Field order is insertion order and is preserved through the CBOR framing.
/// Inserting a key that is already present replaces its value in place,
/// keeping the original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Document {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Inserts a field, returning the previous value under that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Builder-style variant of [`Document::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(key, value)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Serializes the document to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        ciborium::into_writer(self, &mut out)
            .map_err(|e| CodecError::encoding(format!("cbor: {e}")))?;
        Ok(out)
    }

    /// Parses a document from CBOR bytes.
    ///
    /// Anything that is not exactly one CBOR map with text keys is a
    /// [`CodecError::MalformedDocument`], including a map followed by
    /// trailing bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        let mut rest = data;
        let doc = ciborium::from_reader(&mut rest)
            .map_err(|e| CodecError::MalformedDocument(e.to_string()))?;
        if !rest.is_empty() {
            return Err(CodecError::MalformedDocument(format!(
                "{} trailing bytes after document",
                rest.len()
            )));
        }
        Ok(doc)
    }

    pub(crate) fn from_map_access<'de, A>(mut map: A) -> Result<Self, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut doc = Document::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            doc.fields.insert(key, value);
        }
        Ok(doc)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Serialize for Document {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.fields.iter())
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DocumentVisitor;

        impl<'de> serde::de::Visitor<'de> for DocumentVisitor {
            type Value = Document;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map with text keys")
            }

            fn visit_map<A>(self, map: A) -> Result<Document, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                Document::from_map_access(map)
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}
