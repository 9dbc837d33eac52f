use serde::Deserialize;

/// What the decoder does with document fields that match no record field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFields {
    /// Skip the value without decoding it.
    #[default]
    Skip,
    /// Fail the decode with [`CodecError::UnknownField`](crate::CodecError::UnknownField).
    Deny,
}

/// Codec settings, fixed when the registry is built.
///
/// Deserializable so an embedding application can keep it in its own
/// configuration file; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum nesting of documents and arrays, counted from the top-level record.
    pub max_depth: usize,
    pub unknown_fields: UnknownFields,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: 64,
            unknown_fields: UnknownFields::Skip,
        }
    }
}
