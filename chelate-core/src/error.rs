use crate::value::Value;

/// Error type for encode, decode and registration operations.
///
/// Every variant is fatal to the call that produced it. Nothing is retried
/// internally: an unregistered type or a malformed input cannot succeed
/// without the caller registering the type or supplying different input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("no encoder registered for type {type_name} (field `{field}`)")]
    UnsupportedType { type_name: String, field: String },

    #[error("no codec registered for type {type_name} (field `{field}`)")]
    NotRegistered { type_name: String, field: String },

    #[error("failed to encode field `{field}`: {reason}")]
    EncodingFailure { field: String, reason: String },

    #[error("failed to decode field `{field}`: {reason}")]
    DecodingFailure { field: String, reason: String },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("document field `{key}` has no matching record field")]
    UnknownField { key: String },

    #[error("record {record} has more than one field named `{key}` after lower-casing")]
    FieldNameCollision { record: String, key: String },

    #[error("nesting depth limit of {limit} exceeded")]
    DepthLimitExceeded { limit: usize },
}

impl CodecError {
    /// A per-type encoder rejected a value. The field path is filled in by
    /// the enclosing record codec.
    pub fn encoding(reason: impl Into<String>) -> Self {
        CodecError::EncodingFailure {
            field: String::new(),
            reason: reason.into(),
        }
    }

    /// A per-type decoder rejected a value.
    pub fn decoding(reason: impl Into<String>) -> Self {
        CodecError::DecodingFailure {
            field: String::new(),
            reason: reason.into(),
        }
    }

    /// Decoding failure for a value of the wrong kind.
    pub fn type_mismatch(expected: &str, found: &Value) -> Self {
        Self::decoding(format!("expected {expected}, found {}", found.kind()))
    }

    /// Prefixes the field path of encode, decode and registration failures
    /// with `name`.
    ///
    /// Nested record codecs call this on the way out, so the final path reads
    /// outermost first: `address.street`.
    pub(crate) fn in_field(self, name: &str) -> Self {
        match self {
            CodecError::EncodingFailure { field, reason } => CodecError::EncodingFailure {
                field: join_path(name, &field),
                reason,
            },
            CodecError::DecodingFailure { field, reason } => CodecError::DecodingFailure {
                field: join_path(name, &field),
                reason,
            },
            CodecError::UnsupportedType { type_name, field } => CodecError::UnsupportedType {
                type_name,
                field: join_path(name, &field),
            },
            CodecError::NotRegistered { type_name, field } => CodecError::NotRegistered {
                type_name,
                field: join_path(name, &field),
            },
            other => other,
        }
    }
}

/// Joins two dotted field paths; empty segments are dropped.
pub(crate) fn join_path(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (_, true) => head.to_string(),
        (true, false) => tail.to_string(),
        (false, false) => format!("{head}.{tail}"),
    }
}
