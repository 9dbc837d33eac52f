use crate::context::EncodeContext;
use crate::document::Document;
use crate::error::CodecError;
use crate::record::{Field, Record};
use crate::registry::{Registry, TypeTag};
use crate::value::Value;

/// Serializes records into documents.
///
/// Each field becomes one `(key, value)` pair, in declaration order, keyed by
/// the lower-cased field name. The input record is never mutated, and any
/// failure discards the partial document.
#[derive(Clone, Copy)]
pub struct Encoder<'r> {
    registry: &'r Registry,
}

impl<'r> Encoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Encoder { registry }
    }

    pub fn encode<R: Record>(&self, record: &R) -> Result<Document, CodecError> {
        let tag = TypeTag::of::<R>();
        let entry = self
            .registry
            .entry(&tag)
            .map_err(|_| CodecError::UnsupportedType {
                type_name: tag.name().to_string(),
                field: String::new(),
            })?;
        let ctx = EncodeContext::new(self.registry);

        if let Some(codec) = entry.record_codec::<R>() {
            return codec.encode_document(&ctx, record);
        }
        // Record type registered with a hand-written codec.
        match entry.encoder.encode(&ctx, record)? {
            Value::Document(doc) => Ok(doc),
            other => Err(CodecError::encoding(format!(
                "{} encoded as {} instead of a document",
                tag.name(),
                other.kind()
            ))),
        }
    }

    /// Encodes a record straight to CBOR bytes.
    pub fn encode_to_vec<R: Record>(&self, record: &R) -> Result<Vec<u8>, CodecError> {
        self.encode(record)?.to_bytes()
    }
}

impl Registry {
    pub fn encoder(&self) -> Encoder<'_> {
        Encoder::new(self)
    }

    /// Shorthand for `self.encoder().encode(record)`.
    pub fn encode<R: Record>(&self, record: &R) -> Result<Document, CodecError> {
        self.encoder().encode(record)
    }

    pub fn encode_to_vec<R: Record>(&self, record: &R) -> Result<Vec<u8>, CodecError> {
        self.encoder().encode_to_vec(record)
    }
}

pub(crate) fn encode_fields<R: 'static>(
    ctx: &EncodeContext<'_>,
    fields: &[Field<R>],
    keys: &[String],
    record: &R,
) -> Result<Document, CodecError> {
    let mut doc = Document::with_capacity(fields.len());
    for (field, key) in fields.iter().zip(keys) {
        let value = ctx
            .encode_value(field.tag(), field.get(record))
            .map_err(|e| e.in_field(field.name()))?;
        doc.insert(key.as_str(), value);
    }
    Ok(doc)
}
