use std::any::{type_name, Any};
use std::borrow::Cow;
use std::sync::Arc;

use crate::context::{DecodeContext, EncodeContext};
use crate::decoder::decode_fields;
use crate::document::Document;
use crate::encoder::encode_fields;
use crate::error::CodecError;
use crate::registry::{
    wrong_type, zero_default, Entry, RegistryBuilder, TypeTag, ValueDecoder, ValueEncoder,
};
use crate::value::Value;

/// A struct with named fields that the codec can encode to and decode from a
/// [`Document`].
///
/// Usually derived:
///
/// ```
/// use chelate_core::{Record, Registry};
///
/// #[derive(Debug, Default, PartialEq, Record)]
/// #[allow(non_snake_case)]
/// struct MyStruct {
///     Word: String,
///     Number: i64,
///     Flag: bool,
/// }
///
/// let mut builder = Registry::builder();
/// builder.register_defaults().register_record::<MyStruct>().unwrap();
/// let registry = builder.build();
///
/// let doc = registry
///     .encode(&MyStruct { Word: "foo".into(), Number: 42, Flag: true })
///     .unwrap();
/// assert_eq!(doc.keys().collect::<Vec<_>>(), ["word", "number", "flag"]);
/// ```
pub trait Record: Any + Send + Sync + Sized {
    /// The field-descriptor table, in declaration order.
    ///
    /// Called once, when the type is registered.
    fn fields() -> Vec<Field<Self>>;
}

/// Name, declared type and accessors of one record field.
pub struct Field<R> {
    name: &'static str,
    tag: TypeTag,
    access: Box<dyn FieldAccess<R>>,
}

impl<R: 'static> Field<R> {
    pub fn new<T: Any>(
        name: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        Field {
            name,
            tag: TypeTag::of::<T>(),
            access: Box::new(Accessor { get, get_mut }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn get<'a>(&self, record: &'a R) -> &'a dyn Any {
        self.access.get(record)
    }

    pub fn get_mut<'a>(&self, record: &'a mut R) -> &'a mut dyn Any {
        self.access.get_mut(record)
    }
}

trait FieldAccess<R>: Send + Sync {
    fn get<'a>(&self, record: &'a R) -> &'a dyn Any;
    fn get_mut<'a>(&self, record: &'a mut R) -> &'a mut dyn Any;
}

struct Accessor<R, T> {
    get: fn(&R) -> &T,
    get_mut: fn(&mut R) -> &mut T,
}

impl<R, T: Any> FieldAccess<R> for Accessor<R, T> {
    fn get<'a>(&self, record: &'a R) -> &'a dyn Any {
        (self.get)(record)
    }

    fn get_mut<'a>(&self, record: &'a mut R) -> &'a mut dyn Any {
        (self.get_mut)(record)
    }
}

/// The document key for a record field name.
pub fn normalize_key(name: &str) -> Cow<'_, str> {
    if name.chars().all(|c| c.to_lowercase().eq([c])) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(name.to_lowercase())
    }
}

/// Codec for one record type, holding its descriptor table and the
/// normalized key of every field.
pub(crate) struct RecordCodec<R> {
    fields: Vec<Field<R>>,
    keys: Vec<String>,
}

impl<R: Record> RecordCodec<R> {
    pub(crate) fn new() -> Result<Self, CodecError> {
        let fields = R::fields();
        let mut keys: Vec<String> = Vec::with_capacity(fields.len());
        for field in &fields {
            let key = normalize_key(field.name()).into_owned();
            if keys.contains(&key) {
                return Err(CodecError::FieldNameCollision {
                    record: type_name::<R>().to_string(),
                    key,
                });
            }
            keys.push(key);
        }
        Ok(RecordCodec { fields, keys })
    }

    pub(crate) fn encode_document(
        &self,
        ctx: &EncodeContext<'_>,
        record: &R,
    ) -> Result<Document, CodecError> {
        encode_fields(&ctx.nested()?, &self.fields, &self.keys, record)
    }

    pub(crate) fn decode_document(
        &self,
        ctx: &DecodeContext<'_>,
        doc: &Document,
        record: &mut R,
    ) -> Result<(), CodecError> {
        decode_fields(&ctx.nested()?, &self.fields, &self.keys, doc, record)
    }
}

impl<R: Record> ValueEncoder for RecordCodec<R> {
    fn encode(&self, ctx: &EncodeContext<'_>, value: &dyn Any) -> Result<Value, CodecError> {
        let record = value
            .downcast_ref::<R>()
            .ok_or_else(|| CodecError::encoding(wrong_type::<R>()))?;
        self.encode_document(ctx, record).map(Value::Document)
    }
}

impl<R: Record> ValueDecoder for RecordCodec<R> {
    fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError> {
        let record = target
            .downcast_mut::<R>()
            .ok_or_else(|| CodecError::decoding(wrong_type::<R>()))?;
        let Value::Document(doc) = value else {
            return Err(CodecError::type_mismatch("document", value));
        };
        self.decode_document(ctx, doc, record)
    }
}

impl Entry {
    pub(crate) fn record_codec<R: Record>(&self) -> Option<&RecordCodec<R>> {
        self.record.as_ref()?.downcast_ref::<RecordCodec<R>>()
    }
}

impl RegistryBuilder {
    /// Registers a record type. Its descriptor table is built here, once.
    ///
    /// Nested records are encoded as nested documents, and a null decodes as
    /// `R::default()`. Fails with [`CodecError::FieldNameCollision`] when two
    /// field names lower-case to the same key.
    pub fn register_record<R: Record + Default>(&mut self) -> Result<&mut Self, CodecError> {
        let codec = Arc::new(RecordCodec::<R>::new()?);
        log::debug!(
            "registered record {} with fields {:?}",
            type_name::<R>(),
            codec.keys
        );
        let deps = codec
            .fields
            .iter()
            .map(|f| (f.name().to_string(), *f.tag()))
            .collect();
        Ok(self.insert(Entry {
            zero: Some(zero_default::<R>),
            record: Some(codec.clone()),
            deps,
            ..Entry::new(TypeTag::of::<R>(), codec.clone(), codec)
        }))
    }
}
