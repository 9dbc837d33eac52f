//! Built-in codecs: scalars, pass-through values and the generic containers
//! `Option<T>`, `Vec<T>` and `IndexMap<String, T>`.
//!
//! Container codecs dispatch their elements back through the registry at call
//! time, so the element type only has to be registered by the time the
//! registry is built, not before the container.

use indexmap::IndexMap;
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::{DecodeContext, EncodeContext};
use crate::document::Document;
use crate::error::CodecError;
use crate::registry::{
    wrong_type, zero_default, Entry, FnCodec, RegistryBuilder, TypeTag, ValueDecoder,
    ValueEncoder,
};
use crate::value::{ByteString, Value};

impl RegistryBuilder {
    /// Registers the built-in scalar codecs.
    ///
    /// Every scalar decodes an explicit null as its zero value: `false`, `""`,
    /// `0` or `0.0`.
    pub fn register_defaults(&mut self) -> &mut Self {
        self.register_scalar::<bool>(|v| Ok(Value::Bool(*v)), |v| match v {
            Value::Bool(b) => Ok(*b),
            other => Err(CodecError::type_mismatch("boolean", other)),
        });
        self.register_scalar::<String>(|v| Ok(Value::Text(v.clone())), |v| match v {
            Value::Text(s) => Ok(s.clone()),
            other => Err(CodecError::type_mismatch("text", other)),
        });

        self.register_scalar::<i8>(|v| Ok(Value::from(*v)), decode_int::<i8>);
        self.register_scalar::<i16>(|v| Ok(Value::from(*v)), decode_int::<i16>);
        self.register_scalar::<i32>(|v| Ok(Value::from(*v)), decode_int::<i32>);
        self.register_scalar::<i64>(|v| Ok(Value::from(*v)), decode_int::<i64>);
        self.register_scalar::<u8>(|v| Ok(Value::from(*v)), decode_int::<u8>);
        self.register_scalar::<u16>(|v| Ok(Value::from(*v)), decode_int::<u16>);
        self.register_scalar::<u32>(|v| Ok(Value::from(*v)), decode_int::<u32>);
        self.register_scalar::<u64>(|v| Ok(Value::from(*v)), decode_int::<u64>);

        self.register_scalar::<f32>(|v| Ok(Value::from(*v)), decode_f32);
        self.register_scalar::<f64>(|v| Ok(Value::Float(*v)), decode_f64);

        self.register_scalar::<ByteString>(|v| Ok(Value::Bytes(v.0.clone())), |v| match v {
            Value::Bytes(b) => Ok(ByteString(b.clone())),
            other => Err(CodecError::type_mismatch("bytes", other)),
        });
        self.register_scalar::<Document>(|v| Ok(Value::Document(v.clone())), |v| match v {
            Value::Document(doc) => Ok(doc.clone()),
            other => Err(CodecError::type_mismatch("document", other)),
        });
        self.register_scalar::<Value>(|v| Ok(v.clone()), |v| Ok(v.clone()))
    }

    /// Registers `Option<T>`: `None` encodes as null, and null decodes as `None`.
    pub fn register_option<T>(&mut self) -> &mut Self
    where
        T: Any + Default + Send + Sync,
    {
        let codec = Arc::new(OptionCodec::<T>(PhantomData));
        self.insert(Entry {
            zero: Some(zero_default::<Option<T>>),
            deps: element_dep::<T>(),
            ..Entry::new(TypeTag::of::<Option<T>>(), codec.clone(), codec)
        })
    }

    /// Registers `Vec<T>`, encoded as an array.
    pub fn register_sequence<T>(&mut self) -> &mut Self
    where
        T: Any + Default + Send + Sync,
    {
        let codec = Arc::new(SequenceCodec::<T>(PhantomData));
        self.insert(Entry {
            zero: Some(zero_default::<Vec<T>>),
            deps: element_dep::<T>(),
            ..Entry::new(TypeTag::of::<Vec<T>>(), codec.clone(), codec)
        })
    }

    /// Registers `IndexMap<String, T>`, encoded as a nested document.
    ///
    /// Map keys are written as they are; only record field names are
    /// lower-cased.
    pub fn register_map<T>(&mut self) -> &mut Self
    where
        T: Any + Default + Send + Sync,
    {
        let codec = Arc::new(MapCodec::<T>(PhantomData));
        self.insert(Entry {
            zero: Some(zero_default::<IndexMap<String, T>>),
            deps: element_dep::<T>(),
            ..Entry::new(TypeTag::of::<IndexMap<String, T>>(), codec.clone(), codec)
        })
    }

    fn register_scalar<T>(
        &mut self,
        encode: fn(&T) -> Result<Value, CodecError>,
        decode: fn(&Value) -> Result<T, CodecError>,
    ) -> &mut Self
    where
        T: Any + Default + Send + Sync,
    {
        let codec = Arc::new(FnCodec::new(encode, decode));
        self.register_with_zero(TypeTag::of::<T>(), codec.clone(), codec, zero_default::<T>)
    }
}

fn element_dep<T: Any>() -> Vec<(String, TypeTag)> {
    vec![(String::new(), TypeTag::of::<T>())]
}

fn decode_int<T>(value: &Value) -> Result<T, CodecError>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    let out_of_range =
        |shown: String| CodecError::decoding(format!("{shown} out of range for {}", type_name::<T>()));

    match value {
        Value::Int(i) => <T as TryFrom<i64>>::try_from(*i).map_err(|_| out_of_range(i.to_string())),
        Value::UInt(u) => <T as TryFrom<u64>>::try_from(*u).map_err(|_| out_of_range(u.to_string())),
        // Integral floats are accepted, as long as they fit.
        Value::Float(f) if f.fract() == 0.0 => {
            if *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                <T as TryFrom<i64>>::try_from(*f as i64).map_err(|_| out_of_range(f.to_string()))
            } else if *f >= 0.0 && *f < u64::MAX as f64 {
                <T as TryFrom<u64>>::try_from(*f as u64).map_err(|_| out_of_range(f.to_string()))
            } else {
                Err(out_of_range(f.to_string()))
            }
        }
        Value::Float(f) => Err(CodecError::decoding(format!(
            "{f} is not an integer ({})",
            type_name::<T>()
        ))),
        other => Err(CodecError::type_mismatch("integer", other)),
    }
}

fn decode_f64(value: &Value) -> Result<f64, CodecError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        other => Err(CodecError::type_mismatch("float", other)),
    }
}

fn decode_f32(value: &Value) -> Result<f32, CodecError> {
    let wide = decode_f64(value)?;
    let narrow = wide as f32;
    if f64::from(narrow) == wide || wide.is_nan() || !matches!(value, Value::Float(_)) {
        Ok(narrow)
    } else {
        Err(CodecError::decoding(format!("{wide} does not fit in f32 without loss")))
    }
}

struct OptionCodec<T>(PhantomData<fn() -> T>);

impl<T: Any + Default> ValueEncoder for OptionCodec<T> {
    fn encode(&self, ctx: &EncodeContext<'_>, value: &dyn Any) -> Result<Value, CodecError> {
        let value = value
            .downcast_ref::<Option<T>>()
            .ok_or_else(|| CodecError::encoding(wrong_type::<Option<T>>()))?;
        match value {
            None => Ok(Value::Null),
            Some(inner) => ctx.encode_value(&TypeTag::of::<T>(), inner),
        }
    }
}

impl<T: Any + Default> ValueDecoder for OptionCodec<T> {
    fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError> {
        let target = target
            .downcast_mut::<Option<T>>()
            .ok_or_else(|| CodecError::decoding(wrong_type::<Option<T>>()))?;
        let inner = target.get_or_insert_with(T::default);
        ctx.decode_value(&TypeTag::of::<T>(), value, inner)
    }
}

struct SequenceCodec<T>(PhantomData<fn() -> T>);

impl<T: Any + Default> ValueEncoder for SequenceCodec<T> {
    fn encode(&self, ctx: &EncodeContext<'_>, value: &dyn Any) -> Result<Value, CodecError> {
        let items = value
            .downcast_ref::<Vec<T>>()
            .ok_or_else(|| CodecError::encoding(wrong_type::<Vec<T>>()))?;
        let ctx = ctx.nested()?;
        let tag = TypeTag::of::<T>();
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                ctx.encode_value(&tag, item)
                    .map_err(|e| e.in_field(&i.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

impl<T: Any + Default> ValueDecoder for SequenceCodec<T> {
    fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError> {
        let target = target
            .downcast_mut::<Vec<T>>()
            .ok_or_else(|| CodecError::decoding(wrong_type::<Vec<T>>()))?;
        let Value::Array(elements) = value else {
            return Err(CodecError::type_mismatch("array", value));
        };
        let ctx = ctx.nested()?;
        let tag = TypeTag::of::<T>();

        let mut items = Vec::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            let mut item = T::default();
            ctx.decode_value(&tag, element, &mut item)
                .map_err(|e| e.in_field(&i.to_string()))?;
            items.push(item);
        }
        *target = items;
        Ok(())
    }
}

struct MapCodec<T>(PhantomData<fn() -> T>);

impl<T: Any + Default> ValueEncoder for MapCodec<T> {
    fn encode(&self, ctx: &EncodeContext<'_>, value: &dyn Any) -> Result<Value, CodecError> {
        let map = value
            .downcast_ref::<IndexMap<String, T>>()
            .ok_or_else(|| CodecError::encoding(wrong_type::<IndexMap<String, T>>()))?;
        let ctx = ctx.nested()?;
        let tag = TypeTag::of::<T>();

        let mut doc = Document::with_capacity(map.len());
        for (key, item) in map {
            let encoded = ctx.encode_value(&tag, item).map_err(|e| e.in_field(key))?;
            doc.insert(key.clone(), encoded);
        }
        Ok(Value::Document(doc))
    }
}

impl<T: Any + Default> ValueDecoder for MapCodec<T> {
    fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError> {
        let target = target
            .downcast_mut::<IndexMap<String, T>>()
            .ok_or_else(|| CodecError::decoding(wrong_type::<IndexMap<String, T>>()))?;
        let Value::Document(doc) = value else {
            return Err(CodecError::type_mismatch("document", value));
        };
        let ctx = ctx.nested()?;
        let tag = TypeTag::of::<T>();

        let mut map = IndexMap::with_capacity(doc.len());
        for (key, element) in doc.iter() {
            let mut item = T::default();
            ctx.decode_value(&tag, element, &mut item)
                .map_err(|e| e.in_field(key))?;
            map.insert(key.to_string(), item);
        }
        *target = map;
        Ok(())
    }
}
