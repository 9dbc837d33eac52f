use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::config::Config;
use crate::context::{DecodeContext, EncodeContext};
use crate::error::{join_path, CodecError};
use crate::value::Value;

/// Runtime type descriptor: the `TypeId` used for dispatch plus the type's
/// name for error messages. Equality and hashing use the id only.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: Any>() -> Self {
        TypeTag {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn erased(id: TypeId) -> Self {
        TypeTag {
            id,
            name: "<unnamed>",
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

/// Turns a value of one registered type into a [`Value`].
///
/// `value` is guaranteed to have the `TypeId` the encoder was registered
/// under; implementations downcast it.
pub trait ValueEncoder: Send + Sync {
    fn encode(&self, ctx: &EncodeContext<'_>, value: &dyn Any) -> Result<Value, CodecError>;
}

/// Writes a non-null [`Value`] into an existing instance of one registered type.
///
/// Null values never reach a decoder; the caller resets the target to the
/// type's zero value instead.
pub trait ValueDecoder: Send + Sync {
    fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError>;
}

/// Resets a value to its zero when the document holds an explicit null.
pub type ZeroFn = fn(&mut dyn Any);

/// Zero-setter that assigns `T::default()`.
pub fn zero_default<T: Any + Default>(target: &mut dyn Any) {
    if let Some(target) = target.downcast_mut::<T>() {
        *target = T::default();
    }
}

pub(crate) struct Entry {
    pub(crate) tag: TypeTag,
    pub(crate) encoder: Arc<dyn ValueEncoder>,
    pub(crate) decoder: Arc<dyn ValueDecoder>,
    pub(crate) zero: Option<ZeroFn>,
    /// Typed record codec, present for entries installed by `register_record`.
    pub(crate) record: Option<Arc<dyn Any + Send + Sync>>,
    /// Types this codec dispatches to, labelled with the field path segment
    /// they sit under (empty for container elements).
    pub(crate) deps: Vec<(String, TypeTag)>,
    /// First type reachable from this one that has no registration, with its
    /// path. Filled in by `build`.
    pub(crate) unresolved: Option<(String, TypeTag)>,
}

impl Entry {
    pub(crate) fn new(
        tag: TypeTag,
        encoder: Arc<dyn ValueEncoder>,
        decoder: Arc<dyn ValueDecoder>,
    ) -> Self {
        Entry {
            tag,
            encoder,
            decoder,
            zero: None,
            record: None,
            deps: Vec::new(),
            unresolved: None,
        }
    }

    /// Fails with `NotRegistered` when any type nested under this one lacks
    /// a codec.
    pub(crate) fn check_resolved(&self) -> Result<(), CodecError> {
        match &self.unresolved {
            None => Ok(()),
            Some((path, missing)) => Err(CodecError::NotRegistered {
                type_name: missing.name().to_string(),
                field: path.clone(),
            }),
        }
    }
}

/// Collects codec registrations. [`RegistryBuilder::build`] freezes them into
/// an immutable [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<TypeId, Entry>,
    config: Config,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an encoder and decoder for the type described by `tag`.
    ///
    /// Registering the same type twice replaces the earlier handlers.
    pub fn register(
        &mut self,
        tag: TypeTag,
        encoder: Arc<dyn ValueEncoder>,
        decoder: Arc<dyn ValueDecoder>,
    ) -> &mut Self {
        self.insert(Entry::new(tag, encoder, decoder))
    }

    /// Like [`RegistryBuilder::register`], with a zero-setter applied when a
    /// document holds an explicit null for a field of this type.
    pub fn register_with_zero(
        &mut self,
        tag: TypeTag,
        encoder: Arc<dyn ValueEncoder>,
        decoder: Arc<dyn ValueDecoder>,
        zero: ZeroFn,
    ) -> &mut Self {
        self.insert(Entry {
            zero: Some(zero),
            ..Entry::new(tag, encoder, decoder)
        })
    }

    /// Registers `T` with a pair of typed functions.
    ///
    /// ```
    /// use chelate_core::{CodecError, Registry, Value};
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Celsius(f64);
    ///
    /// let mut builder = Registry::builder();
    /// builder.register_fn::<Celsius, _, _>(
    ///     |c| Ok(Value::Float(c.0)),
    ///     |v| match v {
    ///         Value::Float(f) => Ok(Celsius(*f)),
    ///         other => Err(CodecError::type_mismatch("float", other)),
    ///     },
    /// );
    /// let registry = builder.build();
    /// assert_eq!(registry.len(), 1);
    /// ```
    pub fn register_fn<T, E, D>(&mut self, encode: E, decode: D) -> &mut Self
    where
        T: Any + Send + Sync,
        E: Fn(&T) -> Result<Value, CodecError> + Send + Sync + 'static,
        D: Fn(&Value) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        let codec = Arc::new(FnCodec::new(encode, decode));
        self.register(TypeTag::of::<T>(), codec.clone(), codec)
    }

    /// Sets the codec configuration carried by the built registry.
    pub fn with_config(&mut self, config: Config) -> &mut Self {
        self.config = config;
        self
    }

    pub(crate) fn insert(&mut self, entry: Entry) -> &mut Self {
        let id = entry.tag.id();
        let name = entry.tag.name();
        if self.entries.insert(id, entry).is_some() {
            log::debug!("replacing codec registration for {name}");
        }
        self
    }

    /// Freezes the registrations. The result has no mutating methods and can
    /// be shared across threads.
    ///
    /// Types whose nested field or element types were never registered stay
    /// in the registry, but decoding them fails with
    /// [`CodecError::NotRegistered`] before the target is touched.
    pub fn build(mut self) -> Registry {
        let unresolved: Vec<(TypeId, (String, TypeTag))> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| first_missing(&self.entries, entry).map(|m| (*id, m)))
            .collect();
        for (id, (path, missing)) in unresolved {
            if let Some(entry) = self.entries.get_mut(&id) {
                log::debug!(
                    "{} depends on unregistered {} at `{path}`",
                    entry.tag.name(),
                    missing.name()
                );
                entry.unresolved = Some((path, missing));
            }
        }

        Registry {
            entries: self.entries,
            config: self.config,
        }
    }
}

/// Depth-first walk over the dependencies of `root`, returning the path to
/// the first type without an entry.
fn first_missing(entries: &HashMap<TypeId, Entry>, root: &Entry) -> Option<(String, TypeTag)> {
    let mut seen: HashSet<TypeId> = HashSet::from([root.tag.id()]);
    let mut stack: Vec<(String, TypeTag)> = root.deps.iter().rev().cloned().collect();

    while let Some((path, tag)) = stack.pop() {
        if !seen.insert(tag.id()) {
            continue;
        }
        let Some(entry) = entries.get(&tag.id()) else {
            return Some((path, tag));
        };
        for (label, dep) in entry.deps.iter().rev() {
            stack.push((join_path(&path, label), *dep));
        }
    }
    None
}

/// Frozen table mapping types to their encoder and decoder.
///
/// Built once through [`Registry::builder`], then shared immutably (e.g. in an
/// `Arc`) by any number of concurrent encode and decode calls.
pub struct Registry {
    entries: HashMap<TypeId, Entry>,
    config: Config,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry holding only the built-in scalar codecs.
    pub fn with_defaults() -> Self {
        let mut builder = RegistryBuilder::new();
        builder.register_defaults();
        builder.build()
    }

    pub fn lookup_encoder(&self, tag: &TypeTag) -> Result<&dyn ValueEncoder, CodecError> {
        self.entry(tag).map(|e| e.encoder.as_ref())
    }

    pub fn lookup_decoder(&self, tag: &TypeTag) -> Result<&dyn ValueDecoder, CodecError> {
        self.entry(tag).map(|e| e.decoder.as_ref())
    }

    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.entries.contains_key(&tag.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn entry(&self, tag: &TypeTag) -> Result<&Entry, CodecError> {
        self.entries
            .get(&tag.id())
            .ok_or_else(|| CodecError::NotRegistered {
                type_name: tag.name().to_string(),
                field: String::new(),
            })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.values().map(|e| e.tag.name()).collect();
        names.sort_unstable();
        f.debug_struct("Registry")
            .field("types", &names)
            .field("config", &self.config)
            .finish()
    }
}

/// Adapter from a pair of typed functions to the type-erased codec traits.
pub(crate) struct FnCodec<T, E, D> {
    encode: E,
    decode: D,
    _type: std::marker::PhantomData<fn() -> T>,
}

impl<T, E, D> FnCodec<T, E, D> {
    pub(crate) fn new(encode: E, decode: D) -> Self {
        FnCodec {
            encode,
            decode,
            _type: std::marker::PhantomData,
        }
    }
}

impl<T, E, D> ValueEncoder for FnCodec<T, E, D>
where
    T: Any,
    E: Fn(&T) -> Result<Value, CodecError> + Send + Sync,
    D: Send + Sync,
{
    fn encode(&self, _ctx: &EncodeContext<'_>, value: &dyn Any) -> Result<Value, CodecError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| CodecError::encoding(wrong_type::<T>()))?;
        (self.encode)(value)
    }
}

impl<T, E, D> ValueDecoder for FnCodec<T, E, D>
where
    T: Any,
    E: Send + Sync,
    D: Fn(&Value) -> Result<T, CodecError> + Send + Sync,
{
    fn decode(
        &self,
        _ctx: &DecodeContext<'_>,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError> {
        let target = target
            .downcast_mut::<T>()
            .ok_or_else(|| CodecError::decoding(wrong_type::<T>()))?;
        *target = (self.decode)(value)?;
        Ok(())
    }
}

pub(crate) fn wrong_type<T>() -> String {
    format!(
        "codec for {} received a value of another type",
        std::any::type_name::<T>()
    )
}
