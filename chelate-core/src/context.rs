use std::any::Any;

use crate::error::CodecError;
use crate::registry::{Entry, Registry, TypeTag};
use crate::value::Value;

/// State handed to every encoder: the registry for nested dispatch and the
/// current nesting depth.
#[derive(Clone, Copy, Debug)]
pub struct EncodeContext<'r> {
    registry: &'r Registry,
    depth: usize,
}

impl<'r> EncodeContext<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        EncodeContext { registry, depth: 0 }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context for one level deeper, or `DepthLimitExceeded`.
    pub fn nested(&self) -> Result<Self, CodecError> {
        let depth = enter(self.registry, self.depth)?;
        Ok(EncodeContext { depth, ..*self })
    }

    /// Encodes `value` with the encoder registered for its runtime type.
    ///
    /// `declared` names the type in the error when nothing is registered.
    pub fn encode_value(&self, declared: &TypeTag, value: &dyn Any) -> Result<Value, CodecError> {
        let runtime = runtime_tag(declared, value);
        let encoder = self
            .registry
            .lookup_encoder(&runtime)
            .map_err(|_| CodecError::UnsupportedType {
                type_name: declared.name().to_string(),
                field: String::new(),
            })?;
        encoder.encode(self, value)
    }
}

/// State handed to every decoder.
#[derive(Clone, Copy)]
pub struct DecodeContext<'r> {
    registry: &'r Registry,
    depth: usize,
}

impl<'r> DecodeContext<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        DecodeContext { registry, depth: 0 }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn nested(&self) -> Result<Self, CodecError> {
        let depth = enter(self.registry, self.depth)?;
        Ok(DecodeContext { depth, ..*self })
    }

    /// Decodes `value` into `target`, whose type is `tag`.
    ///
    /// A null value resets `target` to the type's zero instead of reaching
    /// the decoder.
    pub fn decode_value(
        &self,
        tag: &TypeTag,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError> {
        let entry = self.registry.entry(tag)?;
        entry.check_resolved()?;
        self.decode_with(entry, value, target)
    }

    pub(crate) fn decode_with(
        &self,
        entry: &Entry,
        value: &Value,
        target: &mut dyn Any,
    ) -> Result<(), CodecError> {
        if value.is_null() {
            set_zero(entry, target);
            Ok(())
        } else {
            entry.decoder.decode(self, value, target)
        }
    }
}

pub(crate) fn set_zero(entry: &Entry, target: &mut dyn Any) {
    match entry.zero {
        Some(zero) => zero(target),
        None => log::debug!(
            "null for {} left unchanged: no zero value registered",
            entry.tag.name()
        ),
    }
}

fn enter(registry: &Registry, depth: usize) -> Result<usize, CodecError> {
    let limit = registry.config().max_depth;
    if depth >= limit {
        return Err(CodecError::DepthLimitExceeded { limit });
    }
    Ok(depth + 1)
}

/// The declared tag if it matches the value, otherwise an anonymous tag for
/// the value's runtime type.
fn runtime_tag(declared: &TypeTag, value: &dyn Any) -> TypeTag {
    if declared.id() == value.type_id() {
        *declared
    } else {
        TypeTag::erased(value.type_id())
    }
}
