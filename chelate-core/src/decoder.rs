use std::collections::HashMap;

use crate::config::UnknownFields;
use crate::context::{set_zero, DecodeContext};
use crate::document::Document;
use crate::error::CodecError;
use crate::record::{normalize_key, Field, Record};
use crate::registry::{Entry, Registry, TypeTag};
use crate::value::Value;

/// Populates records from documents, in place.
///
/// Document keys are matched to record fields case-insensitively. A null
/// value resets its field to the field type's zero; a key that is absent
/// leaves its field untouched. A failed decode does not roll back fields
/// written before the failure, so the target should be discarded.
#[derive(Clone, Copy)]
pub struct Decoder<'r> {
    registry: &'r Registry,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Decoder { registry }
    }

    pub fn decode<R: Record>(&self, doc: &Document, target: &mut R) -> Result<(), CodecError> {
        let tag = TypeTag::of::<R>();
        let entry = self.registry.entry(&tag)?;
        let ctx = DecodeContext::new(self.registry);

        match entry.record_codec::<R>() {
            Some(codec) => codec.decode_document(&ctx, doc, target),
            None => entry
                .decoder
                .decode(&ctx, &Value::Document(doc.clone()), target),
        }
    }

    /// Parses a CBOR document and decodes it into `target`.
    ///
    /// The bytes are parsed in full before any field is touched, so a
    /// [`CodecError::MalformedDocument`] leaves `target` unchanged.
    pub fn decode_bytes<R: Record>(&self, data: &[u8], target: &mut R) -> Result<(), CodecError> {
        let doc = Document::from_bytes(data)?;
        self.decode(&doc, target)
    }
}

impl Registry {
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(self)
    }

    /// Shorthand for `self.decoder().decode(doc, target)`.
    pub fn decode<R: Record>(&self, doc: &Document, target: &mut R) -> Result<(), CodecError> {
        self.decoder().decode(doc, target)
    }

    pub fn decode_from_slice<R: Record>(&self, data: &[u8], target: &mut R) -> Result<(), CodecError> {
        self.decoder().decode_bytes(data, target)
    }
}

pub(crate) fn decode_fields<R: 'static>(
    ctx: &DecodeContext<'_>,
    fields: &[Field<R>],
    keys: &[String],
    doc: &Document,
    record: &mut R,
) -> Result<(), CodecError> {
    // Every field type, and everything nested under it, must have a decoder
    // before anything is written.
    let mut by_key: HashMap<&str, (usize, &Entry)> = HashMap::with_capacity(fields.len());
    for (index, (field, key)) in fields.iter().zip(keys).enumerate() {
        let entry = ctx
            .registry()
            .entry(field.tag())
            .and_then(|entry| entry.check_resolved().map(|()| entry))
            .map_err(|e| e.in_field(field.name()))?;
        by_key.insert(key.as_str(), (index, entry));
    }

    for (name, value) in doc.iter() {
        let key = normalize_key(name);
        let Some(&(index, entry)) = by_key.get(&*key) else {
            match ctx.registry().config().unknown_fields {
                UnknownFields::Skip => {
                    log::trace!("skipping `{name}`: no matching field");
                    continue;
                }
                UnknownFields::Deny => {
                    return Err(CodecError::UnknownField {
                        key: name.to_string(),
                    });
                }
            }
        };

        let field = &fields[index];
        let target = field.get_mut(record);
        if value.is_null() {
            log::trace!("`{name}` is null, resetting {}", field.name());
            set_zero(entry, target);
        } else {
            log::trace!("decoding `{name}` into {}", field.name());
            entry
                .decoder
                .decode(ctx, value, target)
                .map_err(|e| e.in_field(field.name()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[derive(Debug, Default, PartialEq)]
    #[allow(non_snake_case)]
    struct MyStruct {
        Word: String,
        Number: i64,
        Flag: bool,
    }

    impl Record for MyStruct {
        fn fields() -> Vec<Field<Self>> {
            vec![
                Field::new("Word", |r: &MyStruct| &r.Word, |r: &mut MyStruct| &mut r.Word),
                Field::new("Number", |r: &MyStruct| &r.Number, |r: &mut MyStruct| &mut r.Number),
                Field::new("Flag", |r: &MyStruct| &r.Flag, |r: &mut MyStruct| &mut r.Flag),
            ]
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Wide {
        label: String,
        big: u128,
    }

    impl Record for Wide {
        fn fields() -> Vec<Field<Self>> {
            vec![
                Field::new("label", |r: &Wide| &r.label, |r: &mut Wide| &mut r.label),
                Field::new("big", |r: &Wide| &r.big, |r: &mut Wide| &mut r.big),
            ]
        }
    }

    fn registry_with(config: Config) -> Registry {
        let mut builder = Registry::builder();
        builder
            .with_config(config)
            .register_defaults()
            .register_record::<MyStruct>()
            .unwrap()
            .register_record::<Wide>()
            .unwrap();
        builder.build()
    }

    fn registry() -> Registry {
        registry_with(Config::default())
    }

    #[test]
    fn decodes_matching_fields() {
        let doc = Document::new()
            .with("word", "foo")
            .with("number", 42)
            .with("flag", true);
        let mut target = MyStruct::default();

        registry().decode(&doc, &mut target).unwrap();

        assert_eq!(
            target,
            MyStruct {
                Word: "foo".into(),
                Number: 42,
                Flag: true
            }
        );
    }

    #[test]
    fn null_resets_and_absent_is_untouched() {
        let doc = Document::new().with("word", Value::Null).with("number", 42);
        let mut target = MyStruct {
            Word: "stale".into(),
            Number: 1,
            Flag: true,
        };

        registry().decode(&doc, &mut target).unwrap();

        assert_eq!(
            target,
            MyStruct {
                Word: String::new(),
                Number: 42,
                Flag: true
            }
        );
    }

    #[test]
    fn document_keys_match_case_insensitively() {
        let doc = Document::new().with("WORD", "loud").with("nUmBeR", 7);
        let mut target = MyStruct::default();
        registry().decode(&doc, &mut target).unwrap();
        assert_eq!(target.Word, "loud");
        assert_eq!(target.Number, 7);
    }

    #[test]
    fn unknown_fields_are_skipped_by_default() {
        let doc = Document::new()
            .with("extra", Value::Array(vec![Value::Null]))
            .with("flag", true);
        let mut target = MyStruct::default();
        registry().decode(&doc, &mut target).unwrap();
        assert!(target.Flag);
    }

    #[test]
    fn unknown_fields_can_be_denied() {
        let registry = registry_with(Config {
            unknown_fields: UnknownFields::Deny,
            ..Config::default()
        });
        let doc = Document::new().with("flag", true).with("Extra", 1);
        let mut target = MyStruct::default();

        let err = registry.decode(&doc, &mut target).unwrap_err();

        assert_eq!(err, CodecError::UnknownField { key: "Extra".into() });
        // Fields before the unknown key were already written.
        assert!(target.Flag);
    }

    #[test]
    fn missing_field_decoder_fails_before_mutation() {
        let doc = Document::new().with("label", "new").with("big", 1);
        let mut target = Wide {
            label: "old".into(),
            big: 5,
        };

        let err = registry().decode(&doc, &mut target).unwrap_err();

        assert_eq!(
            err,
            CodecError::NotRegistered {
                type_name: "u128".into(),
                field: "big".into()
            }
        );
        assert_eq!(target.label, "old");
    }

    #[test]
    fn decoding_failure_keeps_earlier_writes() {
        let doc = Document::new()
            .with("word", "written")
            .with("number", "not a number")
            .with("flag", true);
        let mut target = MyStruct::default();

        let err = registry().decode(&doc, &mut target).unwrap_err();

        assert!(matches!(err, CodecError::DecodingFailure { ref field, .. } if field == "Number"));
        assert_eq!(target.Word, "written");
        assert!(!target.Flag);
    }

    #[test]
    fn malformed_bytes_leave_target_untouched() {
        let mut target = MyStruct {
            Number: 9,
            ..MyStruct::default()
        };
        let err = registry()
            .decode_from_slice(b"\x9f\x01", &mut target)
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedDocument(_)));
        assert_eq!(target.Number, 9);
    }

    #[test]
    fn unregistered_target_record_is_not_registered() {
        let registry = Registry::with_defaults();
        let mut target = MyStruct::default();
        let err = registry.decode(&Document::new(), &mut target).unwrap_err();
        assert!(matches!(err, CodecError::NotRegistered { .. }));
    }
}
