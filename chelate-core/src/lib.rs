//! Chelate converts typed records into ordered, self-describing documents and
//! back, without hand-written conversion code per type.
//!
//! Core concepts:
//! - **Record**: a struct exposing a field-descriptor table (usually derived)
//! - **Document**: an ordered sequence of `(key, Value)` pairs
//! - **Registry**: the frozen table mapping each type to its encoder and decoder
//! - **Encoder / Decoder**: the two symmetric record ⇄ document operations
//!
//! # Example
//!
//! ```
//! use chelate_core::{Document, Record, Registry, Value};
//!
//! #[derive(Debug, Default, PartialEq, Record)]
//! #[allow(non_snake_case)]
//! struct MyStruct {
//!     Word: String,
//!     Number: i64,
//!     Flag: bool,
//! }
//!
//! let mut builder = Registry::builder();
//! builder.register_defaults().register_record::<MyStruct>().unwrap();
//! let registry = builder.build();
//!
//! // Keys are the lower-cased field names, in declaration order.
//! let doc = registry
//!     .encode(&MyStruct { Word: "foo".into(), Number: 42, Flag: true })
//!     .unwrap();
//! assert_eq!(doc.get("word"), Some(&Value::Text("foo".into())));
//!
//! // Null resets a field to its zero value; absent keys leave it alone.
//! let doc = Document::new().with("word", Value::Null).with("number", 42);
//! let mut target = MyStruct::default();
//! registry.decode(&doc, &mut target).unwrap();
//! assert_eq!(target, MyStruct { Word: String::new(), Number: 42, Flag: false });
//! ```
//!
//! # Wire format
//!
//! `Document::to_bytes` and `Document::from_bytes` frame a document as a CBOR
//! map, keeping key order. Bytes that do not parse as a map with text keys
//! are reported as `CodecError::MalformedDocument`.

extern crate self as chelate_core;

mod codecs;
mod config;
mod context;
mod decoder;
mod document;
mod encoder;
mod error;
mod record;
mod registry;
mod value;

pub use config::{Config, UnknownFields};
pub use context::{DecodeContext, EncodeContext};
pub use decoder::Decoder;
pub use document::Document;
pub use encoder::Encoder;
pub use error::CodecError;
pub use record::{normalize_key, Field, Record};
pub use registry::{
    zero_default, Registry, RegistryBuilder, TypeTag, ValueDecoder, ValueEncoder, ZeroFn,
};
pub use value::{ByteString, Value};

#[cfg(feature = "derive")]
pub use chelate_derive::{record_struct, Record};
