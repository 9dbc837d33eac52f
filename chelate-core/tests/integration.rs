//! Integration tests exercising derived records through the public API.

#![allow(non_snake_case)]

use chelate_core::{
    record_struct, CodecError, Config, Document, Record, Registry, UnknownFields, Value,
};
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct MyStruct {
    Word: String,
    Number: i64,
    Flag: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Mixed {
    myWord: String,
    HTTPCode: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Inner {
    label: String,
    ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Outer {
    id: u32,
    inner: Inner,
    spare: Option<Inner>,
    tags: Vec<String>,
    scores: IndexMap<String, i64>,
}

#[derive(Debug, Default, PartialEq, Record)]
struct Account {
    #[record(rename = "UserName")]
    name: String,
    #[record(skip)]
    cache: Vec<u8>,
    id: u32,
}

/// A tree node, used to nest documents arbitrarily deep.
#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Node {
    name: String,
    children: Vec<Node>,
}

#[derive(Debug, Default, PartialEq, Record)]
struct Wide {
    big: u128,
}

#[derive(Debug, Default, PartialEq, Record)]
struct Envelope {
    label: String,
    wide: Wide,
}

#[derive(Debug, Default, PartialEq, Record)]
struct Batch {
    label: String,
    values: Vec<u128>,
}

#[record_struct]
struct Sugared {
    label: String,
    count: u8,
}

fn registry_with(config: Config) -> Registry {
    let mut builder = Registry::builder();
    builder
        .with_config(config)
        .register_defaults()
        .register_option::<Inner>()
        .register_sequence::<String>()
        .register_sequence::<Node>()
        .register_map::<i64>();
    builder
        .register_record::<MyStruct>()
        .and_then(|b| b.register_record::<Mixed>())
        .and_then(|b| b.register_record::<Inner>())
        .and_then(|b| b.register_record::<Outer>())
        .and_then(|b| b.register_record::<Account>())
        .and_then(|b| b.register_record::<Node>())
        .and_then(|b| b.register_record::<Sugared>())
        .unwrap();
    builder.build()
}

fn registry() -> Registry {
    registry_with(Config::default())
}

fn chain(depth: usize) -> Node {
    let mut node = Node {
        name: format!("n{depth}"),
        children: Vec::new(),
    };
    for level in (0..depth).rev() {
        node = Node {
            name: format!("n{level}"),
            children: vec![node],
        };
    }
    node
}

#[test]
fn encodes_to_lowercase_json_shape() {
    let registry = registry();
    let record = MyStruct {
        Word: "foo".to_string(),
        Number: 42,
        Flag: true,
    };

    let doc = registry.encode(&record).unwrap();

    assert_eq!(
        serde_json::to_string(&doc).unwrap(),
        r#"{"word":"foo","number":42,"flag":true}"#
    );
}

#[test]
fn bytes_round_trip() {
    let registry = registry();
    let record = MyStruct {
        Word: "foo".to_string(),
        Number: -7,
        Flag: true,
    };

    let bytes = registry.encode_to_vec(&record).unwrap();
    let mut decoded = MyStruct::default();
    registry.decode_from_slice(&bytes, &mut decoded).unwrap();

    assert_eq!(decoded, record);
}

#[test]
fn json_null_decodes_to_zero_values() {
    let doc: Document = serde_json::from_str(r#"{"word": null, "number": 42}"#).unwrap();
    let mut target = MyStruct::default();

    registry().decode(&doc, &mut target).unwrap();

    assert_eq!(
        target,
        MyStruct {
            Word: String::new(),
            Number: 42,
            Flag: false,
        }
    );
}

#[test]
fn mixed_case_names_round_trip() {
    let registry = registry();
    let record = Mixed {
        myWord: "hello".to_string(),
        HTTPCode: 404,
    };

    let doc = registry.encode(&record).unwrap();
    assert_eq!(doc.keys().collect::<Vec<_>>(), ["myword", "httpcode"]);

    let mut decoded = Mixed::default();
    registry.decode(&doc, &mut decoded).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn nested_records_and_containers_round_trip() {
    let registry = registry();
    let mut scores = IndexMap::new();
    scores.insert("Zed".to_string(), 3);
    scores.insert("amy".to_string(), -1);
    let record = Outer {
        id: 9,
        inner: Inner {
            label: "core".to_string(),
            ratio: 0.5,
        },
        spare: Some(Inner {
            label: "backup".to_string(),
            ratio: 1.25,
        }),
        tags: vec!["a".to_string(), "b".to_string()],
        scores,
    };

    let doc = registry.encode(&record).unwrap();
    assert_eq!(
        serde_json::to_value(&doc).unwrap(),
        serde_json::json!({
            "id": 9,
            "inner": {"label": "core", "ratio": 0.5},
            "spare": {"label": "backup", "ratio": 1.25},
            "tags": ["a", "b"],
            "scores": {"Zed": 3, "amy": -1},
        })
    );

    let bytes = doc.to_bytes().unwrap();
    let mut decoded = Outer::default();
    registry.decode_from_slice(&bytes, &mut decoded).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn null_resets_composite_fields() {
    let registry = registry();
    let mut target = Outer {
        id: 1,
        inner: Inner {
            label: "stale".to_string(),
            ratio: 9.0,
        },
        spare: Some(Inner::default()),
        tags: vec!["old".to_string()],
        scores: IndexMap::new(),
    };
    let doc = Document::new()
        .with("inner", Value::Null)
        .with("spare", Value::Null)
        .with("tags", Value::Null);

    registry.decode(&doc, &mut target).unwrap();

    assert_eq!(target.id, 1);
    assert_eq!(target.inner, Inner::default());
    assert_eq!(target.spare, None);
    assert!(target.tags.is_empty());
}

#[test]
fn nested_decode_error_names_the_path() {
    let doc = Document::new().with(
        "inner",
        Document::new().with("label", "ok").with("ratio", "high"),
    );
    let mut target = Outer::default();

    let err = registry().decode(&doc, &mut target).unwrap_err();

    assert!(matches!(
        err,
        CodecError::DecodingFailure { ref field, .. } if field == "inner.ratio"
    ));
}

#[test]
fn skip_and_rename_attributes() {
    let registry = registry();
    let account = Account {
        name: "ada".to_string(),
        cache: vec![1, 2, 3],
        id: 7,
    };

    let doc = registry.encode(&account).unwrap();
    assert_eq!(doc.keys().collect::<Vec<_>>(), ["username", "id"]);

    let mut target = Account {
        cache: vec![9],
        ..Account::default()
    };
    registry.decode(&doc, &mut target).unwrap();
    assert_eq!(target.name, "ada");
    assert_eq!(target.id, 7);
    assert_eq!(target.cache, vec![9]);
}

#[test]
fn attribute_sugar_derives_record() {
    let registry = registry();
    let doc = registry
        .encode(&Sugared {
            label: "x".to_string(),
            count: 2,
        })
        .unwrap();
    assert_eq!(doc.get("count"), Some(&Value::Int(2)));

    let mut target = Sugared::default();
    registry.decode(&doc, &mut target).unwrap();
    assert_eq!(target.label, "x");
}

#[test]
fn unknown_keys_follow_configuration() {
    let doc = Document::new().with("word", "w").with("colour", "blue");

    let mut target = MyStruct::default();
    registry().decode(&doc, &mut target).unwrap();
    assert_eq!(target.Word, "w");

    let strict = registry_with(Config {
        unknown_fields: UnknownFields::Deny,
        ..Config::default()
    });
    let err = strict.decode(&doc, &mut MyStruct::default()).unwrap_err();
    assert_eq!(
        err,
        CodecError::UnknownField {
            key: "colour".to_string()
        }
    );
}

#[test]
fn recursive_records_within_depth_limit() {
    let registry = registry();
    let tree = chain(4);

    let doc = registry.encode(&tree).unwrap();
    let mut decoded = Node::default();
    registry.decode(&doc, &mut decoded).unwrap();

    assert_eq!(decoded, tree);
}

#[test]
fn depth_limit_stops_runaway_nesting() {
    let registry = registry_with(Config {
        max_depth: 3,
        ..Config::default()
    });
    let tree = chain(10);

    let err = registry.encode(&tree).unwrap_err();
    assert_eq!(err, CodecError::DepthLimitExceeded { limit: 3 });

    let deep = registry_with(Config::default()).encode(&tree).unwrap();
    let err = registry.decode(&deep, &mut Node::default()).unwrap_err();
    assert_eq!(err, CodecError::DepthLimitExceeded { limit: 3 });
}

#[test]
fn malformed_bytes_are_rejected() {
    let mut target = MyStruct::default();
    let err = registry()
        .decode_from_slice(&[0xff, 0x00, 0x13], &mut target)
        .unwrap_err();
    assert!(matches!(err, CodecError::MalformedDocument(_)));
    assert_eq!(target, MyStruct::default());
}

#[test]
fn trailing_bytes_after_document_are_rejected() {
    let registry = registry();
    let mut bytes = registry
        .encode_to_vec(&MyStruct {
            Word: "foo".to_string(),
            Number: 42,
            Flag: true,
        })
        .unwrap();
    bytes.extend_from_slice(&[0xff, 0xde, 0xad]);

    let mut target = MyStruct::default();
    let err = registry.decode_from_slice(&bytes, &mut target).unwrap_err();

    assert!(matches!(err, CodecError::MalformedDocument(_)));
    assert_eq!(target, MyStruct::default());
}

#[test]
fn nested_missing_registration_fails_before_mutation() {
    let mut builder = Registry::builder();
    builder
        .register_defaults()
        .register_sequence::<u128>()
        .register_record::<Wide>()
        .and_then(|b| b.register_record::<Envelope>())
        .and_then(|b| b.register_record::<Batch>())
        .unwrap();
    let registry = builder.build();

    let doc = Document::new()
        .with("label", "new")
        .with("wide", Document::new().with("big", 1));
    let mut envelope = Envelope {
        label: "old".to_string(),
        ..Envelope::default()
    };
    let err = registry.decode(&doc, &mut envelope).unwrap_err();
    assert_eq!(
        err,
        CodecError::NotRegistered {
            type_name: "u128".to_string(),
            field: "wide.big".to_string(),
        }
    );
    assert_eq!(envelope.label, "old");

    let doc = Document::new()
        .with("label", "new")
        .with("values", Value::Array(vec![Value::Int(1)]));
    let mut batch = Batch {
        label: "old".to_string(),
        ..Batch::default()
    };
    let err = registry.decode(&doc, &mut batch).unwrap_err();
    assert_eq!(
        err,
        CodecError::NotRegistered {
            type_name: "u128".to_string(),
            field: "values".to_string(),
        }
    );
    assert_eq!(batch.label, "old");
}

#[test]
fn registry_is_shared_across_threads() {
    let registry = Arc::new(registry());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let record = MyStruct {
                    Word: format!("w{i}"),
                    Number: i,
                    Flag: i % 2 == 0,
                };
                let bytes = registry.encode_to_vec(&record).unwrap();
                let mut decoded = MyStruct::default();
                registry.decode_from_slice(&bytes, &mut decoded).unwrap();
                assert_eq!(decoded, record);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
