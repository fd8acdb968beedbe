//! End-to-end messaging tests over the fake registry

mod common;

use common::{cached_fake_registry, write_schema, PERSON_SCHEMA};
use schemawire::wire::{unframe, MAGIC_BYTE};
use schemawire::{
    CacheConfig, DecodeOptions, EncodeOptions, Error, Messaging, MessagingConfig, RegistrySchemaStore,
    SchemaId, SchemaRegistry, SchemaStore, SchemaVersion,
};
use serde_json::json;
use std::sync::Arc;

fn messaging_with_files(root: &std::path::Path) -> (Arc<schemawire::FakeRegistryServer>, Messaging) {
    let (server, registry) = cached_fake_registry();
    let store = Arc::new(SchemaStore::new(root));
    (server, Messaging::with_components(registry, store, None))
}

#[test]
fn test_person_scenario_bytes() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "person.avsc", PERSON_SCHEMA);
    let (_, messaging) = messaging_with_files(dir.path());

    let id = messaging.registry().register("person", PERSON_SCHEMA).unwrap();
    assert_eq!(id, SchemaId(0));

    let message = json!({"full_name": "John Doe"});
    let bytes = messaging
        .encode(&message, &EncodeOptions::new().schema_name("person").subject("person"))
        .unwrap();

    let mut expected = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x10];
    expected.extend_from_slice(b"John Doe");
    assert_eq!(bytes.as_ref(), expected.as_slice());

    assert_eq!(messaging.decode(&bytes, &DecodeOptions::new()).unwrap(), message);
}

#[test]
fn test_round_trip_through_every_selector() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "person.avsc", PERSON_SCHEMA);
    let (_, messaging) = messaging_with_files(dir.path());
    let message = json!({"full_name": "Jane Roe"});

    let by_name = messaging
        .encode(&message, &EncodeOptions::new().schema_name("person"))
        .unwrap();
    let (id, _) = unframe(&by_name).unwrap();

    let selectors = [
        EncodeOptions::new().schema_id(id),
        EncodeOptions::new().subject("person").version(1u32),
        EncodeOptions::new().subject("person").version(SchemaVersion::latest()),
        EncodeOptions::new().schema_name("person").register_schemas(false),
    ];
    for options in &selectors {
        let bytes = messaging.encode(&message, options).unwrap();
        assert_eq!(bytes, by_name, "{options:?}");
        assert_eq!(messaging.decode(&bytes, &DecodeOptions::new()).unwrap(), message);
    }
}

#[test]
fn test_unknown_subject_version_is_schema_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (_, messaging) = messaging_with_files(dir.path());

    let err = messaging
        .encode(&json!({}), &EncodeOptions::new().subject("ghost").version(1u32))
        .unwrap_err();
    assert!(matches!(err, Error::SchemaNotFound(_)), "{err:?}");
    assert!(err.to_string().contains("ghost"), "{err}");
}

#[test]
fn test_unknown_schema_id_is_schema_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (_, messaging) = messaging_with_files(dir.path());

    let err = messaging
        .encode(&json!({}), &EncodeOptions::new().schema_id(99u32))
        .unwrap_err();
    assert!(matches!(err, Error::SchemaNotFound(_)), "{err:?}");

    let framed = [0x00, 0x00, 0x00, 0x00, 99, 0x02];
    let err = messaging.decode(&framed, &DecodeOptions::new()).unwrap_err();
    assert!(matches!(err, Error::SchemaNotFound(_)), "{err:?}");
}

#[test]
fn test_decode_with_reader_schema() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(
        dir.path(),
        "people/person.avsc",
        r#"{"type":"record","name":"person","namespace":"people","fields":[
            {"name":"full_name","type":"string"},
            {"name":"age","type":["null","int"],"default":null}]}"#,
    );
    let (_, messaging) = messaging_with_files(dir.path());

    let writer = r#"{"type":"record","name":"person","namespace":"people","fields":[
        {"name":"full_name","type":"string"}]}"#;
    let id = messaging.registry().register("people.person", writer).unwrap();

    let bytes = messaging
        .encode(&json!({"full_name": "John"}), &EncodeOptions::new().schema_id(id))
        .unwrap();
    let decoded = messaging
        .decode_message(&bytes, &DecodeOptions::new().schema_name("person").namespace("people"))
        .unwrap();

    assert_eq!(decoded.schema_id, id);
    assert_eq!(decoded.message, json!({"full_name": "John", "age": null}));
    assert!(decoded.reader_schema.is_some());
    assert_eq!(decoded.writer_schema.fields().unwrap().len(), 1);
}

#[test]
fn test_registry_schema_store_as_source() {
    let (server, registry) = cached_fake_registry();
    registry.register("person", PERSON_SCHEMA).unwrap();
    let store = Arc::new(RegistrySchemaStore::new(registry.clone()));
    let messaging = Messaging::with_components(registry, store, None);

    let bytes = messaging
        .encode(&json!({"full_name": "A"}), &EncodeOptions::new().schema_name("person"))
        .unwrap();
    assert_eq!(bytes[0], MAGIC_BYTE);
    // Registration never cached the schema by id, so decode fetches it once.
    let before = server.request_count();
    messaging.decode(&bytes, &DecodeOptions::new()).unwrap();
    assert_eq!(server.request_count(), before + 1);
}

#[test]
fn test_extra_fields_only_fail_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "person.avsc", PERSON_SCHEMA);
    let (_, messaging) = messaging_with_files(dir.path());
    let message = json!({"full_name": "John", "fulll_name": "typo"});

    let strict = EncodeOptions::new().schema_name("person").validate(true);
    let err = messaging.encode(&message, &strict).unwrap_err();
    assert!(err.to_string().contains("extra field 'fulll_name' - not in schema"));

    let lenient = strict.fail_on_extra_fields(false);
    assert!(messaging.encode(&message, &lenient).is_ok());
}

#[test]
fn test_absent_nullable_field_encodes_as_null() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(
        dir.path(),
        "member.avsc",
        r#"{"type":"record","name":"member","fields":[
            {"name":"full_name","type":"string"},
            {"name":"nick","type":["null","string"]}]}"#,
    );
    let (_, messaging) = messaging_with_files(dir.path());

    let bytes = messaging
        .encode(
            &json!({"full_name": "John"}),
            &EncodeOptions::new().schema_name("member").validate(true),
        )
        .unwrap();
    assert_eq!(
        messaging.decode(&bytes, &DecodeOptions::new()).unwrap(),
        json!({"full_name": "John", "nick": null})
    );
}

#[test]
fn test_short_and_unframed_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (_, messaging) = messaging_with_files(dir.path());

    assert!(matches!(
        messaging.decode(&[0, 0, 0], &DecodeOptions::new()),
        Err(Error::MalformedEnvelope(_))
    ));
    assert!(matches!(
        messaging.decode(b"Obj\x01\x00\x00", &DecodeOptions::new()),
        Err(Error::MalformedEnvelope(_))
    ));
}

#[test]
fn test_messaging_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config: MessagingConfig = serde_json::from_value(json!({
        "registry": {"url": "http://registry.local:8081"},
        "schemas_path": dir.path(),
        "namespace": "com.example",
        "cache": {"type": "disk", "path": dir.path().join("cache")}
    }))
    .unwrap();
    assert_eq!(config.schema_extension, "avsc");
    assert_eq!(config.cache, CacheConfig::Disk { path: dir.path().join("cache") });

    let messaging = Messaging::new(config).unwrap();
    assert!(dir.path().join("cache").is_dir());
    assert!(format!("{messaging:?}").contains("com.example"));
}
