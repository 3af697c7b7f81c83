//! Property-based tests for serializers, casts and the save/load cycle.

use proptest::prelude::*;
use std::sync::Arc;
use vault_attributes::{
    AttributeController, AttributeOptions, AttributeType, BinarySerializer, IdentitySerializer,
    IpAddrSerializer, JsonSerializer, MemoryStore, RegistryBuilder, Serializer, Value,
};
use vault_transit::MemoryTransit;

fn json_document() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-z0-9 ]{0,12}".prop_map(serde_json::Value::String),
        Just(serde_json::Value::Null),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_identity_round_trips_text(s in "\\PC{0,40}") {
        let value = Value::from(s);
        let encoded = IdentitySerializer.encode(&value).unwrap();
        prop_assert_eq!(IdentitySerializer.decode(encoded.as_deref()).unwrap(), value);
    }

    #[test]
    fn prop_json_round_trips_documents(doc in json_document()) {
        let value = Value::from(doc);
        let encoded = JsonSerializer.encode(&value).unwrap();
        prop_assert_eq!(JsonSerializer.decode(encoded.as_deref()).unwrap(), value);
    }

    #[test]
    fn prop_binary_round_trips_bytes(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let value = Value::Bytes(bytes);
        let encoded = BinarySerializer.encode(&value).unwrap();
        prop_assert_eq!(BinarySerializer.decode(encoded.as_deref()).unwrap(), value);
    }

    #[test]
    fn prop_json_round_trips_scalar_documents(s in "\\PC{0,24}", n in any::<i64>(), flag in any::<bool>()) {
        for document in [serde_json::json!(s), serde_json::json!(n), serde_json::json!(flag)] {
            let value = Value::Json(document);
            let encoded = JsonSerializer.encode(&value).unwrap();
            prop_assert_eq!(JsonSerializer.decode(encoded.as_deref()).unwrap(), value);
        }
    }

    #[test]
    fn prop_json_rejects_native_scalars(s in "\\PC{0,24}", n in any::<i64>(), flag in any::<bool>()) {
        for value in [Value::from(s), Value::from(n), Value::from(flag)] {
            prop_assert!(JsonSerializer.encode(&value).is_err());
        }
    }

    #[test]
    fn prop_binary_keeps_text_bytes_and_rejects_text(s in "\\PC{0,40}") {
        prop_assert!(BinarySerializer.encode(&Value::from(s.clone())).is_err());

        let value = Value::Bytes(s.into_bytes());
        let encoded = BinarySerializer.encode(&value).unwrap();
        prop_assert_eq!(BinarySerializer.decode(encoded.as_deref()).unwrap(), value);
    }

    #[test]
    fn prop_ip_round_trips_addresses(ip in any::<std::net::IpAddr>()) {
        let value = Value::Ip(ip);
        let encoded = IpAddrSerializer.encode(&value).unwrap();
        prop_assert_eq!(IpAddrSerializer.decode(encoded.as_deref()).unwrap(), value);
    }

    #[test]
    fn prop_casts_are_idempotent(n in any::<i64>(), flag in any::<bool>(), s in "[a-z]{0,10}") {
        for (ty, input) in [
            (AttributeType::Integer, Value::from(n)),
            (AttributeType::Boolean, Value::from(flag)),
            (AttributeType::String, Value::from(s.clone())),
            (AttributeType::Integer, Value::from(n.to_string())),
        ] {
            let once = ty.cast(input).unwrap();
            prop_assert_eq!(ty.cast(once.clone()).unwrap(), once);
        }
    }

    #[test]
    fn prop_saved_plaintext_survives_find(s in "\\PC{0,40}", age in any::<i32>()) {
        let mut builder = RegistryBuilder::new("prop");
        builder
            .entity("Person", "people")
            .unwrap()
            .define("ssn", AttributeOptions::new())
            .and_then(|e| e.define("age", AttributeOptions::new().attr_type(AttributeType::Integer)))
            .unwrap();
        let schema = builder.build().entity("Person").unwrap();
        let controller = AttributeController::new(Arc::new(MemoryTransit::new().with_warning(false)));
        let store = MemoryStore::new();

        let mut record = controller
            .build_with(&schema, [("ssn", Value::from(s.clone())), ("age", Value::from(age))])
            .unwrap();
        let id = controller.save(&store, &mut record).unwrap();

        let mut found = controller.find(&store, &schema, id).unwrap();
        prop_assert_eq!(controller.read(&mut found, "ssn").unwrap(), Value::from(s.clone()));
        prop_assert_eq!(controller.read(&mut found, "age").unwrap(), Value::from(age));
        prop_assert!(found.changed_attributes().is_empty());

        let ciphertext = found.column("ssn_encrypted").and_then(Value::as_str).unwrap_or_default();
        prop_assert!(s.len() < 4 || !ciphertext.contains(&s));
    }
}
