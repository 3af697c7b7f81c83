//! Shared proptest generators.
//!
//! Each strategy produces values inside the domain its serializer
//! round-trips exactly.

use chrono::NaiveDate;
use proptest::prelude::*;
use std::net::IpAddr;
use vault_attributes::Value;

/// Arbitrary text, including non-ASCII and blank strings.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ -~]{0,40}",
        "\\PC{0,24}",
        Just(String::new()),
        Just("Ünïcödé ✓ 日本".to_string()),
    ]
}

/// Values the identity serializer round-trips: text or null.
pub fn identity_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        6 => text_strategy().prop_map(Value::Text),
    ]
}

fn json_leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(serde_json::Value::String),
    ]
}

/// JSON documents without floats, so text round-trips are exact.
pub fn json_document_strategy() -> impl Strategy<Value = serde_json::Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Values the JSON serializer round-trips.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_document_strategy().prop_map(Value::from)
}

/// Values the binary serializer round-trips.
pub fn bytes_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        6 => prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
    ]
}

/// Values the IP address serializer round-trips.
pub fn ip_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        6 => any::<IpAddr>().prop_map(Value::Ip),
    ]
}

/// Calendar dates between years 1 and 9999.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1i32..=9999, 1u32..=12, 1u32..=28)
        .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}

/// Transit key ids as the registry derives them.
pub fn key_id_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{2,8}", "[a-z]{2,8}", "[a-z_]{2,12}").prop_map(|(app, table, attr)| format!("{app}_{table}_{attr}"))
}
