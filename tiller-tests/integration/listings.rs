//! Field listings: one round trip per view or sub-entity enumeration

use chrono::{TimeZone, Utc};
use tiller_core::{Torrent, Value};

use crate::support::{scripted_client, INFO_HASH};

#[tokio::test]
async fn view_listing_fetches_fields_in_requested_order() {
    let (transport, client) = scripted_client(
        &["d.multicall", "d.name", "d.down.rate", "d.is_active"],
        "0.9.8",
    );
    transport.push_response(Value::Array(vec![
        Value::Array(vec![Value::from("a.iso"), Value::Int(100), Value::Int(1)]),
        Value::Array(vec![Value::from("b.iso"), Value::Int(0), Value::Int(0)]),
    ]));

    let mut listing = client.torrent_fields("main");
    listing.field("name").unwrap();
    listing.field("down_rate").unwrap();
    listing.field("is_active").unwrap();
    let rows = listing.send().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name"), Some(&Value::from("a.iso")));
    // Implicit boolean coercion applies per field.
    assert_eq!(rows[0].get("is_active"), Some(&Value::Bool(true)));
    assert_eq!(rows[1].get("is_active"), Some(&Value::Bool(false)));

    let calls = transport.recorded_calls();
    let (method, args) = calls.last().unwrap();
    assert_eq!(method, "d.multicall");
    assert_eq!(
        args,
        &vec![
            Value::from("main"),
            Value::from(""),
            Value::from("d.name="),
            Value::from("d.down.rate="),
            Value::from("d.is_active="),
        ]
    );
}

#[tokio::test]
async fn legacy_daemon_listing_uses_fallback_field_names() {
    let (transport, client) = scripted_client(&["d.multicall", "d.get_name"], "0.8.6");
    transport.push_response(Value::Array(vec![]));

    let mut listing = client.torrent_fields("main");
    listing.field("name").unwrap();
    listing.send().await.unwrap();

    let calls = transport.recorded_calls();
    let (_, args) = calls.last().unwrap();
    assert_eq!(args[2], Value::from("d.get_name="));
}

#[tokio::test]
async fn file_listing_post_processes_timestamps() {
    let (transport, client) = scripted_client(
        &["f.multicall", "f.path", "f.last_touched"],
        "0.9.8",
    );
    transport.push_response(Value::Array(vec![Value::Array(vec![
        Value::from("video.mkv"),
        Value::Int(1_414_776_586_757_462),
    ])]));

    let torrent = client.torrent(INFO_HASH);
    let mut listing = torrent.file_fields();
    listing.field("path").unwrap();
    listing.field("last_touched").unwrap();
    let rows = listing.send().await.unwrap();

    let expected = Utc.timestamp_micros(1_414_776_586_757_462).unwrap();
    assert_eq!(rows[0].get("last_touched"), Some(&Value::DateTime(expected)));
}

#[tokio::test]
async fn all_fields_requests_every_retriever_by_name_order() {
    let methods: Vec<String> = Torrent::methods()
        .descriptors()
        .flat_map(|d| d.wire_names().iter().map(|n| (*n).to_string()))
        .collect();
    let method_refs: Vec<&str> = methods.iter().map(String::as_str).collect();

    let (transport, client) = scripted_client(&method_refs, "0.9.8");
    transport.push_response(Value::Array(vec![]));

    let mut listing = client.torrent_fields("main");
    listing.all_fields();
    let names = listing.field_names();

    // Deterministic order, no carrier entry, no modifiers.
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
    assert!(!names.contains(&"multicall"));
    assert!(!names.contains(&"set_priority"));
    assert!(names.contains(&"name"));

    listing.send().await.unwrap();
}
