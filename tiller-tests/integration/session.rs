//! Session lifecycle: discovery caching and daemon-global operations

use tiller_core::{ServerVersion, TorrentSource, Value};

use crate::support::{multicall_reply, scripted_client};

#[tokio::test]
async fn discovery_happens_once_across_many_operations() {
    let (transport, client) = scripted_client(
        &["system.hostname", "throttle.global_down.rate", "dht.port"],
        "0.9.8",
    );
    transport.push_response(multicall_reply(vec![Value::from("seedbox")]));
    transport.push_response(multicall_reply(vec![Value::Int(512)]));
    transport.push_response(multicall_reply(vec![Value::Int(6881)]));

    assert_eq!(client.hostname().await.unwrap(), "seedbox");
    assert_eq!(client.down_rate().await.unwrap(), 512);
    assert_eq!(client.dht_port().await.unwrap(), 6881);

    assert_eq!(transport.calls_for("system.listMethods"), 1);
    assert_eq!(transport.calls_for("system.client_version"), 1);
    assert_eq!(transport.calls_for("system.multicall"), 3);
}

#[tokio::test]
async fn server_version_is_parsed_and_comparable() {
    let (_, client) = scripted_client(&[], "0.9.8");

    let version = client.server_version().await.unwrap();
    assert_eq!(version, ServerVersion(0, 9, 8));
    assert!(version >= ServerVersion(0, 9, 0));
}

#[tokio::test]
async fn load_variants_pick_distinct_wire_methods() {
    let (transport, client) = scripted_client(
        &["load.normal", "load.start_verbose", "load.raw_start"],
        "0.9.8",
    );

    transport.push_response(multicall_reply(vec![Value::Int(0)]));
    client
        .load_torrent(TorrentSource::Url("a.torrent".to_string()), false, false)
        .await
        .unwrap();
    assert_eq!(transport.last_batch()[0].0, "load.normal");

    transport.push_response(multicall_reply(vec![Value::Int(0)]));
    client
        .load_torrent(TorrentSource::Url("b.torrent".to_string()), true, true)
        .await
        .unwrap();
    assert_eq!(transport.last_batch()[0].0, "load.start_verbose");

    transport.push_response(multicall_reply(vec![Value::Int(0)]));
    client
        .load_torrent(TorrentSource::Raw(vec![0x64, 0x38, 0x3a]), true, false)
        .await
        .unwrap();
    let batch = transport.last_batch();
    assert_eq!(batch[0].0, "load.raw_start");
    assert_eq!(batch[0].1, vec![Value::Bytes(vec![0x64, 0x38, 0x3a])]);
}

#[tokio::test]
async fn check_hash_round_trips_through_wire_strings() {
    let (transport, client) = scripted_client(
        &["pieces.hash.on_completion", "pieces.hash.on_completion.set"],
        "0.9.8",
    );

    transport.push_response(multicall_reply(vec![Value::Int(0)]));
    assert!(!client.check_hash().await.unwrap());

    transport.push_response(multicall_reply(vec![Value::Int(0)]));
    client.set_check_hash(true).await.unwrap();
    assert_eq!(
        transport.last_batch()[0],
        ("pieces.hash.on_completion.set".to_string(), vec![Value::from("1")])
    );
}
