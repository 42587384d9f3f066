//! Per-entity handle operations over the wire

use tiller_core::{RpcError, Value};

use crate::support::{multicall_reply, scripted_client, INFO_HASH};

#[tokio::test]
async fn torrent_set_priority_maps_level_to_wire_index() {
    let (transport, client) = scripted_client(&["d.priority.set"], "0.9.8");
    transport.push_response(multicall_reply(vec![Value::Int(0)]));

    let torrent = client.torrent(INFO_HASH);
    torrent.set_priority("off").await.unwrap();

    let batch = transport.last_batch();
    assert_eq!(
        batch,
        vec![(
            "d.priority.set".to_string(),
            vec![Value::from(INFO_HASH), Value::Int(0)]
        )]
    );
}

#[tokio::test]
async fn torrent_priority_read_maps_index_back_to_level() {
    let (transport, client) = scripted_client(&["d.priority"], "0.9.8");
    transport.push_response(multicall_reply(vec![Value::Int(3)]));

    let torrent = client.torrent(INFO_HASH);
    assert_eq!(torrent.priority().await.unwrap(), "high");
}

#[tokio::test]
async fn invalid_priority_level_never_reaches_the_wire() {
    let (transport, client) = scripted_client(&["d.priority.set"], "0.9.8");

    let torrent = client.torrent(INFO_HASH);
    let result = torrent.set_priority("urgent").await;

    assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
    assert_eq!(transport.calls_for("system.multicall"), 0);
}

#[tokio::test]
async fn boolean_retriever_coerces_wire_integer() {
    let (transport, client) = scripted_client(&["d.is_active"], "0.9.8");
    transport.push_response(multicall_reply(vec![Value::Int(1)]));

    let torrent = client.torrent(INFO_HASH);
    assert!(torrent.is_active().await.unwrap());
}

#[tokio::test]
async fn set_directory_stops_the_torrent_first() {
    let (transport, client) = scripted_client(&["d.try_stop", "d.directory.set"], "0.9.8");
    transport.push_response(multicall_reply(vec![Value::Int(0), Value::Int(0)]));

    let torrent = client.torrent(INFO_HASH);
    torrent.set_directory("/srv/downloads").await.unwrap();

    let batch = transport.last_batch();
    assert_eq!(batch[0].0, "d.try_stop");
    assert_eq!(
        batch[1],
        (
            "d.directory.set".to_string(),
            vec![Value::from(INFO_HASH), Value::from("/srv/downloads")]
        )
    );
}

#[tokio::test]
async fn sub_entity_identity_is_compound() {
    let (transport, client) = scripted_client(
        &["t.multicall", "t.group", "t.is_enabled.set"],
        "0.9.8",
    );
    transport.push_response(Value::Array(vec![Value::Array(vec![Value::Int(0)])]));
    transport.push_response(multicall_reply(vec![Value::Int(0)]));

    let torrent = client.torrent(INFO_HASH);
    let trackers = torrent.trackers().await.unwrap();
    assert_eq!(trackers.len(), 1);

    trackers[0].disable().await.unwrap();
    let batch = transport.last_batch();
    assert_eq!(
        batch,
        vec![(
            "t.is_enabled.set".to_string(),
            vec![Value::from(format!("{INFO_HASH}:t0")), Value::from("0")]
        )]
    );
}
