//! Batch composition and fan-out across entity boundaries

use tiller_core::{RpcError, Value};

use crate::support::{multicall_reply, scripted_client, INFO_HASH};

#[tokio::test]
async fn mixed_entity_batch_travels_as_one_round_trip() {
    let (transport, client) = scripted_client(
        &["d.name", "d.down.rate", "throttle.global_down.rate"],
        "0.9.8",
    );
    transport.push_response(multicall_reply(vec![
        Value::from("ubuntu.iso"),
        Value::Int(2048),
        Value::Int(4096),
    ]));

    let torrent = client.torrent(INFO_HASH);
    let mut batch = client.multicall();
    batch.add(torrent.rpc_call("name", vec![]).unwrap()).await.unwrap();
    batch.add(torrent.rpc_call("down_rate", vec![]).unwrap()).await.unwrap();
    batch.add(client.rpc_call("down_rate", vec![]).unwrap()).await.unwrap();
    let results = batch.send().await.unwrap();

    assert_eq!(
        results,
        vec![Value::from("ubuntu.iso"), Value::Int(2048), Value::Int(4096)]
    );
    assert_eq!(transport.calls_for("system.multicall"), 1);

    // Entity calls carry their identity on the wire, session calls do not.
    let batch = transport.last_batch();
    assert_eq!(
        batch,
        vec![
            ("d.name".to_string(), vec![Value::from(INFO_HASH)]),
            ("d.down.rate".to_string(), vec![Value::from(INFO_HASH)]),
            ("throttle.global_down.rate".to_string(), vec![]),
        ]
    );
}

#[tokio::test]
async fn fault_in_one_slot_fails_the_batch() {
    let (transport, client) = scripted_client(&["d.name"], "0.9.8");
    let mut fault = std::collections::BTreeMap::new();
    fault.insert("faultCode".to_string(), Value::Int(-501));
    fault.insert("faultString".to_string(), Value::from("Could not find info-hash."));
    transport.push_response(Value::Array(vec![Value::Struct(fault)]));

    let torrent = client.torrent(INFO_HASH);
    let result = torrent.name().await;
    assert!(matches!(result, Err(RpcError::ServerFault { code: -501, .. })));
}

#[tokio::test]
async fn unavailable_method_rejected_before_any_batch_traffic() {
    // Daemon exposes neither the modern nor the legacy candidate.
    let (transport, client) = scripted_client(&["d.name"], "0.9.8");

    let torrent = client.torrent(INFO_HASH);
    let call = torrent.rpc_call("down_rate", vec![]).unwrap();
    let mut batch = client.multicall();
    let result = batch.add(call).await;

    assert!(matches!(result, Err(RpcError::MethodUnavailable { .. })));
    assert_eq!(transport.calls_for("system.multicall"), 0);
}

#[tokio::test]
async fn version_gated_method_unavailable_on_old_daemon() {
    let (_, client) = scripted_client(&["d.free_diskspace"], "0.8.2");

    let torrent = client.torrent(INFO_HASH);
    let mut batch = client.multicall();
    let result = batch.add(torrent.rpc_call("free_diskspace", vec![]).unwrap()).await;

    assert!(matches!(result, Err(RpcError::MethodUnavailable { .. })));
}
