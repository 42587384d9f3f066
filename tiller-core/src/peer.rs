//! Peer handles and the peer-kind method table

use std::sync::{Arc, LazyLock};

use crate::context::Context;
use crate::rpc::{Call, EntityKind, MethodDescriptor, Multicall, Registry, RpcError, Value};

static METHODS: LazyLock<Registry> = LazyLock::new(|| {
    Registry::builder(EntityKind::Peer)
        .register(MethodDescriptor::retriever("multicall", &["p.multicall"]))
        .register(MethodDescriptor::retriever("id", &["p.id", "p.get_id"]))
        .register(MethodDescriptor::retriever("id_html", &["p.id_html", "p.get_id_html"]))
        .register(MethodDescriptor::retriever("address", &["p.address", "p.get_address"]))
        .register(MethodDescriptor::retriever("port", &["p.port", "p.get_port"]))
        .register(MethodDescriptor::retriever(
            "client_version",
            &["p.client_version", "p.get_client_version"],
        ))
        .register(MethodDescriptor::retriever("options_str", &["p.options_str", "p.get_options_str"]))
        .register(MethodDescriptor::retriever("down_rate", &["p.down_rate", "p.get_down_rate"]))
        .register(MethodDescriptor::retriever("down_total", &["p.down_total", "p.get_down_total"]))
        .register(MethodDescriptor::retriever("up_rate", &["p.up_rate", "p.get_up_rate"]))
        .register(MethodDescriptor::retriever("up_total", &["p.up_total", "p.get_up_total"]))
        .register(MethodDescriptor::retriever("peer_rate", &["p.peer_rate", "p.get_peer_rate"]))
        .register(MethodDescriptor::retriever("peer_total", &["p.peer_total", "p.get_peer_total"]))
        .register(MethodDescriptor::retriever(
            "completed_percent",
            &["p.completed_percent", "p.get_completed_percent"],
        ))
        .register(MethodDescriptor::boolean("is_encrypted", &["p.is_encrypted"]))
        .register(MethodDescriptor::boolean("is_incoming", &["p.is_incoming"]))
        .register(MethodDescriptor::boolean("is_obfuscated", &["p.is_obfuscated"]))
        .register(MethodDescriptor::boolean("is_snubbed", &["p.is_snubbed"]))
        .build()
});

/// Handle to one connected peer of a torrent, addressed by peer id.
#[derive(Debug, Clone)]
pub struct Peer {
    context: Arc<Context>,
    info_hash: String,
    peer_id: String,
    rpc_id: String,
}

impl Peer {
    pub fn new(
        context: Arc<Context>,
        info_hash: impl Into<String>,
        peer_id: impl Into<String>,
    ) -> Self {
        let info_hash = info_hash.into();
        let peer_id = peer_id.into();
        let rpc_id = format!("{info_hash}:p{peer_id}");
        Self {
            context,
            info_hash,
            peer_id,
            rpc_id,
        }
    }

    /// The peer-kind method table.
    pub fn methods() -> &'static Registry {
        &METHODS
    }

    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// The compound id the daemon expects for per-peer operations.
    pub fn rpc_id(&self) -> &str {
        &self.rpc_id
    }

    /// Builds a call with this peer's identity injected.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnknownMethod` - If the logical name is not in the peer table
    pub fn rpc_call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Call, RpcError> {
        let descriptor = METHODS.get(logical_name)?;
        Ok(Call::with_identity(
            descriptor,
            vec![Value::from(self.rpc_id.clone())],
            user_args,
        ))
    }

    /// Executes one registered operation against this peer.
    pub async fn call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Value, RpcError> {
        let call = self.rpc_call(logical_name, user_args)?;
        let mut batch = Multicall::new(&self.context);
        batch.add(call).await?;
        let mut results = batch.send().await?;
        results.pop().ok_or_else(|| RpcError::Protocol {
            message: "single-call batch returned no result".to_string(),
        })
    }

    pub async fn address(&self) -> Result<String, RpcError> {
        self.call("address", vec![]).await?.try_into_string()
    }

    pub async fn down_rate(&self) -> Result<i64, RpcError> {
        self.call("down_rate", vec![]).await?.try_into_i64()
    }

    pub async fn is_encrypted(&self) -> Result<bool, RpcError> {
        self.call("is_encrypted", vec![]).await?.try_into_bool()
    }
}

#[cfg(test)]
mod peer_tests {
    use super::*;
    use crate::rpc::test_stub::StubTransport;

    const INFO_HASH: &str = "1D226C20D67F8F2DDEE4FD99A880974B3F2B6F1E";
    const PEER_ID: &str = "B9ADEA51B29DF84F3E7FA1B27DDFD82B71621264";

    #[test]
    fn test_rpc_id_is_hash_and_peer_id() {
        let stub = Arc::new(StubTransport::new(&[], "0.9.8"));
        let peer = Peer::new(Arc::new(Context::new(stub)), INFO_HASH, PEER_ID);
        assert_eq!(peer.rpc_id(), format!("{INFO_HASH}:p{PEER_ID}"));
    }

    #[test]
    fn test_table_has_no_modifiers() {
        assert!(Peer::methods().descriptors().all(|d| d.is_retriever()));
    }

    #[tokio::test]
    async fn test_address_round_trip() {
        let stub = Arc::new(StubTransport::new(&["p.address"], "0.9.8"));
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::from("10.0.0.2")])]));

        let peer = Peer::new(Arc::new(Context::new(stub)), INFO_HASH, PEER_ID);
        assert_eq!(peer.address().await.unwrap(), "10.0.0.2");
    }
}
