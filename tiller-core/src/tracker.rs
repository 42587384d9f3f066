//! Tracker handles and the tracker-kind method table

use std::sync::{Arc, LazyLock};

use crate::context::Context;
use crate::rpc::{
    Call, EntityKind, MethodDescriptor, Multicall, PreProcessor, Registry, RpcError, Value,
};

static METHODS: LazyLock<Registry> = LazyLock::new(|| {
    Registry::builder(EntityKind::Tracker)
        .register(MethodDescriptor::retriever("multicall", &["t.multicall"]))
        .register(MethodDescriptor::retriever("id", &["t.id", "t.get_id"]))
        .register(MethodDescriptor::retriever("url", &["t.url", "t.get_url"]))
        .register(MethodDescriptor::retriever("type", &["t.type", "t.get_type"]))
        .register(MethodDescriptor::retriever("group", &["t.group", "t.get_group"]))
        .register(MethodDescriptor::retriever(
            "normal_interval",
            &["t.normal_interval", "t.get_normal_interval"],
        ))
        .register(MethodDescriptor::retriever("min_interval", &["t.min_interval", "t.get_min_interval"]))
        .register(MethodDescriptor::retriever(
            "scrape_complete",
            &["t.scrape_complete", "t.get_scrape_complete"],
        ))
        .register(MethodDescriptor::retriever(
            "scrape_incomplete",
            &["t.scrape_incomplete", "t.get_scrape_incomplete"],
        ))
        .register(MethodDescriptor::retriever(
            "scrape_downloaded",
            &["t.scrape_downloaded", "t.get_scrape_downloaded"],
        ))
        .register(MethodDescriptor::retriever(
            "scrape_time_last",
            &["t.scrape_time_last", "t.get_scrape_time_last"],
        ))
        .register(MethodDescriptor::boolean("is_enabled", &["t.is_enabled"]))
        .register(MethodDescriptor::boolean("is_open", &["t.is_open"]))
        .register(
            MethodDescriptor::modifier("set_enabled", &["t.is_enabled.set", "t.set_enabled"])
                .with_pre(PreProcessor::BoolToWire { slot_from_end: 0 }),
        )
        .build()
});

/// Handle to one tracker of a torrent, addressed by group index.
#[derive(Debug, Clone)]
pub struct Tracker {
    context: Arc<Context>,
    info_hash: String,
    index: i64,
    rpc_id: String,
}

impl Tracker {
    pub fn new(context: Arc<Context>, info_hash: impl Into<String>, index: i64) -> Self {
        let info_hash = info_hash.into();
        let rpc_id = format!("{info_hash}:t{index}");
        Self {
            context,
            info_hash,
            index,
            rpc_id,
        }
    }

    /// The tracker-kind method table.
    pub fn methods() -> &'static Registry {
        &METHODS
    }

    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    /// The compound id the daemon expects for per-tracker operations.
    pub fn rpc_id(&self) -> &str {
        &self.rpc_id
    }

    /// Builds a call with this tracker's identity injected.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnknownMethod` - If the logical name is not in the tracker table
    pub fn rpc_call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Call, RpcError> {
        let descriptor = METHODS.get(logical_name)?;
        Ok(Call::with_identity(
            descriptor,
            vec![Value::from(self.rpc_id.clone())],
            user_args,
        ))
    }

    /// Executes one registered operation against this tracker.
    pub async fn call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Value, RpcError> {
        let call = self.rpc_call(logical_name, user_args)?;
        let mut batch = Multicall::new(&self.context);
        batch.add(call).await?;
        let mut results = batch.send().await?;
        results.pop().ok_or_else(|| RpcError::Protocol {
            message: "single-call batch returned no result".to_string(),
        })
    }

    pub async fn url(&self) -> Result<String, RpcError> {
        self.call("url", vec![]).await?.try_into_string()
    }

    pub async fn is_enabled(&self) -> Result<bool, RpcError> {
        self.call("is_enabled", vec![]).await?.try_into_bool()
    }

    pub async fn enable(&self) -> Result<(), RpcError> {
        self.call("set_enabled", vec![Value::from(true)]).await?;
        Ok(())
    }

    pub async fn disable(&self) -> Result<(), RpcError> {
        self.call("set_enabled", vec![Value::from(false)]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tracker_tests {
    use super::*;
    use crate::rpc::test_stub::StubTransport;

    const INFO_HASH: &str = "1D226C20D67F8F2DDEE4FD99A880974B3F2B6F1E";

    #[test]
    fn test_rpc_id_is_hash_and_group() {
        let stub = Arc::new(StubTransport::new(&[], "0.9.8"));
        let tracker = Tracker::new(Arc::new(Context::new(stub)), INFO_HASH, 2);
        assert_eq!(tracker.rpc_id(), format!("{INFO_HASH}:t2"));
    }

    #[test]
    fn test_set_enabled_coerces_bool_to_wire_string() {
        let stub = Arc::new(StubTransport::new(&[], "0.9.8"));
        let tracker = Tracker::new(Arc::new(Context::new(stub)), INFO_HASH, 0);

        let call = tracker.rpc_call("set_enabled", vec![Value::from(true)]).unwrap();
        assert_eq!(
            call.pre_process().unwrap(),
            vec![Value::from(format!("{INFO_HASH}:t0")), Value::from("1")]
        );
    }

    #[tokio::test]
    async fn test_is_enabled_coerces_wire_int() {
        let stub = Arc::new(StubTransport::new(&["t.is_enabled"], "0.9.8"));
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::Int(1)])]));

        let tracker = Tracker::new(Arc::new(Context::new(stub)), INFO_HASH, 0);
        assert!(tracker.is_enabled().await.unwrap());
    }
}
