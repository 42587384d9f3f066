//! File handles and the file-kind method table

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};

use crate::context::Context;
use crate::rpc::{
    Call, EntityKind, MethodDescriptor, Multicall, PostProcessor, PreProcessor, Registry,
    RpcError, Value,
};

/// File priority levels in wire-index order.
///
/// Files have no "low" level; the daemon maps index 1 straight to
/// "normal".
pub const PRIORITY_LEVELS: &[&str] = &["off", "normal", "high"];

static METHODS: LazyLock<Registry> = LazyLock::new(|| {
    Registry::builder(EntityKind::File)
        .register(MethodDescriptor::retriever("multicall", &["f.multicall"]))
        .register(MethodDescriptor::retriever("path", &["f.path", "f.get_path"]))
        .register(MethodDescriptor::retriever("path_components", &["f.path_components", "f.get_path_components"]))
        .register(MethodDescriptor::retriever("path_depth", &["f.path_depth", "f.get_path_depth"]))
        .register(MethodDescriptor::retriever("frozen_path", &["f.frozen_path", "f.get_frozen_path"]))
        .register(MethodDescriptor::retriever("size_bytes", &["f.size_bytes", "f.get_size_bytes"]))
        .register(MethodDescriptor::retriever("size_chunks", &["f.size_chunks", "f.get_size_chunks"]))
        .register(MethodDescriptor::retriever(
            "completed_chunks",
            &["f.completed_chunks", "f.get_completed_chunks"],
        ))
        .register(MethodDescriptor::retriever("offset", &["f.offset", "f.get_offset"]))
        .register(MethodDescriptor::retriever("range_first", &["f.range_first", "f.get_range_first"]))
        .register(MethodDescriptor::retriever("range_second", &["f.range_second", "f.get_range_second"]))
        .register(MethodDescriptor::retriever("match_depth_next", &["f.match_depth_next", "f.get_match_depth_next"]))
        .register(MethodDescriptor::retriever("match_depth_prev", &["f.match_depth_prev", "f.get_match_depth_prev"]))
        .register(
            MethodDescriptor::retriever("priority", &["f.priority", "f.get_priority"])
                .with_post(PostProcessor::IndexToEnum { values: PRIORITY_LEVELS }),
        )
        .register(
            MethodDescriptor::retriever("last_touched", &["f.last_touched", "f.get_last_touched"])
                .with_post(PostProcessor::MicrosToDatetime),
        )
        .register(MethodDescriptor::boolean("is_created", &["f.is_created"]))
        .register(MethodDescriptor::boolean("is_open", &["f.is_open"]))
        .register(
            MethodDescriptor::modifier("set_priority", &["f.priority.set", "f.set_priority"])
                .with_pre(PreProcessor::EnumToIndex { values: PRIORITY_LEVELS, slot_from_end: 0 }),
        )
        .build()
});

/// Handle to one file inside a torrent, addressed by index.
#[derive(Debug, Clone)]
pub struct File {
    context: Arc<Context>,
    info_hash: String,
    index: i64,
    rpc_id: String,
}

impl File {
    pub fn new(context: Arc<Context>, info_hash: impl Into<String>, index: i64) -> Self {
        let info_hash = info_hash.into();
        let rpc_id = format!("{info_hash}:f{index}");
        Self {
            context,
            info_hash,
            index,
            rpc_id,
        }
    }

    /// The file-kind method table.
    pub fn methods() -> &'static Registry {
        &METHODS
    }

    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    /// The compound id the daemon expects for per-file operations.
    pub fn rpc_id(&self) -> &str {
        &self.rpc_id
    }

    /// Builds a call with this file's identity injected.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnknownMethod` - If the logical name is not in the file table
    pub fn rpc_call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Call, RpcError> {
        let descriptor = METHODS.get(logical_name)?;
        Ok(Call::with_identity(
            descriptor,
            vec![Value::from(self.rpc_id.clone())],
            user_args,
        ))
    }

    /// Executes one registered operation against this file.
    pub async fn call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Value, RpcError> {
        let call = self.rpc_call(logical_name, user_args)?;
        let mut batch = Multicall::new(&self.context);
        batch.add(call).await?;
        let mut results = batch.send().await?;
        results.pop().ok_or_else(|| RpcError::Protocol {
            message: "single-call batch returned no result".to_string(),
        })
    }

    pub async fn path(&self) -> Result<String, RpcError> {
        self.call("path", vec![]).await?.try_into_string()
    }

    pub async fn size_bytes(&self) -> Result<i64, RpcError> {
        self.call("size_bytes", vec![]).await?.try_into_i64()
    }

    /// Current priority as one of [`PRIORITY_LEVELS`].
    pub async fn priority(&self) -> Result<String, RpcError> {
        self.call("priority", vec![]).await?.try_into_string()
    }

    /// Sets the priority from one of [`PRIORITY_LEVELS`].
    pub async fn set_priority(&self, level: &str) -> Result<(), RpcError> {
        self.call("set_priority", vec![Value::from(level)]).await?;
        Ok(())
    }

    /// Last modification time of the file on disk.
    pub async fn last_touched(&self) -> Result<DateTime<Utc>, RpcError> {
        self.call("last_touched", vec![]).await?.try_into_datetime()
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;
    use crate::rpc::test_stub::StubTransport;

    const INFO_HASH: &str = "1D226C20D67F8F2DDEE4FD99A880974B3F2B6F1E";

    fn file_with(methods: &[&str]) -> (Arc<StubTransport>, File) {
        let stub = Arc::new(StubTransport::new(methods, "0.9.8"));
        let file = File::new(Arc::new(Context::new(stub.clone())), INFO_HASH, 1);
        (stub, file)
    }

    #[test]
    fn test_rpc_id_is_hash_and_index() {
        let (_, file) = file_with(&[]);
        assert_eq!(file.rpc_id(), format!("{INFO_HASH}:f1"));
    }

    #[test]
    fn test_set_priority_has_no_low_level() {
        let (_, file) = file_with(&[]);

        let high = file.rpc_call("set_priority", vec![Value::from("high")]).unwrap();
        assert_eq!(
            high.pre_process().unwrap(),
            vec![Value::from(format!("{INFO_HASH}:f1")), Value::Int(2)]
        );

        let low = file.rpc_call("set_priority", vec![Value::from("low")]).unwrap();
        assert!(matches!(low.pre_process(), Err(RpcError::UnexpectedValue { .. })));
    }

    #[tokio::test]
    async fn test_last_touched_converts_microseconds() {
        let (stub, file) = file_with(&["f.last_touched"]);
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::Int(
            1_414_776_586_757_462,
        )])]));

        let touched = file.last_touched().await.unwrap();
        assert_eq!(touched.timestamp_micros(), 1_414_776_586_757_462);
    }
}
