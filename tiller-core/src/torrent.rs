//! Torrent handles and the torrent-kind method table

use std::sync::{Arc, LazyLock};

use crate::context::Context;
use crate::file::File;
use crate::peer::Peer;
use crate::rpc::{
    Call, EntityKind, FieldMulticall, MethodDescriptor, Multicall, PostProcessor, PreProcessor,
    Registry, RpcError, ServerVersion, Value,
};
use crate::tracker::Tracker;

/// Torrent priority levels in wire-index order.
pub const PRIORITY_LEVELS: &[&str] = &["off", "low", "normal", "high"];

static METHODS: LazyLock<Registry> = LazyLock::new(|| {
    Registry::builder(EntityKind::Torrent)
        .register(MethodDescriptor::retriever("multicall", &["d.multicall"]))
        // Retrievers
        .register(MethodDescriptor::retriever("hash", &["d.hash", "d.get_hash"]))
        .register(MethodDescriptor::retriever("name", &["d.name", "d.get_name"]))
        .register(MethodDescriptor::retriever("state", &["d.state", "d.get_state"]))
        .register(MethodDescriptor::retriever("directory", &["d.directory", "d.get_directory"]))
        .register(MethodDescriptor::retriever("directory_base", &["d.directory_base", "d.get_directory_base"]))
        .register(MethodDescriptor::retriever("base_path", &["d.base_path", "d.get_base_path"]))
        .register(MethodDescriptor::retriever("base_filename", &["d.base_filename", "d.get_base_filename"]))
        .register(MethodDescriptor::retriever("down_rate", &["d.down.rate", "d.get_down_rate"]))
        .register(MethodDescriptor::retriever("down_total", &["d.down.total", "d.get_down_total"]))
        .register(MethodDescriptor::retriever("up_rate", &["d.up.rate", "d.get_up_rate"]))
        .register(MethodDescriptor::retriever("up_total", &["d.up.total", "d.get_up_total"]))
        .register(MethodDescriptor::retriever("skip_rate", &["d.skip.rate", "d.get_skip_rate"]))
        .register(MethodDescriptor::retriever("skip_total", &["d.skip.total", "d.get_skip_total"]))
        .register(MethodDescriptor::retriever("ratio", &["d.ratio", "d.get_ratio"]))
        .register(MethodDescriptor::retriever("size_bytes", &["d.size_bytes", "d.get_size_bytes"]))
        .register(MethodDescriptor::retriever("size_chunks", &["d.size_chunks", "d.get_size_chunks"]))
        .register(MethodDescriptor::retriever("size_files", &["d.size_files", "d.get_size_files"]))
        .register(MethodDescriptor::retriever("chunk_size", &["d.chunk_size", "d.get_chunk_size"]))
        .register(MethodDescriptor::retriever("chunks_hashed", &["d.chunks_hashed", "d.get_chunks_hashed"]))
        .register(MethodDescriptor::retriever("completed_bytes", &["d.completed_bytes", "d.get_completed_bytes"]))
        .register(MethodDescriptor::retriever("completed_chunks", &["d.completed_chunks", "d.get_completed_chunks"]))
        .register(MethodDescriptor::retriever("bytes_done", &["d.bytes_done", "d.get_bytes_done"]))
        .register(MethodDescriptor::retriever("left_bytes", &["d.left_bytes", "d.get_left_bytes"]))
        .register(MethodDescriptor::retriever("message", &["d.message", "d.get_message"]))
        .register(MethodDescriptor::retriever("loaded_file", &["d.loaded_file", "d.get_loaded_file"]))
        .register(MethodDescriptor::retriever("tied_to_file", &["d.tied_to_file", "d.get_tied_to_file"]))
        .register(MethodDescriptor::retriever("creation_date", &["d.creation_date", "d.get_creation_date"]))
        .register(MethodDescriptor::retriever("local_id", &["d.local_id", "d.get_local_id"]))
        .register(MethodDescriptor::retriever("local_id_html", &["d.local_id_html", "d.get_local_id_html"]))
        .register(MethodDescriptor::retriever("max_file_size", &["d.max_file_size", "d.get_max_file_size"]))
        .register(
            MethodDescriptor::retriever("free_diskspace", &["d.free_diskspace", "d.get_free_diskspace"])
                .with_min_version(ServerVersion(0, 8, 3)),
        )
        .register(MethodDescriptor::retriever("bitfield", &["d.bitfield", "d.get_bitfield"]))
        .register(MethodDescriptor::retriever("hashing", &["d.hashing", "d.get_hashing"]))
        .register(MethodDescriptor::retriever("hashing_failed", &["d.hashing_failed", "d.get_hashing_failed"]))
        .register(MethodDescriptor::retriever("ignore_commands", &["d.ignore_commands", "d.get_ignore_commands"]))
        .register(MethodDescriptor::retriever("peers_min", &["d.peers_min", "d.get_peers_min"]))
        .register(MethodDescriptor::retriever("peers_max", &["d.peers_max", "d.get_peers_max"]))
        .register(MethodDescriptor::retriever("peers_accounted", &["d.peers_accounted", "d.get_peers_accounted"]))
        .register(MethodDescriptor::retriever("peers_complete", &["d.peers_complete", "d.get_peers_complete"]))
        .register(MethodDescriptor::retriever("peers_connected", &["d.peers_connected", "d.get_peers_connected"]))
        .register(MethodDescriptor::retriever(
            "peers_not_connected",
            &["d.peers_not_connected", "d.get_peers_not_connected"],
        ))
        .register(
            MethodDescriptor::retriever("peer_exchange", &["d.peer_exchange", "d.get_peer_exchange"])
                .with_min_version(ServerVersion(0, 8, 0)),
        )
        .register(MethodDescriptor::retriever("size_pex", &["d.size_pex", "d.get_size_pex"]))
        .register(MethodDescriptor::retriever("max_size_pex", &["d.max_size_pex", "d.get_max_size_pex"]))
        .register(
            MethodDescriptor::retriever("priority", &["d.priority", "d.get_priority"])
                .with_post(PostProcessor::IndexToEnum { values: PRIORITY_LEVELS }),
        )
        .register(MethodDescriptor::retriever("priority_str", &["d.priority_str", "d.get_priority_str"]))
        .register(MethodDescriptor::retriever("state_changed", &["d.state_changed", "d.get_state_changed"]))
        .register(MethodDescriptor::retriever("state_counter", &["d.state_counter", "d.get_state_counter"]))
        .register(MethodDescriptor::retriever("throttle_name", &["d.throttle_name", "d.get_throttle_name"]))
        .register(MethodDescriptor::retriever("tracker_focus", &["d.tracker_focus", "d.get_tracker_focus"]))
        .register(MethodDescriptor::retriever("tracker_numwant", &["d.tracker_numwant", "d.get_tracker_numwant"]))
        .register(MethodDescriptor::retriever("tracker_size", &["d.tracker_size", "d.get_tracker_size"]))
        .register(MethodDescriptor::retriever("uploads_max", &["d.uploads_max", "d.get_uploads_max"]))
        .register(MethodDescriptor::retriever(
            "connection_current",
            &["d.connection_current", "d.get_connection_current"],
        ))
        .register(MethodDescriptor::retriever("connection_leech", &["d.connection_leech", "d.get_connection_leech"]))
        .register(MethodDescriptor::retriever("connection_seed", &["d.connection_seed", "d.get_connection_seed"]))
        // Boolean retrievers
        .register(MethodDescriptor::boolean("is_active", &["d.is_active"]))
        .register(MethodDescriptor::boolean("is_open", &["d.is_open"]))
        .register(MethodDescriptor::boolean("is_complete", &["d.complete", "d.get_complete"]))
        .register(MethodDescriptor::boolean("is_hash_checked", &["d.is_hash_checked"]))
        .register(MethodDescriptor::boolean("is_hash_checking", &["d.is_hash_checking"]))
        .register(MethodDescriptor::boolean("is_multi_file", &["d.is_multi_file"]))
        .register(MethodDescriptor::boolean("is_private", &["d.is_private"]))
        .register(
            MethodDescriptor::boolean("is_pex_active", &["d.is_pex_active"])
                .with_min_version(ServerVersion(0, 8, 0)),
        )
        // Commands: argumentless state transitions reporting an exit code
        .register(MethodDescriptor::retriever("start", &["d.start"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("stop", &["d.stop"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("open", &["d.open"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("close", &["d.close"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("erase", &["d.erase"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("try_start", &["d.try_start"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("try_stop", &["d.try_stop"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("try_close", &["d.try_close"]).with_post(PostProcessor::CheckSuccess))
        .register(MethodDescriptor::retriever("check_hash", &["d.check_hash"]).with_post(PostProcessor::CheckSuccess))
        // Modifiers
        .register(MethodDescriptor::modifier("set_directory", &["d.directory.set", "d.set_directory"]))
        .register(
            MethodDescriptor::modifier("set_priority", &["d.priority.set", "d.set_priority"])
                .with_pre(PreProcessor::EnumToIndex { values: PRIORITY_LEVELS, slot_from_end: 0 }),
        )
        .register(MethodDescriptor::modifier(
            "set_connection_current",
            &["d.connection_current.set", "d.set_connection_current"],
        ))
        .register(MethodDescriptor::modifier("set_custom1", &["d.custom1.set", "d.set_custom1"]))
        .register(MethodDescriptor::modifier("set_custom2", &["d.custom2.set", "d.set_custom2"]))
        .register(MethodDescriptor::modifier("set_custom3", &["d.custom3.set", "d.set_custom3"]))
        .register(MethodDescriptor::modifier("set_custom4", &["d.custom4.set", "d.set_custom4"]))
        .register(MethodDescriptor::modifier("set_custom5", &["d.custom5.set", "d.set_custom5"]))
        .register(MethodDescriptor::modifier("set_hashing_failed", &["d.hashing_failed.set", "d.set_hashing_failed"]))
        .register(MethodDescriptor::modifier(
            "set_ignore_commands",
            &["d.ignore_commands.set", "d.set_ignore_commands"],
        ))
        .register(MethodDescriptor::modifier("set_max_file_size", &["d.max_file_size.set", "d.set_max_file_size"]))
        .register(MethodDescriptor::modifier("set_message", &["d.message.set", "d.set_message"]))
        .register(MethodDescriptor::modifier("set_peers_max", &["d.peers_max.set", "d.set_peers_max"]))
        .register(MethodDescriptor::modifier("set_peers_min", &["d.peers_min.set", "d.set_peers_min"]))
        .register(MethodDescriptor::modifier("set_throttle_name", &["d.throttle_name.set", "d.set_throttle_name"]))
        .register(MethodDescriptor::modifier("set_tied_to_file", &["d.tied_to_file.set", "d.set_tied_to_file"]))
        .register(MethodDescriptor::modifier(
            "set_tracker_numwant",
            &["d.tracker_numwant.set", "d.set_tracker_numwant"],
        ))
        .register(MethodDescriptor::modifier("set_uploads_max", &["d.uploads_max.set", "d.set_uploads_max"]))
        .build()
});

/// Handle to one torrent on the connected daemon.
///
/// Identity is the torrent's info-hash; no field values are cached, so
/// every accessor reflects current daemon state.
#[derive(Debug, Clone)]
pub struct Torrent {
    context: Arc<Context>,
    info_hash: String,
}

impl Torrent {
    pub fn new(context: Arc<Context>, info_hash: impl Into<String>) -> Self {
        Self {
            context,
            info_hash: info_hash.into(),
        }
    }

    /// The torrent-kind method table.
    pub fn methods() -> &'static Registry {
        &METHODS
    }

    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    /// The id the daemon expects for per-torrent operations.
    pub fn rpc_id(&self) -> &str {
        &self.info_hash
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Builds a call with this torrent's identity injected, suitable for
    /// inclusion in a larger [`Multicall`] batch.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnknownMethod` - If the logical name is not in the torrent table
    pub fn rpc_call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Call, RpcError> {
        let descriptor = METHODS.get(logical_name)?;
        Ok(Call::with_identity(
            descriptor,
            vec![Value::from(self.rpc_id().to_string())],
            user_args,
        ))
    }

    /// Executes one registered operation against this torrent.
    pub async fn call(&self, logical_name: &str, user_args: Vec<Value>) -> Result<Value, RpcError> {
        let call = self.rpc_call(logical_name, user_args)?;
        let mut batch = Multicall::new(&self.context);
        batch.add(call).await?;
        let mut results = batch.send().await?;
        results.pop().ok_or_else(|| RpcError::Protocol {
            message: "single-call batch returned no result".to_string(),
        })
    }

    pub async fn name(&self) -> Result<String, RpcError> {
        self.call("name", vec![]).await?.try_into_string()
    }

    pub async fn is_active(&self) -> Result<bool, RpcError> {
        self.call("is_active", vec![]).await?.try_into_bool()
    }

    pub async fn is_complete(&self) -> Result<bool, RpcError> {
        self.call("is_complete", vec![]).await?.try_into_bool()
    }

    pub async fn down_rate(&self) -> Result<i64, RpcError> {
        self.call("down_rate", vec![]).await?.try_into_i64()
    }

    pub async fn up_rate(&self) -> Result<i64, RpcError> {
        self.call("up_rate", vec![]).await?.try_into_i64()
    }

    pub async fn size_bytes(&self) -> Result<i64, RpcError> {
        self.call("size_bytes", vec![]).await?.try_into_i64()
    }

    pub async fn message(&self) -> Result<String, RpcError> {
        self.call("message", vec![]).await?.try_into_string()
    }

    pub async fn directory(&self) -> Result<String, RpcError> {
        self.call("directory", vec![]).await?.try_into_string()
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

    /// Starts the torrent and reports whether it is now active.
    ///
    /// One batch: `try_start` followed by `is_active`, mirroring the
    /// daemon's own two-step activation.
    pub async fn start(&self) -> Result<bool, RpcError> {
        self.transition("try_start").await
    }

    /// Stops the torrent and reports whether it is still active.
    pub async fn stop(&self) -> Result<bool, RpcError> {
        self.transition("try_stop").await
    }

    async fn transition(&self, command: &str) -> Result<bool, RpcError> {
        let mut batch = Multicall::new(&self.context);
        batch.add(self.rpc_call(command, vec![])?).await?;
        batch.add(self.rpc_call("is_active", vec![])?).await?;
        let mut results = batch.send().await?;
        results
            .pop()
            .ok_or_else(|| RpcError::Protocol {
                message: "transition batch returned no result".to_string(),
            })?
            .try_into_bool()
    }

    /// Changes the download directory.
    ///
    /// The daemon requires the torrent stopped while the directory
    /// changes; it is not restarted afterwards.
    pub async fn set_directory(&self, directory: &str) -> Result<(), RpcError> {
        let mut batch = Multicall::new(&self.context);
        batch.add(self.rpc_call("try_stop", vec![])?).await?;
        batch
            .add(self.rpc_call("set_directory", vec![Value::from(directory)])?)
            .await?;
        batch.send().await?;
        Ok(())
    }

    /// Field listing over this torrent's trackers.
    pub fn tracker_fields(&self) -> FieldMulticall<'_> {
        FieldMulticall::new(&self.context, Tracker::methods(), self.rpc_id())
    }

    /// Field listing over this torrent's files.
    pub fn file_fields(&self) -> FieldMulticall<'_> {
        FieldMulticall::new(&self.context, File::methods(), self.rpc_id())
    }

    /// Field listing over this torrent's peers.
    pub fn peer_fields(&self) -> FieldMulticall<'_> {
        FieldMulticall::new(&self.context, Peer::methods(), self.rpc_id())
    }

    /// Lists this torrent's trackers as bound handles.
    pub async fn trackers(&self) -> Result<Vec<Tracker>, RpcError> {
        let mut listing = self.tracker_fields();
        listing.field("group")?;
        let rows = listing.send().await?;

        rows.into_iter()
            .map(|row| {
                let group = row
                    .get("group")
                    .cloned()
                    .ok_or_else(|| RpcError::Protocol {
                        message: "tracker listing row missing group".to_string(),
                    })?
                    .try_into_i64()?;
                Ok(Tracker::new(self.context.clone(), self.info_hash.clone(), group))
            })
            .collect()
    }

    /// Lists this torrent's files as bound handles.
    ///
    /// File indices are assigned by byte-offset order within the
    /// torrent, which matches the daemon's own file numbering.
    pub async fn files(&self) -> Result<Vec<File>, RpcError> {
        let mut listing = self.file_fields();
        listing.field("offset")?;
        let rows = listing.send().await?;

        let offsets = rows
            .into_iter()
            .map(|row| {
                row.get("offset")
                    .cloned()
                    .ok_or_else(|| RpcError::Protocol {
                        message: "file listing row missing offset".to_string(),
                    })?
                    .try_into_i64()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut sorted = offsets.clone();
        sorted.sort_unstable();

        Ok(offsets
            .into_iter()
            .map(|offset| {
                let index = sorted.iter().position(|candidate| *candidate == offset).unwrap_or(0);
                File::new(self.context.clone(), self.info_hash.clone(), index as i64)
            })
            .collect())
    }

    /// Lists this torrent's peers as bound handles.
    pub async fn peers(&self) -> Result<Vec<Peer>, RpcError> {
        let mut listing = self.peer_fields();
        listing.field("id")?;
        let rows = listing.send().await?;

        rows.into_iter()
            .map(|row| {
                let id = row
                    .get("id")
                    .cloned()
                    .ok_or_else(|| RpcError::Protocol {
                        message: "peer listing row missing id".to_string(),
                    })?
                    .try_into_string()?;
                Ok(Peer::new(self.context.clone(), self.info_hash.clone(), id))
            })
            .collect()
    }
}

#[cfg(test)]
mod torrent_tests {
    use super::*;
    use crate::rpc::test_stub::StubTransport;

    const INFO_HASH: &str = "1D226C20D67F8F2DDEE4FD99A880974B3F2B6F1E";

    fn context_with(methods: &[&str]) -> (Arc<StubTransport>, Arc<Context>) {
        let stub = Arc::new(StubTransport::new(methods, "0.9.8"));
        let context = Arc::new(Context::new(stub.clone()));
        (stub, context)
    }

    #[test]
    fn test_table_registers_priority_enum() {
        let descriptor = Torrent::methods().get("set_priority").unwrap();
        assert!(descriptor.is_modifier());
        assert_eq!(descriptor.wire_names(), &["d.priority.set", "d.set_priority"]);
    }

    #[test]
    fn test_set_priority_wire_args_inject_identity() {
        let (_, context) = context_with(&[]);
        let torrent = Torrent::new(context, INFO_HASH);

        let call = torrent.rpc_call("set_priority", vec![Value::from("off")]).unwrap();
        assert_eq!(
            call.pre_process().unwrap(),
            vec![Value::from(INFO_HASH), Value::Int(0)]
        );
    }

    #[tokio::test]
    async fn test_start_reports_final_activity() {
        let (stub, context) = context_with(&["d.try_start", "d.is_active"]);
        stub.push_response(Value::Array(vec![
            Value::Array(vec![Value::Int(0)]),
            Value::Array(vec![Value::Int(1)]),
        ]));

        let torrent = Torrent::new(context, INFO_HASH);
        assert!(torrent.start().await.unwrap());
        assert_eq!(stub.calls_for("system.multicall"), 1);
    }

    #[tokio::test]
    async fn test_files_assigns_indices_by_offset_order() {
        let (stub, context) = context_with(&["f.multicall", "f.offset"]);
        // Rows arrive out of byte order.
        stub.push_response(Value::Array(vec![
            Value::Array(vec![Value::Int(5000)]),
            Value::Array(vec![Value::Int(0)]),
            Value::Array(vec![Value::Int(900)]),
        ]));

        let torrent = Torrent::new(context, INFO_HASH);
        let files = torrent.files().await.unwrap();
        let indices: Vec<_> = files.iter().map(File::index).collect();
        assert_eq!(indices, vec![2, 0, 1]);
    }
}
