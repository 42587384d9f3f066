//! Session client: connection entry point and daemon-global operations

use std::sync::{Arc, LazyLock};

use url::Url;

use crate::config::NetworkConfig;
use crate::context::Context;
use crate::rpc::{
    Call, EntityKind, FieldMulticall, HttpTransport, MethodDescriptor, Multicall, PreProcessor,
    Registry, RpcError, ServerVersion, Transport, Value,
};
use crate::torrent::Torrent;

/// The daemon's default torrent view.
pub const DEFAULT_VIEW: &str = "main";

static METHODS: LazyLock<Registry> = LazyLock::new(|| {
    Registry::builder(EntityKind::Session)
        .register(MethodDescriptor::retriever("client_version", &["system.client_version"]))
        .register(MethodDescriptor::retriever("library_version", &["system.library_version"]))
        .register(MethodDescriptor::retriever("api_version", &["system.api_version"]))
        .register(MethodDescriptor::retriever("hostname", &["system.hostname"]))
        .register(MethodDescriptor::retriever("pid", &["system.pid"]))
        .register(MethodDescriptor::retriever("time_seconds", &["system.time_seconds"]))
        .register(MethodDescriptor::retriever("directory", &["directory.default", "get_directory"]))
        .register(MethodDescriptor::retriever("session_directory", &["session.path", "get_session"]))
        .register(MethodDescriptor::retriever("session_name", &["session.name", "get_name"]))
        .register(MethodDescriptor::retriever("dht_port", &["dht.port", "get_dht_port"]))
        .register(MethodDescriptor::retriever(
            "down_rate",
            &["throttle.global_down.rate", "get_down_rate"],
        ))
        .register(MethodDescriptor::retriever(
            "down_total",
            &["throttle.global_down.total", "get_down_total"],
        ))
        .register(MethodDescriptor::retriever("up_rate", &["throttle.global_up.rate", "get_up_rate"]))
        .register(MethodDescriptor::retriever(
            "up_total",
            &["throttle.global_up.total", "get_up_total"],
        ))
        .register(MethodDescriptor::retriever(
            "max_down_rate",
            &["throttle.global_down.max_rate", "get_download_rate"],
        ))
        .register(MethodDescriptor::retriever(
            "max_up_rate",
            &["throttle.global_up.max_rate", "get_upload_rate"],
        ))
        .register(MethodDescriptor::retriever(
            "max_memory_usage",
            &["pieces.memory.max", "get_max_memory_usage"],
        ))
        .register(MethodDescriptor::boolean(
            "check_hash",
            &["pieces.hash.on_completion", "get_check_hash"],
        ))
        .register(MethodDescriptor::modifier("set_directory", &["directory.default.set", "set_directory"]))
        .register(MethodDescriptor::modifier("set_dht_port", &["dht.port.set", "set_dht_port"]))
        .register(MethodDescriptor::modifier(
            "set_max_down_rate",
            &["throttle.global_down.max_rate.set", "set_download_rate"],
        ))
        .register(MethodDescriptor::modifier(
            "set_max_up_rate",
            &["throttle.global_up.max_rate.set", "set_upload_rate"],
        ))
        .register(
            MethodDescriptor::modifier("set_check_hash", &["pieces.hash.on_completion.set", "set_check_hash"])
                .with_pre(PreProcessor::BoolToWire { slot_from_end: 0 }),
        )
        // Load family. The eight variants cover raw/url, started/stopped,
        // and quiet/verbose, each a distinct wire method.
        .register(MethodDescriptor::modifier("load", &["load.normal", "load"]))
        .register(MethodDescriptor::modifier("load_verbose", &["load.verbose", "load_verbose"]))
        .register(MethodDescriptor::modifier("load_start", &["load.start", "load_start"]))
        .register(MethodDescriptor::modifier(
            "load_start_verbose",
            &["load.start_verbose", "load_start_verbose"],
        ))
        .register(MethodDescriptor::modifier("load_raw", &["load.raw", "load_raw"]))
        .register(MethodDescriptor::modifier("load_raw_verbose", &["load.raw_verbose", "load_raw_verbose"]))
        .register(MethodDescriptor::modifier("load_raw_start", &["load.raw_start", "load_raw_start"]))
        .register(MethodDescriptor::modifier(
            "load_raw_start_verbose",
            &["load.raw_start_verbose", "load_raw_start_verbose"],
        ))
        .build()
});

/// What to hand the daemon when loading a torrent.
#[derive(Debug, Clone)]
pub enum TorrentSource {
    /// A URL or local path the daemon fetches itself.
    Url(String),
    /// The raw bytes of a metainfo file, sent inline.
    Raw(Vec<u8>),
}

/// Connected session handle.
///
/// Cheap to clone; all clones share one discovery snapshot.
#[derive(Debug, Clone)]
pub struct Client {
    context: Arc<Context>,
}

impl Client {
    /// Connects to a daemon endpoint and performs discovery eagerly, so
    /// a bad endpoint fails here instead of on the first operation.
    ///
    /// # Errors
    ///
    /// - `RpcError::UrlParsing` - If the endpoint is not a valid URL
    /// - `RpcError::Protocol` - If discovery returns malformed data
    /// - Transport errors from the discovery round trips
    pub async fn connect(endpoint: &str, config: &NetworkConfig) -> Result<Self, RpcError> {
        let url = Url::parse(endpoint)?;
        let transport = Arc::new(HttpTransport::new(url, config));
        let client = Self::with_transport(transport);

        let methods = client.context.available_methods().await?.len();
        let version = client.context.server_version().await?;
        tracing::debug!(endpoint, %version, methods, "connected to daemon");

        Ok(client)
    }

    /// Wraps an already-built transport. Discovery happens lazily on
    /// first use.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            context: Arc::new(Context::new(transport)),
        }
    }

    /// The session-kind method table.
    pub fn methods() -> &'static Registry {
        &METHODS
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub async fn server_version(&self) -> Result<ServerVersion, RpcError> {
        self.context.server_version().await
    }

    /// Starts an empty batch for callers composing their own round trip.
    pub fn multicall(&self) -> Multicall<'_> {
        Multicall::new(&self.context)
    }

    /// Builds an unbound session-level call.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnknownMethod` - If the logical name is not in the session table
    pub fn rpc_call(&self, logical_name: &str, args: Vec<Value>) -> Result<Call, RpcError> {
        let descriptor = METHODS.get(logical_name)?;
        Ok(Call::new(descriptor, args))
    }

    /// Executes one registered session operation.
    pub async fn call(&self, logical_name: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let call = self.rpc_call(logical_name, args)?;
        let mut batch = self.multicall();
        batch.add(call).await?;
        let mut results = batch.send().await?;
        results.pop().ok_or_else(|| RpcError::Protocol {
            message: "single-call batch returned no result".to_string(),
        })
    }

    pub async fn hostname(&self) -> Result<String, RpcError> {
        self.call("hostname", vec![]).await?.try_into_string()
    }

    pub async fn directory(&self) -> Result<String, RpcError> {
        self.call("directory", vec![]).await?.try_into_string()
    }

    pub async fn down_rate(&self) -> Result<i64, RpcError> {
        self.call("down_rate", vec![]).await?.try_into_i64()
    }

    pub async fn up_rate(&self) -> Result<i64, RpcError> {
        self.call("up_rate", vec![]).await?.try_into_i64()
    }

    pub async fn dht_port(&self) -> Result<i64, RpcError> {
        self.call("dht_port", vec![]).await?.try_into_i64()
    }

    /// Sets the DHT UDP port. Zero is not a bindable port and is
    /// rejected before any round trip.
    pub async fn set_dht_port(&self, port: u16) -> Result<(), RpcError> {
        if port == 0 {
            return Err(RpcError::UnexpectedValue {
                message: "DHT port must be non-zero".to_string(),
            });
        }

        self.call("set_dht_port", vec![Value::from(i64::from(port))]).await?;
        Ok(())
    }

    pub async fn check_hash(&self) -> Result<bool, RpcError> {
        self.call("check_hash", vec![]).await?.try_into_bool()
    }

    pub async fn set_check_hash(&self, enabled: bool) -> Result<(), RpcError> {
        self.call("set_check_hash", vec![Value::from(enabled)]).await?;
        Ok(())
    }

    /// Binds a handle to a torrent by info-hash without any round trip.
    pub fn torrent(&self, info_hash: impl Into<String>) -> Torrent {
        Torrent::new(self.context.clone(), info_hash)
    }

    /// Field listing over every torrent in a view.
    pub fn torrent_fields(&self, view: &str) -> FieldMulticall<'_> {
        FieldMulticall::new(&self.context, Torrent::methods(), view)
    }

    /// Lists a view's torrents as bound handles.
    pub async fn torrents(&self, view: &str) -> Result<Vec<Torrent>, RpcError> {
        let mut listing = self.torrent_fields(view);
        listing.field("hash")?;
        let rows = listing.send().await?;

        rows.into_iter()
            .map(|row| {
                let hash = row
                    .get("hash")
                    .cloned()
                    .ok_or_else(|| RpcError::Protocol {
                        message: "torrent listing row missing hash".to_string(),
                    })?
                    .try_into_string()?;
                Ok(Torrent::new(self.context.clone(), hash))
            })
            .collect()
    }

    /// Hands a torrent to the daemon, choosing the load variant from
    /// the source kind and the start/verbose flags.
    pub async fn load_torrent(
        &self,
        source: TorrentSource,
        start: bool,
        verbose: bool,
    ) -> Result<(), RpcError> {
        let (logical_name, payload) = match source {
            TorrentSource::Url(location) => {
                let name = match (start, verbose) {
                    (false, false) => "load",
                    (false, true) => "load_verbose",
                    (true, false) => "load_start",
                    (true, true) => "load_start_verbose",
                };
                (name, Value::from(location))
            }
            TorrentSource::Raw(bytes) => {
                let name = match (start, verbose) {
                    (false, false) => "load_raw",
                    (false, true) => "load_raw_verbose",
                    (true, false) => "load_raw_start",
                    (true, true) => "load_raw_start_verbose",
                };
                (name, Value::from(bytes))
            }
        };

        self.call(logical_name, vec![payload]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod client_tests {
    use super::*;
    use crate::rpc::test_stub::StubTransport;

    const INFO_HASH: &str = "1D226C20D67F8F2DDEE4FD99A880974B3F2B6F1E";

    fn client_with(methods: &[&str]) -> (Arc<StubTransport>, Client) {
        let stub = Arc::new(StubTransport::new(methods, "0.9.8"));
        let client = Client::with_transport(stub.clone());
        (stub, client)
    }

    #[tokio::test]
    async fn test_torrents_builds_handles_from_hashes() {
        let (stub, client) = client_with(&["d.multicall", "d.hash"]);
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::from(INFO_HASH)])]));

        let torrents = client.torrents(DEFAULT_VIEW).await.unwrap();
        assert_eq!(torrents.len(), 1);
        assert_eq!(torrents[0].info_hash(), INFO_HASH);

        let calls = stub.recorded_calls();
        let (method, args) = calls.last().unwrap();
        assert_eq!(method, "d.multicall");
        assert_eq!(args[0], Value::from(DEFAULT_VIEW));
    }

    #[tokio::test]
    async fn test_load_resolves_variant_by_flags() {
        let (stub, client) = client_with(&["load.raw_start", "load.normal"]);
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::Int(0)])]));
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::Int(0)])]));

        client
            .load_torrent(TorrentSource::Raw(vec![0x64, 0x65]), true, false)
            .await
            .unwrap();
        client
            .load_torrent(TorrentSource::Url("http://example/a.torrent".to_string()), false, false)
            .await
            .unwrap();

        assert_eq!(stub.calls_for("system.multicall"), 2);
    }

    #[tokio::test]
    async fn test_zero_dht_port_rejected_without_round_trip() {
        let (stub, client) = client_with(&["dht.port.set"]);

        let result = client.set_dht_port(0).await;
        assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
        assert_eq!(stub.calls_for("system.multicall"), 0);
    }

    #[tokio::test]
    async fn test_legacy_wire_name_fallback() {
        // Vintage daemon exposing only get_-style names.
        let (stub, client) = client_with(&["get_down_rate"]);
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::Int(1024)])]));

        assert_eq!(client.down_rate().await.unwrap(), 1024);
    }
}
