//! Abstract request/response RPC channel to the daemon

use async_trait::async_trait;

use super::value::Value;
use super::RpcError;

/// One request/response RPC channel to the daemon.
///
/// This is the library's single suspension point: descriptor resolution
/// and pre/post-processing are synchronous in-memory work. The batching
/// layer assumes one in-flight request per transport handle at a time;
/// interleaving batches on a shared handle is the caller's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one RPC and returns the raw result value.
    ///
    /// Transport-level failures (connection refused, malformed response
    /// envelope) are surfaced unmodified; the batching layer never
    /// retries them.
    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError>;

    /// Endpoint description for logging.
    fn endpoint(&self) -> &str;
}
