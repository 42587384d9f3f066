//! Shared connection context with compute-once daemon discovery

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::rpc::{RpcError, ServerVersion, Transport, Value};

/// Transport handle plus a cached snapshot of the daemon's discovery data.
///
/// The available-method list and version are fetched at most once per
/// connection lifetime and treated as read-only afterwards; concurrent
/// first-time population is resolved by a compute-once guard. A fresh
/// snapshot requires a fresh `Context`.
pub struct Context {
    transport: Arc<dyn Transport>,
    methods: OnceCell<HashSet<String>>,
    version: OnceCell<ServerVersion>,
}

impl Context {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            methods: OnceCell::new(),
            version: OnceCell::new(),
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// The daemon's discovered method list, fetched once via
    /// `system.listMethods` and cached for the connection lifetime.
    ///
    /// # Errors
    ///
    /// - `RpcError::Protocol` - If the discovery response is not a string array
    /// - Transport errors from the discovery round trip
    pub async fn available_methods(&self) -> Result<&HashSet<String>, RpcError> {
        self.methods
            .get_or_try_init(|| async {
                let raw = self.transport.call("system.listMethods", &[]).await?;
                let entries = raw.into_array().ok_or_else(|| RpcError::Protocol {
                    message: "method discovery did not return an array".to_string(),
                })?;

                tracing::debug!(
                    endpoint = self.transport.endpoint(),
                    methods = entries.len(),
                    "discovered daemon method list"
                );

                entries
                    .into_iter()
                    .map(|entry| match entry {
                        Value::String(name) => Ok(name),
                        other => Err(RpcError::Protocol {
                            message: format!(
                                "method discovery returned a {} entry",
                                other.type_name()
                            ),
                        }),
                    })
                    .collect()
            })
            .await
    }

    /// The daemon's version, fetched once via `system.client_version`.
    ///
    /// # Errors
    ///
    /// - `RpcError::Protocol` - If the version string is missing or malformed
    /// - Transport errors from the discovery round trip
    pub async fn server_version(&self) -> Result<ServerVersion, RpcError> {
        self.version
            .get_or_try_init(|| async {
                let raw = self.transport.call("system.client_version", &[]).await?;
                let text = raw.as_str().ok_or_else(|| RpcError::Protocol {
                    message: format!("version call returned a {} value", raw.type_name()),
                })?;

                text.parse()
            })
            .await
            .copied()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("endpoint", &self.transport.endpoint())
            .field("discovered", &self.methods.initialized())
            .finish()
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::rpc::test_stub::StubTransport;

    #[tokio::test]
    async fn test_discovery_is_fetched_once() {
        let stub = Arc::new(StubTransport::new(&["d.name", "d.is_active"], "0.9.8"));
        let context = Context::new(stub.clone());

        let first = context.available_methods().await.unwrap().len();
        let second = context.available_methods().await.unwrap().len();
        assert_eq!(first, 2);
        assert_eq!(second, 2);
        assert_eq!(stub.calls_for("system.listMethods"), 1);
    }

    #[tokio::test]
    async fn test_version_parsed_and_cached() {
        let stub = Arc::new(StubTransport::new(&[], "0.9.8"));
        let context = Context::new(stub.clone());

        assert_eq!(context.server_version().await.unwrap(), ServerVersion(0, 9, 8));
        assert_eq!(context.server_version().await.unwrap(), ServerVersion(0, 9, 8));
        assert_eq!(stub.calls_for("system.client_version"), 1);
    }

    #[tokio::test]
    async fn test_non_array_discovery_is_protocol_error() {
        let stub = Arc::new(StubTransport::new(&[], "0.9.8").with_method_list_override(Value::Int(3)));
        let context = Context::new(stub);

        let result = context.available_methods().await;
        assert!(matches!(result, Err(RpcError::Protocol { .. })));
    }
}
