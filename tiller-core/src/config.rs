//! Centralized configuration for Tiller.
//!
//! All tunable parameters live here instead of being hard-coded at the
//! call sites that use them.

use std::time::Duration;

/// Network communication settings for the daemon connection.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP request timeout for one RPC round trip
    pub rpc_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(30),
            user_agent: "tiller/0.1.0",
        }
    }
}
