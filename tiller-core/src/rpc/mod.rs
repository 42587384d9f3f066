//! RPC method registry and batched multicall execution
//!
//! The daemon exposes every operation as a flat list of XML-RPC methods
//! whose names drift across versions. This module turns a declarative
//! table of method descriptors into callable operations and coalesces
//! many of them into a single `system.multicall` round trip.

pub mod call;
pub mod descriptor;
pub mod metadata;
pub mod multicall;
pub mod processors;
pub mod registry;
#[cfg(test)]
pub(crate) mod test_stub;
pub mod transport;
pub mod value;
pub mod xmlrpc;

use std::fmt;
use std::str::FromStr;

pub use call::Call;
pub use descriptor::{MethodDescriptor, MethodKind};
pub use metadata::{EntityMetadata, FieldMulticall};
pub use multicall::Multicall;
pub use processors::{PostProcessor, PreProcessor};
pub use registry::{EntityKind, Registry, RegistryBuilder};
pub use transport::Transport;
pub use value::Value;
pub use xmlrpc::HttpTransport;

/// Daemon version as reported by `system.client_version`.
///
/// Compared lexicographically against descriptor minimum versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion(pub u32, pub u32, pub u32);

impl FromStr for ServerVersion {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.').map(|part| {
            part.parse::<u32>().map_err(|_| RpcError::Protocol {
                message: format!("invalid daemon version string: {s:?}"),
            })
        });

        // Missing trailing components default to zero ("0.9" == 0.9.0).
        let major = parts.next().transpose()?.ok_or_else(|| RpcError::Protocol {
            message: "empty daemon version string".to_string(),
        })?;
        let minor = parts.next().transpose()?.unwrap_or(0);
        let patch = parts.next().transpose()?.unwrap_or(0);

        Ok(ServerVersion(major, minor, patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Errors that can occur while registering, resolving, or executing
/// RPC operations.
///
/// Transport failures are passed through unwrapped; everything else is
/// surfaced to the immediate caller and never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("no available wire method for '{logical_name}', candidates: {candidates:?}")]
    MethodUnavailable {
        logical_name: String,
        candidates: Vec<String>,
    },

    #[error("'{logical_name}' is not registered for {kind} methods")]
    UnknownMethod {
        kind: EntityKind,
        logical_name: String,
    },

    #[error("modifier '{logical_name}' called without its value argument")]
    MissingArgument { logical_name: String },

    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("duplicate registration of '{logical_name}' for {kind} methods")]
    DuplicateRegistration {
        kind: EntityKind,
        logical_name: &'static str,
    },

    #[error("daemon fault {code}: {message}")]
    ServerFault { code: i64, message: String },

    #[error("unexpected value: {message}")]
    UnexpectedValue { message: String },

    #[error("HTTP error")]
    Http(#[from] reqwest::Error),

    #[error("URL parsing error")]
    UrlParsing(#[from] url::ParseError),
}
