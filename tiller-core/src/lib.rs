//! Tiller Core - rTorrent XML-RPC client library
//!
//! This crate provides typed access to a running rTorrent daemon over
//! its XML-RPC interface: a declarative registry of method descriptors,
//! batched `system.multicall` execution, field listings, and per-entity
//! handles for torrents, trackers, files, and peers.

pub mod client;
pub mod config;
pub mod context;
pub mod file;
pub mod peer;
pub mod rpc;
pub mod torrent;
pub mod tracker;

// Re-export main types for convenient access
pub use client::{Client, TorrentSource};
pub use config::NetworkConfig;
pub use context::Context;
pub use file::File;
pub use peer::Peer;
pub use rpc::{
    Call, EntityKind, EntityMetadata, FieldMulticall, HttpTransport, MethodDescriptor, Multicall,
    Registry, RpcError, ServerVersion, Transport, Value,
};
pub use torrent::Torrent;
pub use tracker::Tracker;

/// Convenience alias for fallible library operations.
pub type Result<T> = std::result::Result<T, RpcError>;
