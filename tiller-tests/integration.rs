//! Integration tests for Tiller
//!
//! These tests exercise the public library surface end to end against a
//! scripted transport: discovery, batching, entity handles, and field
//! listings working together the way a daemon session would.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/batching.rs"]
mod batching;
#[path = "integration/entities.rs"]
mod entities;
#[path = "integration/listings.rs"]
mod listings;
#[path = "integration/session.rs"]
mod session;
