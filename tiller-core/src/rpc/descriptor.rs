//! Immutable registration records binding logical operations to wire methods

use std::collections::HashSet;

use super::processors::{wire_to_bool, PostProcessor, PreProcessor};
use super::value::Value;
use super::{RpcError, ServerVersion};

/// Whether an operation reads daemon state or mutates it.
///
/// Modifiers require a trailing value argument beyond any entity
/// identity; retrievers (including parameterless commands such as
/// `d.try_start`) do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Retriever,
    Modifier,
}

/// Declarative, reusable template for one remote operation.
///
/// Binds a stable logical name to the ordered list of wire method names
/// that implement it across daemon versions, plus the transforms applied
/// around the round trip. Descriptors are immutable once registered; the
/// per-kind [`Registry`](super::registry::Registry) owns the canonical copy.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    logical_name: &'static str,
    wire_names: &'static [&'static str],
    kind: MethodKind,
    pre: Vec<PreProcessor>,
    post: Vec<PostProcessor>,
    is_boolean: bool,
    min_version: Option<ServerVersion>,
}

impl MethodDescriptor {
    fn new(logical_name: &'static str, wire_names: &'static [&'static str], kind: MethodKind) -> Self {
        assert!(
            !wire_names.is_empty(),
            "descriptor '{logical_name}' registered without wire names"
        );

        Self {
            logical_name,
            wire_names,
            kind,
            pre: Vec::new(),
            post: Vec::new(),
            is_boolean: false,
            min_version: None,
        }
    }

    /// Creates a read-only operation descriptor.
    pub fn retriever(logical_name: &'static str, wire_names: &'static [&'static str]) -> Self {
        Self::new(logical_name, wire_names, MethodKind::Retriever)
    }

    /// Creates a state-changing operation descriptor.
    pub fn modifier(logical_name: &'static str, wire_names: &'static [&'static str]) -> Self {
        Self::new(logical_name, wire_names, MethodKind::Modifier)
    }

    /// Creates a retriever whose result is coerced to a boolean.
    pub fn boolean(logical_name: &'static str, wire_names: &'static [&'static str]) -> Self {
        let mut descriptor = Self::new(logical_name, wire_names, MethodKind::Retriever);
        descriptor.is_boolean = true;
        descriptor
    }

    /// Appends a pre-processor to the transmission chain.
    pub fn with_pre(mut self, pre: PreProcessor) -> Self {
        self.pre.push(pre);
        self
    }

    /// Appends a post-processor to the result chain.
    pub fn with_post(mut self, post: PostProcessor) -> Self {
        self.post.push(post);
        self
    }

    /// Restricts this descriptor to daemons at or above `version`.
    pub fn with_min_version(mut self, version: ServerVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    pub fn logical_name(&self) -> &'static str {
        self.logical_name
    }

    pub fn wire_names(&self) -> &'static [&'static str] {
        self.wire_names
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn is_retriever(&self) -> bool {
        self.kind == MethodKind::Retriever
    }

    pub fn is_modifier(&self) -> bool {
        self.kind == MethodKind::Modifier
    }

    pub fn min_version(&self) -> Option<ServerVersion> {
        self.min_version
    }

    /// Resolves the first candidate wire name the daemon actually exposes.
    ///
    /// # Errors
    ///
    /// - `RpcError::MethodUnavailable` - If no candidate is in `available`
    pub fn resolve_wire_name(&self, available: &HashSet<String>) -> Result<&'static str, RpcError> {
        self.wire_names
            .iter()
            .copied()
            .find(|name| available.contains(*name))
            .ok_or_else(|| RpcError::MethodUnavailable {
                logical_name: self.logical_name.to_string(),
                candidates: self.wire_names.iter().map(|name| (*name).to_string()).collect(),
            })
    }

    /// True iff the daemon is new enough and exposes at least one candidate.
    pub fn is_available(&self, version: ServerVersion, available: &HashSet<String>) -> bool {
        if let Some(min_version) = self.min_version
            && version < min_version
        {
            return false;
        }

        self.wire_names.iter().any(|name| available.contains(*name))
    }

    /// Folds the pre-processing chain over the logical arguments.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If a pre-processor rejects an argument
    pub fn apply_pre_processors(&self, args: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        self.pre.iter().try_fold(args, |args, pre| pre.apply(args))
    }

    /// Folds the post-processing chain over a raw result, applying the
    /// implicit boolean coercion last for boolean descriptors.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If a post-processor rejects the result
    pub fn apply_post_processors(&self, raw: Value) -> Result<Value, RpcError> {
        let value = self
            .post
            .iter()
            .try_fold(raw, |value, post| post.apply(value))?;

        if self.is_boolean {
            Ok(Value::Bool(wire_to_bool(&value)?))
        } else {
            Ok(value)
        }
    }
}

#[cfg(test)]
mod descriptor_tests {
    use super::*;

    fn available(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn test_resolve_prefers_first_candidate() {
        let descriptor = MethodDescriptor::retriever("down_rate", &["d.down_rate", "d.get_down_rate"]);
        let methods = available(&["d.down_rate", "d.get_down_rate"]);
        assert_eq!(descriptor.resolve_wire_name(&methods).unwrap(), "d.down_rate");
    }

    #[test]
    fn test_resolve_falls_back_to_legacy_name() {
        let descriptor = MethodDescriptor::retriever("down_rate", &["d.down_rate", "d.get_down_rate"]);
        let methods = available(&["d.get_down_rate"]);
        assert_eq!(descriptor.resolve_wire_name(&methods).unwrap(), "d.get_down_rate");
    }

    #[test]
    fn test_resolve_reports_all_candidates_on_miss() {
        let descriptor = MethodDescriptor::retriever("down_rate", &["d.down_rate", "d.get_down_rate"]);
        let result = descriptor.resolve_wire_name(&available(&["d.up_rate"]));
        match result {
            Err(RpcError::MethodUnavailable { logical_name, candidates }) => {
                assert_eq!(logical_name, "down_rate");
                assert_eq!(candidates, vec!["d.down_rate", "d.get_down_rate"]);
            }
            other => panic!("expected MethodUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_availability_gated_by_min_version() {
        let descriptor = MethodDescriptor::retriever("peer_exchange", &["d.peer_exchange"])
            .with_min_version(ServerVersion(0, 9, 0));
        let methods = available(&["d.peer_exchange"]);

        assert!(descriptor.is_available(ServerVersion(0, 9, 0), &methods));
        assert!(descriptor.is_available(ServerVersion(0, 9, 8), &methods));
        assert!(!descriptor.is_available(ServerVersion(0, 8, 9), &methods));
        assert!(!descriptor.is_available(ServerVersion(0, 9, 8), &available(&["d.name"])));
    }

    #[test]
    fn test_boolean_descriptor_coerces_sentinels() {
        let descriptor = MethodDescriptor::boolean("is_active", &["d.is_active"]);
        assert_eq!(
            descriptor.apply_post_processors(Value::Int(1)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            descriptor.apply_post_processors(Value::from("0")).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_post_chain_runs_before_boolean_coercion() {
        // CheckSuccess produces a boolean, the implicit coercion accepts it.
        let descriptor = MethodDescriptor::boolean("try_start", &["d.try_start"])
            .with_post(PostProcessor::CheckSuccess);
        assert_eq!(
            descriptor.apply_post_processors(Value::Int(0)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    #[should_panic(expected = "without wire names")]
    fn test_empty_wire_names_is_a_table_bug() {
        let _ = MethodDescriptor::retriever("broken", &[]);
    }
}
