//! Per-entity-kind registries of method descriptors

use std::collections::HashMap;
use std::fmt;

use super::descriptor::MethodDescriptor;
use super::RpcError;

/// The entity kinds the daemon scopes its RPC surface by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Session,
    Torrent,
    Tracker,
    File,
    Peer,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Session => "session",
            EntityKind::Torrent => "torrent",
            EntityKind::Tracker => "tracker",
            EntityKind::File => "file",
            EntityKind::Peer => "peer",
        };
        write!(f, "{name}")
    }
}

/// Read-only table of method descriptors for one entity kind.
///
/// Built once at first use and immutable afterwards; insertion order is
/// irrelevant, logical names are unique within a kind.
#[derive(Debug)]
pub struct Registry {
    kind: EntityKind,
    methods: HashMap<&'static str, MethodDescriptor>,
}

impl Registry {
    pub fn builder(kind: EntityKind) -> RegistryBuilder {
        RegistryBuilder {
            kind,
            methods: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Looks up a descriptor by logical name.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnknownMethod` - If the name was never registered for this kind
    pub fn get(&self, logical_name: &str) -> Result<&MethodDescriptor, RpcError> {
        self.methods
            .get(logical_name)
            .ok_or_else(|| RpcError::UnknownMethod {
                kind: self.kind,
                logical_name: logical_name.to_string(),
            })
    }

    pub fn contains(&self, logical_name: &str) -> bool {
        self.methods.contains_key(logical_name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Iterates over every registered descriptor (arbitrary order).
    pub fn descriptors(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }

    /// Iterates over the retriever descriptors (arbitrary order).
    pub fn retrievers(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values().filter(|method| method.is_retriever())
    }
}

/// Builds a [`Registry`] at table-construction time.
///
/// Duplicate logical names indicate a registration-table bug, never a
/// runtime condition, so the infallible [`register`](Self::register)
/// panics with the underlying error.
#[derive(Debug)]
pub struct RegistryBuilder {
    kind: EntityKind,
    methods: HashMap<&'static str, MethodDescriptor>,
}

impl RegistryBuilder {
    /// Adds a descriptor, failing on duplicate logical names.
    ///
    /// # Errors
    ///
    /// - `RpcError::DuplicateRegistration` - If the logical name is already registered
    pub fn try_register(&mut self, descriptor: MethodDescriptor) -> Result<(), RpcError> {
        let logical_name = descriptor.logical_name();
        if self.methods.contains_key(logical_name) {
            return Err(RpcError::DuplicateRegistration {
                kind: self.kind,
                logical_name,
            });
        }

        self.methods.insert(logical_name, descriptor);
        Ok(())
    }

    /// Adds a descriptor to a static table, panicking on duplicates.
    #[must_use]
    pub fn register(mut self, descriptor: MethodDescriptor) -> Self {
        if let Err(error) = self.try_register(descriptor) {
            panic!("{error}");
        }
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            kind: self.kind,
            methods: self.methods,
        }
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[test]
    fn test_lookup_round_trip() {
        let registry = Registry::builder(EntityKind::Torrent)
            .register(MethodDescriptor::retriever("name", &["d.name", "d.get_name"]))
            .register(MethodDescriptor::boolean("is_active", &["d.is_active"]))
            .build();

        assert_eq!(registry.kind(), EntityKind::Torrent);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("name").unwrap().logical_name(), "name");
        assert!(registry.contains("is_active"));
    }

    #[test]
    fn test_unknown_method_is_typed_error() {
        let registry = Registry::builder(EntityKind::Peer).build();
        let result = registry.get("down_rate");
        assert!(matches!(
            result,
            Err(RpcError::UnknownMethod { kind: EntityKind::Peer, logical_name }) if logical_name == "down_rate"
        ));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut builder = Registry::builder(EntityKind::File);
        builder
            .try_register(MethodDescriptor::retriever("path", &["f.path"]))
            .unwrap();

        let result = builder.try_register(MethodDescriptor::retriever("path", &["f.get_path"]));
        assert!(matches!(
            result,
            Err(RpcError::DuplicateRegistration { kind: EntityKind::File, logical_name: "path" })
        ));
    }

    #[test]
    fn test_retrievers_excludes_modifiers() {
        let registry = Registry::builder(EntityKind::Tracker)
            .register(MethodDescriptor::retriever("url", &["t.url", "t.get_url"]))
            .register(MethodDescriptor::modifier("set_enabled", &["t.is_enabled.set"]))
            .build();

        let retrievers: Vec<_> = registry.retrievers().map(MethodDescriptor::logical_name).collect();
        assert_eq!(retrievers, vec!["url"]);
    }
}
