//! Field-listing multicalls: one row of metadata per matching entity

use std::collections::HashMap;

use crate::context::Context;

use super::descriptor::MethodDescriptor;
use super::registry::Registry;
use super::value::Value;
use super::RpcError;

/// Accumulates retriever field names to fetch for every entity matched
/// by a selector (a view name, or a parent entity's id for sub-entity
/// listings), then issues one `X.multicall` round trip.
///
/// Single-use: `send` consumes the builder, so a second execution is
/// impossible rather than undefined.
#[derive(Debug)]
pub struct FieldMulticall<'a> {
    context: &'a Context,
    registry: &'static Registry,
    selector: Value,
    fields: Vec<&'static MethodDescriptor>,
}

impl<'a> FieldMulticall<'a> {
    pub fn new(context: &'a Context, registry: &'static Registry, selector: impl Into<Value>) -> Self {
        Self {
            context,
            registry,
            selector: selector.into(),
            fields: Vec::new(),
        }
    }

    /// Adds one retriever field to fetch per entity.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnknownMethod` - If the name is not registered for this kind
    /// - `RpcError::UnexpectedValue` - If the name resolves to a modifier
    pub fn field(&mut self, logical_name: &str) -> Result<&mut Self, RpcError> {
        let descriptor = self.registry.get(logical_name)?;
        if !descriptor.is_retriever() {
            return Err(RpcError::UnexpectedValue {
                message: format!(
                    "'{}' is a modifier and cannot be listed as a field",
                    descriptor.logical_name()
                ),
            });
        }

        // Registries live in per-kind statics, so the borrow is 'static.
        let descriptor: &'static MethodDescriptor = descriptor;
        self.fields.push(descriptor);
        Ok(self)
    }

    /// Adds every retriever the registry knows, in name order.
    ///
    /// Name order keeps the wire request deterministic even though the
    /// registry map itself is unordered.
    pub fn all_fields(&mut self) -> &mut Self {
        // The kind's own "multicall" entry is the carrier, not a field.
        let mut retrievers: Vec<_> = self
            .registry
            .retrievers()
            .filter(|descriptor| descriptor.logical_name() != "multicall")
            .collect();
        retrievers.sort_by_key(|descriptor| descriptor.logical_name());
        self.fields.extend(retrievers);
        self
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|descriptor| descriptor.logical_name()).collect()
    }

    /// Executes the listing in one round trip and slices the nested
    /// response into one metadata row per entity, applying each field's
    /// own post-processing chain independently.
    ///
    /// The second wire argument is an opaque required placeholder of the
    /// listing convention and must stay empty.
    ///
    /// # Errors
    ///
    /// - `RpcError::MethodUnavailable` - If the kind's multicall or a field cannot resolve
    /// - `RpcError::Protocol` - If the response rows are missing or mis-shaped
    pub async fn send(self) -> Result<Vec<EntityMetadata>, RpcError> {
        let methods = self.context.available_methods().await?;
        let multicall = self.registry.get("multicall")?;
        let wire_name = multicall.resolve_wire_name(methods)?;

        let mut args = Vec::with_capacity(self.fields.len() + 2);
        args.push(self.selector.clone());
        args.push(Value::from(""));
        for field in &self.fields {
            let field_name = field.resolve_wire_name(methods)?;
            args.push(Value::String(format!("{field_name}=")));
        }

        tracing::debug!(
            endpoint = self.context.transport().endpoint(),
            kind = %self.registry.kind(),
            fields = self.fields.len(),
            "dispatching field listing"
        );

        let raw = self.context.transport().call(wire_name, &args).await?;
        let rows = raw.into_array().ok_or_else(|| RpcError::Protocol {
            message: "field listing response is not an array".to_string(),
        })?;

        rows.into_iter().map(|row| self.slice_row(row)).collect()
    }

    fn slice_row(&self, row: Value) -> Result<EntityMetadata, RpcError> {
        let cells = row.into_array().ok_or_else(|| RpcError::Protocol {
            message: "field listing row is not an array".to_string(),
        })?;

        if cells.len() != self.fields.len() {
            return Err(RpcError::Protocol {
                message: format!(
                    "field listing row carried {} cells for {} fields",
                    cells.len(),
                    self.fields.len()
                ),
            });
        }

        let mut values = HashMap::with_capacity(cells.len());
        for (field, cell) in self.fields.iter().zip(cells) {
            values.insert(field.logical_name(), field.apply_post_processors(cell)?);
        }

        Ok(EntityMetadata { values })
    }
}

/// One entity's slice of a field-listing response, keyed by logical
/// field name, with post-processing already applied.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    values: HashMap<&'static str, Value>,
}

impl EntityMetadata {
    pub fn get(&self, logical_name: &str) -> Option<&Value> {
        self.values.get(logical_name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> HashMap<&'static str, Value> {
        self.values
    }
}

#[cfg(test)]
mod metadata_tests {
    use std::sync::{Arc, LazyLock};

    use super::super::descriptor::MethodDescriptor;
    use super::super::processors::PostProcessor;
    use super::super::registry::{EntityKind, Registry};
    use super::super::test_stub::StubTransport;
    use super::*;

    const FILE_PRIORITIES: &[&str] = &["off", "normal", "high"];

    static FILE_METHODS: LazyLock<Registry> = LazyLock::new(|| {
        Registry::builder(EntityKind::File)
            .register(MethodDescriptor::retriever("multicall", &["f.multicall"]))
            .register(MethodDescriptor::retriever("path", &["f.path", "f.get_path"]))
            .register(
                MethodDescriptor::retriever("priority", &["f.priority", "f.get_priority"])
                    .with_post(PostProcessor::IndexToEnum { values: FILE_PRIORITIES }),
            )
            .register(MethodDescriptor::modifier("set_priority", &["f.priority.set"]))
            .build()
    });

    fn stub() -> Arc<StubTransport> {
        Arc::new(StubTransport::new(
            &["f.multicall", "f.path", "f.priority", "f.priority.set"],
            "0.9.8",
        ))
    }

    #[tokio::test]
    async fn test_listing_slices_rows_and_post_processes_fields() {
        let stub = stub();
        stub.push_response(Value::Array(vec![
            Value::Array(vec![Value::from("a.mkv"), Value::Int(2)]),
            Value::Array(vec![Value::from("b.nfo"), Value::Int(0)]),
        ]));
        let context = Context::new(stub.clone());

        let mut listing = FieldMulticall::new(&context, &FILE_METHODS, "HASH");
        listing.field("path").unwrap().field("priority").unwrap();
        let rows = listing.send().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("path"), Some(&Value::from("a.mkv")));
        assert_eq!(rows[0].get("priority"), Some(&Value::from("high")));
        assert_eq!(rows[1].get("priority"), Some(&Value::from("off")));

        // Wire shape: selector, opaque empty placeholder, then field= tokens.
        let calls = stub.recorded_calls();
        let (method, args) = calls.last().unwrap();
        assert_eq!(method, "f.multicall");
        assert_eq!(
            args,
            &vec![
                Value::from("HASH"),
                Value::from(""),
                Value::from("f.path="),
                Value::from("f.priority="),
            ]
        );
    }

    #[tokio::test]
    async fn test_row_arity_mismatch_is_protocol_error() {
        let stub = stub();
        stub.push_response(Value::Array(vec![Value::Array(vec![Value::from("a.mkv")])]));
        let context = Context::new(stub);

        let mut listing = FieldMulticall::new(&context, &FILE_METHODS, "HASH");
        listing.field("path").unwrap().field("priority").unwrap();

        let result = listing.send().await;
        assert!(matches!(result, Err(RpcError::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_modifier_field_is_rejected() {
        let stub = stub();
        let context = Context::new(stub);

        let mut listing = FieldMulticall::new(&context, &FILE_METHODS, "HASH");
        let result = listing.field("set_priority");
        assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
    }
}
