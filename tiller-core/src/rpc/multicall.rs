//! Batched execution: N calls, one wire round trip, ordered fan-out

use std::collections::BTreeMap;

use crate::context::Context;

use super::call::Call;
use super::value::Value;
use super::RpcError;

/// Accumulates RPC calls and executes them as one `system.multicall`.
///
/// Insertion order is significant: it defines both the wire order and
/// the order results are handed back. A batch is single-use; `send`
/// consumes it, so re-execution is impossible by construction.
#[derive(Debug)]
pub struct Multicall<'a> {
    context: &'a Context,
    calls: Vec<Call>,
}

impl<'a> Multicall<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self {
            context,
            calls: Vec::new(),
        }
    }

    /// Appends a call, failing fast when the connected daemon cannot
    /// serve its descriptor (missing wire names or version too old).
    ///
    /// # Errors
    ///
    /// - `RpcError::MethodUnavailable` - If no candidate wire name resolves on this daemon
    /// - Transport errors from first-time discovery
    pub async fn add(&mut self, call: Call) -> Result<&mut Self, RpcError> {
        let methods = self.context.available_methods().await?;
        let version = self.context.server_version().await?;

        let descriptor = call.descriptor();
        if !descriptor.is_available(version, methods) {
            return Err(RpcError::MethodUnavailable {
                logical_name: descriptor.logical_name().to_string(),
                candidates: descriptor
                    .wire_names()
                    .iter()
                    .map(|name| (*name).to_string())
                    .collect(),
            });
        }

        self.calls.push(call);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Executes the accumulated calls in exactly one wire round trip.
    ///
    /// Resolves each call's wire name against the cached method list,
    /// runs pre-processing, submits the batch, and applies each call's
    /// own post-processing to the positionally matching raw result.
    /// Results are returned in the exact order calls were added.
    ///
    /// # Errors
    ///
    /// - `RpcError::Protocol` - If the response is not an array of the batched length
    /// - `RpcError::ServerFault` - If the daemon answered any call with a fault
    /// - Transport errors, which abort the whole batch
    pub async fn send(self) -> Result<Vec<Value>, RpcError> {
        let methods = self.context.available_methods().await?;

        let mut batch = Vec::with_capacity(self.calls.len());
        for call in &self.calls {
            let wire_name = call.descriptor().resolve_wire_name(methods)?;
            let wire_args = call.pre_process()?;

            let mut entry = BTreeMap::new();
            entry.insert("methodName".to_string(), Value::from(wire_name));
            entry.insert("params".to_string(), Value::Array(wire_args));
            batch.push(Value::Struct(entry));
        }

        tracing::debug!(
            endpoint = self.context.transport().endpoint(),
            calls = self.calls.len(),
            "dispatching multicall batch"
        );

        let raw = self
            .context
            .transport()
            .call("system.multicall", &[Value::Array(batch)])
            .await?;

        let rows = raw.into_array().ok_or_else(|| RpcError::Protocol {
            message: "multicall response is not an array".to_string(),
        })?;

        if rows.len() != self.calls.len() {
            return Err(RpcError::Protocol {
                message: format!(
                    "multicall response carried {} results for {} calls",
                    rows.len(),
                    self.calls.len()
                ),
            });
        }

        // Results correspond to calls strictly by position.
        self.calls
            .iter()
            .zip(rows)
            .map(|(call, row)| call.post_process(unwrap_multicall_result(row)?))
            .collect()
    }
}

/// Unwraps one `system.multicall` result slot.
///
/// Per the multicall convention each successful call is answered with a
/// one-element array; an application-level fault is answered with a
/// struct carrying `faultCode` and `faultString`.
fn unwrap_multicall_result(row: Value) -> Result<Value, RpcError> {
    match row {
        Value::Array(mut values) if values.len() == 1 => Ok(values.remove(0)),
        Value::Struct(members) => {
            let code = members
                .get("faultCode")
                .and_then(Value::as_i64)
                .unwrap_or(-1);
            let message = members
                .get("faultString")
                .and_then(|value| value.as_str())
                .unwrap_or("unknown daemon fault")
                .to_string();
            Err(RpcError::ServerFault { code, message })
        }
        other => Err(RpcError::Protocol {
            message: format!("malformed multicall result slot: {} value", other.type_name()),
        }),
    }
}

#[cfg(test)]
mod multicall_tests {
    use std::sync::{Arc, LazyLock};

    use super::super::descriptor::MethodDescriptor;
    use super::super::processors::PostProcessor;
    use super::super::test_stub::StubTransport;
    use super::*;

    const PRIORITIES: &[&str] = &["off", "low", "normal", "high"];
    const STATES: &[&str] = &["stopped", "started"];

    static GET_PRIORITY: LazyLock<MethodDescriptor> = LazyLock::new(|| {
        MethodDescriptor::retriever("priority", &["d.priority", "d.get_priority"])
            .with_post(PostProcessor::IndexToEnum { values: PRIORITIES })
    });

    static GET_STATE: LazyLock<MethodDescriptor> = LazyLock::new(|| {
        MethodDescriptor::retriever("state", &["d.state"])
            .with_post(PostProcessor::IndexToEnum { values: STATES })
    });

    static IS_ACTIVE: LazyLock<MethodDescriptor> =
        LazyLock::new(|| MethodDescriptor::boolean("is_active", &["d.is_active"]));

    fn wrap(values: Vec<Value>) -> Value {
        Value::Array(values.into_iter().map(|value| Value::Array(vec![value])).collect())
    }

    fn stub() -> Arc<StubTransport> {
        Arc::new(StubTransport::new(
            &["d.priority", "d.state", "d.is_active"],
            "0.9.8",
        ))
    }

    #[tokio::test]
    async fn test_results_fan_out_positionally() {
        let stub = stub();
        stub.push_response(wrap(vec![Value::Int(3), Value::Int(1), Value::Int(0)]));
        let context = Context::new(stub);

        // Distinguishable post-processors: a swap would surface as the
        // wrong enum table being applied.
        let mut batch = Multicall::new(&context);
        batch.add(Call::new(&GET_PRIORITY, vec![])).await.unwrap();
        batch.add(Call::new(&GET_STATE, vec![])).await.unwrap();
        batch.add(Call::new(&IS_ACTIVE, vec![])).await.unwrap();

        let results = batch.send().await.unwrap();
        assert_eq!(
            results,
            vec![Value::from("high"), Value::from("started"), Value::Bool(false)]
        );
    }

    #[tokio::test]
    async fn test_length_mismatch_is_protocol_error() {
        for response_len in [1usize, 3] {
            let stub = stub();
            stub.push_response(wrap(vec![Value::Int(0); response_len]));
            let context = Context::new(stub);

            let mut batch = Multicall::new(&context);
            batch.add(Call::new(&GET_PRIORITY, vec![])).await.unwrap();
            batch.add(Call::new(&GET_STATE, vec![])).await.unwrap();

            let result = batch.send().await;
            assert!(matches!(result, Err(RpcError::Protocol { .. })));
        }
    }

    #[tokio::test]
    async fn test_add_fails_fast_without_transport_work() {
        static MISSING: LazyLock<MethodDescriptor> =
            LazyLock::new(|| MethodDescriptor::retriever("hashing", &["d.hashing"]));

        let stub = stub();
        let context = Context::new(stub.clone());

        let mut batch = Multicall::new(&context);
        let result = batch.add(Call::new(&MISSING, vec![])).await;
        assert!(matches!(result, Err(RpcError::MethodUnavailable { .. })));
        // Only discovery traffic; the batch itself never went out.
        assert_eq!(stub.calls_for("system.multicall"), 0);
    }

    #[tokio::test]
    async fn test_fault_slot_surfaces_as_server_fault() {
        let stub = stub();
        let mut fault = BTreeMap::new();
        fault.insert("faultCode".to_string(), Value::Int(-501));
        fault.insert("faultString".to_string(), Value::from("Could not find info-hash."));
        stub.push_response(Value::Array(vec![Value::Struct(fault)]));
        let context = Context::new(stub);

        let mut batch = Multicall::new(&context);
        batch.add(Call::new(&GET_PRIORITY, vec![])).await.unwrap();

        let result = batch.send().await;
        assert!(matches!(
            result,
            Err(RpcError::ServerFault { code: -501, .. })
        ));
    }
}
