//! Scripted in-memory transport for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::transport::Transport;
use super::value::Value;
use super::RpcError;

/// Transport stub answering discovery calls from fixtures and all other
/// calls from a scripted response queue, recording everything it sees.
pub(crate) struct StubTransport {
    methods: Vec<String>,
    version: String,
    method_list_override: Option<Value>,
    responses: Mutex<VecDeque<Value>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl StubTransport {
    pub(crate) fn new(methods: &[&str], version: &str) -> Self {
        Self {
            methods: methods.iter().map(|name| (*name).to_string()).collect(),
            version: version.to_string(),
            method_list_override: None,
            responses: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Makes `system.listMethods` return an arbitrary value instead of
    /// the fixture list.
    pub(crate) fn with_method_list_override(mut self, value: Value) -> Self {
        self.method_list_override = Some(value);
        self
    }

    /// Queues the reply for the next non-discovery call.
    pub(crate) fn push_response(&self, value: Value) {
        self.responses.lock().unwrap().push_back(value);
    }

    pub(crate) fn calls_for(&self, method: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == method)
            .count()
    }

    pub(crate) fn recorded_calls(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        self.log
            .lock()
            .unwrap()
            .push((method.to_string(), params.to_vec()));

        match method {
            "system.listMethods" => {
                if let Some(value) = &self.method_list_override {
                    return Ok(value.clone());
                }
                Ok(Value::Array(
                    self.methods.iter().map(|name| Value::from(name.clone())).collect(),
                ))
            }
            "system.client_version" => Ok(Value::from(self.version.clone())),
            _ => self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| RpcError::Protocol {
                    message: format!("stub has no scripted response for {method}"),
                }),
        }
    }

    fn endpoint(&self) -> &str {
        "stub://test"
    }
}
