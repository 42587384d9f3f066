//! Scripted transport shared by the integration tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;

use tiller_core::{Client, RpcError, Transport, Value};

pub const INFO_HASH: &str = "1D226C20D67F8F2DDEE4FD99A880974B3F2B6F1E";

static TRACING: Once = Once::new();

/// Installs a test subscriber once so `RUST_LOG` controls test output.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Answers discovery from fixtures and everything else from a scripted
/// queue, recording the full wire traffic for assertions.
pub struct ScriptedTransport {
    methods: Vec<String>,
    version: String,
    responses: Mutex<VecDeque<Value>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedTransport {
    pub fn new(methods: &[&str], version: &str) -> Self {
        Self {
            methods: methods.iter().map(|name| (*name).to_string()).collect(),
            version: version.to_string(),
            responses: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, value: Value) {
        self.responses.lock().unwrap().push_back(value);
    }

    pub fn calls_for(&self, method: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == method)
            .count()
    }

    pub fn recorded_calls(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    /// The struct entries of the most recent `system.multicall` payload,
    /// flattened to `(methodName, params)` pairs.
    pub fn last_batch(&self) -> Vec<(String, Vec<Value>)> {
        let calls = self.recorded_calls();
        let (_, args) = calls
            .iter()
            .rev()
            .find(|(name, _)| name == "system.multicall")
            .expect("no multicall recorded");

        args[0]
            .as_array()
            .expect("multicall payload is an array")
            .iter()
            .map(|entry| {
                let members = entry.as_struct().expect("batch entry is a struct");
                let name = members["methodName"].as_str().expect("methodName").to_string();
                let params = members["params"].as_array().expect("params").to_vec();
                (name, params)
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        tracing::debug!(method, params = params.len(), "scripted transport call");
        self.log
            .lock()
            .unwrap()
            .push((method.to_string(), params.to_vec()));

        match method {
            "system.listMethods" => Ok(Value::Array(
                self.methods.iter().map(|name| Value::from(name.clone())).collect(),
            )),
            "system.client_version" => Ok(Value::from(self.version.clone())),
            _ => self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| RpcError::Protocol {
                    message: format!("no scripted response for {method}"),
                }),
        }
    }

    fn endpoint(&self) -> &str {
        "scripted://test"
    }
}

/// A client plus a handle to its scripted transport.
pub fn scripted_client(methods: &[&str], version: &str) -> (Arc<ScriptedTransport>, Client) {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::new(methods, version));
    let client = Client::with_transport(transport.clone());
    (transport, client)
}

/// Wraps plain values as one-element arrays the way `system.multicall`
/// answers successful calls.
pub fn multicall_reply(values: Vec<Value>) -> Value {
    Value::Array(values.into_iter().map(|value| Value::Array(vec![value])).collect())
}
