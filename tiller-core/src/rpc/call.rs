//! A single bound invocation of a method descriptor

use super::descriptor::MethodDescriptor;
use super::value::Value;
use super::RpcError;

/// One descriptor bound to concrete arguments for one execution cycle.
///
/// Calls are constructed fresh per invocation and never reused across
/// connections: wire-name resolution depends on the connected daemon's
/// discovered method list.
#[derive(Debug, Clone)]
pub struct Call {
    descriptor: &'static MethodDescriptor,
    args: Vec<Value>,
    identity_len: usize,
}

impl Call {
    /// Binds a descriptor to caller-supplied arguments (no entity identity).
    pub fn new(descriptor: &'static MethodDescriptor, args: Vec<Value>) -> Self {
        Self {
            descriptor,
            args,
            identity_len: 0,
        }
    }

    /// Binds a descriptor with entity identity arguments prepended ahead
    /// of the user arguments.
    ///
    /// The injection point is what lets one descriptor serve both an
    /// unbound session-level call and a per-entity call.
    pub fn with_identity(
        descriptor: &'static MethodDescriptor,
        identity: Vec<Value>,
        user_args: Vec<Value>,
    ) -> Self {
        let identity_len = identity.len();
        let mut args = identity;
        args.extend(user_args);

        Self {
            descriptor,
            args,
            identity_len,
        }
    }

    pub fn descriptor(&self) -> &'static MethodDescriptor {
        self.descriptor
    }

    /// Logical arguments as supplied, identity included, before pre-processing.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Runs the pre-processing chain to produce final wire arguments.
    ///
    /// Idempotent: pre-processors are pure functions of the stored
    /// logical arguments and never mutate the call.
    ///
    /// # Errors
    ///
    /// - `RpcError::MissingArgument` - If a modifier has no value argument beyond its identity
    /// - `RpcError::UnexpectedValue` - If a pre-processor rejects an argument
    pub fn pre_process(&self) -> Result<Vec<Value>, RpcError> {
        if self.descriptor.is_modifier() && self.args.len() <= self.identity_len {
            return Err(RpcError::MissingArgument {
                logical_name: self.descriptor.logical_name().to_string(),
            });
        }

        self.descriptor.apply_pre_processors(self.args.clone())
    }

    /// Runs the post-processing chain over a raw wire result.
    ///
    /// Pure function of `raw`; does not consult prior call state.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If a post-processor rejects the result
    pub fn post_process(&self, raw: Value) -> Result<Value, RpcError> {
        self.descriptor.apply_post_processors(raw)
    }
}

#[cfg(test)]
mod call_tests {
    use std::sync::LazyLock;

    use super::super::processors::{PostProcessor, PreProcessor};
    use super::*;

    const PRIORITIES: &[&str] = &["off", "low", "normal", "high"];
    const INFO_HASH: &str = "1D226C20D67F8F2DDEE4FD99A880974B3F2B6F1E";

    static SET_PRIORITY: LazyLock<MethodDescriptor> = LazyLock::new(|| {
        MethodDescriptor::modifier("set_priority", &["d.priority.set", "d.set_priority"]).with_pre(
            PreProcessor::EnumToIndex {
                values: PRIORITIES,
                slot_from_end: 0,
            },
        )
    });

    static GET_PRIORITY: LazyLock<MethodDescriptor> = LazyLock::new(|| {
        MethodDescriptor::retriever("priority", &["d.priority", "d.get_priority"])
            .with_post(PostProcessor::IndexToEnum { values: PRIORITIES })
    });

    #[test]
    fn test_identity_injection_precedes_user_args() {
        let call = Call::with_identity(
            &SET_PRIORITY,
            vec![Value::from(INFO_HASH)],
            vec![Value::from("off")],
        );

        let wire_args = call.pre_process().unwrap();
        assert_eq!(wire_args, vec![Value::from(INFO_HASH), Value::Int(0)]);
    }

    #[test]
    fn test_pre_processing_is_idempotent() {
        let call = Call::with_identity(
            &SET_PRIORITY,
            vec![Value::from(INFO_HASH)],
            vec![Value::from("high")],
        );

        let first = call.pre_process().unwrap();
        let second = call.pre_process().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![Value::from(INFO_HASH), Value::Int(3)]);
    }

    #[test]
    fn test_modifier_without_value_argument() {
        let call = Call::with_identity(&SET_PRIORITY, vec![Value::from(INFO_HASH)], vec![]);
        let result = call.pre_process();
        assert!(matches!(
            result,
            Err(RpcError::MissingArgument { logical_name }) if logical_name == "set_priority"
        ));
    }

    #[test]
    fn test_retriever_post_processing_maps_enum() {
        let call = Call::with_identity(&GET_PRIORITY, vec![Value::from(INFO_HASH)], vec![]);
        assert_eq!(call.pre_process().unwrap(), vec![Value::from(INFO_HASH)]);
        assert_eq!(call.post_process(Value::Int(2)).unwrap(), Value::from("normal"));
    }
}
