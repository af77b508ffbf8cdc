//! A miniature script runtime implementing `CallContext`

use std::collections::HashMap;

use generatron::trampoline::{Args, CallContext, Completion, ConstructorViolation, TailCall, ViolationKind};

/// Behaviour of a callable value
#[derive(Debug, Clone, PartialEq)]
pub enum Func {
    /// `f(n) = n == 0 ? result : f(n - 1)` with the recursive call in tail position
    Countdown { result: i64 },
    /// Returns a primitive
    Const(i64),
    ReturnsUndefined,
    ReturnsObject(u32),
    /// Runs `super()` for the environment record `env`, binding `this`, then returns undefined
    BindThis { env: u32, object: u32 },
    /// Tail-calls another function with no arguments
    TailTo(Box<ScriptValue>),
    Throws(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Int(i64),
    Object(u32),
    Function(Func),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    TypeError(String),
    ReferenceError(String),
    Thrown(String),
    NotCallable,
}

impl From<ConstructorViolation> for ScriptError {
    fn from(violation: ConstructorViolation) -> Self {
        match violation.kind() {
            ViolationKind::TypeError => ScriptError::TypeError(violation.to_string()),
            ViolationKind::ReferenceError => ScriptError::ReferenceError(violation.to_string()),
        }
    }
}

/// Script state: call counter and the `this` bindings of environment records
#[derive(Debug, Default)]
pub struct Script {
    pub calls: u64,
    pub this_bindings: HashMap<u32, ScriptValue>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CallContext for Script {
    type Value = ScriptValue;
    type Env = u32;
    type Error = ScriptError;

    fn call(
        &mut self,
        callee: ScriptValue,
        _this: ScriptValue,
        args: Args<ScriptValue>,
    ) -> Result<Completion<ScriptValue, u32>, ScriptError> {
        self.calls += 1;
        let func = match callee {
            ScriptValue::Function(func) => func,
            _ => return Err(ScriptError::NotCallable),
        };

        match func {
            Func::Countdown { result } => match args.first() {
                Some(ScriptValue::Int(n)) if *n > 0 => Ok(Completion::Tail(TailCall::call(
                    ScriptValue::Function(Func::Countdown { result }),
                    ScriptValue::Undefined,
                    [ScriptValue::Int(n - 1)],
                ))),
                _ => Ok(Completion::Value(ScriptValue::Int(result))),
            },
            Func::Const(n) => Ok(Completion::Value(ScriptValue::Int(n))),
            Func::ReturnsUndefined => Ok(Completion::Value(ScriptValue::Undefined)),
            Func::ReturnsObject(id) => Ok(Completion::Value(ScriptValue::Object(id))),
            Func::BindThis { env, object } => {
                self.this_bindings.insert(env, ScriptValue::Object(object));
                Ok(Completion::Value(ScriptValue::Undefined))
            }
            Func::TailTo(target) => Ok(Completion::Tail(TailCall::call(
                *target,
                ScriptValue::Undefined,
                [],
            ))),
            Func::Throws(message) => Err(ScriptError::Thrown(message.to_string())),
        }
    }

    fn is_object(&self, value: &ScriptValue) -> bool {
        matches!(value, ScriptValue::Object(_) | ScriptValue::Function(_))
    }

    fn is_undefined(&self, value: &ScriptValue) -> bool {
        matches!(value, ScriptValue::Undefined)
    }

    fn this_binding(&self, env: &u32) -> Option<ScriptValue> {
        self.this_bindings.get(env).cloned()
    }
}
