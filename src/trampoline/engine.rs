//! Trampoline Engine
//!
//! `TailCall::apply` performs one bounce; `trampoline` keeps bouncing until a
//! plain value comes back. Errors from `apply` leave the loop untouched.

use tracing::{debug, trace};

use super::types::{
    Args, CallContext, Completion, ConstructorViolation, TailCall, TrampolineStats,
};

impl<V, N> TailCall<V, N> {
    /// Perform this invocation once.
    ///
    /// The result is either the final value or the next tail call. Construct
    /// wrappers re-wrap a tail-calling callee for the next bounce, so `apply`
    /// itself never recurses more than one level.
    pub fn apply<C>(self, ctx: &mut C) -> Result<Completion<V, N>, C::Error>
    where
        C: CallContext<Value = V, Env = N>,
    {
        match self {
            TailCall::Call { callee, this, args } => ctx.call(callee, this, args),
            TailCall::BaseConstruct { call, object } => match call.apply(ctx)? {
                Completion::Tail(next) => Ok(Completion::Tail(next.into_base_construct(object))),
                Completion::Value(value) if ctx.is_object(&value) => Ok(Completion::Value(value)),
                Completion::Value(_) => Ok(Completion::Value(object)),
            },
            TailCall::DerivedConstruct { call, env } => match call.apply(ctx)? {
                Completion::Tail(next) => Ok(Completion::Tail(next.into_derived_construct(env))),
                Completion::Value(value) if ctx.is_object(&value) => Ok(Completion::Value(value)),
                Completion::Value(value) if ctx.is_undefined(&value) => ctx
                    .this_binding(&env)
                    .map(Completion::Value)
                    .ok_or_else(|| ConstructorViolation::ThisNotInitialized.into()),
                Completion::Value(_) => Err(ConstructorViolation::InvalidReturn.into()),
            },
        }
    }
}

/// Drive `completion` until it produces a value
pub fn trampoline<C: CallContext>(
    ctx: &mut C,
    completion: Completion<C::Value, C::Env>,
) -> Result<C::Value, C::Error> {
    let mut result = completion;
    loop {
        match result {
            Completion::Value(value) => return Ok(value),
            Completion::Tail(call) => {
                trace!(target: "generatron::trampoline", kind = call.kind(), "bounce");
                result = call.apply(ctx)?;
            }
        }
    }
}

/// `trampoline`, also counting bounces by tail call shape
pub fn trampoline_with_stats<C: CallContext>(
    ctx: &mut C,
    completion: Completion<C::Value, C::Env>,
) -> Result<(C::Value, TrampolineStats), C::Error> {
    let mut stats = TrampolineStats::default();
    let mut result = completion;
    loop {
        match result {
            Completion::Value(value) => {
                debug!(
                    target: "generatron::trampoline",
                    bounces = stats.bounces,
                    calls = stats.calls,
                    base_constructs = stats.base_constructs,
                    derived_constructs = stats.derived_constructs,
                    "trampoline finished"
                );
                return Ok((value, stats));
            }
            Completion::Tail(call) => {
                stats.record(&call);
                result = call.apply(ctx)?;
            }
        }
    }
}

/// Invoke `callee` from a call boundary and drive any tail calls it leaves
pub fn call_in_tail_position<C: CallContext>(
    ctx: &mut C,
    callee: C::Value,
    this: C::Value,
    args: Args<C::Value>,
) -> Result<C::Value, C::Error> {
    let completion = ctx.call(callee, this, args)?;
    trampoline(ctx, completion)
}
