//! Tail-Call Trampoline
//!
//! Calls and constructs in tail position complete with a `TailCall` instead of
//! invoking their target. The outermost call boundary drives the chain with
//! `trampoline`, so arbitrarily long tail-call chains use constant host stack.
//! Construct-shaped tail calls also apply the constructor completion rules:
//! a base construct falls back to its pre-allocated object, a derived
//! construct to the `this` bound in its environment record.

mod engine;
mod types;

pub use engine::{call_in_tail_position, trampoline, trampoline_with_stats};
pub use types::{
    Args, CallContext, Completion, ConstructorViolation, TailCall, TrampolineStats, ViolationKind,
    INLINE_ARGS,
};
