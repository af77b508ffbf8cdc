//! Generatron - Generator Suspension and Tail-Call Core
//!
//! This library provides the runtime pieces an evaluator needs to suspend and
//! resume generator and async-function activations, plus the trampoline that
//! runs tail calls in constant host stack.
//!
//! # Architecture
//!
//! 1. **Frame Snapshots** (`resumption` module)
//!    - `ResumptionPoint`: operand stack, locals and resume offset of a frame
//!    - Parent chains for nested delegation; the payload lives in the innermost node
//!
//! 2. **Continuations** (`continuation` module)
//!    - One protocol (`start` / `resume` / `force_return` / `throw`), two strategies
//!    - `SnapshotContinuation`: re-enters the evaluator with a stored snapshot
//!    - `ThreadContinuation`: runs the body on a dedicated generator worker
//!    - `Coroutine`: strategy chosen at construction time from `GeneratronConfig`
//!
//! 3. **Generator Workers** (`worker` module)
//!    - Depth-checked worker factory (`MAX_GENERATOR_DEPTH`)
//!    - Zero-capacity rendezvous handoff that absorbs interrupts
//!
//! 4. **Trampoline** (`trampoline` module)
//!    - `TailCall`: call, base construct, derived construct
//!    - `trampoline`: iterative driver with constructor completion rules
//!
//! # Example
//!
//! ```rust
//! use generatron::trampoline::{trampoline, Args, CallContext, Completion, ConstructorViolation, TailCall};
//!
//! struct Countdown;
//!
//! #[derive(Debug)]
//! struct Error(ConstructorViolation);
//!
//! impl From<ConstructorViolation> for Error {
//!     fn from(v: ConstructorViolation) -> Self {
//!         Error(v)
//!     }
//! }
//!
//! impl CallContext for Countdown {
//!     type Value = i64;
//!     type Env = ();
//!     type Error = Error;
//!
//!     fn call(&mut self, callee: i64, _this: i64, _args: Args<i64>) -> Result<Completion<i64, ()>, Error> {
//!         if callee == 0 {
//!             Ok(Completion::Value(42))
//!         } else {
//!             Ok(Completion::Tail(TailCall::call(callee - 1, 0, [])))
//!         }
//!     }
//!
//!     fn is_object(&self, _value: &i64) -> bool { false }
//!     fn is_undefined(&self, _value: &i64) -> bool { false }
//!     fn this_binding(&self, _env: &()) -> Option<i64> { None }
//! }
//!
//! let start = Completion::Tail(TailCall::call(1_000_000, 0, []));
//! assert_eq!(trampoline(&mut Countdown, start).unwrap(), 42);
//! ```

pub mod config;
pub mod continuation;
pub mod resumption;
pub mod trampoline;
pub mod worker;

pub use config::{ConfigError, GeneratronConfig, Strategy};
pub use continuation::{
    Abrupt, Body, Continuation, ContinuationError, ContinuationResult, ContinuationState,
    Coroutine, Evaluation, Handler, SnapshotContinuation, SnapshotEvaluator, Suspender,
    ThreadContinuation, ThreadedEvaluator,
};
pub use resumption::{Resume, ResumeSlot, ResumptionError, ResumptionPoint, ReturnValue};
pub use trampoline::{
    call_in_tail_position, trampoline, trampoline_with_stats, CallContext, Completion,
    ConstructorViolation, TailCall, TrampolineStats, ViolationKind,
};
pub use worker::{
    GeneratorInfo, GeneratorThread, GeneratorThreadFactory, Interruptor, WorkerError,
    MAX_GENERATOR_DEPTH,
};
