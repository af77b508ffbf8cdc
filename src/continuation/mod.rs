//! Suspendable evaluator activations (generators and async functions)
//!
//! A continuation drives one activation through the four-operation protocol
//! `start` / `resume` / `force_return` / `throw`. The evaluator plugs in
//! through a `Handler`, which turns each step into the driver's result type,
//! plus one evaluator trait per suspension strategy:
//!
//! - `SnapshotEvaluator` + `SnapshotContinuation`: the evaluator returns a
//!   `ResumptionPoint` when it wants to suspend and is re-entered with it on
//!   the next resume. Single-threaded, never blocks.
//! - `ThreadedEvaluator` + `ThreadContinuation`: the body runs on a dedicated
//!   generator worker and blocks inside `Suspender::suspend` while suspended.
//!
//! `Coroutine` picks one of the two at construction time.
//!
//! # Protocol
//!
//! ```text
//! NotStarted --start--> Suspended --resume/force_return/throw--> Suspended
//!      |                    |
//!      +--------------------+--> Closed (return, throw, fault)
//! ```
//!
//! `start` is valid once, the other operations only while `Suspended`. Calls
//! outside those states fail with `NotStarted`, `AlreadyStarted` or `Closed`
//! without reaching the evaluator. `Handler::close` runs exactly once, on the
//! transition to `Closed`.

mod snapshot;
mod threaded;
mod types;


use std::sync::Arc;

use crate::config::{GeneratronConfig, Strategy};
use crate::resumption::{ResumeSlot, ResumptionPoint};
use crate::worker::{global_generator_factory, GeneratorThreadFactory};

pub use snapshot::SnapshotContinuation;
pub use threaded::{Suspender, ThreadContinuation};
pub use types::{Abrupt, ContinuationError, ContinuationResult, ContinuationState, Evaluation};

/// Body handed to a generator worker by a `ThreadedEvaluator`
pub type Body<V, E, F> =
    Box<dyn FnOnce(&Suspender<V, E, F>) -> Result<V, Abrupt<V, E, F>> + Send>;

/// Callbacks a continuation uses to report each step to its driver
pub trait Handler {
    /// Driver state threaded through every operation
    type Context;
    /// Values exchanged at suspend points and returned at completion
    type Value;
    /// Script-level exception
    type Exception;
    /// Internal failure that must not become script-visible
    type Fault;
    /// What `start`/`resume`/`force_return`/`throw` produce
    type Output;

    /// Release resources; called once on every terminal path
    fn close(&mut self);

    fn suspend_with(&mut self, ctx: &mut Self::Context, value: Self::Value) -> Self::Output;

    fn return_with(&mut self, ctx: &mut Self::Context, value: Self::Value) -> Self::Output;

    fn throw_with(&mut self, ctx: &mut Self::Context, exception: Self::Exception) -> Self::Output;
}

/// Evaluator that suspends by handing back a frame snapshot
pub trait SnapshotEvaluator: Handler {
    /// Run the body from the top (`None`) or from a suspend point.
    ///
    /// The resume payload has already been written into the snapshot's
    /// payload slot; it may be an ordinary value, a forced return or an
    /// exception, as embedded by `ResumeSlot`.
    #[allow(clippy::type_complexity)]
    fn evaluate(
        &mut self,
        point: Option<ResumptionPoint<Self::Value>>,
    ) -> Result<Evaluation<Self::Value>, Abrupt<Self::Value, Self::Exception, Self::Fault>>;
}

/// Evaluator whose body runs on a generator worker
pub trait ThreadedEvaluator: Handler {
    /// Produce the body; called once, from `start`
    fn evaluate(&mut self) -> Body<Self::Value, Self::Exception, Self::Fault>;
}

/// The suspend/resume protocol
pub trait Continuation<H: Handler> {
    /// Run the body until its first suspend point or completion
    fn start(&mut self, ctx: &mut H::Context) -> ContinuationResult<H::Output, H::Fault>;

    /// Resume with `value` as the result of the pending suspend expression
    fn resume(
        &mut self,
        ctx: &mut H::Context,
        value: H::Value,
    ) -> ContinuationResult<H::Output, H::Fault>;

    /// Resume with a forced return; `finally` blocks in the body still run
    fn force_return(
        &mut self,
        ctx: &mut H::Context,
        value: H::Value,
    ) -> ContinuationResult<H::Output, H::Fault>;

    /// Raise `exception` at the pending suspend point
    fn throw(
        &mut self,
        ctx: &mut H::Context,
        exception: H::Exception,
    ) -> ContinuationResult<H::Output, H::Fault>;

    fn state(&self) -> ContinuationState;

    fn is_closed(&self) -> bool {
        self.state() == ContinuationState::Closed
    }

    fn handler(&self) -> &H;

    fn handler_mut(&mut self) -> &mut H;
}

/// A continuation whose strategy was chosen at construction time
pub enum Coroutine<H: Handler> {
    Snapshot(SnapshotContinuation<H>),
    Thread(ThreadContinuation<H>),
}

impl<H> Coroutine<H>
where
    H: SnapshotEvaluator + ThreadedEvaluator,
{
    /// Build with the configured strategy; thread workers come from the
    /// global generator factory.
    pub fn new(handler: H, config: &GeneratronConfig) -> Self {
        Self::with_factory(handler, config.strategy, Arc::clone(global_generator_factory()))
    }

    pub fn with_factory(
        handler: H,
        strategy: Strategy,
        factory: Arc<GeneratorThreadFactory>,
    ) -> Self {
        match strategy {
            Strategy::Snapshot => Coroutine::Snapshot(SnapshotContinuation::new(handler)),
            Strategy::Thread => {
                Coroutine::Thread(ThreadContinuation::with_factory(handler, factory))
            }
        }
    }
}

impl<H: Handler> Coroutine<H> {
    pub fn strategy(&self) -> Strategy {
        match self {
            Coroutine::Snapshot(_) => Strategy::Snapshot,
            Coroutine::Thread(_) => Strategy::Thread,
        }
    }
}

impl<H> Continuation<H> for Coroutine<H>
where
    H: SnapshotEvaluator + ThreadedEvaluator,
    H::Value: ResumeSlot<H::Exception> + Clone + Send + 'static,
    H::Exception: Send + 'static,
    H::Fault: Send + 'static,
{
    fn start(&mut self, ctx: &mut H::Context) -> ContinuationResult<H::Output, H::Fault> {
        match self {
            Coroutine::Snapshot(c) => c.start(ctx),
            Coroutine::Thread(c) => c.start(ctx),
        }
    }

    fn resume(
        &mut self,
        ctx: &mut H::Context,
        value: H::Value,
    ) -> ContinuationResult<H::Output, H::Fault> {
        match self {
            Coroutine::Snapshot(c) => c.resume(ctx, value),
            Coroutine::Thread(c) => c.resume(ctx, value),
        }
    }

    fn force_return(
        &mut self,
        ctx: &mut H::Context,
        value: H::Value,
    ) -> ContinuationResult<H::Output, H::Fault> {
        match self {
            Coroutine::Snapshot(c) => c.force_return(ctx, value),
            Coroutine::Thread(c) => c.force_return(ctx, value),
        }
    }

    fn throw(
        &mut self,
        ctx: &mut H::Context,
        exception: H::Exception,
    ) -> ContinuationResult<H::Output, H::Fault> {
        match self {
            Coroutine::Snapshot(c) => c.throw(ctx, exception),
            Coroutine::Thread(c) => c.throw(ctx, exception),
        }
    }

    fn state(&self) -> ContinuationState {
        match self {
            Coroutine::Snapshot(c) => c.state(),
            Coroutine::Thread(c) => c.state(),
        }
    }

    fn handler(&self) -> &H {
        match self {
            Coroutine::Snapshot(c) => Continuation::handler(c),
            Coroutine::Thread(c) => Continuation::handler(c),
        }
    }

    fn handler_mut(&mut self) -> &mut H {
        match self {
            Coroutine::Snapshot(c) => Continuation::handler_mut(c),
            Coroutine::Thread(c) => Continuation::handler_mut(c),
        }
    }
}
