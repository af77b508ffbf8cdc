//! Snapshot-based continuation.
//!
//! Suspension is emulated by re-entering the evaluator: when the body wants to
//! suspend, `evaluate` returns a `ResumptionPoint`, which this continuation
//! stores until the next resume writes the resume payload into it and hands it
//! back. Purely single-threaded; nothing here ever blocks.
//!
//! A panic inside the evaluator closes the continuation before it propagates
//! to the caller.

use tracing::{trace, warn};

use super::types::{Abrupt, ContinuationError, ContinuationResult, ContinuationState, Evaluation};
use super::{Continuation, Handler, SnapshotEvaluator};
use crate::resumption::{Resume, ResumeSlot, ResumptionPoint, ReturnValue};

/// Continuation that stores at most one live frame snapshot
pub struct SnapshotContinuation<H: Handler> {
    handler: H,
    state: ContinuationState,
    point: Option<ResumptionPoint<H::Value>>,
}

impl<H: Handler> SnapshotContinuation<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            state: ContinuationState::NotStarted,
            point: None,
        }
    }

    /// Snapshot held while suspended
    pub fn resumption_point(&self) -> Option<&ResumptionPoint<H::Value>> {
        self.point.as_ref()
    }

    /// No-op kept for calling-convention symmetry with the thread strategy.
    ///
    /// The evaluator decides where to suspend and builds the snapshot itself;
    /// it signals the suspension by returning `Evaluation::Suspended`.
    pub fn suspend(&self) {}

    pub fn into_handler(self) -> H {
        self.handler
    }

    fn terminate(&mut self, reason: &'static str) {
        trace!(target: "generatron::continuation::snapshot", reason, "closing");
        self.state = ContinuationState::Closed;
        self.point = None;
        self.handler.close();
    }
}

/// Closes the continuation if the evaluator unwinds out of `evaluate`
struct CloseOnUnwind<'a, H: Handler> {
    continuation: &'a mut SnapshotContinuation<H>,
    armed: bool,
}

impl<H: Handler> Drop for CloseOnUnwind<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            warn!(target: "generatron::continuation::snapshot", "evaluator panicked");
            self.continuation.terminate("panicked");
        }
    }
}

impl<H> SnapshotContinuation<H>
where
    H: SnapshotEvaluator,
    H::Value: ResumeSlot<H::Exception> + Clone,
{
    fn resume_with(
        &mut self,
        ctx: &mut H::Context,
        resume: Resume<H::Value, H::Exception>,
    ) -> ContinuationResult<H::Output, H::Fault> {
        match self.state {
            ContinuationState::NotStarted => return Err(ContinuationError::NotStarted),
            ContinuationState::Closed => return Err(ContinuationError::Closed),
            ContinuationState::Suspended => {}
        }

        let mut point = self.point.take().ok_or(ContinuationError::Closed)?;
        point.set_resume_value(H::Value::from_resume(resume));
        self.execute(ctx, Some(point))
    }

    fn execute(
        &mut self,
        ctx: &mut H::Context,
        point: Option<ResumptionPoint<H::Value>>,
    ) -> ContinuationResult<H::Output, H::Fault> {
        let evaluation = {
            let mut guard = CloseOnUnwind {
                continuation: &mut *self,
                armed: true,
            };
            let evaluation = SnapshotEvaluator::evaluate(&mut guard.continuation.handler, point);
            guard.armed = false;
            evaluation
        };

        match evaluation {
            Ok(Evaluation::Suspended(point)) => {
                trace!(
                    target: "generatron::continuation::snapshot",
                    offset = point.offset(),
                    frames = point.depth(),
                    "suspended"
                );
                let value = point.suspend_value().clone();
                self.point = Some(point);
                self.state = ContinuationState::Suspended;
                Ok(self.handler.suspend_with(ctx, value))
            }
            Ok(Evaluation::Returned(value)) => {
                self.terminate("returned");
                Ok(self.handler.return_with(ctx, value))
            }
            Err(Abrupt::Return(marker)) => {
                self.terminate("forced return");
                Ok(self.handler.return_with(ctx, marker.into_inner()))
            }
            Err(Abrupt::Throw(exception)) => {
                self.terminate("threw");
                Ok(self.handler.throw_with(ctx, exception))
            }
            Err(Abrupt::Fault(fault)) => {
                self.terminate("faulted");
                Err(ContinuationError::Fault(fault))
            }
            Err(Abrupt::Detached) => {
                self.terminate("detached");
                Err(ContinuationError::Disconnected)
            }
        }
    }
}

impl<H> Continuation<H> for SnapshotContinuation<H>
where
    H: SnapshotEvaluator,
    H::Value: ResumeSlot<H::Exception> + Clone,
{
    fn start(&mut self, ctx: &mut H::Context) -> ContinuationResult<H::Output, H::Fault> {
        match self.state {
            ContinuationState::NotStarted => {}
            ContinuationState::Suspended => return Err(ContinuationError::AlreadyStarted),
            ContinuationState::Closed => return Err(ContinuationError::Closed),
        }
        trace!(target: "generatron::continuation::snapshot", "start");
        self.execute(ctx, None)
    }

    fn resume(
        &mut self,
        ctx: &mut H::Context,
        value: H::Value,
    ) -> ContinuationResult<H::Output, H::Fault> {
        self.resume_with(ctx, Resume::Next(value))
    }

    fn force_return(
        &mut self,
        ctx: &mut H::Context,
        value: H::Value,
    ) -> ContinuationResult<H::Output, H::Fault> {
        self.resume_with(ctx, Resume::Return(ReturnValue::new(value)))
    }

    fn throw(
        &mut self,
        ctx: &mut H::Context,
        exception: H::Exception,
    ) -> ContinuationResult<H::Output, H::Fault> {
        self.resume_with(ctx, Resume::Throw(exception))
    }

    fn state(&self) -> ContinuationState {
        self.state
    }

    fn handler(&self) -> &H {
        &self.handler
    }

    fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
