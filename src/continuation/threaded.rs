//! Thread-based continuation.
//!
//! Stackful emulation: the body runs on its own generator worker and simply
//! blocks while suspended. Caller and worker meet through two zero-capacity
//! rendezvous channels, so exactly one side is runnable at any moment:
//!
//! ```text
//!   caller                          worker
//!   start ──spawn──────────────────▶ body(&suspender)
//!   take(out) ◀──── Yield(v) ────── suspend(v)
//!   resume(x) ───── Next(x) ──────▶ take(in) returns x
//!   take(out) ◀──── Completed ───── body returned (guard posts sentinel)
//!   join worker, report outcome
//! ```
//!
//! The worker is created once, at `start`, and serves the continuation for its
//! whole lifetime.

use tracing::{debug, trace, warn};

use std::marker::PhantomData;
use std::sync::Arc;

use super::types::{
    panic_message, Abrupt, ContinuationError, ContinuationResult, ContinuationState,
};
use super::{Continuation, Handler, ThreadedEvaluator};
use crate::resumption::{Resume, ReturnValue};
use crate::worker::rendezvous::{self, Disconnected, RendezvousReceiver, RendezvousSender};
use crate::worker::{
    global_generator_factory, GeneratorInfo, GeneratorThread, GeneratorThreadFactory,
};

/// Worker-to-caller message
#[derive(Debug)]
enum Handoff<V> {
    /// The body suspended with this value
    Yield(V),
    /// The body finished; its outcome is the worker's join result
    Completed,
}

/// How the body finished, as seen by the worker task
#[derive(Debug)]
enum Outcome<V, E, F> {
    Returned(V),
    Threw(E),
    Fault(F),
    Detached,
}

/// Suspend point handle passed to a `ThreadedEvaluator` body.
///
/// `F` is the body's fault type, so `suspend(..)?` needs no annotations.
pub struct Suspender<V, E, F> {
    to_caller: RendezvousSender<Handoff<V>>,
    from_caller: RendezvousReceiver<Resume<V, E>>,
    fault: PhantomData<fn() -> F>,
}

impl<V, E, F> Suspender<V, E, F> {
    /// Suspend the body with `value` and block until the caller resumes it.
    ///
    /// Returns the resumed value, or an `Abrupt` for the body to propagate
    /// with `?`: a delivered exception, a forced return, or `Detached` when
    /// the continuation was dropped.
    pub fn suspend(&self, value: V) -> Result<V, Abrupt<V, E, F>> {
        if self.to_caller.put(Handoff::Yield(value)).is_err() {
            return Err(Abrupt::Detached);
        }
        match self.from_caller.take() {
            Ok(Resume::Next(value)) => Ok(value),
            Ok(Resume::Return(marker)) => Err(Abrupt::Return(marker)),
            Ok(Resume::Throw(exception)) => Err(Abrupt::Throw(exception)),
            Err(Disconnected) => Err(Abrupt::Detached),
        }
    }
}

/// Posts `Completed` when the worker task ends, including by panic
struct CompletionSignal<'a, V>(&'a RendezvousSender<Handoff<V>>);

impl<V> Drop for CompletionSignal<'_, V> {
    fn drop(&mut self) {
        // The caller may already be gone
        let _ = self.0.put(Handoff::Completed);
    }
}

struct CallerChannels<V, E> {
    to_worker: RendezvousSender<Resume<V, E>>,
    from_worker: RendezvousReceiver<Handoff<V>>,
}

type Worker<H> = GeneratorThread<
    Outcome<<H as Handler>::Value, <H as Handler>::Exception, <H as Handler>::Fault>,
>;

/// Continuation whose body runs on a dedicated generator worker
pub struct ThreadContinuation<H: Handler> {
    handler: H,
    factory: Arc<GeneratorThreadFactory>,
    state: ContinuationState,
    channels: Option<CallerChannels<H::Value, H::Exception>>,
    worker: Option<Worker<H>>,
}

impl<H: Handler> ThreadContinuation<H> {
    /// Workers come from the global generator factory
    pub fn new(handler: H) -> Self {
        Self::with_factory(handler, Arc::clone(global_generator_factory()))
    }

    pub fn with_factory(handler: H, factory: Arc<GeneratorThreadFactory>) -> Self {
        Self {
            handler,
            factory,
            state: ContinuationState::NotStarted,
            channels: None,
            worker: None,
        }
    }

    /// Info of the worker serving this continuation, once started and until closed
    pub fn worker_info(&self) -> Option<&GeneratorInfo> {
        self.worker.as_ref().map(GeneratorThread::info)
    }
}

impl<H> ThreadContinuation<H>
where
    H: ThreadedEvaluator,
    H::Value: Send + 'static,
    H::Exception: Send + 'static,
    H::Fault: Send + 'static,
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

        let channels = self.channels.as_ref().ok_or(ContinuationError::Closed)?;
        if channels.to_worker.put(resume).is_err() {
            return self.finish(ctx);
        }
        self.execute(ctx)
    }

    /// Block until the worker suspends again or completes
    fn execute(&mut self, ctx: &mut H::Context) -> ContinuationResult<H::Output, H::Fault> {
        let handoff = match self.channels.as_ref() {
            Some(channels) => channels.from_worker.take(),
            None => return Err(ContinuationError::Closed),
        };

        match handoff {
            Ok(Handoff::Yield(value)) => {
                trace!(target: "generatron::continuation::thread", "suspended");
                self.state = ContinuationState::Suspended;
                Ok(self.handler.suspend_with(ctx, value))
            }
            Ok(Handoff::Completed) | Err(Disconnected) => self.finish(ctx),
        }
    }

    fn finish(&mut self, ctx: &mut H::Context) -> ContinuationResult<H::Output, H::Fault> {
        self.state = ContinuationState::Closed;
        self.channels = None;
        self.handler.close();

        let worker = self.worker.take().ok_or(ContinuationError::Disconnected)?;
        let name = worker.info().name().to_string();
        match worker.join() {
            Ok(Outcome::Returned(value)) => {
                trace!(target: "generatron::continuation::thread", worker = %name, "returned");
                Ok(self.handler.return_with(ctx, value))
            }
            Ok(Outcome::Threw(exception)) => {
                trace!(target: "generatron::continuation::thread", worker = %name, "threw");
                Ok(self.handler.throw_with(ctx, exception))
            }
            Ok(Outcome::Fault(fault)) => {
                debug!(target: "generatron::continuation::thread", worker = %name, "faulted");
                Err(ContinuationError::Fault(fault))
            }
            Ok(Outcome::Detached) => Err(ContinuationError::Disconnected),
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!(target: "generatron::continuation::thread", worker = %name, %message, "generator worker panicked");
                Err(ContinuationError::WorkerPanicked(message))
            }
        }
    }
}

fn run_body<V, E, F>(
    body: super::Body<V, E, F>,
    to_caller: RendezvousSender<Handoff<V>>,
    from_caller: RendezvousReceiver<Resume<V, E>>,
) -> Outcome<V, E, F> {
    let suspender = Suspender {
        to_caller,
        from_caller,
        fault: PhantomData,
    };
    let signal = CompletionSignal(&suspender.to_caller);
    let outcome = match body(&suspender) {
        Ok(value) => Outcome::Returned(value),
        Err(Abrupt::Return(marker)) => Outcome::Returned(ReturnValue::into_inner(marker)),
        Err(Abrupt::Throw(exception)) => Outcome::Threw(exception),
        Err(Abrupt::Fault(fault)) => Outcome::Fault(fault),
        Err(Abrupt::Detached) => Outcome::Detached,
    };
    drop(signal);
    outcome
}

impl<H> Continuation<H> for ThreadContinuation<H>
where
    H: ThreadedEvaluator,
    H::Value: Send + 'static,
    H::Exception: Send + 'static,
    H::Fault: Send + 'static,
{
    fn start(&mut self, ctx: &mut H::Context) -> ContinuationResult<H::Output, H::Fault> {
        match self.state {
            ContinuationState::NotStarted => {}
            ContinuationState::Suspended => return Err(ContinuationError::AlreadyStarted),
            ContinuationState::Closed => return Err(ContinuationError::Closed),
        }

        let (to_worker, from_caller) = rendezvous::channel();
        let (to_caller, from_worker) = rendezvous::channel();
        let body = ThreadedEvaluator::evaluate(&mut self.handler);

        let worker = match self
            .factory
            .spawn(move || run_body(body, to_caller, from_caller))
        {
            Ok(worker) => worker,
            Err(err) => {
                self.state = ContinuationState::Closed;
                self.handler.close();
                return Err(err.into());
            }
        };
        trace!(
            target: "generatron::continuation::thread",
            worker = worker.info().name(),
            depth = worker.info().depth(),
            "start"
        );

        self.worker = Some(worker);
        self.channels = Some(CallerChannels {
            to_worker,
            from_worker,
        });
        self.execute(ctx)
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

impl<H: Handler> Drop for ThreadContinuation<H> {
    fn drop(&mut self) {
        // Disconnect first so a suspended body unwinds with Abrupt::Detached
        self.channels = None;
        if let Some(worker) = self.worker.take() {
            debug!(
                target: "generatron::continuation::thread",
                worker = worker.info().name(),
                "dropping suspended continuation"
            );
            let _ = worker.join();
        }
    }
}
