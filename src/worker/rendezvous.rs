//! Zero-capacity handoff between a continuation's caller and its worker
//!
//! Both halves wrap a crossbeam `bounded(0)` channel: `put` blocks until the
//! other side is inside `take` and vice versa, so exactly one value is ever
//! in flight and at most one side is runnable at a time.
//!
//! Every blocking operation also listens on the calling thread's interrupt
//! wake channel. An interrupt is absorbed (the operation retries) and the
//! thread's interrupted flag is restored once the handoff completes.

use crossbeam_channel::{bounded, Receiver, Select, Sender};
use tracing::trace;

use super::interrupt::{self, InterruptState};

/// The peer half of the rendezvous was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

impl std::fmt::Display for Disconnected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rendezvous peer disconnected")
    }
}

impl std::error::Error for Disconnected {}

/// Create a connected pair of rendezvous halves
pub(crate) fn channel<T>() -> (RendezvousSender<T>, RendezvousReceiver<T>) {
    let (tx, rx) = bounded(0);
    (RendezvousSender { tx }, RendezvousReceiver { rx })
}

#[derive(Debug)]
pub(crate) struct RendezvousSender<T> {
    tx: Sender<T>,
}

#[derive(Debug)]
pub(crate) struct RendezvousReceiver<T> {
    rx: Receiver<T>,
}

impl<T> RendezvousSender<T> {
    /// Hand `value` to the receiver, blocking until it is taken
    pub(crate) fn put(&self, value: T) -> Result<(), Disconnected> {
        let state = interrupt::current_state();
        let mut interrupted = state.take();

        let result = loop {
            let mut sel = Select::new();
            let send_op = sel.send(&self.tx);
            sel.recv(state.wake_receiver());
            let oper = sel.select();

            if oper.index() == send_op {
                break oper.send(&self.tx, value).map_err(|_| Disconnected);
            }
            interrupted |= absorb_wake(oper, &state);
        };

        if interrupted {
            state.restore();
        }
        result
    }
}

impl<T> RendezvousReceiver<T> {
    /// Block until the sender hands over a value
    pub(crate) fn take(&self) -> Result<T, Disconnected> {
        let state = interrupt::current_state();
        let mut interrupted = state.take();

        let result = loop {
            let mut sel = Select::new();
            let recv_op = sel.recv(&self.rx);
            sel.recv(state.wake_receiver());
            let oper = sel.select();

            if oper.index() == recv_op {
                break oper.recv(&self.rx).map_err(|_| Disconnected);
            }
            interrupted |= absorb_wake(oper, &state);
        };

        if interrupted {
            state.restore();
        }
        result
    }
}

fn absorb_wake(oper: crossbeam_channel::SelectedOperation<'_>, state: &InterruptState) -> bool {
    // The wake sender lives in the same state, so this never disconnects
    let _ = oper.recv(state.wake_receiver());
    let interrupted = state.take();
    if interrupted {
        trace!(target: "generatron::worker::rendezvous", "interrupt absorbed, retrying handoff");
    }
    interrupted
}
