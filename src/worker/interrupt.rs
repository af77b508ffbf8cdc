//! Per-thread cooperative interrupt flag
//!
//! Blocking rendezvous operations must survive an interrupt without aborting
//! the caller/worker protocol, yet the interrupt must remain observable to
//! outer cancellation logic once the operation returns. Each thread owns an
//! `InterruptState`: a sticky flag plus a one-slot wake channel that lets
//! `Interruptor::interrupt` unblock a thread parked in a rendezvous `select`.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

thread_local! {
    static CURRENT: Arc<InterruptState> = Arc::new(InterruptState::new());
}

#[derive(Debug)]
pub(crate) struct InterruptState {
    flag: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl InterruptState {
    fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            flag: AtomicBool::new(false),
            wake_tx,
            wake_rx,
        }
    }

    pub(crate) fn wake_receiver(&self) -> &Receiver<()> {
        &self.wake_rx
    }

    /// Clear the flag, returning whether it was set
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Re-assert the flag without waking anyone
    pub(crate) fn restore(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // A pending wake token already covers this interrupt
        let _ = self.wake_tx.try_send(());
    }
}

/// Handle that interrupts the thread it was obtained on
#[derive(Debug, Clone)]
pub struct Interruptor {
    state: Arc<InterruptState>,
}

impl Interruptor {
    /// Set the target thread's interrupted flag and wake it if it is blocked
    /// in a rendezvous handoff.
    pub fn interrupt(&self) {
        self.state.raise();
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.flag.load(Ordering::SeqCst)
    }
}

/// Interrupt handle for the calling thread
pub fn current() -> Interruptor {
    Interruptor {
        state: current_state(),
    }
}

/// Whether the calling thread's interrupted flag is set
pub fn is_interrupted() -> bool {
    CURRENT.with(|state| state.flag.load(Ordering::SeqCst))
}

/// Clear the calling thread's interrupted flag, returning its previous value
pub fn take_interrupt() -> bool {
    CURRENT.with(|state| state.take())
}

pub(crate) fn current_state() -> Arc<InterruptState> {
    CURRENT.with(Arc::clone)
}
