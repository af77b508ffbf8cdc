//! Dedicated threads for the thread-based continuation strategy
//!
//! - `factory`: depth-checked creation of generator workers
//! - `thread`: worker handle and per-thread generator lineage
//! - `rendezvous`: zero-capacity handoff between caller and worker
//! - `interrupt`: per-thread interrupt flag honored by the handoff

pub mod factory;
pub mod interrupt;
pub(crate) mod rendezvous;
pub mod thread;

pub use factory::{
    check_depth, global_generator_factory, nesting_depth, GeneratorThreadFactory, WorkerError,
    MAX_GENERATOR_DEPTH,
};
pub use interrupt::Interruptor;
pub use rendezvous::Disconnected;
pub use thread::{GeneratorInfo, GeneratorThread};
