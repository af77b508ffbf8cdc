//! Generator worker threads
//!
//! A generator worker runs exactly one thread-based continuation body for the
//! continuation's whole lifetime. Besides the OS thread it carries a
//! `GeneratorInfo`: its nesting depth across chained coroutines and its
//! logical parent, so diagnostics can rebuild the chain of threads that led to
//! a suspended body even though each link runs on its own OS thread.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};

thread_local! {
    static CURRENT_GENERATOR: RefCell<Option<Arc<GeneratorInfo>>> = const { RefCell::new(None) };
}

/// Identity and lineage of a generator worker
#[derive(Debug)]
pub struct GeneratorInfo {
    id: u64,
    name: String,
    depth: usize,
    parent_thread: Thread,
    parent: Option<Arc<GeneratorInfo>>,
}

impl GeneratorInfo {
    pub(crate) fn new(
        id: u64,
        name: String,
        depth: usize,
        parent_thread: Thread,
        parent: Option<Arc<GeneratorInfo>>,
    ) -> Self {
        Self {
            id,
            name,
            depth,
            parent_thread,
            parent,
        }
    }

    /// Info for the calling thread, if it is a generator worker
    pub fn current() -> Option<Arc<GeneratorInfo>> {
        CURRENT_GENERATOR.with(|slot| slot.borrow().clone())
    }

    pub(crate) fn install(info: Arc<GeneratorInfo>) {
        CURRENT_GENERATOR.with(|slot| *slot.borrow_mut() = Some(info));
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1 for a worker spawned by an ordinary thread, parent depth + 1 otherwise
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Thread that requested this worker
    pub fn parent_thread(&self) -> &Thread {
        &self.parent_thread
    }

    /// Info of the requesting thread when it is itself a generator worker
    pub fn parent(&self) -> Option<&GeneratorInfo> {
        self.parent.as_deref()
    }

    /// Thread names from this worker out to the first non-generator thread
    pub fn lineage(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            names.push(parent.name.clone());
            node = parent;
        }
        names.push(
            node.parent_thread
                .name()
                .unwrap_or("<unnamed>")
                .to_string(),
        );
        names
    }
}

/// A running generator worker and the handle to its result
#[derive(Debug)]
pub struct GeneratorThread<T> {
    handle: JoinHandle<T>,
    info: Arc<GeneratorInfo>,
}

impl<T> GeneratorThread<T> {
    pub(crate) fn new(handle: JoinHandle<T>, info: Arc<GeneratorInfo>) -> Self {
        Self { handle, info }
    }

    pub fn info(&self) -> &GeneratorInfo {
        &self.info
    }

    pub fn thread(&self) -> &Thread {
        self.handle.thread()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the body to finish and take its result
    pub fn join(self) -> thread::Result<T> {
        self.handle.join()
    }
}
