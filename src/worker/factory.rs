//! Generator worker factory
//!
//! Every thread-based continuation obtains its worker here. The factory
//! computes the new worker's nesting depth from the requesting thread and
//! refuses to create it once the depth reaches `MAX_GENERATOR_DEPTH`. This
//! bounds runaway `yield*`/`await` delegation chains, each link of which would
//! otherwise pin another OS thread.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread;

use tracing::{debug, warn};

use super::thread::{GeneratorInfo, GeneratorThread};
use crate::config::GeneratronConfig;

/// Nesting depth at which worker creation fails with a stack overflow
pub const MAX_GENERATOR_DEPTH: usize = 1000;

/// Global generator factory, configured from the environment
static GLOBAL_FACTORY: LazyLock<Arc<GeneratorThreadFactory>> = LazyLock::new(|| {
    let config = GeneratronConfig::from_env().unwrap_or_else(|err| {
        warn!(target: "generatron::worker::factory", %err, "ignoring invalid environment config");
        GeneratronConfig::default()
    });
    Arc::new(GeneratorThreadFactory::new(&config))
});

/// Get the global generator factory
pub fn global_generator_factory() -> &'static Arc<GeneratorThreadFactory> {
    &GLOBAL_FACTORY
}

/// Errors from worker creation
#[derive(Debug)]
pub enum WorkerError {
    /// The requested nesting depth reached `MAX_GENERATOR_DEPTH`
    StackOverflow { depth: usize },
    /// The OS refused to create the thread
    Spawn(std::io::Error),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StackOverflow { depth } => write!(
                f,
                "Generator nesting too deep: depth {} reaches limit {}",
                depth, MAX_GENERATOR_DEPTH
            ),
            Self::Spawn(e) => write!(f, "Failed to spawn generator worker: {}", e),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::StackOverflow { .. } => None,
        }
    }
}

/// Depth for a worker requested by a thread whose own generator info is `requester`
pub fn nesting_depth(requester: Option<&GeneratorInfo>) -> usize {
    requester.map_or(1, |info| info.depth() + 1)
}

/// Reject depths at or beyond the ceiling
pub fn check_depth(depth: usize) -> Result<usize, WorkerError> {
    if depth >= MAX_GENERATOR_DEPTH {
        Err(WorkerError::StackOverflow { depth })
    } else {
        Ok(depth)
    }
}

/// Creates single-use generator worker threads
#[derive(Debug)]
pub struct GeneratorThreadFactory {
    name_prefix: String,
    stack_size: Option<usize>,
    next_id: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl GeneratorThreadFactory {
    pub fn new(config: &GeneratronConfig) -> Self {
        Self {
            name_prefix: config.worker_name_prefix.clone(),
            stack_size: config.worker_stack_size,
            next_id: AtomicU64::new(1),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of workers spawned by this factory that have not exited yet
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Spawn `task` on a new generator worker.
    ///
    /// Fails synchronously, without creating a thread, when the worker would
    /// sit at nesting depth `MAX_GENERATOR_DEPTH` or deeper.
    pub fn spawn<F, T>(&self, task: F) -> Result<GeneratorThread<T>, WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let parent = GeneratorInfo::current();
        let depth = check_depth(nesting_depth(parent.as_deref())).inspect_err(|_| {
            warn!(
                target: "generatron::worker::factory",
                requester = ?thread::current().name(),
                "generator nesting limit reached"
            );
        })?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-{}", self.name_prefix, id);
        let info = Arc::new(GeneratorInfo::new(
            id,
            name.clone(),
            depth,
            thread::current(),
            parent,
        ));

        let mut builder = thread::Builder::new().name(name);
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        let worker_info = Arc::clone(&info);
        let live = Arc::clone(&self.live);
        live.fetch_add(1, Ordering::SeqCst);

        let handle = builder
            .spawn(move || {
                let _live = LiveGuard(live);
                debug!(
                    target: "generatron::worker::factory",
                    worker = worker_info.name(),
                    depth = worker_info.depth(),
                    "generator worker started"
                );
                GeneratorInfo::install(worker_info);
                task()
            })
            .map_err(|e| {
                self.live.fetch_sub(1, Ordering::SeqCst);
                WorkerError::Spawn(e)
            })?;

        Ok(GeneratorThread::new(handle, info))
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
