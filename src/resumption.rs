//! Frame snapshots for suspended evaluator frames
//!
//! A `ResumptionPoint` records an evaluator frame's operand stack, local slots
//! and resume offset at a suspend point. Snapshots chain through `parent` to
//! represent nested delegation (`yield*`, awaited inner generators): only the
//! innermost node (the one without a parent) carries the live suspend/resume
//! payload, in the last slot of its operand stack. Outer nodes are pass-through
//! context for restoring execution order.
//!
//! # Mutation contract
//!
//! The payload slot is written in place by `set_resume_value`. There is no
//! copy-on-write: a snapshot is owned by exactly one continuation and handed to
//! the evaluator by value on the next resume, so no aliasing can be observed.

/// Abrupt-return marker.
///
/// Travels through the resume channel to request "force a return with this
/// value" instead of "resume normally with this value". Both continuation
/// strategies unwrap it into a normal return before anything becomes visible
/// to script code.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnValue<V>(V);

impl<V> ReturnValue<V> {
    pub fn new(value: V) -> Self {
        ReturnValue(value)
    }

    pub fn value(&self) -> &V {
        &self.0
    }

    pub fn into_inner(self) -> V {
        self.0
    }
}

/// Payload delivered to a suspended body when it is resumed
#[derive(Debug, Clone, PartialEq)]
pub enum Resume<V, E> {
    /// Resume normally; the suspend expression evaluates to this value
    Next(V),
    /// Unwind the body with a forced return (`finally` blocks still run)
    Return(ReturnValue<V>),
    /// Raise this script exception at the suspend point
    Throw(E),
}

/// Slot types that can carry every kind of resume payload.
///
/// The snapshot strategy writes the payload straight into an operand-stack
/// slot, so the evaluator's slot type must be able to embed a forced-return
/// marker and a delivered exception alongside ordinary values. The evaluator
/// inspects the slot when it restores the frame.
pub trait ResumeSlot<E>: Sized {
    fn from_resume(resume: Resume<Self, E>) -> Self;
}

/// Errors raised while building a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumptionError {
    /// The operand stack has no slot to carry the suspend/resume payload
    EmptyStack,
}

impl std::fmt::Display for ResumptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStack => write!(f, "Resumption point requires a non-empty operand stack"),
        }
    }
}

impl std::error::Error for ResumptionError {}

/// Snapshot of one evaluator frame at a suspend point
#[derive(Debug, Clone, PartialEq)]
pub struct ResumptionPoint<S> {
    stack: Vec<S>,
    locals: Vec<S>,
    offset: usize,
    parent: Option<Box<ResumptionPoint<S>>>,
}

impl<S> ResumptionPoint<S> {
    /// Create a snapshot for a frame that is not delegating to another frame.
    ///
    /// The last slot of `stack` is the suspend value.
    pub fn new(stack: Vec<S>, locals: Vec<S>, offset: usize) -> Result<Self, ResumptionError> {
        if stack.is_empty() {
            return Err(ResumptionError::EmptyStack);
        }
        Ok(Self {
            stack,
            locals,
            offset,
            parent: None,
        })
    }

    /// Create a snapshot for an outer frame that is suspended inside `inner`.
    ///
    /// `inner` becomes this node's parent link and keeps carrying the payload.
    pub fn with_parent(
        stack: Vec<S>,
        locals: Vec<S>,
        offset: usize,
        inner: ResumptionPoint<S>,
    ) -> Result<Self, ResumptionError> {
        let mut point = Self::new(stack, locals, offset)?;
        point.parent = Some(Box::new(inner));
        Ok(point)
    }

    pub fn stack(&self) -> &[S] {
        &self.stack
    }

    pub fn locals(&self) -> &[S] {
        &self.locals
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn parent(&self) -> Option<&ResumptionPoint<S>> {
        self.parent.as_deref()
    }

    /// Number of frames in the chain, counting this one
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            depth += 1;
            node = parent;
        }
        depth
    }

    /// The node that carries the live payload
    pub fn innermost(&self) -> &ResumptionPoint<S> {
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            node = parent;
        }
        node
    }

    /// Value the frame suspended with (last slot of the innermost stack)
    pub fn suspend_value(&self) -> &S {
        self.innermost()
            .stack
            .last()
            .expect("resumption point stack is never empty")
    }

    fn innermost_mut(&mut self) -> &mut ResumptionPoint<S> {
        let mut node = self;
        while let Some(ref mut parent) = node.parent {
            node = &mut **parent;
        }
        node
    }

    /// Overwrite the payload slot of the innermost stack in place
    pub fn set_resume_value(&mut self, value: S) {
        if let Some(slot) = self.innermost_mut().stack.last_mut() {
            *slot = value;
        }
    }

    /// Split the snapshot for the evaluator to rebuild its frame
    pub fn into_parts(self) -> (Vec<S>, Vec<S>, usize, Option<ResumptionPoint<S>>) {
        (self.stack, self.locals, self.offset, self.parent.map(|p| *p))
    }
}
