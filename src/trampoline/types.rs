//! Trampoline Types for Tail-Call Elimination
//!
//! A call or construct operation in tail position does not invoke its target.
//! It hands back a `TailCall` describing the invocation, and the driver loop
//! applies it one bounce at a time, so chains of any length run in constant
//! host stack.

use smallvec::SmallVec;

/// Arguments stored inline before spilling to the heap
pub const INLINE_ARGS: usize = 4;

/// Argument list of a deferred call
pub type Args<V> = SmallVec<[V; INLINE_ARGS]>;

/// A deferred invocation, consumed exactly once by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum TailCall<V, N> {
    /// Plain function call
    Call {
        callee: V,
        this: V,
        args: Args<V>,
    },
    /// Base-class construction with the pre-allocated receiver
    BaseConstruct {
        call: Box<TailCall<V, N>>,
        object: V,
    },
    /// Derived-class construction; `env` holds the eventual `this` binding
    DerivedConstruct {
        call: Box<TailCall<V, N>>,
        env: N,
    },
}

impl<V, N> TailCall<V, N> {
    pub fn call(callee: V, this: V, args: impl IntoIterator<Item = V>) -> Self {
        TailCall::Call {
            callee,
            this,
            args: args.into_iter().collect(),
        }
    }

    /// True for `BaseConstruct` and `DerivedConstruct`
    pub fn is_construct(&self) -> bool {
        !matches!(self, TailCall::Call { .. })
    }

    /// Wrap as a base construct completing to `object` unless the callee
    /// returns an object of its own.
    ///
    /// A construct-shaped tail call is returned unchanged: it already
    /// completes to an object or fails, so the outer wrapper could never
    /// apply. This keeps nesting at one level.
    pub fn into_base_construct(self, object: V) -> Self {
        if self.is_construct() {
            return self;
        }
        TailCall::BaseConstruct {
            call: Box::new(self),
            object,
        }
    }

    /// Wrap as a derived construct whose `this` lives in `env`.
    ///
    /// Construct-shaped tail calls are forwarded unchanged, as for
    /// `into_base_construct`.
    pub fn into_derived_construct(self, env: N) -> Self {
        if self.is_construct() {
            return self;
        }
        TailCall::DerivedConstruct {
            call: Box::new(self),
            env,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TailCall::Call { .. } => "call",
            TailCall::BaseConstruct { .. } => "base_construct",
            TailCall::DerivedConstruct { .. } => "derived_construct",
        }
    }
}

/// Result of a call or construct operation
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<V, N> {
    /// Finished with a value
    Value(V),
    /// Finished with a deferred invocation the caller must drive
    Tail(TailCall<V, N>),
}

impl<V, N> From<TailCall<V, N>> for Completion<V, N> {
    fn from(call: TailCall<V, N>) -> Self {
        Completion::Tail(call)
    }
}

/// Standard error kind a constructor violation must surface as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    TypeError,
    ReferenceError,
}

/// Broken constructor contract detected while completing a construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorViolation {
    /// A derived constructor returned something other than an object or undefined
    InvalidReturn,
    /// A derived constructor finished without its `this` ever being bound
    ThisNotInitialized,
}

impl ConstructorViolation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::InvalidReturn => ViolationKind::TypeError,
            Self::ThisNotInitialized => ViolationKind::ReferenceError,
        }
    }
}

impl std::fmt::Display for ConstructorViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidReturn => {
                write!(f, "Derived constructors may only return object or undefined")
            }
            Self::ThisNotInitialized => write!(
                f,
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor"
            ),
        }
    }
}

impl std::error::Error for ConstructorViolation {}

/// The evaluator as seen by the trampoline
pub trait CallContext {
    type Value;
    /// Environment record of a derived constructor activation
    type Env;
    /// Constructor violations must map onto the evaluator's own error kinds
    type Error: From<ConstructorViolation>;

    /// Invoke `callee`; a callee ending in tail position returns `Completion::Tail`
    fn call(
        &mut self,
        callee: Self::Value,
        this: Self::Value,
        args: Args<Self::Value>,
    ) -> Result<Completion<Self::Value, Self::Env>, Self::Error>;

    fn is_object(&self, value: &Self::Value) -> bool;

    fn is_undefined(&self, value: &Self::Value) -> bool;

    /// `this` bound in `env`, or `None` if `super()` never ran
    fn this_binding(&self, env: &Self::Env) -> Option<Self::Value>;
}

/// Per-run counters from `trampoline_with_stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrampolineStats {
    /// Total `apply` iterations
    pub bounces: u64,
    pub calls: u64,
    pub base_constructs: u64,
    pub derived_constructs: u64,
}

impl TrampolineStats {
    pub(crate) fn record<V, N>(&mut self, call: &TailCall<V, N>) {
        self.bounces += 1;
        match call {
            TailCall::Call { .. } => self.calls += 1,
            TailCall::BaseConstruct { .. } => self.base_constructs += 1,
            TailCall::DerivedConstruct { .. } => self.derived_constructs += 1,
        }
    }
}
