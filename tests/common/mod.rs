//! Test utilities for generatron integration tests
//!
//! This module provides:
//! - `machine`: a tiny bytecode evaluator that runs under both
//!   continuation strategies, so the same program can be cross-checked
//! - `Recorder`: the `Handler` side, recording every step as an `Event`
//! - `Script`: a JS-flavoured `CallContext` for trampoline tests
#![allow(dead_code)]

pub mod machine;
pub mod script;

pub use machine::{Event, Op, Recorder, TestValue};
pub use script::{Script, ScriptError, ScriptValue};

use generatron::{Continuation, Coroutine, Resume, Strategy};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a fmt subscriber writing through the test harness
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Build a coroutine for `program` with a private worker factory
pub fn coroutine(program: Vec<Op>, strategy: Strategy) -> Coroutine<Recorder> {
    let factory = std::sync::Arc::new(generatron::GeneratorThreadFactory::new(
        &generatron::GeneratronConfig::default(),
    ));
    Coroutine::with_factory(Recorder::new(program), strategy, factory)
}

/// Start `program` and feed it `resumes` while it stays suspended.
///
/// Returns every event in order, stopping early once the continuation closes.
pub fn drive(
    program: Vec<Op>,
    strategy: Strategy,
    resumes: &[Resume<TestValue, String>],
) -> Vec<Event> {
    let mut c = coroutine(program, strategy);
    let mut events = Vec::new();

    let first = c.start(&mut events).expect("start should succeed");
    let mut outcomes = vec![first];
    for resume in resumes {
        if c.is_closed() {
            break;
        }
        let step = match resume.clone() {
            Resume::Next(v) => c.resume(&mut events, v),
            Resume::Return(marker) => c.force_return(&mut events, marker.into_inner()),
            Resume::Throw(e) => c.throw(&mut events, e),
        };
        outcomes.push(step.expect("resume should succeed"));
    }
    assert_eq!(outcomes, events, "handler output mirrors the recorded events");
    assert_eq!(c.handler().closes, usize::from(c.is_closed()));
    events
}
