//! Stack machine evaluator shared by both continuation strategies
//!
//! The snapshot strategy re-enters `Machine::run` from a `ResumptionPoint`;
//! the thread strategy runs the same loop on a generator worker and blocks in
//! `Suspender::suspend`. Identical programs must behave identically.

use std::sync::Arc;

use generatron::{
    Abrupt, Body, Evaluation, Handler, Resume, ResumeSlot, ResumptionPoint, ReturnValue,
    SnapshotEvaluator, Suspender, ThreadedEvaluator,
};

/// Local slots per frame; guards are stored after them in snapshots
pub const LOCALS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum TestValue {
    Int(i64),
    Str(String),
    /// Forced-return payload embedded in a snapshot slot
    Forced(Box<TestValue>),
    /// Delivered exception embedded in a snapshot slot
    Thrown(String),
}

impl ResumeSlot<String> for TestValue {
    fn from_resume(resume: Resume<Self, String>) -> Self {
        match resume {
            Resume::Next(value) => value,
            Resume::Return(marker) => TestValue::Forced(Box::new(marker.into_inner())),
            Resume::Throw(exception) => TestValue::Thrown(exception),
        }
    }
}

impl TestValue {
    fn into_resume(self) -> Resume<TestValue, String> {
        match self {
            TestValue::Forced(value) => Resume::Return(ReturnValue::new(*value)),
            TestValue::Thrown(exception) => Resume::Throw(exception),
            other => Resume::Next(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Push(i64),
    /// Pop a value, suspend with it, push the resume value
    Yield,
    Add,
    Store(usize),
    Load(usize),
    /// Install an exception handler at the given pc
    Try(usize),
    /// Install a cleanup block at the given pc, entered on exceptions and
    /// forced returns with the pending completion on top of the stack
    Finally(usize),
    /// Remove the innermost `Try` or `Finally`
    EndTry,
    /// Pop the pending completion and re-raise it, if there is one
    EndFinally,
    Throw(&'static str),
    Jump(usize),
    Return,
    /// Internal failure, not a script exception
    Fault,
}

type MachineAbrupt = Abrupt<TestValue, String, String>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Guard {
    Catch(usize),
    Finally(usize),
}

impl Guard {
    // Catch targets are stored as-is, cleanup targets as -(pc + 1)
    fn encode(self) -> TestValue {
        match self {
            Guard::Catch(target) => TestValue::Int(target as i64),
            Guard::Finally(target) => TestValue::Int(-(target as i64) - 1),
        }
    }

    fn decode(slot: TestValue) -> Self {
        match slot {
            TestValue::Int(n) if n >= 0 => Guard::Catch(n as usize),
            TestValue::Int(n) => Guard::Finally((-n - 1) as usize),
            other => panic!("corrupt guard slot {:?}", other),
        }
    }
}

enum Step {
    Yielded(TestValue),
    Returned(TestValue),
}

struct Machine {
    program: Arc<[Op]>,
    pc: usize,
    stack: Vec<TestValue>,
    locals: Vec<TestValue>,
    guards: Vec<Guard>,
}

impl Machine {
    fn new(program: Arc<[Op]>) -> Self {
        Self {
            program,
            pc: 0,
            stack: Vec::new(),
            locals: vec![TestValue::Int(0); LOCALS],
            guards: Vec::new(),
        }
    }

    /// Rebuild a machine from a snapshot, returning the resume payload
    fn restore(program: Arc<[Op]>, point: ResumptionPoint<TestValue>) -> (Self, TestValue) {
        let (mut stack, mut locals, pc, _) = point.into_parts();
        let payload = stack.pop().expect("snapshot stack holds the payload");
        let guards = locals.split_off(LOCALS).into_iter().map(Guard::decode).collect();
        let machine = Self {
            program,
            pc,
            stack,
            locals,
            guards,
        };
        (machine, payload)
    }

    fn snapshot(&self, value: TestValue) -> ResumptionPoint<TestValue> {
        let mut stack = self.stack.clone();
        stack.push(value);
        let mut locals = self.locals.clone();
        locals.extend(self.guards.iter().map(|guard| guard.encode()));
        ResumptionPoint::new(stack, locals, self.pc).expect("payload slot pushed")
    }

    fn pop(&mut self) -> Result<TestValue, MachineAbrupt> {
        self.stack
            .pop()
            .ok_or_else(|| Abrupt::Fault("stack underflow".to_string()))
    }

    fn raise(&mut self, exception: String) -> Result<(), MachineAbrupt> {
        match self.guards.pop() {
            Some(Guard::Catch(target)) => {
                self.pc = target;
                self.stack.push(TestValue::Str(exception));
                Ok(())
            }
            Some(Guard::Finally(target)) => {
                self.pc = target;
                self.stack.push(TestValue::Thrown(exception));
                Ok(())
            }
            None => Err(Abrupt::Throw(exception)),
        }
    }

    /// Unwind a forced return, running the innermost cleanup block if any
    fn force_return(&mut self, marker: ReturnValue<TestValue>) -> Result<(), MachineAbrupt> {
        while let Some(guard) = self.guards.pop() {
            if let Guard::Finally(target) = guard {
                self.pc = target;
                self.stack.push(TestValue::Forced(Box::new(marker.into_inner())));
                return Ok(());
            }
        }
        Err(Abrupt::Return(marker))
    }

    fn deliver(&mut self, resume: Resume<TestValue, String>) -> Result<(), MachineAbrupt> {
        match resume {
            Resume::Next(value) => {
                self.stack.push(value);
                Ok(())
            }
            Resume::Return(marker) => self.force_return(marker),
            Resume::Throw(exception) => self.raise(exception),
        }
    }

    fn run(&mut self) -> Result<Step, MachineAbrupt> {
        loop {
            let op = *self
                .program
                .get(self.pc)
                .ok_or_else(|| Abrupt::Fault(format!("pc {} out of bounds", self.pc)))?;
            self.pc += 1;

            match op {
                Op::Push(n) => self.stack.push(TestValue::Int(n)),
                Op::Yield => return self.pop().map(Step::Yielded),
                Op::Add => match (self.pop()?, self.pop()?) {
                    (TestValue::Int(b), TestValue::Int(a)) => self.stack.push(TestValue::Int(a + b)),
                    (b, a) => return Err(Abrupt::Fault(format!("cannot add {:?} and {:?}", a, b))),
                },
                Op::Store(slot) => {
                    let value = self.pop()?;
                    self.locals[slot] = value;
                }
                Op::Load(slot) => self.stack.push(self.locals[slot].clone()),
                Op::Try(target) => self.guards.push(Guard::Catch(target)),
                Op::Finally(target) => self.guards.push(Guard::Finally(target)),
                Op::EndTry => {
                    self.guards.pop();
                }
                Op::EndFinally => match self.pop()? {
                    TestValue::Forced(value) => self.force_return(ReturnValue::new(*value))?,
                    TestValue::Thrown(exception) => self.raise(exception)?,
                    _ => {}
                },
                Op::Throw(message) => self.raise(message.to_string())?,
                Op::Jump(target) => self.pc = target,
                Op::Return => return self.pop().map(Step::Returned),
                Op::Fault => return Err(Abrupt::Fault("machine fault".to_string())),
            }
        }
    }
}

/// One observable step of a continuation
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Suspended(TestValue),
    Returned(TestValue),
    Threw(String),
}

/// Handler and evaluator for a stack machine program
pub struct Recorder {
    program: Arc<[Op]>,
    pub closes: usize,
    pub evaluations: usize,
}

impl Recorder {
    pub fn new(program: Vec<Op>) -> Self {
        Self {
            program: program.into(),
            closes: 0,
            evaluations: 0,
        }
    }
}

impl Handler for Recorder {
    type Context = Vec<Event>;
    type Value = TestValue;
    type Exception = String;
    type Fault = String;
    type Output = Event;

    fn close(&mut self) {
        self.closes += 1;
    }

    fn suspend_with(&mut self, ctx: &mut Vec<Event>, value: TestValue) -> Event {
        ctx.push(Event::Suspended(value.clone()));
        Event::Suspended(value)
    }

    fn return_with(&mut self, ctx: &mut Vec<Event>, value: TestValue) -> Event {
        ctx.push(Event::Returned(value.clone()));
        Event::Returned(value)
    }

    fn throw_with(&mut self, ctx: &mut Vec<Event>, exception: String) -> Event {
        ctx.push(Event::Threw(exception.clone()));
        Event::Threw(exception)
    }
}

impl SnapshotEvaluator for Recorder {
    fn evaluate(
        &mut self,
        point: Option<ResumptionPoint<TestValue>>,
    ) -> Result<Evaluation<TestValue>, MachineAbrupt> {
        self.evaluations += 1;
        let mut machine = match point {
            None => Machine::new(Arc::clone(&self.program)),
            Some(point) => {
                let (mut machine, payload) = Machine::restore(Arc::clone(&self.program), point);
                machine.deliver(payload.into_resume())?;
                machine
            }
        };

        match machine.run()? {
            Step::Yielded(value) => Ok(Evaluation::Suspended(machine.snapshot(value))),
            Step::Returned(value) => Ok(Evaluation::Returned(value)),
        }
    }
}

impl ThreadedEvaluator for Recorder {
    fn evaluate(&mut self) -> Body<TestValue, String, String> {
        self.evaluations += 1;
        let mut machine = Machine::new(Arc::clone(&self.program));

        Box::new(move |suspender: &Suspender<TestValue, String, String>| loop {
            match machine.run()? {
                Step::Yielded(value) => match suspender.suspend(value) {
                    Ok(resumed) => machine.deliver(Resume::Next(resumed))?,
                    Err(Abrupt::Throw(exception)) => machine.raise(exception)?,
                    Err(Abrupt::Return(marker)) => machine.force_return(marker)?,
                    Err(abrupt) => return Err(abrupt),
                },
                Step::Returned(value) => return Ok(value),
            }
        })
    }
}
