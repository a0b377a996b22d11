//! Resumable per-state tasks.
//!
//! A state's long-running procedure is a small step machine: each call to
//! `resume` runs until the next suspension point and returns a [`Step`]
//! that names what it is waiting for. The engine keeps exactly one task
//! alive in a [`TaskSlot`] and checks its wait condition once per
//! control-loop iteration.
//!
//! ```text
//!            resume()                       wait satisfied
//!  ┌───────┐ ───────▶ Step::Wait(w) ──────────────────────┐
//!  │ Task  │                                              │
//!  └───────┘ ◀────────────────────────────────────────────┘
//!      │ Step::Done / Step::Goto(id)
//!      ▼
//!  finished: torn down on the next service call
//! ```
//!
//! All task state lives in the [`Task`] union; its size is checked against
//! [`TASK_CAPACITY`] at compile time.

use crate::app::ports::{Hardware, Switch};
use crate::error::Result;
use crate::time::Instant;

use super::StateId;
use super::context::FsmContext;
use super::maintenance::{BackflushTask, DescaleTask};
use super::states::{BrewTask, PrefillTask, SteamTask};

/// Bytes available for a task's saved state.
pub const TASK_CAPACITY: usize = 256;

/// Upper bound on back-to-back resumes within one iteration, for waits
/// that are already satisfied when the task suspends.
const MAX_RESUMES_PER_SERVICE: usize = 8;

// ---------------------------------------------------------------------------
// Suspension points
// ---------------------------------------------------------------------------

/// Polled predicates a task can wait on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// Debounced switch at the given level.
    SwitchIs(Switch, bool),
    /// Scale connected, not taring, and at least this many grams.
    WeightAtLeast(f32),
}

impl Condition {
    pub fn holds<H: Hardware>(&self, ctx: &mut FsmContext<H>) -> bool {
        match *self {
            Self::SwitchIs(switch, level) => ctx.hw.get_switch(switch) == level,
            Self::WeightAtLeast(grams) => {
                ctx.hw.is_scale_connected()
                    && !ctx.hw.is_scale_taring()
                    && ctx.sensors().weight >= grams
            }
        }
    }
}

/// What a suspended task is waiting for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wait {
    /// Resume on the next iteration, unconditionally.
    NextCycle,
    /// Resume once the deadline is reached.
    Until(Instant),
    /// Resume once the condition holds.
    Condition(Condition),
}

impl Wait {
    /// Checked at the start of an iteration.
    fn should_resume<H: Hardware>(&self, ctx: &mut FsmContext<H>) -> bool {
        match self {
            Self::NextCycle => true,
            Self::Until(deadline) => ctx.now.reached(*deadline),
            Self::Condition(cond) => cond.holds(ctx),
        }
    }

    /// Checked right after suspending: a wait that is already satisfied
    /// does not cost an iteration.
    fn ready_now<H: Hardware>(&self, ctx: &mut FsmContext<H>) -> bool {
        match self {
            Self::NextCycle => false,
            _ => self.should_resume(ctx),
        }
    }
}

/// Outcome of one resume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Wait(Wait),
    /// Fell off the end.
    Done,
    /// Finished; the engine should move to this state.
    Goto(StateId),
}

impl Step {
    pub fn until(deadline: Instant) -> Self {
        Self::Wait(Wait::Until(deadline))
    }

    pub fn next_cycle() -> Self {
        Self::Wait(Wait::NextCycle)
    }

    pub fn when(cond: Condition) -> Self {
        Self::Wait(Wait::Condition(cond))
    }
}

// ---------------------------------------------------------------------------
// Task union
// ---------------------------------------------------------------------------

/// Saved state of whichever task is alive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Task {
    Prefill(PrefillTask),
    Brew(BrewTask),
    Steam(SteamTask),
    Backflush(BackflushTask),
    Descale(DescaleTask),
}

const _: () = assert!(core::mem::size_of::<Task>() <= TASK_CAPACITY);

impl Task {
    fn resume<H: Hardware>(&mut self, ctx: &mut FsmContext<H>) -> Result<Step> {
        match self {
            Self::Prefill(t) => t.resume(ctx),
            Self::Brew(t) => t.resume(ctx),
            Self::Steam(t) => t.resume(ctx),
            Self::Backflush(t) => t.resume(ctx),
            Self::Descale(t) => t.resume(ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// Task slot
// ---------------------------------------------------------------------------

/// Holder for the single live task.
#[derive(Debug, Default)]
pub struct TaskSlot {
    task: Option<Task>,
    waiting: Option<Wait>,
    finished: bool,
}

impl TaskSlot {
    pub const fn new() -> Self {
        Self {
            task: None,
            waiting: None,
            finished: false,
        }
    }

    /// Replace whatever was alive with a fresh task. It first runs on the
    /// next service call.
    pub fn start(&mut self, task: Task) {
        self.task = Some(task);
        self.waiting = None;
        self.finished = false;
    }

    /// Drop the task, wherever it was suspended.
    pub fn clear(&mut self) {
        self.task = None;
        self.waiting = None;
        self.finished = false;
    }

    pub fn is_alive(&self) -> bool {
        self.task.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn waiting(&self) -> Option<&Wait> {
        self.waiting.as_ref()
    }

    /// Resume the task if its wait is satisfied.
    ///
    /// Returns the state the task asked to move to, if any.
    pub fn service<H: Hardware>(&mut self, ctx: &mut FsmContext<H>) -> Result<Option<StateId>> {
        if self.finished {
            self.clear();
            return Ok(None);
        }
        let Some(task) = self.task.as_mut() else {
            return Ok(None);
        };
        if let Some(wait) = self.waiting {
            if !wait.should_resume(ctx) {
                return Ok(None);
            }
        }

        for _ in 0..MAX_RESUMES_PER_SERVICE {
            match task.resume(ctx)? {
                Step::Wait(wait) => {
                    self.waiting = Some(wait);
                    if !wait.ready_now(ctx) {
                        return Ok(None);
                    }
                }
                Step::Done => {
                    self.finished = true;
                    self.waiting = None;
                    return Ok(None);
                }
                Step::Goto(next) => {
                    self.finished = true;
                    self.waiting = None;
                    return Ok(Some(next));
                }
            }
        }
        Ok(None)
    }
}
