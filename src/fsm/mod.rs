//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust, extended with one
//! resumable task per state:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                     │
//! │  ┌───────────┬──────────┬──────────┬─────────────┬───────────┐  │
//! │  │ StateId   │ on_enter │ on_exit  │ check       │ task      │  │
//! │  ├───────────┼──────────┼──────────┼─────────────┼───────────┤  │
//! │  │ Off       │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->T  │ -         │  │
//! │  │ Standby   │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->T  │ Prefill   │  │
//! │  │ Brew      │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->T  │ Brew      │  │
//! │  │ Steam     │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->T  │ Steam     │  │
//! │  │ Backflush │ fn(ctx)  │ fn(ctx)  │ -           │ Backflush │  │
//! │  │ Descale   │ fn(ctx)  │ fn(ctx)  │ -           │ Descale   │  │
//! │  └───────────┴──────────┴──────────┴─────────────┴───────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `change_state` runs `on_exit` for the current state, drops its task
//! wherever it was suspended, runs `on_enter` for the next state, starts
//! the next state's task and finally notifies the context. Exit hooks are
//! responsible for leaving actuators safe; nothing else cleans up after an
//! abandoned task. All handlers receive `&mut FsmContext`.

pub mod context;
pub mod maintenance;
pub mod states;
pub mod task;

use context::FsmContext;
use log::{info, warn};
use task::{Task, TaskSlot};

use crate::app::ports::Hardware;
use crate::error::Result;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all machine states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Off = 0,
    Standby = 1,
    Brew = 2,
    Steam = 3,
    Backflush = 4,
    Descale = 5,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 6;

    /// Id reported while no state is active.
    pub const NONE: i8 = -1;

    pub const ALL: [StateId; Self::COUNT] = [
        Self::Off,
        Self::Standby,
        Self::Brew,
        Self::Steam,
        Self::Backflush,
        Self::Descale,
    ];

    /// Look up an externally supplied id.
    pub fn from_id(id: i32) -> Option<Self> {
        usize::try_from(id).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Wire id, with [`StateId::NONE`] for no state.
    pub fn raw(state: Option<StateId>) -> i8 {
        state.map_or(Self::NONE, |s| s as i8)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn<H> = fn(&mut FsmContext<H>) -> Result<()>;

/// Outcome of a transition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to do; the iteration continues.
    Stay,
    /// The check consumed this iteration.
    Handled,
    /// Move to another state; consumes the iteration.
    Goto(StateId),
}

/// Signature for the per-iteration transition check.
pub type StateCheckFn<H> = fn(&mut FsmContext<H>) -> Result<Transition>;

/// Builds a state's task when the state is entered.
pub type TaskFactory = fn() -> Task;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor<H: Hardware> {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<H>>,
    pub on_exit: Option<StateActionFn<H>>,
    pub check: Option<StateCheckFn<H>>,
    pub task: Option<TaskFactory>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and the single live
/// task. The [`FsmContext`] is threaded through every call.
pub struct Fsm<H: Hardware> {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor<H>; StateId::COUNT],
    /// `None` until the first state is entered, and between leave/enter.
    current: Option<StateId>,
    task: TaskSlot,
}

impl<H: Hardware> Default for Fsm<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hardware> Fsm<H> {
    /// Construct with the machine's state table; no state is active yet.
    pub fn new() -> Self {
        Self::with_table(states::build_state_table())
    }

    pub fn with_table(table: [StateDescriptor<H>; StateId::COUNT]) -> Self {
        Self {
            table,
            current: None,
            task: TaskSlot::new(),
        }
    }

    /// The active state, if any.
    pub fn current_state(&self) -> Option<StateId> {
        self.current
    }

    /// Wire id of the active state, -1 before the first entry.
    pub fn current_id(&self) -> i8 {
        StateId::raw(self.current)
    }

    pub fn state_name(&self, id: StateId) -> &'static str {
        self.table[id as usize].name
    }

    pub fn task(&self) -> &TaskSlot {
        &self.task
    }

    /// Make `id` current: run its `on_enter`, then start its task.
    pub fn enter_state(&mut self, id: StateId, ctx: &mut FsmContext<H>) -> Result<()> {
        let desc = &self.table[id as usize];
        self.current = Some(id);
        if let Some(enter) = desc.on_enter {
            enter(ctx)?;
        }
        match desc.task {
            Some(factory) => self.task.start(factory()),
            None => self.task.clear(),
        }
        Ok(())
    }

    /// Run the current state's `on_exit`, then drop its task and clear the
    /// current id. The task is dropped even if `on_exit` fails.
    pub fn leave_state(&mut self, ctx: &mut FsmContext<H>) -> Result<()> {
        let exit = self
            .current
            .and_then(|id| self.table[id as usize].on_exit);
        let result = exit.map_or(Ok(()), |exit| exit(ctx));
        self.task.clear();
        self.current = None;
        result
    }

    /// Move to `next`. A no-op if `next` is already current.
    pub fn change_state(&mut self, next: StateId, ctx: &mut FsmContext<H>) -> Result<()> {
        let old = self.current;
        if old == Some(next) {
            return Ok(());
        }

        info!(
            "FSM transition: {} -> {}",
            old.map_or("<none>", |id| self.state_name(id)),
            self.state_name(next)
        );

        self.leave_state(ctx)?;
        self.enter_state(next, ctx)?;
        ctx.on_state_change(old, next);
        Ok(())
    }

    /// Externally requested transition. Unknown ids are logged and ignored.
    pub fn change_state_by_id(&mut self, id: i32, ctx: &mut FsmContext<H>) -> Result<()> {
        match StateId::from_id(id) {
            Some(next) => self.change_state(next, ctx),
            None => {
                warn!("FSM: ignoring request for unknown state id {}", id);
                Ok(())
            }
        }
    }

    /// Run the current state's transition check.
    ///
    /// Returns `true` if the check consumed this iteration.
    pub fn check_transitions(&mut self, ctx: &mut FsmContext<H>) -> Result<bool> {
        let Some(check) = self.current.and_then(|id| self.table[id as usize].check) else {
            return Ok(false);
        };
        match check(ctx)? {
            Transition::Stay => Ok(false),
            Transition::Handled => Ok(true),
            Transition::Goto(next) => {
                self.change_state(next, ctx)?;
                Ok(true)
            }
        }
    }

    /// Resume the live task if its wait is satisfied, following any state
    /// change it asks for.
    pub fn service_task(&mut self, ctx: &mut FsmContext<H>) -> Result<()> {
        if let Some(next) = self.task.service(ctx)? {
            self.change_state(next, ctx)?;
        }
        Ok(())
    }

    /// Drop the live task without running any hooks (fault halt).
    pub fn abandon_task(&mut self) {
        self.task.clear();
    }
}
