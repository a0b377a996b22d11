//! Cross-core shared state.
//!
//! [`CoreLink`] is the only thing the two cores share. Every field is a
//! small `Copy` cell behind a blocking critical-section mutex, so neither
//! side ever waits on the other for longer than a copy.
//!
//! | Cell          | Writer        | Reader        |
//! |---------------|---------------|---------------|
//! | next state    | services core | control core  |
//! | liveness      | both          | control core  |
//! | settings      | services core | control core  |
//! | status        | control core  | services core |

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::config::{Settings, SettingsStore};
use crate::error::Fault;
use crate::fsm::StateId;
use crate::fsm::context::MaintenanceProgress;
use crate::safety::watchdog::Liveness;
use crate::sensors::Sensors;

/// What the control core last published about itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    /// Wire state id, -1 before the first state is entered.
    pub state_id: i8,
    pub sensors: Sensors,
    pub machine_start_ms: u64,
    pub state_change_ms: u64,
    /// Set while a maintenance program runs.
    pub maintenance: Option<MaintenanceProgress>,
    /// Latched fatal fault, if any.
    pub fault: Option<Fault>,
}

impl StatusSnapshot {
    pub const INITIAL: Self = Self {
        state_id: StateId::NONE,
        sensors: Sensors::EMPTY,
        machine_start_ms: 0,
        state_change_ms: 0,
        maintenance: None,
        fault: None,
    };
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// State shared between the control core and the services core.
pub struct CoreLink {
    /// One-slot mailbox; a newer request overwrites an unconsumed one.
    next_state: Mutex<CriticalSectionRawMutex, Cell<Option<i32>>>,
    pub liveness: Liveness,
    pub settings: SettingsStore,
    status: Mutex<CriticalSectionRawMutex, Cell<StatusSnapshot>>,
}

impl Default for CoreLink {
    fn default() -> Self {
        Self::new(Settings::DEFAULT)
    }
}

impl CoreLink {
    pub const fn new(settings: Settings) -> Self {
        Self {
            next_state: Mutex::new(Cell::new(None)),
            liveness: Liveness::new(),
            settings: SettingsStore::new(settings),
            status: Mutex::new(Cell::new(StatusSnapshot::INITIAL)),
        }
    }

    // ── Scheduled transitions ─────────────────────────────────

    /// Request a state change. It takes effect at the start of the control
    /// core's next iteration.
    pub fn schedule_state_change_by_id(&self, id: i32) {
        self.next_state.lock(|cell| cell.set(Some(id)));
    }

    /// Consume the pending request, if any.
    pub fn take_scheduled_state(&self) -> Option<i32> {
        self.next_state.lock(Cell::take)
    }

    // ── Status ────────────────────────────────────────────────

    pub fn publish_status(&self, status: StatusSnapshot) {
        self.status.lock(|cell| cell.set(status));
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.lock(Cell::get)
    }

    pub fn get_state_id(&self) -> i8 {
        self.status().state_id
    }

    pub fn sensors(&self) -> Sensors {
        self.status().sensors
    }
}
