//! Cross-core watchdog liveness.
//!
//! Each core sets its flag once per loop. The control core checks the pair
//! each iteration and feeds the hardware watchdog only when both flags are
//! set, clearing them for the next round. If either core stalls, the
//! watchdog starves and resets the chip.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::app::ports::WatchdogPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core {
    Control,
    Services,
}

/// Per-core activity flags, shared between the cores.
pub struct Liveness {
    flags: Mutex<CriticalSectionRawMutex, Cell<[bool; 2]>>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub const fn new() -> Self {
        Self {
            flags: Mutex::new(Cell::new([false; 2])),
        }
    }

    /// Record activity for `core`.
    pub fn report(&self, core: Core) {
        self.flags.lock(|cell| {
            let mut flags = cell.get();
            flags[core as usize] = true;
            cell.set(flags);
        });
    }

    /// True if both cores reported since the last successful check; in
    /// that case both flags are cleared.
    pub fn take_all_alive(&self) -> bool {
        self.flags.lock(|cell| {
            let alive = cell.get() == [true, true];
            if alive {
                cell.set([false, false]);
            }
            alive
        })
    }
}

/// Run one round of the liveness protocol from the control core.
///
/// Returns whether the watchdog was fed.
pub fn service(liveness: &Liveness, watchdog: &mut (impl WatchdogPort + ?Sized)) -> bool {
    liveness.report(Core::Control);
    if !watchdog.is_enabled() || liveness.take_all_alive() {
        watchdog.feed();
        true
    } else {
        false
    }
}
