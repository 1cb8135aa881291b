//! Run controller: `Running | Paused | Stopped` behind a mutex + condvar.
//!
//! The harvester polls [`RunController::state`] between batches and parks in
//! [`RunController::wait_while_paused`]. Pacing waits go through [`RunController::sleep`] so a
//! stop cuts them short.

use log::{info, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Running,
    Paused,
    Stopped,
}

struct Shared {
    state: Mutex<RunState>,
    changed: Condvar,
}

/// Cheap to clone; all clones drive the same state.
#[derive(Clone)]
pub struct RunController {
    inner: Arc<Shared>,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(RunState::Running),
                changed: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // State is a plain enum; a poisoned lock still holds a valid value.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, f: impl FnOnce(RunState) -> RunState) -> RunState {
        let mut state = self.lock();
        let next = f(*state);
        if next != *state {
            *state = next;
            self.inner.changed.notify_all();
        }
        next
    }

    pub fn state(&self) -> RunState {
        *self.lock()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == RunState::Stopped
    }

    /// Running → Paused. No effect once stopped.
    pub fn pause(&self) -> RunState {
        self.transition(|s| match s {
            RunState::Running => RunState::Paused,
            other => other,
        })
    }

    /// Paused → Running. No effect once stopped.
    pub fn resume(&self) -> RunState {
        self.transition(|s| match s {
            RunState::Paused => RunState::Running,
            other => other,
        })
    }

    pub fn stop(&self) -> RunState {
        self.transition(|_| RunState::Stopped)
    }

    /// First interrupt pauses, a second one (while paused) stops.
    pub fn interrupt(&self) -> RunState {
        self.transition(|s| match s {
            RunState::Running => RunState::Paused,
            RunState::Paused | RunState::Stopped => RunState::Stopped,
        })
    }

    /// Block while paused. Returns the state that ended the wait (Running or Stopped).
    pub fn wait_while_paused(&self) -> RunState {
        let guard = self.lock();
        let guard = self
            .inner
            .changed
            .wait_while(guard, |s| *s == RunState::Paused)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }

    /// Sleep for `dur`, waking early only when stopped. Returns true if the full duration elapsed.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut guard = self.lock();
        loop {
            if *guard == RunState::Stopped {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            guard = match self.inner.changed.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Route Ctrl+C into [`RunController::interrupt`]. Only one handler per process.
    pub fn install_interrupt_handler(&self) -> anyhow::Result<()> {
        let controller = self.clone();
        ctrlc::set_handler(move || match controller.interrupt() {
            RunState::Paused => {
                info!("Pause requested; press Enter to resume or Ctrl+C again to stop")
            }
            RunState::Stopped => warn!("Stop requested; finishing current batch"),
            RunState::Running => {}
        })
        .map_err(|e| anyhow::anyhow!("install Ctrl+C handler: {e}"))
    }
}
