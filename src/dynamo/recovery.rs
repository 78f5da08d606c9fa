use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::session::gate::Completion;
use crate::session::registry::{SessionGuard, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    Idle,
    Recovering,
}

struct ActiveRecovery {
    session: SessionGuard,
    deadline: Instant,
}

/// Gates every operation on this node until the startup pull from recovery
/// peers has finished or timed out.
///
/// Exactly one waiter observes the active recovery and clears it; the async
/// mutex makes the rest queue behind it and then find nothing to wait for.
pub struct RecoveryController {
    active: Mutex<Option<ActiveRecovery>>,
    recovering: AtomicBool,
}

impl RecoveryController {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            recovering: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RecoveryState {
        if self.recovering.load(Ordering::Acquire) {
            RecoveryState::Recovering
        } else {
            RecoveryState::Idle
        }
    }

    /// Installs `session` as the active recovery. Its guard is held until the
    /// first waiter clears the marker.
    pub async fn begin(&self, session: SessionGuard, timeout: Duration) -> SessionId {
        let id = session.id();
        let mut active = self.active.lock().await;
        *active = Some(ActiveRecovery {
            session,
            deadline: Instant::now() + timeout,
        });
        self.recovering.store(true, Ordering::Release);
        tracing::info!("RECOVERING: session {}", id);
        id
    }

    pub async fn wait(&self) {
        if !self.recovering.load(Ordering::Acquire) {
            return;
        }

        let mut active = self.active.lock().await;
        if let Some(run) = active.take() {
            tracing::debug!("Waiting for recovery session {}", run.session.id());
            match run.session.gate.wait_until(run.deadline).await {
                Completion::Satisfied | Completion::Degraded => tracing::info!(
                    "RECOVERY COMPLETED: {} of {} peers replied",
                    run.session.gate.replies(),
                    run.session.gate.expected()
                ),
                outcome => tracing::warn!(
                    "RECOVERY ENDED ({:?}): {} of {} peers replied",
                    outcome,
                    run.session.gate.replies(),
                    run.session.gate.expected()
                ),
            }
            self.recovering.store(false, Ordering::Release);
        }
    }
}

impl Default for RecoveryController {
    fn default() -> Self {
        Self::new()
    }
}
