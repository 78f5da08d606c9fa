use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// How a wait on a [`CompletionGate`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every expected reply arrived.
    Satisfied,
    /// Failed sends lowered the target and every remaining responder replied.
    Degraded,
    /// Every responder was lost to a failed send; no reply can arrive.
    Exhausted,
    /// The deadline passed first.
    TimedOut,
}

impl Completion {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Completion::Satisfied)
    }

    /// Whether the wait ended because replies stopped being possible or needed,
    /// rather than at the deadline.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Completion::TimedOut)
    }
}

/// Counting completion signal: opens once `expected` replies have been
/// signalled.
///
/// A gate may be fed by more potential responders than it needs (k-of-n
/// waits). Each responder whose send failed is forfeited and the target
/// shrinks to what the remaining responders can still deliver, so a dead peer
/// lowers the threshold instead of aborting the wait.
pub struct CompletionGate {
    expected: usize,
    responders: usize,
    arrived: AtomicUsize,
    forfeited: AtomicUsize,
    notify: Notify,
}

impl CompletionGate {
    pub fn new(expected: usize) -> Self {
        Self::with_responders(expected, expected)
    }

    pub fn with_responders(expected: usize, responders: usize) -> Self {
        Self {
            expected,
            responders: responders.max(expected),
            arrived: AtomicUsize::new(0),
            forfeited: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn replies(&self) -> usize {
        self.arrived.load(Ordering::Acquire)
    }

    pub fn signal(&self) {
        self.arrived.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    pub fn forfeit(&self) {
        self.forfeited.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    /// Replies still needed before the gate opens, given the forfeits so far.
    pub fn target(&self) -> usize {
        let reachable = self
            .responders
            .saturating_sub(self.forfeited.load(Ordering::Acquire));
        self.expected.min(reachable)
    }

    /// `None` while the outcome is still open.
    pub fn status(&self) -> Option<Completion> {
        let replies = self.replies();
        if replies >= self.expected {
            return Some(Completion::Satisfied);
        }
        let target = self.target();
        if target == 0 {
            return Some(Completion::Exhausted);
        }
        if replies >= target {
            return Some(Completion::Degraded);
        }
        None
    }

    pub async fn wait_until(&self, deadline: Instant) -> Completion {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a signal between the check and the
            // await is not lost.
            notified.as_mut().enable();

            if let Some(done) = self.status() {
                return done;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.status().unwrap_or(Completion::TimedOut);
            }
        }
    }

    pub async fn wait_for(&self, timeout: Duration) -> Completion {
        self.wait_until(Instant::now() + timeout).await
    }
}
