//! Reminder scheduler — at most one pending one-shot timer per list.
//!
//! Timer tasks never touch shared state: when a sleep elapses the task
//! sends a [`FireEvent`] over an mpsc channel and a single consumer (the
//! service's fire loop) applies the store mutation and notification.
//! Aborting a timer cannot recall an event that was already queued, so
//! every pending job carries a token and the consumer must claim a fire
//! with [`ReminderScheduler::take_fired`] before acting on it.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use tasknest_core::error::{Result, TasknestError};

use crate::jobs::{FireEvent, JobId, ReminderJob};

/// Current local wall-clock time, naive per the no-timezone policy.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

struct PendingJob {
    job: ReminderJob,
    token: u64,
    handle: JoinHandle<()>,
}

/// Per-list slot state machine: NONE → SCHEDULED → (FIRED | CANCELLED |
/// REPLACED), where REPLACED is an atomic cancel-plus-schedule. The slot
/// map lives behind the service's single lock, so remove-then-insert is
/// inherently race-free.
pub struct ReminderScheduler {
    pending: HashMap<JobId, PendingJob>,
    events_tx: UnboundedSender<FireEvent>,
    next_token: u64,
}

impl ReminderScheduler {
    /// Create a scheduler that reports fires on the given channel.
    pub fn new(events_tx: UnboundedSender<FireEvent>) -> Self {
        Self {
            pending: HashMap::new(),
            events_tx,
            next_token: 0,
        }
    }

    /// Schedule a one-shot reminder for `title`. Rejects timestamps that
    /// are not strictly in the future. An existing job for the same title
    /// is replaced, never duplicated.
    pub fn schedule(&mut self, title: &str, fire_at: NaiveDateTime) -> Result<()> {
        if fire_at <= local_now() {
            return Err(TasknestError::PastTimestamp(fire_at));
        }
        self.arm(title, fire_at);
        Ok(())
    }

    /// Remove the job for `title` if one exists. Absence is not an error.
    pub fn cancel(&mut self, title: &str) -> bool {
        let id = JobId::derive(title);
        match self.pending.remove(&id) {
            Some(p) => {
                p.handle.abort();
                tracing::info!("🗑️ Reminder cancelled: '{title}' ({id})");
                true
            }
            None => false,
        }
    }

    /// Move an existing job from `old` to `new`, keeping the fire time.
    /// Only identity moves; the persisted timestamp is the caller's
    /// concern and stays untouched. No-op (false) when no job exists.
    pub fn reschedule_for_rename(&mut self, old: &str, new: &str) -> bool {
        let old_id = JobId::derive(old);
        match self.pending.remove(&old_id) {
            Some(p) => {
                p.handle.abort();
                let fire_at = p.job.fire_at;
                tracing::info!("🔁 Reminder moved: '{old}' → '{new}' (fires {fire_at})");
                // Re-arm directly: the fire time was valid when first
                // scheduled and must survive the rename even if it is
                // about to elapse.
                self.arm(new, fire_at);
                true
            }
            None => false,
        }
    }

    /// Claim a fired job. Returns the job only while the slot still holds
    /// the matching token; events from timers that were cancelled or
    /// replaced after sending fail the claim and must be dropped.
    pub fn take_fired(&mut self, job_id: &JobId, token: u64) -> Option<ReminderJob> {
        match self.pending.get(job_id) {
            Some(p) if p.token == token => self.pending.remove(job_id).map(|p| p.job),
            _ => None,
        }
    }

    /// Abort every outstanding timer. Idempotent; used at shutdown.
    pub fn shutdown(&mut self) {
        for (id, p) in self.pending.drain() {
            p.handle.abort();
            tracing::debug!("🗑️ Timer aborted at shutdown: {id}");
        }
    }

    pub fn is_scheduled(&self, title: &str) -> bool {
        self.pending.contains_key(&JobId::derive(title))
    }

    /// Fire time of the pending job for `title`, if any.
    pub fn fire_time_for(&self, title: &str) -> Option<NaiveDateTime> {
        self.pending.get(&JobId::derive(title)).map(|p| p.job.fire_at)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Replace-on-schedule: drop any existing slot for the title, then
    /// spawn the timer task and register the new job.
    fn arm(&mut self, title: &str, fire_at: NaiveDateTime) {
        let id = JobId::derive(title);
        if let Some(old) = self.pending.remove(&id) {
            old.handle.abort();
            tracing::info!("🔁 Reminder replaced: '{title}' ({id})");
        }

        let token = self.next_token;
        self.next_token += 1;

        let delay = (fire_at - local_now()).to_std().unwrap_or_default();
        let tx = self.events_tx.clone();
        let event_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the service is shutting down.
            let _ = tx.send(FireEvent {
                job_id: event_id,
                token,
            });
        });

        tracing::info!("📅 Reminder scheduled: '{title}' at {fire_at} ({id})");
        self.pending.insert(
            id,
            PendingJob {
                job: ReminderJob {
                    title: title.to_string(),
                    fire_at,
                },
                token,
                handle,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tokio::sync::mpsc;

    fn scheduler() -> (ReminderScheduler, mpsc::UnboundedReceiver<FireEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ReminderScheduler::new(tx), rx)
    }

    #[tokio::test]
    async fn rejects_past_timestamps() {
        let (mut s, _rx) = scheduler();
        let err = s.schedule("Work", local_now() - Duration::seconds(1)).unwrap_err();
        assert!(matches!(err, TasknestError::PastTimestamp(_)));
        assert_eq!(s.pending_count(), 0);
    }

    #[tokio::test]
    async fn at_most_one_job_per_title() {
        let (mut s, _rx) = scheduler();
        let f1 = local_now() + Duration::hours(1);
        let f2 = local_now() + Duration::hours(2);
        s.schedule("Work", f1).unwrap();
        s.schedule("Work", f2).unwrap();
        assert_eq!(s.pending_count(), 1);
        assert_eq!(s.fire_time_for("Work"), Some(f2));
    }

    #[tokio::test]
    async fn cancel_removes_job() {
        let (mut s, _rx) = scheduler();
        s.schedule("Work", local_now() + Duration::hours(1)).unwrap();
        assert!(s.cancel("Work"));
        assert!(!s.is_scheduled("Work"));
        // Absent job is a no-op, not an error.
        assert!(!s.cancel("Work"));
    }

    #[tokio::test]
    async fn rename_moves_identity_preserving_fire_time() {
        let (mut s, _rx) = scheduler();
        let at = local_now() + Duration::hours(1);
        s.schedule("Groceries", at).unwrap();
        assert!(s.reschedule_for_rename("Groceries", "Shopping"));
        assert!(!s.is_scheduled("Groceries"));
        assert_eq!(s.fire_time_for("Shopping"), Some(at));
        assert_eq!(s.pending_count(), 1);
        // No job under the old title: rename is a no-op.
        assert!(!s.reschedule_for_rename("Groceries", "Other"));
    }

    #[tokio::test]
    async fn stale_token_fails_the_claim() {
        let (mut s, _rx) = scheduler();
        let id = JobId::derive("Work");
        s.schedule("Work", local_now() + Duration::hours(1)).unwrap();
        // A replaced timer's event carries the old token.
        s.schedule("Work", local_now() + Duration::hours(2)).unwrap();
        assert!(s.take_fired(&id, 0).is_none());
        assert!(s.is_scheduled("Work"));
        // The live token claims the job and empties the slot.
        assert!(s.take_fired(&id, 1).is_some());
        assert_eq!(s.pending_count(), 0);
    }

    #[tokio::test]
    async fn timer_sends_fire_event() {
        let (mut s, mut rx) = scheduler();
        s.schedule("Soon", local_now() + Duration::milliseconds(150)).unwrap();
        let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timer should fire")
            .expect("channel open");
        assert_eq!(event.job_id, JobId::derive("Soon"));
        let job = s.take_fired(&event.job_id, event.token).expect("claim");
        assert_eq!(job.title, "Soon");
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let (mut s, mut rx) = scheduler();
        s.schedule("Soon", local_now() + Duration::milliseconds(200)).unwrap();
        s.cancel("Soon");
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_aborts_everything() {
        let (mut s, mut rx) = scheduler();
        s.schedule("A", local_now() + Duration::milliseconds(200)).unwrap();
        s.schedule("B", local_now() + Duration::milliseconds(200)).unwrap();
        s.shutdown();
        assert_eq!(s.pending_count(), 0);
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        assert!(rx.try_recv().is_err());
    }
}
