//! Todo service — the collaborator-facing API over the list store and
//! reminder scheduler.
//!
//! Every compound operation (create, delete, rename, schedule, clear,
//! fire) runs inside one critical section over the store + scheduler
//! pair, so a fire and a concurrent user edit for the same title can
//! never interleave into disagreement between `TaskList.reminder` and
//! the pending-job table. The notification sink is always called after
//! the lock is released.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use tasknest_core::TasknestConfig;
use tasknest_core::error::{Result, TasknestError};

use crate::jobs::{FireEvent, JobId};
use crate::scheduler::{ReminderScheduler, local_now};
use crate::sink::{DesktopSink, NotificationSink, NullSink, compose_body, notification_title};
use crate::store::ListStore;

/// Hook invoked (post-clear) with the title of a fired list; the UI
/// uses it to refresh its reminder indicator.
pub type FiredHook = Arc<dyn Fn(&str) + Send + Sync>;

struct Inner {
    store: ListStore,
    scheduler: ReminderScheduler,
}

/// The service owning the store, the scheduler, and the fire consumer.
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TodoService {
    inner: Arc<Mutex<Inner>>,
    sink: Arc<dyn NotificationSink>,
    on_fired: Arc<StdMutex<Option<FiredHook>>>,
    events_rx: Arc<StdMutex<Option<UnboundedReceiver<FireEvent>>>>,
    consumer: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl TodoService {
    /// Create a service over the given snapshot file and sink. Nothing
    /// runs until [`TodoService::start`].
    pub fn new(data_file: &Path, sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                store: ListStore::open(data_file),
                scheduler: ReminderScheduler::new(tx),
            })),
            sink,
            on_fired: Arc::new(StdMutex::new(None)),
            events_rx: Arc::new(StdMutex::new(Some(rx))),
            consumer: Arc::new(StdMutex::new(None)),
        }
    }

    /// Create from config: desktop notifications, or a null sink when
    /// they are disabled.
    pub fn from_config(config: &TasknestConfig) -> Self {
        let sink: Arc<dyn NotificationSink> = if config.notify.enabled {
            Arc::new(DesktopSink)
        } else {
            Arc::new(NullSink)
        };
        Self::new(&config.storage.data_file, sink)
    }

    /// Register the UI-refresh hook. Replaces any previous hook.
    pub fn set_on_fired(&self, hook: FiredHook) {
        *self.on_fired.lock().unwrap() = Some(hook);
    }

    /// Start the service: reload the snapshot, spawn the fire consumer,
    /// then re-arm persisted reminders. Runs the re-arm pass exactly
    /// once, before any user input can race with it.
    pub async fn start(&self) {
        self.inner.lock().await.store.load();

        let rx = self.events_rx.lock().unwrap().take();
        if let Some(mut rx) = rx {
            let svc = self.clone();
            let handle = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    svc.handle_fire(event).await;
                }
            });
            *self.consumer.lock().unwrap() = Some(handle);
        }

        self.rearm_all(local_now()).await;
    }

    /// Stop cleanly: abort every outstanding timer and the consumer.
    pub async fn shutdown(&self) {
        self.inner.lock().await.scheduler.shutdown();
        if let Some(handle) = self.consumer.lock().unwrap().take() {
            handle.abort();
        }
        tracing::info!("⏹️ Reminder service stopped");
    }

    // ------------------------------------------------------------------
    // List and task operations
    // ------------------------------------------------------------------

    /// Create an empty list. Rejects empty titles, duplicates, and
    /// titles whose normalized job id collides with an existing list.
    pub async fn create_list(&self, title: &str) -> Result<()> {
        let title = validated_title(title)?;
        let mut inner = self.inner.lock().await;
        if inner.store.contains(&title) {
            return Err(TasknestError::DuplicateTitle(title));
        }
        if let Some(existing) = collision_of(&inner.store, &title, None) {
            return Err(TasknestError::TitleCollision { title, existing });
        }
        inner.store.insert(&title);
        Ok(())
    }

    /// Delete a list, cancelling its pending reminder job if any.
    pub async fn delete_list(&self, title: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.store.remove(title).is_none() {
            return Err(TasknestError::UnknownList(title.to_string()));
        }
        inner.scheduler.cancel(title);
        Ok(())
    }

    /// Rename a list. The job identity moves with it; the persisted
    /// reminder timestamp is untouched. Renaming to the same title is a
    /// no-op.
    pub async fn rename_list(&self, old: &str, new: &str) -> Result<()> {
        let new = validated_title(new)?;
        if new == old {
            return Ok(());
        }
        let mut inner = self.inner.lock().await;
        if !inner.store.contains(old) {
            return Err(TasknestError::UnknownList(old.to_string()));
        }
        if inner.store.contains(&new) {
            return Err(TasknestError::DuplicateTitle(new));
        }
        if let Some(existing) = collision_of(&inner.store, &new, Some(old)) {
            return Err(TasknestError::TitleCollision { title: new, existing });
        }
        inner.store.rename(old, &new);
        inner.scheduler.reschedule_for_rename(old, &new);
        Ok(())
    }

    /// Append a task. Duplicates allowed, insertion order kept.
    pub async fn add_task(&self, title: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TasknestError::EmptyTask);
        }
        let mut inner = self.inner.lock().await;
        let list = inner
            .store
            .get_mut(title)
            .ok_or_else(|| TasknestError::UnknownList(title.to_string()))?;
        list.tasks.push(text.to_string());
        Ok(())
    }

    /// Remove a task by position, returning the removed text.
    pub async fn remove_task(&self, title: &str, index: usize) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let list = inner
            .store
            .get_mut(title)
            .ok_or_else(|| TasknestError::UnknownList(title.to_string()))?;
        if index >= list.tasks.len() {
            return Err(TasknestError::TaskIndex {
                title: title.to_string(),
                index,
                len: list.tasks.len(),
            });
        }
        Ok(list.tasks.remove(index))
    }

    // ------------------------------------------------------------------
    // Reminder operations
    // ------------------------------------------------------------------

    /// Schedule the list's reminder. The persisted field is written only
    /// after the scheduler accepted the job, so a rejected schedule
    /// leaves the list untouched.
    pub async fn set_reminder(&self, title: &str, at: NaiveDateTime) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.store.contains(title) {
            return Err(TasknestError::UnknownList(title.to_string()));
        }
        inner.scheduler.schedule(title, at)?;
        if let Some(list) = inner.store.get_mut(title) {
            list.set_reminder(at);
        }
        inner.store.save()
    }

    /// Clear the list's reminder and cancel its job.
    pub async fn clear_reminder(&self, title: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let list = inner
            .store
            .get_mut(title)
            .ok_or_else(|| TasknestError::UnknownList(title.to_string()))?;
        if !list.has_reminder() {
            return Err(TasknestError::NoReminder(title.to_string()));
        }
        list.clear_reminder();
        inner.scheduler.cancel(title);
        inner.store.save()
    }

    /// Mark a list done: relabel every task with a check mark and drop
    /// the reminder (visual only, like the original).
    pub async fn mark_done(&self, title: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let list = inner
            .store
            .get_mut(title)
            .ok_or_else(|| TasknestError::UnknownList(title.to_string()))?;
        for task in &mut list.tasks {
            *task = format!("✔ {task}");
        }
        let had_reminder = list.has_reminder();
        list.clear_reminder();
        inner.scheduler.cancel(title);
        if had_reminder { inner.store.save() } else { Ok(()) }
    }

    /// Re-arm persisted reminders: future timestamps get a job, past or
    /// unparseable ones are cleared (missed reminders drop silently, no
    /// catch-up notification). Saves once if anything was cleared.
    pub async fn rearm_all(&self, now: NaiveDateTime) {
        let mut inner = self.inner.lock().await;
        let entries: Vec<(String, Option<NaiveDateTime>)> = inner
            .store
            .iter()
            .filter(|(_, list)| list.has_reminder())
            .map(|(title, list)| (title.clone(), list.reminder_at()))
            .collect();

        let mut armed = 0usize;
        let mut cleared = 0usize;
        for (title, at) in entries {
            let scheduled = match at {
                Some(at) if at > now => inner.scheduler.schedule(&title, at).is_ok(),
                _ => false,
            };
            if scheduled {
                armed += 1;
            } else {
                if let Some(list) = inner.store.get_mut(&title) {
                    list.clear_reminder();
                }
                cleared += 1;
            }
        }

        if cleared > 0
            && let Err(e) = inner.store.save()
        {
            tracing::warn!("⚠️ Failed to persist cleared reminders: {e}");
        }
        tracing::info!("⏰ Re-armed {armed} reminders, dropped {cleared} missed");
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Reload the snapshot from disk, replacing in-memory lists.
    pub async fn load(&self) {
        self.inner.lock().await.store.load();
    }

    /// Persist the whole snapshot.
    pub async fn save(&self) -> Result<()> {
        self.inner.lock().await.store.save()
    }

    // ------------------------------------------------------------------
    // Read surface (for the controller)
    // ------------------------------------------------------------------

    pub async fn list_titles(&self) -> Vec<String> {
        self.inner.lock().await.store.titles()
    }

    pub async fn tasks_of(&self, title: &str) -> Option<Vec<String>> {
        self.inner.lock().await.store.get(title).map(|l| l.tasks.clone())
    }

    /// The raw persisted reminder string ("" for none); None for an
    /// unknown list.
    pub async fn reminder_of(&self, title: &str) -> Option<String> {
        self.inner.lock().await.store.get(title).map(|l| l.reminder.clone())
    }

    pub async fn is_scheduled(&self, title: &str) -> bool {
        self.inner.lock().await.scheduler.is_scheduled(title)
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.scheduler.pending_count()
    }

    // ------------------------------------------------------------------
    // Fire path
    // ------------------------------------------------------------------

    /// Apply one fire event. Inside the critical section: claim the job
    /// (stale events are dropped), snapshot the live task preview, clear
    /// the persisted reminder, save. Outside it: deliver the
    /// notification (failures swallowed) and run the UI hook.
    async fn handle_fire(&self, event: FireEvent) {
        let fired = {
            let mut inner = self.inner.lock().await;
            let Some(job) = inner.scheduler.take_fired(&event.job_id, event.token) else {
                tracing::debug!("Stale fire event dropped: {}", event.job_id);
                return;
            };
            tracing::info!("🔔 Reminder fired: '{}'", job.title);
            let tasks = inner
                .store
                .get(&job.title)
                .map(|l| l.tasks.clone())
                .unwrap_or_default();
            if let Some(list) = inner.store.get_mut(&job.title) {
                list.clear_reminder();
            }
            if let Err(e) = inner.store.save() {
                tracing::warn!("⚠️ Failed to persist after fire: {e}");
            }
            (job.title, tasks)
        };

        let (title, tasks) = fired;
        let body = compose_body(&title, &tasks);
        if let Err(e) = self.sink.notify(&notification_title(&title), &body) {
            tracing::warn!("⚠️ Notification delivery failed for '{title}': {e}");
        }

        let hook = self.on_fired.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(&title);
        }
    }
}

/// Trimmed, non-empty title or a validation error.
fn validated_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TasknestError::EmptyTitle);
    }
    Ok(title.to_string())
}

/// Existing title (other than `exclude`) whose job id collides with
/// `candidate`'s, if any.
fn collision_of(store: &ListStore, candidate: &str, exclude: Option<&str>) -> Option<String> {
    let id = JobId::derive(candidate);
    store
        .iter()
        .map(|(title, _)| title)
        .find(|title| {
            title.as_str() != candidate
                && Some(title.as_str()) != exclude
                && JobId::derive(title) == id
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{FailingSink, RecordingSink};
    use chrono::Duration;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tasknest-test-svc-{name}.json"));
        std::fs::remove_file(&path).ok();
        path
    }

    fn recording_service(name: &str) -> (TodoService, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let svc = TodoService::new(&temp_path(name), sink.clone());
        (svc, sink)
    }

    #[tokio::test]
    async fn create_validations() {
        let (svc, _) = recording_service("create");
        assert!(matches!(
            svc.create_list("  ").await.unwrap_err(),
            TasknestError::EmptyTitle
        ));
        svc.create_list("Work").await.unwrap();
        assert!(matches!(
            svc.create_list("Work").await.unwrap_err(),
            TasknestError::DuplicateTitle(_)
        ));
        // "Work log" and "Work\tlog" normalize to the same job id.
        svc.create_list("Work log").await.unwrap();
        assert!(matches!(
            svc.create_list("Work\tlog").await.unwrap_err(),
            TasknestError::TitleCollision { .. }
        ));
    }

    #[tokio::test]
    async fn tasks_keep_order_and_duplicates() {
        let (svc, _) = recording_service("tasks");
        svc.create_list("L").await.unwrap();
        svc.add_task("L", "a").await.unwrap();
        svc.add_task("L", "b").await.unwrap();
        svc.add_task("L", "a").await.unwrap();
        assert_eq!(svc.tasks_of("L").await.unwrap(), vec!["a", "b", "a"]);
        assert_eq!(svc.remove_task("L", 1).await.unwrap(), "b");
        assert_eq!(svc.tasks_of("L").await.unwrap(), vec!["a", "a"]);
        assert!(matches!(
            svc.remove_task("L", 5).await.unwrap_err(),
            TasknestError::TaskIndex { .. }
        ));
        assert!(matches!(
            svc.add_task("Nope", "x").await.unwrap_err(),
            TasknestError::UnknownList(_)
        ));
    }

    #[tokio::test]
    async fn past_reminder_leaves_list_untouched() {
        let (svc, _) = recording_service("past");
        svc.create_list("Work").await.unwrap();
        let err = svc
            .set_reminder("Work", local_now() - Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TasknestError::PastTimestamp(_)));
        assert_eq!(svc.reminder_of("Work").await.unwrap(), "");
        assert!(!svc.is_scheduled("Work").await);
    }

    #[tokio::test]
    async fn reschedule_replaces_never_duplicates() {
        let (svc, _) = recording_service("replace");
        svc.create_list("Work").await.unwrap();
        let f2 = local_now() + Duration::hours(2);
        svc.set_reminder("Work", local_now() + Duration::hours(1))
            .await
            .unwrap();
        svc.set_reminder("Work", f2).await.unwrap();
        assert_eq!(svc.pending_count().await, 1);
        let inner = svc.inner.lock().await;
        assert_eq!(inner.scheduler.fire_time_for("Work"), Some(f2));
    }

    #[tokio::test]
    async fn clear_reminder_cancels_job() {
        let (svc, _) = recording_service("clear");
        svc.create_list("Work").await.unwrap();
        assert!(matches!(
            svc.clear_reminder("Work").await.unwrap_err(),
            TasknestError::NoReminder(_)
        ));
        svc.set_reminder("Work", local_now() + Duration::hours(1))
            .await
            .unwrap();
        svc.clear_reminder("Work").await.unwrap();
        assert_eq!(svc.reminder_of("Work").await.unwrap(), "");
        assert_eq!(svc.pending_count().await, 0);
    }

    #[tokio::test]
    async fn rename_moves_job_and_keeps_timestamp() {
        let (svc, _) = recording_service("rename");
        svc.create_list("Groceries").await.unwrap();
        let at = local_now() + Duration::hours(1);
        svc.set_reminder("Groceries", at).await.unwrap();
        let persisted = svc.reminder_of("Groceries").await.unwrap();

        svc.rename_list("Groceries", "Shopping").await.unwrap();
        assert!(!svc.is_scheduled("Groceries").await);
        assert!(svc.is_scheduled("Shopping").await);
        assert_eq!(svc.reminder_of("Shopping").await.unwrap(), persisted);
        let inner = svc.inner.lock().await;
        assert_eq!(inner.scheduler.fire_time_for("Shopping"), Some(at));
    }

    #[tokio::test]
    async fn delete_cancels_and_nothing_fires() {
        let (svc, sink) = recording_service("delete");
        svc.start().await;
        svc.create_list("Doomed").await.unwrap();
        svc.set_reminder("Doomed", local_now() + Duration::milliseconds(200))
            .await
            .unwrap();
        svc.delete_list("Doomed").await.unwrap();
        assert_eq!(svc.pending_count().await, 0);
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        assert!(sink.sent.lock().unwrap().is_empty());
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn fire_clears_reminder_even_when_sink_fails() {
        let path = temp_path("failsink");
        let svc = TodoService::new(&path, Arc::new(FailingSink));
        svc.start().await;
        svc.create_list("Work").await.unwrap();
        svc.set_reminder("Work", local_now() + Duration::milliseconds(200))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(700)).await;
        assert_eq!(svc.reminder_of("Work").await.unwrap(), "");
        assert_eq!(svc.pending_count().await, 0);
        // The cleared state was persisted by the fire handler.
        let reloaded = ListStore::open(&path);
        assert_eq!(reloaded.get("Work").unwrap().reminder, "");
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn mark_done_relabels_and_drops_reminder() {
        let (svc, _) = recording_service("done");
        svc.create_list("Chores").await.unwrap();
        svc.add_task("Chores", "sweep").await.unwrap();
        svc.set_reminder("Chores", local_now() + Duration::hours(1))
            .await
            .unwrap();
        svc.mark_done("Chores").await.unwrap();
        assert_eq!(svc.tasks_of("Chores").await.unwrap(), vec!["✔ sweep"]);
        assert_eq!(svc.reminder_of("Chores").await.unwrap(), "");
        assert_eq!(svc.pending_count().await, 0);
    }

    #[tokio::test]
    async fn rearm_schedules_future_and_drops_past() {
        let path = temp_path("rearm");
        // Seed a snapshot by hand: one future, one past, one garbage.
        {
            let mut store = ListStore::open(&path);
            store.insert("Future");
            store
                .get_mut("Future")
                .unwrap()
                .set_reminder(local_now() + Duration::hours(1));
            store.insert("Past");
            store
                .get_mut("Past")
                .unwrap()
                .set_reminder(local_now() - Duration::seconds(1));
            store.insert("Garbage");
            store.get_mut("Garbage").unwrap().reminder = "not a date".into();
            store.save().unwrap();
        }

        let (svc, _) = {
            let sink = Arc::new(RecordingSink::new());
            (TodoService::new(&path, sink.clone()), sink)
        };
        svc.start().await;
        assert_eq!(svc.pending_count().await, 1);
        assert!(svc.is_scheduled("Future").await);
        assert_eq!(svc.reminder_of("Past").await.unwrap(), "");
        assert_eq!(svc.reminder_of("Garbage").await.unwrap(), "");
        // The drops were persisted.
        let reloaded = ListStore::open(&path);
        assert_eq!(reloaded.get("Past").unwrap().reminder, "");
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn on_fired_hook_runs_after_clear() {
        let (svc, _) = recording_service("hook");
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_in_hook = seen.clone();
        svc.set_on_fired(Arc::new(move |title| {
            seen_in_hook.lock().unwrap().push(title.to_string());
        }));
        svc.start().await;
        svc.create_list("Pings").await.unwrap();
        svc.set_reminder("Pings", local_now() + Duration::milliseconds(200))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(700)).await;
        assert_eq!(seen.lock().unwrap().as_slice(), ["Pings"]);
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn errands_scenario_end_to_end() {
        let (svc, sink) = recording_service("errands");
        svc.start().await;
        svc.create_list("Errands").await.unwrap();
        svc.add_task("Errands", "Buy milk").await.unwrap();
        svc.add_task("Errands", "Pay bills").await.unwrap();
        svc.set_reminder("Errands", local_now() + Duration::seconds(2))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (title, body) = &sent[0];
        assert_eq!(title, "Reminder — Errands");
        assert!(body.contains(&"- Buy milk".to_string()));
        assert!(body.contains(&"- Pay bills".to_string()));
        drop(sent);

        assert_eq!(svc.reminder_of("Errands").await.unwrap(), "");
        assert_eq!(svc.pending_count().await, 0);
        svc.shutdown().await;
    }
}
