//! # Tasknest Scheduler
//!
//! To-do lists with at most one schedulable one-shot reminder each.
//!
//! ## Architecture
//! ```text
//! TodoService (one lock over store + scheduler)
//!   ├── ListStore: title → {tasks, reminder}, JSON snapshot on disk
//!   ├── ReminderScheduler: JobId → one tokio timer per list
//!   │     └── on elapse → FireEvent over mpsc
//!   └── fire consumer (single task)
//!         ├── claim job (stale events dropped)
//!         ├── clear persisted reminder + save
//!         └── NotificationSink (desktop, fire-and-forget)
//! ```
//!
//! Jobs are never persisted: they are derived from each list's saved
//! reminder timestamp and rebuilt by the startup re-arm pass.

pub mod jobs;
pub mod scheduler;
pub mod service;
pub mod sink;
pub mod store;

pub use jobs::{FireEvent, JobId, ReminderJob};
pub use scheduler::{ReminderScheduler, local_now};
pub use service::{FiredHook, TodoService};
pub use sink::{DesktopSink, NotificationSink, NullSink, PREVIEW_TASKS};
pub use store::{ListStore, TaskList};
