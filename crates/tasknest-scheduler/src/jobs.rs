//! Job identity — the mapping from a list title to its reminder job.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Prefix of every reminder job identifier.
const JOB_ID_PREFIX: &str = "reminder__";

/// A stable identifier for a list's reminder job, derived from the list
/// title. Deriving is pure and total: every whitespace character in the
/// title maps to an underscore and the result is prefixed with
/// `reminder__`. Two titles that differ only in whitespace style would
/// collide, which is why list creation rejects such titles up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Derive the job id for a list title.
    pub fn derive(title: &str) -> Self {
        let normalized: String = title
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        Self(format!("{JOB_ID_PREFIX}{normalized}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pending one-shot reminder, as tracked by the scheduler. Holds the
/// list *title*, never a copy of its tasks — the notification body is
/// read from the live store at fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderJob {
    pub title: String,
    pub fire_at: NaiveDateTime,
}

/// Message sent by a timer task when its sleep elapses. The token lets
/// the consumer reject events from timers that were cancelled or
/// replaced after the send was already queued.
#[derive(Debug, Clone)]
pub struct FireEvent {
    pub job_id: JobId,
    pub token: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(JobId::derive("Groceries"), JobId::derive("Groceries"));
        assert_eq!(JobId::derive("My List").as_str(), "reminder__My_List");
    }

    #[test]
    fn all_whitespace_kinds_normalize() {
        assert_eq!(JobId::derive("a b").as_str(), "reminder__a_b");
        assert_eq!(JobId::derive("a\tb").as_str(), "reminder__a_b");
        assert_eq!(JobId::derive("a\nb").as_str(), "reminder__a_b");
    }

    #[test]
    fn whitespace_variants_collide() {
        // The accepted collision risk the store guards against at creation.
        assert_eq!(JobId::derive("a b"), JobId::derive("a\tb"));
        assert_ne!(JobId::derive("a b"), JobId::derive("ab"));
    }
}
