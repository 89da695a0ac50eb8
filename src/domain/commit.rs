use crate::domain::ticket::extract_ticket_ids;
use chrono::{DateTime, Utc};

/// A commit read from history. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub author_name: String,
    pub author_date: DateTime<Utc>,
    pub subject_line: String,
    /// Full message, subject included.
    pub message: String,
    pub ticket_ids: Vec<String>,
}

impl CommitRecord {
    /// Build a record, scanning the whole message for ticket ids.
    pub fn new(
        sha: impl Into<String>,
        author_name: impl Into<String>,
        author_date: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let subject_line = message.lines().next().unwrap_or_default().trim().to_string();
        let ticket_ids = extract_ticket_ids(&message);
        CommitRecord {
            sha: sha.into(),
            author_name: author_name.into(),
            author_date,
            subject_line,
            message,
            ticket_ids,
        }
    }

    pub fn short_sha(&self) -> &str {
        short_sha(&self.sha)
    }
}

/// First 8 characters of a sha, or the whole thing if shorter.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}
