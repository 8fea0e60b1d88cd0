//! Defines the [`CommitRecord`] type and the [`CommitSource`] trait which
//! abstracts over where commits come from: the GitHub API
//! ([`crate::github::GitHubSource`]) or a local clone
//! ([`crate::git::GitLogSource`]). Tests substitute an in-memory list.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use url::Url;

/// The number of leading sha characters used to identify a commit's post.
pub const SHORT_ID_LEN: usize = 8;

/// A single commit as reported by the repository host. Commit records are
/// never modified after they are fetched.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitRecord {
    /// The full commit hash.
    pub sha: String,

    /// The full commit message, subject line first.
    pub message: String,

    /// The author timestamp.
    pub timestamp: DateTime<Utc>,

    /// The author's display name.
    pub author: String,

    /// The commit's page on the repository host, if known.
    pub url: Option<Url>,

    /// Paths touched by the commit. Empty when the source doesn't report
    /// them.
    pub files: Vec<String>,
}

impl CommitRecord {
    /// The short identifier used to name the commit's post file.
    pub fn short_id(&self) -> &str {
        match self.sha.char_indices().nth(SHORT_ID_LEN) {
            Some((i, _)) => &self.sha[..i],
            None => &self.sha,
        }
    }

    /// The first line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    /// Everything after the subject line, with surrounding blank lines
    /// removed.
    pub fn body(&self) -> &str {
        match self.message.find('\n') {
            Some(i) => self.message[i + 1..].trim(),
            None => "",
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// The start of a listing window reaching `days` days back from `now`, or
/// `None` when `days` is negative or too large to represent.
pub fn window_start(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    if days < 0 {
        return None;
    }
    Duration::try_days(days).and_then(|window| now.checked_sub_signed(window))
}

/// Anything that can list the commits of a repository, newest first.
pub trait CommitSource {
    /// The error type returned when the listing fails. A failed listing
    /// aborts the whole run.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the commits, newest first as reported by the host.
    fn fetch_commits(&self) -> Result<Vec<CommitRecord>, Self::Error>;
}
