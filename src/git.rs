//! A [`CommitSource`] that reads the history of a local clone, so posts can
//! be generated without network access or API rate limits. Commits are
//! listed from `HEAD`, newest first, together with the paths each one
//! touched.

use crate::commit::{window_start, CommitRecord, CommitSource};
use crate::github::Repository as GitHubRepository;
use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, Repository, Sort};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Lists commits from a local git repository.
pub struct GitLogSource {
    /// Any path inside the working tree; the repository is discovered from
    /// it.
    path: PathBuf,

    since: Option<DateTime<Utc>>,

    /// Where the commit pages live, e.g.
    /// `https://github.com/kiangentry/EYN-OS/commit/`.
    commit_base: Option<Url>,
}

impl GitLogSource {
    pub fn new(
        path: PathBuf,
        days_back: Option<i64>,
        repository: Option<&GitHubRepository>,
    ) -> Result<GitLogSource> {
        let since = match days_back {
            None => None,
            Some(days) => Some(
                window_start(Utc::now(), days).ok_or(Error::InvalidDaysBack(days))?,
            ),
        };
        let commit_base = match repository {
            Some(repo) => Some(Url::parse(&format!(
                "https://github.com/{}/{}/commit/",
                repo.owner, repo.name
            ))?),
            None => None,
        };
        Ok(GitLogSource {
            path,
            since,
            commit_base,
        })
    }

    fn record(&self, repo: &Repository, commit: &Commit) -> Result<Option<CommitRecord>> {
        let sha = commit.id().to_string();
        let author = commit.author();
        let timestamp = match Utc.timestamp_opt(author.when().seconds(), 0).single() {
            Some(timestamp) => timestamp,
            None => {
                tracing::warn!(%sha, "skipping commit with an unrepresentable date");
                return Ok(None);
            }
        };
        let url = match &self.commit_base {
            Some(base) => Some(base.join(&sha)?),
            None => None,
        };
        Ok(Some(CommitRecord {
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            timestamp,
            author: author.name().unwrap_or("Unknown").to_owned(),
            url,
            files: changed_files(repo, commit)?,
            sha,
        }))
    }
}

impl CommitSource for GitLogSource {
    type Error = Error;

    fn fetch_commits(&self) -> Result<Vec<CommitRecord>> {
        let repo = Repository::discover(&self.path).map_err(|err| Error::Open {
            path: self.path.clone(),
            err,
        })?;
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        revwalk.push_head()?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;

            // sorted by committer time, so nothing older follows
            if let Some(since) = self.since {
                if commit.time().seconds() < since.timestamp() {
                    break;
                }
            }

            if let Some(record) = self.record(&repo, &commit)? {
                commits.push(record);
            }
        }

        tracing::info!(
            path = %self.path.display(),
            count = commits.len(),
            "read commits from local history"
        );
        Ok(commits)
    }
}

/// The paths a commit adds, modifies or deletes relative to its first
/// parent (or to the empty tree for a root commit).
fn changed_files(repo: &Repository, commit: &Commit) -> Result<Vec<String>> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parent_count() {
        0 => None,
        _ => Some(commit.parent(0)?.tree()?),
    };
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    Ok(diff
        .deltas()
        .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
        .map(|path| path.display().to_string())
        .collect())
}

/// The result of a fallible local history operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to read the local history.
#[derive(Debug)]
pub enum Error {
    /// Returned when no repository contains the configured path.
    Open { path: PathBuf, err: git2::Error },

    /// Returned when walking the history fails, including when the
    /// repository has no commits yet.
    Git(git2::Error),

    /// Returned when the listing window can't be represented as a date.
    InvalidDaysBack(i64),

    /// Returned when a commit URL can't be built.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => write!(
                f,
                "Opening git repository at '{}': {}",
                path.display(),
                err.message()
            ),
            Error::Git(err) => write!(f, "Reading git history: {}", err.message()),
            Error::InvalidDaysBack(days) => {
                write!(f, "Can't list commits from {} days back", days)
            }
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Git(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::InvalidDaysBack(_) => None,
        }
    }
}

impl From<git2::Error> for Error {
    /// Converts a [`git2::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator while walking the history.
    fn from(err: git2::Error) -> Error {
        Error::Git(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;
    use git2::{Signature, Time};
    use std::fs;
    use std::path::Path;

    /// Writes `files` into the working tree and commits them at `when`.
    fn commit_at(repo: &Repository, files: &[(&str, &str)], message: &str, when: DateTime<Utc>) {
        let root = repo.workdir().unwrap();
        let mut index = repo.index().unwrap();
        for (name, contents) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, contents).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new(
            "Ada Lovelace",
            "ada@example.com",
            &Time::new(when.timestamp(), 0),
        )
        .unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .map(|oid| repo.find_commit(oid).unwrap());
        let parents: Vec<&Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_fetch_commits() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path())?;
        let now = Utc::now();
        commit_at(
            &repo,
            &[("kernel/sched.c", "int x;")],
            "Add scheduler\n\nRound robin.",
            now - Duration::days(400),
        );
        commit_at(
            &repo,
            &[("kernel/sched.c", "int y;"), ("kernel/fat32.c", "")],
            "Fix scheduler",
            now - Duration::days(2),
        );
        commit_at(&repo, &[("README.md", "hi")], "Release 13", now - Duration::days(1));

        let repository: GitHubRepository = "kiangentry/EYN-OS".parse().unwrap();
        let source = GitLogSource::new(dir.path().to_owned(), None, Some(&repository))?;
        let commits = source.fetch_commits()?;

        let subjects: Vec<&str> = commits.iter().map(|c| c.subject()).collect();
        assert_eq!(vec!["Release 13", "Fix scheduler", "Add scheduler"], subjects);
        assert_eq!(vec!["kernel/fat32.c", "kernel/sched.c"], commits[1].files);
        assert_eq!(vec!["kernel/sched.c"], commits[2].files);
        assert_eq!("Round robin.", commits[2].body());
        assert_eq!("Ada Lovelace", commits[0].author);
        assert_eq!(
            format!(
                "https://github.com/kiangentry/EYN-OS/commit/{}",
                commits[0].sha
            ),
            commits[0].url.as_ref().unwrap().as_str()
        );
        Ok(())
    }

    #[test]
    fn test_window() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path())?;
        let now = Utc::now();
        commit_at(&repo, &[("a.c", "")], "Add a", now - Duration::days(400));
        commit_at(&repo, &[("b.c", "")], "Add b", now - Duration::days(3));

        let source = GitLogSource::new(dir.path().to_owned(), Some(120), None)?;
        let commits = source.fetch_commits()?;
        assert_eq!(1, commits.len());
        assert_eq!("Add b", commits[0].subject());
        assert_eq!(None, commits[0].url);
        Ok(())
    }

    #[test]
    fn test_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let source = GitLogSource::new(dir.path().join("missing"), None, None).unwrap();
        assert!(matches!(source.fetch_commits(), Err(Error::Open { .. })));
    }

    #[test]
    fn test_invalid_days_back() {
        assert!(matches!(
            GitLogSource::new(PathBuf::from("."), Some(-1), None),
            Err(Error::InvalidDaysBack(-1))
        ));
    }
}
