//! Exports [`generate`] and [`rebuild_index`], which stitch together the
//! high-level steps: listing commits ([`crate::github`]), classifying them
//! ([`crate::classify`]), writing posts for commits that don't have one yet
//! ([`crate::write`]), and rebuilding the index ([`crate::index`]).
//!
//! Which commits already have a post is decided by listing the posts
//! directory at the start of each run (see [`known_posts`]); the file system
//! is the only state.

use crate::classify::{Classifier, PostCategory};
use crate::commit::CommitSource;
use crate::config::Config;
use crate::index::{Error as IndexError, Index, IndexBuilder};
use crate::post::{id_from_file_name, BlogPost};
use crate::template::{Error as TemplateError, PageTemplate, INDEX_FIELDS, POST_FIELDS};
use crate::write::{Error as WriteError, PostWriter};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// What a [`generate`] run did.
#[derive(Debug)]
pub struct Report {
    /// The number of commits listed by the source.
    pub fetched: usize,

    /// Documentation-only commits that were skipped.
    pub excluded: usize,

    /// Commits that already had a post.
    pub existing: usize,

    /// Posts written during this run, in commit order.
    pub written: Vec<BlogPost>,

    /// The outcome of the index rebuild. [`IndexError::EmptyDirectory`] is
    /// reported here rather than failing the run.
    pub index: IndexOutcome,
}

#[derive(Debug)]
pub enum IndexOutcome {
    Written(Index),

    /// No valid post was found; the index file was left untouched.
    Empty,
}

/// Fetches commits from `source`, writes a post for every classified commit
/// that doesn't have one yet, and rebuilds the index.
pub fn generate<S: CommitSource>(config: &Config, source: &S) -> Result<Report> {
    // Load both templates first so a configuration problem fails before any
    // network traffic or output.
    let post_template = PageTemplate::load(&config.post_template, POST_FIELDS)?;
    let index_template = PageTemplate::load(&config.index_template, INDEX_FIELDS)?;

    let commits = source
        .fetch_commits()
        .map_err(|err| Error::Source(Box::new(err)))?;
    tracing::info!(count = commits.len(), "listed commits");

    std::fs::create_dir_all(&config.posts_directory).map_err(|err| Error::Io {
        path: config.posts_directory.clone(),
        err,
    })?;
    let mut known = known_posts(&config.posts_directory)?;

    let classifier = Classifier::default();
    let writer = PostWriter {
        template: &post_template,
        posts_directory: &config.posts_directory,
        site_name: &config.site_name,
    };

    let mut report = Report {
        fetched: commits.len(),
        excluded: 0,
        existing: 0,
        written: Vec::new(),
        index: IndexOutcome::Empty,
    };
    for commit in &commits {
        let category = classifier.classify(commit);
        if category == PostCategory::Excluded {
            tracing::debug!(sha = commit.short_id(), subject = commit.subject(), "excluded");
            report.excluded += 1;
            continue;
        }
        if known.contains(commit.short_id()) {
            tracing::debug!(sha = commit.short_id(), "post exists");
            report.existing += 1;
            continue;
        }

        let post = writer.write(commit, category)?;
        tracing::info!(
            category = %category,
            file = %post.file_name,
            "wrote post"
        );
        known.insert(post.id.clone());
        report.written.push(post);
    }

    report.index = write_index(config, &index_template)?;
    Ok(report)
}

/// Rebuilds the index from the posts directory without contacting the
/// commit source.
pub fn rebuild_index(config: &Config) -> Result<IndexOutcome> {
    let index_template = PageTemplate::load(&config.index_template, INDEX_FIELDS)?;
    write_index(config, &index_template)
}

fn write_index(config: &Config, index_template: &PageTemplate) -> Result<IndexOutcome> {
    let builder = IndexBuilder {
        posts_directory: &config.posts_directory,
        post_template: &config.post_template,
        index_template,
        index_output: &config.index_output,
        posts_url: &config.posts_url,
        site_name: &config.site_name,
    };
    match builder.rebuild() {
        Ok(index) => Ok(IndexOutcome::Written(index)),
        Err(IndexError::EmptyDirectory { path, .. }) => {
            tracing::warn!(
                directory = %path.display(),
                "no valid posts found; leaving the index untouched"
            );
            Ok(IndexOutcome::Empty)
        }
        Err(err) => Err(err.into()),
    }
}

/// The short ids of the commits that already have a post in `dir`.
pub fn known_posts(dir: &Path) -> Result<HashSet<String>> {
    let io_err = |err| Error::Io {
        path: dir.to_owned(),
        err,
    };
    let mut known = HashSet::new();
    for result in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = result.map_err(io_err)?;
        if let Some(id) = id_from_file_name(&entry.path()) {
            known.insert(id);
        }
    }
    Ok(known)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for a run. Errors can come from listing commits, loading
/// templates, writing posts, building the index, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned when the commit source fails.
    Source(Box<dyn std::error::Error + Send + Sync>),

    /// Returned for template loading errors.
    Template(TemplateError),

    /// Returned for errors writing posts.
    Write(WriteError),

    /// Returned for errors building the index (other than an empty posts
    /// directory).
    Index(IndexError),

    /// Returned for I/O problems with the posts directory.
    Io { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Source(err) => write!(f, "Listing commits: {}", err),
            Error::Template(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Index(err) => write!(f, "Building index: {}", err),
            Error::Io { path, err } => write!(f, "'{}': {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Source(err) => Some(err.as_ref()),
            Error::Template(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Index(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}

impl From<TemplateError> for Error {
    /// Converts [`TemplateError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: TemplateError) -> Error {
        Error::Template(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<IndexError> for Error {
    /// Converts [`IndexError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: IndexError) -> Error {
        Error::Index(err)
    }
}
