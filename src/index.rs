//! Rebuilds the blog index from the post files on disk. Every run scans the
//! posts directory, reads the display metadata back out of each rendered
//! post, and renders the index template over the result; nothing is cached
//! between runs, so the index always reflects exactly the files present.
//!
//! A post is read through four markers which the post template is expected
//! to emit:
//!
//! * the first `<h1>` element (title)
//! * an element with class `post-date` (`%Y-%m-%d` or `%B %Y`)
//! * an element with class `post-tags` (comma-separated)
//! * an element with class `post-intro` (excerpt)
//!
//! Documents missing any of these, or that can't be read as UTF-8, are
//! skipped with an [`ExtractionWarning`].

use crate::post::{dedup_tags, HTML_EXTENSION, TAG_DELIMITER};
use crate::template::{Error as TemplateError, PageTemplate};
use crate::util::write_atomic;
use chrono::NaiveDate;
use gtmpl::Value;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One post as listed on the index page.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    /// Title markup as found in the post.
    pub title: String,
    pub date: NaiveDate,
    pub tags: Vec<String>,

    /// Excerpt markup as found in the post.
    pub excerpt: String,

    /// The post's URL relative to the index page.
    pub link: String,
    pub file_name: String,
}

impl IndexEntry {
    fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert(
            "date".to_owned(),
            Value::String(self.date.format("%Y-%m-%d").to_string()),
        );
        m.insert(
            "month".to_owned(),
            Value::String(self.date.format("%B %Y").to_string()),
        );
        m.insert(
            "tags".to_owned(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        m.insert("tags_text".to_owned(), Value::String(self.tags.join(", ")));
        m.insert("excerpt".to_owned(), Value::String(self.excerpt.clone()));
        m.insert("link".to_owned(), Value::String(self.link.clone()));
        m.insert("file_name".to_owned(), Value::String(self.file_name.clone()));
        Value::Object(m)
    }
}

/// A document that couldn't be read back and was left out of the index.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "skipping '{}': {}", self.path.display(), self.reason)
    }
}

/// The outcome of scanning the posts directory: the entries in display
/// order and the documents that were skipped.
#[derive(Debug)]
pub struct Index {
    pub entries: Vec<IndexEntry>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Builds and writes the index page.
pub struct IndexBuilder<'a> {
    /// The directory holding the rendered posts.
    pub posts_directory: &'a Path,

    /// Excluded from the scan when it lives in `posts_directory`.
    pub post_template: &'a Path,

    pub index_template: &'a PageTemplate,

    /// The file the index is written to.
    pub index_output: &'a Path,

    /// Prefix for entry links, e.g. `blog/`.
    pub posts_url: &'a str,

    pub site_name: &'a str,
}

impl IndexBuilder<'_> {
    /// Scans the posts directory. Fails with [`Error::EmptyDirectory`] when
    /// no document survives extraction.
    pub fn build(&self) -> Result<Index> {
        let mut entries = Vec::new();
        let mut warnings = Vec::new();
        let extractor = Extractor::new();

        for path in self.post_files()? {
            let extracted = fs::read_to_string(&path)
                .map_err(|err| err.to_string())
                .and_then(|contents| extractor.extract(&contents));
            match extracted {
                Ok(post) => entries.push(self.entry(&path, post)),
                Err(reason) => {
                    let warning = ExtractionWarning { path, reason };
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        if entries.is_empty() {
            return Err(Error::EmptyDirectory {
                path: self.posts_directory.to_owned(),
                warnings,
            });
        }

        entries.sort_by(newest_first);
        Ok(Index { entries, warnings })
    }

    /// Renders the index page without touching the file system.
    pub fn render(&self, index: &Index) -> Result<Vec<u8>> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "posts".to_owned(),
            Value::Array(index.entries.iter().map(IndexEntry::to_value).collect()),
        );
        m.insert(
            "count".to_owned(),
            Value::String(index.entries.len().to_string()),
        );
        m.insert(
            "site_name".to_owned(),
            Value::String(crate::markdown::escape(self.site_name)),
        );
        Ok(self.index_template.render(Value::Object(m))?)
    }

    /// Renders the index and replaces the index file. The file is only
    /// touched once rendering has succeeded.
    pub fn write(&self, index: &Index) -> Result<()> {
        let html = self.render(index)?;
        write_atomic(self.index_output, &html).map_err(|err| Error::Io {
            path: self.index_output.to_owned(),
            err,
        })
    }

    /// Scans and writes in one step.
    pub fn rebuild(&self) -> Result<Index> {
        let index = self.build()?;
        self.write(&index)?;
        tracing::info!(
            posts = index.entries.len(),
            skipped = index.warnings.len(),
            output = %self.index_output.display(),
            "wrote blog index"
        );
        Ok(index)
    }

    /// The HTML files directly inside the posts directory, minus the post
    /// template.
    fn post_files(&self) -> Result<Vec<PathBuf>> {
        let template = fs::canonicalize(self.post_template).ok();
        let mut files = Vec::new();
        for result in WalkDir::new(self.posts_directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = result?;
            let is_html = entry
                .file_name()
                .to_str()
                .map_or(false, |name| name.ends_with(HTML_EXTENSION));
            if !entry.file_type().is_file() || !is_html {
                continue;
            }
            if template.is_some() && fs::canonicalize(entry.path()).ok() == template {
                continue;
            }
            files.push(entry.into_path());
        }
        Ok(files)
    }

    fn entry(&self, path: &Path, post: ExtractedPost) -> IndexEntry {
        // `post_files` only yields UTF-8 names
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_owned();
        IndexEntry {
            title: post.title,
            date: post.date,
            tags: post.tags,
            excerpt: post.excerpt,
            link: format!("{}{}", self.posts_url, file_name),
            file_name,
        }
    }
}

/// Date descending, then file name descending.
fn newest_first(a: &IndexEntry, b: &IndexEntry) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| b.file_name.cmp(&a.file_name))
}

struct ExtractedPost {
    title: String,
    date: NaiveDate,
    tags: Vec<String>,
    excerpt: String,
}

/// Reads post metadata back out of rendered HTML.
struct Extractor {
    title: Regex,
    date: Regex,
    tags: Regex,
    intro: Regex,
}

impl Extractor {
    fn new() -> Extractor {
        // The patterns are constants; see the tests below.
        Extractor {
            title: marker(r"<h1(?:\s[^>]*)?>(.*?)</h1\s*>"),
            date: marker(&class_marker("post-date")),
            tags: marker(&class_marker("post-tags")),
            intro: marker(&class_marker("post-intro")),
        }
    }

    fn extract(&self, html: &str) -> std::result::Result<ExtractedPost, String> {
        let find = |re: &Regex, what: &str| {
            re.captures(html)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_owned())
                .ok_or_else(|| format!("missing {}", what))
        };

        let title = find(&self.title, "<h1> title")?;
        let date = find(&self.date, "post-date")?;
        let tags = find(&self.tags, "post-tags")?;
        let excerpt = find(&self.intro, "post-intro")?;

        Ok(ExtractedPost {
            title,
            date: parse_date(&date).ok_or_else(|| format!("unrecognized date `{}`", date))?,
            tags: dedup_tags(tags.split(TAG_DELIMITER)),
            excerpt,
        })
    }
}

fn marker(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("extraction pattern compiles")
}

/// Matches the content of the first element whose `class` attribute
/// contains `class`, up to the next closing tag.
fn class_marker(class: &str) -> String {
    format!(
        r#"<[a-z][a-z0-9]*\s[^>]*\bclass\s*=\s*["'][^"']*\b{}\b[^"']*["'][^>]*>(.*?)</"#,
        regex::escape(class)
    )
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("1 {}", s), "%d %B %Y").ok())
}

/// The result of a fallible index operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem building the index.
#[derive(Debug)]
pub enum Error {
    /// Returned when no post survived extraction. Carries the warnings for
    /// the documents that were skipped, if any.
    EmptyDirectory {
        path: PathBuf,
        warnings: Vec<ExtractionWarning>,
    },

    /// Returned when the index template can't be executed.
    Template(TemplateError),

    /// Returned for I/O errors reading posts or writing the index.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when listing the posts directory fails.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptyDirectory { path, warnings } => write!(
                f,
                "No valid posts in '{}' ({} skipped)",
                path.display(),
                warnings.len()
            ),
            Error::Template(err) => err.fmt(f),
            Error::Io { path, err } => write!(f, "'{}': {}", path.display(), err),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::EmptyDirectory { .. } => None,
            Error::Template(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Error {
        Error::Template(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator while listing posts.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
