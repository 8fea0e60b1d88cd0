//! Loads the post and index templates. Templates use `gtmpl` (Go
//! `text/template`) syntax, e.g. `<h1>{{.title}}</h1>`. A template must
//! reference every field its page needs; a template that doesn't is rejected
//! up front rather than silently producing posts the index can't read back.

use gtmpl::{Context, Template, Value};
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Fields the post template must reference. Each entry lists alternatives;
/// one of them is enough.
pub const POST_FIELDS: &[&[&str]] = &[
    &["title"],
    &["date"],
    &["tags", "tags_text"],
    &["intro"],
    &["content"],
];

/// Fields the index template must reference.
pub const INDEX_FIELDS: &[&[&str]] = &[&["posts"]];

/// A parsed template together with the file it came from.
pub struct PageTemplate {
    path: PathBuf,
    template: Template,
}

impl PageTemplate {
    /// Reads and parses the template at `path`, checking that it references
    /// each of `required` (see [`POST_FIELDS`]).
    pub fn load(path: &Path, required: &[&[&str]]) -> Result<PageTemplate> {
        let mut contents = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|err| Error::TemplateMissing {
                path: path.to_owned(),
                err,
            })?;
        PageTemplate::parse(path, &contents, required)
    }

    /// Parses `contents` as a template. `path` is only used for error
    /// messages.
    pub fn parse(path: &Path, contents: &str, required: &[&[&str]]) -> Result<PageTemplate> {
        let malformed = |reason: String| Error::MalformedTemplate {
            path: path.to_owned(),
            reason,
        };

        let missing: Vec<&str> = required
            .iter()
            .filter(|alternatives| !alternatives.iter().any(|f| references(contents, f)))
            .map(|alternatives| alternatives[0])
            .collect();
        if !missing.is_empty() {
            return Err(malformed(format!(
                "missing required placeholders: {}",
                missing.join(", ")
            )));
        }

        let mut template = Template::default();
        template
            .parse(contents)
            .map_err(|err| malformed(err.to_string()))?;
        Ok(PageTemplate {
            path: path.to_owned(),
            template,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Executes the template against `value`, returning the rendered bytes.
    pub fn render(&self, value: Value) -> Result<Vec<u8>> {
        let render_err = |reason: String| Error::Render {
            path: self.path.clone(),
            reason,
        };
        let context = Context::from(value).map_err(|err| render_err(err.to_string()))?;
        let mut out = Vec::new();
        self.template
            .execute(&mut out, &context)
            .map_err(|err| render_err(err.to_string()))?;
        Ok(out)
    }
}

/// Whether some `{{ ... }}` action in `contents` mentions `.field`.
fn references(contents: &str, field: &str) -> bool {
    let pattern = format!(r"\{{\{{[^}}]*\.{}\b[^}}]*\}}\}}", regex::escape(field));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(contents),
        Err(_) => false,
    }
}

/// The result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading or executing a template.
#[derive(Debug)]
pub enum Error {
    /// Returned when the template file can't be opened or read.
    TemplateMissing { path: PathBuf, err: std::io::Error },

    /// Returned when the template doesn't parse or lacks a required
    /// placeholder.
    MalformedTemplate { path: PathBuf, reason: String },

    /// Returned when executing the template fails.
    Render { path: PathBuf, reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TemplateMissing { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::MalformedTemplate { path, reason } => {
                write!(f, "Malformed template '{}': {}", path.display(), reason)
            }
            Error::Render { path, reason } => {
                write!(f, "Rendering template '{}': {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TemplateMissing { path: _, err } => Some(err),
            Error::MalformedTemplate { .. } => None,
            Error::Render { .. } => None,
        }
    }
}
