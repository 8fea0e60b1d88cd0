//! Renders [`BlogPost`]s through the post template and writes them to disk.

use crate::classify::PostCategory;
use crate::commit::CommitRecord;
use crate::markdown::escape;
use crate::post::BlogPost;
use crate::template::{Error as TemplateError, PageTemplate};
use crate::util::write_atomic;
use gtmpl::Value;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Responsible for templating and writing post pages.
pub struct PostWriter<'a> {
    /// The template for post pages.
    pub template: &'a PageTemplate,

    /// The directory in which post files are written.
    pub posts_directory: &'a Path,

    /// The project name shown in post tags and available to the template as
    /// `site_name`.
    pub site_name: &'a str,
}

impl PostWriter<'_> {
    /// The path a commit's post is written to.
    pub fn post_path(&self, post: &BlogPost) -> PathBuf {
        self.posts_directory.join(&post.file_name)
    }

    /// Renders a post to HTML without touching the file system.
    pub fn render(&self, post: &BlogPost) -> Result<Vec<u8>> {
        Ok(self.template.render(post_value(post, self.site_name))?)
    }

    /// Builds, renders, and writes the post for `commit`, overwriting any
    /// previous rendering of the same commit.
    pub fn write(&self, commit: &CommitRecord, category: PostCategory) -> Result<BlogPost> {
        if category == PostCategory::Excluded {
            return Err(Error::Excluded(commit.sha.clone()));
        }
        let post = BlogPost::from_commit(commit, category, self.site_name);
        let html = self.render(&post)?;
        let path = self.post_path(&post);
        write_atomic(&path, &html).map_err(|err| Error::Io { path, err })?;
        Ok(post)
    }
}

/// Converts a post into the template value. Text fields are HTML-escaped;
/// `content` is markup.
fn post_value(post: &BlogPost, site_name: &str) -> Value {
    let s = |text: &str| Value::String(escape(text));

    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("title".to_owned(), s(&post.title));
    m.insert("date".to_owned(), s(&post.date.format("%Y-%m-%d").to_string()));
    m.insert("author".to_owned(), s(&post.author));
    m.insert("category".to_owned(), s(post.category.name()));
    m.insert(
        "tags".to_owned(),
        Value::Array(post.tags.iter().map(|t| s(t)).collect()),
    );
    m.insert("tags_text".to_owned(), s(&post.tags_text()));
    m.insert("intro".to_owned(), s(&post.excerpt));
    m.insert("content".to_owned(), Value::String(content(post)));
    m.insert("sha".to_owned(), s(&post.sha));
    m.insert(
        "url".to_owned(),
        s(post.url.as_ref().map(|u| u.as_str()).unwrap_or("")),
    );
    m.insert(
        "release".to_owned(),
        Value::Bool(post.category == PostCategory::Release),
    );
    m.insert("site_name".to_owned(), s(site_name));
    Value::Object(m)
}

/// The post body: the category section followed by the commit details.
fn content(post: &BlogPost) -> String {
    let mut lines = vec![format!("<h2>{}</h2>", post.category.heading())];
    if post.body.is_empty() {
        lines.push(format!("<p>{}</p>", escape(&post.excerpt)));
    } else {
        lines.push(post.body.trim_end().to_owned());
    }

    if !post.files.is_empty() {
        lines.push(String::from("<h2>Files Changed</h2>"));
        lines.push(String::from("<ul class=\"files-changed\">"));
        for file in &post.files {
            lines.push(format!("<li><code>{}</code></li>", escape(file)));
        }
        lines.push(String::from("</ul>"));
    }

    lines.push(String::from("<h2>Commit Information</h2>"));
    lines.push(String::from("<ul class=\"commit-info\">"));
    lines.push(format!(
        "<li><strong>Commit:</strong> <code>{}</code></li>",
        escape(&post.sha)
    ));
    lines.push(format!(
        "<li><strong>Date:</strong> {}</li>",
        post.date.format("%Y-%m-%d")
    ));
    lines.push(format!(
        "<li><strong>Author:</strong> {}</li>",
        escape(&post.author)
    ));
    lines.push(format!(
        "<li><strong>Type:</strong> {}</li>",
        post.category.name()
    ));
    if let Some(url) = &post.url {
        lines.push(format!(
            "<li><a href=\"{}\">View commit</a></li>",
            escape(url.as_str())
        ));
    }
    lines.push(String::from("</ul>"));
    lines.join("\n")
}

/// The result of a fallible post-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a post-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(TemplateError),

    /// An error writing the output file.
    Io { path: PathBuf, err: io::Error },

    /// Returned when asked to write a documentation-only commit.
    Excluded(String),
}

impl From<TemplateError> for Error {
    /// Converts a [`TemplateError`] into an [`Error`]. This allows us to use
    /// the `?` operator for fallible template operations.
    fn from(err: TemplateError) -> Error {
        Error::Template(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Io { path, err } => {
                write!(f, "Writing post '{}': {}", path.display(), err)
            }
            Error::Excluded(sha) => {
                write!(f, "Commit {} is excluded from the blog", sha)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
            Error::Excluded(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commit::test::commit;
    use crate::template::test::POST_TEMPLATE;
    use crate::template::POST_FIELDS;

    fn template() -> PageTemplate {
        PageTemplate::parse(Path::new("template.html"), POST_TEMPLATE, POST_FIELDS).unwrap()
    }

    #[test]
    fn test_write_post() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let template = template();
        let writer = PostWriter {
            template: &template,
            posts_directory: dir.path(),
            site_name: "EYN-OS",
        };
        let c = commit(
            "0123456789abcdef",
            "Add <shell> history\n\n- arrow keys\n- persistence",
            "2024-02-01",
        );
        let post = writer.write(&c, PostCategory::Feature)?;

        let html = std::fs::read_to_string(dir.path().join(&post.file_name)).unwrap();
        assert!(html.contains("<h1>Add &lt;shell&gt; history</h1>"));
        assert!(html.contains("<span class=\"post-date\">2024-02-01</span>"));
        assert!(html.contains("<span class=\"post-tags\">Feature, EYN-OS, Development</span>"));
        assert!(html.contains("<h2>New Features</h2>"));
        assert!(html.contains("<li>arrow keys</li>"));
        assert!(html.contains("<code>0123456789abcdef</code>"));
        Ok(())
    }

    #[test]
    fn test_files_changed() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let template = template();
        let writer = PostWriter {
            template: &template,
            posts_directory: dir.path(),
            site_name: "EYN-OS",
        };
        let mut c = commit("0123456789abcdef", "Fix scheduler", "2024-02-01");
        let post = writer.write(&c, PostCategory::Fix)?;
        let html = std::fs::read_to_string(dir.path().join(&post.file_name)).unwrap();
        assert!(!html.contains("Files Changed"));

        c.files = vec![String::from("kernel/sched.c"), String::from("a&b.h")];
        let post = writer.write(&c, PostCategory::Fix)?;
        let html = std::fs::read_to_string(dir.path().join(&post.file_name)).unwrap();
        assert!(html.contains("<h2>Files Changed</h2>"));
        assert!(html.contains("<li><code>kernel/sched.c</code></li>"));
        assert!(html.contains("<li><code>a&amp;b.h</code></li>"));
        Ok(())
    }

    #[test]
    fn test_release_marker() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let template = template();
        let writer = PostWriter {
            template: &template,
            posts_directory: dir.path(),
            site_name: "EYN-OS",
        };
        let post = writer.write(
            &commit("fedcba9876543210", "Release 13", "2024-03-01"),
            PostCategory::Release,
        )?;
        let html = std::fs::read_to_string(dir.path().join(&post.file_name)).unwrap();
        assert!(html.contains("<h1>🚀 Release 13</h1>"));
        assert!(html.contains("🚀 Release, EYN-OS, Version 13"));
        assert!(html.contains("<h2>Release Notes</h2>"));
        Ok(())
    }

    #[test]
    fn test_rewrite_same_commit() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let template = template();
        let c = commit("0123456789abcdef", "Fix scheduler", "2024-02-01");

        let first = PostWriter {
            template: &template,
            posts_directory: dir.path(),
            site_name: "Old name",
        };
        first.write(&c, PostCategory::Fix)?;

        let second = PostWriter {
            site_name: "New name",
            ..first
        };
        let post = second.write(&c, PostCategory::Fix)?;

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(1, files.len());
        let html = std::fs::read(dir.path().join(&post.file_name)).unwrap();
        assert_eq!(second.render(&post)?, html);
        assert!(String::from_utf8(html).unwrap().contains("New name"));
        Ok(())
    }

    #[test]
    fn test_excluded_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let template = template();
        let writer = PostWriter {
            template: &template,
            posts_directory: dir.path(),
            site_name: "EYN-OS",
        };
        let c = commit("0123456789abcdef", "Update README", "2024-02-01");
        assert!(matches!(
            writer.write(&c, PostCategory::Excluded),
            Err(Error::Excluded(_))
        ));
        assert_eq!(0, std::fs::read_dir(dir.path()).unwrap().count());
    }
}
