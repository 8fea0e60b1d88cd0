//! Defines the [`BlogPost`] type and the rules for deriving a post from a
//! [`CommitRecord`]: the title, excerpt, tags and output file name. See
//! [`crate::write`] for how a post becomes an HTML file.

use crate::classify::{release_version, PostCategory};
use crate::commit::CommitRecord;
use crate::markdown;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// Titles longer than this many characters are truncated.
pub const MAX_TITLE_LEN: usize = 60;

/// Excerpts without a sentence break are cut at this many characters.
pub const MAX_EXCERPT_LEN: usize = 200;

/// Prefixed to release titles and tags.
pub const RELEASE_MARKER: &str = "🚀";

const ELLIPSIS: &str = "...";

pub const HTML_EXTENSION: &str = ".html";

/// A blog post generated from a single commit.
#[derive(Clone, Debug, PartialEq)]
pub struct BlogPost {
    /// The commit's short identifier. Also embedded in [`BlogPost::file_name`].
    pub id: String,

    /// The name of the output file, e.g. `commit-0123abcd-add-fat32.html`.
    pub file_name: String,

    pub title: String,
    pub date: NaiveDate,

    /// The post's tags in display order, without duplicates.
    pub tags: Vec<String>,

    /// A short plain-text summary shown on the index page.
    pub excerpt: String,

    /// The rendered commit message body (HTML).
    pub body: String,

    pub category: PostCategory,
    pub author: String,
    pub sha: String,
    pub url: Option<Url>,

    /// Paths touched by the commit, when the source reports them.
    pub files: Vec<String>,
}

impl BlogPost {
    /// Derives a post from a commit. `site_name` appears in the tags.
    pub fn from_commit(commit: &CommitRecord, category: PostCategory, site_name: &str) -> BlogPost {
        let title = match category {
            PostCategory::Release => {
                // the marker and its space count towards the limit
                let max = MAX_TITLE_LEN - RELEASE_MARKER.chars().count() - 1;
                format!("{} {}", RELEASE_MARKER, truncate(commit.subject(), max))
            }
            _ => truncate(commit.subject(), MAX_TITLE_LEN),
        };
        let file_name = file_name(commit, category);
        let mut body = String::new();
        markdown::to_html(&mut body, commit.body());

        BlogPost {
            id: commit.short_id().to_owned(),
            file_name,
            title,
            date: commit.date(),
            tags: tags(commit, category, site_name),
            excerpt: excerpt(commit.subject()),
            body,
            category,
            author: commit.author.clone(),
            sha: commit.sha.clone(),
            url: commit.url.clone(),
            files: commit.files.clone(),
        }
    }

    /// The tags joined the way they appear in the `post-tags` element.
    pub fn tags_text(&self) -> String {
        self.tags.join(TAG_DELIMITER_DISPLAY)
    }
}

/// Tags are split on this character when read back from a rendered post.
pub const TAG_DELIMITER: char = ',';

const TAG_DELIMITER_DISPLAY: &str = ", ";

fn tags(commit: &CommitRecord, category: PostCategory, site_name: &str) -> Vec<String> {
    // A delimiter inside a tag would split it in two when read back.
    let site_name = site_name
        .split(TAG_DELIMITER)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<&str>>()
        .join(" ");
    let tags = match category {
        PostCategory::Release => {
            let mut tags = vec![
                format!("{} {}", RELEASE_MARKER, category.name()),
                site_name,
            ];
            if let Some(version) = release_version(&commit.message) {
                tags.push(format!("Version {}", version));
            }
            tags
        }
        _ => vec![
            category.name().to_owned(),
            site_name,
            String::from("Development"),
        ],
    };
    dedup_tags(tags.into_iter())
}

/// Drops empty and repeated tags, keeping the first occurrence of each.
pub fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.map(|t| t.as_ref().trim().to_owned())
        .filter(|t| !t.is_empty() && !t.contains(TAG_DELIMITER))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// The output file name for a commit's post:
/// `{release|commit}-{short id}-{slug}.html`. Depends only on the commit, so
/// rendering the same commit twice targets the same file.
pub fn file_name(commit: &CommitRecord, category: PostCategory) -> String {
    let kind = match category {
        PostCategory::Release => "release",
        _ => "commit",
    };
    let slug = slug::slugify(truncate(commit.subject(), MAX_TITLE_LEN));
    match slug.is_empty() {
        true => format!("{}-{}{}", kind, commit.short_id(), HTML_EXTENSION),
        false => format!("{}-{}-{}{}", kind, commit.short_id(), slug, HTML_EXTENSION),
    }
}

/// Recovers the commit short id from a post file name produced by
/// [`file_name`]. Returns `None` for files that don't follow the scheme
/// (e.g., hand-written posts).
pub fn id_from_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if !name.ends_with(HTML_EXTENSION) {
        return None;
    }
    let stem = name.trim_end_matches(HTML_EXTENSION);
    let mut parts = stem.splitn(3, '-');
    match (parts.next()?, parts.next()?) {
        ("release", id) | ("commit", id)
            if !id.is_empty() && id.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            Some(id.to_owned())
        }
        _ => None,
    }
}

/// Cuts `s` to at most `max` characters, replacing the tail with `...` when
/// anything was removed.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

/// The first sentence of `text`, or its first [`MAX_EXCERPT_LEN`]
/// characters when no sentence ends before that.
pub fn excerpt(text: &str) -> String {
    let text = text.trim();
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (n, (i, c)) in chars.iter().enumerate() {
        if n >= MAX_EXCERPT_LEN {
            break;
        }
        if matches!(c, '.' | '!' | '?') {
            let at_break = match chars.get(n + 1) {
                None => true,
                Some((_, next)) => next.is_whitespace(),
            };
            if at_break {
                return text[..i + c.len_utf8()].to_owned();
            }
        }
    }
    if chars.len() <= MAX_EXCERPT_LEN {
        return text.to_owned();
    }
    let cut: String = text.chars().take(MAX_EXCERPT_LEN).collect();
    format!("{}{}", cut.trim_end(), ELLIPSIS)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commit::test::commit;

    #[test]
    fn test_truncate() {
        assert_eq!("short", truncate("short", 60));
        let long = "a".repeat(61);
        let wanted = format!("{}...", "a".repeat(57));
        assert_eq!(wanted, truncate(&long, 60));
        assert_eq!(60, truncate(&long, 60).chars().count());
        assert_eq!("a".repeat(60), truncate(&"a".repeat(60), 60));

        // multi-byte characters are counted, not bytes
        let glyphs = "é".repeat(70);
        assert_eq!(60, truncate(&glyphs, 60).chars().count());
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(
            "Adds a scheduler.",
            excerpt("Adds a scheduler. It is round-robin.")
        );
        assert_eq!("Version 1.2 is out!", excerpt("Version 1.2 is out! Go get it"));
        assert_eq!("No sentence end", excerpt("No sentence end"));

        let long = "word ".repeat(60);
        let got = excerpt(&long);
        assert!(got.ends_with("..."));
        assert!(got.chars().count() <= MAX_EXCERPT_LEN + 3);
    }

    #[test]
    fn test_from_commit_feature() {
        let c = commit(
            "0123456789abcdef",
            "Add FAT32 support\n\nReads and writes **long** names.",
            "2024-02-01",
        );
        let post = BlogPost::from_commit(&c, PostCategory::Feature, "EYN-OS");
        assert_eq!("01234567", post.id);
        assert_eq!("commit-01234567-add-fat32-support.html", post.file_name);
        assert_eq!("Add FAT32 support", post.title);
        assert_eq!(vec!["Feature", "EYN-OS", "Development"], post.tags);
        assert_eq!("Feature, EYN-OS, Development", post.tags_text());
        assert_eq!("Add FAT32 support", post.excerpt);
        assert!(post.body.contains("<strong>long</strong>"));
        assert_eq!("2024-02-01", post.date.to_string());
    }

    #[test]
    fn test_from_commit_release() {
        let c = commit("fedcba9876543210", "Release 13", "2024-03-01");
        let post = BlogPost::from_commit(&c, PostCategory::Release, "EYN-OS");
        assert_eq!("🚀 Release 13", post.title);
        assert_eq!("release-fedcba98-release-13.html", post.file_name);
        assert_eq!(vec!["🚀 Release", "EYN-OS", "Version 13"], post.tags);
    }

    #[test]
    fn test_long_release_title() {
        let subject = format!("Release 14: {}", "x".repeat(80));
        let c = commit("fedcba9876543210", &subject, "2024-03-01");
        let post = BlogPost::from_commit(&c, PostCategory::Release, "EYN-OS");
        assert!(post.title.starts_with("🚀 Release 14: "));
        assert!(post.title.ends_with("..."));
        assert_eq!(MAX_TITLE_LEN, post.title.chars().count());
    }

    #[test]
    fn test_site_name_with_delimiter() {
        let c = commit("0123456789abcdef", "Add FAT32 support", "2024-02-01");
        let post = BlogPost::from_commit(&c, PostCategory::Feature, "Acme, Inc");
        assert_eq!(vec!["Feature", "Acme Inc", "Development"], post.tags);
        assert_eq!("Feature, Acme Inc, Development", post.tags_text());
    }

    #[test]
    fn test_file_name_is_stable_and_parsable() {
        let c = commit("0123456789abcdef", "Fix: page faults!", "2024-01-01");
        let name = file_name(&c, PostCategory::Fix);
        assert_eq!(name, file_name(&c, PostCategory::Fix));
        assert_eq!(Some("01234567".to_owned()), id_from_file_name(Path::new(&name)));

        let c = commit("0123456789abcdef", "!!!", "2024-01-01");
        assert_eq!("commit-01234567.html", file_name(&c, PostCategory::Improvement));
    }

    #[test]
    fn test_id_from_file_name() {
        assert_eq!(
            Some("0badf00d".to_owned()),
            id_from_file_name(Path::new("blog/release-0badf00d-release-13.html"))
        );
        assert_eq!(None, id_from_file_name(Path::new("blog/template.html")));
        assert_eq!(None, id_from_file_name(Path::new("blog/my-first-post.html")));
        assert_eq!(None, id_from_file_name(Path::new("blog/commit-0badf00d.md")));
    }

    #[test]
    fn test_dedup_tags() {
        let tags = dedup_tags(["Fix", " Fix ", "", "EYN-OS"].iter());
        assert_eq!(vec!["Fix", "EYN-OS"], tags);
    }
}
