//! Loads the project configuration from a `commitblog.yaml` file. The file is
//! looked up in the given directory and then in each parent, and all paths
//! in it are relative to the directory that holds it.
//!
//! ```yaml
//! repository: kiangentry/EYN-OS
//! site_name: EYN-OS
//! days_back: 120
//! ```

use crate::github::Repository;
use crate::util::open;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "commitblog.yaml";

/// The environment variable holding the optional GitHub access token.
pub const TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Where commits are listed from.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The GitHub REST API.
    GitHub,

    /// The history of a local clone.
    Git,
}

impl Default for SourceKind {
    fn default() -> Self {
        SourceKind::GitHub
    }
}

#[derive(Deserialize)]
struct DaysBack(Option<i64>);
impl Default for DaysBack {
    fn default() -> Self {
        DaysBack(Some(120))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Project {
    repository: String,

    #[serde(default)]
    site_name: Option<String>,

    #[serde(default)]
    days_back: DaysBack,

    #[serde(default)]
    source: SourceKind,

    #[serde(default)]
    git_directory: Option<PathBuf>,

    #[serde(default)]
    api_base: Option<Url>,

    #[serde(default)]
    posts_directory: Option<PathBuf>,

    #[serde(default)]
    post_template: Option<PathBuf>,

    #[serde(default)]
    index_template: Option<PathBuf>,

    #[serde(default)]
    index_output: Option<PathBuf>,

    #[serde(default)]
    posts_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub repository: Repository,
    pub site_name: String,

    /// How far back to list commits. `None` lists the whole history.
    pub days_back: Option<i64>,
    pub source: SourceKind,

    /// The clone read when `source` is `git`.
    pub git_directory: PathBuf,
    pub api_base: Url,
    pub token: Option<String>,
    pub posts_directory: PathBuf,
    pub post_template: PathBuf,
    pub index_template: PathBuf,
    pub index_output: PathBuf,
    pub posts_url: String,
}

impl Config {
    /// Finds `commitblog.yaml` in `dir` or the nearest parent directory and
    /// loads it. The token is read from `GITHUB_TOKEN`.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path, std::env::var(TOKEN_VAR).ok())
                .with_context(|| format!("Loading configuration from `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path, token: Option<String>) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => Config::from_project(project, project_root, token),
        }
    }

    fn from_project(project: Project, root: &Path, token: Option<String>) -> Result<Config> {
        let repository: Repository = project.repository.parse()?;
        if let Some(days) = project.days_back.0 {
            if days < 0 {
                return Err(anyhow!("`days_back` must not be negative, got {}", days));
            }
        }
        let resolve = |p: Option<PathBuf>, default: &str| {
            root.join(p.unwrap_or_else(|| PathBuf::from(default)))
        };

        let mut posts_url = project.posts_url.unwrap_or_else(|| String::from("blog/"));
        if !posts_url.is_empty() && !posts_url.ends_with('/') {
            posts_url.push('/');
        }

        Ok(Config {
            site_name: project
                .site_name
                .unwrap_or_else(|| repository.name.clone()),
            repository,
            days_back: project.days_back.0,
            source: project.source,
            git_directory: resolve(project.git_directory, "."),
            api_base: match project.api_base {
                Some(url) => url,
                None => Url::parse("https://api.github.com")?,
            },
            token: token.filter(|t| !t.trim().is_empty()),
            posts_directory: resolve(project.posts_directory, "blog"),
            post_template: resolve(project.post_template, "blog/template.html"),
            index_template: resolve(project.index_template, "templates/index.html"),
            index_output: resolve(project.index_output, "blog.html"),
            posts_url,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "repository: kiangentry/EYN-OS\n")?;

        let config = Config::from_project_file(&dir.path().join(PROJECT_FILE), None)?;
        assert_eq!("EYN-OS", config.site_name);
        assert_eq!(Some(120), config.days_back);
        assert_eq!("https://api.github.com/", config.api_base.as_str());
        assert_eq!(dir.path().join("blog"), config.posts_directory);
        assert_eq!(dir.path().join("blog/template.html"), config.post_template);
        assert_eq!(dir.path().join("templates/index.html"), config.index_template);
        assert_eq!(dir.path().join("blog.html"), config.index_output);
        assert_eq!("blog/", config.posts_url);
        assert_eq!(None, config.token);
        assert_eq!(SourceKind::GitHub, config.source);
        assert_eq!(dir.path().join("."), config.git_directory);
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "repository: octocat/Hello-World\n\
             site_name: Hello\n\
             days_back: null\n\
             posts_directory: out/posts\n\
             index_output: out/index.html\n\
             posts_url: posts\n\
             source: git\n\
             git_directory: ../EYN-OS\n",
        )?;

        let config =
            Config::from_project_file(&dir.path().join(PROJECT_FILE), Some("secret".into()))?;
        assert_eq!("Hello", config.site_name);
        assert_eq!(None, config.days_back);
        assert_eq!(dir.path().join("out/posts"), config.posts_directory);
        assert_eq!(dir.path().join("out/index.html"), config.index_output);
        assert_eq!("posts/", config.posts_url);
        assert_eq!(SourceKind::Git, config.source);
        assert_eq!(dir.path().join("../EYN-OS"), config.git_directory);
        assert_eq!(Some("secret".to_owned()), config.token);
        Ok(())
    }

    #[test]
    fn test_found_in_parent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "repository: a/b\n")?;
        let nested = dir.path().join("blog").join("drafts");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested)?;
        assert_eq!(dir.path().join("blog"), config.posts_directory);
        Ok(())
    }

    #[test]
    fn test_negative_days_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "repository: a/b\ndays_back: -5\n",
        )?;
        assert!(Config::from_project_file(&dir.path().join(PROJECT_FILE), None).is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_repository() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "repository: EYN-OS\n")?;
        assert!(Config::from_project_file(&dir.path().join(PROJECT_FILE), None).is_err());
        Ok(())
    }
}
