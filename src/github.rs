//! A [`CommitSource`] backed by the GitHub REST API. Listing is a single
//! blocking, paginated `GET` on the repository's `commits` endpoint; there is
//! no retry, so any failure aborts the run.

use crate::commit::{window_start, CommitRecord, CommitSource};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use url::Url;

/// The number of commits requested per page (GitHub's maximum).
const PER_PAGE: &str = "100";

const TIMEOUT_SECS: u64 = 30;

/// Identifies a GitHub repository as `owner/name`.
#[derive(Clone, Debug, PartialEq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl std::str::FromStr for Repository {
    type Err = Error;

    fn from_str(s: &str) -> Result<Repository> {
        match s.trim().split('/').collect::<Vec<&str>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Repository {
                owner: (*owner).to_owned(),
                name: (*name).to_owned(),
            }),
            _ => Err(Error::InvalidRepository(s.to_owned())),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Lists commits from a GitHub repository.
pub struct GitHubSource {
    client: Client,

    /// The API root, e.g. `https://api.github.com`.
    api_base: Url,

    repository: Repository,

    /// Only commits newer than this are listed. `None` lists the whole
    /// history.
    since: Option<DateTime<Utc>>,

    /// The `Authorization` header built from the optional access token.
    /// Anonymous requests work but are rate limited aggressively.
    authorization: Option<HeaderValue>,
}

impl GitHubSource {
    pub fn new(
        api_base: Url,
        repository: Repository,
        days_back: Option<i64>,
        token: Option<String>,
    ) -> Result<GitHubSource> {
        // `Url::join` treats the last path segment as a file name unless the
        // path ends in a slash.
        let mut api_base = api_base;
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(Error::Client)?;
        let authorization = match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Some(
                HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                    .map_err(|_| Error::InvalidToken)?,
            ),
            None => None,
        };
        Ok(GitHubSource {
            client,
            api_base,
            repository,
            since: since(Utc::now(), days_back)?,
            authorization,
        })
    }

    /// The URL of the first page of the commit listing.
    fn commits_url(&self) -> Result<Url> {
        let mut url = self.api_base.join(&format!(
            "repos/{}/{}/commits",
            self.repository.owner, self.repository.name
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("per_page", PER_PAGE);
            if let Some(since) = self.since {
                query.append_pair("since", &since.to_rfc3339());
            }
        }
        Ok(url)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("commitblog/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(value) = &self.authorization {
            headers.insert(AUTHORIZATION, value.clone());
        }
        headers
    }

    fn fetch_page(&self, url: &Url) -> Result<Response> {
        tracing::debug!(%url, "fetching commit page");
        let response = self
            .client
            .get(url.as_str())
            .headers(self.headers())
            .send()
            .map_err(|err| Error::SourceUnavailable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(status_error(status, self.authorization.is_some(), url))
    }
}

/// The start of the listing window, `days_back` days before `now`.
fn since(now: DateTime<Utc>, days_back: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    match days_back {
        None => Ok(None),
        Some(days) => window_start(now, days)
            .map(Some)
            .ok_or(Error::InvalidDaysBack(days)),
    }
}

/// Maps a non-success status to an error. `401` always means the credentials
/// were refused; `403` and `429` are the anonymous rate limit unless a token
/// was sent.
fn status_error(status: StatusCode, has_token: bool, url: &Url) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => Error::AuthenticationRequired(status),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS if !has_token => {
            Error::AuthenticationRequired(status)
        }
        _ => Error::SourceUnavailable(format!("{} returned HTTP {}", url, status)),
    }
}

impl CommitSource for GitHubSource {
    type Error = Error;

    fn fetch_commits(&self) -> Result<Vec<CommitRecord>> {
        let mut commits = Vec::new();
        let mut next = Some(self.commits_url()?);

        while let Some(url) = next {
            let response = self.fetch_page(&url)?;
            next = next_page(response.headers());
            let page: Vec<ApiCommit> = response
                .json()
                .map_err(|err| Error::MalformedResponse(err.to_string()))?;
            tracing::debug!(count = page.len(), "fetched commit page");
            commits.extend(page.into_iter().map(CommitRecord::from));
        }

        tracing::info!(
            repository = %self.repository,
            count = commits.len(),
            "fetched commits"
        );
        Ok(commits)
    }
}

/// Finds the `rel="next"` target of a `Link` header, e.g.
/// `<https://api.github.com/...&page=2>; rel="next", <...>; rel="last"`.
fn next_page(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;
    parse_next_link(link)
}

fn parse_next_link(link: &str) -> Option<Url> {
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        Url::parse(target.trim_start_matches('<').trim_end_matches('>')).ok()
    })
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    html_url: Option<Url>,
    commit: ApiCommitDetail,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: ApiSignature,
}

#[derive(Deserialize)]
struct ApiSignature {
    name: String,
    date: DateTime<Utc>,
}

impl From<ApiCommit> for CommitRecord {
    fn from(c: ApiCommit) -> CommitRecord {
        CommitRecord {
            sha: c.sha,
            message: c.commit.message,
            timestamp: c.commit.author.date,
            author: c.commit.author.name,
            url: c.html_url,
            files: Vec::new(),
        }
    }
}

/// The result of a fallible GitHub operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to list commits.
#[derive(Debug)]
pub enum Error {
    /// Returned when the host can't be reached or answers with a
    /// non-success status.
    SourceUnavailable(String),

    /// Returned when the host refuses the request for lack of credentials,
    /// typically because the anonymous rate limit was exhausted.
    AuthenticationRequired(StatusCode),

    /// Returned when the response body isn't the expected commit listing.
    MalformedResponse(String),

    /// Returned when the configured repository isn't of the form
    /// `owner/name`.
    InvalidRepository(String),

    /// Returned when the listing window can't be represented as a date.
    InvalidDaysBack(i64),

    /// Returned when the access token contains characters that aren't
    /// allowed in an HTTP header.
    InvalidToken,

    /// Returned when the HTTP client can't be constructed.
    Client(reqwest::Error),

    /// Returned when the API URL can't be built.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SourceUnavailable(reason) => {
                write!(f, "Commit source unavailable: {}", reason)
            }
            Error::AuthenticationRequired(status) => write!(
                f,
                "GitHub refused the request (HTTP {}); set GITHUB_TOKEN to authenticate",
                status
            ),
            Error::MalformedResponse(reason) => {
                write!(f, "Unexpected commit listing: {}", reason)
            }
            Error::InvalidRepository(repo) => {
                write!(f, "Repository must be `owner/name`, got `{}`", repo)
            }
            Error::InvalidDaysBack(days) => {
                write!(f, "Can't list commits from {} days back", days)
            }
            Error::InvalidToken => write!(f, "GITHUB_TOKEN is not a valid header value"),
            Error::Client(err) => write!(f, "Building HTTP client: {}", err),
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Client(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator when building API URLs.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}
