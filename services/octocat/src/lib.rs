//! Simple client for reading the commit history of a Github repository.

use std::time::Duration;

use api_client::{ApiClient, BearerAuth, RequestBuilder, Token};
use chrono::{DateTime, SecondsFormat, Utc};
use http::{header, HeaderName, HeaderValue, Uri};
use hyperdriver::client::conn::transport::tcp::TcpTransportConfig;
use hyperdriver::Client;
use serde::Serialize;
use thiserror::Error;
use tower_http::set_header::SetRequestHeaderLayer;

mod config;
mod feed;
pub mod models;

pub use crate::config::FeedConfig;
pub use crate::feed::RepositoryFeed;
pub use crate::models::{CommitBatch, Page};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const GITHUB_API_VERSION_HEADER: &str = "x-github-api-version";
const GITHUB_BASE: &str = "https://api.github.com/";
const USER_AGENT: &str = concat!("octocat/", env!("CARGO_PKG_VERSION"));

/// Largest page Github will return for the commit listing.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Errors that can occur when using the Github client.
#[derive(Debug, Error)]
pub enum Error {
    /// The request failed, timed out, was refused, or returned an unreadable body.
    #[error("Github request: {0}")]
    Request(#[from] api_client::Error),
}

impl Error {
    /// Whether the request timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Request(error) => error.is_timeout(),
        }
    }

    /// The HTTP status, when Github answered with an error.
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Error::Request(error) => error.status(),
        }
    }
}

/// Query parameters for the commit listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitsQuery {
    /// Only commits at or after this instant.
    pub since: Option<DateTime<Utc>>,

    /// Only commits at or before this instant.
    pub until: Option<DateTime<Utc>>,

    /// Records per page.
    pub per_page: u32,

    /// 1-based page number. `None` is the first page.
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CommitsParams {
    per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    until: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

impl From<&CommitsQuery> for CommitsParams {
    fn from(query: &CommitsQuery) -> Self {
        let timestamp = |date: DateTime<Utc>| date.to_rfc3339_opts(SecondsFormat::Secs, true);
        CommitsParams {
            per_page: query.per_page,
            since: query.since.map(timestamp),
            until: query.until.map(timestamp),
            page: query.page,
        }
    }
}

fn accept_layer() -> SetRequestHeaderLayer<HeaderValue> {
    SetRequestHeaderLayer::if_not_present(header::ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT))
}

fn api_version_layer() -> SetRequestHeaderLayer<HeaderValue> {
    SetRequestHeaderLayer::if_not_present(
        HeaderName::from_static(GITHUB_API_VERSION_HEADER),
        HeaderValue::from_static(GITHUB_API_VERSION),
    )
}

/// A Github client, anonymous or authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: ApiClient<Option<BearerAuth>>,
}

impl GithubClient {
    /// Create a client for api.github.com.
    pub fn new(token: Option<Token>) -> Self {
        Self::with_base(Uri::from_static(GITHUB_BASE), token)
    }

    /// Create a client for a Github API rooted at `base`.
    pub fn with_base(base: Uri, token: Option<Token>) -> Self {
        let mut tcp = TcpTransportConfig::default();
        tcp.connect_timeout = Some(CONNECT_TIMEOUT);

        let client = Client::builder()
            .layer(accept_layer())
            .layer(api_version_layer())
            .with_tcp(tcp)
            .with_auto_http()
            .with_user_agent(USER_AGENT.to_owned())
            .build_service();

        Self {
            client: ApiClient::new_with_inner_service(base, token.map(BearerAuth::new), client),
        }
    }

    /// Create a client which sends requests through `service`.
    pub fn with_service<S>(base: Uri, token: Option<Token>, service: S) -> Self
    where
        S: tower::Service<
                http::Request<hyperdriver::Body>,
                Response = http::Response<hyperdriver::Body>,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let service = tower::ServiceBuilder::new()
            .layer(accept_layer())
            .layer(api_version_layer())
            .service(service);

        Self {
            client: ApiClient::new_with_inner_service(base, token.map(BearerAuth::new), service),
        }
    }

    /// Set how long a request may take.
    pub fn set_timeout(&self, timeout: Duration) {
        self.client.set_timeout(timeout);
    }

    /// Replace the API token.
    pub fn refresh_token(&self, token: Option<Token>) {
        self.client.refresh_auth(token.map(BearerAuth::new));
    }

    /// Build a GET request against a Github endpoint.
    pub fn get(&self, endpoint: &str) -> RequestBuilder<Option<BearerAuth>> {
        self.client.get(endpoint)
    }

    /// List one page of commits on the default branch of `owner/repository`.
    ///
    /// Non-success responses and unreadable bodies are errors. Records which
    /// do not look like commits are skipped, see [`Page::from_records`].
    #[tracing::instrument(skip(self, query), fields(since = ?query.since, until = ?query.until, page = query.page))]
    pub async fn commits(
        &self,
        owner: &str,
        repository: &str,
        query: &CommitsQuery,
    ) -> Result<Page, Error> {
        let records: Vec<serde_json::Value> = self
            .get(&format!("repos/{owner}/{repository}/commits"))
            .query(&CommitsParams::from(query))?
            .send()
            .await?
            .error_for_status()
            .await?
            .json()
            .await?;

        let page = Page::from_records(records);
        tracing::debug!(
            received = page.received,
            decoded = page.commits.len(),
            "Got commits for {owner}/{repository}"
        );
        Ok(page)
    }
}
