use std::time::Duration;

use api_client::Token;
use http::Uri;
use serde::Deserialize;

use crate::{GithubClient, RepositoryFeed, GITHUB_BASE};

fn default_base() -> Uri {
    Uri::from_static(GITHUB_BASE)
}

fn default_page_size() -> u32 {
    crate::MAX_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    10
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Configuration for the commit feed of one repository.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Repository owner, e.g. `apple`.
    pub owner: String,

    /// Repository name, e.g. `swift`.
    pub repository: String,

    /// Optional API token, sent as a bearer token.
    #[serde(default)]
    pub token: Option<Token>,

    /// API root.
    #[serde(default = "default_base", with = "api_client::uri::serde")]
    pub base: Uri,

    /// Records requested per page, between 1 and 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Most pages fetched in one pass.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl FeedConfig {
    /// Configuration for a public repository with every default.
    pub fn new(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            token: None,
            base: default_base(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Build the feed over a real network client.
    pub fn build(&self) -> RepositoryFeed {
        let client = GithubClient::with_base(self.base.clone(), self.token.clone());
        self.feed(client)
    }

    /// Build the feed over a provided transport.
    pub fn build_with_service<S>(&self, service: S) -> RepositoryFeed
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
        let client = GithubClient::with_service(self.base.clone(), self.token.clone(), service);
        self.feed(client)
    }

    fn feed(&self, client: GithubClient) -> RepositoryFeed {
        client.set_timeout(self.timeout());
        RepositoryFeed::new(client, &self.owner, &self.repository)
            .with_page_size(self.page_size)
            .with_max_pages(self.max_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: FeedConfig =
            serde_json::from_str(r#"{"owner": "apple", "repository": "swift"}"#).unwrap();

        assert_eq!(config.base, Uri::from_static("https://api.github.com/"));
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.token.is_none());
    }

    #[test]
    fn token_is_redacted() {
        let config: FeedConfig = serde_json::from_str(
            r#"{"owner": "apple", "repository": "swift", "token": "ghp_secret", "page_size": 500}"#,
        )
        .unwrap();

        assert!(!format!("{config:?}").contains("ghp_secret"));
        assert_eq!(config.token.as_ref().map(Token::revealed), Some("ghp_secret"));

        let feed = config.build();
        assert_eq!(feed.page_size(), 100);
    }
}
