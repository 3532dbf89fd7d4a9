use chrono::{DateTime, Utc};

use crate::models::{Commit, CommitBatch, Page};
use crate::{CommitsQuery, Error, GithubClient, MAX_PAGE_SIZE};

/// The commit feed of a single repository.
#[derive(Debug, Clone)]
pub struct RepositoryFeed {
    client: GithubClient,
    owner: String,
    repository: String,
    page_size: u32,
    max_pages: u32,
}

impl RepositoryFeed {
    /// Feed for `owner/repository`, with full pages and at most ten of them per fetch.
    pub fn new(client: GithubClient, owner: &str, repository: &str) -> Self {
        Self {
            client,
            owner: owner.to_owned(),
            repository: repository.to_owned(),
            page_size: MAX_PAGE_SIZE,
            max_pages: 10,
        }
    }

    /// Records per page, clamped to what Github allows.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Most pages walked by one fetch. At least one.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Records per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Most pages walked by one fetch.
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// The `owner/repository` this feed reads.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    /// The underlying client.
    pub fn client(&self) -> &GithubClient {
        &self.client
    }

    /// Fetch a single page of commits between `since` and `until`. Pages start at 1.
    pub async fn fetch_page(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        page: u32,
    ) -> Result<Page, Error> {
        let query = CommitsQuery {
            since,
            until,
            per_page: self.page_size,
            page: (page > 1).then_some(page),
        };

        self.client
            .commits(&self.owner, &self.repository, &query)
            .await
    }

    /// Fetch the commits between `since` and `until`, walking pages until a short one.
    ///
    /// At most `max_pages` pages are read. Github lists newest first, so a
    /// batch cut off by that limit holds the newest commits of the range and
    /// is marked [`CommitBatch::truncated`].
    ///
    /// Any failed page fails the whole fetch.
    #[tracing::instrument(skip(self), fields(repository = %self.slug()))]
    pub async fn try_fetch_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<CommitBatch, Error> {
        let mut commits = Vec::new();

        for page in 1..=self.max_pages {
            let Page {
                commits: batch,
                received,
            } = self.fetch_page(since, until, page).await?;
            commits.extend(batch);

            if received < self.page_size as usize {
                tracing::debug!(pages = page, count = commits.len(), "fetched commit feed");
                return Ok(CommitBatch {
                    commits,
                    truncated: false,
                });
            }
        }

        tracing::debug!(
            max_pages = self.max_pages,
            count = commits.len(),
            "page limit reached, older commits remain"
        );
        Ok(CommitBatch {
            commits,
            truncated: true,
        })
    }

    /// Fetch every commit newer than `since`, up to the page limit.
    ///
    /// Any failed page fails the whole fetch.
    pub async fn try_fetch_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>, Error> {
        let batch = self.try_fetch_range(since, None).await?;
        if batch.truncated {
            tracing::warn!(
                repository = %self.slug(),
                max_pages = self.max_pages,
                "commit feed has more pages than allowed, older commits were not fetched"
            );
        }
        Ok(batch.commits)
    }

    /// Fetch every commit newer than `since`.
    ///
    /// Failures are logged and produce an empty list.
    pub async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> Vec<Commit> {
        match self.try_fetch_since(since).await {
            Ok(commits) => commits,
            Err(error) => {
                tracing::warn!(repository = %self.slug(), %error, "fetching commit feed failed");
                Vec::new()
            }
        }
    }
}
