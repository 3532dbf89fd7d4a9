use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use octocat::{CommitBatch, RepositoryFeed};

/// Where a [`Synchronizer`](crate::Synchronizer) reads new commits from.
#[async_trait::async_trait]
pub trait CommitSource: fmt::Debug + Send + Sync {
    /// Human readable name of the source, for logs.
    fn name(&self) -> String;

    /// Commits dated between `since` and `until`, newest first.
    ///
    /// A source may stop early, returning the newest part of the range and
    /// marking the batch as truncated.
    async fn fetch_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<CommitBatch, octocat::Error>;
}

#[async_trait::async_trait]
impl CommitSource for RepositoryFeed {
    fn name(&self) -> String {
        self.slug()
    }

    async fn fetch_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<CommitBatch, octocat::Error> {
        self.try_fetch_range(since, until).await
    }
}

#[async_trait::async_trait]
impl<S> CommitSource for Arc<S>
where
    S: CommitSource + ?Sized,
{
    fn name(&self) -> String {
        (**self).name()
    }

    async fn fetch_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<CommitBatch, octocat::Error> {
        (**self).fetch_range(since, until).await
    }
}
