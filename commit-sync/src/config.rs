use entity_store::StoreConfig;
use octocat::FeedConfig;
use serde::Deserialize;

use crate::{CommitSync, Error};

/// Everything needed to run commit sync for one repository.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// The remote commit feed.
    pub feed: FeedConfig,

    /// Where commits are stored.
    pub store: StoreConfig,
}

impl SyncConfig {
    /// Open the store and connect the feed.
    #[tracing::instrument(skip(self), fields(owner = %self.feed.owner, repository = %self.feed.repository))]
    pub async fn build(self) -> Result<CommitSync, Error> {
        let store = self.store.build().await?;
        Ok(CommitSync::new(store, self.feed.build()))
    }
}
