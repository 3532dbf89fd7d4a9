//! # Commit sync
//!
//! Keeps a local store of a repository's commits up to date with the remote
//! commit feed, and lists them through preset filters.
//!
//! A [`Synchronizer`] pulls commits newer than the latest stored one and
//! writes each batch in a single transaction. A [`CommitView`] queries the
//! store through the active [`Filter`]. [`CommitSync`] ties both together.

use entity_store::{CommitId, Store};
use tokio::sync::broadcast;

mod config;
mod coordinator;
mod error;
mod filter;
mod inflight;
mod report;
mod source;
#[cfg(test)]
mod testing;
mod view;

pub use config::SyncConfig;
pub use coordinator::{SyncHandle, Synchronizer};
pub use entity_store::{Author, Commit};
pub use error::Error;
pub use filter::{Filter, RECENT_HOURS};
pub use report::{SyncOutcome, SyncReport, SyncStage};
pub use source::CommitSource;
pub use view::{CommitDetail, CommitView};

/// One store, one feed, and a filtered view over them.
#[derive(Debug, Clone)]
pub struct CommitSync {
    synchronizer: Synchronizer,
    view: CommitView,
}

impl CommitSync {
    /// Sync commits from `source` into `store`, showing all of them.
    pub fn new<S>(store: Store, source: S) -> Self
    where
        S: CommitSource + 'static,
    {
        Self {
            view: CommitView::new(store.clone()),
            synchronizer: Synchronizer::new(store, source),
        }
    }

    /// Start a sync pass in the background, or join the running one.
    pub fn sync(&self) -> SyncHandle {
        self.synchronizer.sync()
    }

    /// Show only commits matching `filter`.
    pub fn set_filter(&mut self, filter: Filter) {
        self.view.set_filter(filter);
    }

    /// The active filter.
    pub fn filter(&self) -> &Filter {
        self.view.filter()
    }

    /// Commits matching the active filter, newest first.
    pub async fn list_commits(&self) -> Vec<Commit> {
        self.view.list_commits().await
    }

    /// Delete a stored commit. Returns `false` if it was already gone.
    pub async fn delete_commit(&self, id: CommitId) -> Result<bool, Error> {
        self.synchronizer.delete_commit(id).await
    }

    /// Receive a report whenever a sync pass ends.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncReport> {
        self.synchronizer.subscribe()
    }

    /// The filtered view.
    pub fn view(&self) -> &CommitView {
        &self.view
    }

    /// The filtered view, mutably.
    pub fn view_mut(&mut self) -> &mut CommitView {
        &mut self.view
    }

    /// The sync coordinator.
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }
}
