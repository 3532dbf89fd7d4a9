use std::fmt;

use crate::error::StoreError;
use crate::model::{Author, Commit, CommitId, NewCommit};
use crate::query::CommitQuery;

/// A storage engine for authors and commits.
///
/// Reads see the last committed state. All writes go through a [`Transaction`].
#[async_trait::async_trait]
pub trait EntityStore: fmt::Debug + Send + Sync {
    /// The name of the engine.
    fn name(&self) -> &'static str;

    /// Commits matching the query, in the requested order.
    async fn commits(&self, query: &CommitQuery) -> Result<Vec<Commit>, StoreError>;

    /// A single commit, by key.
    async fn commit(&self, id: CommitId) -> Result<Option<Commit>, StoreError>;

    /// A single commit, by remote identifier.
    async fn commit_by_sha(&self, sha: &str) -> Result<Option<Commit>, StoreError>;

    /// Authors ordered by name, optionally only the one with the given name.
    async fn authors(&self, name: Option<&str>) -> Result<Vec<Author>, StoreError>;

    /// Start a unit of work.
    ///
    /// Only one transaction may be open per store at a time; this waits for any other.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

/// A unit of work against an [`EntityStore`].
///
/// Nothing is visible to readers until [`Transaction::commit`] succeeds.
/// Dropping a transaction without committing discards every change.
#[async_trait::async_trait]
pub trait Transaction: fmt::Debug + Send {
    /// Find the author with `name`, or create one with `email`.
    ///
    /// An existing author is returned unchanged.
    async fn upsert_author(&mut self, name: &str, email: &str) -> Result<Author, StoreError>;

    /// Insert a commit linked to `author`.
    ///
    /// Returns `None` when a commit with the same sha is already stored.
    async fn insert_commit(
        &mut self,
        commit: NewCommit,
        author: &Author,
    ) -> Result<Option<Commit>, StoreError>;

    /// Delete a commit, leaving its author in place.
    ///
    /// Returns `false` when no such commit exists.
    async fn delete_commit(&mut self, id: CommitId) -> Result<bool, StoreError>;

    /// Whether this transaction holds any pending change.
    fn has_changes(&self) -> bool;

    /// Make every pending change visible at once.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
