//! # Entity store
//!
//! Durable storage for commits and their authors, with predicate queries and
//! a transactional unit of work. Two engines are provided: [`SqliteStore`]
//! and [`MemoryStore`].

use std::sync::Arc;

use camino::Utf8PathBuf;
use serde::Deserialize;

mod engine;
mod error;
mod memory;
pub mod model;
pub mod query;
mod sqlite;

#[doc(inline)]
pub use engine::{EntityStore, Transaction};
#[doc(inline)]
pub use error::{StoreError, StoreErrorBuilder, StoreErrorKind};
#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use model::{Author, AuthorId, Commit, CommitId, NewCommit};
#[doc(inline)]
pub use query::{CommitQuery, Predicate, SortOrder};
#[doc(inline)]
pub use sqlite::SqliteStore;

/// Which engine to store entities in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreConfig {
    /// Keep everything in memory, lost when the process exits.
    Memory,

    /// A SQLite database file, created if missing.
    Sqlite {
        /// Path to the database file.
        path: Utf8PathBuf,
    },
}

impl StoreConfig {
    /// Open the configured engine.
    #[tracing::instrument]
    pub async fn build(self) -> Result<Store, StoreError> {
        let store: Store = match self {
            StoreConfig::Memory => MemoryStore::new().into(),
            StoreConfig::Sqlite { path } => SqliteStore::open(&path).await?.into(),
        };
        Ok(store)
    }
}

pub(crate) type ArcEngine = Arc<dyn EntityStore>;

/// A cloneable handle to an entity store engine.
#[derive(Debug, Clone)]
pub struct Store {
    engine: ArcEngine,
}

impl<E> From<E> for Store
where
    E: EntityStore + 'static,
{
    fn from(value: E) -> Self {
        Store::new(value)
    }
}

impl Store {
    /// Wrap an engine.
    pub fn new<E: EntityStore + 'static>(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// The name of the engine.
    pub fn name(&self) -> &'static str {
        self.engine.name()
    }

    /// Commits matching `query`. No matches is an empty vector, not an error.
    #[tracing::instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn query(&self, query: &CommitQuery) -> Result<Vec<Commit>, StoreError> {
        let commits = self.engine.commits(query).await?;
        tracing::trace!(count = commits.len(), "queried commits");
        Ok(commits)
    }

    /// A single commit, by key.
    #[tracing::instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn commit(&self, id: CommitId) -> Result<Option<Commit>, StoreError> {
        self.engine.commit(id).await
    }

    /// A single commit, by sha.
    #[tracing::instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn commit_by_sha(&self, sha: &str) -> Result<Option<Commit>, StoreError> {
        self.engine.commit_by_sha(sha).await
    }

    /// The commit with the latest date.
    pub async fn latest_commit(&self) -> Result<Option<Commit>, StoreError> {
        let mut commits = self.query(&CommitQuery::all().limit(1)).await?;
        Ok(commits.pop())
    }

    /// The author with `name`, if stored.
    #[tracing::instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn author(&self, name: &str) -> Result<Option<Author>, StoreError> {
        let mut authors = self.engine.authors(Some(name)).await?;
        Ok(authors.pop())
    }

    /// Every author, ordered by name.
    #[tracing::instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn authors(&self) -> Result<Vec<Author>, StoreError> {
        self.engine.authors(None).await
    }

    /// Start a unit of work.
    pub async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        self.engine.begin().await
    }

    /// Delete a single commit in its own transaction. The author is kept.
    #[tracing::instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn delete_commit(&self, id: CommitId) -> Result<bool, StoreError> {
        let mut tx = self.engine.begin().await?;
        let deleted = tx.delete_commit(id).await?;
        tx.commit().await?;
        tracing::debug!(%id, deleted, "delete commit");
        Ok(deleted)
    }

    /// How many commits are linked to `author`.
    pub async fn count_commits_by(&self, author: &Author) -> Result<usize, StoreError> {
        let query = CommitQuery::all().filter(Predicate::AuthorNameIs(author.name.clone()));
        Ok(self.query(&query).await?.len())
    }
}
