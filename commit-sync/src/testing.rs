//! Store engines which fail on demand.

use entity_store::{
    Author, Commit, CommitId, CommitQuery, EntityStore, MemoryStore, NewCommit, StoreError,
    StoreErrorKind, Transaction,
};

const ENGINE: &str = "failing";

/// Where a [`FailingStore`] fails.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FailAt {
    /// The nth commit inserted by a transaction, counting from 1.
    Insert(usize),

    /// Committing a transaction.
    Commit,

    /// Every commit query.
    Query,
}

fn injected() -> StoreError {
    StoreError::new(ENGINE, StoreErrorKind::Unavailable, "injected failure")
}

/// A memory store which fails at a chosen point.
#[derive(Debug)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    fail_at: Option<FailAt>,
}

impl FailingStore {
    pub(crate) fn new(fail_at: FailAt) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_at: Some(fail_at),
        }
    }
}

#[derive(Debug)]
struct FailingTransaction {
    inner: Box<dyn Transaction>,
    fail_at: Option<FailAt>,
    inserts: usize,
}

#[async_trait::async_trait]
impl EntityStore for FailingStore {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn commits(&self, query: &CommitQuery) -> Result<Vec<Commit>, StoreError> {
        if matches!(self.fail_at, Some(FailAt::Query)) {
            return Err(injected());
        }
        self.inner.commits(query).await
    }

    async fn commit(&self, id: CommitId) -> Result<Option<Commit>, StoreError> {
        self.inner.commit(id).await
    }

    async fn commit_by_sha(&self, sha: &str) -> Result<Option<Commit>, StoreError> {
        self.inner.commit_by_sha(sha).await
    }

    async fn authors(&self, name: Option<&str>) -> Result<Vec<Author>, StoreError> {
        self.inner.authors(name).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin().await?,
            fail_at: self.fail_at,
            inserts: 0,
        }))
    }
}

#[async_trait::async_trait]
impl Transaction for FailingTransaction {
    async fn upsert_author(&mut self, name: &str, email: &str) -> Result<Author, StoreError> {
        self.inner.upsert_author(name, email).await
    }

    async fn insert_commit(
        &mut self,
        commit: NewCommit,
        author: &Author,
    ) -> Result<Option<Commit>, StoreError> {
        self.inserts += 1;
        if matches!(self.fail_at, Some(FailAt::Insert(n)) if n == self.inserts) {
            return Err(injected());
        }
        self.inner.insert_commit(commit, author).await
    }

    async fn delete_commit(&mut self, id: CommitId) -> Result<bool, StoreError> {
        self.inner.delete_commit(id).await
    }

    fn has_changes(&self) -> bool {
        self.inner.has_changes()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if matches!(self.fail_at, Some(FailAt::Commit)) {
            return Err(injected());
        }
        self.inner.commit().await
    }
}
