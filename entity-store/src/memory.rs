use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::engine::{EntityStore, Transaction};
use crate::error::{StoreError, StoreErrorKind};
use crate::model::{Author, AuthorId, Commit, CommitId, NewCommit};
use crate::query::CommitQuery;

const ENGINE: &str = "memory";

#[derive(Debug, Clone)]
struct CommitRow {
    sha: String,
    message: String,
    url: String,
    date: DateTime<Utc>,
    author: AuthorId,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    authors: BTreeMap<AuthorId, Author>,
    commits: BTreeMap<CommitId, CommitRow>,
    last_author: i64,
    last_commit: i64,
}

impl Tables {
    fn author_named(&self, name: &str) -> Option<&Author> {
        self.authors.values().find(|author| author.name == name)
    }

    fn materialize(&self, id: CommitId, row: &CommitRow) -> Result<Commit, StoreError> {
        let author = self.authors.get(&row.author).ok_or_else(|| {
            StoreError::builder(
                ENGINE,
                StoreErrorKind::Corrupt,
                format!("author {} is missing", row.author),
            )
            .context(format!("commit {id}"))
            .build()
        })?;

        Ok(Commit {
            id,
            sha: row.sha.clone(),
            message: row.message.clone(),
            url: row.url.clone(),
            date: row.date,
            author: author.clone(),
        })
    }

    fn commit(&self, id: CommitId) -> Result<Option<Commit>, StoreError> {
        self.commits
            .get(&id)
            .map(|row| self.materialize(id, row))
            .transpose()
    }
}

/// Entity store engine which keeps every record in memory.
///
/// A transaction works on a private copy of the tables and swaps it in on commit.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn commits(&self, query: &CommitQuery) -> Result<Vec<Commit>, StoreError> {
        let tables = self.tables.read().await;

        let mut commits = Vec::new();
        for (id, row) in tables.commits.iter() {
            let commit = tables.materialize(*id, row)?;
            if query.matches(&commit) {
                commits.push(commit);
            }
        }

        commits.sort_by(|a, b| query.order.compare(a, b));
        if let Some(limit) = query.limit {
            commits.truncate(limit);
        }
        Ok(commits)
    }

    async fn commit(&self, id: CommitId) -> Result<Option<Commit>, StoreError> {
        self.tables.read().await.commit(id)
    }

    async fn commit_by_sha(&self, sha: &str) -> Result<Option<Commit>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .commits
            .iter()
            .find(|(_, row)| row.sha == sha)
            .map(|(id, row)| tables.materialize(*id, row))
            .transpose()
    }

    async fn authors(&self, name: Option<&str>) -> Result<Vec<Author>, StoreError> {
        let tables = self.tables.read().await;
        let mut authors: Vec<Author> = tables
            .authors
            .values()
            .filter(|author| name.map_or(true, |name| author.name == name))
            .cloned()
            .collect();
        authors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(authors)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let guard = self.writer.clone().lock_owned().await;
        let staged = self.tables.read().await.clone();

        Ok(Box::new(MemoryTransaction {
            _guard: guard,
            tables: self.tables.clone(),
            staged,
            changes: 0,
        }))
    }
}

#[derive(Debug)]
struct MemoryTransaction {
    _guard: OwnedMutexGuard<()>,
    tables: Arc<RwLock<Tables>>,
    staged: Tables,
    changes: usize,
}

#[async_trait::async_trait]
impl Transaction for MemoryTransaction {
    async fn upsert_author(&mut self, name: &str, email: &str) -> Result<Author, StoreError> {
        if let Some(author) = self.staged.author_named(name) {
            return Ok(author.clone());
        }

        self.staged.last_author += 1;
        let author = Author {
            id: AuthorId::new(self.staged.last_author),
            name: name.to_owned(),
            email: email.to_owned(),
        };
        self.staged.authors.insert(author.id, author.clone());
        self.changes += 1;
        Ok(author)
    }

    async fn insert_commit(
        &mut self,
        commit: NewCommit,
        author: &Author,
    ) -> Result<Option<Commit>, StoreError> {
        if self.staged.commits.values().any(|row| row.sha == commit.sha) {
            return Ok(None);
        }

        if !self.staged.authors.contains_key(&author.id) {
            return Err(StoreError::builder(
                ENGINE,
                StoreErrorKind::NotFound,
                format!("author {} does not exist", author.id),
            )
            .context(format!("insert commit {}", commit.sha))
            .build());
        }

        self.staged.last_commit += 1;
        let id = CommitId::new(self.staged.last_commit);
        let date = commit.stored_date();
        let row = CommitRow {
            sha: commit.sha,
            message: commit.message,
            url: commit.url,
            date,
            author: author.id,
        };
        let stored = self.staged.materialize(id, &row)?;
        self.staged.commits.insert(id, row);
        self.changes += 1;
        Ok(Some(stored))
    }

    async fn delete_commit(&mut self, id: CommitId) -> Result<bool, StoreError> {
        let removed = self.staged.commits.remove(&id).is_some();
        if removed {
            self.changes += 1;
        }
        Ok(removed)
    }

    fn has_changes(&self) -> bool {
        self.changes > 0
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if !self.has_changes() {
            return Ok(());
        }

        let MemoryTransaction {
            _guard, tables, staged, ..
        } = *self;
        *tables.write().await = staged;
        Ok(())
    }
}
