use std::fmt;
use std::str::FromStr as _;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row as _, Sqlite};

use crate::engine::{EntityStore, Transaction};
use crate::error::{StoreError, StoreErrorKind};
use crate::model::{Author, AuthorId, Commit, CommitId, NewCommit};
use crate::query::{CommitQuery, Predicate, SortOrder};

const ENGINE: &str = "sqlite";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS commits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sha TEXT NOT NULL UNIQUE,
        message TEXT NOT NULL,
        url TEXT NOT NULL,
        date INTEGER NOT NULL,
        author_id INTEGER NOT NULL REFERENCES authors(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_commits_date ON commits(date)",
    "CREATE INDEX IF NOT EXISTS idx_commits_author ON commits(author_id)",
];

const SELECT_COMMITS: &str = r#"
    SELECT c.id, c.sha, c.message, c.url, c.date,
           a.id AS author_id, a.name AS author_name, a.email AS author_email
    FROM commits c
    JOIN authors a ON a.id = c.author_id
"#;

fn sqlx_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |error| {
        let kind = match &error {
            sqlx::Error::RowNotFound => StoreErrorKind::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreErrorKind::Conflict,
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreErrorKind::NotFound
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => StoreErrorKind::Corrupt,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreErrorKind::Unavailable
            }
            _ => StoreErrorKind::Backend,
        };
        StoreError::builder(ENGINE, kind, error)
            .context(context)
            .build()
    }
}

fn millis(date: DateTime<Utc>) -> i64 {
    date.timestamp_millis()
}

fn author_from_row(row: &SqliteRow) -> Result<Author, sqlx::Error> {
    Ok(Author {
        id: AuthorId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
    })
}

fn commit_from_row(row: &SqliteRow) -> Result<Commit, StoreError> {
    let decode = sqlx_error("decode commit");
    let (id, sha, message, url, date, author) = (|| {
        Ok::<_, sqlx::Error>((
            row.try_get::<i64, _>("id")?,
            row.try_get::<String, _>("sha")?,
            row.try_get::<String, _>("message")?,
            row.try_get::<String, _>("url")?,
            row.try_get::<i64, _>("date")?,
            Author {
                id: AuthorId::new(row.try_get("author_id")?),
                name: row.try_get("author_name")?,
                email: row.try_get("author_email")?,
            },
        ))
    })()
    .map_err(decode)?;

    let date = DateTime::<Utc>::from_timestamp_millis(date).ok_or_else(|| {
        StoreError::builder(
            ENGINE,
            StoreErrorKind::Corrupt,
            format!("date {date} is out of range"),
        )
        .context(format!("commit {id}"))
        .build()
    })?;

    Ok(Commit {
        id: CommitId::new(id),
        sha,
        message,
        url,
        date,
        author,
    })
}

fn push_predicate(builder: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate) {
    match predicate {
        Predicate::MessageContains(needle) => {
            builder
                .push("instr(lower(c.message), lower(")
                .push_bind(needle.clone())
                .push(")) > 0");
        }
        Predicate::MessageStartsWith(prefix) => {
            builder
                .push("instr(c.message, ")
                .push_bind(prefix.clone())
                .push(") = 1");
        }
        Predicate::DateAfter(instant) => {
            builder.push("c.date > ").push_bind(millis(*instant));
        }
        Predicate::AuthorNameIs(name) => {
            builder.push("a.name = ").push_bind(name.clone());
        }
        Predicate::Not(inner) => {
            builder.push("NOT (");
            push_predicate(builder, inner);
            builder.push(")");
        }
        Predicate::All(all) if all.is_empty() => {
            builder.push("1 = 1");
        }
        Predicate::All(all) => {
            builder.push("(");
            for (i, predicate) in all.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                builder.push("(");
                push_predicate(builder, predicate);
                builder.push(")");
            }
            builder.push(")");
        }
    }
}

fn commits_query(query: &CommitQuery) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(SELECT_COMMITS);

    if let Some(predicate) = &query.predicate {
        builder.push(" WHERE ");
        push_predicate(&mut builder, predicate);
    }

    builder.push(match query.order {
        SortOrder::DateDescending => " ORDER BY c.date DESC, c.id DESC",
        SortOrder::DateAscending => " ORDER BY c.date ASC, c.id ASC",
    });

    if let Some(limit) = query.limit {
        builder
            .push(" LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }

    builder
}

/// Entity store engine backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    #[tracing::instrument(level = "debug")]
    pub async fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(sqlx_error("connect"))?;

        tracing::debug!("database pool created");
        Self::with_pool(pool).await
    }

    /// A private database which lives as long as this store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx_error("connect"))?;

        // Every connection to ":memory:" is a distinct database, so hold exactly one forever.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(sqlx_error("connect"))?;

        Self::with_pool(pool).await
    }

    /// Use an existing pool, creating the schema if needed.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(sqlx_error("create schema"))?;
        }

        Ok(Self { pool })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl EntityStore for SqliteStore {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn commits(&self, query: &CommitQuery) -> Result<Vec<Commit>, StoreError> {
        let rows = commits_query(query)
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error("query commits"))?;

        rows.iter().map(commit_from_row).collect()
    }

    async fn commit(&self, id: CommitId) -> Result<Option<Commit>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COMMITS} WHERE c.id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error("get commit"))?;

        row.as_ref().map(commit_from_row).transpose()
    }

    async fn commit_by_sha(&self, sha: &str) -> Result<Option<Commit>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COMMITS} WHERE c.sha = ?"))
            .bind(sha)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error("get commit by sha"))?;

        row.as_ref().map(commit_from_row).transpose()
    }

    async fn authors(&self, name: Option<&str>) -> Result<Vec<Author>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, name, email FROM authors");
        if let Some(name) = name {
            builder.push(" WHERE name = ").push_bind(name.to_owned());
        }
        builder.push(" ORDER BY name ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error("query authors"))?;

        rows.iter()
            .map(author_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlx_error("decode author"))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(sqlx_error("begin"))?;
        Ok(Box::new(SqliteTransaction { tx, changes: 0 }))
    }
}

struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
    changes: u64,
}

impl fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Transaction for SqliteTransaction {
    async fn upsert_author(&mut self, name: &str, email: &str) -> Result<Author, StoreError> {
        let result =
            sqlx::query("INSERT INTO authors (name, email) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .bind(email)
                .execute(&mut *self.tx)
                .await
                .map_err(sqlx_error("upsert author"))?;
        self.changes += result.rows_affected();

        let row = sqlx::query("SELECT id, name, email FROM authors WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(sqlx_error("upsert author"))?;

        author_from_row(&row).map_err(sqlx_error("decode author"))
    }

    async fn insert_commit(
        &mut self,
        commit: NewCommit,
        author: &Author,
    ) -> Result<Option<Commit>, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO commits (sha, message, url, date, author_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(sha) DO NOTHING
            "#,
        )
        .bind(&commit.sha)
        .bind(&commit.message)
        .bind(&commit.url)
        .bind(millis(commit.stored_date()))
        .bind(author.id.get())
        .execute(&mut *self.tx)
        .await
        .map_err(sqlx_error("insert commit"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.changes += result.rows_affected();

        let row = sqlx::query(&format!("{SELECT_COMMITS} WHERE c.id = ?"))
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(sqlx_error("insert commit"))?;

        commit_from_row(&row).map(Some)
    }

    async fn delete_commit(&mut self, id: CommitId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM commits WHERE id = ?")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(sqlx_error("delete commit"))?;

        self.changes += result.rows_affected();
        Ok(result.rows_affected() > 0)
    }

    fn has_changes(&self) -> bool {
        self.changes > 0
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if !self.has_changes() {
            return Ok(());
        }

        self.tx.commit().await.map_err(sqlx_error("commit"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_translate_to_sql() {
        let query = CommitQuery::all()
            .filter(Predicate::All(vec![
                Predicate::MessageContains("fix".into()),
                Predicate::not(Predicate::MessageStartsWith("Merge".into())),
            ]))
            .limit(5);

        let builder = commits_query(&query);
        let sql = builder.sql();
        assert!(sql.contains(
            "WHERE ((instr(lower(c.message), lower(?)) > 0) AND (NOT (instr(c.message, ?) = 1)))"
        ));
        assert!(sql.contains("ORDER BY c.date DESC, c.id DESC LIMIT ?"));
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let again = SqliteStore::with_pool(store.pool().clone()).await.unwrap();
        assert!(again.authors(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("commits.db")).unwrap();

        {
            let store = SqliteStore::open(&path).await.unwrap();
            let mut tx = store.begin().await.unwrap();
            let author = tx.upsert_author("Ada", "ada@example.com").await.unwrap();
            tx.insert_commit(
                NewCommit {
                    sha: "a1".into(),
                    message: "first".into(),
                    url: "https://api.example.com/a1".into(),
                    date: Utc::now(),
                },
                &author,
            )
            .await
            .unwrap();
            tx.commit().await.unwrap();
            store.pool().close().await;
        }

        let store = SqliteStore::open(&path).await.unwrap();
        let commit = store.commit_by_sha("a1").await.unwrap().unwrap();
        assert_eq!(commit.author.name, "Ada");
    }
}
