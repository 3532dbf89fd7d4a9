//! Filtered listing of stored commits.

use entity_store::{Author, Commit, CommitId, CommitQuery, SortOrder, Store, StoreError};

use crate::filter::Filter;

/// A commit together with how much else its author has done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetail {
    /// The commit.
    pub commit: Commit,

    /// Commits by the same author, not counting this one.
    pub other_commits_by_author: usize,
}

/// Lists commits from a store through the active [`Filter`].
#[derive(Debug, Clone)]
pub struct CommitView {
    store: Store,
    filter: Filter,
}

impl CommitView {
    /// A view showing every commit in `store`.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            filter: Filter::default(),
        }
    }

    /// The active filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Replace the active filter.
    pub fn set_filter(&mut self, filter: Filter) {
        tracing::debug!(%filter, "filter changed");
        self.filter = filter;
    }

    fn query(&self) -> CommitQuery {
        let query = CommitQuery::all().order(SortOrder::DateDescending);
        match self.filter.predicate() {
            Some(predicate) => query.filter(predicate),
            None => query,
        }
    }

    /// Commits matching the active filter, newest first.
    pub async fn try_list_commits(&self) -> Result<Vec<Commit>, StoreError> {
        self.store.query(&self.query()).await
    }

    /// Commits matching the active filter, newest first. Empty if the store fails.
    pub async fn list_commits(&self) -> Vec<Commit> {
        match self.try_list_commits().await {
            Ok(commits) => commits,
            Err(error) => {
                tracing::error!(filter = %self.filter, %error, "listing commits failed");
                Vec::new()
            }
        }
    }

    /// Every author, ordered by name.
    pub async fn authors(&self) -> Result<Vec<Author>, StoreError> {
        self.store.authors().await
    }

    /// A single commit and the number of other commits by its author.
    pub async fn commit_detail(&self, id: CommitId) -> Result<Option<CommitDetail>, StoreError> {
        let Some(commit) = self.store.commit(id).await? else {
            return Ok(None);
        };

        let total = self.store.count_commits_by(&commit.author).await?;
        Ok(Some(CommitDetail {
            other_commits_by_author: total.saturating_sub(1),
            commit,
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, SubsecRound as _, Utc};
    use entity_store::{MemoryStore, NewCommit};

    use super::*;
    use crate::testing::{FailAt, FailingStore};

    async fn seed(store: &Store, commits: &[(&str, &str, &str, DateTime<Utc>)]) {
        let mut tx = store.begin().await.unwrap();
        for (sha, author, message, date) in commits {
            let author = tx
                .upsert_author(author, &format!("{author}@example.com"))
                .await
                .unwrap();
            tx.insert_commit(
                NewCommit {
                    sha: (*sha).into(),
                    message: (*message).into(),
                    url: String::new(),
                    date: *date,
                },
                &author,
            )
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn shas(commits: &[Commit]) -> Vec<&str> {
        commits.iter().map(|commit| commit.sha.as_str()).collect()
    }

    async fn three_messages() -> CommitView {
        let store: Store = MemoryStore::new().into();
        let now = Utc::now();
        seed(
            &store,
            &[
                ("c1", "Ada", "Fix crash", now - Duration::hours(3)),
                ("c2", "Grace", "Merge pull request #12", now - Duration::hours(2)),
                ("c3", "Ada", "Add feature", now - Duration::hours(1)),
            ],
        )
        .await;
        CommitView::new(store)
    }

    #[tokio::test]
    async fn presets_on_three_messages() {
        let mut view = three_messages().await;
        assert_eq!(shas(&view.list_commits().await), ["c3", "c2", "c1"]);

        view.set_filter(Filter::OnlyFixes);
        assert_eq!(shas(&view.list_commits().await), ["c1"]);

        view.set_filter(Filter::IgnorePullRequests);
        assert_eq!(shas(&view.list_commits().await), ["c3", "c1"]);

        view.set_filter(Filter::ByAuthor("Ada".into()));
        assert_eq!(shas(&view.list_commits().await), ["c3", "c1"]);

        view.set_filter(Filter::ByAuthor("ada".into()));
        assert!(view.list_commits().await.is_empty());

        view.set_filter(Filter::All);
        assert_eq!(view.list_commits().await.len(), 3);
    }

    #[tokio::test]
    async fn recent_window_boundary() {
        let store: Store = MemoryStore::new().into();
        let now = Utc::now().trunc_subsecs(3);
        seed(
            &store,
            &[
                ("old", "Ada", "old", now - Duration::hours(12) - Duration::seconds(1)),
                ("new", "Ada", "new", now - Duration::hours(11)),
            ],
        )
        .await;

        let mut view = CommitView::new(store);
        view.set_filter(Filter::OnlyRecent);
        assert_eq!(view.filter(), &Filter::OnlyRecent);
        assert_eq!(shas(&view.list_commits().await), ["new"]);
    }

    #[tokio::test]
    async fn deleting_keeps_the_author() {
        let view = three_messages().await;
        let commits = view.try_list_commits().await.unwrap();
        let fix = commits.iter().find(|c| c.sha == "c1").unwrap();

        let detail = view.commit_detail(fix.id).await.unwrap().unwrap();
        assert_eq!(detail.other_commits_by_author, 1);

        assert!(view.store.delete_commit(fix.id).await.unwrap());
        assert!(view.commit_detail(fix.id).await.unwrap().is_none());
        assert_eq!(view.list_commits().await.len(), 2);

        let authors = view.authors().await.unwrap();
        assert_eq!(
            authors.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            ["Ada", "Grace"]
        );
    }

    #[tokio::test]
    async fn query_failures_list_nothing() {
        let store: Store = FailingStore::new(FailAt::Query).into();
        seed(&store, &[("c1", "Ada", "Fix crash", Utc::now())]).await;

        let view = CommitView::new(store);
        assert!(view.try_list_commits().await.is_err());
        assert_eq!(view.list_commits().await, Vec::<Commit>::new());
    }
}
