//! Predicates and ordering for commit queries.
//!
//! Every engine evaluates these identically. Text comparisons fold ASCII case
//! only, which is what SQLite's `lower()` does without extensions.

use chrono::{DateTime, Utc};

use crate::model::Commit;

/// A condition on a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The message contains the text, ignoring case.
    MessageContains(String),

    /// The message begins with the text, case-sensitive.
    MessageStartsWith(String),

    /// The commit date is strictly after the instant.
    DateAfter(DateTime<Utc>),

    /// The author's name is exactly the text.
    AuthorNameIs(String),

    /// The inner predicate does not hold.
    Not(Box<Predicate>),

    /// Every inner predicate holds. An empty list always holds.
    All(Vec<Predicate>),
}

impl Predicate {
    /// Negate a predicate.
    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    /// Evaluate the predicate against a commit.
    pub fn matches(&self, commit: &Commit) -> bool {
        match self {
            Predicate::MessageContains(needle) => commit
                .message
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            Predicate::MessageStartsWith(prefix) => commit.message.starts_with(prefix.as_str()),
            Predicate::DateAfter(instant) => commit.date > *instant,
            Predicate::AuthorNameIs(name) => commit.author.name == *name,
            Predicate::Not(inner) => !inner.matches(commit),
            Predicate::All(all) => all.iter().all(|p| p.matches(commit)),
        }
    }
}

/// Order of commit query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest first. Commits with equal dates list the most recently stored first.
    #[default]
    DateDescending,

    /// Oldest first. Commits with equal dates list the first stored first.
    DateAscending,
}

impl SortOrder {
    /// Compare two commits under this order.
    pub fn compare(&self, a: &Commit, b: &Commit) -> std::cmp::Ordering {
        match self {
            SortOrder::DateDescending => b.date.cmp(&a.date).then(b.id.cmp(&a.id)),
            SortOrder::DateAscending => a.date.cmp(&b.date).then(a.id.cmp(&b.id)),
        }
    }
}

/// A query over stored commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitQuery {
    /// Only commits matching this predicate. `None` matches everything.
    pub predicate: Option<Predicate>,

    /// Result order.
    pub order: SortOrder,

    /// At most this many results.
    pub limit: Option<usize>,
}

impl CommitQuery {
    /// Every commit, newest first.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict the query to commits matching `predicate`.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Set the result order.
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Return at most `limit` results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a commit passes the predicate.
    pub fn matches(&self, commit: &Commit) -> bool {
        self.predicate.as_ref().map_or(true, |p| p.matches(commit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::{Author, AuthorId, CommitId};

    fn commit(id: i64, message: &str, author: &str, date: DateTime<Utc>) -> Commit {
        Commit {
            id: CommitId::new(id),
            sha: format!("sha{id}"),
            message: message.into(),
            url: String::new(),
            date,
            author: Author {
                id: AuthorId::new(1),
                name: author.into(),
                email: String::new(),
            },
        }
    }

    #[test]
    fn contains_ignores_case() {
        let now = Utc::now();
        let p = Predicate::MessageContains("fix".into());
        assert!(p.matches(&commit(1, "Fix bug", "a", now)));
        assert!(p.matches(&commit(2, "prefix FIXED", "a", now)));
        assert!(!p.matches(&commit(3, "Add feature", "a", now)));
    }

    #[test]
    fn starts_with_is_case_sensitive() {
        let now = Utc::now();
        let p = Predicate::not(Predicate::MessageStartsWith("Merge pull request".into()));
        assert!(!p.matches(&commit(1, "Merge pull request #1", "a", now)));
        assert!(p.matches(&commit(2, "merge pull request #1", "a", now)));
    }

    #[test]
    fn date_after_is_strict() {
        let now = Utc::now();
        let p = Predicate::DateAfter(now);
        assert!(!p.matches(&commit(1, "m", "a", now)));
        assert!(p.matches(&commit(2, "m", "a", now + Duration::milliseconds(1))));
    }

    #[test]
    fn empty_conjunction_holds() {
        assert!(Predicate::All(vec![]).matches(&commit(1, "m", "a", Utc::now())));
    }

    #[test]
    fn descending_breaks_ties_by_newest_id() {
        let now = Utc::now();
        let mut commits = vec![
            commit(1, "m", "a", now),
            commit(3, "m", "a", now - Duration::hours(1)),
            commit(2, "m", "a", now),
        ];
        commits.sort_by(|a, b| SortOrder::DateDescending.compare(a, b));
        let ids: Vec<i64> = commits.iter().map(|c| c.id.get()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
