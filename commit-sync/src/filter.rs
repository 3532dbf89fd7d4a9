//! Named filters over the stored commits.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use entity_store::Predicate;

/// How many hours back [`Filter::OnlyRecent`] reaches.
pub const RECENT_HOURS: i64 = 12;

/// A preset filter. Exactly one is active on a view at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Filter {
    /// Every commit.
    #[default]
    All,

    /// Commits whose message mentions "fix", in any case.
    OnlyFixes,

    /// Commits whose message does not begin with "Merge pull request".
    IgnorePullRequests,

    /// Commits from the last twelve hours.
    OnlyRecent,

    /// Commits by the author with exactly this name.
    ByAuthor(String),
}

impl Filter {
    /// Label for presenting the filter.
    pub fn title(&self) -> String {
        match self {
            Filter::All => "Show all commits".into(),
            Filter::OnlyFixes => "Show only fixes".into(),
            Filter::IgnorePullRequests => "Ignore pull requests".into(),
            Filter::OnlyRecent => "Show only recent".into(),
            Filter::ByAuthor(name) => format!("Show only commits by {name}"),
        }
    }

    /// The predicate for this filter, evaluated at `now`. `None` matches everything.
    pub fn predicate_at(&self, now: DateTime<Utc>) -> Option<Predicate> {
        match self {
            Filter::All => None,
            Filter::OnlyFixes => Some(Predicate::MessageContains("fix".into())),
            Filter::IgnorePullRequests => Some(Predicate::not(Predicate::MessageStartsWith(
                "Merge pull request".into(),
            ))),
            Filter::OnlyRecent => Some(Predicate::DateAfter(now - Duration::hours(RECENT_HOURS))),
            Filter::ByAuthor(name) => Some(Predicate::AuthorNameIs(name.clone())),
        }
    }

    /// The predicate for this filter, evaluated now.
    pub fn predicate(&self) -> Option<Predicate> {
        self.predicate_at(Utc::now())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn all_has_no_predicate() {
        assert!(Filter::All.predicate().is_none());
        assert_eq!(Filter::default(), Filter::All);
    }

    #[test]
    fn recent_window_is_twelve_hours() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            Filter::OnlyRecent.predicate_at(now),
            Some(Predicate::DateAfter(
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
            ))
        );
    }

    #[test]
    fn titles() {
        assert_eq!(Filter::OnlyFixes.to_string(), "Show only fixes");
        assert_eq!(
            Filter::ByAuthor("Ada".into()).title(),
            "Show only commits by Ada"
        );
    }
}
