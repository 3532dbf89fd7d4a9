use std::fmt;

use chrono::{DateTime, Utc};

/// The step of a sync pass that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Reading the latest stored commit.
    Watermark,

    /// Reading the remote feed.
    Fetch,

    /// Writing the fetched commits.
    Persist,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Watermark => f.write_str("watermark"),
            SyncStage::Fetch => f.write_str("fetch"),
            SyncStage::Persist => f.write_str("persist"),
        }
    }
}

/// How a sync pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Everything fetched was stored, or there was nothing to fetch.
    Completed,

    /// The pass stopped early and stored nothing.
    Failed {
        /// Where it stopped.
        stage: SyncStage,

        /// The error, rendered for display.
        reason: String,
    },
}

/// Summary of one sync pass, sent to subscribers when the pass ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// When the pass began. Commits without a readable date are stored with this date.
    pub started_at: DateTime<Utc>,

    /// When the pass ended.
    pub finished_at: DateTime<Utc>,

    /// Lower bound sent to the feed, if the pass got that far.
    pub watermark: Option<DateTime<Utc>>,

    /// Upper bound sent to the feed when the pass was filling in older commits
    /// left behind by an earlier truncated pass.
    pub until: Option<DateTime<Utc>>,

    /// The feed stopped at its page limit. Older commits in the range are
    /// fetched by the following passes.
    pub truncated: bool,

    /// Records received from the feed.
    pub fetched: usize,

    /// New commits stored.
    pub inserted: usize,

    /// Records whose sha was already stored.
    pub skipped: usize,

    /// Records stored with the pass start time because their date was missing or unreadable.
    pub fallback_dates: usize,

    /// How the pass ended.
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub(crate) fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            watermark: None,
            until: None,
            truncated: false,
            fetched: 0,
            inserted: 0,
            skipped: 0,
            fallback_dates: 0,
            outcome: SyncOutcome::Completed,
        }
    }

    pub(crate) fn fail(&mut self, stage: SyncStage, reason: impl fmt::Display) {
        self.inserted = 0;
        self.skipped = 0;
        self.fallback_dates = 0;
        self.outcome = SyncOutcome::Failed {
            stage,
            reason: reason.to_string(),
        };
    }

    /// Whether this pass filled in older commits rather than fetching new ones.
    pub fn is_backfill(&self) -> bool {
        self.until.is_some()
    }

    /// Whether the pass completed.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Completed)
    }
}
