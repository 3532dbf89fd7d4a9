//! Incremental sync of the remote commit feed into the entity store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use entity_store::{CommitId, NewCommit, Store, StoreError};
use futures::FutureExt as _;
use tokio::sync::{broadcast, Mutex};

use crate::error::Error;
use crate::inflight::{Handle, InFlight};
use crate::report::{SyncReport, SyncStage};
use crate::source::CommitSource;

const EVENT_CAPACITY: usize = 16;

/// Older commits still to fetch after a pass stopped at the feed's page limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Backfill {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

/// Parse a feed timestamp, accepting RFC 3339 with any offset.
fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(date) => Some(date.with_timezone(&Utc)),
        Err(error) => {
            tracing::debug!(%raw, %error, "unreadable commit date");
            None
        }
    }
}

/// The range left to fetch after a truncated batch whose oldest dated commit is `oldest`.
///
/// The watermark only moves forward, so everything between `since` and the
/// oldest fetched commit must be requested explicitly. `until` is inclusive
/// on the feed, and commits fetched twice are skipped by sha.
fn next_backfill(
    since: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
    oldest: Option<DateTime<Utc>>,
) -> Option<Backfill> {
    let Some(oldest) = oldest else {
        tracing::warn!("truncated batch has no readable dates, older commits were not fetched");
        return None;
    };

    if until.is_some_and(|until| oldest >= until) {
        tracing::warn!(
            %oldest,
            "a full batch shares one commit date, older commits were not fetched"
        );
        return None;
    }

    tracing::info!(%since, until = %oldest, "older commits remain, filling in on the next pass");
    Some(Backfill {
        since,
        until: oldest,
    })
}

/// Resolves to the report of the sync pass it started or joined.
#[derive(Debug)]
#[must_use = "the pass runs regardless, but its report is only available through the handle"]
pub struct SyncHandle {
    inner: Handle<SyncReport>,
    joined: bool,
}

impl SyncHandle {
    /// Whether this call joined a pass that was already running.
    pub fn joined(&self) -> bool {
        self.joined
    }
}

impl Future for SyncHandle {
    type Output = Result<SyncReport, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner
            .poll_unpin(cx)
            .map(|result| result.map_err(|_| Error::Interrupted))
    }
}

#[derive(Debug)]
struct Inner {
    store: Store,
    source: Arc<dyn CommitSource>,
    writer: Mutex<()>,
    inflight: InFlight<SyncReport>,
    events: broadcast::Sender<SyncReport>,
    backfill: parking_lot::Mutex<Option<Backfill>>,
}

/// Pulls new commits from a [`CommitSource`] into a [`Store`].
///
/// Every write to the store made through this type is serialized, and
/// overlapping calls to [`Synchronizer::sync`] share a single pass.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    /// Sync commits from `source` into `store`.
    pub fn new<S>(store: Store, source: S) -> Self
    where
        S: CommitSource + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                source: Arc::new(source),
                writer: Mutex::new(()),
                inflight: InFlight::default(),
                events,
                backfill: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// The store commits are written to.
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Receive the report of every pass that ends after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncReport> {
        self.inner.events.subscribe()
    }

    /// Whether a pass started by [`Synchronizer::sync`] is running.
    pub fn is_syncing(&self) -> bool {
        self.inner.inflight.is_running()
    }

    /// Start a pass in the background, or join the one already running.
    ///
    /// Must be called within a tokio runtime.
    pub fn sync(&self) -> SyncHandle {
        let this = self.clone();
        let (inner, joined) = self
            .inner
            .inflight
            .handle(move || Box::pin(async move { this.sync_now().await }));

        if joined {
            tracing::debug!("sync already running, joining it");
        }
        SyncHandle { inner, joined }
    }

    /// The lower bound for the next fetch: one second after the newest stored
    /// commit, or the Unix epoch when nothing is stored.
    pub async fn watermark(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(match self.inner.store.latest_commit().await? {
            Some(commit) => commit.date + Duration::seconds(1),
            None => DateTime::<Utc>::UNIX_EPOCH,
        })
    }

    /// Whether older commits remain to be fetched after a truncated pass.
    ///
    /// While this is true, each pass fills in the oldest missing range before
    /// new commits are fetched again.
    pub fn is_backfilling(&self) -> bool {
        self.inner.backfill.lock().is_some()
    }

    /// Delete a commit, waiting for any running pass to finish first.
    #[tracing::instrument(skip(self))]
    pub async fn delete_commit(&self, id: CommitId) -> Result<bool, Error> {
        let _writer = self.inner.writer.lock().await;
        Ok(self.inner.store.delete_commit(id).await?)
    }

    /// Run one pass on the current task.
    ///
    /// Failures end the pass without storing anything and are described in the
    /// report rather than returned.
    #[tracing::instrument(skip(self), fields(source = %self.inner.source.name()))]
    pub async fn sync_now(&self) -> SyncReport {
        let _writer = self.inner.writer.lock().await;

        let mut report = SyncReport::started(Utc::now().trunc_subsecs(3));
        self.run(&mut report).await;
        report.finished_at = Utc::now();

        if report.is_success() {
            tracing::info!(
                fetched = report.fetched,
                inserted = report.inserted,
                skipped = report.skipped,
                fallback_dates = report.fallback_dates,
                "sync finished"
            );
        } else {
            tracing::error!(outcome = ?report.outcome, "sync failed");
        }

        // Nobody listening is fine.
        let _ = self.inner.events.send(report.clone());
        report
    }

    async fn run(&self, report: &mut SyncReport) {
        let pending = *self.inner.backfill.lock();
        let (since, until) = match pending {
            Some(Backfill { since, until }) => (since, Some(until)),
            None => match self.watermark().await {
                Ok(watermark) => (watermark, None),
                Err(error) => return report.fail(SyncStage::Watermark, error),
            },
        };
        report.watermark = Some(since);
        report.until = until;
        tracing::debug!(%since, ?until, "fetching commits");

        let batch = match self.inner.source.fetch_range(Some(since), until).await {
            Ok(batch) => batch,
            Err(error) => return report.fail(SyncStage::Fetch, error),
        };
        report.fetched = batch.commits.len();
        report.truncated = batch.truncated;

        let oldest = batch
            .commits
            .iter()
            .filter_map(|record| parse_date(record.committer().date.as_deref()))
            .min();

        if !batch.commits.is_empty() {
            if let Err(error) = self.persist(batch.commits, report).await {
                return report.fail(SyncStage::Persist, error);
            }
        }

        *self.inner.backfill.lock() = if batch.truncated {
            next_backfill(since, until, oldest)
        } else {
            None
        };
    }

    async fn persist(
        &self,
        records: Vec<octocat::models::Commit>,
        report: &mut SyncReport,
    ) -> Result<(), StoreError> {
        let mut tx = self.inner.store.begin().await?;
        let (mut inserted, mut skipped, mut fallback_dates) = (0, 0, 0);

        for record in records {
            let committer = record.committer();
            let date = parse_date(committer.date.as_deref()).unwrap_or_else(|| {
                fallback_dates += 1;
                report.started_at
            });

            let author = tx
                .upsert_author(&committer.name, &committer.email)
                .await?;

            let commit = NewCommit {
                sha: record.sha,
                message: record.commit.message,
                url: record.url,
                date,
            };
            match tx.insert_commit(commit, &author).await? {
                Some(_) => inserted += 1,
                None => skipped += 1,
            }
        }

        tx.commit().await?;

        report.inserted = inserted;
        report.skipped = skipped;
        report.fallback_dates = fallback_dates;
        Ok(())
    }
}
