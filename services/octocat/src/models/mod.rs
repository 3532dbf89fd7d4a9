//! Github API object models.

pub mod commits;

pub use commits::{Commit, CommitDetails, Signature};

/// Commits gathered from consecutive pages by one fetch.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    /// Commits in the order Github listed them, newest first.
    pub commits: Vec<Commit>,

    /// The page limit was reached before a short page, so older commits in
    /// the requested range were left unfetched.
    pub truncated: bool,
}

/// One page of the commit listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Commits which decoded successfully, in the order Github sent them.
    pub commits: Vec<Commit>,

    /// How many records the page held, including any which failed to decode.
    pub received: usize,
}

impl Page {
    /// Decode a page from raw JSON records, skipping any that do not match [`Commit`].
    pub fn from_records(records: Vec<serde_json::Value>) -> Self {
        let received = records.len();
        let commits = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value::<Commit>(record) {
                Ok(commit) => Some(commit),
                Err(error) => {
                    tracing::warn!(index, %error, "skipping malformed commit record");
                    None
                }
            })
            .collect();

        Self { commits, received }
    }
}
