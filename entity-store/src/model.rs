//! Records held by an entity store.

use std::fmt;

use chrono::{DateTime, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};

macro_rules! surrogate_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw key assigned by the store.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

surrogate_key!(
    /// Store-assigned key of an [`Author`].
    AuthorId
);

surrogate_key!(
    /// Store-assigned key of a [`Commit`].
    CommitId
);

/// A commit author, unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Store-assigned key.
    pub id: AuthorId,

    /// Unique name of the author.
    pub name: String,

    /// Email seen when the author was first stored.
    pub email: String,
}

/// A commit, unique by sha, linked to exactly one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Store-assigned key.
    pub id: CommitId,

    /// Remote identifier of the commit.
    pub sha: String,

    /// Full commit message.
    pub message: String,

    /// API URL of the commit.
    pub url: String,

    /// Commit date, at millisecond precision.
    pub date: DateTime<Utc>,

    /// The author of this commit.
    pub author: Author,
}

/// The fields of a commit which has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    /// Remote identifier of the commit.
    pub sha: String,

    /// Full commit message.
    pub message: String,

    /// API URL of the commit.
    pub url: String,

    /// Commit date.
    pub date: DateTime<Utc>,
}

impl NewCommit {
    /// The date as it will be persisted.
    pub fn stored_date(&self) -> DateTime<Utc> {
        self.date.trunc_subsecs(3)
    }
}
