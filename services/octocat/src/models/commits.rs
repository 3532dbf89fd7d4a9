//! Commit data models.

use serde::{Deserialize, Deserializer, Serialize};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A commit object, as listed by `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// The SHA of the commit.
    pub sha: String,

    /// API URL of the commit.
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,

    /// The commit details.
    pub commit: CommitDetails,
}

/// The message and signatures for a commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitDetails {
    /// The commit message.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,

    /// Who committed the change.
    #[serde(default, deserialize_with = "null_as_default")]
    pub committer: Signature,
}

/// A name, email and date attached to a commit.
///
/// Github sends `null` for some of these, which decodes as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signature {
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Email address
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,

    /// ISO 8601 timestamp, exactly as sent.
    #[serde(default)]
    pub date: Option<String>,
}

impl Commit {
    /// The committer of this commit.
    pub fn committer(&self) -> &Signature {
        &self.commit.committer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_commit() {
        let commit: Commit = serde_json::from_str(indoc::indoc! {r#"
            {
                "sha": "6377dc6de44e3557bfc1d0b186581d442a77f774",
                "url": "https://api.github.com/repos/apple/swift/commits/6377dc6",
                "commit": {
                    "message": "Fix the build",
                    "committer": {
                        "name": "Ada Lovelace",
                        "email": "ada@example.com",
                        "date": "2024-03-01T12:00:00Z"
                    }
                }
            }
        "#})
        .unwrap();

        assert_eq!(commit.committer().name, "Ada Lovelace");
        assert_eq!(commit.committer().date.as_deref(), Some("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn missing_committer_is_empty() {
        let commit: Commit = serde_json::from_str(
            r#"{"sha": "abc", "url": "u", "commit": {"message": "m"}}"#,
        )
        .unwrap();

        assert_eq!(commit.committer().name, "");
        assert!(commit.committer().date.is_none());
    }

    #[test]
    fn null_committer_is_empty() {
        let commit: Commit = serde_json::from_str(
            r#"{"sha": "abc", "url": null, "commit": {"message": null, "committer": null}}"#,
        )
        .unwrap();

        assert_eq!(commit.url, "");
        assert_eq!(commit.commit.message, "");
        assert_eq!(commit.committer().email, "");
    }

    #[test]
    fn missing_sha_is_rejected() {
        let result = serde_json::from_str::<Commit>(r#"{"url": "u", "commit": {"message": "m"}}"#);
        assert!(result.is_err());
    }
}
