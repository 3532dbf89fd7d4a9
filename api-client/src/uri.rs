//! URI utilities.

use camino::Utf8Path;
use http::Uri;

/// Serialize and Deserialize a URI to and from a string.
pub mod serde {
    use http::Uri;
    use serde::{Deserialize as _, Deserializer};

    /// Deserialize a URI from a string
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Uri, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }

    /// Serialize a URI as a string
    pub fn serialize<S>(uri: &Uri, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(uri)
    }
}

/// Extension trait for URIs.
pub trait UriExtension {
    /// Join a path to a URI, dropping any query string.
    ///
    /// Fails when the joined path is not a valid URI path.
    fn join<P: AsRef<str>>(self, path: P) -> Result<Uri, http::Error>;

    /// Append an already-encoded query string to a URI.
    ///
    /// Existing query parameters are kept, and an empty query leaves the URI unchanged.
    fn with_query(self, query: &str) -> Result<Uri, http::Error>;
}

impl UriExtension for Uri {
    fn join<P: AsRef<str>>(self, path: P) -> Result<Uri, http::Error> {
        let mut parts = self.into_parts();

        parts.path_and_query = match parts.path_and_query.as_ref() {
            Some(pq) => {
                let joined = Utf8Path::new(pq.path()).join(path.as_ref());
                Some(http::uri::PathAndQuery::from_maybe_shared(
                    joined.to_string(),
                )?)
            }
            None => None,
        };
        Ok(Uri::from_parts(parts)?)
    }

    fn with_query(self, query: &str) -> Result<Uri, http::Error> {
        if query.is_empty() {
            return Ok(self);
        }

        let mut parts = self.into_parts();
        let path_and_query = match parts.path_and_query.as_ref() {
            Some(pq) => match pq.query() {
                Some(existing) if !existing.is_empty() => {
                    format!("{}?{}&{}", pq.path(), existing, query)
                }
                _ => format!("{}?{}", pq.path(), query),
            },
            None => format!("/?{query}"),
        };

        parts.path_and_query = Some(http::uri::PathAndQuery::from_maybe_shared(
            path_and_query,
        )?);
        Ok(Uri::from_parts(parts)?)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_uri_join() {
        let uri = "http://example.com".parse::<Uri>().unwrap();
        let joined = uri.join("foo").unwrap();
        assert_eq!(joined.to_string(), "http://example.com/foo");

        let uri = "http://example.com/bar/".parse::<Uri>().unwrap();
        let joined = uri.join("repos/apple/swift/commits").unwrap();
        assert_eq!(
            joined.to_string(),
            "http://example.com/bar/repos/apple/swift/commits"
        );

        let uri = "http://example.com/bar".parse::<Uri>().unwrap();
        let joined = uri.join("/foo").unwrap();
        assert_eq!(joined.to_string(), "http://example.com/foo");
    }

    #[test]
    fn test_uri_join_empty() {
        let uri = "http://example.com".parse::<Uri>().unwrap();
        let joined = uri.join("").unwrap();
        assert_eq!(joined.to_string(), "http://example.com/");

        let uri = "http://example.com/bar".parse::<Uri>().unwrap();
        let joined = uri.join("").unwrap();
        assert_eq!(joined.to_string(), "http://example.com/bar/");
    }

    #[test]
    fn test_uri_join_invalid_segment() {
        let uri = "http://example.com/".parse::<Uri>().unwrap();
        assert!(uri.join("repos/apple/my repo/commits").is_err());
    }

    #[test]
    fn test_with_query() {
        let uri = "http://example.com/commits".parse::<Uri>().unwrap();
        let uri = uri.with_query("per_page=100").unwrap();
        assert_eq!(uri.to_string(), "http://example.com/commits?per_page=100");

        let uri = uri.with_query("page=2").unwrap();
        assert_eq!(
            uri.to_string(),
            "http://example.com/commits?per_page=100&page=2"
        );

        let uri = uri.clone().with_query("").unwrap();
        assert_eq!(
            uri.to_string(),
            "http://example.com/commits?per_page=100&page=2"
        );
    }

    #[test]
    fn test_with_query_on_authority_only() {
        let uri = "http://example.com".parse::<Uri>().unwrap();
        let uri = uri.with_query("a=b").unwrap();
        assert_eq!(uri.query(), Some("a=b"));
    }
}
