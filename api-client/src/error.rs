//! Error types for API Clients
use std::fmt;

use http::StatusCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error occured while building, sending or reading an HTTP request
#[derive(Debug, Error)]
pub enum Error {
    /// An error occured while sending the request
    #[error("Sending request: {0}")]
    Request(#[from] hyperdriver::client::Error),

    /// The request could not be assembled
    #[error("Building request: {0}")]
    Build(#[from] http::Error),

    /// Query parameters could not be encoded
    #[error("Encoding query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    /// The server returned a non-success status
    #[error(transparent)]
    Response(#[from] HttpResponseError),

    /// An error occured while recieving the response body
    #[error("Reading response body: {0}")]
    ResponseBody(#[source] BoxError),

    /// The response body was not the expected JSON
    #[error("Decoding response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Whether the request timed out before a response arrived.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Request(hyperdriver::client::Error::RequestTimeout)
        )
    }

    /// The HTTP status, when the server answered with an error response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Response(response) => Some(response.status),
            _ => None,
        }
    }
}

/// A server returned an error response
#[derive(Debug, Clone)]
pub struct HttpResponseError {
    /// The HTTP status code of the response
    pub status: StatusCode,

    /// The message body of the response
    pub message: String,
}

impl HttpResponseError {
    /// Create a new HTTP response error from a status and body text.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for HttpResponseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP {} response: {}", self.status, self.message)
    }
}

impl std::error::Error for HttpResponseError {}
