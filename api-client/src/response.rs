//! Responses returned by an [`ApiClient`](crate::ApiClient).

use bytes::Bytes;
use http_body_util::BodyExt as _;
use hyperdriver::Body;
use serde::de::DeserializeOwned;

use crate::error::{Error, HttpResponseError};

/// An HTTP response which remembers the request that produced it.
#[derive(Debug)]
pub struct ApiResponse {
    request: http::request::Parts,
    response: http::response::Parts,
    body: Body,
}

impl ApiResponse {
    /// Pair a response with the parts of its request.
    pub fn new(request: http::request::Parts, response: http::Response<Body>) -> Self {
        let (response, body) = response.into_parts();

        Self {
            request,
            response,
            body,
        }
    }

    /// The status code of the response.
    pub fn status(&self) -> http::StatusCode {
        self.response.status
    }

    /// The headers of the response.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.response.headers
    }

    /// The URI of the request that generated the response.
    pub fn uri(&self) -> &http::Uri {
        &self.request.uri
    }

    /// The parts of the request that generated the response.
    pub fn request(&self) -> &http::request::Parts {
        &self.request
    }

    /// Collect the body into bytes.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        let collected = self
            .body
            .collect()
            .await
            .map_err(|error| Error::ResponseBody(error.into()))?;
        Ok(collected.to_bytes())
    }

    /// Collect the body as UTF-8 text.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|error| Error::ResponseBody(error.into()))
    }

    /// Collect the body and deserialize it as JSON.
    pub async fn json<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Turn a non-success response into [`Error::Response`], carrying the body text.
    pub async fn error_for_status(self) -> Result<Self, Error> {
        let status = self.status();
        if status.is_success() {
            return Ok(self);
        }

        let message = self
            .text()
            .await
            .unwrap_or_else(|err| format!("Failed to read response body: {err}"));
        Err(HttpResponseError::new(status, message).into())
    }
}
