use http::{header::HeaderValue, HeaderName, Uri};
use serde::Serialize;

use crate::error::Error;
use crate::uri::UriExtension as _;
use crate::{response::ApiResponse, ApiClient, Authentication};

/// Extension methods for plain `http` requests.
pub trait RequestExt {
    /// Add a sensitive bearer `Authorization` header.
    fn bearer_auth<T>(self, token: T) -> Self
    where
        T: std::fmt::Display;

    /// Copy the method, URI and headers of this request without the body.
    fn parts(&self) -> http::request::Parts;
}

impl<B> RequestExt for http::Request<B> {
    fn bearer_auth<T>(mut self, token: T) -> Self
    where
        T: std::fmt::Display,
    {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers_mut()
                    .append(http::header::AUTHORIZATION, value);
            }
            Err(_) => tracing::error!("bearer token is not a valid header value"),
        }

        self
    }

    fn parts(&self) -> http::request::Parts {
        let mut parts = http::Request::new(()).into_parts().0;
        parts.method = self.method().clone();
        parts.uri = self.uri().clone();
        parts.version = self.version();
        parts.headers = self.headers().clone();
        parts
    }
}

/// Builder for a request against an [`ApiClient`].
#[derive(Debug)]
pub struct RequestBuilder<A> {
    req: http::request::Builder,
    client: ApiClient<A>,
    query: Option<String>,
    body: Option<hyperdriver::Body>,
    error: Option<http::Error>,
}

impl<A> RequestBuilder<A> {
    /// Start a request for `uri`, sent through `client`.
    pub fn new(client: ApiClient<A>, uri: Uri, method: http::Method) -> Self {
        Self {
            req: http::Request::builder().method(method).uri(uri),
            client,
            query: None,
            body: None,
            error: None,
        }
    }

    /// A request which fails with `error` when it is built or sent.
    pub(crate) fn invalid(client: ApiClient<A>, method: http::Method, error: http::Error) -> Self {
        Self {
            req: http::Request::builder().method(method),
            client,
            query: None,
            body: None,
            error: Some(error),
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.req = self.req.header(key, value);
        self
    }

    /// Append URL-encoded query parameters.
    ///
    /// May be called more than once; parameters accumulate in call order.
    pub fn query<Q>(mut self, query: &Q) -> Result<Self, Error>
    where
        Q: Serialize + ?Sized,
    {
        let encoded = serde_urlencoded::to_string(query)?;
        if !encoded.is_empty() {
            self.query = Some(match self.query.take() {
                Some(existing) => format!("{existing}&{encoded}"),
                None => encoded,
            });
        }
        Ok(self)
    }

    /// Set the request body.
    pub fn body<B: Into<hyperdriver::Body>>(self, body: B) -> Self {
        Self {
            body: Some(body.into()),
            ..self
        }
    }

    /// Assemble the request without sending it.
    pub fn build(self) -> Result<http::Request<hyperdriver::Body>, Error> {
        self.into_parts().map(|(_, req)| req)
    }

    fn into_parts(self) -> Result<(ApiClient<A>, http::Request<hyperdriver::Body>), Error> {
        if let Some(error) = self.error {
            return Err(error.into());
        }

        let mut req = self
            .req
            .body(self.body.unwrap_or_else(hyperdriver::Body::empty))?;

        if let Some(query) = self.query {
            let uri = req.uri().clone().with_query(&query)?;
            *req.uri_mut() = uri;
        }

        Ok((self.client, req))
    }

    /// Send the request.
    ///
    /// Only transport failures are errors here, use
    /// [`ApiResponse::error_for_status`] to reject non-success responses.
    pub async fn send(self) -> Result<ApiResponse, Error>
    where
        A: Authentication,
    {
        let (client, req) = self.into_parts()?;
        client.execute(req).await
    }
}
