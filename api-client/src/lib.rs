//! A small HTTP client for JSON APIs.
//!
//! [`ApiClient`] wraps a hyperdriver client with swappable authentication,
//! a fixed base URI and a request timeout shared by every clone.

#![allow(clippy::arc_with_non_send_sync)]

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use arc_swap::Guard;
use http::Method;
use http::Uri;
use hyperdriver::service::SharedService;
use tower::ServiceExt;

mod authentication;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod request;
pub mod response;
pub mod timeout;
mod token;
pub mod uri;

pub use self::authentication::{
    Authentication, AuthenticationLayer, AuthenticationService, BearerAuth,
};
pub use self::error::{Error, HttpResponseError};
pub use self::request::RequestBuilder;
pub use self::request::RequestExt;
pub use self::response::ApiResponse;
pub use self::timeout::{SharedDuration, SharedTimeoutLayer};
pub use self::token::Token;
use self::uri::UriExtension as _;

/// Timeout applied to requests unless the client is told otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A client for accessing APIs over HTTP / HTTPS
///
/// Useful inner object to wrap for individual API clients.
#[derive(Debug, Clone)]
pub struct ApiClient<A> {
    base: Uri,
    inner: hyperdriver::client::SharedClientService<hyperdriver::Body, hyperdriver::Body>,
    authentication: Arc<ArcSwap<A>>,
    timeout: SharedDuration,
}

impl<A> ApiClient<A>
where
    A: Authentication + Send + Sync + 'static,
{
    /// Create a new API Client from a base URL and an authentication method
    pub fn new(base: Uri, authentication: A) -> Self {
        let inner = hyperdriver::Client::build_tcp_http()
            .with_default_tls()
            .build_service();

        Self::new_with_inner_service(base, authentication, inner)
    }

    /// Create a new API Client which sends requests through `inner`.
    ///
    /// Useful for testing with the `MockService` transport behind the `mock` feature.
    pub fn new_with_inner_service<S>(base: Uri, authentication: A, inner: S) -> Self
    where
        S: tower::Service<
                http::Request<hyperdriver::Body>,
                Response = http::Response<hyperdriver::Body>,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let authentication = Arc::new(ArcSwap::new(Arc::new(authentication)));
        let timeout = SharedDuration::new(DEFAULT_TIMEOUT);

        let service = tower::ServiceBuilder::new()
            .layer(SharedService::layer())
            .layer(AuthenticationLayer::new(authentication.clone()))
            .layer(SharedTimeoutLayer::from(timeout.clone()))
            .service(inner);

        ApiClient {
            base,
            inner: service,
            authentication,
            timeout,
        }
    }

    /// Replace the credentials used for subsequent requests.
    pub fn refresh_auth(&self, authentication: A) {
        self.authentication.store(Arc::new(authentication));
    }

    /// The current credentials.
    pub fn auth(&self) -> Guard<Arc<A>> {
        self.authentication.as_ref().load()
    }

    /// Set how long a request may take before it fails with a timeout.
    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout);
    }

    /// How long a request may take before it fails with a timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }
}

impl ApiClient<BearerAuth> {
    /// Create a client which sends a bearer token with every request.
    pub fn new_bearer_auth<K: Into<Token>>(base: Uri, token: K) -> Self {
        Self::new(base, BearerAuth::new(token))
    }
}

impl<A> ApiClient<A>
where
    A: Authentication,
{
    /// Start a `GET` request for an endpoint relative to the base URI.
    pub fn get(&self, endpoint: &str) -> RequestBuilder<A> {
        self.request(Method::GET, endpoint)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder<A> {
        match self.base.clone().join(endpoint) {
            Ok(url) => RequestBuilder::new(self.clone(), url, method),
            Err(error) => {
                tracing::warn!(%endpoint, %error, "endpoint is not a valid path");
                RequestBuilder::invalid(self.clone(), method, error)
            }
        }
    }

    /// Send a fully built request.
    #[tracing::instrument(skip_all, fields(method = %req.method(), uri = %req.uri()))]
    pub async fn execute(&self, req: http::Request<hyperdriver::Body>) -> Result<ApiResponse, Error> {
        let parts = req.parts();

        let response = self.inner.clone().oneshot(req).await?;
        tracing::trace!(status = %response.status(), "response");
        Ok(ApiResponse::new(parts, response))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extensions_produce_send_futures() {
        let client =
            ApiClient::new_bearer_auth("http://httpbin.org/get/".parse().unwrap(), "secret garden");
        let builder = client.get("frobulator");

        fn assert_send<T: Send>(_t: T) {}

        let fut = builder.send();
        assert_send(fut);
    }

    #[tokio::test]
    async fn mock_client_works() {
        let mock = crate::mock::MockService::new();
        mock.add(
            "/get/",
            http::StatusCode::OK,
            http::HeaderMap::new(),
            "frobulator",
        );

        let client = ApiClient::new_with_inner_service(
            "http://httpbin.org/get/".parse().unwrap(),
            BearerAuth::new("secret garden"),
            mock.clone(),
        );

        let response = client.get("").send().await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "frobulator");
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn query_parameters_reach_the_transport() {
        let mock = crate::mock::MockService::new();
        mock.json_with_query("/items", &[("page", "2")], "[2]");
        mock.json("/items", "[1]");

        let client = ApiClient::new_with_inner_service(
            "http://api.example.com/".parse().unwrap(),
            (),
            mock.clone(),
        );

        let items: Vec<u32> = client
            .get("items")
            .query(&[("page", "2"), ("per_page", "10")])
            .unwrap()
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(items, vec![2]);

        let uri = &mock.requests()[0];
        assert_eq!(uri.query(), Some("page=2&per_page=10"));
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let mock = crate::mock::MockService::new();
        let client = ApiClient::new_with_inner_service(
            "http://api.example.com/".parse().unwrap(),
            (),
            mock,
        );

        let err = client
            .get("missing")
            .send()
            .await
            .unwrap()
            .error_for_status()
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn transport_timeouts_are_reported() {
        let mock = crate::mock::MockService::new();
        mock.timeout("/slow");
        let client = ApiClient::new_with_inner_service(
            "http://api.example.com/".parse().unwrap(),
            (),
            mock,
        );

        let err = client.get("slow").send().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn invalid_endpoints_fail_to_build() {
        let mock = crate::mock::MockService::new();
        let client = ApiClient::new_with_inner_service(
            "http://api.example.com/".parse().unwrap(),
            (),
            mock.clone(),
        );

        let err = client
            .get("repos/apple/my repo/commits")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Build(_)), "{err:?}");
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn timeout_is_shared_between_clones() {
        let client = ApiClient::new_with_inner_service(
            "http://api.example.com/".parse().unwrap(),
            (),
            crate::mock::MockService::new(),
        );
        let other = client.clone();
        other.set_timeout(Duration::from_secs(5));
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }
}
