//! An in-process transport for testing API clients without a network.
//!
//! Routes match on the request path and, optionally, on query parameters.
//! When several routes match, the one with the most query constraints wins.
//! Requests which match no route receive a `404 Not Found`.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

#[derive(Debug, Clone)]
enum Reply {
    Respond {
        status: http::StatusCode,
        headers: http::HeaderMap,
        body: Bytes,
    },
    Timeout,
}

#[derive(Debug, Clone)]
struct Route {
    path: String,
    query: Vec<(String, String)>,
    reply: Reply,
}

impl Route {
    fn matches(&self, path: &str, query: &[(String, String)]) -> bool {
        self.path == path && self.query.iter().all(|pair| query.contains(pair))
    }
}

/// A mock transport which answers requests from a table of canned responses.
#[derive(Debug, Default, Clone)]
pub struct MockService {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<http::Uri>>>,
}

impl MockService {
    /// Create a mock with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to any request for `path`.
    pub fn add(
        &self,
        path: &str,
        status: http::StatusCode,
        headers: http::HeaderMap,
        body: impl Into<Bytes>,
    ) {
        self.add_with_query(path, &[], status, headers, body);
    }

    /// Respond to requests for `path` which carry every one of the `query` pairs.
    pub fn add_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
        status: http::StatusCode,
        headers: http::HeaderMap,
        body: impl Into<Bytes>,
    ) {
        self.push(
            path,
            query,
            Reply::Respond {
                status,
                headers,
                body: body.into(),
            },
        );
    }

    /// Respond to any request for `path` with a JSON body and `200 OK`.
    pub fn json(&self, path: &str, body: impl Into<Bytes>) {
        self.json_with_query(path, &[], body);
    }

    /// Respond to requests for `path` carrying the `query` pairs with a JSON body and `200 OK`.
    pub fn json_with_query(&self, path: &str, query: &[(&str, &str)], body: impl Into<Bytes>) {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        self.add_with_query(path, query, http::StatusCode::OK, headers, body);
    }

    /// Fail requests for `path` as if they had timed out.
    pub fn timeout(&self, path: &str) {
        self.push(path, &[], Reply::Timeout);
    }

    /// Every request URI this mock has received, in order.
    pub fn requests(&self) -> Vec<http::Uri> {
        self.requests.lock().clone()
    }

    /// Forget every recorded request.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn push(&self, path: &str, query: &[(&str, &str)], reply: Reply) {
        self.routes.lock().push(Route {
            path: path.to_owned(),
            query: query
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            reply,
        });
    }

    fn reply_for(&self, uri: &http::Uri) -> Option<Reply> {
        let query: Vec<(String, String)> = uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();

        let routes = self.routes.lock();
        routes
            .iter()
            .filter(|route| route.matches(uri.path(), &query))
            .max_by_key(|route| route.query.len())
            .map(|route| route.reply.clone())
    }
}

impl tower::Service<http::Request<hyperdriver::Body>> for MockService {
    type Response = http::Response<hyperdriver::Body>;
    type Error = hyperdriver::client::Error;
    type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<hyperdriver::Body>) -> Self::Future {
        let uri = req.uri().clone();
        self.requests.lock().push(uri.clone());

        let (status, headers, body) = match self.reply_for(&uri) {
            Some(Reply::Respond {
                status,
                headers,
                body,
            }) => (status, headers, body),
            Some(Reply::Timeout) => {
                return std::future::ready(Err(hyperdriver::client::Error::RequestTimeout))
            }
            None => (
                http::StatusCode::NOT_FOUND,
                http::HeaderMap::new(),
                Bytes::from(format!("no mock response for {}", uri.path())),
            ),
        };

        let mut response = http::Response::new(hyperdriver::Body::from(body));
        *response.status_mut() = status;
        *response.version_mut() = http::Version::HTTP_11;
        *response.headers_mut() = headers;

        std::future::ready(Ok(response))
    }
}
