use super::matcher::RequestMatcher;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// An expectation for a request
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) matcher: RequestMatcher,
    pub(crate) reply: MockReply,
    pub(crate) times: Times,
    pub(crate) call_count: usize,
}

impl Expectation {
    pub fn new(matcher: RequestMatcher) -> Self {
        Self {
            matcher,
            reply: MockReply::default(),
            times: Times::Any,
            call_count: 0,
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        match self.times {
            Times::Once => self.call_count == 1,
            Times::Exactly(n) => self.call_count == n,
            Times::AtLeast(n) => self.call_count >= n,
            Times::AtMost(n) => self.call_count <= n,
            Times::Any => true,
        }
    }
}

/// Define how many times an expectation should be matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    Once,
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    Any,
}

/// A canned reply
#[derive(Debug, Clone)]
pub struct MockReply {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) delay: Option<Duration>,
}

impl Default for MockReply {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            delay: None,
        }
    }
}

impl MockReply {
    pub fn new() -> Self {
        Self::default()
    }

    /// A successful solve issued for `hostname`.
    pub fn verified(hostname: &str) -> Self {
        Self::new().json(json!({
            "success": true,
            "challenge_ts": "2024-01-01T00:00:00Z",
            "hostname": hostname,
        }))
    }

    /// A rejected solve carrying Google's error codes.
    pub fn rejected(codes: &[&str]) -> Self {
        Self::new().json(json!({
            "success": false,
            "error-codes": codes,
        }))
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, key: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Bytes::from(body.to_string());
        self
    }

    /// Hold the reply back, e.g. to trip a client timeout.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
