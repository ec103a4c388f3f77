use super::expectation::{Expectation, MockReply, Times};
use super::matcher::RequestMatcher;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

type GenericError = Box<dyn std::error::Error + Send + Sync>;
type Result<T> = std::result::Result<T, GenericError>;

/// Path Google serves the verification API under.
pub const SITE_VERIFY_PATH: &str = "/recaptcha/api/siteverify";

/// A mock HTTP server
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct ServerState {
    expectations: Vec<Expectation>,
    requests: Vec<RecordedRequest>,
    unmatched: usize,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: http::Method,
    pub path: String,
    pub headers: http::HeaderMap,
    pub body: Bytes,
    /// Decoded `application/x-www-form-urlencoded` pairs; empty when the
    /// body is not a form.
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    /// First value submitted for a form field.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl MockServer {
    /// Start a new mock server on a random local port
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(Mutex::new(ServerState::default()));
        let state_clone = state.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut stop_future = shutdown_rx;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let state = state_clone.clone();

                                tokio::spawn(async move {
                                    if let Err(err) = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                                        .serve_connection(io, service_fn(move |req| handle_request(req, state.clone())))
                                        .await
                                    {
                                        tracing::debug!(error = %err, "Mock server connection closed with error");
                                    }
                                });
                            }
                            Err(e) => tracing::warn!(error = %e, "Mock server accept failed"),
                        }
                    }
                    _ = &mut stop_future => {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Full URL of the mocked site-verify endpoint.
    pub fn verify_url(&self) -> String {
        format!("{}{}", self.base_url(), SITE_VERIFY_PATH)
    }

    /// Every request received so far, matched or not.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests that matched no expectation
    pub fn unmatched_count(&self) -> usize {
        self.lock().unmatched
    }

    /// Add an expectation
    pub fn expect(&self, matcher: RequestMatcher) -> ExpectationBuilder {
        ExpectationBuilder {
            server: self.state.clone(),
            expectation: Some(Expectation::new(matcher)),
        }
    }

    /// Answer every site-verify call with `reply`.
    pub fn reply_to_site_verify(&self, reply: MockReply) -> ExpectationBuilder {
        self.expect(RequestMatcher::site_verify()).respond_with(reply)
    }

    /// Panic if any expectation's call count is off.
    pub fn verify(&self) {
        let state = self.lock();
        for exp in &state.expectations {
            assert!(
                exp.is_satisfied(),
                "Expectation {:?} expected {:?} calls, got {}",
                exp.matcher,
                exp.times,
                exp.call_count
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub struct ExpectationBuilder {
    server: Arc<Mutex<ServerState>>,
    expectation: Option<Expectation>,
}

impl ExpectationBuilder {
    pub fn respond_with(mut self, reply: MockReply) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.reply = reply;
        }
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.set_times(Times::Exactly(n));
        self
    }

    pub fn once(mut self) -> Self {
        self.set_times(Times::Once);
        self
    }

    pub fn at_least_once(mut self) -> Self {
        self.set_times(Times::AtLeast(1));
        self
    }

    pub fn never(mut self) -> Self {
        self.set_times(Times::Exactly(0));
        self
    }

    fn set_times(&mut self, times: Times) {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = times;
        }
    }
}

impl Drop for ExpectationBuilder {
    fn drop(&mut self) {
        if let Some(exp) = self.expectation.take() {
            let mut state = self
                .server
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.expectations.push(exp);
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<Mutex<ServerState>>,
) -> Result<Response<Full<Bytes>>> {
    let (parts, body) = req.into_parts();
    let body_bytes = body.collect().await?.to_bytes();
    let form: Vec<(String, String)> = serde_urlencoded::from_bytes(&body_bytes).unwrap_or_default();

    let reply = {
        let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Later expectations override earlier ones
        let matching = state
            .expectations
            .iter_mut()
            .rev()
            .find(|exp| exp.matcher.matches(&parts.method, parts.uri.path(), &form));

        let reply = match matching {
            Some(exp) => {
                exp.call_count += 1;
                Some(exp.reply.clone())
            }
            None => None,
        };
        if reply.is_none() {
            state.unmatched += 1;
        }

        state.requests.push(RecordedRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            body: body_bytes,
            form,
        });
        reply
    };

    let Some(reply) = reply else {
        return Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("No expectation matched")))?);
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = Response::builder().status(reply.status);
    for (k, v) in &reply.headers {
        response = response.header(k, v);
    }
    Ok(response.body(Full::new(reply.body))?)
}
