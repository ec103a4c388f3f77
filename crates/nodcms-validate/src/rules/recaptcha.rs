//! Google invisible reCaptcha verification.
//!
//! The solved token is posted to the site-verify endpoint together with the
//! configured secret. The JSON verdict is then checked in order: a `success`
//! field must be present, it must be truthy, and the `hostname` the solve
//! was issued for must equal the site's base host.

use crate::config::ValidationSettings;
use crate::context::{CaptchaVerifier, VerifyError};
use crate::error::{Failure, FailureKind};
use crate::registry::FieldContext;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// reqwest-backed [`CaptchaVerifier`] for Google's site-verify API.
#[derive(Debug, Clone)]
pub struct SiteVerifyClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SiteVerifyClient {
    /// Create a client posting to `endpoint`, giving up after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_settings(settings: &ValidationSettings) -> Result<Self, VerifyError> {
        Self::new(
            settings.recaptcha_verify_url.clone(),
            settings.recaptcha_timeout(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_transport(e: reqwest::Error) -> VerifyError {
    if e.is_timeout() {
        VerifyError::Timeout
    } else {
        VerifyError::Transport(e.to_string())
    }
}

#[async_trait]
impl CaptchaVerifier for SiteVerifyClient {
    async fn verify(&self, secret: &str, response: &str) -> Result<Value, VerifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("secret", secret), ("response", response)])
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(VerifyError::Status(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(map_transport)?;
        serde_json::from_slice(&body).map_err(|e| VerifyError::InvalidJson(e.to_string()))
    }
}

/// Outcome of checking a site-verify answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Verified,
    /// No `success` field in the answer.
    InvalidResponseFormat,
    RemoteRejected { error_codes: Vec<String> },
    HostnameMismatch { response_hostname: String },
}

/// Loose truthiness of a JSON value; `"0"`, `""`, `0`, `null` and empty
/// containers are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Check a verdict against the site's base host. The hostname comparison is
/// case-sensitive.
pub fn evaluate(response: &Value, base_host: &str) -> Verdict {
    let success = match response.get("success") {
        Some(success) => success,
        None => return Verdict::InvalidResponseFormat,
    };

    if !truthy(success) {
        let error_codes = match response.get("error-codes") {
            Some(Value::Array(codes)) => codes
                .iter()
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(code)) => vec![code.clone()],
            _ => Vec::new(),
        };
        return Verdict::RemoteRejected { error_codes };
    }

    let hostname = response.get("hostname").and_then(Value::as_str);
    if hostname != Some(base_host) {
        return Verdict::HostnameMismatch {
            response_hostname: hostname.unwrap_or_default().to_string(),
        };
    }

    Verdict::Verified
}

impl Verdict {
    fn into_result(self, base_host: &str) -> Result<(), Failure> {
        match self {
            Verdict::Verified => Ok(()),
            Verdict::InvalidResponseFormat => Err(Failure::external(
                "Invalid response format from Google reCaptcha for {field}.",
            )),
            Verdict::RemoteRejected { error_codes } => Err(Failure::new(
                FailureKind::Format,
                "The google response for the reCaptcha was false with the error code: {error_code}.",
            )
            .param("error_code", error_codes.join(", "))),
            Verdict::HostnameMismatch { response_hostname } => Err(Failure::new(
                FailureKind::Format,
                "The solve hostname ({response_hostname}) shall be equal to {current_hostname}.",
            )
            .param("response_hostname", response_hostname)
            .param("current_hostname", base_host)),
        }
    }
}

/// Rule body of `googleInvisibleRecaptcha`.
pub async fn google_invisible_recaptcha(
    value: &str,
    field: &FieldContext<'_>,
) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }

    let settings = field.settings();
    let secret = settings
        .captcha_secret()
        .ok_or_else(|| Failure::configuration("Google captcha secret key has not been set."))?;

    let response = match field.context.captcha() {
        Some(verifier) => verifier.verify(secret, value).await,
        None => match SiteVerifyClient::from_settings(settings) {
            Ok(client) => client.verify(secret, value).await,
            Err(e) => Err(e),
        },
    };

    let response = response.map_err(|e| {
        tracing::warn!(field = field.name, error = %e, "reCaptcha verification failed");
        Failure::external("The reCaptcha of {field} could not be verified.")
    })?;

    let verdict = evaluate(&response, &settings.base_host);
    if verdict != Verdict::Verified {
        tracing::debug!(field = field.name, verdict = ?verdict, "reCaptcha not accepted");
    }
    verdict.into_result(&settings.base_host)
}
