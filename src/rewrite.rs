//! Prompt rewrite client for the Gemini `generateContent` endpoint.
//!
//! One call is one POST. Nothing here validates input or retries: the caller
//! validates, and every failure is classified into a [`RewriteError`] and
//! handed back.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::RewriteError;

pub const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Header carrying the credential. The credential is never put in the URL or body.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

pub const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Raw body characters kept in an HTTP failure message when the body has no
/// structured `error.message`.
const ERROR_BODY_SNIPPET_CHARS: usize = 100;

const RESULT_TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

/// Everything needed for one rewrite call. Built fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteRequest {
    pub credential: String,
    pub input_text: String,
    pub instruction_text: String,
    pub model_id: String,
    pub temperature: f64,
}

pub type RewriteResult = Result<String, RewriteError>;

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

/// Serialize the request body. Instruction and input stay in separate sections.
pub fn build_payload(request: &RewriteRequest) -> String {
    let body = GenerateContentRequest {
        system_instruction: Content {
            parts: [Part {
                text: &request.instruction_text,
            }],
        },
        contents: [Content {
            parts: [Part {
                text: &request.input_text,
            }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        },
    };
    // Non-finite floats serialize as null; nothing else here can fail.
    serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_owned())
}

pub fn endpoint_url(model_id: &str) -> String {
    format!("{API_BASE_URL}/{model_id}:generateContent")
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The exchange did not complete (DNS, TLS, reset, timeout, body read).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

/// Sends one JSON POST and returns whatever came back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        credential: &str,
        body: String,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport. `timeout` of `None` leaves the client's default
    /// (no overall timeout).
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| TransportError {
            message: e.to_string(),
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        credential: &str,
        body: String,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, credential)
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError {
            message: e.to_string(),
        })?;

        Ok(HttpResponse { status, body })
    }
}

/// Shape of a success-status body, decided once before any result is built.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// `candidates[0].content.parts[0].text`, already trimmed and non-empty.
    Text(String),
    /// A top-level `error` value that is set (not null, `false`, `0` or `""`).
    Error(Value),
    Unrecognized,
}

impl ResponseBody {
    pub fn from_json(value: &Value) -> Self {
        let text = value
            .pointer(RESULT_TEXT_POINTER)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(text) = text {
            return ResponseBody::Text(text.to_owned());
        }
        match value.get("error") {
            Some(err) if is_present(err) => ResponseBody::Error(err.clone()),
            _ => ResponseBody::Unrecognized,
        }
    }
}

/// Whether a JSON field counts as set: not null, `false`, `0` or `""`.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `error.message` when it is set. Non-string messages are rendered as JSON.
fn error_message(error: &Value) -> Option<String> {
    let message = error.get("message").filter(|m| is_present(m))?;
    Some(match message {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn http_failure_detail(body: &str) -> String {
    let structured = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").filter(|e| is_present(e)).and_then(error_message));
    match structured {
        Some(message) => message,
        None => {
            let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect();
            format!("{snippet}...")
        }
    }
}

/// Classify a completed HTTP exchange into a rewrite result.
pub fn classify_response(response: &HttpResponse) -> RewriteResult {
    if !response.is_success() {
        return Err(RewriteError::Http {
            status: response.status,
            detail: http_failure_detail(&response.body),
        });
    }

    let value: Value =
        serde_json::from_str(&response.body).map_err(|_| RewriteError::ParseFailure)?;

    match ResponseBody::from_json(&value) {
        ResponseBody::Text(text) => Ok(text),
        ResponseBody::Error(err) => {
            let detail = error_message(&err).unwrap_or_else(|| err.to_string());
            Err(RewriteError::ApiError { detail })
        }
        ResponseBody::Unrecognized => Err(RewriteError::UnexpectedShape),
    }
}

/// Issues rewrite calls through a [`Transport`].
pub struct RewriteClient {
    transport: Box<dyn Transport>,
}

impl RewriteClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Client using the real HTTPS transport.
    pub fn http(timeout: Option<Duration>) -> Result<Self, TransportError> {
        Ok(Self::new(Box::new(HttpTransport::new(timeout)?)))
    }

    /// Send `request` once and classify the outcome.
    pub async fn rewrite(&self, request: &RewriteRequest) -> RewriteResult {
        let url = endpoint_url(&request.model_id);
        let payload = build_payload(request);

        info!(
            model = %request.model_id,
            temperature = request.temperature,
            input_len = request.input_text.len(),
            "calling generateContent"
        );
        let start = Instant::now();

        let response = match self
            .transport
            .post_json(&url, &request.credential, payload)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(err = %e, "rewrite request did not complete");
                return Err(RewriteError::Network { message: e.message });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let result = classify_response(&response);
        match &result {
            Ok(text) => info!(
                status = response.status,
                duration_ms,
                output_len = text.len(),
                "rewrite succeeded"
            ),
            Err(e) => {
                warn!(
                    status = response.status,
                    duration_ms,
                    kind = %e.kind(),
                    "rewrite failed"
                );
                debug!(body = %response.body, "raw response body");
            }
        }
        result
    }
}
