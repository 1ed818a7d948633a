//! Request side of a turn: POST the conversation, get a byte stream back.

use std::fmt;
use std::future::Future;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::history::ConversationTurn;

/// User-Agent sent with every stream request.
pub const USER_AGENT: &str = concat!("chatwire/", env!("CARGO_PKG_VERSION"));

/// Ordered response body chunks.
pub type ByteStream = BoxStream<'static, TransportResult<Bytes>>;

/// Categories of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Non-success HTTP status (4xx, 5xx)
    HttpStatus,
    /// Connection or request timeout
    Timeout,
    /// Could not reach the backend
    Connect,
    /// Response body failed mid-stream
    Body,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Body => write!(f, "body"),
        }
    }
}

/// Structured transport error with a one-line, displayable message.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// HTTP status code, for `HttpStatus` errors.
    pub status: Option<u16>,
    /// Raw response body, if the backend sent one.
    pub details: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    /// Creates an HTTP status error, surfacing a JSON `error.message` or
    /// `detail` from the body when there is one.
    pub fn http_status(status: u16, body: &str) -> Self {
        let mut error = Self {
            kind: TransportErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            status: Some(status),
            details: None,
        };
        if body.is_empty() {
            return error;
        }
        if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(msg) = json
                .pointer("/error/message")
                .or_else(|| json.get("detail"))
                .and_then(Value::as_str)
        {
            error.message = format!("HTTP {status}: {msg}");
        }
        error.details = Some(body.to_string());
        error
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(TransportErrorKind::Timeout, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(TransportErrorKind::Connect, format!("Connection failed: {e}"))
        } else if e.is_body() || e.is_decode() {
            Self::new(TransportErrorKind::Body, format!("Stream interrupted: {e}"))
        } else {
            Self::new(TransportErrorKind::Connect, format!("Request error: {e}"))
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Sends the accumulated conversation and returns the streamed response body.
pub trait Transport {
    fn send(
        &self,
        conversation: &[ConversationTurn],
    ) -> impl Future<Output = TransportResult<ByteStream>> + Send;
}

#[derive(Serialize)]
struct StreamRequest<'a> {
    conversation: &'a [ConversationTurn],
}

/// HTTP transport posting to the backend's stream endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Builds a transport from the effective configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = config.stream_url()?;
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().context("build HTTP client")?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, conversation: &[ConversationTurn]) -> TransportResult<ByteStream> {
        tracing::debug!(url = %self.url, turns = conversation.len(), "Opening stream");
        let response = self
            .http
            .post(&self.url)
            .header("accept", "text/event-stream")
            .json(&StreamRequest { conversation })
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &body));
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| TransportError::from_reqwest(&e))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_http_status_without_body() {
        let err = TransportError::http_status(500, "");
        assert_eq!(err.kind, TransportErrorKind::HttpStatus);
        assert_eq!(err.status, Some(500));
        assert_eq!(err.to_string(), "HTTP 500");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_http_status_extracts_json_message() {
        let err = TransportError::http_status(422, r#"{"detail":"conversation is empty"}"#);
        assert_eq!(err.to_string(), "HTTP 422: conversation is empty");

        let err = TransportError::http_status(503, r#"{"error":{"message":"overloaded"}}"#);
        assert_eq!(err.to_string(), "HTTP 503: overloaded");

        let err = TransportError::http_status(502, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "HTTP 502");
        assert_eq!(err.details.as_deref(), Some("<html>bad gateway</html>"));
    }

    #[tokio::test]
    async fn test_send_posts_conversation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/stream"))
            .and(header("accept", "text/event-stream"))
            .and(body_json(serde_json::json!({
                "conversation": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("data: {\"type\":\"done\"}\n\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(format!("{}/chat/stream", server.uri()));
        let mut stream = transport
            .send(&[ConversationTurn::user("hi")])
            .await
            .expect("stream opens");

        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"data: {\"type\":\"done\"}\n\n");
    }

    #[tokio::test]
    async fn test_send_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(format!("{}/chat/stream", server.uri()));
        let Err(err) = transport.send(&[]).await else {
            panic!("expected an error");
        };
        assert_eq!(err.status, Some(500));
        assert_eq!(err.to_string(), "HTTP 500");
    }
}
