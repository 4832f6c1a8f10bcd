//! Remote terminal session API
//!
//! The server exposes three endpoints per session:
//!
//! ```text
//! POST /open                 → {"terminal_id": <id>}
//! GET  /read/{terminal_id}   → text/event-stream of base64 snapshots
//! PUT  /write/{terminal_id}  ← raw input bytes
//! ```

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Server URL cannot carry a path: {0}")]
    InvalidBase(String),

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    #[error("Request to {endpoint} returned HTTP {code}")]
    Status { endpoint: String, code: u16 },

    #[error("Malformed response from {endpoint}: {source}")]
    MalformedResponse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read response body: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Opaque session identifier handed out by `/open`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TerminalId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalId::Number(n) => write!(f, "{}", n),
            TerminalId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenResponse {
    terminal_id: TerminalId,
}

/// Body of an output subscription
pub type OutputBody = Box<dyn Read + Send>;

/// Operations the viewer needs from the remote side
pub trait SessionApi {
    /// Create a new terminal session
    fn open(&self) -> Result<TerminalId>;

    /// Open the long-lived output stream of a session
    fn subscribe(&self, id: &TerminalId) -> Result<OutputBody>;

    /// Send input bytes to a session
    fn write(&self, id: &TerminalId, input: &[u8]) -> Result<()>;
}

/// `SessionApi` over HTTP
pub struct HttpSessionApi {
    agent: ureq::Agent,
    base: Url,
}

impl HttpSessionApi {
    pub fn new(base: Url, connect_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .user_agent(concat!("termfeed/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, base }
    }

    /// Build an endpoint URL below the server base, one path segment per item
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBase(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn open_url(&self) -> Result<Url> {
        self.endpoint(&["open"])
    }

    pub fn read_url(&self, id: &TerminalId) -> Result<Url> {
        self.endpoint(&["read", &id.to_string()])
    }

    pub fn write_url(&self, id: &TerminalId) -> Result<Url> {
        self.endpoint(&["write", &id.to_string()])
    }
}

fn request_error(endpoint: &Url, err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Status(code, _) => ClientError::Status {
            endpoint: endpoint.to_string(),
            code,
        },
        ureq::Error::Transport(transport) => ClientError::Transport {
            endpoint: endpoint.to_string(),
            source: Box::new(transport),
        },
    }
}

impl SessionApi for HttpSessionApi {
    fn open(&self) -> Result<TerminalId> {
        let url = self.open_url()?;
        tracing::debug!("POST {}", url);

        let response = self
            .agent
            .post(url.as_str())
            .send_bytes(&[])
            .map_err(|e| request_error(&url, e))?;
        let body = response.into_string()?;

        let opened: OpenResponse =
            serde_json::from_str(&body).map_err(|source| ClientError::MalformedResponse {
                endpoint: url.to_string(),
                source,
            })?;
        Ok(opened.terminal_id)
    }

    fn subscribe(&self, id: &TerminalId) -> Result<OutputBody> {
        let url = self.read_url(id)?;
        tracing::debug!("GET {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .set("Accept", "text/event-stream")
            .set("Cache-Control", "no-cache")
            .call()
            .map_err(|e| request_error(&url, e))?;

        if response.content_type() != "text/event-stream" {
            tracing::warn!(
                "Output stream {} has content type {}, parsing as event stream anyway",
                url,
                response.content_type()
            );
        }
        Ok(Box::new(response.into_reader()))
    }

    fn write(&self, id: &TerminalId, input: &[u8]) -> Result<()> {
        let url = self.write_url(id)?;
        self.agent
            .put(url.as_str())
            .send_bytes(input)
            .map_err(|e| request_error(&url, e))?;
        Ok(())
    }
}
