//! Remote session client.
//!
//! - **api**: HTTP endpoints of the web terminal server
//! - **sse**: server-sent event stream parser
//! - **decode**: base64 payload decoding
//! - **session**: opens a session and feeds its output to a render target
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── SessionApi (POST /open, GET /read/{id}, PUT /write/{id})
//! └── reader thread
//!     ├── EventStream (SSE framing)
//!     └── decode_text → channel → RenderTarget
//! ```

pub mod api;
pub mod decode;
pub mod session;
pub mod sse;

#[cfg(test)]
pub(crate) mod test_server;
