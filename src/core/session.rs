//! Session management
//!
//! Opens a remote terminal session, then streams its output into a render
//! target. The output body is parsed on a reader thread and handed to the
//! caller through a channel of already-decoded frames.

use std::io::{self, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::api::{ClientError, OutputBody, SessionApi, TerminalId};
use super::decode::{decode_text, DecodeError};
use super::sse::EventStream;
use crate::ui::RenderTarget;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session has already been started")]
    AlreadyStarted,

    #[error("Session is not streaming")]
    NotStreaming,

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Lifecycle of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Waiting for `/open` to answer
    SessionPending,
    Streaming(TerminalId),
    /// Stream closed; never reconnected
    Ended(TerminalId),
    /// Session creation or subscription failed
    Failed,
}

/// Items delivered by the reader thread
#[derive(Debug)]
pub enum FeedEvent {
    /// Decoded snapshot of the remote screen
    Frame(String),
    /// An event whose payload could not be decoded
    DecodeFailed(DecodeError),
    /// The stream ended, with the read error if it did not end cleanly
    Closed(Option<io::Error>),
}

/// Bootstrapper for one remote terminal session
pub struct Session<A: SessionApi> {
    api: A,
    state: SessionState,
    /// Channel to receive decoded output
    output_rx: Option<Receiver<FeedEvent>>,
    /// Reader thread handle
    reader_thread: Option<JoinHandle<()>>,
    /// Cleared when the session is dropped
    running: Arc<AtomicBool>,
    frames: u64,
    close_error: Option<String>,
}

impl<A: SessionApi> Session<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: SessionState::Uninitialized,
            output_rx: None,
            reader_thread: None,
            running: Arc::new(AtomicBool::new(false)),
            frames: 0,
            close_error: None,
        }
    }

    /// Create the remote session and subscribe to its output.
    ///
    /// `/open` is requested exactly once; the subscription is only opened
    /// after it has answered.
    pub fn start(&mut self) -> Result<TerminalId> {
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::AlreadyStarted);
        }
        self.state = SessionState::SessionPending;

        let id = match self.api.open() {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to open terminal session: {}", e);
                self.state = SessionState::Failed;
                return Err(e.into());
            }
        };
        info!("Opened terminal session {}", id);

        let body = match self.api.subscribe(&id) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to subscribe to terminal {}: {}", id, e);
                self.state = SessionState::Failed;
                return Err(e.into());
            }
        };
        info!("Subscribed to output of terminal {}", id);

        let (tx, rx) = mpsc::channel::<FeedEvent>();
        self.output_rx = Some(rx);
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        self.reader_thread = Some(thread::spawn(move || read_stream(body, tx, running)));
        self.state = SessionState::Streaming(id.clone());
        Ok(id)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn terminal_id(&self) -> Option<&TerminalId> {
        match &self.state {
            SessionState::Streaming(id) | SessionState::Ended(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, SessionState::Streaming(_))
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Read error that ended the stream, if any
    pub fn close_error(&self) -> Option<&str> {
        self.close_error.as_deref()
    }

    /// Render all output received so far (non-blocking).
    ///
    /// Returns whether anything reached the target.
    pub fn pump(&mut self, target: &mut dyn RenderTarget) -> io::Result<bool> {
        let mut delivered = false;
        loop {
            let next = match &self.output_rx {
                Some(rx) => rx.try_recv(),
                None => return Ok(delivered),
            };
            match next {
                Ok(event) => {
                    self.apply(event, target)?;
                    delivered = true;
                }
                Err(TryRecvError::Empty) => return Ok(delivered),
                Err(TryRecvError::Disconnected) => {
                    self.reader_gone(target)?;
                    return Ok(true);
                }
            }
        }
    }

    /// Wait up to `timeout` for output, then render everything available
    pub fn wait_and_pump(
        &mut self,
        target: &mut dyn RenderTarget,
        timeout: Duration,
    ) -> io::Result<bool> {
        if !self.wait_and_apply(target, timeout)? {
            return Ok(false);
        }
        self.pump(target)?;
        Ok(true)
    }

    /// Wait up to `timeout` for the next item and apply only that one.
    ///
    /// Items queued behind it stay in the channel.
    pub fn wait_and_apply(
        &mut self,
        target: &mut dyn RenderTarget,
        timeout: Duration,
    ) -> io::Result<bool> {
        let next = match &self.output_rx {
            Some(rx) => rx.recv_timeout(timeout),
            None => return Ok(false),
        };
        match next {
            Ok(event) => {
                self.apply(event, target)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                self.reader_gone(target)?;
                Ok(true)
            }
        }
    }

    /// Send input bytes to the remote terminal
    pub fn send_input(&self, input: &[u8]) -> Result<()> {
        match &self.state {
            SessionState::Streaming(id) => {
                self.api.write(id, input)?;
                Ok(())
            }
            _ => Err(SessionError::NotStreaming),
        }
    }

    fn apply(&mut self, event: FeedEvent, target: &mut dyn RenderTarget) -> io::Result<()> {
        match event {
            FeedEvent::Frame(text) => {
                target.set_text(&text)?;
                self.frames += 1;
            }
            FeedEvent::DecodeFailed(e) => {
                target.notify(&format!("skipped frame: {}", e))?;
            }
            FeedEvent::Closed(reason) => {
                let notice = match &reason {
                    Some(e) => format!("stream error: {}", e),
                    None => "stream closed".to_string(),
                };
                self.close_error = reason.map(|e| e.to_string());
                self.end();
                target.notify(&notice)?;
            }
        }
        Ok(())
    }

    /// Reader thread stopped without reporting why
    fn reader_gone(&mut self, target: &mut dyn RenderTarget) -> io::Result<()> {
        self.output_rx = None;
        if self.is_streaming() {
            warn!("Output reader stopped unexpectedly");
            self.close_error = Some("output reader stopped".to_string());
            self.end();
            target.notify("stream error: output reader stopped")?;
        }
        Ok(())
    }

    fn end(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let SessionState::Streaming(id) = &self.state {
            info!("Output stream of terminal {} ended after {} frames", id, self.frames);
            self.state = SessionState::Ended(id.clone());
        }
        if let Some(handle) = &self.reader_thread {
            if handle.is_finished() {
                self.reader_thread = None;
            }
        }
    }
}

impl<A: SessionApi> Drop for Session<A> {
    fn drop(&mut self) {
        // The reader thread is detached. It notices the flag or the dropped
        // receiver only after its current read returns, so on an idle stream
        // it stays parked in `read` until the server sends or closes.
        self.running.store(false, Ordering::SeqCst);
        self.output_rx = None;
    }
}

/// Reader thread body: parse events, decode `message` payloads, forward them
fn read_stream(body: OutputBody, tx: Sender<FeedEvent>, running: Arc<AtomicBool>) {
    let mut events = EventStream::new(BufReader::new(body));

    let reason = loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }

        let event = match events.next() {
            Some(Ok(event)) => event,
            Some(Err(e)) => break Some(e),
            None => break None,
        };

        if !event.is_message() {
            debug!("Ignoring '{}' event (id {:?})", event.event, event.id);
            continue;
        }

        let item = match decode_text(&event.data) {
            Ok(text) => FeedEvent::Frame(text),
            Err(e) => {
                warn!("Dropping undecodable output event: {}", e);
                FeedEvent::DecodeFailed(e)
            }
        };
        if tx.send(item).is_err() {
            return;
        }
    };

    match &reason {
        Some(e) => warn!("Output stream failed: {}", e),
        None => info!("Output stream closed by server"),
    }
    if let Some(retry) = events.retry() {
        debug!(
            "Server suggested reconnecting after {:?} (last id {:?}); not reconnecting",
            retry,
            events.last_event_id()
        );
    }
    let _ = tx.send(FeedEvent::Closed(reason));
}
