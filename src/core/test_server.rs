//! In-process HTTP server standing in for the remote terminal host in tests

use std::io::Read;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use url::Url;

/// Canned response for a request
pub struct Reply {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Reply {
    pub fn json(body: &str) -> Self {
        Self { status: 200, content_type: "application/json", body: body.to_string() }
    }

    pub fn event_stream(body: &str) -> Self {
        Self { status: 200, content_type: "text/event-stream", body: body.to_string() }
    }

    pub fn status(status: u16) -> Self {
        Self { status, content_type: "text/plain", body: String::new() }
    }
}

type Handler = dyn Fn(&str, &str, &[u8]) -> Reply + Send + 'static;

/// Records every request as `"METHOD /path"` and answers with `handler`
pub struct MockServer {
    port: u16,
    log: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    stop_tx: mpsc::Sender<()>,
}

impl MockServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str, &[u8]) -> Reply + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("Failed to start test server");
        let port = server.server_addr().to_ip().unwrap().port();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handler: Box<Handler> = Box::new(handler);
        let thread_log = log.clone();
        thread::spawn(move || loop {
            if stop_rx.try_recv().is_ok() {
                break;
            }

            match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(mut request)) => {
                    let method = request.method().to_string();
                    let path = request.url().to_string();
                    let mut body = Vec::new();
                    let _ = request.as_reader().read_to_end(&mut body);

                    thread_log
                        .lock()
                        .unwrap()
                        .push((format!("{} {}", method, path), body.clone()));

                    let reply = handler(&method, &path, &body);
                    let response = tiny_http::Response::from_string(reply.body)
                        .with_status_code(reply.status)
                        .with_header(
                            tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                reply.content_type.as_bytes(),
                            )
                            .unwrap(),
                        );
                    let _ = request.respond(response);
                }
                Ok(None) => {}
                Err(_) => break,
            }
        });

        Self { port, log, stop_tx }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}", self.port)).unwrap()
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(line, _)| line.clone()).collect()
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.log.lock().unwrap().iter().map(|(_, body)| body.clone()).collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
