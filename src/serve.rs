//! Preview server for watch mode.
//!
//! A `tiny_http` server on its own thread serving the output directory. It
//! only reads files, so rebuilds on the watch thread never wait for it.
//!
//! Request resolution:
//!
//! 1. Exact file match → the file, with a content type guessed from its extension
//! 2. Directory → its `index.html`
//! 3. Anything else → 404
//!
//! URL paths are percent-decoded and query strings ignored.

use std::fs;
use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Ports tried after the configured one is taken.
const MAX_PORT_RETRIES: u16 = 10;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to bind {address} after {attempts} attempts (ports {first}-{last}): {reason}")]
    Bind {
        address: String,
        attempts: u16,
        first: u16,
        last: u16,
        reason: String,
    },
}

/// A running preview server. Dropping it without [`stop`](Self::stop)
/// leaves the thread serving until the process exits.
pub struct PreviewServer {
    server: Arc<Server>,
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl PreviewServer {
    /// Bind `address:port` (trying the next ports when taken) and start
    /// serving `root` on a background thread.
    pub fn start(root: &Path, address: &str, port: u16) -> Result<Self, ServeError> {
        let (server, addr) = try_bind_port(address, port, MAX_PORT_RETRIES)?;
        let server = Arc::new(server);
        let root = root.to_path_buf();

        let worker = Arc::clone(&server);
        let handle = thread::spawn(move || {
            for request in worker.incoming_requests() {
                if let Err(e) = handle_request(request, &root) {
                    tracing::warn!(error = %e, "Request failed");
                }
            }
        });

        tracing::info!(url = %format!("http://{addr}/"), "Serving preview");
        Ok(Self {
            server,
            addr,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests and wait for the server thread.
    pub fn stop(self) {
        self.server.unblock();
        if self.handle.join().is_err() {
            tracing::error!("Preview server thread panicked");
        }
    }
}

fn try_bind_port(
    address: &str,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr), ServeError> {
    let mut last_error = String::new();
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match Server::http((address, port)) {
            Ok(server) => {
                let Some(addr) = server.server_addr().to_ip() else {
                    last_error = "not an IP listener".to_string();
                    continue;
                };
                if offset > 0 {
                    tracing::warn!(requested = base_port, port = addr.port(), "Port in use, using another");
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(ServeError::Bind {
        address: address.to_string(),
        attempts: max_retries,
        first: base_port,
        last: base_port.saturating_add(max_retries.saturating_sub(1)),
        reason: last_error,
    })
}

// ============================================================================
// Request handling
// ============================================================================

fn handle_request(request: Request, root: &Path) -> io::Result<()> {
    match resolve_request(root, request.url()) {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

/// Map a request URL onto a file under `root`.
///
/// Returns `None` for anything that does not resolve to a file, including
/// paths that try to climb out of `root`.
pub fn resolve_request(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).ok()?;
    let relative = Path::new(decoded.trim_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let local = root.join(relative);
    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    index.is_file().then_some(index)
}

fn serve_file(request: Request, path: &Path) -> io::Result<()> {
    let content = fs::read(path)?;
    let mut response = Response::from_data(content);
    if let Ok(header) = Header::from_bytes("Content-Type", guess_content_type(path)) {
        response = response.with_header(header);
    }
    request.respond(response)
}

fn serve_not_found(request: Request) -> io::Result<()> {
    let body = "404 Not Found";
    let headers = Header::from_bytes("Content-Type", "text/plain; charset=utf-8")
        .map(|h| vec![h])
        .unwrap_or_default();
    let response = Response::new(
        StatusCode(404),
        headers,
        Cursor::new(body),
        Some(body.len()),
        None,
    );
    request.respond(response)
}

/// Guess MIME content type from file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        Some("pdf") => "application/pdf",

        _ => "application/octet-stream",
    }
}
