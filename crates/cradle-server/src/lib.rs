use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use cradle_bus::BusPublisher;
use cradle_schema::ShellEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Conventional bind address of the content server.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// Immutable per-run configuration, snapshotted at `start`. Changing the
/// served root requires `stop` + `start`; in-flight requests never observe
/// a root swap.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root_dir: PathBuf,
    pub addr: SocketAddr,
}

impl ServerConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            // Constant literal, parse cannot fail.
            addr: DEFAULT_ADDR.parse().unwrap(),
        }
    }

    /// Port 0 picks an ephemeral port; the bound address is observable via
    /// `ContentServer::bound_addr` after `start`.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }
}

struct ServerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
    root: PathBuf,
}

/// Loopback HTTP server exposing a directory tree to the render host.
///
/// Many browser engines refuse scripts, relative fetches, and other
/// CORS-sensitive resources on `file://` origins, so locally authored HTML
/// apps are served over localhost instead. Serving is byte-exact; this is
/// not a general-purpose web server.
pub struct ContentServer {
    running: AtomicBool,
    handle: tokio::sync::Mutex<Option<ServerHandle>>,
    events: BusPublisher,
}

impl ContentServer {
    pub fn new(events: BusPublisher) -> Self {
        Self {
            running: AtomicBool::new(false),
            handle: tokio::sync::Mutex::new(None),
            events,
        }
    }

    /// Observable from any thread without locking.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Binds the listener and spawns the serve loop. No-op when already
    /// running (never double-binds). A bind failure is returned from this
    /// call and leaves the server fully stopped.
    pub async fn start(&self, config: ServerConfig) -> Result<()> {
        let mut slot = self.handle.lock().await;
        if slot.is_some() {
            tracing::debug!("content server already running, start is a no-op");
            return Ok(());
        }

        let root = tokio::fs::canonicalize(&config.root_dir)
            .await
            .with_context(|| {
                format!("content root not accessible: {}", config.root_dir.display())
            })?;
        let listener = tokio::net::TcpListener::bind(config.addr)
            .await
            .with_context(|| format!("failed to bind {}", config.addr))?;
        let local_addr = listener.local_addr()?;

        let state = ServeState {
            root: Arc::new(root.clone()),
            events: self.events.clone(),
        };
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, router(state))
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(err) = serve.await {
                tracing::error!(%err, "content server terminated abnormally");
            }
        });

        tracing::info!(addr = %local_addr, root = %root.display(), "content server listening");
        *slot = Some(ServerHandle {
            shutdown,
            task,
            local_addr,
            root,
        });
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Cancels the serve loop and waits for it to drain. Unblocks the
    /// accept wait immediately rather than polling a flag. No-op when not
    /// running.
    pub async fn stop(&self) -> Result<()> {
        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::SeqCst);
        handle.shutdown.cancel();
        handle.task.await.context("serve task panicked")?;
        tracing::info!("content server stopped");
        Ok(())
    }

    /// Address the listener actually bound, or `None` when stopped.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        self.handle.lock().await.as_ref().map(|h| h.local_addr)
    }

    /// Canonical root directory of the current run, or `None` when stopped.
    /// Each run serves exactly one root; switching directories goes through
    /// `stop` + `start`.
    pub async fn current_root(&self) -> Option<PathBuf> {
        self.handle.lock().await.as_ref().map(|h| h.root.clone())
    }

    /// Base URL the render host should navigate beneath, e.g.
    /// `http://localhost:8000/`.
    pub async fn base_url(&self) -> Option<String> {
        self.bound_addr()
            .await
            .map(|addr| format!("http://localhost:{}/", addr.port()))
    }
}

#[derive(Clone)]
struct ServeState {
    root: Arc<PathBuf>,
    events: BusPublisher,
}

fn router(state: ServeState) -> Router {
    Router::new()
        .fallback(serve_file)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Maps any request path to a file under the content root and answers with
/// its exact bytes. Every exchange gets a response: misses answer 404,
/// escapes answer 403, read failures answer 500 with the error text and
/// publish a `ServerError` event. The loop survives all of these.
async fn serve_file(State(state): State<ServeState>, uri: Uri) -> Response {
    let raw = uri.path().trim_start_matches('/');
    let Ok(decoded) = urlencoding::decode(raw) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    // Canonicalizing resolves `..` and symlinks, so an escape cannot hide
    // behind either.
    let candidate = state.root.join(decoded.as_ref());
    let resolved = match tokio::fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %decoded, "no such file under content root");
            return StatusCode::NOT_FOUND.into_response();
        }
        // Only a clean miss is a 404; resolution failures (permissions,
        // symlink loops) are exchange errors like a failed read.
        Err(err) => {
            tracing::warn!(%err, path = %decoded, "failed to resolve path");
            let _ = state
                .events
                .publish(ShellEvent::server_error(err.to_string()))
                .await;
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    };
    if !resolved.starts_with(state.root.as_ref()) {
        tracing::warn!(path = %decoded, "request escapes content root");
        return StatusCode::FORBIDDEN.into_response();
    }
    if !resolved.is_file() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(&resolved).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                bytes,
            )
                .into_response()
        }
        Err(err) => {
            tracing::warn!(%err, path = %decoded, "failed to read file");
            let _ = state
                .events
                .publish(ShellEvent::server_error(err.to_string()))
                .await;
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
