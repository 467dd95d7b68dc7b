//! Control endpoint served over a Unix socket
//!
//! File managers and `rclonemgr request-copy` ask a running daemon to copy
//! files with `POST /gdrive/copy`. The request is acknowledged right away;
//! the destination picker and the transfer run on their own task.

use std::convert::Infallible;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rclonemgr_core::domain::TransferOp;
use rclonemgr_core::usecases::TransferOrchestrator;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::types::{CopyRequest, COPY_PATH};
use crate::IpcError;

/// Requests larger than this are rejected as invalid
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Receives accepted copy requests
pub trait ICopyRequestHandler: Send + Sync {
    /// Starts handling `sources` without waiting for the outcome
    fn submit_copy(&self, sources: Vec<PathBuf>);
}

/// Hands copy requests to the transfer orchestrator on a new task
pub struct OrchestratorCopyHandler {
    orchestrator: Arc<TransferOrchestrator>,
}

impl OrchestratorCopyHandler {
    pub fn new(orchestrator: Arc<TransferOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl ICopyRequestHandler for OrchestratorCopyHandler {
    fn submit_copy(&self, sources: Vec<PathBuf>) {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let outcome = orchestrator
                .select_destination_and_run(TransferOp::Copy, sources)
                .await;
            debug!(?outcome, "Requested copy finished");
        });
    }
}

/// Result of routing one request
#[derive(Debug, PartialEq, Eq)]
pub struct Routed {
    pub status: StatusCode,
    pub body: &'static str,
    /// Sources of an accepted copy request
    pub sources: Option<Vec<PathBuf>>,
}

impl Routed {
    fn reply(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            sources: None,
        }
    }
}

/// Maps a request to its response
///
/// Unknown paths are `404`, other methods on the copy route `405`, and a
/// body that is not JSON or lists no sources `400`.
pub fn route(method: &Method, path: &str, body: &[u8]) -> Routed {
    if path != COPY_PATH {
        return Routed::reply(StatusCode::NOT_FOUND, "Not Found");
    }
    if *method != Method::POST {
        return Routed::reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    match serde_json::from_slice::<CopyRequest>(body) {
        Ok(request) if !request.sources.is_empty() => Routed {
            status: StatusCode::OK,
            body: "OK",
            sources: Some(request.source_paths()),
        },
        _ => Routed::reply(
            StatusCode::BAD_REQUEST,
            "Invalid request: must provide sources",
        ),
    }
}

/// HTTP/1 server on the daemon's control socket
pub struct IpcServer {
    socket_path: PathBuf,
    handler: Arc<dyn ICopyRequestHandler>,
}

impl IpcServer {
    /// Creates a new `IpcServer`.
    ///
    /// # Arguments
    /// * `socket_path` - Where to listen, e.g. `$XDG_RUNTIME_DIR/rclone-mgr/<drive>.sock`
    /// * `handler` - Receives accepted copy requests
    pub fn new(socket_path: impl Into<PathBuf>, handler: Arc<dyn ICopyRequestHandler>) -> Self {
        Self {
            socket_path: socket_path.into(),
            handler,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serves requests until `shutdown` is cancelled, then removes the socket
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), IpcError> {
        let listener = bind(&self.socket_path)?;
        info!(socket = %self.socket_path.display(), "IPC server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, _) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept IPC connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let handler = Arc::clone(&self.handler);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { handle_request(req, handler.as_ref()).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "IPC connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("IPC server shutting down");
                    break;
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!(error = %e, "Socket already removed");
        }
        Ok(())
    }
}

/// Creates the socket directory (0700), removes a stale socket and binds
fn bind(socket_path: &Path) -> Result<UnixListener, IpcError> {
    if let Some(dir) = socket_path.parent() {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(|source| IpcError::Bind {
                path: dir.to_path_buf(),
                source,
            })?;
    }

    match std::fs::remove_file(socket_path) {
        Ok(()) => info!(socket = %socket_path.display(), "Removed old socket file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(socket = %socket_path.display(), error = %e, "Failed to remove old socket file"),
    }

    UnixListener::bind(socket_path).map_err(|source| IpcError::Bind {
        path: socket_path.to_path_buf(),
        source,
    })
}

async fn handle_request(
    req: Request<Incoming>,
    handler: &dyn ICopyRequestHandler,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let routed = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(body) => route(&method, &path, &body.to_bytes()),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            route(&method, &path, b"")
        }
    };
    debug!(%method, %path, status = %routed.status, "IPC request");

    if let Some(sources) = routed.sources {
        info!(?sources, "Received copy request");
        handler.submit_copy(sources);
    }

    let mut response = Response::new(Full::new(Bytes::from_static(routed.body.as_bytes())));
    *response.status_mut() = routed.status;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_accepts_copy_request() {
        let routed = route(&Method::POST, COPY_PATH, br#"{"sources":["/g/team/a","/g/team/b"]}"#);
        assert_eq!(routed.status, StatusCode::OK);
        assert_eq!(routed.body, "OK");
        assert_eq!(
            routed.sources,
            Some(vec![PathBuf::from("/g/team/a"), PathBuf::from("/g/team/b")])
        );
    }

    #[test]
    fn test_route_rejects_bad_bodies() {
        let bodies: [&[u8]; 4] = [br#"{"sources":[]}"#, b"{}", b"not json", b""];
        for body in bodies {
            let routed = route(&Method::POST, COPY_PATH, body);
            assert_eq!(routed.status, StatusCode::BAD_REQUEST);
            assert_eq!(routed.body, "Invalid request: must provide sources");
            assert_eq!(routed.sources, None);
        }
    }

    #[test]
    fn test_route_method_not_allowed() {
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let routed = route(&method, COPY_PATH, br#"{"sources":["/g/a"]}"#);
            assert_eq!(routed.status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(routed.body, "Method not allowed");
        }
    }

    #[test]
    fn test_route_unknown_path() {
        let routed = route(&Method::POST, "/gdrive/move", br#"{"sources":["/g/a"]}"#);
        assert_eq!(routed.status, StatusCode::NOT_FOUND);
        assert_eq!(routed.sources, None);
    }

    #[tokio::test]
    async fn test_bind_creates_private_dir_and_replaces_stale_socket() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let socket = dir.path().join("rclone-mgr").join("team.sock");

        let first = bind(&socket).unwrap();
        let mode = std::fs::metadata(socket.parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
        drop(first);

        // the file left behind by the first listener is stale now
        assert!(socket.exists());
        let _second = bind(&socket).unwrap();
    }
}
