//! Integration test: IpcServer over a real Unix socket
//!
//! Starts the server in a temporary runtime directory and talks to it with
//! the bundled client and with raw HTTP/1.1 requests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rclonemgr_core::testing::{DialogCall, FakeDesktop, FakeProcessRunner};
use rclonemgr_core::usecases::TransferOrchestrator;
use rclonemgr_ipc::{
    send_copy_request, ICopyRequestHandler, IpcError, IpcServer, OrchestratorCopyHandler,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingHandler {
    requests: Mutex<Vec<Vec<PathBuf>>>,
}

impl ICopyRequestHandler for RecordingHandler {
    fn submit_copy(&self, sources: Vec<PathBuf>) {
        self.requests.lock().unwrap().push(sources);
    }
}

async fn start_server(
    socket: &Path,
    handler: Arc<dyn ICopyRequestHandler>,
) -> (CancellationToken, JoinHandle<Result<(), IpcError>>) {
    let shutdown = CancellationToken::new();
    let server = IpcServer::new(socket, handler);
    let token = shutdown.clone();
    let task = tokio::spawn(async move { server.run(token).await });

    for _ in 0..200 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    (shutdown, task)
}

async fn raw_request(socket: &Path, request: &str) -> String {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_client_request_reaches_handler() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("rclone-mgr").join("team.sock");
    let handler = Arc::new(RecordingHandler::default());
    let (shutdown, task) = start_server(&socket, handler.clone()).await;

    let sources = vec![PathBuf::from("/home/me/google/team/a.txt")];
    let reply = send_copy_request(&socket, &sources).await.unwrap();

    assert_eq!(reply, "OK");
    assert_eq!(*handler.requests.lock().unwrap(), vec![sources]);

    shutdown.cancel();
    task.await.unwrap().unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn test_empty_request_is_rejected() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("team.sock");
    let handler = Arc::new(RecordingHandler::default());
    let (shutdown, _task) = start_server(&socket, handler.clone()).await;

    let err = send_copy_request(&socket, &[]).await.unwrap_err();

    match err {
        IpcError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid request: must provide sources");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(handler.requests.lock().unwrap().is_empty());
    shutdown.cancel();
}

#[tokio::test]
async fn test_wrong_method_and_path() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("team.sock");
    let (shutdown, _task) = start_server(&socket, Arc::new(RecordingHandler::default())).await;

    let response = raw_request(
        &socket,
        "GET /gdrive/copy HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 405"), "{response}");
    assert!(response.ends_with("Method not allowed"), "{response}");

    let response = raw_request(
        &socket,
        "POST /elsewhere HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    shutdown.cancel();
}

#[tokio::test]
async fn test_no_daemon_is_a_connect_error() {
    let dir = TempDir::new().unwrap();
    let err = send_copy_request(&dir.path().join("missing.sock"), &[PathBuf::from("/x")])
        .await
        .unwrap_err();
    assert!(matches!(err, IpcError::Connect { .. }));
}

#[tokio::test]
async fn test_orchestrator_handler_opens_destination_picker() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("team.sock");
    let desktop = Arc::new(FakeDesktop::new());
    let orchestrator = Arc::new(TransferOrchestrator::new(
        Arc::new(FakeProcessRunner::new([])),
        desktop.clone(),
        dir.path().join("google"),
    ));
    let handler = Arc::new(OrchestratorCopyHandler::new(orchestrator));
    let (shutdown, _task) = start_server(&socket, handler).await;

    send_copy_request(&socket, &[dir.path().join("google/team/a.txt")])
        .await
        .unwrap();

    for _ in 0..200 {
        if !desktop.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(
        desktop.calls().first(),
        Some(DialogCall::PickDirectory { .. })
    ));
    shutdown.cancel();
}
