//! Client side of the control endpoint

use std::path::{Path, PathBuf};

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::debug;

use crate::types::{CopyRequest, COPY_PATH};
use crate::IpcError;

/// Asks the daemon listening on `socket_path` to copy `sources`
///
/// Returns the daemon's reply text once the request was accepted; the
/// copy itself continues in the daemon.
pub async fn send_copy_request(socket_path: &Path, sources: &[PathBuf]) -> Result<String, IpcError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|source| IpcError::Connect {
            path: socket_path.to_path_buf(),
            source,
        })?;

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "IPC client connection closed");
        }
    });

    let body = serde_json::to_vec(&CopyRequest::new(sources.iter().cloned()))?;
    let request = Request::builder()
        .method(Method::POST)
        .uri(COPY_PATH)
        .header(HOST, "localhost")
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let text = response.into_body().collect().await?.to_bytes();
    let text = String::from_utf8_lossy(&text).into_owned();

    if !status.is_success() {
        return Err(IpcError::Rejected {
            status: status.as_u16(),
            message: text,
        });
    }
    Ok(text)
}
