//! rclone-mgr IPC - Local control endpoint
//!
//! Each daemon listens on `<socket_dir>/<drive>.sock` and speaks plain
//! HTTP/1.1 so that file manager extensions can talk to it with any HTTP
//! client.
//!
//! # Routes
//! - `POST /gdrive/copy` with `{"sources": [...]}` - Pick a destination and copy

pub mod client;
pub mod server;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

pub use client::send_copy_request;
pub use server::{route, ICopyRequestHandler, IpcServer, OrchestratorCopyHandler};
pub use types::{CopyRequest, COPY_PATH};

/// Errors of the control endpoint, on either side of the socket
#[derive(Debug, Error)]
pub enum IpcError {
    /// The socket (or its directory) could not be set up
    #[error("failed to listen on {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No daemon is listening on the socket
    #[error("failed to connect to {}: {source}. Is the daemon for this drive running?", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The daemon answered with a non-success status
    #[error("daemon rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}
