//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly path validation against the mount root.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format, or a path that does not resolve under the mount root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The current working directory could not be determined while resolving a relative path
    #[error("Failed to resolve path {path}: {reason}")]
    Unresolvable {
        /// The path that was being resolved
        path: String,
        /// Why resolution failed
        reason: String,
    },

    /// Unit name does not follow the `rclone@<drive>.service` convention
    #[error("Invalid unit name: {0}")]
    InvalidUnitName(String),
}
