//! Domain types and pure logic
//!
//! - Path translation between the local mount tree and rclone remotes
//! - Journal entries and the error suppression rules
//! - Transfer jobs and progress accounting
//! - Drive naming and on-disk layout
//! - Domain-specific error types

pub mod drive;
pub mod errors;
pub mod log_entry;
pub mod paths;
pub mod transfer;

// Re-export commonly used types
pub use drive::{drive_name_from_unit, sanitize_drive_name, unit_name, Drive, MountLayout};
pub use errors::DomainError;
pub use log_entry::{extract_file_name, should_trigger_file_move, IgnoreRuleSet, LogEntry};
pub use paths::{
    is_subdirectory, patch_destination_for_directory_source, to_remote_coordinate, RemotePath,
};
pub use transfer::{is_completion_marker, TransferJob, TransferOp};
