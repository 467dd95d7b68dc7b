//! Use cases (interactors) for rclone-mgr
//!
//! Use cases coordinate domain logic with the ports. They never talk to
//! processes or dialogs directly.
//!
//! ## Use Cases
//!
//! - [`TransferOrchestrator`] - Bulk server-side copy/move with a progress bar
//! - [`ErrorHandler`] - Journal error classification and file relocation
//! - [`DriveManager`] - Mounting, listing and setting up drives

pub mod drives;
pub mod remediation;
pub mod transfer;

pub use drives::{status_glyph, DriveError, DriveManager, MountStatus, UnitAction, ALL_DRIVES};
pub use remediation::{relocate_file, AbandonReason, ErrorHandler, RecoveryError, Remediation};
pub use transfer::{TransferError, TransferOrchestrator, TransferOutcome};
