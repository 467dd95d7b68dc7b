//! Transfer jobs and their progress accounting

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// rclone's `-v` line for a file moved without passing through this machine
pub const MOVED_MARKER: &str = "Moved (server-side)";
/// rclone's `-v` line for a file copied without passing through this machine
pub const COPIED_MARKER: &str = "Copied (server-side copy)";

/// Which rclone operation a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOp {
    Copy,
    Move,
}

impl TransferOp {
    /// The rclone subcommand
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOp::Copy => "copy",
            TransferOp::Move => "move",
        }
    }

    /// `Copy` / `Move`, for dialog titles
    pub fn title(&self) -> &'static str {
        match self {
            TransferOp::Copy => "Copy",
            TransferOp::Move => "Move",
        }
    }

    /// `Copying` / `Moving`
    pub fn progressive(&self) -> &'static str {
        match self {
            TransferOp::Copy => "Copying",
            TransferOp::Move => "Moving",
        }
    }

    /// Text of the dialog shown once every source went through
    pub fn success_message(&self) -> &'static str {
        match self {
            TransferOp::Copy => "File(s) copied successfully",
            TransferOp::Move => "File(s) moved successfully",
        }
    }
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy" => Ok(TransferOp::Copy),
            "move" => Ok(TransferOp::Move),
            other => Err(format!("unknown transfer operation '{other}'")),
        }
    }
}

/// Returns true if an rclone diagnostic line reports one finished file
pub fn is_completion_marker(line: &str) -> bool {
    line.contains(MOVED_MARKER) || line.contains(COPIED_MARKER)
}

/// One copy or move across one or more sources
///
/// `files_done` only ever grows, so the reported percentage is monotonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    operation: TransferOp,
    sources: Vec<PathBuf>,
    destination: PathBuf,
    files_total: u64,
    files_done: u64,
}

impl TransferJob {
    pub fn new(
        operation: TransferOp,
        sources: Vec<PathBuf>,
        destination: PathBuf,
        files_total: u64,
    ) -> Self {
        Self {
            operation,
            sources,
            destination,
            files_total,
            files_done: 0,
        }
    }

    pub fn operation(&self) -> TransferOp {
        self.operation
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    pub fn files_total(&self) -> u64 {
        self.files_total
    }

    pub fn files_done(&self) -> u64 {
        self.files_done
    }

    /// `floor(files_done / files_total * 100)`, never above 100
    pub fn percent(&self) -> u8 {
        if self.files_total == 0 {
            return 0;
        }
        let pct = self.files_done.saturating_mul(100) / self.files_total;
        pct.min(100) as u8
    }

    /// Counts one finished file and returns the new percentage
    pub fn record_completion(&mut self) -> u8 {
        self.files_done += 1;
        self.percent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_markers() {
        assert!(is_completion_marker(
            "2024/01/01 10:00:00 INFO  : a.txt: Moved (server-side)"
        ));
        assert!(is_completion_marker(
            "2024/01/01 10:00:00 INFO  : a.txt: Copied (server-side copy)"
        ));
        assert!(!is_completion_marker("2024/01/01 10:00:00 INFO  : a.txt: Copied (new)"));
        assert!(!is_completion_marker("Transferred: 1 / 1, 100%"));
    }

    #[test]
    fn test_percent_is_floored_and_monotonic() {
        let mut job = TransferJob::new(TransferOp::Copy, vec![], PathBuf::from("/d"), 3);
        assert_eq!(job.percent(), 0);
        assert_eq!(job.record_completion(), 33);
        assert_eq!(job.record_completion(), 66);
        assert_eq!(job.record_completion(), 100);
        assert_eq!(job.files_done(), 3);
    }

    #[test]
    fn test_percent_caps_at_hundred() {
        let mut job = TransferJob::new(TransferOp::Move, vec![], PathBuf::from("/d"), 1);
        job.record_completion();
        assert_eq!(job.record_completion(), 100);
    }

    #[test]
    fn test_op_parse_and_labels() {
        assert_eq!("copy".parse::<TransferOp>().unwrap(), TransferOp::Copy);
        assert_eq!("move".parse::<TransferOp>().unwrap(), TransferOp::Move);
        assert!("sync".parse::<TransferOp>().is_err());
        assert_eq!(TransferOp::Move.progressive(), "Moving");
        assert_eq!(TransferOp::Copy.success_message(), "File(s) copied successfully");
    }
}
