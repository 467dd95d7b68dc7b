//! Journal entries and error classification
//!
//! A [`LogEntry`] is one line of `journalctl --output=json` for a drive's
//! rclone unit. The functions in this module decide whether such a line is
//! worth bothering the user about, and whether it describes a file that
//! rclone could not upload because of missing parent-folder permissions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Literal marker rclone puts on every error line
const ERROR_MARKER: &str = "ERROR";

/// Key of the ignore bucket applied to every drive
pub const WILDCARD_DRIVE: &str = "all";

const UPLOAD_FAILED_MARKER: &str = "vfs cache: failed to upload";
const PARENT_PERMISSIONS_MARKER: &str = "insufficientParentPermissions";

static FILE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ERROR\s+:\s+(.+?):\s").expect("file name pattern is valid"));

/// One decoded journald record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "MESSAGE", default)]
    pub message: String,
    /// Microseconds since the Unix epoch, as journald prints it
    #[serde(rename = "__REALTIME_TIMESTAMP", default)]
    pub timestamp: String,
    #[serde(rename = "PRIORITY", default)]
    pub priority: String,
    #[serde(rename = "_SYSTEMD_UNIT", default)]
    pub unit: String,
}

impl LogEntry {
    /// Creates an entry carrying only a message, mostly useful in tests
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Decodes one `journalctl --output=json` line
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// The realtime timestamp as a UTC date, if it parses
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        let micros: i64 = self.timestamp.parse().ok()?;
        DateTime::<Utc>::from_timestamp_micros(micros)
    }
}

/// Literal substrings that suppress otherwise actionable errors, per drive
///
/// Keys are lower-cased drive names plus the [`WILDCARD_DRIVE`] bucket. Matching
/// is plain substring search so a rule means exactly what it says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct IgnoreRuleSet {
    rules: BTreeMap<String, Vec<String>>,
}

impl Default for IgnoreRuleSet {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            "shared_with_me".to_string(),
            vec![
                // shared drives refuse downloads of some files, nothing the user can do
                "ERROR : IO error: open file failed: googleapi: Error 403: This file cannot be downloaded by the user., cannotDownloadFile".to_string(),
            ],
        );
        rules.insert(
            WILDCARD_DRIVE.to_string(),
            vec![
                "Failed to copy: googleapi: Error 403".to_string(),
                "failed to create directory".to_string(),
                "failed to make directory".to_string(),
            ],
        );
        Self { rules }
    }
}

impl From<BTreeMap<String, Vec<String>>> for IgnoreRuleSet {
    fn from(rules: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(rules)
    }
}

impl From<IgnoreRuleSet> for BTreeMap<String, Vec<String>> {
    fn from(set: IgnoreRuleSet) -> Self {
        set.rules
    }
}

impl IgnoreRuleSet {
    /// Builds a rule set from raw buckets, lower-casing the drive keys
    pub fn new(rules: BTreeMap<String, Vec<String>>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(drive, patterns)| (drive.to_lowercase(), patterns))
            .collect();
        Self { rules }
    }

    /// A rule set that suppresses nothing
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Patterns that apply to `drive_name`: its own bucket (if any) followed by the wildcard
    pub fn patterns_for<'a>(&'a self, drive_name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let specific = self.rules.get(&drive_name.to_lowercase());
        let wildcard = self.rules.get(WILDCARD_DRIVE);
        specific
            .into_iter()
            .chain(wildcard)
            .flatten()
            .map(String::as_str)
    }

    /// Returns true if `entry` is an error the user should hear about
    ///
    /// Anything without the literal `ERROR` marker is noise. Errors are then
    /// checked against the drive's bucket and the wildcard bucket.
    pub fn should_trigger_error(&self, entry: &LogEntry, drive_name: &str) -> bool {
        if !entry.message.contains(ERROR_MARKER) {
            return false;
        }
        !self
            .patterns_for(drive_name)
            .any(|pattern| entry.message.contains(pattern))
    }
}

/// Returns true if the entry reports an upload refused for lack of parent permissions
pub fn should_trigger_file_move(entry: &LogEntry) -> bool {
    entry.message.contains(UPLOAD_FAILED_MARKER) && entry.message.contains(PARENT_PERMISSIONS_MARKER)
}

/// Extracts the drive-relative file name from an rclone error line
///
/// Returns an empty string when the line does not look like
/// `ERROR : <name>: ...`; callers treat that as "nothing to recover".
pub fn extract_file_name(entry: &LogEntry) -> String {
    FILE_NAME_RE
        .captures(&entry.message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
