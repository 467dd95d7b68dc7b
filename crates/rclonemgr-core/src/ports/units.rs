//! Unit lifecycle port (driven/secondary port)
//!
//! Each drive is mounted by a systemd user unit. Besides starting,
//! stopping and querying units, drive setup enables units at login and
//! makes the service manager reload its unit files.

use serde::{Deserialize, Serialize};

use crate::domain::drive_name_from_unit;

/// Active state of one unit as reported by systemd
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    /// Full unit name, e.g. `rclone@my_drive.service`
    pub name: String,
    /// `active`, `inactive`, `failed`, `activating`, ...
    pub active_state: String,
}

impl UnitStatus {
    /// The drive this unit mounts, if it follows the naming convention
    pub fn drive_name(&self) -> Option<String> {
        drive_name_from_unit(&self.name).ok()
    }

    pub fn is_active(&self) -> bool {
        self.active_state == "active"
    }
}

/// Port trait for managing mount units
#[async_trait::async_trait]
pub trait IUnitManager: Send + Sync {
    /// Starts `unit` and waits until the start job finished
    async fn start(&self, unit: &str) -> anyhow::Result<()>;

    /// Stops `unit` and waits until the stop job finished
    async fn stop(&self, unit: &str) -> anyhow::Result<()>;

    /// Reports the state of every unit in `units`, in the same order
    async fn status(&self, units: &[String]) -> anyhow::Result<Vec<UnitStatus>>;

    /// Starts `unit` at every login
    async fn enable(&self, unit: &str) -> anyhow::Result<()>;

    /// Stops starting `unit` at login
    async fn disable(&self, unit: &str) -> anyhow::Result<()>;

    /// Makes the service manager pick up new or changed unit files
    async fn reload(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_status_drive_name() {
        let status = UnitStatus {
            name: "rclone@team.service".to_string(),
            active_state: "active".to_string(),
        };
        assert_eq!(status.drive_name().as_deref(), Some("team"));
        assert!(status.is_active());

        let foreign = UnitStatus {
            name: "cron.service".to_string(),
            active_state: "failed".to_string(),
        };
        assert_eq!(foreign.drive_name(), None);
        assert!(!foreign.is_active());
    }
}
