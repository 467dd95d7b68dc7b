//! Remote configuration port (driven/secondary port)
//!
//! rclone keeps one remote per drive in its own config file. Creating a
//! remote needs OAuth credentials obtained elsewhere; this port only
//! consumes them.

use serde::{Deserialize, Serialize};

use crate::domain::Drive;

/// OAuth client and token for the storage provider
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Token JSON as rclone stores it
    pub token: String,
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Port trait for the rclone remote configuration
#[async_trait::async_trait]
pub trait IRemoteConfig: Send + Sync {
    /// Names of all configured remotes
    async fn remote_names(&self) -> anyhow::Result<Vec<String>>;

    /// Creates the remote for an enabled drive, deletes it for a disabled one
    async fn create_or_delete_remote(
        &self,
        drive: &Drive,
        credentials: &RemoteCredentials,
    ) -> anyhow::Result<()>;
}
