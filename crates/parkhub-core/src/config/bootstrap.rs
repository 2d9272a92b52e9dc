//! First-start account bootstrap.

use serde::{Deserialize, Serialize};

/// Admin account created on startup when the store has none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Login name of the bootstrap admin.
    #[serde(default = "default_username")]
    pub admin_username: String,
    /// Email of the bootstrap admin.
    #[serde(default = "default_email")]
    pub admin_email: String,
    /// Password of the bootstrap admin. Bootstrap is skipped when unset.
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: default_username(),
            admin_email: default_email(),
            admin_password: None,
        }
    }
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_email() -> String {
    "admin@parkhub.local".to_string()
}
