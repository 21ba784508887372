//! Google OAuth and API configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth client id; ID tokens must carry it as audience.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Needed only for the refresh-token fallback.
    #[serde(skip)]
    pub client_secret: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default = "default_tokeninfo_uri")]
    pub tokeninfo_uri: String,

    #[serde(default = "default_resource_manager_url")]
    pub resource_manager_url: String,

    #[serde(default = "default_iam_url")]
    pub iam_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_tokeninfo_uri() -> String {
    "https://oauth2.googleapis.com/tokeninfo".to_string()
}

fn default_resource_manager_url() -> String {
    "https://cloudresourcemanager.googleapis.com/v1".to_string()
}

fn default_iam_url() -> String {
    "https://iam.googleapis.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_uri: default_token_uri(),
            tokeninfo_uri: default_tokeninfo_uri(),
            resource_manager_url: default_resource_manager_url(),
            iam_url: default_iam_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
