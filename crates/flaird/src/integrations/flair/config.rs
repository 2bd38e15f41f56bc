use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use super::error::FlairError;

pub const DEFAULT_API_ROOT: &str = "https://api.flair.co";

pub const CLIENT_ID_PARAM: &str = "client_id";
pub const CLIENT_SECRET_PARAM: &str = "client_secret";

fn default_api_root() -> String {
    DEFAULT_API_ROOT.to_string()
}

/// Configuration for the Flair integration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// OAuth client id issued by Flair
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret issued by Flair
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Base URL of the Flair API (default: "https://api.flair.co")
    #[serde(default = "default_api_root")]
    pub api_root: String,
}

impl Config {
    /// Custom parameters delivered to the integration on start
    ///
    /// Absent values are left out so they don't clobber parameters the
    /// integration already holds.
    pub fn custom_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Some(id) = &self.client_id {
            params.insert(CLIENT_ID_PARAM.to_string(), id.clone());
        }
        if let Some(secret) = &self.client_secret {
            params.insert(CLIENT_SECRET_PARAM.to_string(), secret.clone());
        }
        params
    }
}

/// OAuth client credentials as last set by the host
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Take the values present in `params`, keeping the current ones for
    /// keys that are absent.
    pub fn merge_params(&mut self, params: &HashMap<String, String>) {
        if let Some(id) = params.get(CLIENT_ID_PARAM) {
            self.client_id = id.clone();
        }
        if let Some(secret) = params.get(CLIENT_SECRET_PARAM) {
            self.client_secret = secret.clone();
        }
    }

    /// Both values must be non-empty
    pub fn validate(&self) -> Result<(), FlairError> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push(CLIENT_ID_PARAM);
        }
        if self.client_secret.trim().is_empty() {
            missing.push(CLIENT_SECRET_PARAM);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(FlairError::Configuration { missing })
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
