use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs::{read_to_string, try_exists};
use tracing::{debug, info};

use crate::error::{ConfigurationError, Result};

/// A VPN endpoint the user can pick.
///
/// `config_template` is a WireGuard config containing the `__DNS__` and
/// `__MTU__` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelProfile {
    pub id: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub ping_ms: Option<u32>,
    pub config_template: String,
}

impl TunnelProfile {
    pub fn display_name(&self) -> String {
        match (self.city.is_empty(), self.country.is_empty()) {
            (false, false) => format!("{}, {}", self.city, self.country),
            (true, false) => self.country.clone(),
            (false, true) => self.city.clone(),
            (true, true) => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: Vec<TunnelProfile>,
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<TunnelProfile>) -> Self {
        ProfileCatalog { profiles }
    }

    /// Loads the catalog from a JSON array. A missing file is an empty
    /// catalog.
    pub async fn load(path: &Path) -> Result<Self> {
        if !try_exists(path).await? {
            debug!(path = %path.display(), "no profile catalog");
            return Ok(Self::default());
        }
        let content = read_to_string(path).await?;
        let catalog = Self::from_json_str(&content)?;
        info!(count = catalog.len(), "loaded tunnel profiles");
        Ok(catalog)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let profiles: Vec<TunnelProfile> = serde_json::from_str(content)?;
        Ok(Self::new(profiles))
    }

    pub fn get(&self, id: &str) -> Result<&TunnelProfile> {
        self.profiles
            .iter()
            .find(|profile| profile.id == id)
            .ok_or_else(|| {
                ConfigurationError::ProfileNotFound { id: id.to_string() }.into()
            })
    }

    /// First profile in the catalog.
    pub fn default_profile(&self) -> Option<&TunnelProfile> {
        self.profiles.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TunnelProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
