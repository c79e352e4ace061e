use std::{
    fmt::{self, Display, Formatter},
    net::IpAddr,
    path::{Path, PathBuf},
    str::FromStr,
};

use ini::Ini;
use serde::{Deserialize, Serialize};
use tokio::fs::{create_dir_all, try_exists};
use tracing::{debug, info};

use crate::error::{ConfigurationError, Error, Result};

const SECTION: &str = "connection";
const MTU_RANGE: std::ops::RangeInclusive<u16> = 576..=9000;
const FALLBACK_CUSTOM_DNS: &str = "1.1.1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsMode {
    Cloudflare,
    Google,
    Custom,
}

impl FromStr for DnsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cloudflare" => Ok(DnsMode::Cloudflare),
            "google" => Ok(DnsMode::Google),
            "custom" => Ok(DnsMode::Custom),
            other => Err(ConfigurationError::InvalidValue {
                field: "dns_mode".to_string(),
                reason: format!("unknown mode `{other}`"),
            }
            .into()),
        }
    }
}

impl Display for DnsMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let value = match self {
            DnsMode::Cloudflare => "cloudflare",
            DnsMode::Google => "google",
            DnsMode::Custom => "custom",
        };
        write!(f, "{}", value)
    }
}

/// User preferences applied to a profile's template before each connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub mtu: u16,
    pub dns_mode: DnsMode,
    pub custom_dns: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            mtu: 1280,
            dns_mode: DnsMode::Cloudflare,
            custom_dns: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub mtu: Option<u16>,
    pub dns_mode: Option<DnsMode>,
    pub custom_dns: Option<String>,
}

impl ConnectionSettings {
    /// Comma separated resolvers for the `DNS =` line.
    pub fn dns_servers(&self) -> String {
        match self.dns_mode {
            DnsMode::Cloudflare => "1.1.1.1,1.0.0.1".to_string(),
            DnsMode::Google => "8.8.8.8,8.8.4.4".to_string(),
            DnsMode::Custom if self.custom_dns.trim().is_empty() => FALLBACK_CUSTOM_DNS.to_string(),
            DnsMode::Custom => self.custom_dns.trim().to_string(),
        }
    }

    /// Returns these settings with `patch` merged in, or the reason it was
    /// rejected. `self` is left untouched either way.
    pub fn apply(&self, patch: &SettingsPatch) -> Result<ConnectionSettings> {
        let mut merged = self.clone();
        if let Some(mtu) = patch.mtu {
            merged.mtu = mtu;
        }
        if let Some(dns_mode) = patch.dns_mode {
            merged.dns_mode = dns_mode;
        }
        if let Some(custom_dns) = &patch.custom_dns {
            merged.custom_dns = custom_dns.trim().to_string();
        }
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<()> {
        if !MTU_RANGE.contains(&self.mtu) {
            return Err(ConfigurationError::InvalidValue {
                field: "mtu".to_string(),
                reason: format!(
                    "{} is outside {}..={}",
                    self.mtu,
                    MTU_RANGE.start(),
                    MTU_RANGE.end()
                ),
            }
            .into());
        }

        for server in self
            .custom_dns
            .split(',')
            .map(str::trim)
            .filter(|server| !server.is_empty())
        {
            server
                .parse::<IpAddr>()
                .map_err(|_| ConfigurationError::InvalidValue {
                    field: "custom_dns".to_string(),
                    reason: format!("`{server}` is not an IP address"),
                })?;
        }
        Ok(())
    }
}

/// Persists [`ConnectionSettings`] as an INI file.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<ConnectionSettings> {
        if !try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(ConnectionSettings::default());
        }

        let config = Ini::load_from_file(&self.path).map_err(|error| match error {
            ini::Error::Io(io_error) => Error::InputOutput(io_error),
            ini::Error::Parse(parse_error) => ConfigurationError::InvalidFile {
                reason: parse_error.to_string(),
            }
            .into(),
        })?;

        let mut settings = ConnectionSettings::default();
        if let Some(section) = config.section(Some(SECTION)) {
            if let Some(mtu) = section.get("mtu") {
                settings.mtu = mtu.trim().parse().map_err(|_| ConfigurationError::InvalidFile {
                    reason: format!("invalid mtu `{mtu}` in {}", self.path.display()),
                })?;
            }
            if let Some(dns_mode) = section.get("dns_mode") {
                settings.dns_mode = dns_mode.parse()?;
            }
            if let Some(custom_dns) = section.get("custom_dns") {
                settings.custom_dns = custom_dns.trim().to_string();
            }
        }
        settings.validate()?;

        Ok(settings)
    }

    pub async fn save(&self, settings: &ConnectionSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !try_exists(parent).await? {
                create_dir_all(parent).await?;
            }
        }

        let mut config = Ini::new();
        config
            .with_section(Some(SECTION))
            .set("mtu", settings.mtu.to_string())
            .set("dns_mode", settings.dns_mode.to_string())
            .set("custom_dns", settings.custom_dns.clone());
        config.write_to_file(&self.path)?;

        info!(path = %self.path.display(), "saved connection settings");
        Ok(())
    }
}
