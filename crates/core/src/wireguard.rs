use std::path::Path;

use base64::{Engine, engine::general_purpose};
use ini::Ini;
use ipnet::IpNet;
use tokio::fs::{create_dir_all, try_exists, write};
use tracing::debug;

use crate::{
    error::{ConfigurationError, Result},
    settings::ConnectionSettings,
};

pub const DNS_PLACEHOLDER: &str = "__DNS__";
pub const MTU_PLACEHOLDER: &str = "__MTU__";

/// Substitutes the DNS and MTU placeholders of a profile template.
pub fn render_config(template: &str, settings: &ConnectionSettings) -> String {
    template
        .replace(DNS_PLACEHOLDER, &settings.dns_servers())
        .replace(MTU_PLACEHOLDER, &settings.mtu.to_string())
}

fn invalid(reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::ConfigInvalid {
        reason: reason.into(),
    }
}

fn check_key(value: Option<&str>, field: &str) -> Result<()> {
    let value = value.ok_or_else(|| invalid(format!("missing {field}")))?;
    let decoded = general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|error| invalid(format!("invalid {field}: {error}")))?;
    if decoded.len() != 32 {
        return Err(invalid(format!("invalid {field}: expected 32 bytes, got {}", decoded.len())).into());
    }
    Ok(())
}

/// Checks a rendered config has what `wg-quick` and `wireguard.exe` need
/// before anything is written or executed.
pub fn validate_config(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(invalid("configuration is empty").into());
    }

    let config = Ini::load_from_str(text).map_err(|error| invalid(error.to_string()))?;

    let interface = config
        .section(Some("Interface"))
        .ok_or_else(|| invalid("missing [Interface] section"))?;
    let peer = config
        .section(Some("Peer"))
        .ok_or_else(|| invalid("missing [Peer] section"))?;

    check_key(interface.get("PrivateKey"), "PrivateKey")?;
    check_key(peer.get("PublicKey"), "PublicKey")?;

    let addresses = interface
        .get("Address")
        .ok_or_else(|| invalid("missing Address"))?;
    for address in addresses.split(',').map(str::trim) {
        address
            .parse::<IpNet>()
            .map_err(|error| invalid(format!("invalid Address `{address}`: {error}")))?;
    }

    Ok(())
}

/// Writes the config, replacing any previous file. On Unix the file is made
/// readable by its owner only since it carries the private key.
pub async fn write_config(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !try_exists(parent).await? {
            create_dir_all(parent).await?;
        }
    }

    write(path, text).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    debug!(path = %path.display(), "wrote tunnel configuration");
    Ok(())
}
