use std::path::PathBuf;

use tokio::fs::{create_dir_all, try_exists};

use crate::{
    error::{ConfigurationError, Result},
    platform::BuildMode,
    resolver::TunnelLocation,
};

const APP_DIR_NAME: &str = ".wgpilot";

pub async fn get_app_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(ConfigurationError::HomeDirectoryNotAvailable)?;
    let app_dir = home_dir.join(APP_DIR_NAME);

    if !try_exists(&app_dir).await? {
        create_dir_all(&app_dir).await?;
    }

    Ok(app_dir)
}

pub async fn get_settings_path() -> Result<PathBuf> {
    Ok(get_app_dir().await?.join("settings.ini"))
}

pub async fn get_profiles_path() -> Result<PathBuf> {
    Ok(get_app_dir().await?.join("profiles.json"))
}

/// The single config file and tunnel name for this build.
pub async fn get_tunnel_location(build_mode: BuildMode) -> Result<TunnelLocation> {
    let name = build_mode.tunnel_name();
    let config_path = get_app_dir().await?.join(format!("{name}.conf"));
    Ok(TunnelLocation {
        name: name.to_string(),
        config_path,
    })
}
