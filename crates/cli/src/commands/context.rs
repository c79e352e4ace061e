use std::sync::Arc;

use tracing::{info, warn};
use wgpilot_core::{
    error::Result,
    executor::ElevatedExecutor,
    paths::{get_profiles_path, get_settings_path, get_tunnel_location},
    platform::{BuildMode, Platform},
    profile::ProfileCatalog,
    resolver::CommandResolver,
    session::SessionController,
    settings::SettingsStore,
};

/// Everything a command needs, wired from the files under the app directory.
pub struct AppContext {
    pub controller: Arc<SessionController>,
    pub catalog: ProfileCatalog,
    pub settings_store: SettingsStore,
}

impl AppContext {
    /// Selects `profile_id` when given, otherwise the first profile in the
    /// catalog.
    pub async fn load(profile_id: Option<&str>) -> Result<Self> {
        let platform = Platform::current();
        let tunnel = get_tunnel_location(BuildMode::current()).await?;
        let settings_store = SettingsStore::new(get_settings_path().await?);
        let settings = settings_store.load().await?;
        let catalog = ProfileCatalog::load(&get_profiles_path().await?).await?;

        info!(%platform, tunnel = %tunnel.name, "starting");

        let controller = SessionController::new(
            Arc::new(ElevatedExecutor::new(platform.clone())),
            CommandResolver::from_env(),
            platform,
            tunnel,
        )
        .with_settings(settings);

        let profile = match profile_id {
            Some(id) => Some(catalog.get(id)?.clone()),
            None => catalog.default_profile().cloned(),
        };
        match profile {
            Some(profile) => controller.select_profile(profile)?,
            None => warn!("no tunnel profiles available"),
        }

        Ok(AppContext {
            controller: Arc::new(controller),
            catalog,
            settings_store,
        })
    }
}
