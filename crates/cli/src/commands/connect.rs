use wgpilot_core::tunnel::ConnectionState;

use super::context::AppContext;

pub async fn connect(profile: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let context = AppContext::load(profile).await?;
    if let Some(profile) = context.controller.profile()? {
        println!("Connecting to {}...", profile.display_name());
    }

    match context.controller.connect().await? {
        ConnectionState::Connected => {
            println!("Connected. Run `wgpilot disconnect` to bring the tunnel down.")
        }
        _ => println!("Permission was not granted, tunnel not started."),
    }
    Ok(())
}
