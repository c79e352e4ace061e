use wgpilot_core::{paths::get_profiles_path, profile::ProfileCatalog};

pub async fn list_profiles(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = get_profiles_path().await?;
    let catalog = ProfileCatalog::load(&path).await?;

    if json {
        let profiles: Vec<_> = catalog.iter().collect();
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No profiles found. Add some to {}", path.display());
        return Ok(());
    }
    for profile in catalog.iter() {
        match profile.ping_ms {
            Some(ping) => println!("{:<12} {} ({ping} ms)", profile.id, profile.display_name()),
            None => println!("{:<12} {}", profile.id, profile.display_name()),
        }
    }
    Ok(())
}
