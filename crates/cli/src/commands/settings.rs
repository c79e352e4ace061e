use wgpilot_core::{
    paths::get_settings_path,
    settings::{ConnectionSettings, DnsMode, SettingsPatch, SettingsStore},
};

pub fn print_settings(settings: &ConnectionSettings) {
    println!("mtu        {}", settings.mtu);
    println!("dns_mode   {}", settings.dns_mode);
    println!("dns        {}", settings.dns_servers());
}

pub async fn settings(
    mtu: Option<u16>,
    dns_mode: Option<DnsMode>,
    custom_dns: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = SettingsStore::new(get_settings_path().await?);
    let current = store.load().await?;

    let patch = SettingsPatch {
        mtu,
        dns_mode,
        custom_dns,
    };
    if patch == SettingsPatch::default() {
        print_settings(&current);
        return Ok(());
    }

    let updated = current.apply(&patch)?;
    store.save(&updated).await?;
    println!("Saved to {}", store.path().display());
    print_settings(&updated);
    Ok(())
}
