use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wgpilot_core::settings::DnsMode;

mod commands {
    pub mod connect;
    pub mod context;
    pub mod disconnect;
    pub mod profiles;
    pub mod run;
    pub mod settings;
}

#[derive(Parser)]
#[command(name = "wgpilot")]
#[command(about = "WireGuard tunnel controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session; the tunnel is brought down on exit
    Run {
        #[arg(long, help = "Profile id to start with")]
        profile: Option<String>,
    },
    /// Bring the tunnel up and leave it running
    Connect {
        #[arg(long, help = "Profile id to connect with")]
        profile: Option<String>,
    },
    /// Bring the tunnel down
    Disconnect,
    /// List the known tunnel profiles
    Profiles {
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },
    /// Show or change the connection settings
    Settings {
        #[arg(long)]
        mtu: Option<u16>,
        #[arg(long, value_parser = parse_dns_mode)]
        dns_mode: Option<DnsMode>,
        #[arg(long, help = "Comma separated resolvers used with --dns-mode custom")]
        custom_dns: Option<String>,
    },
}

fn parse_dns_mode(value: &str) -> Result<DnsMode, String> {
    value.parse().map_err(|error: wgpilot_core::error::Error| error.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wgpilot_core=info,wgpilot_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run { profile: None }) {
        Commands::Run { profile } => commands::run::run(profile.as_deref()).await?,
        Commands::Connect { profile } => commands::connect::connect(profile.as_deref()).await?,
        Commands::Disconnect => commands::disconnect::disconnect().await?,
        Commands::Profiles { json } => commands::profiles::list_profiles(json).await?,
        Commands::Settings {
            mtu,
            dns_mode,
            custom_dns,
        } => commands::settings::settings(mtu, dns_mode, custom_dns).await?,
    }
    Ok(())
}
