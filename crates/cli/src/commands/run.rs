use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use wgpilot_core::{
    error::Error,
    lifecycle::AppLifecycle,
    session::SessionController,
    settings::{DnsMode, SettingsPatch},
    tunnel::{ConnectionState, VpnStatus},
};

use super::{context::AppContext, settings::print_settings};

const HELP: &str = "\
commands:
  connect | disconnect | toggle
  status
  profiles
  profile <id>
  mtu <bytes>
  dns <cloudflare|google|custom> [servers]
  settings
  quit";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Connect,
    Disconnect,
    Toggle,
    Status,
    Profiles,
    Profile(String),
    Settings(SettingsPatch),
    ShowSettings,
    Help,
    Quit,
    Empty,
}

fn parse_line(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Empty);
    };
    let rest: Vec<&str> = words.collect();

    let input = match (verb, rest.as_slice()) {
        ("connect" | "up", []) => Input::Connect,
        ("disconnect" | "down", []) => Input::Disconnect,
        ("toggle", []) => Input::Toggle,
        ("status", []) => Input::Status,
        ("profiles", []) => Input::Profiles,
        ("profile", [id]) => Input::Profile(id.to_string()),
        ("settings", []) => Input::ShowSettings,
        ("mtu", [mtu]) => Input::Settings(SettingsPatch {
            mtu: Some(mtu.parse().map_err(|_| format!("invalid mtu `{mtu}`"))?),
            ..Default::default()
        }),
        ("dns", [mode, servers @ ..]) => {
            let dns_mode: DnsMode = mode.parse().map_err(|error: Error| error.to_string())?;
            let custom_dns = match servers {
                [] => None,
                servers => Some(servers.join("")),
            };
            Input::Settings(SettingsPatch {
                dns_mode: Some(dns_mode),
                custom_dns,
                ..Default::default()
            })
        }
        ("help" | "?", _) => Input::Help,
        ("quit" | "exit", _) => Input::Quit,
        (verb, _) => return Err(format!("unknown command `{verb}`, try `help`")),
    };
    Ok(input)
}

fn print_status(status: &VpnStatus) {
    let state = match status.connection_state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
    };
    match &status.last_error_message {
        Some(message) => println!("[{state}] {message}"),
        None if status.is_busy => println!("[{state}] working..."),
        None => println!("[{state}]"),
    }
}

/// Visible failures already reach the user through the status stream.
fn report(error: Error) {
    if !error.is_user_visible() {
        println!("{error}");
    }
}

/// Tunnel commands run in the background so the prompt stays responsive and
/// a second request while one is in flight is answered as busy.
fn spawn_tunnel_command(controller: &Arc<SessionController>, input: Input) {
    let controller = controller.clone();
    tokio::spawn(async move {
        let result = match input {
            Input::Connect => controller.connect().await,
            Input::Disconnect => controller.disconnect().await,
            _ => controller.toggle().await,
        };
        if let Err(error) = result {
            report(error);
        }
    });
}

async fn handle(context: &AppContext, input: Input) -> Result<(), Error> {
    let controller = &context.controller;
    match input {
        Input::Connect | Input::Disconnect | Input::Toggle => {
            spawn_tunnel_command(controller, input)
        }
        Input::Status => {
            print_status(&controller.status());
            if let Some(profile) = controller.profile()? {
                println!("profile    {} ({})", profile.display_name(), profile.id);
            }
        }
        Input::Profiles => {
            for profile in context.catalog.iter() {
                println!("{:<12} {}", profile.id, profile.display_name());
            }
        }
        Input::Profile(id) => {
            let profile = context.catalog.get(&id)?.clone();
            println!("selected {}", profile.display_name());
            controller.select_profile(profile)?;
        }
        Input::Settings(patch) => {
            let updated = controller.update_settings(&patch)?;
            context.settings_store.save(&updated).await?;
            print_settings(&updated);
        }
        Input::ShowSettings => print_settings(&controller.settings()?),
        Input::Help => println!("{HELP}"),
        Input::Quit | Input::Empty => {}
    }
    Ok(())
}

pub async fn run(profile: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let context = AppContext::load(profile).await?;
    let lifecycle = AppLifecycle::default();
    lifecycle.register(context.controller.clone())?;

    let mut statuses = context.controller.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match statuses.recv().await {
                Ok(status) => print_status(&status),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "status output fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    print_status(&context.controller.status());
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => {
                        if let Err(error) = handle(&context, input).await {
                            println!("{error}");
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    lifecycle.request_exit().await;
    printer.abort();
    Ok(())
}
