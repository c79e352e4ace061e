//! Works out which WireGuard binary to call on each platform and with which
//! arguments. Nothing here touches the config file itself.

use std::{
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, SystemError},
    platform::Platform,
};

/// Install prefixes searched for `wg-quick`, package managers first.
const WG_QUICK_PREFIXES: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/usr/sbin"];

/// `PATH` handed to `wg-quick` so it can find bash, wg and friends even from a
/// sanitized root environment.
const RESOLVED_PATH: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

const DEFAULT_PROGRAM_FILES: &str = r"C:\Program Files";

/// A single process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        CommandLine {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Renders the invocation as a POSIX shell command, environment first.
    pub fn to_shell_string(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(key, value)| format!("{}={}", key, shell_quote(value)))
            .collect();
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|arg| shell_quote(arg)));
        parts.join(" ")
    }
}

impl Display for CommandLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_shell_string())
    }
}

fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:,=@%+".contains(c));
    if is_plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Where the tunnel's config lives and what the tunnel is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelLocation {
    pub name: String,
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub up: CommandLine,
    pub down: CommandLine,
    pub config_path: PathBuf,
}

pub struct CommandResolver {
    search_prefixes: Vec<PathBuf>,
    windows_executable: String,
    probe: fn(&Path) -> bool,
}

impl CommandResolver {
    /// Resolver for the current host. Honours `WIREGUARD_EXE` and
    /// `ProgramFiles` when locating the Windows CLI.
    pub fn from_env() -> Self {
        let windows_executable = std::env::var("WIREGUARD_EXE").unwrap_or_else(|_| {
            let program_files = std::env::var("ProgramFiles")
                .unwrap_or_else(|_| DEFAULT_PROGRAM_FILES.to_string());
            format!(r"{}\WireGuard\wireguard.exe", program_files.trim_end_matches('\\'))
        });

        CommandResolver {
            search_prefixes: WG_QUICK_PREFIXES.iter().map(PathBuf::from).collect(),
            windows_executable,
            probe: |path| path.exists(),
        }
    }

    pub fn with_probe(mut self, probe: fn(&Path) -> bool) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_windows_executable(mut self, executable: impl Into<String>) -> Self {
        self.windows_executable = executable.into();
        self
    }

    pub fn resolve(&self, platform: &Platform, tunnel: &TunnelLocation) -> Result<ResolvedCommand> {
        let config_path = tunnel.config_path.to_string_lossy().to_string();

        let (up, down) = match platform {
            Platform::MacOs | Platform::Linux => {
                let wg_quick = self.locate_wg_quick();
                let up = CommandLine::new(&wg_quick)
                    .env("PATH", RESOLVED_PATH)
                    .arg("up")
                    .arg(&config_path);
                let down = CommandLine::new(&wg_quick)
                    .env("PATH", RESOLVED_PATH)
                    .arg("down")
                    .arg(&config_path);
                (up, down)
            }
            Platform::Windows => {
                let up = CommandLine::new(&self.windows_executable)
                    .arg("/installtunnelservice")
                    .arg(&config_path);
                // The tunnel service is keyed by name, not by file.
                let down = CommandLine::new(&self.windows_executable)
                    .arg("/uninstalltunnelservice")
                    .arg(&tunnel.name);
                (up, down)
            }
            Platform::Other(name) => {
                return Err(SystemError::UnsupportedPlatform {
                    platform: name.clone(),
                }
                .into());
            }
        };

        Ok(ResolvedCommand {
            up,
            down,
            config_path: tunnel.config_path.clone(),
        })
    }

    fn locate_wg_quick(&self) -> String {
        self.search_prefixes
            .iter()
            .map(|prefix| prefix.join("wg-quick"))
            .find(|candidate| (self.probe)(candidate))
            .map(|found| found.to_string_lossy().to_string())
            .unwrap_or_else(|| "wg-quick".to_string())
    }
}

impl Default for CommandResolver {
    fn default() -> Self {
        Self::from_env()
    }
}
