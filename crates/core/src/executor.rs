//! Runs resolved tunnel commands with administrator rights.
//!
//! When the process is already root/administrator the command is spawned
//! directly. Otherwise it goes through the platform's consent prompt
//! (`osascript` on macOS, `pkexec` on Linux, UAC through PowerShell on
//! Windows) and blocks until the user answers.

use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::{
    classify::{FailureKind, classify_failure},
    error::ExecutionError,
    platform::Platform,
    resolver::CommandLine,
};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `command` to completion and returns its standard output.
    async fn run(&self, command: &CommandLine) -> Result<String, ExecutionError>;
}

pub struct ElevatedExecutor {
    platform: Platform,
}

impl ElevatedExecutor {
    pub fn new(platform: Platform) -> Self {
        ElevatedExecutor { platform }
    }

    pub async fn is_elevated(&self) -> bool {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions and cannot fail.
            unsafe { libc::geteuid() == 0 }
        }

        #[cfg(windows)]
        {
            let check = CommandLine::new("powershell")
                .arg("-NoProfile")
                .arg("-NonInteractive")
                .arg("-Command")
                .arg("[Security.Principal.WindowsPrincipal]::new([Security.Principal.WindowsIdentity]::GetCurrent()).IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)");
            match spawn(&check).await {
                Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                    .to_ascii_lowercase()
                    .contains("true"),
                _ => false,
            }
        }

        #[cfg(not(any(unix, windows)))]
        {
            false
        }
    }

    /// Wraps `command` in the platform's elevation prompt.
    pub fn elevation_wrapper(&self, command: &CommandLine) -> Result<CommandLine, ExecutionError> {
        match &self.platform {
            Platform::MacOs => {
                let shell = command
                    .to_shell_string()
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"");
                Ok(CommandLine::new("osascript").arg("-e").arg(format!(
                    "do shell script \"{}\" with administrator privileges",
                    shell
                )))
            }
            Platform::Linux => Ok(CommandLine::new("pkexec")
                .arg("sh")
                .arg("-c")
                .arg(command.to_shell_string())),
            Platform::Windows => Ok(CommandLine::new("powershell")
                .arg("-NoProfile")
                .arg("-NonInteractive")
                .arg("-Command")
                .arg(windows_elevation_script(command, &elevated_output_path()))),
            Platform::Other(name) => Err(ExecutionError::Spawn {
                command: command.to_string(),
                reason: format!("no elevation mechanism on {name}"),
            }),
        }
    }
}

#[async_trait]
impl CommandExecutor for ElevatedExecutor {
    async fn run(&self, command: &CommandLine) -> Result<String, ExecutionError> {
        let elevated = self.is_elevated().await;
        info!(%command, elevated, "running tunnel command");

        let invocation = if elevated {
            command.clone()
        } else {
            self.elevation_wrapper(command)?
        };

        let result = run_process(&invocation)
            .await
            .and_then(|output| interpret(command, output));

        match &result {
            Ok(stdout) => info!(%command, %stdout, "tunnel command succeeded"),
            Err(error) => warn!(%command, %error, "tunnel command failed"),
        }
        result
    }
}

/// Where the elevated Windows child writes its output. `Start-Process -Verb
/// RunAs` cannot pipe the child's stdout or stderr back to us.
fn elevated_output_path() -> PathBuf {
    static NEXT: AtomicU32 = AtomicU32::new(0);
    std::env::temp_dir().join(format!(
        "wgpilot-{}-{}.log",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
}

/// PowerShell that runs `command` through UAC with its combined output
/// redirected to `output_path`, replays that file on stdout and exits with
/// the child's exit code. A declined prompt stops the script with the
/// Start-Process error on stderr.
fn windows_elevation_script(command: &CommandLine, output_path: &Path) -> String {
    let quote = |value: &str| {
        if value.contains(' ') {
            format!("\"{value}\"")
        } else {
            value.to_string()
        }
    };
    let mut inner = format!("\"{}\"", command.program);
    for arg in &command.args {
        inner.push(' ');
        inner.push_str(&quote(arg));
    }
    let output_path = output_path.display().to_string();
    // cmd strips the outer pair of quotes after /c.
    let argument_list = format!("/d /c \"{inner} > \"{output_path}\" 2>&1\"");

    let output_path = output_path.replace('\'', "''");
    format!(
        "$ErrorActionPreference = 'Stop'; \
         $process = Start-Process -FilePath 'cmd.exe' -ArgumentList '{}' -Verb RunAs -Wait -PassThru -WindowStyle Hidden; \
         if (Test-Path -LiteralPath '{output_path}') {{ Get-Content -Raw -LiteralPath '{output_path}'; Remove-Item -LiteralPath '{output_path}' }}; \
         exit $process.ExitCode",
        argument_list.replace('\'', "''"),
    )
}

/// Spawns `command` without elevation and waits for it to exit.
pub async fn run_process(command: &CommandLine) -> Result<Output, ExecutionError> {
    spawn(command).await.map_err(|error| ExecutionError::Spawn {
        command: command.to_string(),
        reason: error.to_string(),
    })
}

async fn spawn(command: &CommandLine) -> std::io::Result<Output> {
    let mut process = Command::new(&command.program);
    process
        .args(&command.args)
        .envs(command.env.iter().cloned())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(windows)]
    process.creation_flags(CREATE_NO_WINDOW);

    process.output().await
}

/// Turns a finished process into the executor's result, classifying
/// failures by their output.
pub fn interpret(command: &CommandLine, output: Output) -> Result<String, ExecutionError> {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let text = match (stderr.is_empty(), stdout.is_empty()) {
        (false, false) => format!("{stderr}\n{stdout}"),
        (false, true) => stderr,
        (true, false) => stdout,
        (true, true) => format!("exited with {}", output.status),
    };

    match classify_failure(&text, output.status.code()) {
        FailureKind::Denied => Err(ExecutionError::Denied { output: text }),
        FailureKind::AlreadyExists => Err(ExecutionError::AlreadyExists { output: text }),
        FailureKind::Other => Err(ExecutionError::Failed {
            command: command.to_string(),
            output: text,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wg_up() -> CommandLine {
        CommandLine::new("/usr/bin/wg-quick")
            .env("PATH", "/usr/bin:/bin")
            .arg("up")
            .arg("/tmp/wgpilot.conf")
    }

    #[test]
    fn test_macos_wrapper() {
        let executor = ElevatedExecutor::new(Platform::MacOs);
        let wrapped = executor.elevation_wrapper(&wg_up()).unwrap();
        assert_eq!(wrapped.program, "osascript");
        assert_eq!(wrapped.args[0], "-e");
        assert_eq!(
            wrapped.args[1],
            "do shell script \"PATH=/usr/bin:/bin /usr/bin/wg-quick up /tmp/wgpilot.conf\" with administrator privileges"
        );
    }

    #[test]
    fn test_macos_wrapper_escapes_quotes() {
        let executor = ElevatedExecutor::new(Platform::MacOs);
        let command = CommandLine::new("echo").arg("say \"hi\"");
        let wrapped = executor.elevation_wrapper(&command).unwrap();
        assert!(wrapped.args[1].contains(r#"echo 'say \"hi\"'"#));
    }

    #[test]
    fn test_linux_wrapper() {
        let executor = ElevatedExecutor::new(Platform::Linux);
        let wrapped = executor.elevation_wrapper(&wg_up()).unwrap();
        assert_eq!(wrapped.program, "pkexec");
        assert_eq!(
            wrapped.args,
            vec![
                "sh",
                "-c",
                "PATH=/usr/bin:/bin /usr/bin/wg-quick up /tmp/wgpilot.conf"
            ]
        );
    }

    #[test]
    fn test_windows_wrapper() {
        let executor = ElevatedExecutor::new(Platform::Windows);
        let command = CommandLine::new(r"C:\Program Files\WireGuard\wireguard.exe")
            .arg("/installtunnelservice")
            .arg(r"C:\Users\me\.wgpilot\wgpilot.conf");
        let wrapped = executor.elevation_wrapper(&command).unwrap();
        assert_eq!(wrapped.program, "powershell");
        assert_eq!(wrapped.args[..3], ["-NoProfile", "-NonInteractive", "-Command"]);
        assert!(wrapped.args[3].contains("-Verb RunAs -Wait -PassThru"));
    }

    #[test]
    fn test_windows_script_captures_output() {
        let command = CommandLine::new(r"C:\Program Files\WireGuard\wireguard.exe")
            .arg("/uninstalltunnelservice")
            .arg("wgpilot");
        let script = windows_elevation_script(&command, Path::new(r"C:\Temp\wgpilot-7-0.log"));

        assert!(script.starts_with("$ErrorActionPreference = 'Stop';"));
        assert!(script.contains(
            r#"-FilePath 'cmd.exe' -ArgumentList '/d /c ""C:\Program Files\WireGuard\wireguard.exe" /uninstalltunnelservice wgpilot > "C:\Temp\wgpilot-7-0.log" 2>&1"'"#
        ));
        assert!(script.contains(r"Get-Content -Raw -LiteralPath 'C:\Temp\wgpilot-7-0.log'"));
        assert!(script.contains(r"Remove-Item -LiteralPath 'C:\Temp\wgpilot-7-0.log'"));
        assert!(script.ends_with("exit $process.ExitCode"));
    }

    #[test]
    fn test_windows_script_escapes_single_quotes() {
        let command = CommandLine::new(r"C:\Program Files\WireGuard\wireguard.exe")
            .arg("/installtunnelservice")
            .arg(r"C:\Users\o'brien\.wgpilot\wgpilot.conf");
        let script = windows_elevation_script(&command, Path::new(r"C:\Users\o'brien\out.log"));

        assert!(script.contains(r"C:\Users\o''brien\.wgpilot\wgpilot.conf"));
        assert!(script.contains(r"-LiteralPath 'C:\Users\o''brien\out.log'"));
        assert!(!script.contains(r"o'brien"));
    }

    #[test]
    fn test_elevated_output_paths_are_unique() {
        assert_ne!(elevated_output_path(), elevated_output_path());
    }

    #[test]
    fn test_other_platform_has_no_wrapper() {
        let executor = ElevatedExecutor::new(Platform::Other("haiku".to_string()));
        assert!(matches!(
            executor.elevation_wrapper(&wg_up()),
            Err(ExecutionError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    fn shell(script: &str) -> CommandLine {
        CommandLine::new("sh").arg("-c").arg(script)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_process_success() {
        let command = shell("echo interface up");
        let output = run_process(&command).await.unwrap();
        assert_eq!(interpret(&command, output).unwrap(), "interface up");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_process_applies_env() {
        let command = shell("echo $WGPILOT_TEST").env("WGPILOT_TEST", "value");
        let output = run_process(&command).await.unwrap();
        assert_eq!(interpret(&command, output).unwrap(), "value");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failures_are_classified() {
        let command = shell("echo \"wg-quick: 'wgpilot' already exists\" >&2; exit 1");
        let output = run_process(&command).await.unwrap();
        assert!(matches!(
            interpret(&command, output),
            Err(ExecutionError::AlreadyExists { .. })
        ));

        let command = shell("echo 'User did not grant permission.' >&2; exit 1");
        let output = run_process(&command).await.unwrap();
        assert!(matches!(
            interpret(&command, output),
            Err(ExecutionError::Denied { .. })
        ));

        let command = shell("echo 'Line unrecognized' >&2; exit 1");
        let output = run_process(&command).await.unwrap();
        match interpret(&command, output) {
            Err(ExecutionError::Failed { output, .. }) => assert_eq!(output, "Line unrecognized"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let command = CommandLine::new("/nonexistent/wgpilot-test-binary");
        assert!(matches!(
            run_process(&command).await,
            Err(ExecutionError::Spawn { .. })
        ));
    }
}
