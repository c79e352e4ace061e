//! Maps the text and exit status of a failed tunnel command onto the few
//! failure kinds the session cares about.
//!
//! WireGuard tooling and the elevation wrappers do not expose structured
//! errors, so this is substring matching. Keep every phrase here.

/// Phrases printed when the user declines or dismisses an elevation prompt.
const DENIED_PHRASES: &[&str] = &[
    "did not grant permission",
    "user canceled",
    "(-128)",
    "request dismissed",
    "error executing command as another user: not authorized",
    "canceled by the user",
];

/// Phrases printed when the tunnel interface or service is left over from an
/// unclean shutdown.
const ALREADY_EXISTS_PHRASES: &[&str] = &["already exists"];

/// `pkexec` exits with 126 when the authentication dialog is dismissed.
const PKEXEC_DISMISSED_EXIT_CODE: i32 = 126;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Denied,
    AlreadyExists,
    Other,
}

pub fn classify_failure(output: &str, exit_code: Option<i32>) -> FailureKind {
    let lowered = output.to_lowercase();

    if DENIED_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return FailureKind::Denied;
    }
    if ALREADY_EXISTS_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return FailureKind::AlreadyExists;
    }
    if cfg!(target_os = "linux") && exit_code == Some(PKEXEC_DISMISSED_EXIT_CODE) {
        return FailureKind::Denied;
    }
    FailureKind::Other
}
