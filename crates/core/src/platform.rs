use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            other => Platform::Other(other.to_string()),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let value = match self {
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Other(name) => name.as_str(),
        };
        write!(f, "{}", value)
    }
}

/// Which build of the application is running.
///
/// Development and production builds use different tunnel names so one can
/// never tear down the other's tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    pub fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Production
        }
    }

    pub fn tunnel_name(&self) -> &'static str {
        match self {
            BuildMode::Development => "wgpilot-dev",
            BuildMode::Production => "wgpilot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_os() {
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(Platform::from_os("windows"), Platform::Windows);
        assert_eq!(
            Platform::from_os("freebsd"),
            Platform::Other("freebsd".to_string())
        );
    }

    #[test]
    fn test_tunnel_names_differ() {
        assert_ne!(
            BuildMode::Development.tunnel_name(),
            BuildMode::Production.tunnel_name()
        );
    }

    #[test]
    fn test_tunnel_names_fit_interface_limit() {
        // Linux interface names are capped at 15 bytes.
        for mode in [BuildMode::Development, BuildMode::Production] {
            assert!(mode.tunnel_name().len() <= 15);
        }
    }
}
