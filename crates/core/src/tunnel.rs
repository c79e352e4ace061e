use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// What observers see of the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VpnStatus {
    pub connection_state: ConnectionState,
    pub is_busy: bool,
    pub last_error_message: Option<String>,
}

/// The runtime state of the one logical tunnel. Only the session controller
/// mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TunnelSession {
    pub status: ConnectionState,
    pub last_error: Option<String>,
}

impl Default for TunnelSession {
    fn default() -> Self {
        TunnelSession {
            status: ConnectionState::Disconnected,
            last_error: None,
        }
    }
}
