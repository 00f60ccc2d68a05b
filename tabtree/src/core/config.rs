use std::path::PathBuf;

use super::node::WindowId;

pub const DEFAULT_HOST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/tabtree.sock";
pub const DEFAULT_EVENT_SOCKET_PATH: &str = "/tmp/tabtree-events.sock";

/// Application configuration settings.
/// Passed into `State` at construction; never read from globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot file; `None` disables persistence
    pub state_path: Option<PathBuf>,
    /// The sidebar's own window, kept out of focus history
    pub sidebar_window_id: Option<WindowId>,
    pub host_timeout_ms: u64,
    pub persist_on_change: bool,
    /// Command socket
    pub socket_path: PathBuf,
    /// Event subscription socket
    pub event_socket_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            sidebar_window_id: None,
            host_timeout_ms: DEFAULT_HOST_TIMEOUT_MS,
            persist_on_change: true,
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            event_socket_path: PathBuf::from(DEFAULT_EVENT_SOCKET_PATH),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration without a snapshot file, as used by tests
    #[cfg(test)]
    pub fn ephemeral() -> Self {
        Self {
            state_path: None,
            ..Self::default()
        }
    }
}

pub fn default_state_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("tabtree").join("tree.json"))
}
