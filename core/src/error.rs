//! Error types for the monitor core.

/// Failure to build the long-lived transport session. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to start transport runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("transport session is closed")]
    Closed,
}

/// Why the service manager could not report a usable status.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service '{0}' is not installed")]
    NotInstalled(String),

    #[error("service manager unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("unexpected service manager output: {0}")]
    Unparseable(String),
}

/// Outcome classes of a user-initiated inventory request that are not success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("agent service is not running")]
    NotRunning,

    #[error("agent is in an error state")]
    AgentUnhealthy,

    #[error("agent did not respond")]
    NoResponse,

    #[error("agent refused the request (HTTP {0})")]
    NotAuthorized(u16),
}

impl InventoryError {
    /// Text shown to the user in the error dialog.
    pub fn user_message(&self) -> &'static str {
        match self {
            InventoryError::NotRunning => {
                "The agent service is not running. Start the service and try again."
            }
            InventoryError::AgentUnhealthy => {
                "The agent is in an error state. Check the agent logs."
            }
            InventoryError::NoResponse => "The agent did not respond to the inventory request.",
            InventoryError::NotAuthorized(_) => {
                "The agent refused the inventory request. Check the agent's trusted hosts."
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
