//! Configuration loading and management.
//! Uses injected `AppPaths` so platform shells control where files live.

use std::fs;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::agent::AgentSettings;
use crate::error::ConfigError;
use crate::platform::AppPaths;
use crate::transport::Timeouts;

/// Well-known name of the agent service.
#[cfg(target_os = "windows")]
pub const DEFAULT_SERVICE_NAME: &str = "GLPI-Agent";
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_SERVICE_NAME: &str = "glpi-agent";
/// Port the agent's embedded HTTP server listens on out of the box.
pub const DEFAULT_PORT: u16 = 62354;

const TICKET_FORM_PATH: &str = "/front/ticket.form.php";
const SERVER_SUFFIXES: [&str; 3] = ["/plugins/", "/marketplace/", "/front/inventory.php"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub resolve_ms: u64,
    pub connect_ms: u64,
    pub send_ms: u64,
    pub receive_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            resolve_ms: 100,
            connect_ms: 10_000,
            send_ms: 10_000,
            receive_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// Service reconciliation period.
    pub service_ms: u64,
    /// Agent status refresh period.
    pub status_ms: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            service_ms: 500,
            status_ms: 2_000,
        }
    }
}

// Plain values first: TOML requires them before any table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service_name: String,
    pub host: String,
    /// Agent HTTP port. Unset means the agent's own `httpd-port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub status_path: String,
    pub inventory_path: String,
    /// Management server URL. Unset means the agent's own `server`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logfile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_ticket_url: Option<String>,
    pub new_ticket_screenshot: bool,
    pub timeouts: TimeoutConfig,
    pub intervals: IntervalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            host: "127.0.0.1".to_string(),
            port: None,
            status_path: "/status".to_string(),
            inventory_path: "/now".to_string(),
            server: None,
            logfile: None,
            new_ticket_url: None,
            new_ticket_screenshot: true,
            timeouts: TimeoutConfig::default(),
            intervals: IntervalConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the provided paths. Creates a default file if missing.
    pub fn load_with(paths: &dyn AppPaths) -> Result<Self, ConfigError> {
        let config_path = paths.config_path();

        if !config_path.exists() {
            info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let default_config = Self::default();
            default_config.save_with(paths)?;
            return Ok(default_config);
        }

        debug!("Loading config from {:?}", config_path);
        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;

        info!(
            "Loaded config: service '{}', agent endpoint {}:{}",
            config.service_name,
            config.host,
            config.port()
        );
        Ok(config)
    }

    /// Save configuration to the provided paths.
    pub fn save_with(&self, paths: &dyn AppPaths) -> Result<(), ConfigError> {
        let config_path = paths.config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Fill the settings left unset here from the agent's own configuration.
    pub fn with_agent_defaults(mut self, agent: &AgentSettings) -> Self {
        if self.port.is_none() {
            self.port = agent.httpd_port;
        }
        if self.server.is_none() {
            self.server = agent.server.clone();
        }
        if self.logfile.is_none() {
            self.logfile = agent.logfile.clone();
        }
        self
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            resolve: Duration::from_millis(self.timeouts.resolve_ms),
            connect: Duration::from_millis(self.timeouts.connect_ms),
            send: Duration::from_millis(self.timeouts.send_ms),
            receive: Duration::from_millis(self.timeouts.receive_ms),
        }
    }

    pub fn service_interval(&self) -> Duration {
        Duration::from_millis(self.intervals.service_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.intervals.status_ms)
    }

    /// URL opened by the "new ticket" action.
    ///
    /// An explicit override wins; otherwise the URL is derived from the
    /// management server the agent reports to. `None` when neither is set.
    pub fn new_ticket_url(&self) -> Option<String> {
        if let Some(url) = self.new_ticket_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }

        let base = server_base_url(self.server.as_deref()?);
        if base.is_empty() {
            None
        } else if base.starts_with("https://") || base.starts_with("http://") {
            Some(format!("{base}{TICKET_FORM_PATH}"))
        } else {
            Some(format!("http://{base}{TICKET_FORM_PATH}"))
        }
    }
}

/// Reduce the agent's `server` setting to the web root of the management server.
fn server_base_url(server: &str) -> String {
    let unquoted: String = server.chars().filter(|c| *c != '\'' && *c != '"').collect();
    let first = unquoted.split(',').next().unwrap_or_default().trim();

    let cut = SERVER_SUFFIXES
        .iter()
        .find_map(|suffix| first.find(suffix))
        .unwrap_or(first.len());

    first[..cut].trim_end_matches('/').to_string()
}
