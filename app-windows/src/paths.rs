use std::path::PathBuf;

use agent_monitor_core::platform::AppPaths;

#[derive(Default)]
pub struct WindowsPaths;

impl AppPaths for WindowsPaths {
    fn config_path(&self) -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("GLPI-AgentMonitor")
            .join("config.toml")
    }
}
