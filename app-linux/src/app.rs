use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use agent_monitor_core::agent::{self, AgentSettings};
use agent_monitor_core::config::Config;
use agent_monitor_core::error::TransportError;
use agent_monitor_core::monitor::Monitor;
use agent_monitor_core::platform::{ChannelSurface, SurfaceUpdate};
use agent_monitor_core::process::{quiet_command, spawn_reaped};
use agent_monitor_core::service::{ServiceAction, ServiceQuery, system_query};
use agent_monitor_core::transport::Session;
use log::{error, info, warn};

use crate::notify::DesktopNotifier;
use crate::paths::LinuxPaths;

/// Shared application state for the Linux shell.
pub struct AppState {
    pub config: Config,
    pub agent: AgentSettings,
    pub paths: Arc<LinuxPaths>,
    pub session: Session,
    pub monitor: Monitor<Box<dyn ServiceQuery + Send>>,
    pub updates: Receiver<SurfaceUpdate>,
    pub notifier: DesktopNotifier,
}

impl AppState {
    pub fn new() -> Result<Self, TransportError> {
        let paths = Arc::new(LinuxPaths);

        let config = match Config::load_with(paths.as_ref()) {
            Ok(config) => {
                info!("Loaded configuration successfully");
                config
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                warn!("Using default configuration");
                Config::default()
            }
        };
        let agent = agent::system_settings();
        let config = config.with_agent_defaults(&agent);

        let user_agent = format!("agent-monitor/{}", env!("CARGO_PKG_VERSION"));
        let session = Session::open(&user_agent, config.timeouts())?;
        let connection = session.connect(&config.host, config.port());

        let (tx, updates) = mpsc::channel();
        let surface = Arc::new(ChannelSurface::new(tx));
        let monitor = Monitor::new(&config, system_query(), connection, surface);

        Ok(Self {
            config,
            agent,
            paths,
            session,
            monitor,
            updates,
            notifier: DesktopNotifier,
        })
    }

    pub fn cleanup(&self) {
        self.session.close();
    }
}

/// Ask systemd to perform `action`; polkit handles authorisation.
pub fn control_service(service_name: &str, action: ServiceAction) -> std::io::Result<()> {
    let verb = match action {
        ServiceAction::Start => "start",
        ServiceAction::Stop => "stop",
        ServiceAction::Resume => "thaw",
    };
    info!("systemctl {verb} {service_name}");
    let mut cmd = quiet_command("systemctl");
    cmd.args(["--no-block", verb, service_name]);
    spawn_reaped(cmd)
}
