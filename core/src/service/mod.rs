//! Agent service state as reported by the OS service manager.

use std::fmt;

use crate::error::ServiceError;

mod systemd;
mod windows;

pub use systemd::SystemdQuery;
pub use windows::ScQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    NotInstalled,
    Stopped,
    Running,
    Paused,
    StartPending,
    StopPending,
    PausePending,
    ContinuePending,
    Unknown,
}

impl ServiceState {
    pub fn is_running(self) -> bool {
        self == ServiceState::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::NotInstalled => "not-installed",
            ServiceState::Stopped => "stopped",
            ServiceState::Running => "running",
            ServiceState::Paused => "paused",
            ServiceState::StartPending => "start-pending",
            ServiceState::StopPending => "stop-pending",
            ServiceState::PausePending => "pause-pending",
            ServiceState::ContinuePending => "continue-pending",
            ServiceState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceAction {
    Start,
    Stop,
    Resume,
}

impl ServiceAction {
    pub fn label(self) -> &'static str {
        match self {
            ServiceAction::Start => "Start service",
            ServiceAction::Stop => "Stop service",
            ServiceAction::Resume => "Resume service",
        }
    }
}

/// How the service manager starts the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartType {
    Boot,
    System,
    Auto,
    DelayedAuto,
    Manual,
    Disabled,
    Unknown,
}

impl StartType {
    pub fn label(self) -> &'static str {
        match self {
            StartType::Boot => "Boot",
            StartType::System => "System",
            StartType::Auto => "Automatic",
            StartType::DelayedAuto => "Automatic (delayed start)",
            StartType::Manual => "Manual",
            StartType::Disabled => "Disabled",
            StartType::Unknown => "Unknown",
        }
    }
}

/// Read-only status query against the OS service manager.
pub trait ServiceQuery {
    /// Current state of the named service.
    ///
    /// A missing service is reported as [`ServiceError::NotInstalled`], never
    /// as `Ok(ServiceState::NotInstalled)`.
    fn query(&self, service_name: &str) -> Result<ServiceState, ServiceError>;

    /// Configured start type of the named service.
    fn start_type(&self, _service_name: &str) -> Result<StartType, ServiceError> {
        Ok(StartType::Unknown)
    }
}

impl<Q: ServiceQuery + ?Sized> ServiceQuery for Box<Q> {
    fn query(&self, service_name: &str) -> Result<ServiceState, ServiceError> {
        (**self).query(service_name)
    }

    fn start_type(&self, service_name: &str) -> Result<StartType, ServiceError> {
        (**self).start_type(service_name)
    }
}

/// The service manager of the platform this binary was built for.
pub fn system_query() -> Box<dyn ServiceQuery + Send> {
    if cfg!(target_os = "windows") {
        Box::new(ScQuery)
    } else {
        Box::new(SystemdQuery)
    }
}
