//! What the UI shows for each service state.
//!
//! Kept as a data table so the presentation of a state can be checked
//! without running the reconciler.

use crate::service::{ServiceAction, ServiceState};

pub const AGENT_NOT_RUNNING: &str = "Agent not running";
pub const AGENT_WAITING: &str = "Waiting for agent...";
pub const SERVICE_ERROR: &str = "Service error";

/// Colour class of the service label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Green: service running.
    Positive,
    /// Orange: transitional or paused.
    Attention,
    /// Red: stopped, missing or unrecognised.
    Critical,
}

impl Marker {
    pub fn is_urgent(self) -> bool {
        self != Marker::Positive
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDisplay {
    pub state: ServiceState,
    pub label: &'static str,
    /// Operation offered by the action button.
    pub action: ServiceAction,
    pub action_enabled: bool,
    pub marker: Marker,
    /// Placeholder for the agent status line until the next probe answers.
    pub agent_status: &'static str,
}

impl ServiceDisplay {
    pub fn action_label(&self) -> &'static str {
        self.action.label()
    }
}

struct Row {
    state: ServiceState,
    label: &'static str,
    action: ServiceAction,
    enabled: bool,
    marker: Marker,
}

#[rustfmt::skip]
static TABLE: [Row; 9] = [
    Row { state: ServiceState::Running, label: "Running", action: ServiceAction::Stop, enabled: true, marker: Marker::Positive },
    Row { state: ServiceState::Stopped, label: "Stopped", action: ServiceAction::Start, enabled: true, marker: Marker::Critical },
    Row { state: ServiceState::Paused, label: "Paused", action: ServiceAction::Resume, enabled: true, marker: Marker::Attention },
    Row { state: ServiceState::StartPending, label: "Starting...", action: ServiceAction::Start, enabled: true, marker: Marker::Attention },
    Row { state: ServiceState::StopPending, label: "Stopping...", action: ServiceAction::Stop, enabled: true, marker: Marker::Attention },
    Row { state: ServiceState::PausePending, label: "Pausing...", action: ServiceAction::Stop, enabled: false, marker: Marker::Attention },
    Row { state: ServiceState::ContinuePending, label: "Resuming...", action: ServiceAction::Resume, enabled: false, marker: Marker::Attention },
    Row { state: ServiceState::Unknown, label: SERVICE_ERROR, action: ServiceAction::Start, enabled: false, marker: Marker::Critical },
    Row { state: ServiceState::NotInstalled, label: "Service not found", action: ServiceAction::Start, enabled: false, marker: Marker::Critical },
];

/// Presentation of `state`.
pub fn describe(state: ServiceState) -> ServiceDisplay {
    let row = TABLE
        .iter()
        .find(|row| row.state == state)
        .unwrap_or(&TABLE[7]);

    let agent_status = match state {
        ServiceState::Stopped => AGENT_NOT_RUNNING,
        ServiceState::NotInstalled | ServiceState::Unknown => SERVICE_ERROR,
        _ => AGENT_WAITING,
    };

    ServiceDisplay {
        state,
        label: row.label,
        action: row.action,
        action_enabled: row.enabled,
        marker: row.marker,
        agent_status,
    }
}
