//! Service reconciliation: poll the service manager, detect transitions,
//! and derive the agent health flag.
//!
//! Side effects are only produced on transition boundaries. Repeating an
//! observation, including a repeated query failure, yields
//! [`Change::Unchanged`].

use log::{debug, info, warn};

use crate::display::{ServiceDisplay, describe};
use crate::error::ServiceError;
use crate::service::{ServiceQuery, ServiceState, StartType};

/// What one poll saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The manager could not be opened, the service is missing, or the
    /// answer carried no usable status.
    Unqueryable,
    State(ServiceState),
}

impl Observation {
    pub fn state(self) -> ServiceState {
        match self {
            Observation::Unqueryable => ServiceState::NotInstalled,
            Observation::State(state) => state,
        }
    }

    /// Healthy only when the service answered and is running.
    pub fn is_healthy(self) -> bool {
        self == Observation::State(ServiceState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    /// First observation after startup; paints the UI.
    Initial(ServiceDisplay),
    Transition {
        from: ServiceState,
        to: ServiceState,
        display: ServiceDisplay,
    },
}

/// Result of one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub observation: Observation,
    pub change: Change,
    /// New health value, present only when the flag flipped this tick.
    pub health: Option<bool>,
}

impl Reconciliation {
    pub fn state(&self) -> ServiceState {
        self.observation.state()
    }

    pub fn display(&self) -> Option<&ServiceDisplay> {
        match &self.change {
            Change::Unchanged => None,
            Change::Initial(display) | Change::Transition { display, .. } => Some(display),
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self.change, Change::Transition { .. })
    }

    /// True when this tick moved the service into `Running`.
    pub fn entered_running(&self) -> bool {
        self.display().is_some() && self.state().is_running()
    }
}

/// State and health as of the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub state: ServiceState,
    pub healthy: bool,
}

pub struct Reconciler<Q> {
    query: Q,
    service_name: String,
    last: Option<Observation>,
    healthy: bool,
}

impl<Q: ServiceQuery> Reconciler<Q> {
    /// The health flag starts raised, matching the tray's initial OK icon.
    pub fn new(query: Q, service_name: impl Into<String>) -> Self {
        Self {
            query,
            service_name: service_name.into(),
            last: None,
            healthy: true,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            state: self.last.map_or(ServiceState::Unknown, Observation::state),
            healthy: self.healthy,
        }
    }

    /// Configured start type, or [`StartType::Unknown`] when it cannot be read.
    pub fn start_type(&self) -> StartType {
        self.query
            .start_type(&self.service_name)
            .unwrap_or_else(|e| {
                debug!("No start type for '{}': {e}", self.service_name);
                StartType::Unknown
            })
    }

    /// Run one poll.
    pub fn tick(&mut self) -> Reconciliation {
        let observation = self.observe();

        let change = match self.last {
            Some(previous) if previous == observation => Change::Unchanged,
            Some(previous) => {
                info!(
                    "Service '{}' changed: {} -> {}",
                    self.service_name,
                    previous.state(),
                    observation.state()
                );
                Change::Transition {
                    from: previous.state(),
                    to: observation.state(),
                    display: describe(observation.state()),
                }
            }
            None => {
                info!(
                    "Service '{}' is {}",
                    self.service_name,
                    observation.state()
                );
                Change::Initial(describe(observation.state()))
            }
        };
        self.last = Some(observation);

        let healthy = observation.is_healthy();
        let health = (healthy != self.healthy).then(|| {
            info!("Agent health flag: {} -> {}", self.healthy, healthy);
            self.healthy = healthy;
            healthy
        });

        Reconciliation {
            observation,
            change,
            health,
        }
    }

    fn observe(&self) -> Observation {
        match self.query.query(&self.service_name) {
            Ok(ServiceState::NotInstalled) => Observation::Unqueryable,
            Ok(state) => Observation::State(state),
            Err(e) => {
                // Logged once per outage; the next poll retries.
                if self.last != Some(Observation::Unqueryable) {
                    match &e {
                        ServiceError::NotInstalled(_) => warn!("{e}"),
                        _ => warn!("Cannot query service '{}': {e}", self.service_name),
                    }
                } else {
                    debug!("Service '{}' still unqueryable: {e}", self.service_name);
                }
                Observation::Unqueryable
            }
        }
    }
}
