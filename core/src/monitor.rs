//! Ties the reconciler, the status probe and the inventory trigger to one
//! connection and one presentation surface.
//!
//! Owned by the shell's control thread. Only probe results arrive from
//! elsewhere, and those go straight to the surface.

use std::sync::Arc;

use chrono::Local;
use log::debug;

use crate::config::Config;
use crate::error::InventoryError;
use crate::inventory;
use crate::platform::StatusSurface;
use crate::probe::{ProbeRequest, StatusProbe};
use crate::reconciler::{Reconciler, Reconciliation, ServiceSnapshot};
use crate::service::{ServiceQuery, StartType};
use crate::transport::Connection;

pub struct Monitor<Q> {
    reconciler: Reconciler<Q>,
    probe: StatusProbe,
    connection: Connection,
    inventory_path: String,
    surface: Arc<dyn StatusSurface>,
}

impl<Q: ServiceQuery> Monitor<Q> {
    pub fn new(
        config: &Config,
        query: Q,
        connection: Connection,
        surface: Arc<dyn StatusSurface>,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(query, config.service_name.clone()),
            probe: StatusProbe::new(config.status_path.clone()),
            connection,
            inventory_path: config.inventory_path.clone(),
            surface,
        }
    }

    /// One service poll. Pushes display and health changes to the surface
    /// and probes the agent as soon as the service comes up.
    pub fn reconcile(&mut self) -> Reconciliation {
        let result = self.reconciler.tick();

        if let Some(display) = result.display() {
            if !display.state.is_running() {
                // The agent line now belongs to the placeholder.
                self.probe.invalidate();
            }
            self.surface.set_service_display(display);
            self.surface
                .set_agent_status(display.agent_status, Local::now());
        }
        if let Some(healthy) = result.health {
            self.surface.set_health(healthy);
        }
        if result.entered_running() {
            self.start_probe();
        }
        result
    }

    /// Slow-timer refresh of the agent status line.
    ///
    /// Returns whether a probe was issued.
    pub fn refresh_status(&self) -> bool {
        if !self.reconciler.snapshot().state.is_running() {
            debug!("Service not running; status refresh skipped");
            return false;
        }
        self.start_probe()
    }

    /// Blocking inventory request on behalf of the user.
    pub fn force_inventory(&self) -> Result<(), InventoryError> {
        inventory::force_inventory(
            &self.connection,
            &self.inventory_path,
            self.reconciler.snapshot(),
        )
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        self.reconciler.snapshot()
    }

    pub fn probe_in_flight(&self) -> Option<ProbeRequest> {
        self.probe.in_flight()
    }

    pub fn service_name(&self) -> &str {
        self.reconciler.service_name()
    }

    pub fn start_type(&self) -> StartType {
        self.reconciler.start_type()
    }

    fn start_probe(&self) -> bool {
        self.probe
            .probe(&self.connection, Arc::clone(&self.surface))
    }
}
