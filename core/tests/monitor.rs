mod common;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_monitor_core::config::Config;
use agent_monitor_core::display::{AGENT_NOT_RUNNING, AGENT_WAITING};
use agent_monitor_core::error::{InventoryError, ServiceError};
use agent_monitor_core::monitor::Monitor;
use agent_monitor_core::platform::SurfaceUpdate;
use agent_monitor_core::service::{ServiceAction, ServiceQuery, ServiceState};

use common::{MockAgent, Reply};

/// Service manager stand-in; the last state repeats once the script runs out.
#[derive(Clone)]
struct Script(Arc<Mutex<VecDeque<ServiceState>>>);

impl Script {
    fn new(states: &[ServiceState]) -> Self {
        Self(Arc::new(Mutex::new(states.iter().copied().collect())))
    }
}

impl ServiceQuery for Script {
    fn query(&self, name: &str) -> Result<ServiceState, ServiceError> {
        let mut states = self.0.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().copied()
        };
        match state {
            Some(ServiceState::NotInstalled) | None => {
                Err(ServiceError::NotInstalled(name.to_string()))
            }
            Some(state) => Ok(state),
        }
    }
}

fn config(port: u16) -> Config {
    Config {
        port: Some(port),
        ..Config::default()
    }
}

fn drain(rx: &std::sync::mpsc::Receiver<SurfaceUpdate>) -> Vec<SurfaceUpdate> {
    rx.try_iter().collect()
}

#[test]
fn stopped_then_running_paints_once_and_probes() {
    let agent = MockAgent::start();
    agent.reply("/status", Reply::ok(b"status: waiting"));
    let config = config(agent.port());
    let session = common::session();
    let conn = session.connect(&config.host, config.port());
    let (surface, rx) = common::surface();

    use ServiceState::*;
    let mut monitor = Monitor::new(&config, Script::new(&[Stopped, Stopped, Running]), conn, surface);

    // Initial sync paints the stopped state and drops the health flag.
    let first = monitor.reconcile();
    assert!(!first.is_transition());
    let updates = drain(&rx);
    assert!(matches!(&updates[0], SurfaceUpdate::Service(d) if d.state == Stopped));
    assert!(matches!(&updates[1], SurfaceUpdate::AgentStatus { text, .. } if text == AGENT_NOT_RUNNING));
    assert_eq!(updates[2], SurfaceUpdate::Health(false));
    assert!(!monitor.refresh_status());

    // Same state again: nothing.
    assert!(!monitor.reconcile().is_transition());
    assert!(drain(&rx).is_empty());

    let third = monitor.reconcile();
    assert!(third.is_transition());
    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        SurfaceUpdate::Service(display) => {
            assert_eq!(display.state, Running);
            assert!(display.action_enabled);
            assert_eq!(display.action, ServiceAction::Stop);
        }
        other => panic!("expected service display, got {other:?}"),
    }
    assert_eq!(common::next_status(&rx), AGENT_WAITING);
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        SurfaceUpdate::Health(true)
    );

    // Probe issued on entering running.
    assert_eq!(common::next_status(&rx), "waiting");
    assert_eq!(agent.requests(), vec!["/status".to_string()]);

    // Steady running: no repaint, but the slow timer refreshes.
    assert!(common::wait_until(|| monitor.probe_in_flight().is_none()));
    assert!(!monitor.reconcile().is_transition());
    assert!(monitor.refresh_status());
    assert_eq!(common::next_status(&rx), "waiting");
    assert_eq!(agent.request_count(), 2);
}

#[test]
fn inventory_follows_reconciled_state() {
    let agent = MockAgent::start();
    agent.reply("/now", Reply::status(200));
    agent.reply(
        "/status",
        Reply::ok(b"status: OK").delayed(Duration::from_millis(300)),
    );
    let config = config(agent.port());
    let session = common::session();
    let conn = session.connect(&config.host, config.port());
    let (surface, rx) = common::surface();

    use ServiceState::*;
    let mut monitor = Monitor::new(&config, Script::new(&[Stopped, Running]), conn, surface);

    monitor.reconcile();
    assert_eq!(monitor.force_inventory(), Err(InventoryError::NotRunning));
    assert_eq!(agent.request_count(), 0);

    monitor.reconcile();
    assert!(monitor.snapshot().healthy);
    // Runs while the probe triggered above is still outstanding.
    assert!(monitor.probe_in_flight().is_some());
    assert_eq!(monitor.force_inventory(), Ok(()));
    assert!(agent.requests().contains(&"/now".to_string()));

    assert!(drain(&rx).iter().any(|u| *u == SurfaceUpdate::Health(true)));
}

#[test]
fn missing_service_degrades_and_recovers() {
    let session = common::session();
    let config = config(common::closed_port());
    let conn = session.connect(&config.host, config.port());
    let (surface, rx) = common::surface();

    use ServiceState::*;
    let mut monitor = Monitor::new(
        &config,
        Script::new(&[NotInstalled, NotInstalled, Stopped]),
        conn,
        surface,
    );

    monitor.reconcile();
    let updates = drain(&rx);
    assert!(matches!(&updates[0], SurfaceUpdate::Service(d) if d.state == NotInstalled && !d.action_enabled));
    assert_eq!(monitor.force_inventory(), Err(InventoryError::NotRunning));

    monitor.reconcile();
    assert!(drain(&rx).is_empty());

    assert!(monitor.reconcile().is_transition());
    let updates = drain(&rx);
    assert!(matches!(&updates[0], SurfaceUpdate::Service(d) if d.state == Stopped && d.action_enabled));
    // Health was already down.
    assert!(!updates.iter().any(|u| matches!(u, SurfaceUpdate::Health(_))));
}

#[test]
fn late_status_does_not_outlive_a_stop() {
    let agent = MockAgent::start();
    agent.reply(
        "/status",
        Reply::ok(b"status: OK").delayed(Duration::from_millis(300)),
    );
    let config = config(agent.port());
    let session = common::session();
    let conn = session.connect(&config.host, config.port());
    let (surface, rx) = common::surface();

    use ServiceState::*;
    let mut monitor = Monitor::new(&config, Script::new(&[Running, Stopped]), conn, surface);

    monitor.reconcile();
    assert!(monitor.probe_in_flight().is_some());
    monitor.reconcile();

    assert!(common::wait_until(|| monitor.probe_in_flight().is_none()));
    assert_eq!(agent.request_count(), 1);
    let statuses: Vec<String> = rx
        .try_iter()
        .filter_map(|u| match u {
            SurfaceUpdate::AgentStatus { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![AGENT_WAITING.to_string(), AGENT_NOT_RUNNING.to_string()]);
    assert_eq!(monitor.snapshot().state, Stopped);
}
