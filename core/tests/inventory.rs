mod common;

use agent_monitor_core::error::InventoryError;
use agent_monitor_core::inventory::force_inventory;
use agent_monitor_core::reconciler::ServiceSnapshot;
use agent_monitor_core::service::ServiceState;

use common::{MockAgent, Reply};

fn running(healthy: bool) -> ServiceSnapshot {
    ServiceSnapshot {
        state: ServiceState::Running,
        healthy,
    }
}

#[test]
fn stopped_service_is_refused_without_network() {
    let agent = MockAgent::start();
    agent.reply("/now", Reply::status(200));
    let session = common::session();
    let conn = session.connect("127.0.0.1", agent.port());

    for state in [ServiceState::Stopped, ServiceState::Paused, ServiceState::NotInstalled] {
        let snapshot = ServiceSnapshot {
            state,
            healthy: true,
        };
        assert_eq!(
            force_inventory(&conn, "/now", snapshot),
            Err(InventoryError::NotRunning)
        );
    }
    assert_eq!(agent.request_count(), 0);
}

#[test]
fn unhealthy_agent_is_refused_without_network() {
    let agent = MockAgent::start();
    agent.reply("/now", Reply::status(200));
    let session = common::session();
    let conn = session.connect("127.0.0.1", agent.port());

    assert_eq!(
        force_inventory(&conn, "/now", running(false)),
        Err(InventoryError::AgentUnhealthy)
    );
    assert_eq!(agent.request_count(), 0);
}

#[test]
fn http_200_is_success() {
    let agent = MockAgent::start();
    agent.reply("/now", Reply::ok(b"status: ok"));
    let session = common::session();
    let conn = session.connect("127.0.0.1", agent.port());

    assert_eq!(force_inventory(&conn, "/now", running(true)), Ok(()));
    assert_eq!(agent.requests(), vec!["/now".to_string()]);
}

#[test]
fn other_codes_are_not_authorized() {
    let agent = MockAgent::start();
    agent.reply("/now", Reply::status(403));
    let session = common::session();
    let conn = session.connect("127.0.0.1", agent.port());

    assert_eq!(
        force_inventory(&conn, "/now", running(true)),
        Err(InventoryError::NotAuthorized(403))
    );
}

#[test]
fn unreachable_agent_is_no_response() {
    let session = common::session();
    let conn = session.connect("127.0.0.1", common::closed_port());

    assert_eq!(
        force_inventory(&conn, "/now", running(true)),
        Err(InventoryError::NoResponse)
    );
}

#[test]
fn closed_session_is_no_response() {
    let agent = MockAgent::start();
    agent.reply("/now", Reply::status(200));
    let session = common::session();
    let conn = session.connect("127.0.0.1", agent.port());
    session.close();

    assert_eq!(
        force_inventory(&conn, "/now", running(true)),
        Err(InventoryError::NoResponse)
    );
    assert_eq!(agent.request_count(), 0);
}
