//! User-initiated inventory request.
//!
//! Runs synchronously: the caller blocks until the agent answers or the
//! transport gives up. It uses its own request, independent of any status
//! probe in flight on the same connection.

use log::{info, warn};

use crate::error::InventoryError;
use crate::reconciler::ServiceSnapshot;
use crate::service::ServiceState;
use crate::transport::{Connection, timed};

/// Ask the agent to run an inventory now.
///
/// Preconditions are checked before any network traffic: the service must be
/// running and the agent healthy.
pub fn force_inventory(
    conn: &Connection,
    path: &str,
    snapshot: ServiceSnapshot,
) -> Result<(), InventoryError> {
    if snapshot.state != ServiceState::Running {
        info!("Inventory refused: service is {}", snapshot.state);
        return Err(InventoryError::NotRunning);
    }
    if !snapshot.healthy {
        info!("Inventory refused: agent unhealthy");
        return Err(InventoryError::AgentUnhealthy);
    }

    let client = conn.client().clone();
    let limit = conn.timeouts().request();
    let url = conn.url(path);
    info!("Requesting inventory: GET {url}");

    let result = conn.block_on(async move {
        timed(limit, client.get(&url).send())
            .await
            .map(|response| response.status().as_u16())
    });

    match result {
        Ok(Ok(200)) => {
            info!("Inventory request accepted");
            Ok(())
        }
        Ok(Ok(code)) => {
            warn!("Inventory request rejected with HTTP {code}");
            Err(InventoryError::NotAuthorized(code))
        }
        Ok(Err(reason)) => {
            warn!("Inventory request failed: {reason}");
            Err(InventoryError::NoResponse)
        }
        Err(e) => {
            warn!("Inventory request not sent: {e}");
            Err(InventoryError::NoResponse)
        }
    }
}
