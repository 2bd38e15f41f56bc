//! Fast and slow poll cadences.
//!
//! Both cadences stand down while discovery runs, so a tick never observes
//! a half-built node tree.

use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::warn;

use super::client::FlairApi;
use super::context::FlairContext;
use super::error::ApiError;
use super::node::CONTROLLER_ADDRESS;
use super::node::FlairNode;
use super::node::NodeKind;
use super::puck;
use super::puck::PuckAttributes;
use super::puck::PuckReading;
use super::resource::Resource;
use super::resource::or_empty;
use super::room::RoomAttributes;
use super::structure::StructureAttributes;
use super::vent;
use super::vent::VentAttributes;
use super::vent::VentReading;
use crate::engine::Driver;
use crate::engine::DriverValue;
use crate::engine::Uom;

pub const HEARTBEAT_ON: &str = "DON";
pub const HEARTBEAT_OFF: &str = "DOF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Discovery was running; nothing was done
    Skipped,

    /// The tick ran; counts cover node refreshes on the fast cadence
    Completed { refreshed: usize, failed: usize },

    /// The slow tick stopped at a fault
    Aborted,
}

/// Runs the two poll cadences and tracks the heartbeat phase
#[derive(Debug, Default)]
pub struct Scheduler {
    heartbeat_on: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulse the controller, alternating DON and DOF
    pub async fn heartbeat(&mut self, ctx: &FlairContext) {
        let command = if self.heartbeat_on {
            HEARTBEAT_OFF
        } else {
            HEARTBEAT_ON
        };
        debug!("[flair] Heartbeat {}", command);
        self.heartbeat_on = !self.heartbeat_on;
        ctx.host
            .report_command(CONTROLLER_ADDRESS, command, Uom::Boolean)
            .await;
    }

    /// Fast cadence: mark the controller as polling, then refresh every
    /// observable node in registration order
    pub async fn short_poll(&mut self, ctx: &FlairContext, discovering: bool) -> TickOutcome {
        if discovering {
            debug!("[flair] Skipping short poll while discovery in progress");
            return TickOutcome::Skipped;
        }

        if let Ok(controller) = ctx.node(CONTROLLER_ADDRESS).await {
            let mut controller = controller.lock().await;
            let running = DriverValue {
                driver: Driver::St,
                value: 1.0,
                uom: Uom::Boolean,
            };
            ctx.host.set_driver(&mut controller, running).await;
        }

        let Some(client) = ctx.client.current().await else {
            debug!("[flair] Not connected yet, nothing to refresh");
            return TickOutcome::Completed {
                refreshed: 0,
                failed: 0,
            };
        };

        let (mut refreshed, mut failed) = (0, 0);
        for node in ctx.nodes().await {
            let mut node = node.lock().await;
            if !node.kind.observable() {
                continue;
            }

            let result = refresh(ctx, client.as_ref(), &mut node).await;
            let address = node.address.clone();
            drop(node);

            match result {
                Ok(rooms) => {
                    refreshed += 1;
                    push_rooms(ctx, rooms).await;
                }
                Err(e) => {
                    failed += 1;
                    warn!("[flair] Failed to refresh {}: {}", address, e);
                }
            }
        }

        TickOutcome::Completed { refreshed, failed }
    }

    /// Slow cadence: heartbeat, then renew the token and re-read the API root
    pub async fn long_poll(&mut self, ctx: &FlairContext, discovering: bool) -> TickOutcome {
        if discovering {
            debug!("[flair] Skipping long poll while discovery in progress");
            return TickOutcome::Skipped;
        }

        self.heartbeat(ctx).await;

        let Some(client) = ctx.client.current().await else {
            debug!("[flair] Not connected yet, no token to renew");
            return TickOutcome::Completed {
                refreshed: 0,
                failed: 0,
            };
        };

        if let Err(e) = renew(client).await {
            error!("[flair] Long poll failed: {}", e);
            return TickOutcome::Aborted;
        }

        TickOutcome::Completed {
            refreshed: 0,
            failed: 0,
        }
    }
}

async fn renew(client: Arc<dyn FlairApi>) -> Result<(), ApiError> {
    client.renew_token().await?;
    client.refresh_root().await
}

/// Refresh one node from the API
///
/// A structure refresh returns its rooms so the caller can update the room
/// nodes once the structure's lock is released.
async fn refresh(
    ctx: &FlairContext,
    client: &dyn FlairApi,
    node: &mut FlairNode,
) -> Result<Vec<Resource>, ApiError> {
    let Some(resource) = node.resource.clone() else {
        return Ok(Vec::new());
    };

    let fresh = client.fetch(&resource).await?;
    node.resource = Some(fresh.clone());

    match node.kind {
        NodeKind::Structure => {
            let drivers = StructureAttributes::from_attributes(&fresh.attributes).drivers();
            ctx.host.set_drivers(node, drivers).await;
            or_empty(client.related(&fresh, "rooms").await)
        }
        NodeKind::Vent => {
            let attrs = VentAttributes::from_attributes(&fresh.attributes);
            let reading = current_reading(client, &fresh)
                .await?
                .map(|r| VentReading::from_attributes(&r.attributes));
            ctx.host
                .set_drivers(node, vent::drivers(&attrs, reading.as_ref()))
                .await;
            Ok(Vec::new())
        }
        NodeKind::Puck => {
            let attrs = PuckAttributes::from_attributes(&fresh.attributes);
            let reading = current_reading(client, &fresh)
                .await?
                .map(|r| PuckReading::from_attributes(&r.attributes));
            ctx.host
                .set_drivers(node, puck::drivers(&attrs, reading.as_ref()))
                .await;
            Ok(Vec::new())
        }
        NodeKind::Controller | NodeKind::Room => Ok(Vec::new()),
    }
}

/// The latest reading of a vent or puck, if the device has reported one
async fn current_reading(
    client: &dyn FlairApi,
    device: &Resource,
) -> Result<Option<Resource>, ApiError> {
    match client.related(device, "current-reading").await {
        Ok(related) => Ok(related.into_one()),
        Err(ApiError::EmptyBody) => {
            debug!("[flair] {} {} has no current reading", device.kind, device.id);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Push freshly fetched room attributes into the matching room nodes
async fn push_rooms(ctx: &FlairContext, rooms: Vec<Resource>) {
    for room in rooms {
        let key = ctx.mapper.derive_key(room.display_name());
        let Ok(node) = ctx.node(&key).await else {
            debug!("[flair] Room '{}' is not registered", room.display_name());
            continue;
        };

        let mut node = node.lock().await;
        if node.kind != NodeKind::Room {
            continue;
        }
        let drivers = RoomAttributes::from_attributes(&room.attributes).drivers();
        node.resource = Some(room);
        ctx.host.set_drivers(&mut node, drivers).await;
    }
}
