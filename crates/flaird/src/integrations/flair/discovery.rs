//! Walks structures, rooms, pucks and vents and registers a node for each.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::client::Connector;
use super::config::Credentials;
use super::context::FlairContext;
use super::error::FlairError;
use super::node::CONTROLLER_ADDRESS;
use super::node::FlairNode;
use super::node::NodeKind;
use super::resource::Resource;
use super::resource::or_empty;

/// Counts from one discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub structures: usize,
    pub rooms: usize,
    pub pucks: usize,
    pub vents: usize,
}

/// One full discovery pass
///
/// Authenticates, swaps the new client into the context, then registers
/// every structure followed by each of its rooms and that room's pucks and
/// vents. Any remote fault aborts the pass; nodes registered before the
/// fault stay registered.
pub async fn discover(
    ctx: &FlairContext,
    connector: &dyn Connector,
    credentials: &Credentials,
) -> Result<DiscoverySummary, FlairError> {
    let client = connector.connect(credentials).await?;
    ctx.client.replace(client.clone()).await;

    let mut summary = DiscoverySummary::default();
    for structure in client.list("structures").await? {
        let structure_name = structure.display_name().to_string();
        let structure_key = ctx.mapper.derive_key(&structure_name);
        ctx.register(FlairNode::new(
            NodeKind::Structure,
            &structure_key,
            CONTROLLER_ADDRESS,
            &structure_name,
            Some(structure.clone()),
        ))
        .await;
        summary.structures += 1;

        let rooms = or_empty(client.related(&structure, "rooms").await)?;
        for (index, room) in rooms.into_iter().enumerate() {
            let room_number = index + 1;
            let room_key = ctx.mapper.derive_key(room.display_name());
            ctx.register(FlairNode::new(
                NodeKind::Room,
                &room_key,
                &structure_key,
                format!("R{}_{}", room_number, room.display_name()),
                Some(room.clone()),
            ))
            .await;
            summary.rooms += 1;

            let pucks = or_empty(client.related(&room, "pucks").await)?;
            summary.pucks +=
                register_children(ctx, NodeKind::Puck, &room_key, room_number, pucks).await;

            let vents = or_empty(client.related(&room, "vents").await)?;
            summary.vents +=
                register_children(ctx, NodeKind::Vent, &room_key, room_number, vents).await;
        }
    }

    Ok(summary)
}

async fn register_children(
    ctx: &FlairContext,
    kind: NodeKind,
    room_key: &str,
    room_number: usize,
    children: Vec<Resource>,
) -> usize {
    let count = children.len();
    for child in children {
        let key = ctx.mapper.scoped_key(room_key, child.display_name());
        let name = format!("R{}_{}", room_number, child.display_name());
        ctx.register(FlairNode::new(kind, key, room_key, name, Some(child)))
            .await;
    }
    count
}

/// Clears the in-flight flag when the discovery task ends, however it ends
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Single-flight runner for background discovery
pub struct Discovery {
    connector: Arc<dyn Connector>,
    in_flight: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Discovery {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            in_flight: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start a pass in the background; returns false if one is running
    pub fn start(&mut self, ctx: FlairContext, credentials: Credentials) -> bool {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            info!("[flair] Discovery is still in progress");
            return false;
        }

        let guard = InFlight(self.in_flight.clone());
        let connector = self.connector.clone();
        self.task = Some(tokio::spawn(async move {
            let _guard = guard;
            info!("[flair] Discovery started");
            match discover(&ctx, connector.as_ref(), &credentials).await {
                Ok(summary) => info!(
                    "[flair] Discovery complete: {} structures, {} rooms, {} pucks, {} vents",
                    summary.structures, summary.rooms, summary.pucks, summary.vents
                ),
                Err(e) => error!("[flair] Discovery failed: {}", e),
            }
        }));
        true
    }

    /// Wait for the current pass, if any, to finish
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("[flair] Discovery task ended abnormally: {}", e);
            }
        }
    }

    /// Abort a running pass
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
