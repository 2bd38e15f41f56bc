use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::RwLock;

use super::client::FlairApi;
use super::error::FlairError;
use super::host::Host;
use super::identity::IdentityMapper;
use super::node::FlairNode;
use super::node::NodeRef;
use super::node::SharedRegistry;

/// The current API client handle
///
/// Discovery swaps in a freshly authenticated client; everyone else clones
/// the `Arc` out and works with whatever handle was current at the time.
#[derive(Clone, Default)]
pub struct ClientSlot(Arc<RwLock<Option<Arc<dyn FlairApi>>>>);

impl ClientSlot {
    pub async fn current(&self) -> Option<Arc<dyn FlairApi>> {
        self.0.read().await.clone()
    }

    pub async fn require(&self) -> Result<Arc<dyn FlairApi>, FlairError> {
        self.current().await.ok_or(FlairError::NotConnected)
    }

    pub async fn replace(&self, client: Arc<dyn FlairApi>) {
        *self.0.write().await = Some(client);
    }
}

/// State shared by the integration, its discovery task and its poll handlers
#[derive(Clone)]
pub struct FlairContext {
    pub client: ClientSlot,
    pub registry: SharedRegistry,
    pub host: Host,
    pub mapper: Arc<dyn IdentityMapper>,
}

impl FlairContext {
    pub fn new(host: Host, mapper: Arc<dyn IdentityMapper>) -> Self {
        Self {
            client: ClientSlot::default(),
            registry: Arc::new(Mutex::new(Default::default())),
            host,
            mapper,
        }
    }

    /// Upsert the node locally, then announce it to the host
    pub async fn register(&self, node: FlairNode) -> NodeRef {
        self.host.add_node(&node).await;
        self.registry.lock().await.upsert(node)
    }

    pub async fn node(&self, address: &str) -> Result<NodeRef, FlairError> {
        self.registry
            .lock()
            .await
            .get(address)
            .ok_or_else(|| FlairError::UnknownNode(address.to_string()))
    }

    pub async fn nodes(&self) -> Vec<NodeRef> {
        self.registry.lock().await.nodes()
    }
}
