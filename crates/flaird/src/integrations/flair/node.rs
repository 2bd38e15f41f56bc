use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::puck;
use super::resource::Resource;
use super::room;
use super::structure;
use super::vent;
use crate::engine::Driver;
use crate::engine::DriverSpec;
use crate::engine::DriverValue;
use crate::engine::NodeInfo;
use crate::engine::Uom;

/// Address of the integration's own node
pub const CONTROLLER_ADDRESS: &str = "controller";

pub const CONTROLLER_NODE_DEF_ID: &str = "controller";

const CONTROLLER_DRIVERS: &[DriverSpec] = &[DriverSpec::new(Driver::St, Uom::Boolean)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Controller,
    Structure,
    Room,
    Vent,
    Puck,
}

impl NodeKind {
    pub fn node_def_id(self) -> &'static str {
        match self {
            NodeKind::Controller => CONTROLLER_NODE_DEF_ID,
            NodeKind::Structure => structure::NODE_DEF_ID,
            NodeKind::Room => room::NODE_DEF_ID,
            NodeKind::Vent => vent::NODE_DEF_ID,
            NodeKind::Puck => puck::NODE_DEF_ID,
        }
    }

    pub fn drivers(self) -> &'static [DriverSpec] {
        match self {
            NodeKind::Controller => CONTROLLER_DRIVERS,
            NodeKind::Structure => structure::DRIVERS,
            NodeKind::Room => room::DRIVERS,
            NodeKind::Vent => vent::DRIVERS,
            NodeKind::Puck => puck::DRIVERS,
        }
    }

    /// Whether the fast poll refreshes this node directly
    ///
    /// Rooms are refreshed through their structure.
    pub fn observable(self) -> bool {
        matches!(self, NodeKind::Structure | NodeKind::Vent | NodeKind::Puck)
    }
}

/// Local proxy for one remote entity, or for the integration itself
#[derive(Debug, Clone)]
pub struct FlairNode {
    pub address: String,
    pub primary: String,
    pub name: String,
    pub kind: NodeKind,

    /// Last known copy of the remote resource (none for the controller)
    pub resource: Option<Resource>,

    /// Current driver values, in table order
    pub drivers: Vec<DriverValue>,
}

impl FlairNode {
    pub fn new(
        kind: NodeKind,
        address: impl Into<String>,
        primary: impl Into<String>,
        name: impl Into<String>,
        resource: Option<Resource>,
    ) -> Self {
        Self {
            address: address.into(),
            primary: primary.into(),
            name: name.into(),
            kind,
            resource,
            drivers: kind.drivers().iter().map(DriverValue::initial).collect(),
        }
    }

    pub fn controller() -> Self {
        Self::new(
            NodeKind::Controller,
            CONTROLLER_ADDRESS,
            CONTROLLER_ADDRESS,
            "Flair",
            None,
        )
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            address: self.address.clone(),
            primary: self.primary.clone(),
            name: self.name.clone(),
            node_def_id: self.kind.node_def_id().to_string(),
            drivers: self.drivers.clone(),
        }
    }

    pub fn driver(&self, driver: Driver) -> Option<f64> {
        self.drivers
            .iter()
            .find(|d| d.driver == driver)
            .map(|d| d.value)
    }

    /// Store a driver value; returns whether the node has that driver
    pub fn store(&mut self, value: DriverValue) -> bool {
        match self.drivers.iter_mut().find(|d| d.driver == value.driver) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

pub type NodeRef = Arc<Mutex<FlairNode>>;

/// Type alias for the shared node registry
pub type SharedRegistry = Arc<Mutex<NodeRegistry>>;

/// The integration's nodes by address, in registration order
#[derive(Debug, Default)]
pub struct NodeRegistry {
    order: Vec<String>,
    nodes: HashMap<String, NodeRef>,
}

impl NodeRegistry {
    /// Insert a node, replacing any node already at its address
    ///
    /// A replaced node keeps its original position.
    pub fn upsert(&mut self, node: FlairNode) -> NodeRef {
        let address = node.address.clone();
        let node = Arc::new(Mutex::new(node));
        if self.nodes.insert(address.clone(), node.clone()).is_none() {
            self.order.push(address);
        }
        node
    }

    pub fn get(&self, address: &str) -> Option<NodeRef> {
        self.nodes.get(address).cloned()
    }

    /// All nodes in registration order
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.order
            .iter()
            .filter_map(|address| self.nodes.get(address).cloned())
            .collect()
    }

    pub fn addresses(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
