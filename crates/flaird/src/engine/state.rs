use std::collections::BTreeMap;

use serde::Serialize;

use super::driver::Driver;
use super::driver::Uom;
use super::message::NodeInfo;

/// Last known value of one driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriverReading {
    pub value: f64,
    pub uom: Uom,
}

/// Engine-side view of a registered node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeState {
    pub address: String,
    pub primary: String,
    pub name: String,
    pub node_def_id: String,
    pub integration: String,
    pub drivers: BTreeMap<Driver, DriverReading>,

    /// Most recent command reported by the node (heartbeat pulses etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
}

impl NodeState {
    pub fn from_info(info: NodeInfo, integration: String) -> Self {
        let drivers = info
            .drivers
            .iter()
            .map(|d| {
                (
                    d.driver,
                    DriverReading {
                        value: d.value,
                        uom: d.uom,
                    },
                )
            })
            .collect();

        Self {
            address: info.address,
            primary: info.primary,
            name: info.name,
            node_def_id: info.node_def_id,
            integration,
            drivers,
            last_command: None,
        }
    }
}

/// Centralized snapshot of everything the engine knows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub nodes: BTreeMap<String, NodeState>,
    pub notices: BTreeMap<String, String>,
}

impl State {
    /// Value of a driver on a node, if both are known.
    pub fn driver(&self, address: &str, driver: Driver) -> Option<f64> {
        self.nodes
            .get(address)
            .and_then(|n| n.drivers.get(&driver))
            .map(|r| r.value)
    }
}
