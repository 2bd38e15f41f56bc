//! Type-safe message system for flaird
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Registrations and driver updates from integrations to the engine
//! - `ToIntegrationMessage`: Lifecycle hooks, poll ticks and commands from the engine to integrations

use std::collections::HashMap;

use serde::Serialize;

use super::driver::Driver;
use super::driver::DriverValue;
use super::driver::Uom;

/// A node as registered with the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    /// Local address (stable key derived by the integration)
    pub address: String,

    /// Address of the parent node
    pub primary: String,

    /// Human-readable name
    pub name: String,

    /// Node definition id (selects the presentation profile)
    pub node_def_id: String,

    /// Initial driver values
    pub drivers: Vec<DriverValue>,
}

/// Messages FROM integrations TO the engine (registrations/state updates)
#[derive(Debug, Clone, PartialEq)]
pub enum FromIntegrationMessage {
    /// A node was discovered and registered (upsert by address)
    NodeAdded {
        integration_name: String,
        node: NodeInfo,
    },

    /// A driver value changed (or was re-reported)
    DriverChanged {
        address: String,
        driver: Driver,
        value: f64,
        uom: Uom,
    },

    /// A node reported a command, e.g. a heartbeat pulse
    CommandReported {
        address: String,
        command: String,
        uom: Uom,
    },

    /// A persistent operator-visible notice
    NoticeSet { key: String, message: String },

    /// Remove all operator notices
    NoticesCleared,
}

/// Messages FROM the engine TO integrations
#[derive(Debug, Clone, PartialEq)]
pub enum ToIntegrationMessage {
    /// The host has started the integration
    Start,

    /// Custom parameters were set or changed
    Config { params: HashMap<String, String> },

    /// Fast poll tick
    ShortPoll,

    /// Slow poll tick
    LongPoll,

    /// Command addressed to a node owned by the integration
    Command {
        address: String,
        command: String,
        value: Option<f64>,
    },

    /// Re-report drivers for one node, or for all nodes when `address` is `None`
    Query { address: Option<String> },
}
