use tracing::debug;
use tracing::info;
use tracing::warn;

use super::node::FlairNode;
use crate::engine::DriverValue;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Uom;

/// The integration's side of the host channel
#[derive(Clone)]
pub struct Host {
    tx: FromIntegrationSender,
    integration_name: String,
}

impl Host {
    pub fn new(tx: FromIntegrationSender, integration_name: impl Into<String>) -> Self {
        Self {
            tx,
            integration_name: integration_name.into(),
        }
    }

    async fn send(&self, msg: FromIntegrationMessage) {
        if let Err(e) = self.tx.send(msg).await {
            warn!("[flair] Failed to send message to engine: {}", e);
        }
    }

    /// Register (or re-register) a node with its current drivers
    pub async fn add_node(&self, node: &FlairNode) {
        info!(
            "[flair] Registering {} '{}' ({}) under {}",
            node.kind.node_def_id(),
            node.name,
            node.address,
            node.primary
        );
        self.send(FromIntegrationMessage::NodeAdded {
            integration_name: self.integration_name.clone(),
            node: node.info(),
        })
        .await;
    }

    /// Store a value on the node and publish it
    pub async fn set_driver(&self, node: &mut FlairNode, value: DriverValue) {
        if !node.store(value) {
            warn!(
                "[flair] {} has no driver {}, ignoring",
                node.address, value.driver
            );
            return;
        }
        debug!("[flair] {} {} = {}", node.address, value.driver, value.value);
        self.send(FromIntegrationMessage::DriverChanged {
            address: node.address.clone(),
            driver: value.driver,
            value: value.value,
            uom: value.uom,
        })
        .await;
    }

    pub async fn set_drivers(&self, node: &mut FlairNode, values: Vec<DriverValue>) {
        for value in values {
            self.set_driver(node, value).await;
        }
    }

    /// Re-publish every current driver of the node
    pub async fn report_drivers(&self, node: &FlairNode) {
        for value in &node.drivers {
            self.send(FromIntegrationMessage::DriverChanged {
                address: node.address.clone(),
                driver: value.driver,
                value: value.value,
                uom: value.uom,
            })
            .await;
        }
    }

    pub async fn report_command(&self, address: &str, command: &str, uom: Uom) {
        self.send(FromIntegrationMessage::CommandReported {
            address: address.to_string(),
            command: command.to_string(),
            uom,
        })
        .await;
    }

    pub async fn set_notice(&self, key: &str, message: &str) {
        self.send(FromIntegrationMessage::NoticeSet {
            key: key.to_string(),
            message: message.to_string(),
        })
        .await;
    }

    pub async fn clear_notices(&self) {
        self.send(FromIntegrationMessage::NoticesCleared).await;
    }
}
