use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::DriverReading;
use super::state::NodeState;
use super::state::State;
use crate::engine::IntegrationContext;

/// flaird engine
///
/// This structure plays the host role for integrations: it mirrors the nodes
/// and driver values they publish, keeps operator notices, routes commands to
/// the integration owning a node and delivers poll ticks.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of node address -> integration name for routing commands
    node_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (lifecycle hooks, ticks, commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (registrations, driver changes)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

fn lock_err<E: std::fmt::Display>(e: E) -> Box<dyn Error + Send> {
    Box::new(std::io::Error::other(e.to_string()))
}

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            node_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every factory in the integration registry and registers the ones
    /// that are enabled by the config.
    pub fn register_integrations_from_config(&self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        match self.integration_channels.lock() {
            Ok(mut channels) => {
                channels.insert(name.clone(), to_integration_tx);
            }
            Err(e) => {
                error!("Integration '{}' not registered: {}", name, e);
                return;
            }
        }

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process hooks and commands from the engine, strictly in order
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        if let Ok(mut handles) = self.integration_handles.lock() {
            handles.push(handle);
        }
    }

    /// Deliver `Start` to every integration, followed by the custom
    /// parameters each one has in the configuration.
    pub fn start(&self, cfg: &crate::config::Config) -> Result<(), Box<dyn Error + Send>> {
        self.broadcast(ToIntegrationMessage::Start)?;

        let names: Vec<String> = self
            .integration_channels
            .lock()
            .map_err(lock_err)?
            .keys()
            .cloned()
            .collect();

        for name in names {
            if let Some(params) = cfg.integrations.custom_params(&name) {
                self.send_to(&name, ToIntegrationMessage::Config { params })?;
            }
        }
        Ok(())
    }

    /// Send a message to one integration by name
    pub fn send_to(
        &self,
        integration_name: &str,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        let channels = self.integration_channels.lock().map_err(lock_err)?;
        let tx = channels
            .get(integration_name)
            .ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Integration channel not found: {}", integration_name),
                ))
            })?;

        tx.send(msg)
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
    }

    /// Send a message to every registered integration
    pub fn broadcast(&self, msg: ToIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        let channels = self.integration_channels.lock().map_err(lock_err)?;
        for (name, tx) in channels.iter() {
            if tx.send(msg.clone()).is_err() {
                warn!("Integration '{}' is no longer receiving messages", name);
            }
        }
        Ok(())
    }

    /// Send a command to the integration owning `address`
    pub fn send_command(
        &self,
        address: String,
        command: String,
        value: Option<f64>,
    ) -> Result<(), Box<dyn Error + Send>> {
        let integration_name = self.owner_of(&address)?;
        self.send_to(
            &integration_name,
            ToIntegrationMessage::Command {
                address,
                command,
                value,
            },
        )
    }

    /// Ask integrations to re-report drivers, for one node or for all of them
    pub fn query(&self, address: Option<String>) -> Result<(), Box<dyn Error + Send>> {
        match address {
            Some(address) => {
                let integration_name = self.owner_of(&address)?;
                self.send_to(
                    &integration_name,
                    ToIntegrationMessage::Query {
                        address: Some(address),
                    },
                )
            }
            None => self.broadcast(ToIntegrationMessage::Query { address: None }),
        }
    }

    fn owner_of(&self, address: &str) -> Result<String, Box<dyn Error + Send>> {
        let map = self.node_integration_map.lock().map_err(lock_err)?;
        map.get(address)
            .cloned()
            .ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("No integration found for node: {}", address),
                ))
            })
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Stop delivering messages and wait for every integration to shut down
    pub async fn shutdown(&self) {
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }

        let handles: Vec<JoinHandle<()>> = match self.integration_handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(_) => Vec::new(),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    fn update_state(&self, f: impl FnOnce(&mut State)) {
        let mut state = State::clone(&self.state.load());
        f(&mut state);
        self.state.store(Arc::new(state));
    }

    /// Handle an event from an integration
    pub(crate) fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::NodeAdded {
                integration_name,
                node,
            } => {
                info!(
                    "Node added: {} '{}' ({}) from {}",
                    node.address, node.name, node.node_def_id, integration_name
                );

                if let Ok(mut map) = self.node_integration_map.lock() {
                    map.insert(node.address.clone(), integration_name.clone());
                }

                let node = NodeState::from_info(node, integration_name);
                self.update_state(|state| {
                    state.nodes.insert(node.address.clone(), node);
                });
            }
            FromIntegrationMessage::DriverChanged {
                address,
                driver,
                value,
                uom,
            } => {
                debug!("Driver changed: {} {} = {}", address, driver, value);
                self.update_state(|state| match state.nodes.get_mut(&address) {
                    Some(node) => {
                        node.drivers.insert(driver, DriverReading { value, uom });
                    }
                    None => warn!("Driver update for unknown node: {}", address),
                });
            }
            FromIntegrationMessage::CommandReported {
                address, command, ..
            } => {
                debug!("Command reported: {} {}", address, command);
                self.update_state(|state| {
                    if let Some(node) = state.nodes.get_mut(&address) {
                        node.last_command = Some(command);
                    }
                });
            }
            FromIntegrationMessage::NoticeSet { key, message } => {
                warn!("Notice [{}]: {}", key, message);
                self.update_state(|state| {
                    state.notices.insert(key, message);
                });
            }
            FromIntegrationMessage::NoticesCleared => {
                self.update_state(|state| state.notices.clear());
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver `ShortPoll` and `LongPoll` ticks to every integration.
///
/// The first tick of each cadence fires one full period after start.
pub fn spawn_poll_timers(engine: Arc<Engine>, short: Duration, long: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut short_ticker = tokio::time::interval_at(Instant::now() + short, short);
        let mut long_ticker = tokio::time::interval_at(Instant::now() + long, long);
        short_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        long_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let msg = tokio::select! {
                _ = short_ticker.tick() => ToIntegrationMessage::ShortPoll,
                _ = long_ticker.tick() => ToIntegrationMessage::LongPoll,
            };
            if let Err(e) = engine.broadcast(msg) {
                warn!("Failed to deliver poll tick: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::engine::driver::Driver;
    use crate::engine::driver::DriverValue;
    use crate::engine::driver::Uom;
    use crate::engine::message::NodeInfo;

    /// Integration that records every message it receives.
    struct Recorder {
        seen: Arc<std::sync::Mutex<Vec<ToIntegrationMessage>>>,
    }

    #[async_trait]
    impl Integration for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn setup(&mut self, _tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            self.seen.lock().unwrap().push(msg);
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }
    }

    fn node(address: &str) -> NodeInfo {
        NodeInfo {
            address: address.to_string(),
            primary: "controller".to_string(),
            name: "Home".to_string(),
            node_def_id: "FLAIR_STRUCT".to_string(),
            drivers: vec![DriverValue {
                driver: Driver::Gv2,
                value: 0.0,
                uom: Uom::Boolean,
            }],
        }
    }

    #[test]
    fn test_node_and_driver_events_update_state() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::NodeAdded {
            integration_name: "flair".to_string(),
            node: node("12345678"),
        });
        engine.handle_event(FromIntegrationMessage::DriverChanged {
            address: "12345678".to_string(),
            driver: Driver::Gv2,
            value: 1.0,
            uom: Uom::Boolean,
        });

        let state = engine.state_snapshot();
        assert_eq!(state.driver("12345678", Driver::Gv2), Some(1.0));
        assert_eq!(state.nodes["12345678"].integration, "flair");
    }

    #[test]
    fn test_notices_set_and_cleared() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::NoticeSet {
            key: "cfg".to_string(),
            message: "missing credentials".to_string(),
        });
        assert_eq!(engine.state_snapshot().notices.len(), 1);

        engine.handle_event(FromIntegrationMessage::NoticesCleared);
        assert!(engine.state_snapshot().notices.is_empty());
    }

    #[test]
    fn test_command_for_unknown_node_fails() {
        let engine = Engine::new();
        let result = engine.send_command("nope".to_string(), "QUERY".to_string(), None);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_commands_routed_to_owning_integration() {
        let engine = Engine::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        engine.register_integration(
            "recorder".to_string(),
            Box::new(Recorder { seen: seen.clone() }),
        );
        engine.handle_event(FromIntegrationMessage::NodeAdded {
            integration_name: "recorder".to_string(),
            node: node("12345678"),
        });

        engine
            .send_command("12345678".to_string(), "SET_MODE".to_string(), Some(1.0))
            .unwrap();
        engine.query(None).unwrap();
        engine.shutdown().await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ToIntegrationMessage::Command {
                    address: "12345678".to_string(),
                    command: "SET_MODE".to_string(),
                    value: Some(1.0),
                },
                ToIntegrationMessage::Query { address: None },
            ]
        );
    }
}
