use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::client::Connector;
use super::command;
use super::command::Command;
use super::config::Credentials;
use super::context::FlairContext;
use super::discovery::Discovery;
use super::error::FlairError;
use super::host::Host;
use super::identity::IdentityMapper;
use super::identity::NameHashMapper;
use super::node::FlairNode;
use super::node::NodeKind;
use super::scheduler::Scheduler;
use crate::engine::Driver;
use crate::engine::DriverValue;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;
use crate::engine::Uom;

pub const INTEGRATION_NAME: &str = "flair";

const CONFIG_NOTICE_KEY: &str = "cfg";
const CONFIG_NOTICE: &str =
    "Flair requires you specify both the client_id and client_secret custom parameters";

/// Flair Integration for flaird
///
/// Exposes Flair structures, rooms, vents and pucks as nodes. Discovery
/// runs in the background; poll ticks and commands are handled in the
/// order the engine delivers them.
pub struct FlairIntegration {
    mapper: Arc<dyn IdentityMapper>,
    credentials: Credentials,
    ctx: Option<FlairContext>,
    discovery: Discovery,
    scheduler: Scheduler,
}

impl FlairIntegration {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            discovery: Discovery::new(connector),
            mapper: Arc::new(NameHashMapper),
            credentials: Credentials::default(),
            ctx: None,
            scheduler: Scheduler::new(),
        }
    }

    /// Use a different scheme for node keys
    pub fn with_mapper(mut self, mapper: Arc<dyn IdentityMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    fn context(&self) -> Result<FlairContext, Box<dyn Error + Send>> {
        self.ctx.clone().ok_or_else(|| -> Box<dyn Error + Send> {
            Box::new(std::io::Error::other(
                "Flair integration received a message before setup",
            ))
        })
    }

    /// Register the controller node, not yet polling
    async fn start(&self, ctx: &FlairContext) {
        info!(
            "[flair] Started Flair integration version {}",
            env!("CARGO_PKG_VERSION")
        );
        let mut controller = FlairNode::controller();
        controller.store(DriverValue {
            driver: Driver::St,
            value: 0.0,
            uom: Uom::Boolean,
        });
        ctx.register(controller).await;
    }

    /// Apply custom parameters and, when they are complete, discover
    async fn configure(
        &mut self,
        ctx: &FlairContext,
        params: HashMap<String, String>,
    ) -> Result<(), FlairError> {
        ctx.host.clear_notices().await;
        self.credentials.merge_params(&params);

        if let Err(e) = self.credentials.validate() {
            error!("[flair] {}", e);
            ctx.host.set_notice(CONFIG_NOTICE_KEY, CONFIG_NOTICE).await;
            return Err(e);
        }

        self.scheduler.heartbeat(ctx).await;
        self.discover(ctx);
        Ok(())
    }

    /// Start a discovery pass unless one is already running
    pub fn discover(&mut self, ctx: &FlairContext) -> bool {
        self.discovery.start(ctx.clone(), self.credentials.clone())
    }

    async fn command(
        &mut self,
        ctx: &FlairContext,
        address: &str,
        name: &str,
        value: Option<f64>,
    ) -> Result<(), FlairError> {
        let node = ctx.node(address).await?;
        let mut node = node.lock().await;
        let kind = node.kind;
        let command = Command::parse(kind, name, value)?;
        debug!("[flair] {} received {:?}", address, command);

        match (kind, command) {
            (_, Command::Discover) => {
                drop(node);
                self.discover(ctx);
            }
            (NodeKind::Controller, Command::Query) => {
                drop(node);
                query_all(ctx).await;
            }
            (_, command) => command::apply(ctx, &mut node, command).await?,
        }
        Ok(())
    }

    async fn query(&self, ctx: &FlairContext, address: Option<String>) -> Result<(), FlairError> {
        match address {
            Some(address) => {
                let node = ctx.node(&address).await?;
                let node = node.lock().await;
                ctx.host.report_drivers(&node).await;
            }
            None => query_all(ctx).await,
        }
        Ok(())
    }
}

/// Re-report every node's drivers
async fn query_all(ctx: &FlairContext) {
    for node in ctx.nodes().await {
        let node = node.lock().await;
        ctx.host.report_drivers(&node).await;
    }
}

#[async_trait]
impl Integration for FlairIntegration {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        let host = Host::new(tx, INTEGRATION_NAME);
        self.ctx = Some(FlairContext::new(host, self.mapper.clone()));
        info!("[flair] Integration ready");
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        let ctx = self.context()?;
        match msg {
            ToIntegrationMessage::Start => self.start(&ctx).await,
            ToIntegrationMessage::Config { params } => self
                .configure(&ctx, params)
                .await
                .map_err(FlairError::boxed)?,
            ToIntegrationMessage::ShortPoll => {
                let discovering = self.discovery.is_running();
                let outcome = self.scheduler.short_poll(&ctx, discovering).await;
                debug!("[flair] Short poll: {:?}", outcome);
            }
            ToIntegrationMessage::LongPoll => {
                let discovering = self.discovery.is_running();
                let outcome = self.scheduler.long_poll(&ctx, discovering).await;
                debug!("[flair] Long poll: {:?}", outcome);
            }
            ToIntegrationMessage::Command {
                address,
                command,
                value,
            } => self
                .command(&ctx, &address, &command, value)
                .await
                .map_err(FlairError::boxed)?,
            ToIntegrationMessage::Query { address } => {
                self.query(&ctx, address).await.map_err(FlairError::boxed)?
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("[flair] Shutting down");
        self.discovery.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::FromIntegrationMessage;
    use crate::engine::FromIntegrationReceiver;
    use crate::integrations::flair::testing::MockConnector;
    use crate::integrations::flair::testing::MockFlairApi;
    use crate::integrations::flair::testing::added_nodes;
    use crate::integrations::flair::testing::drain;
    use crate::integrations::flair::testing::driver_updates;
    use crate::integrations::flair::testing::home_fixture;

    const OFFICE: &str = "59535748";
    const HOME: &str = "62944741";
    const VENT_ONE: &str = "595324376919";

    fn params(id: &str, secret: &str) -> HashMap<String, String> {
        HashMap::from([
            ("client_id".to_string(), id.to_string()),
            ("client_secret".to_string(), secret.to_string()),
        ])
    }

    async fn started(
        connector: MockConnector,
    ) -> (FlairIntegration, FromIntegrationReceiver, Arc<MockConnector>) {
        let connector = Arc::new(connector);
        let mut integration = FlairIntegration::new(connector.clone());
        let (tx, rx) = tokio::sync::mpsc::channel(1024);
        integration.setup(tx).await.unwrap();
        integration
            .handle_message(ToIntegrationMessage::Start)
            .await
            .unwrap();
        (integration, rx, connector)
    }

    async fn discovered(
        api: Arc<MockFlairApi>,
    ) -> (FlairIntegration, FromIntegrationReceiver, Arc<MockConnector>) {
        let (mut integration, mut rx, connector) = started(MockConnector::new(api.clone())).await;
        integration
            .handle_message(ToIntegrationMessage::Config {
                params: params("id", "secret"),
            })
            .await
            .unwrap();
        integration.discovery.wait().await;
        drain(&mut rx);
        api.clear_calls();
        (integration, rx, connector)
    }

    fn command(address: &str, command: &str, value: Option<f64>) -> ToIntegrationMessage {
        ToIntegrationMessage::Command {
            address: address.to_string(),
            command: command.to_string(),
            value,
        }
    }

    #[tokio::test]
    async fn test_start_registers_controller() {
        let (_integration, mut rx, _) = started(MockConnector::new(home_fixture())).await;

        let added = added_nodes(&drain(&mut rx));
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].address, "controller");
        assert_eq!(added[0].node_def_id, "controller");
        assert_eq!(added[0].drivers[0].value, 0.0);
    }

    #[tokio::test]
    async fn test_empty_secret_is_a_configuration_error() {
        let (mut integration, mut rx, connector) =
            started(MockConnector::new(home_fixture())).await;
        drain(&mut rx);

        let result = integration
            .handle_message(ToIntegrationMessage::Config {
                params: params("abc", ""),
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FlairError>(),
            Some(FlairError::Configuration { .. })
        ));
        assert!(!integration.discovery.is_running());
        assert_eq!(connector.connects(), 0);
        assert_eq!(
            drain(&mut rx),
            vec![
                FromIntegrationMessage::NoticesCleared,
                FromIntegrationMessage::NoticeSet {
                    key: "cfg".to_string(),
                    message: CONFIG_NOTICE.to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_valid_config_pulses_and_discovers() {
        let (mut integration, mut rx, connector) =
            started(MockConnector::new(home_fixture())).await;
        drain(&mut rx);

        integration
            .handle_message(ToIntegrationMessage::Config {
                params: params("id", "secret"),
            })
            .await
            .unwrap();
        integration.discovery.wait().await;

        let messages = drain(&mut rx);
        assert_eq!(messages[0], FromIntegrationMessage::NoticesCleared);
        assert!(matches!(
            &messages[1],
            FromIntegrationMessage::CommandReported { command, .. } if command == "DON"
        ));
        assert_eq!(added_nodes(&messages).len(), 6);
        assert_eq!(connector.connects(), 1);

        let ctx = integration.ctx.clone().unwrap();
        assert_eq!(ctx.registry.lock().await.len(), 7);
    }

    #[tokio::test]
    async fn test_ticks_wait_for_discovery() {
        let api = home_fixture();
        let (mut integration, mut rx, connector) =
            started(MockConnector::new(api.clone()).gated()).await;

        integration
            .handle_message(ToIntegrationMessage::Config {
                params: params("id", "secret"),
            })
            .await
            .unwrap();
        drain(&mut rx);

        integration
            .handle_message(ToIntegrationMessage::ShortPoll)
            .await
            .unwrap();
        integration
            .handle_message(ToIntegrationMessage::LongPoll)
            .await
            .unwrap();
        assert!(drain(&mut rx).is_empty());
        assert!(api.calls().is_empty());

        connector.gate().notify_one();
        integration.discovery.wait().await;
        drain(&mut rx);
        api.clear_calls();

        integration
            .handle_message(ToIntegrationMessage::ShortPoll)
            .await
            .unwrap();
        let messages = drain(&mut rx);
        assert_eq!(driver_updates(&messages, "controller"), vec![(Driver::St, 1.0)]);
        assert!(api.calls().iter().any(|c| c == "fetch structures/s1"));
    }

    #[tokio::test]
    async fn test_set_open_publishes_response_value() {
        let api = home_fixture();
        let (mut integration, mut rx, _) = discovered(api.clone()).await;

        integration
            .handle_message(command(VENT_ONE, "SET_OPEN", Some(75.0)))
            .await
            .unwrap();

        assert_eq!(
            driver_updates(&drain(&mut rx), VENT_ONE),
            vec![(Driver::Gv1, 75.0)]
        );
        assert_eq!(api.calls(), ["update vents/v1"]);
        assert_eq!(api.resource("vents", "v1").attributes["percent-open"], json!(75));
    }

    #[tokio::test]
    async fn test_stored_value_wins_over_requested() {
        let api = home_fixture();
        let (mut integration, mut rx, _) = discovered(api.clone()).await;
        api.override_update("vents", "v1", json!({"percent-open": 70}));

        integration
            .handle_message(command(VENT_ONE, "SET_OPEN", Some(72.0)))
            .await
            .unwrap();

        assert_eq!(
            driver_updates(&drain(&mut rx), VENT_ONE),
            vec![(Driver::Gv1, 70.0)]
        );
    }

    #[tokio::test]
    async fn test_set_temp_publishes_rounded_set_point() {
        let api = home_fixture();
        let (mut integration, mut rx, _) = discovered(api.clone()).await;

        integration
            .handle_message(command(OFFICE, "SET_TEMP", Some(22.46)))
            .await
            .unwrap();

        assert_eq!(
            driver_updates(&drain(&mut rx), OFFICE),
            vec![(Driver::Clispc, 22.5)]
        );
    }

    #[tokio::test]
    async fn test_set_away_writes_remote_string() {
        let api = home_fixture();
        let (mut integration, mut rx, _) = discovered(api.clone()).await;

        integration
            .handle_message(command(HOME, "SET_AWAY", Some(2.0)))
            .await
            .unwrap();

        assert_eq!(
            api.resource("structures", "s1").attributes["home-away-mode"],
            json!("Flair Autohome Autoaway")
        );
        assert_eq!(
            driver_updates(&drain(&mut rx), HOME),
            vec![(Driver::Gv5, 2.0)]
        );
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_rejected() {
        let api = home_fixture();
        let (mut integration, mut rx, _) = discovered(api.clone()).await;
        let ctx = integration.ctx.clone().unwrap();

        let err = integration
            .command(&ctx, HOME, "SET_MODE", Some(5.0))
            .await
            .unwrap_err();

        assert!(matches!(err, FlairError::InvalidIndex { .. }));
        assert!(api.calls().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_command_routing_errors() {
        let (mut integration, _rx, _) = discovered(home_fixture()).await;
        let ctx = integration.ctx.clone().unwrap();

        let err = integration
            .command(&ctx, "00000000", "QUERY", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FlairError::UnknownNode(_)));

        let err = integration
            .command(&ctx, VENT_ONE, "SET_MODE", Some(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, FlairError::UnknownCommand { .. }));

        let err = integration
            .command(&ctx, VENT_ONE, "SET_OPEN", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FlairError::MissingValue { .. }));
    }

    #[tokio::test]
    async fn test_controller_query_reports_every_node() {
        let (mut integration, mut rx, _) = discovered(home_fixture()).await;

        integration
            .handle_message(command("controller", "QUERY", None))
            .await
            .unwrap();

        let messages = drain(&mut rx);
        for address in ["controller", HOME, OFFICE, VENT_ONE] {
            assert!(!driver_updates(&messages, address).is_empty());
        }
    }

    #[tokio::test]
    async fn test_discovery_command_on_controller() {
        let api = home_fixture();
        let (mut integration, mut rx, connector) = discovered(api).await;

        integration
            .handle_message(command("controller", "DISCOVERY", None))
            .await
            .unwrap();
        integration.discovery.wait().await;

        assert_eq!(connector.connects(), 2);
        assert_eq!(added_nodes(&drain(&mut rx)).len(), 6);
    }
}
