mod client;
mod command;
mod config;
mod context;
mod discovery;
mod error;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod flair;
mod host;
mod identity;
mod node;
mod puck;
mod resource;
mod room;
mod scheduler;
mod structure;
#[cfg(test)]
mod testing;
mod units;
mod vent;

use std::sync::Arc;

use anyhow::Context;
use linkme::distributed_slice;

pub use client::Connector;
pub use client::FlairApi;
pub use client::HttpConnector;
pub use client::HttpFlairClient;
pub use config::Config as FlairConfig;
pub use config::Credentials;
pub use error::ApiError;
pub use error::FlairError;
pub use flair::FlairIntegration;
pub use flair::INTEGRATION_NAME;
pub use identity::IdentityMapper;
pub use identity::NameHashMapper;
pub use resource::Attributes;
pub use resource::Related;
pub use resource::Resource;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_flair(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let flair_config = if let Some(c) = &ctx.config.integrations.flair {
        c
    } else {
        return Ok(None);
    };

    let connector = HttpConnector::new(flair_config.api_root.clone())
        .context("Failed to create Flair HTTP client")?;
    Ok(Some(Box::new(FlairIntegration::new(Arc::new(connector)))))
}
