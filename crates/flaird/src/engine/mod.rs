pub mod driver;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod engine;
mod integration;
mod message;
pub mod state;

pub use driver::Driver;
pub use driver::DriverSpec;
pub use driver::DriverValue;
pub use driver::Uom;
pub use engine::Engine;
pub use engine::spawn_poll_timers;
pub use integration::FromIntegrationReceiver;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::FromIntegrationMessage;
pub use message::NodeInfo;
pub use message::ToIntegrationMessage;
pub use state::State;
