use serde_json::Value;
use serde_json::json;
use tracing::info;
use tracing::warn;

use super::context::FlairContext;
use super::error::FlairError;
use super::node::FlairNode;
use super::node::NodeKind;
use super::resource::Attributes;
use super::room;
use super::room::RoomAttributes;
use super::structure;
use super::structure::HomeAwayMode;
use super::structure::IndexedEnum;
use super::structure::Mode;
use super::structure::SetPointMode;
use super::vent;
use super::vent::VentAttributes;
use crate::engine::Driver;
use crate::engine::DriverValue;
use crate::engine::Uom;

pub const QUERY: &str = "QUERY";
pub const DISCOVERY: &str = "DISCOVERY";
pub const SET_OPEN: &str = "SET_OPEN";
pub const SET_TEMP: &str = "SET_TEMP";
pub const SET_MODE: &str = "SET_MODE";
pub const SET_AWAY: &str = "SET_AWAY";
pub const SET_EVENESS: &str = "SET_EVENESS";

/// A host command, validated against the node it targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Query,
    Discover,
    SetOpen(i64),
    SetTemp(f64),
    SetMode(Mode),
    SetAway(HomeAwayMode),
    SetEvenness(SetPointMode),
}

impl Command {
    pub fn parse(kind: NodeKind, name: &str, value: Option<f64>) -> Result<Self, FlairError> {
        let unknown = || FlairError::UnknownCommand {
            node_def_id: kind.node_def_id(),
            command: name.to_string(),
        };

        match (kind, name) {
            (_, QUERY) => Ok(Command::Query),
            (NodeKind::Controller, DISCOVERY) => Ok(Command::Discover),
            // Out-of-range positions are left for the API to reject
            (NodeKind::Vent, SET_OPEN) => Ok(Command::SetOpen(required(SET_OPEN, value)? as i64)),
            (NodeKind::Room, SET_TEMP) => Ok(Command::SetTemp(required(SET_TEMP, value)?)),
            (NodeKind::Structure, SET_MODE) => indexed(SET_MODE, value).map(Command::SetMode),
            (NodeKind::Structure, SET_AWAY) => indexed(SET_AWAY, value).map(Command::SetAway),
            (NodeKind::Structure, SET_EVENESS) => {
                indexed(SET_EVENESS, value).map(Command::SetEvenness)
            }
            _ => Err(unknown()),
        }
    }
}

fn required(command: &'static str, value: Option<f64>) -> Result<f64, FlairError> {
    value.ok_or(FlairError::MissingValue { command })
}

fn indexed<E: IndexedEnum>(command: &'static str, value: Option<f64>) -> Result<E, FlairError> {
    let value = required(command, value)?;
    let invalid = || FlairError::InvalidIndex { command, value };
    if value < 0.0 || value.fract() != 0.0 {
        return Err(invalid());
    }
    E::from_index(value as usize).ok_or_else(invalid)
}

/// Apply a node-level command
///
/// `Discover` is handled by the integration; everything else ends here.
/// Writes publish the value the API stored, not the value sent.
pub async fn apply(
    ctx: &FlairContext,
    node: &mut FlairNode,
    command: Command,
) -> Result<(), FlairError> {
    match command {
        Command::Query | Command::Discover => {
            ctx.host.report_drivers(node).await;
        }
        Command::SetOpen(percent) => {
            let stored = write(ctx, node, vent::PERCENT_OPEN_ATTR, json!(percent)).await?;
            match VentAttributes::from_attributes(&stored).percent_open_driver() {
                Some(value) => ctx.host.set_driver(node, value).await,
                None => warn!("[flair] {} update response has no percent-open", node.address),
            }
        }
        Command::SetTemp(celsius) => {
            let stored = write(ctx, node, room::SET_POINT_ATTR, json!(celsius)).await?;
            let value = RoomAttributes::from_attributes(&stored).set_point_driver();
            ctx.host.set_driver(node, value).await;
        }
        Command::SetMode(mode) => {
            set_indexed(ctx, node, structure::MODE_ATTR, mode, Driver::Gv4).await?;
        }
        Command::SetAway(mode) => {
            set_indexed(ctx, node, structure::HOME_AWAY_ATTR, mode, Driver::Gv5).await?;
        }
        Command::SetEvenness(mode) => {
            set_indexed(ctx, node, structure::SET_POINT_MODE_ATTR, mode, Driver::Gv6).await?;
        }
    }
    Ok(())
}

async fn set_indexed<E: IndexedEnum>(
    ctx: &FlairContext,
    node: &mut FlairNode,
    attr: &str,
    mode: E,
    driver: Driver,
) -> Result<(), FlairError> {
    let stored = write(ctx, node, attr, json!(mode.as_ref())).await?;
    let raw = stored.get(attr).and_then(Value::as_str).unwrap_or_default();
    match structure::index_of::<E>(raw) {
        Some(index) => {
            let value = DriverValue {
                driver,
                value: index as f64,
                uom: Uom::Index,
            };
            ctx.host.set_driver(node, value).await;
        }
        None => warn!(
            "[flair] {} stored unknown {} '{}', {} left unchanged",
            node.address, attr, raw, driver
        ),
    }
    Ok(())
}

/// Write one attribute and return the stored attributes
async fn write(
    ctx: &FlairContext,
    node: &mut FlairNode,
    attr: &str,
    value: Value,
) -> Result<Attributes, FlairError> {
    let resource = node
        .resource
        .as_ref()
        .ok_or_else(|| FlairError::UnknownNode(node.address.clone()))?;
    let client = ctx.client.require().await?;

    info!("[flair] {} set {} = {}", node.address, attr, value);
    let mut attributes = Attributes::new();
    attributes.insert(attr.to_string(), value);

    let updated = client.update(resource, attributes).await?;
    let stored = updated.attributes.clone();
    node.resource = Some(updated);
    Ok(stored)
}
