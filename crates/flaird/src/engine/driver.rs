//! Driver identifiers and units shared between the engine and integrations.
//!
//! A driver is a single typed value a node exposes to the host (temperature,
//! percent open, signal strength, ...). Codes and unit ids are part of the
//! presentation contract and must never be renumbered.

use serde::Serialize;
use strum::AsRefStr;
use strum::Display;

/// Driver code as understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, AsRefStr, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Driver {
    St,
    Gv1,
    Gv2,
    Gv3,
    Gv4,
    Gv5,
    Gv6,
    Gv7,
    Gv8,
    Gv9,
    Gv10,
    Gv11,
    Gv12,
    Clitemp,
    Clihum,
    Clispc,
}

/// Unit of measure attached to a driver value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
#[repr(u8)]
pub enum Uom {
    Boolean = 2,
    Celsius = 4,
    Fahrenheit = 17,
    Index = 25,
    Kilopascal = 31,
    Percent = 51,
    Decibel = 56,
    Volt = 72,
}

impl From<Uom> for u8 {
    fn from(uom: Uom) -> Self {
        uom as u8
    }
}

/// Static description of one driver slot on a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSpec {
    pub driver: Driver,
    pub uom: Uom,
}

impl DriverSpec {
    pub const fn new(driver: Driver, uom: Uom) -> Self {
        Self { driver, uom }
    }
}

/// A driver value as published to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriverValue {
    pub driver: Driver,
    pub value: f64,
    pub uom: Uom,
}

impl DriverValue {
    /// Zero-valued driver for initial registration.
    pub fn initial(spec: &DriverSpec) -> Self {
        Self {
            driver: spec.driver,
            value: 0.0,
            uom: spec.uom,
        }
    }
}
