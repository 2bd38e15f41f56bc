use tracing::warn;

use super::resource::AttributeExt;
use super::resource::Attributes;
use super::units::celsius_to_fahrenheit;
use super::units::flag;
use super::units::round_to;
use crate::engine::Driver;
use crate::engine::DriverSpec;
use crate::engine::DriverValue;
use crate::engine::Uom;

pub const NODE_DEF_ID: &str = "FLAIR_VENT";

pub const DRIVERS: &[DriverSpec] = &[
    DriverSpec::new(Driver::Gv2, Uom::Boolean),
    DriverSpec::new(Driver::Gv1, Uom::Percent),
    DriverSpec::new(Driver::Gv8, Uom::Volt),
    DriverSpec::new(Driver::Gv9, Uom::Kilopascal),
    DriverSpec::new(Driver::Gv10, Uom::Celsius),
    DriverSpec::new(Driver::Gv11, Uom::Fahrenheit),
    DriverSpec::new(Driver::Gv12, Uom::Decibel),
];

pub const PERCENT_OPEN_ATTR: &str = "percent-open";

/// Control and status attributes on the vent resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VentAttributes {
    pub inactive: Option<bool>,
    pub percent_open: Option<f64>,
    pub voltage: Option<f64>,
}

impl VentAttributes {
    pub fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            inactive: attrs.bool_field("inactive"),
            percent_open: attrs.f64_field(PERCENT_OPEN_ATTR),
            voltage: attrs.f64_field("voltage"),
        }
    }

    pub fn percent_open_driver(&self) -> Option<DriverValue> {
        self.percent_open.map(|value| DriverValue {
            driver: Driver::Gv1,
            value,
            uom: Uom::Percent,
        })
    }
}

/// Sensor values from the vent's `current-reading` relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VentReading {
    pub duct_pressure: Option<f64>,
    pub duct_temperature_c: Option<f64>,
    pub system_voltage: Option<f64>,
    pub rssi: Option<f64>,
}

impl VentReading {
    pub fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            duct_pressure: attrs.f64_field("duct-pressure"),
            duct_temperature_c: attrs.f64_field("duct-temperature-c"),
            system_voltage: attrs.f64_field("system-voltage"),
            rssi: attrs.f64_field("rssi"),
        }
    }
}

/// Driver values for a vent and its latest reading
///
/// Duct temperatures fall back to 0. Other missing values are left out so
/// the previous value stays in place.
pub fn drivers(vent: &VentAttributes, reading: Option<&VentReading>) -> Vec<DriverValue> {
    let reading = reading.cloned().unwrap_or_default();
    let mut drivers = vec![DriverValue {
        driver: Driver::Gv2,
        value: flag(vent.inactive == Some(true)),
        uom: Uom::Boolean,
    }];

    match vent.percent_open_driver() {
        Some(d) => drivers.push(d),
        None => warn!("[flair] Vent has no percent-open, GV1 left unchanged"),
    }

    let optional = [
        (Driver::Gv8, reading.system_voltage.or(vent.voltage), Uom::Volt),
        (Driver::Gv9, reading.duct_pressure, Uom::Kilopascal),
        (Driver::Gv12, reading.rssi, Uom::Decibel),
    ];
    for (driver, value, uom) in optional {
        match value {
            Some(value) => drivers.push(DriverValue { driver, value, uom }),
            None => warn!("[flair] Vent reading has no value for {}", driver),
        }
    }

    let (celsius, fahrenheit) = match reading.duct_temperature_c {
        Some(c) => (round_to(c, 2), round_to(celsius_to_fahrenheit(c), 2)),
        None => (0.0, 0.0),
    };
    drivers.push(DriverValue {
        driver: Driver::Gv10,
        value: celsius,
        uom: Uom::Celsius,
    });
    drivers.push(DriverValue {
        driver: Driver::Gv11,
        value: fahrenheit,
        uom: Uom::Fahrenheit,
    });

    drivers
}
