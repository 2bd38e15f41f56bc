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

pub const NODE_DEF_ID: &str = "FLAIR_PUCK";

pub const DRIVERS: &[DriverSpec] = &[
    DriverSpec::new(Driver::Gv2, Uom::Boolean),
    DriverSpec::new(Driver::Clitemp, Uom::Celsius),
    DriverSpec::new(Driver::Clihum, Uom::Percent),
    DriverSpec::new(Driver::Gv7, Uom::Fahrenheit),
    DriverSpec::new(Driver::Gv8, Uom::Volt),
    DriverSpec::new(Driver::Gv12, Uom::Decibel),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PuckAttributes {
    pub inactive: Option<bool>,
    pub current_temperature_c: Option<f64>,
    pub current_humidity: Option<f64>,
}

impl PuckAttributes {
    pub fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            inactive: attrs.bool_field("inactive"),
            current_temperature_c: attrs.f64_field("current-temperature-c"),
            current_humidity: attrs.f64_field("current-humidity"),
        }
    }
}

/// Sensor values from the puck's `current-reading` relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PuckReading {
    pub room_temperature_c: Option<f64>,
    pub humidity: Option<f64>,
    pub system_voltage: Option<f64>,
    pub rssi: Option<f64>,
}

impl PuckReading {
    pub fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            room_temperature_c: attrs.f64_field("room-temperature-c"),
            humidity: attrs.f64_field("humidity"),
            system_voltage: attrs.f64_field("system-voltage"),
            rssi: attrs.f64_field("rssi"),
        }
    }
}

/// Driver values for a puck and its latest reading
///
/// Temperature and humidity prefer the reading, then the puck's own
/// attributes, then 0.
pub fn drivers(puck: &PuckAttributes, reading: Option<&PuckReading>) -> Vec<DriverValue> {
    let reading = reading.cloned().unwrap_or_default();
    let temperature = reading.room_temperature_c.or(puck.current_temperature_c);
    let (celsius, fahrenheit) = match temperature {
        Some(c) => (round_to(c, 1), round_to(celsius_to_fahrenheit(c), 1)),
        None => (0.0, 0.0),
    };

    let mut drivers = vec![
        DriverValue {
            driver: Driver::Gv2,
            value: flag(puck.inactive == Some(true)),
            uom: Uom::Boolean,
        },
        DriverValue {
            driver: Driver::Clitemp,
            value: celsius,
            uom: Uom::Celsius,
        },
        DriverValue {
            driver: Driver::Gv7,
            value: fahrenheit,
            uom: Uom::Fahrenheit,
        },
        DriverValue {
            driver: Driver::Clihum,
            value: reading.humidity.or(puck.current_humidity).unwrap_or(0.0),
            uom: Uom::Percent,
        },
    ];

    for (driver, value, uom) in [
        (Driver::Gv8, reading.system_voltage, Uom::Volt),
        (Driver::Gv12, reading.rssi, Uom::Decibel),
    ] {
        match value {
            Some(value) => drivers.push(DriverValue { driver, value, uom }),
            None => warn!("[flair] Puck reading has no value for {}", driver),
        }
    }

    drivers
}
