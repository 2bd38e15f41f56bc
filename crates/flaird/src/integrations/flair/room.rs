use super::resource::AttributeExt;
use super::resource::Attributes;
use super::units::celsius_to_fahrenheit;
use super::units::flag;
use super::units::round_to;
use crate::engine::Driver;
use crate::engine::DriverSpec;
use crate::engine::DriverValue;
use crate::engine::Uom;

pub const NODE_DEF_ID: &str = "FLAIR_ROOM";

pub const DRIVERS: &[DriverSpec] = &[
    DriverSpec::new(Driver::Gv2, Uom::Boolean),
    DriverSpec::new(Driver::Clitemp, Uom::Celsius),
    DriverSpec::new(Driver::Clihum, Uom::Percent),
    DriverSpec::new(Driver::Clispc, Uom::Celsius),
    DriverSpec::new(Driver::Gv7, Uom::Fahrenheit),
];

pub const SET_POINT_ATTR: &str = "set-point-c";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomAttributes {
    pub active: Option<bool>,
    pub current_temperature_c: Option<f64>,
    pub current_humidity: Option<f64>,
    pub set_point_c: Option<f64>,
}

impl RoomAttributes {
    pub fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            active: attrs.bool_field("active"),
            current_temperature_c: attrs.f64_field("current-temperature-c"),
            current_humidity: attrs.f64_field("current-humidity"),
            set_point_c: attrs.f64_field(SET_POINT_ATTR),
        }
    }

    /// Driver values; nullable readings fall back to 0
    ///
    /// GV2 reports the room as inactive, so an active room reads 0.
    pub fn drivers(&self) -> Vec<DriverValue> {
        let (celsius, fahrenheit) = match self.current_temperature_c {
            Some(c) => (round_to(c, 1), round_to(celsius_to_fahrenheit(c), 1)),
            None => (0.0, 0.0),
        };

        vec![
            DriverValue {
                driver: Driver::Gv2,
                value: flag(self.active != Some(true)),
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
                value: self.current_humidity.unwrap_or(0.0),
                uom: Uom::Percent,
            },
            self.set_point_driver(),
        ]
    }

    pub fn set_point_driver(&self) -> DriverValue {
        DriverValue {
            driver: Driver::Clispc,
            value: self.set_point_c.map(|c| round_to(c, 1)).unwrap_or(0.0),
            uom: Uom::Celsius,
        }
    }
}
