use std::str::FromStr;

use strum::AsRefStr;
use strum::EnumString;
use strum::FromRepr;
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

pub const NODE_DEF_ID: &str = "FLAIR_STRUCT";

pub const DRIVERS: &[DriverSpec] = &[
    DriverSpec::new(Driver::Gv2, Uom::Boolean),
    DriverSpec::new(Driver::Clitemp, Uom::Celsius),
    DriverSpec::new(Driver::Gv3, Uom::Boolean),
    DriverSpec::new(Driver::Gv4, Uom::Index),
    DriverSpec::new(Driver::Gv5, Uom::Index),
    DriverSpec::new(Driver::Gv6, Uom::Index),
    DriverSpec::new(Driver::Gv7, Uom::Fahrenheit),
];

pub const MODE_ATTR: &str = "mode";
pub const HOME_AWAY_ATTR: &str = "home-away-mode";
pub const SET_POINT_MODE_ATTR: &str = "set-point-mode";

/// Structure operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, FromRepr)]
#[repr(usize)]
pub enum Mode {
    #[strum(serialize = "manual")]
    Manual = 0,
    #[strum(serialize = "auto")]
    Auto = 1,
}

/// Who decides whether the home is occupied
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, FromRepr)]
#[repr(usize)]
pub enum HomeAwayMode {
    #[strum(serialize = "Manual")]
    Manual = 0,
    #[strum(serialize = "Third Party Home Away")]
    ThirdParty = 1,
    #[strum(serialize = "Flair Autohome Autoaway")]
    FlairAuto = 2,
}

/// Which set-point active rooms are evened out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, FromRepr)]
#[repr(usize)]
pub enum SetPointMode {
    #[strum(serialize = "Home Evenness For Active Rooms Flair Setpoint")]
    FlairSetpoint = 0,
    #[strum(serialize = "Home Evenness For Active Rooms Follow Third Party")]
    FollowThirdParty = 1,
}

/// Structure attributes the integration reports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureAttributes {
    pub is_active: Option<bool>,
    pub home: Option<bool>,
    pub set_point_temperature_c: Option<f64>,
    pub mode: Option<String>,
    pub home_away_mode: Option<String>,
    pub set_point_mode: Option<String>,
}

impl StructureAttributes {
    pub fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            is_active: attrs.bool_field("is-active"),
            home: attrs.bool_field("home"),
            set_point_temperature_c: attrs.f64_field("set-point-temperature-c"),
            mode: attrs.str_field(MODE_ATTR),
            home_away_mode: attrs.str_field(HOME_AWAY_ATTR),
            set_point_mode: attrs.str_field(SET_POINT_MODE_ATTR),
        }
    }

    /// Driver values for these attributes
    ///
    /// Enumerations the table doesn't know are skipped so the previous
    /// value stays in place.
    pub fn drivers(&self) -> Vec<DriverValue> {
        let set_point = self.set_point_temperature_c.unwrap_or(0.0);
        let mut drivers = vec![
            value(Driver::Gv2, flag(self.is_active == Some(true)), Uom::Boolean),
            value(Driver::Clitemp, round_to(set_point, 1), Uom::Celsius),
            value(Driver::Gv3, flag(self.home == Some(true)), Uom::Boolean),
            value(
                Driver::Gv7,
                round_to(celsius_to_fahrenheit(set_point), 1),
                Uom::Fahrenheit,
            ),
        ];

        drivers.extend(index_driver::<Mode>(Driver::Gv4, MODE_ATTR, self.mode.as_deref()));
        drivers.extend(index_driver::<HomeAwayMode>(
            Driver::Gv5,
            HOME_AWAY_ATTR,
            self.home_away_mode.as_deref(),
        ));
        drivers.extend(index_driver::<SetPointMode>(
            Driver::Gv6,
            SET_POINT_MODE_ATTR,
            self.set_point_mode.as_deref(),
        ));
        drivers
    }
}

/// Enumerations stored remotely as strings and locally as indices
pub trait IndexedEnum: FromStr + AsRef<str> + Copy {
    fn from_index(index: usize) -> Option<Self>;
    fn index(self) -> usize;
}

macro_rules! indexed_enum {
    ($($ty:ty),*) => {
        $(
            impl IndexedEnum for $ty {
                fn from_index(index: usize) -> Option<Self> {
                    Self::from_repr(index)
                }

                fn index(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

indexed_enum!(Mode, HomeAwayMode, SetPointMode);

/// Index of a remote enumeration string
pub fn index_of<E: IndexedEnum>(raw: &str) -> Option<usize> {
    E::from_str(raw).ok().map(IndexedEnum::index)
}

fn index_driver<E: IndexedEnum>(
    driver: Driver,
    attr: &str,
    raw: Option<&str>,
) -> Option<DriverValue> {
    match raw.map(|s| (s, index_of::<E>(s))) {
        Some((_, Some(index))) => Some(value(driver, index as f64, Uom::Index)),
        Some((s, None)) => {
            warn!("[flair] Unknown {} '{}', {} left unchanged", attr, s, driver);
            None
        }
        None => {
            warn!("[flair] Structure has no {}, {} left unchanged", attr, driver);
            None
        }
    }
}

fn value(driver: Driver, value: f64, uom: Uom) -> DriverValue {
    DriverValue { driver, value, uom }
}
