//! Lookup tables translating GRIB2 codes into the names carried by a record's
//! `name`, `shortName`, `units` and `typeOfLevel` keys.
//!
//! The built-in parameter table covers the common meteorological products and
//! can be extended (or overridden) from [`Config::parameters`](crate::config::Config).

use std::collections::HashMap;
use crate::config::ParameterConfig;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub short_name: String,
    pub units: String,
}

const UNKNOWN: &str = "unknown";

const BUILTIN_PARAMETERS: &[(ParamKey, &str, &str, &str)] = &[
    ((0, 0, 0), "Temperature", "t", "K"),
    ((0, 0, 4), "Maximum temperature", "tmax", "K"),
    ((0, 0, 5), "Minimum temperature", "tmin", "K"),
    ((0, 0, 6), "Dew point temperature", "dpt", "K"),
    ((0, 1, 1), "Relative humidity", "r", "%"),
    ((0, 1, 7), "Precipitation rate", "prate", "kg m**-2 s**-1"),
    ((0, 1, 8), "Total Precipitation", "tp", "kg m**-2"),
    ((0, 2, 1), "Wind speed", "ws", "m s**-1"),
    ((0, 2, 2), "U component of wind", "u", "m s**-1"),
    ((0, 2, 3), "V component of wind", "v", "m s**-1"),
    ((0, 3, 0), "Surface pressure", "sp", "Pa"),
    ((0, 3, 1), "Pressure reduced to MSL", "prmsl", "Pa"),
    ((0, 3, 2), "Pressure tendency", "ptend", "Pa s**-1"),
    ((0, 3, 5), "Geopotential height", "gh", "gpm"),
    ((0, 6, 1), "Total Cloud Cover", "tcc", "%"),
    ((0, 7, 6), "Convective available potential energy", "cape", "J kg**-1"),
    ((10, 0, 3), "Significant height of combined wind waves and swell", "swh", "m"),
];

/// Code table 4.5 short names.
const LEVELS: &[(u8, &str)] = &[
    (1, "surface"),
    (2, "cloudBase"),
    (3, "cloudTop"),
    (4, "isothermZero"),
    (6, "maxWind"),
    (7, "tropopause"),
    (8, "nominalTop"),
    (10, "entireAtmosphere"),
    (100, "isobaricInhPa"),
    (101, "meanSea"),
    (102, "heightAboveSea"),
    (103, "heightAboveGround"),
    (104, "sigma"),
    (105, "hybrid"),
    (106, "depthBelowLand"),
    (108, "pressureFromGroundLayer"),
];

#[derive(Debug, Clone)]
pub struct ParameterTable {
    parameters: HashMap<ParamKey, Parameter>,
}

impl Default for ParameterTable {
    fn default() -> Self {
        let parameters = BUILTIN_PARAMETERS.iter()
            .map(|(key, name, short_name, units)| (*key, Parameter {
                name: name.to_string(),
                short_name: short_name.to_string(),
                units: units.to_string(),
            }))
            .collect();
        Self { parameters }
    }
}

impl ParameterTable {
    /// Built-in table extended with `extra`; later entries win.
    pub fn with_parameters(extra: &[ParameterConfig]) -> Self {
        let mut table = Self::default();
        for parameter in extra {
            table.add_parameter(parameter.discipline, parameter.category, parameter.number, Parameter {
                name: parameter.name.clone(),
                short_name: parameter.short_name.clone(),
                units: parameter.units.clone(),
            });
        }
        table
    }

    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, parameter: Parameter) {
        self.parameters.insert((discipline, category, number), parameter);
    }

    pub fn get(&self, discipline: u8, category: u8, number: u8) -> Option<&Parameter> {
        self.parameters.get(&(discipline, category, number))
    }

    pub fn name(&self, discipline: u8, category: u8, number: u8) -> &str {
        self.get(discipline, category, number).map_or(UNKNOWN, |p| p.name.as_str())
    }

    pub fn short_name(&self, discipline: u8, category: u8, number: u8) -> &str {
        self.get(discipline, category, number).map_or(UNKNOWN, |p| p.short_name.as_str())
    }

    pub fn units(&self, discipline: u8, category: u8, number: u8) -> &str {
        self.get(discipline, category, number).map_or(UNKNOWN, |p| p.units.as_str())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// `typeOfLevel` for a type of fixed surface.
pub fn level_type_name(surface_type: u8) -> &'static str {
    LEVELS.iter()
        .find(|(code, _)| *code == surface_type)
        .map_or(UNKNOWN, |(_, name)| name)
}

/// Statistical process names (code table 4.10) as used by `stepType`.
pub fn statistical_process_name(process: u8) -> &'static str {
    match process {
        0 => "avg",
        1 => "accum",
        2 => "max",
        3 => "min",
        4 => "diff",
        5 => "rms",
        6 => "sd",
        _ => UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        let table = ParameterTable::default();
        assert_eq!(table.name(0, 3, 2), "Pressure tendency");
        assert_eq!(table.units(0, 3, 2), "Pa s**-1");
        assert_eq!(table.short_name(0, 1, 7), "prate");
        assert_eq!(table.name(0, 250, 250), "unknown");
    }

    #[test]
    fn configured_parameters_override_builtins() {
        let table = ParameterTable::with_parameters(&[ParameterConfig {
            discipline: 0,
            category: 3,
            number: 0,
            name: String::from("Station pressure"),
            short_name: String::from("stp"),
            units: String::from("hPa"),
        }]);
        assert_eq!(table.name(0, 3, 0), "Station pressure");
        assert_eq!(table.len(), BUILTIN_PARAMETERS.len());
    }

    #[test]
    fn level_names() {
        assert_eq!(level_type_name(1), "surface");
        assert_eq!(level_type_name(103), "heightAboveGround");
        assert_eq!(level_type_name(42), "unknown");
    }
}
