use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// An atmospheric pollutant or meteorological variable measured at a station
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Field {
    #[serde(rename = "pm2_5")]
    Pm25,
    #[serde(rename = "pm10")]
    Pm10,
    #[serde(rename = "co")]
    Co,
    #[serde(rename = "no")]
    No,
    #[serde(rename = "no2")]
    No2,
    #[serde(rename = "nox")]
    Nox,
    #[serde(rename = "so2")]
    So2,
    #[serde(rename = "o3")]
    O3,
    #[serde(rename = "chuva", alias = "rainfall")]
    Rainfall,
    #[serde(rename = "temp", alias = "temperature")]
    Temperature,
    #[serde(rename = "ur", alias = "humidity")]
    Humidity,
}

impl Field {
    pub const COUNT: usize = 11;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Pm25,
        Self::Pm10,
        Self::Co,
        Self::No,
        Self::No2,
        Self::Nox,
        Self::So2,
        Self::O3,
        Self::Rainfall,
        Self::Temperature,
        Self::Humidity,
    ];

    /// The fields standardized for the monthly pollutant table unless configured otherwise
    pub const DEFAULT_SCALED: [Self; 5] = [
        Self::Pm25,
        Self::Pm10,
        Self::Nox,
        Self::Temperature,
        Self::O3,
    ];

    /// Column name in the source tables
    pub const fn column(self) -> &'static str {
        match self {
            Self::Pm25 => "pm2_5",
            Self::Pm10 => "pm10",
            Self::Co => "co",
            Self::No => "no",
            Self::No2 => "no2",
            Self::Nox => "nox",
            Self::So2 => "so2",
            Self::O3 => "o3",
            Self::Rainfall => "chuva",
            Self::Temperature => "temp",
            Self::Humidity => "ur",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Co => "ppm",
            Self::Rainfall => "mm",
            Self::Temperature => "°C",
            Self::Humidity => "%",
            _ => "µg/m³",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let field = match name.as_str() {
            "pm2_5" | "pm2.5" | "pm25" => Self::Pm25,
            "pm10" => Self::Pm10,
            "co" => Self::Co,
            "no" => Self::No,
            "no2" => Self::No2,
            "nox" => Self::Nox,
            "so2" => Self::So2,
            "o3" => Self::O3,
            "chuva" | "rainfall" => Self::Rainfall,
            "temp" | "temperature" => Self::Temperature,
            "ur" | "humidity" => Self::Humidity,
            _ => return Err(Error::UnknownName(s.to_owned())),
        };
        Ok(field)
    }
}

/// One value per [`Field`], any of which may be missing
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Measurements([Option<f64>; Field::COUNT]);

impl Measurements {
    pub const fn get(&self, field: Field) -> Option<f64> {
        self.0[field.index()]
    }

    /// Store a value, treating `NaN` as missing
    pub fn set(&mut self, field: Field, value: Option<f64>) {
        self.0[field.index()] = value.filter(|v| !v.is_nan());
    }

    #[must_use]
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<f64>)> + '_ {
        Field::ALL.iter().map(|&field| (field, self.get(field)))
    }
}

/// A column that can take part in a correlation or regression
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum Variable {
    Raw(Field),
    Scaled(Field),
    AdmissionCount,
}

impl Variable {
    /// Pollutants, weather and admissions in the order the correlation heatmap shows them
    pub fn default_correlation_set() -> Vec<Self> {
        [
            Field::Pm25,
            Field::Pm10,
            Field::Co,
            Field::O3,
            Field::No,
            Field::No2,
            Field::Nox,
            Field::So2,
            Field::Rainfall,
            Field::Temperature,
            Field::Humidity,
        ]
        .into_iter()
        .map(Self::Raw)
        .chain(std::iter::once(Self::AdmissionCount))
        .collect()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(field) => write!(f, "{field}"),
            Self::Scaled(field) => write!(f, "{field}_scaled"),
            Self::AdmissionCount => f.write_str("admission_count"),
        }
    }
}

impl FromStr for Variable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("admission_count") || name.eq_ignore_ascii_case("num_internacoes")
        {
            return Ok(Self::AdmissionCount);
        }
        match name.strip_suffix("_scaled") {
            Some(field) => Ok(Self::Scaled(field.parse()?)),
            None => Ok(Self::Raw(name.parse()?)),
        }
    }
}

impl TryFrom<String> for Variable {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Variable> for String {
    fn from(value: Variable) -> Self {
        value.to_string()
    }
}
