//! Runtime configuration read from a TOML file.
//!
//! Every section is optional and falls back to the defaults of the Rio de Janeiro study:
//!
//! ```toml
//! [sources]
//! sensor_files = ["data/bangu.csv", "data/tijuca.csv"]
//! boxcox_file = "data/sensor_boxcox.csv"
//! admission_files = ["data/sus_2012.csv"]
//!
//! [admissions]
//! municipality_code = 330455
//! start_date = "2012-01-01"
//! label_format = "unpadded"
//!
//! [normalization]
//! scaled_fields = ["pm2_5", "pm10", "nox", "temp", "o3"]
//!
//! [normalization.boxcox]
//! chuva = { lambda = 0.0, shift = 1.0 }
//!
//! [correlation]
//! variables = ["pm10", "o3", "admission_count"]
//! strong_threshold = 0.45
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::admissions::{AdmissionScope, DEFAULT_START_DATE, RIO_DE_JANEIRO};
use crate::field::{Field, Variable};
use crate::normalize::BoxCox;
use crate::period::LabelFormat;
use crate::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sources: Sources,
    pub admissions: AdmissionSettings,
    pub normalization: Normalization,
    pub correlation: CorrelationSettings,
}

/// Where the raw tables live
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Sources {
    /// One hourly CSV per station
    pub sensor_files: Vec<PathBuf>,
    /// Readings already Box-Cox transformed upstream, used for the monthly table when present
    pub boxcox_file: Option<PathBuf>,
    /// One CSV per year of hospital admissions
    pub admission_files: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmissionSettings {
    pub municipality_code: u32,
    pub start_date: NaiveDate,
    pub label_format: LabelFormat,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            municipality_code: RIO_DE_JANEIRO,
            start_date: DEFAULT_START_DATE,
            label_format: LabelFormat::default(),
        }
    }
}

impl AdmissionSettings {
    pub const fn scope(&self) -> AdmissionScope {
        AdmissionScope::new(self.municipality_code).starting(self.start_date)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Normalization {
    pub scaled_fields: Vec<Field>,
    /// Transforms applied before scaling, for sources that are not already transformed
    pub boxcox: BTreeMap<Field, BoxCox>,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            scaled_fields: Field::DEFAULT_SCALED.to_vec(),
            boxcox: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelationSettings {
    pub variables: Vec<Variable>,
    /// Minimum absolute coefficient reported as a strong pair
    pub strong_threshold: f64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            variables: Variable::default_correlation_set(),
            strong_threshold: 0.45,
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Read a configuration file, resolving relative source paths against its directory.
    ///
    /// # Errors
    /// Fails when the file cannot be read, is not valid TOML, holds unknown keys or holds
    /// values outside their domain.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config = contents.parse::<Self>()?;
        if let Some(base) = path.parent() {
            config.sources.resolve(base);
        }
        tracing::debug!(config = %path.display(), "read configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.normalization.scaled_fields.is_empty() {
            return Err(Error::Config(
                "normalization.scaled_fields must name at least one field".into(),
            ));
        }
        let threshold = self.correlation.strong_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "correlation.strong_threshold must lie in [0, 1], got {threshold}"
            )));
        }
        if let Some((field, _)) = self
            .normalization
            .boxcox
            .iter()
            .find(|(_, transform)| !transform.lambda.is_finite() || !transform.shift.is_finite())
        {
            return Err(Error::Config(format!(
                "normalization.boxcox.{field} must have finite lambda and shift"
            )));
        }
        Ok(())
    }

    /// Log the sources and settings in effect
    pub fn log_config(&self) {
        tracing::info!(
            sensor_files = self.sources.sensor_files.len(),
            boxcox_file = ?self.sources.boxcox_file,
            admission_files = self.sources.admission_files.len(),
            "configured sources"
        );
        tracing::info!(
            municipality = self.admissions.municipality_code,
            start = %self.admissions.start_date,
            scaled = ?self.normalization.scaled_fields,
            "configured pipeline"
        );
    }
}

impl Sources {
    fn resolve(&mut self, base: &Path) {
        let join = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        self.sensor_files.iter_mut().for_each(join);
        self.admission_files.iter_mut().for_each(join);
        self.boxcox_file.iter_mut().for_each(join);
    }
}
