use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::field::{Field, Measurements};
use crate::math::{distinct_count, mean_present, population_std};
use crate::period::YearMonth;
use crate::reading::SensorReading;
use crate::{Error, Result};

/// A Box-Cox power transform with a fixed exponent.
///
/// $$
///     y = \frac{(x + s)^\lambda - 1}{\lambda}, \quad \lambda \neq 0
/// $$
///
/// and $y = \ln(x + s)$ when $\lambda = 0$. The shift $s$ moves zero-valued series, such as
/// rainfall, into the positive domain.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct BoxCox {
    pub lambda: f64,
    #[serde(default)]
    pub shift: f64,
}

impl BoxCox {
    /// Transform one value, `None` when the shifted value is not strictly positive
    pub fn transform(&self, value: f64) -> Option<f64> {
        let shifted = value + self.shift;
        if shifted <= 0.0 || shifted.is_nan() {
            return None;
        }
        if self.lambda == 0.0 {
            Some(shifted.ln())
        } else {
            Some((shifted.powf(self.lambda) - 1.0) / self.lambda)
        }
    }
}

/// Apply the configured transforms field by field.
///
/// Fields without an entry pass through unchanged. Values outside the domain of the transform
/// become missing.
pub fn apply_boxcox(
    readings: &[SensorReading],
    transforms: &BTreeMap<Field, BoxCox>,
) -> Vec<SensorReading> {
    if transforms.is_empty() {
        return readings.to_vec();
    }

    let mut rejected: BTreeMap<Field, usize> = BTreeMap::new();
    let transformed = readings
        .iter()
        .map(|reading| {
            let mut values = reading.values;
            for (&field, transform) in transforms {
                if let Some(value) = reading.values.get(field) {
                    let result = transform.transform(value);
                    if result.is_none() {
                        *rejected.entry(field).or_default() += 1;
                    }
                    values.set(field, result);
                }
            }
            SensorReading {
                values,
                ..reading.clone()
            }
        })
        .collect();

    for (field, count) in rejected {
        tracing::warn!(%field, count, "values outside the Box-Cox domain were set missing");
    }
    transformed
}

/// Location and scale of one field
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleParams {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl ScaleParams {
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.std_dev + self.mean
    }
}

fn degenerate(field: Field, reason: String) -> Error {
    Error::DegenerateStatistic {
        statistic: "standardization",
        variable: field.to_string(),
        reason,
    }
}

/// Standardization fitted once over a complete dataset.
///
/// The parameters are frozen at fit time; a reload must fit a new scaler, which carries a new
/// `version`, rather than mutate this one. Each field is fitted on its own: a field without
/// spread is recorded as degenerate and gets no scaled values, while the other fields still
/// scale.
#[derive(Clone, Debug, PartialEq)]
pub struct StandardScaler {
    version: u64,
    params: BTreeMap<Field, ScaleParams>,
    rejected: BTreeMap<Field, String>,
}

fn fit_field(
    readings: &[SensorReading],
    field: Field,
) -> std::result::Result<ScaleParams, String> {
    let values = readings
        .iter()
        .filter_map(|reading| reading.values.get(field))
        .collect::<Vec<_>>();

    let distinct = distinct_count(&values);
    if distinct < 2 {
        return Err(format!("{distinct} distinct value(s) across the dataset"));
    }

    let mean = mean_present(values.iter().copied().map(Some));
    let std_dev = population_std(&values);
    let (Some(mean), Some(std_dev)) = (mean, std_dev) else {
        return Err("no values present".into());
    };
    if std_dev == 0.0 || !std_dev.is_finite() {
        return Err(format!("standard deviation is {std_dev}"));
    }

    tracing::debug!(%field, mean, std_dev, observations = values.len(), "fitted scaler");
    Ok(ScaleParams { mean, std_dev })
}

impl StandardScaler {
    /// Fit mean and population standard deviation for each field over every reading.
    ///
    /// Missing values are ignored. A field with fewer than two distinct values, whose standard
    /// deviation would be zero, is logged and reported by [`StandardScaler::degenerate`].
    ///
    /// # Errors
    /// Returns [`Error::Config`] when no field is selected.
    pub fn fit(readings: &[SensorReading], fields: &[Field], version: u64) -> Result<Self> {
        let fields = fields.iter().copied().collect::<BTreeSet<_>>();
        if fields.is_empty() {
            return Err(Error::Config(
                "at least one field must be selected for scaling".into(),
            ));
        }

        let mut params = BTreeMap::new();
        let mut rejected = BTreeMap::new();
        for field in fields {
            match fit_field(readings, field) {
                Ok(fitted) => {
                    params.insert(field, fitted);
                }
                Err(reason) => {
                    tracing::error!(%field, %reason, "field cannot be standardized");
                    rejected.insert(field, reason);
                }
            }
        }

        Ok(Self {
            version,
            params,
            rejected,
        })
    }

    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Fields with fitted parameters
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.params.keys().copied()
    }

    /// One [`Error::DegenerateStatistic`] per requested field that could not be fitted
    pub fn degenerate(&self) -> Vec<Error> {
        self.rejected
            .iter()
            .map(|(&field, reason)| degenerate(field, reason.clone()))
            .collect()
    }

    /// # Errors
    /// Returns the first degenerate field, if any.
    pub fn check(&self) -> Result<()> {
        self.degenerate().into_iter().next().map_or(Ok(()), Err)
    }

    pub fn params(&self, field: Field) -> Option<&ScaleParams> {
        self.params.get(&field)
    }

    /// Scale a value of a fitted field, `None` for fields the scaler was not fitted on
    pub fn transform(&self, field: Field, value: f64) -> Option<f64> {
        self.params(field).map(|params| params.transform(value))
    }

    pub fn inverse(&self, field: Field, scaled: f64) -> Option<f64> {
        self.params(field).map(|params| params.inverse(scaled))
    }
}

/// City-wide monthly means of the raw and standardized fields
#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyCityPollutant {
    pub period: YearMonth,
    pub values: Measurements,
    pub scaled: BTreeMap<Field, Option<f64>>,
}

impl MonthlyCityPollutant {
    pub fn year(&self) -> i32 {
        self.period.year
    }

    pub fn month(&self) -> u32 {
        self.period.month
    }

    pub fn scaled(&self, field: Field) -> Option<f64> {
        self.scaled.get(&field).copied().flatten()
    }
}

/// Scale every reading with an already fitted scaler, then average by calendar month.
///
/// Rows are ordered by period. Because the scaler is fitted on the whole dataset, the monthly
/// means of the scaled fields are not individually centred on zero.
pub fn monthly_means(
    readings: &[SensorReading],
    scaler: &StandardScaler,
) -> Vec<MonthlyCityPollutant> {
    let mut by_month: BTreeMap<YearMonth, Vec<&SensorReading>> = BTreeMap::new();
    for reading in readings {
        by_month.entry(reading.period()).or_default().push(reading);
    }

    by_month
        .into_iter()
        .map(|(period, members)| {
            let mut values = Measurements::default();
            for field in Field::ALL {
                values.set(
                    field,
                    mean_present(members.iter().map(|reading| reading.values.get(field))),
                );
            }

            let scaled = scaler
                .fields()
                .map(|field| {
                    let mean = mean_present(members.iter().map(|reading| {
                        reading
                            .values
                            .get(field)
                            .and_then(|value| scaler.transform(field, value))
                    }));
                    (field, mean)
                })
                .collect();

            MonthlyCityPollutant {
                period,
                values,
                scaled,
            }
        })
        .collect()
}

/// Fit a scaler on the complete dataset, then produce the monthly city table.
///
/// # Errors
/// Fails when any of `columns_to_scale` cannot be standardized.
pub fn normalize_and_scale(
    readings: &[SensorReading],
    columns_to_scale: &[Field],
) -> Result<Vec<MonthlyCityPollutant>> {
    let scaler = StandardScaler::fit(readings, columns_to_scale, 0)?;
    scaler.check()?;
    Ok(monthly_means(readings, &scaler))
}
