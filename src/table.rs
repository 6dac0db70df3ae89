//! Plain tabular rendering of query results.
//!
//! A missing value is an empty cell and an undefined statistic is `NaN`, so the two stay
//! distinguishable downstream.

use std::io;

use crate::admissions::MonthlyAdmissionCount;
use crate::correlation::{CorrelationMatrix, LinearFit, MergedRow, PollutantRow, RegressionFit};
use crate::daily::{CityDailyAggregate, DailyStationAggregate, StationSummary};
use crate::field::{Field, Measurements};
use crate::math::Summary;
use crate::normalize::MonthlyCityPollutant;
use crate::profile::{AdmissionSummary, DeathCause, DiagnosisCount, MonthlyMortality, Sex};
use crate::Result;

/// A type rendered as one CSV record under a fixed header
pub trait Row {
    fn header() -> Vec<String>;
    fn record(&self) -> Vec<String>;
}

/// Anything that renders as a header and a list of records
pub trait Tabular {
    fn header(&self) -> Vec<String>;
    fn records(&self) -> Vec<Vec<String>>;
}

impl<T: Row> Tabular for [T] {
    fn header(&self) -> Vec<String> {
        T::header()
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.iter().map(Row::record).collect()
    }
}

impl<T: Row> Tabular for Vec<T> {
    fn header(&self) -> Vec<String> {
        self.as_slice().header()
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.as_slice().records()
    }
}

/// Write a header and every record as CSV
///
/// # Errors
/// Fails when the writer does.
pub fn write_csv<W: io::Write, T: Tabular + ?Sized>(writer: W, table: &T) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.header())?;
    for record in table.records() {
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn field_header() -> impl Iterator<Item = String> {
    Field::ALL.into_iter().map(|field| field.column().to_owned())
}

fn field_cells(values: &Measurements) -> impl Iterator<Item = String> + '_ {
    values.iter().map(|(_, value)| cell(value))
}

fn strings<const N: usize>(names: [&str; N]) -> Vec<String> {
    names.into_iter().map(str::to_owned).collect()
}

impl Row for DailyStationAggregate {
    fn header() -> Vec<String> {
        strings(["station", "day", "year", "month"])
            .into_iter()
            .chain(field_header())
            .collect()
    }

    fn record(&self) -> Vec<String> {
        [
            self.station.name().to_owned(),
            self.day.to_string(),
            self.year().to_string(),
            self.month().to_string(),
        ]
        .into_iter()
        .chain(field_cells(&self.values))
        .collect()
    }
}

impl Row for CityDailyAggregate {
    fn header() -> Vec<String> {
        strings(["day"]).into_iter().chain(field_header()).collect()
    }

    fn record(&self) -> Vec<String> {
        std::iter::once(self.day.to_string())
            .chain(field_cells(&self.values))
            .collect()
    }
}

impl Row for StationSummary {
    fn header() -> Vec<String> {
        strings(["station", "latitude", "longitude", "field", "days", "mean", "min", "max"])
    }

    fn record(&self) -> Vec<String> {
        let (latitude, longitude) = self.station.coordinates();
        vec![
            self.station.name().to_owned(),
            latitude.to_string(),
            longitude.to_string(),
            self.field.to_string(),
            self.days.to_string(),
            cell(self.mean),
            cell(self.min),
            cell(self.max),
        ]
    }
}

impl Row for Summary {
    fn header() -> Vec<String> {
        strings(["count", "mean", "std_dev", "min", "q1", "median", "q3", "max"])
    }

    fn record(&self) -> Vec<String> {
        std::iter::once(self.count.to_string())
            .chain(
                [
                    self.mean,
                    self.std_dev,
                    self.min,
                    self.q1,
                    self.median,
                    self.q3,
                    self.max,
                ]
                .iter()
                .map(ToString::to_string),
            )
            .collect()
    }
}

impl Row for MonthlyCityPollutant {
    fn header() -> Vec<String> {
        strings(["year", "month"])
            .into_iter()
            .chain(field_header())
            .chain(Field::ALL.into_iter().map(|field| format!("{field}_scaled")))
            .collect()
    }

    // Every field gets a scaled column so rows from differently configured scalers line up.
    fn record(&self) -> Vec<String> {
        [self.year().to_string(), self.month().to_string()]
            .into_iter()
            .chain(field_cells(&self.values))
            .chain(Field::ALL.into_iter().map(|field| cell(self.scaled(field))))
            .collect()
    }
}

impl Row for MonthlyAdmissionCount {
    fn header() -> Vec<String> {
        strings(["year", "month", "admission_count", "label"])
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.year().to_string(),
            self.month().to_string(),
            self.count.to_string(),
            self.label.clone(),
        ]
    }
}

impl<R: PollutantRow + Row> Row for MergedRow<R> {
    fn header() -> Vec<String> {
        R::header()
            .into_iter()
            .chain(strings(["admission_count", "label"]))
            .collect()
    }

    fn record(&self) -> Vec<String> {
        self.pollutants
            .record()
            .into_iter()
            .chain([self.admissions.count.to_string(), self.admissions.label.clone()])
            .collect()
    }
}

impl Row for AdmissionSummary {
    fn header() -> Vec<String> {
        strings(["admissions", "mean_age", "mortality_rate", "mean_length_of_stay"])
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.admissions.to_string(),
            cell(self.mean_age),
            cell(self.mortality_rate),
            cell(self.mean_length_of_stay),
        ]
    }
}

impl Row for (&'static str, usize) {
    fn header() -> Vec<String> {
        strings(["age_band", "admissions"])
    }

    fn record(&self) -> Vec<String> {
        vec![self.0.to_owned(), self.1.to_string()]
    }
}

impl Row for (Sex, usize) {
    fn header() -> Vec<String> {
        strings(["sex", "admissions"])
    }

    fn record(&self) -> Vec<String> {
        vec![self.0.label().to_owned(), self.1.to_string()]
    }
}

impl Row for DiagnosisCount {
    fn header() -> Vec<String> {
        strings(["diagnosis", "admissions"])
    }

    fn record(&self) -> Vec<String> {
        vec![self.diagnosis.clone(), self.count.to_string()]
    }
}

impl Row for MonthlyMortality {
    fn header() -> Vec<String> {
        strings(["label", "admissions", "deaths", "mortality_rate"])
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.label.clone(),
            self.admissions.to_string(),
            self.deaths.to_string(),
            self.rate.to_string(),
        ]
    }
}

impl Row for DeathCause {
    fn header() -> Vec<String> {
        strings(["diagnosis", "deaths", "admissions", "mortality_rate"])
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.diagnosis.clone(),
            self.deaths.to_string(),
            self.admissions.to_string(),
            self.rate.to_string(),
        ]
    }
}

impl Tabular for CorrelationMatrix {
    fn header(&self) -> Vec<String> {
        std::iter::once(String::from("variable"))
            .chain(self.variables().iter().map(ToString::to_string))
            .collect()
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.variables()
            .iter()
            .zip(self.values().rows())
            .map(|(variable, row)| {
                std::iter::once(variable.to_string())
                    .chain(row.iter().map(ToString::to_string))
                    .collect()
            })
            .collect()
    }
}

impl Tabular for RegressionFit {
    fn header(&self) -> Vec<String> {
        strings([
            "state",
            "slope",
            "intercept",
            "r_squared",
            "correlation",
            "observations",
        ])
    }

    fn records(&self) -> Vec<Vec<String>> {
        let unfitted = |state: &str, observations: usize| {
            let mut record = vec![String::new(); 6];
            record[0] = state.to_owned();
            record[5] = observations.to_string();
            record
        };
        let record = match self {
            Self::Empty => unfitted("empty", 0),
            Self::Undefined { observations } => unfitted("undefined", *observations),
            Self::Fitted(LinearFit {
                slope,
                intercept,
                r_squared,
                correlation,
                observations,
            }) => vec![
                "fitted".to_owned(),
                slope.to_string(),
                intercept.to_string(),
                r_squared.to_string(),
                correlation.to_string(),
                observations.to_string(),
            ],
        };
        vec![record]
    }
}
