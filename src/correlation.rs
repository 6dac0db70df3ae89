use std::collections::HashMap;

use itertools::Itertools;
use ndarray::Array2;

use crate::admissions::MonthlyAdmissionCount;
use crate::daily::DailyStationAggregate;
use crate::field::Variable;
use crate::math::{distinct_count, mean_present, pairwise_complete, pearson};
use crate::normalize::MonthlyCityPollutant;
use crate::period::YearMonth;

/// A pollutant table row that can be joined to admissions by calendar month
pub trait PollutantRow {
    fn period(&self) -> YearMonth;

    /// The value of a pollutant variable; admission counts come from the other side of the join
    fn value(&self, variable: Variable) -> Option<f64>;
}

impl PollutantRow for MonthlyCityPollutant {
    fn period(&self) -> YearMonth {
        self.period
    }

    fn value(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::Raw(field) => self.values.get(field),
            Variable::Scaled(field) => self.scaled(field),
            Variable::AdmissionCount => None,
        }
    }
}

impl PollutantRow for DailyStationAggregate {
    fn period(&self) -> YearMonth {
        DailyStationAggregate::period(self)
    }

    fn value(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::Raw(field) => self.values.get(field),
            Variable::Scaled(_) | Variable::AdmissionCount => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergedRow<R> {
    pub pollutants: R,
    pub admissions: MonthlyAdmissionCount,
}

impl<R: PollutantRow> MergedRow<R> {
    pub fn value(&self, variable: Variable) -> Option<f64> {
        match variable {
            #[allow(clippy::cast_precision_loss)]
            Variable::AdmissionCount => Some(self.admissions.count as f64),
            variable => self.pollutants.value(variable),
        }
    }
}

/// Pollutant rows paired with the admission count of their month
#[derive(Clone, Debug, PartialEq)]
pub struct MergedTable<R> {
    pub rows: Vec<MergedRow<R>>,
}

impl<R: PollutantRow> MergedTable<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, variable: Variable) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.value(variable)).collect()
    }

    /// Pearson correlation for every pair of `variables`, each pair over the rows where both
    /// are present
    pub fn correlation_matrix(&self, variables: &[Variable]) -> CorrelationMatrix {
        pairwise_matrix(variables, |variable| self.column(variable))
    }
}

// Every distinct pair of `variables`, each over its own complete rows. A variable's diagonal is
// 1 only when it has at least two distinct observations.
fn pairwise_matrix(
    variables: &[Variable],
    column: impl Fn(Variable) -> Vec<Option<f64>>,
) -> CorrelationMatrix {
    let variables = variables.iter().copied().unique().collect::<Vec<_>>();
    let columns = variables
        .iter()
        .map(|&variable| column(variable))
        .collect::<Vec<_>>();

    let n = variables.len();
    let mut values = Array2::from_elem((n, n), f64::NAN);
    for ii in 0..n {
        for jj in ii..n {
            let (x, y) = pairwise_complete(&columns[ii], &columns[jj]);
            let r = if ii == jj {
                if x.len() >= 2 && distinct_count(&x) >= 2 {
                    1.0
                } else {
                    f64::NAN
                }
            } else {
                pearson(&x, &y)
            };
            values[[ii, jj]] = r;
            values[[jj, ii]] = r;
        }
    }

    CorrelationMatrix { variables, values }
}

/// Correlate the variables of pollutant rows among themselves, with no admission join.
///
/// Every row takes part. [`Variable::AdmissionCount`] has no values here, so its coefficients
/// are `NaN`.
pub fn sensor_correlation_matrix<R: PollutantRow>(
    rows: &[R],
    variables: &[Variable],
) -> CorrelationMatrix {
    pairwise_matrix(variables, |variable| {
        rows.iter().map(|row| row.value(variable)).collect()
    })
}

/// Inner join on `(year, month)`.
///
/// Rows keep the order of `pollutants`. A month present on only one side contributes nothing.
pub fn merge<R: PollutantRow + Clone>(
    pollutants: &[R],
    admissions: &[MonthlyAdmissionCount],
) -> MergedTable<R> {
    let by_period = admissions
        .iter()
        .map(|row| (row.period, row))
        .collect::<HashMap<_, _>>();

    let rows = pollutants
        .iter()
        .filter_map(|row| {
            by_period.get(&row.period()).map(|&count| MergedRow {
                pollutants: row.clone(),
                admissions: count.clone(),
            })
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        pollutant_rows = pollutants.len(),
        admission_rows = admissions.len(),
        merged_rows = rows.len(),
        "joined pollutants to admissions"
    );
    MergedTable { rows }
}

/// Square, symmetric table of Pearson coefficients.
///
/// Undefined coefficients, from a variable without variance or a pair with fewer than two
/// shared observations, are `NaN`.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    variables: Vec<Variable>,
    values: Array2<f64>,
}

impl CorrelationMatrix {
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    fn position(&self, variable: Variable) -> Option<usize> {
        self.variables.iter().position(|&v| v == variable)
    }

    /// The coefficient for a pair, `None` when either variable is not in the matrix
    pub fn get(&self, a: Variable, b: Variable) -> Option<f64> {
        Some(self.values[[self.position(a)?, self.position(b)?]])
    }

    /// Distinct pairs whose coefficient reaches `threshold` in absolute value, strongest first
    pub fn strong_pairs(&self, threshold: f64) -> Vec<(Variable, Variable, f64)> {
        let n = self.variables.len();
        let mut pairs = (0..n)
            .tuple_combinations()
            .map(|(ii, jj)| (self.variables[ii], self.variables[jj], self.values[[ii, jj]]))
            .filter(|(_, _, r)| r.abs() >= threshold)
            .collect::<Vec<_>>();
        pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
        pairs
    }
}

/// Correlate pollutants with admissions after joining the two tables by month
pub fn correlation_matrix<R: PollutantRow + Clone>(
    pollutant_table: &[R],
    admission_table: &[MonthlyAdmissionCount],
    variables: &[Variable],
) -> CorrelationMatrix {
    merge(pollutant_table, admission_table).correlation_matrix(variables)
}

/// Ordinary least squares line `y = slope * x + intercept`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, `NaN` when `y` has no variance
    pub r_squared: f64,
    /// Pearson correlation between `x` and `y`
    pub correlation: f64,
    pub observations: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope.mul_add(x, self.intercept)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegressionFit {
    /// No row has both variables present
    Empty,
    /// Every `x` is identical, so the slope is undefined
    Undefined { observations: usize },
    Fitted(LinearFit),
}

impl RegressionFit {
    pub const fn fitted(&self) -> Option<&LinearFit> {
        match self {
            Self::Fitted(fit) => Some(fit),
            Self::Empty | Self::Undefined { .. } => None,
        }
    }
}

/// Fit `y_field` against `x_field` by least squares over the rows where both are present
pub fn linear_fit<R: PollutantRow>(
    merged: &MergedTable<R>,
    x_field: Variable,
    y_field: Variable,
) -> RegressionFit {
    let (x, y) = pairwise_complete(&merged.column(x_field), &merged.column(y_field));
    if x.is_empty() {
        return RegressionFit::Empty;
    }
    if distinct_count(&x) < 2 {
        return RegressionFit::Undefined {
            observations: x.len(),
        };
    }

    let (Some(mean_x), Some(mean_y)) = (
        mean_present(x.iter().copied().map(Some)),
        mean_present(y.iter().copied().map(Some)),
    ) else {
        return RegressionFit::Empty;
    };

    let sxx = x.iter().map(|x| (x - mean_x).powi(2)).sum::<f64>();
    let sxy = x
        .iter()
        .zip(&y)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>();
    let slope = sxy / sxx;
    let intercept = slope.mul_add(-mean_x, mean_y);

    let ss_res = x
        .iter()
        .zip(&y)
        .map(|(x, y)| (y - slope.mul_add(*x, intercept)).powi(2))
        .sum::<f64>();
    let ss_tot = y.iter().map(|y| (y - mean_y).powi(2)).sum::<f64>();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    };

    RegressionFit::Fitted(LinearFit {
        slope,
        intercept,
        r_squared,
        correlation: pearson(&x, &y),
        observations: x.len(),
    })
}
