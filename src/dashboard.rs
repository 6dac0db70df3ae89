//! The query surface a presentation layer drives.
//!
//! [`Dashboard`] owns the configuration, the memoised loads and the fitted scaler. Queries are
//! recomputed from the cached tables on every call, so a filter change never touches disk.
//! [`Dashboard::refresh`] drops every cached table and retires the scaler, which makes the next
//! query reload and refit.
//!
//! A source that cannot be read is skipped and recorded in [`Dashboard::source_failures`]; the
//! query only fails when every source of its kind failed. A scaled field without spread is
//! reported by [`Dashboard::scaling_errors`] and leaves the other columns untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;

use crate::admissions::{HospitalAdmissionRecord, MonthlyAdmissionCount};
use crate::cache::{LoadCache, SourceKey};
use crate::config::Config;
use crate::correlation::{self, CorrelationMatrix, MergedTable, RegressionFit};
use crate::daily::{self, CityDailyAggregate, DailyFilter, DailyStationAggregate, StationSummary};
use crate::field::{Field, Variable};
use crate::loader::{load_admission_file, load_sensor_file};
use crate::math::{self, Summary};
use crate::normalize::{apply_boxcox, monthly_means, MonthlyCityPollutant, StandardScaler};
use crate::profile::{AdmissionFilter, AdmissionProfile};
use crate::reading::SensorReading;
use crate::{Error, Result};

pub struct Dashboard {
    config: Config,
    sensor_files: LoadCache<Vec<SensorReading>>,
    admission_files: LoadCache<Vec<HospitalAdmissionRecord>>,
    normalized: LoadCache<Vec<SensorReading>>,
    daily: LoadCache<Vec<DailyStationAggregate>>,
    monthly_pollutants: LoadCache<Vec<MonthlyCityPollutant>>,
    monthly_admissions: LoadCache<Vec<MonthlyAdmissionCount>>,
    scaler: Option<Arc<StandardScaler>>,
    scaler_version: u64,
    sensor_failures: BTreeMap<PathBuf, Error>,
    admission_failures: BTreeMap<PathBuf, Error>,
}

// Cache parameter naming every file that feeds a combined table.
fn file_list(files: &[PathBuf]) -> String {
    files.iter().map(|path| path.display()).join(";")
}

// Concatenate several sources, each read through the per-file cache. A failing file is logged,
// skipped and left in `failures`; a file that loads clears its entry. When every file fails the
// first error is returned instead.
fn load_all<V: Clone>(
    cache: &mut LoadCache<Vec<V>>,
    failures: &mut BTreeMap<PathBuf, Error>,
    files: &[PathBuf],
    load: fn(&Path) -> Result<Vec<V>>,
) -> Result<Vec<V>> {
    let mut rows = vec![];
    let mut failed = vec![];
    for path in files {
        match cache.get_or_load(SourceKey::file(path), || load(path)) {
            Ok(loaded) => {
                failures.remove(path);
                rows.extend(loaded.iter().cloned());
            }
            Err(err) => {
                tracing::warn!(source = %path.display(), error = %err, "skipping source");
                failed.push((path.clone(), err));
            }
        }
    }

    if !files.is_empty() && failed.len() == files.len() {
        let mut failed = failed.into_iter();
        let Some((path, err)) = failed.next() else {
            unreachable!("every file failed, so at least one failure was recorded")
        };
        failures.remove(&path);
        failures.extend(failed);
        return Err(err);
    }
    failures.extend(failed);
    Ok(rows)
}

impl Dashboard {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sensor_files: LoadCache::new(),
            admission_files: LoadCache::new(),
            normalized: LoadCache::new(),
            daily: LoadCache::new(),
            monthly_pollutants: LoadCache::new(),
            monthly_admissions: LoadCache::new(),
            scaler: None,
            scaler_version: 0,
            sensor_failures: BTreeMap::new(),
            admission_failures: BTreeMap::new(),
        }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Drop every cached load and retire the fitted scaler
    pub fn refresh(&mut self) {
        self.sensor_files.clear();
        self.admission_files.clear();
        self.normalized.clear();
        self.daily.clear();
        self.monthly_pollutants.clear();
        self.monthly_admissions.clear();
        self.scaler = None;
        self.scaler_version += 1;
        self.sensor_failures.clear();
        self.admission_failures.clear();
        tracing::info!(scaler_version = self.scaler_version, "refreshed dashboard");
    }

    /// Re-read one source file on next use, leaving the others cached
    pub fn invalidate_source(&mut self, path: &Path) {
        let identity = SourceKey::file(path).identity;
        let sensors = self.sensor_files.invalidate(&identity)
            + usize::from(self.sensor_failures.remove(path).is_some());
        let admissions = self.admission_files.invalidate(&identity)
            + usize::from(self.admission_failures.remove(path).is_some());
        if sensors > 0 {
            self.normalized.clear();
            self.daily.clear();
            self.monthly_pollutants.clear();
            self.scaler = None;
            self.scaler_version += 1;
        }
        if admissions > 0 {
            self.monthly_admissions.clear();
        }
    }

    /// Sources skipped by the last loads, with the reason each one failed
    pub fn source_failures(&self) -> impl Iterator<Item = (&Path, &Error)> {
        self.sensor_failures
            .iter()
            .chain(&self.admission_failures)
            .map(|(path, err)| (path.as_path(), err))
    }

    fn all_daily(&mut self) -> Result<Arc<Vec<DailyStationAggregate>>> {
        let files = &self.config.sources.sensor_files;
        let sensor_files = &mut self.sensor_files;
        let failures = &mut self.sensor_failures;
        self.daily
            .get_or_load(SourceKey::new("daily", file_list(files)), || {
                let readings = load_all(sensor_files, failures, files, load_sensor_file)?;
                Ok(daily::aggregate_daily(&readings))
            })
    }

    /// Station-day aggregates, optionally restricted to some stations, years or months
    ///
    /// # Errors
    /// Fails when a sensor source cannot be loaded.
    pub fn daily_aggregates(&mut self, filter: &DailyFilter) -> Result<Vec<DailyStationAggregate>> {
        Ok(daily::filter_daily(&self.all_daily()?, filter))
    }

    /// City-wide daily means over the stations admitted by `filter`
    ///
    /// # Errors
    /// Fails when a sensor source cannot be loaded.
    pub fn city_daily(&mut self, filter: &DailyFilter) -> Result<Vec<CityDailyAggregate>> {
        Ok(daily::city_daily_mean(&self.daily_aggregates(filter)?))
    }

    /// Per-station spread of one field over the days admitted by `filter`
    ///
    /// # Errors
    /// Fails when a sensor source cannot be loaded.
    pub fn station_summary(
        &mut self,
        filter: &DailyFilter,
        field: Field,
    ) -> Result<Vec<StationSummary>> {
        Ok(daily::station_summary(&self.daily_aggregates(filter)?, field))
    }

    /// Distribution of one field over the station-day rows admitted by `filter`, `None` when the
    /// field is missing everywhere
    ///
    /// # Errors
    /// Fails when a sensor source cannot be loaded.
    pub fn describe(&mut self, filter: &DailyFilter, field: Field) -> Result<Option<Summary>> {
        let rows = self.daily_aggregates(filter)?;
        Ok(math::describe(rows.iter().map(|row| row.values.get(field))))
    }

    // Readings that feed the monthly table: the upstream Box-Cox file when configured,
    // otherwise the station files, with any configured transforms applied.
    fn normalized_readings(&mut self) -> Result<Arc<Vec<SensorReading>>> {
        let sources = &self.config.sources;
        let transforms = &self.config.normalization.boxcox;
        let sensor_files = &mut self.sensor_files;
        let failures = &mut self.sensor_failures;
        let files = sources
            .boxcox_file
            .as_ref()
            .map_or_else(|| sources.sensor_files.clone(), |path| vec![path.clone()]);

        self.normalized
            .get_or_load(SourceKey::new("normalized", file_list(&files)), || {
                let readings = load_all(sensor_files, failures, &files, load_sensor_file)?;
                Ok(apply_boxcox(&readings, transforms))
            })
    }

    /// The scaler fitted over the complete normalized dataset, fitting it on first use
    ///
    /// # Errors
    /// Fails when the sources cannot be loaded or no field is selected for scaling.
    pub fn scaler(&mut self) -> Result<Arc<StandardScaler>> {
        if let Some(scaler) = &self.scaler {
            return Ok(Arc::clone(scaler));
        }

        let readings = self.normalized_readings()?;
        let scaler = Arc::new(StandardScaler::fit(
            &readings,
            &self.config.normalization.scaled_fields,
            self.scaler_version,
        )?);
        tracing::info!(
            version = scaler.version(),
            fields = scaler.fields().count(),
            readings = readings.len(),
            "fitted scaler"
        );
        self.scaler = Some(Arc::clone(&scaler));
        Ok(scaler)
    }

    /// Fields selected for scaling that have no spread, one error each
    ///
    /// # Errors
    /// Fails when the scaler cannot be fitted at all.
    pub fn scaling_errors(&mut self) -> Result<Vec<Error>> {
        Ok(self.scaler()?.degenerate())
    }

    /// Monthly city-wide raw and standardized means, ordered by period. Degenerate scaled fields
    /// have no scaled values.
    ///
    /// # Errors
    /// Fails when the sources cannot be loaded or the scaler cannot be fitted.
    pub fn monthly_pollutants(&mut self) -> Result<Arc<Vec<MonthlyCityPollutant>>> {
        let scaler = self.scaler()?;
        let readings = self.normalized_readings()?;
        let key = SourceKey::new("monthly_pollutants", format!("scaler v{}", scaler.version()));
        self.monthly_pollutants
            .get_or_load(key, || Ok(monthly_means(&readings, &scaler)))
    }

    fn admission_records(&mut self) -> Result<Vec<HospitalAdmissionRecord>> {
        load_all(
            &mut self.admission_files,
            &mut self.admission_failures,
            &self.config.sources.admission_files,
            load_admission_file,
        )
    }

    /// Admissions of the configured municipality per month of admission
    ///
    /// # Errors
    /// Fails when an admission source cannot be loaded.
    pub fn monthly_admissions(&mut self) -> Result<Arc<Vec<MonthlyAdmissionCount>>> {
        let settings = &self.config.admissions;
        let key = SourceKey::new(
            "monthly_admissions",
            format!(
                "{};{};{};{:?}",
                file_list(&self.config.sources.admission_files),
                settings.municipality_code,
                settings.start_date,
                settings.label_format
            ),
        );
        if let Some(hit) = self.monthly_admissions.get(&key) {
            return Ok(hit);
        }

        let records = self.admission_records()?;
        let settings = &self.config.admissions;
        self.monthly_admissions.get_or_load(key, || {
            Ok(settings
                .scope()
                .aggregate_monthly(&records, settings.label_format))
        })
    }

    /// Descriptive breakdowns of the scoped admissions admitted by `filter`, keeping the `top`
    /// diagnoses
    ///
    /// # Errors
    /// Fails when an admission source cannot be loaded.
    pub fn admission_profile(
        &mut self,
        filter: &AdmissionFilter,
        top: usize,
    ) -> Result<AdmissionProfile> {
        let records = self.admission_records()?;
        let settings = &self.config.admissions;
        let retained = filter.apply(&settings.scope().retain(&records));
        Ok(AdmissionProfile::build(&retained, top, settings.label_format))
    }

    /// Monthly pollutants joined to monthly admissions
    ///
    /// # Errors
    /// Fails when either branch cannot be built.
    pub fn merged(&mut self) -> Result<MergedTable<MonthlyCityPollutant>> {
        let pollutants = self.monthly_pollutants()?;
        let admissions = self.monthly_admissions()?;
        Ok(correlation::merge(&pollutants, &admissions))
    }

    /// Correlation matrix over the monthly table; the configured variables when `variables`
    /// is empty
    ///
    /// # Errors
    /// Fails when either branch cannot be built.
    pub fn correlation_matrix(&mut self, variables: &[Variable]) -> Result<CorrelationMatrix> {
        let variables = if variables.is_empty() {
            self.config.correlation.variables.clone()
        } else {
            variables.to_vec()
        };
        Ok(self.merged()?.correlation_matrix(&variables))
    }

    /// Correlation matrix over filtered station-day rows, each paired with its month's count
    ///
    /// # Errors
    /// Fails when a source cannot be loaded.
    pub fn station_correlation_matrix(
        &mut self,
        filter: &DailyFilter,
        variables: &[Variable],
    ) -> Result<CorrelationMatrix> {
        let rows = self.daily_aggregates(filter)?;
        let admissions = self.monthly_admissions()?;
        Ok(correlation::correlation_matrix(&rows, &admissions, variables))
    }

    /// Correlation matrix over filtered station-day rows alone, without admission data
    ///
    /// # Errors
    /// Fails when a sensor source cannot be loaded.
    pub fn sensor_correlation_matrix(
        &mut self,
        filter: &DailyFilter,
        variables: &[Variable],
    ) -> Result<CorrelationMatrix> {
        let rows = self.daily_aggregates(filter)?;
        Ok(correlation::sensor_correlation_matrix(&rows, variables))
    }

    /// Pairs of the configured variables correlated at least as strongly as the threshold
    ///
    /// # Errors
    /// Fails when either branch cannot be built.
    pub fn strong_pairs(&mut self) -> Result<Vec<(Variable, Variable, f64)>> {
        let matrix = self.correlation_matrix(&[])?;
        Ok(matrix.strong_pairs(self.config.correlation.strong_threshold))
    }

    /// Least squares fit of monthly admissions against `x`
    ///
    /// # Errors
    /// Fails when either branch cannot be built.
    pub fn regression(&mut self, x: Variable) -> Result<RegressionFit> {
        let merged = self.merged()?;
        Ok(correlation::linear_fit(&merged, x, Variable::AdmissionCount))
    }
}
