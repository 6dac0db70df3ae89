use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use itertools::Itertools;

use crate::field::{Field, Measurements};
use crate::math::mean_present;
use crate::period::YearMonth;
use crate::reading::SensorReading;
use crate::station::Station;

/// Mean of every field over one station's readings on one calendar day
#[derive(Clone, Debug, PartialEq)]
pub struct DailyStationAggregate {
    pub station: Station,
    pub day: NaiveDate,
    pub values: Measurements,
}

impl DailyStationAggregate {
    pub fn year(&self) -> i32 {
        self.day.year()
    }

    pub fn month(&self) -> u32 {
        self.day.month()
    }

    pub fn period(&self) -> YearMonth {
        YearMonth::of(&self.day)
    }
}

// Field-wise mean over a group, a field missing from every member stays missing.
fn mean_of<'a>(group: impl Iterator<Item = &'a Measurements> + Clone) -> Measurements {
    let mut means = Measurements::default();
    for field in Field::ALL {
        means.set(field, mean_present(group.clone().map(|m| m.get(field))));
    }
    means
}

/// Average hourly readings into one row per `(station, day)`.
///
/// Rows are ordered by station name, then by day. Missing values are left out of each mean,
/// so a field that is missing for the whole day is missing in the aggregate rather than zero.
pub fn aggregate_daily(readings: &[SensorReading]) -> Vec<DailyStationAggregate> {
    let groups = readings
        .iter()
        .sorted_by_key(|reading| (reading.station, reading.day()))
        .group_by(|reading| (reading.station, reading.day()));

    let aggregates = groups
        .into_iter()
        .map(|((station, day), group)| {
            let members = group.map(|reading| &reading.values).collect::<Vec<_>>();
            DailyStationAggregate {
                station,
                day,
                values: mean_of(members.into_iter()),
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        readings = readings.len(),
        aggregates = aggregates.len(),
        "aggregated station readings by day"
    );
    aggregates
}

/// Restricts daily aggregates to a set of stations, years and months.
///
/// A `None` constraint admits every value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DailyFilter {
    pub stations: Option<BTreeSet<Station>>,
    pub years: Option<BTreeSet<i32>>,
    pub months: Option<BTreeSet<u32>>,
}

impl DailyFilter {
    #[must_use]
    pub fn with_stations(mut self, stations: impl IntoIterator<Item = Station>) -> Self {
        self.stations = Some(stations.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.years = Some(years.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_months(mut self, months: impl IntoIterator<Item = u32>) -> Self {
        self.months = Some(months.into_iter().collect());
        self
    }

    pub fn matches(&self, row: &DailyStationAggregate) -> bool {
        self.stations
            .as_ref()
            .map_or(true, |stations| stations.contains(&row.station))
            && self
                .years
                .as_ref()
                .map_or(true, |years| years.contains(&row.year()))
            && self
                .months
                .as_ref()
                .map_or(true, |months| months.contains(&row.month()))
    }
}

pub fn filter_daily(
    rows: &[DailyStationAggregate],
    filter: &DailyFilter,
) -> Vec<DailyStationAggregate> {
    rows.iter().filter(|row| filter.matches(row)).cloned().collect()
}

/// City-wide mean for one day across every reporting station
#[derive(Clone, Debug, PartialEq)]
pub struct CityDailyAggregate {
    pub day: NaiveDate,
    pub values: Measurements,
}

/// Average the station-day aggregates of each day into a single city series, ordered by day
pub fn city_daily_mean(rows: &[DailyStationAggregate]) -> Vec<CityDailyAggregate> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&Measurements>> = BTreeMap::new();
    for row in rows {
        by_day.entry(row.day).or_default().push(&row.values);
    }

    by_day
        .into_iter()
        .map(|(day, members)| CityDailyAggregate {
            day,
            values: mean_of(members.into_iter()),
        })
        .collect()
}

/// Spread of one field at one station over the selected days
#[derive(Clone, Debug, PartialEq)]
pub struct StationSummary {
    pub station: Station,
    pub field: Field,
    /// Days with a value for `field`
    pub days: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Compare stations on one field, highest mean first.
///
/// A station whose field is missing on every day is still listed, after the others, with no
/// statistics.
pub fn station_summary(rows: &[DailyStationAggregate], field: Field) -> Vec<StationSummary> {
    let mut by_station: BTreeMap<Station, Vec<f64>> = BTreeMap::new();
    for row in rows {
        let values = by_station.entry(row.station).or_default();
        if let Some(value) = row.values.get(field) {
            values.push(value);
        }
    }

    let mut summaries = by_station
        .into_iter()
        .map(|(station, values)| StationSummary {
            station,
            field,
            days: values.len(),
            mean: mean_present(values.iter().copied().map(Some)),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
        })
        .collect::<Vec<_>>();

    summaries.sort_by(|a, b| match (a.mean, b.mean) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    summaries
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use ndarray_rand::rand::{Rng, SeedableRng};
    use rand_isaac::isaac64::Isaac64Rng;

    use super::{aggregate_daily, city_daily_mean, filter_daily, station_summary, DailyFilter};
    use crate::field::{Field, Measurements};
    use crate::reading::SensorReading;
    use crate::station::Station;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn reading(station: Station, timestamp: NaiveDateTime, values: Measurements) -> SensorReading {
        SensorReading {
            station,
            timestamp,
            values,
        }
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(aggregate_daily(&[]).is_empty());
        assert!(city_daily_mean(&[]).is_empty());
    }

    #[test]
    fn daily_means_skip_missing_values() {
        let readings = vec![
            reading(
                Station::Tijuca,
                at(1, 0),
                Measurements::default().with(Field::Pm10, 10.0),
            ),
            reading(
                Station::Tijuca,
                at(1, 1),
                Measurements::default()
                    .with(Field::Pm10, 20.0)
                    .with(Field::O3, 5.0),
            ),
            reading(Station::Tijuca, at(1, 2), Measurements::default()),
        ];

        let daily = aggregate_daily(&readings);

        assert_eq!(daily.len(), 1);
        approx::assert_relative_eq!(daily[0].values.get(Field::Pm10).unwrap(), 15.0);
        approx::assert_relative_eq!(daily[0].values.get(Field::O3).unwrap(), 5.0);
        assert_eq!(daily[0].values.get(Field::Co), None);
    }

    #[test]
    fn rows_are_grouped_by_station_and_day_in_sorted_order() {
        let values = Measurements::default().with(Field::Temperature, 25.0);
        let readings = vec![
            reading(Station::Tijuca, at(2, 3), values),
            reading(Station::Bangu, at(2, 5), values),
            reading(Station::Tijuca, at(1, 3), values),
            reading(Station::Bangu, at(2, 6), values),
        ];

        let keys = aggregate_daily(&readings)
            .into_iter()
            .map(|row| (row.station, row.day))
            .collect::<Vec<_>>();

        assert_eq!(
            keys,
            vec![
                (Station::Bangu, at(2, 0).date()),
                (Station::Tijuca, at(1, 0).date()),
                (Station::Tijuca, at(2, 0).date()),
            ]
        );
    }

    #[test]
    fn daily_mean_equals_mean_of_present_hourly_values() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);

        let mut readings = vec![];
        let mut expected = vec![];
        for hour in 0..24 {
            let mut values = Measurements::default();
            if rng.gen_bool(0.7) {
                let value = rng.gen_range(0.0..80.0);
                values.set(Field::Nox, Some(value));
                expected.push(value);
            }
            readings.push(reading(Station::Centro, at(9, hour), values));
        }

        let daily = aggregate_daily(&readings);
        #[allow(clippy::cast_precision_loss)]
        let mean = expected.iter().sum::<f64>() / expected.len() as f64;
        approx::assert_relative_eq!(
            daily[0].values.get(Field::Nox).unwrap(),
            mean,
            max_relative = 1e-12
        );
    }

    #[test]
    fn filters_constrain_station_year_and_month() {
        let values = Measurements::default().with(Field::Humidity, 80.0);
        let readings = vec![
            reading(Station::Bangu, at(1, 0), values),
            reading(Station::Iraja, at(1, 0), values),
            reading(
                Station::Iraja,
                NaiveDate::from_ymd_opt(2016, 3, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                values,
            ),
        ];
        let daily = aggregate_daily(&readings);

        let filter = DailyFilter::default()
            .with_stations([Station::Iraja])
            .with_years([2015])
            .with_months([3]);
        let filtered = filter_daily(&daily, &filter);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].station, Station::Iraja);
        assert_eq!(filtered[0].year(), 2015);
        assert_eq!(filter_daily(&daily, &DailyFilter::default()).len(), 3);
    }

    #[test]
    fn city_mean_averages_stations_reporting_each_day() {
        let readings = vec![
            reading(
                Station::Bangu,
                at(1, 0),
                Measurements::default().with(Field::Pm25, 10.0),
            ),
            reading(
                Station::Centro,
                at(1, 0),
                Measurements::default().with(Field::Pm25, 30.0),
            ),
            reading(Station::Tijuca, at(1, 0), Measurements::default()),
        ];

        let city = city_daily_mean(&aggregate_daily(&readings));

        assert_eq!(city.len(), 1);
        approx::assert_relative_eq!(city[0].values.get(Field::Pm25).unwrap(), 20.0);
    }

    #[test]
    fn stations_are_ranked_by_mean_with_missing_last() {
        let readings = vec![
            reading(
                Station::Bangu,
                at(1, 0),
                Measurements::default().with(Field::So2, 2.0),
            ),
            reading(
                Station::Bangu,
                at(2, 0),
                Measurements::default().with(Field::So2, 6.0),
            ),
            reading(
                Station::Centro,
                at(1, 0),
                Measurements::default().with(Field::So2, 9.0),
            ),
            reading(Station::Copacabana, at(1, 0), Measurements::default()),
        ];

        let summary = station_summary(&aggregate_daily(&readings), Field::So2);

        let order = summary.iter().map(|s| s.station).collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![Station::Centro, Station::Bangu, Station::Copacabana]
        );
        assert_eq!(summary[1].days, 2);
        assert_eq!(summary[1].min, Some(2.0));
        assert_eq!(summary[1].max, Some(6.0));
        approx::assert_relative_eq!(summary[1].mean.unwrap(), 4.0);
        assert_eq!(summary[2].mean, None);
    }
}
