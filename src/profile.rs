//! Descriptive breakdowns of the admissions kept by an [`AdmissionScope`].
//!
//! [`AdmissionScope`]: crate::admissions::AdmissionScope

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use crate::admissions::HospitalAdmissionRecord;
use crate::math::mean_present;
use crate::period::{LabelFormat, YearMonth};
use crate::Error;

/// Age bands as `[lower, upper)` in years
pub const AGE_BANDS: [(u32, u32, &str); 7] = [
    (0, 5, "0-5"),
    (5, 12, "6-12"),
    (12, 18, "13-18"),
    (18, 30, "19-30"),
    (30, 50, "31-50"),
    (50, 65, "51-65"),
    (65, 100, "66+"),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdmissionSummary {
    pub admissions: usize,
    pub mean_age: Option<f64>,
    /// Deaths per hundred admissions
    pub mortality_rate: Option<f64>,
    pub mean_length_of_stay: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Decode the hospital information system sex code
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Male),
            3 => Some(Self::Female),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "1" => Ok(Self::Male),
            "female" | "f" | "3" => Ok(Self::Female),
            _ => Err(Error::UnknownName(s.to_owned())),
        }
    }
}

/// Restricts scoped admissions to some competence years, competence months and sexes.
///
/// A `None` constraint admits every value. A sex constraint drops records whose sex code is
/// unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdmissionFilter {
    pub years: Option<BTreeSet<i32>>,
    pub months: Option<BTreeSet<u32>>,
    pub sexes: Option<BTreeSet<Sex>>,
}

impl AdmissionFilter {
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

    #[must_use]
    pub fn with_sexes(mut self, sexes: impl IntoIterator<Item = Sex>) -> Self {
        self.sexes = Some(sexes.into_iter().collect());
        self
    }

    pub fn matches(&self, record: &HospitalAdmissionRecord) -> bool {
        self.years
            .as_ref()
            .map_or(true, |years| years.contains(&record.competence.year))
            && self
                .months
                .as_ref()
                .map_or(true, |months| months.contains(&record.competence.month))
            && self.sexes.as_ref().map_or(true, |sexes| {
                record
                    .sex
                    .and_then(Sex::from_code)
                    .is_some_and(|sex| sexes.contains(&sex))
            })
    }

    pub fn apply<'a>(
        &self,
        records: &[&'a HospitalAdmissionRecord],
    ) -> Vec<&'a HospitalAdmissionRecord> {
        records
            .iter()
            .copied()
            .filter(|record| self.matches(record))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosisCount {
    pub diagnosis: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyMortality {
    pub period: YearMonth,
    pub label: String,
    pub admissions: usize,
    pub deaths: usize,
    /// Deaths per hundred admissions
    pub rate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeathCause {
    pub diagnosis: String,
    pub deaths: usize,
    pub admissions: usize,
    /// Deaths per hundred admissions with this diagnosis
    pub rate: f64,
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64 * 100.0
}

pub fn summary(records: &[&HospitalAdmissionRecord]) -> AdmissionSummary {
    let died = records
        .iter()
        .map(|record| Some(if record.died { 1.0 } else { 0.0 }));

    AdmissionSummary {
        admissions: records.len(),
        mean_age: mean_present(records.iter().map(|r| r.age.map(f64::from))),
        mortality_rate: mean_present(died).map(|rate| rate * 100.0),
        mean_length_of_stay: mean_present(records.iter().map(|r| r.length_of_stay.map(f64::from))),
    }
}

/// Admissions per age band, every band listed; records without an age, or aged 100 and over,
/// fall in no band
pub fn age_bands(records: &[&HospitalAdmissionRecord]) -> Vec<(&'static str, usize)> {
    AGE_BANDS
        .iter()
        .map(|&(lower, upper, label)| {
            let count = records
                .iter()
                .filter_map(|record| record.age)
                .filter(|age| (lower..upper).contains(age))
                .count();
            (label, count)
        })
        .collect()
}

/// Admissions per decoded sex, omitting unknown codes
pub fn sex_distribution(records: &[&HospitalAdmissionRecord]) -> Vec<(Sex, usize)> {
    let mut counts: BTreeMap<Sex, usize> = BTreeMap::new();
    for sex in records
        .iter()
        .filter_map(|record| record.sex.and_then(Sex::from_code))
    {
        *counts.entry(sex).or_default() += 1;
    }
    counts.into_iter().collect()
}

// Counts per principal diagnosis, largest first, ties by code.
fn ranked_diagnoses<'a>(
    records: impl Iterator<Item = &'a HospitalAdmissionRecord>,
) -> Vec<DiagnosisCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for diagnosis in records.filter_map(|record| record.principal_diagnosis.as_deref()) {
        *counts.entry(diagnosis).or_default() += 1;
    }

    let mut ranked = counts
        .into_iter()
        .map(|(diagnosis, count)| DiagnosisCount {
            diagnosis: diagnosis.to_owned(),
            count,
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.diagnosis.cmp(&b.diagnosis)));
    ranked
}

/// The `n` most frequent principal diagnoses
pub fn top_diagnoses(records: &[&HospitalAdmissionRecord], n: usize) -> Vec<DiagnosisCount> {
    let mut ranked = ranked_diagnoses(records.iter().copied());
    ranked.truncate(n);
    ranked
}

/// Mortality per billing competence month
pub fn monthly_mortality(
    records: &[&HospitalAdmissionRecord],
    format: LabelFormat,
) -> Vec<MonthlyMortality> {
    let mut by_month: BTreeMap<YearMonth, (usize, usize)> = BTreeMap::new();
    for record in records {
        let (admissions, deaths) = by_month.entry(record.competence).or_default();
        *admissions += 1;
        if record.died {
            *deaths += 1;
        }
    }

    by_month
        .into_iter()
        .map(|(period, (admissions, deaths))| MonthlyMortality {
            period,
            label: period.label(format),
            admissions,
            deaths,
            rate: percentage(deaths, admissions),
        })
        .collect()
}

/// The `n` principal diagnoses with the most deaths, with the share of their admissions that died
pub fn top_death_causes(records: &[&HospitalAdmissionRecord], n: usize) -> Vec<DeathCause> {
    let admissions = ranked_diagnoses(records.iter().copied())
        .into_iter()
        .map(|ranked| (ranked.diagnosis, ranked.count))
        .collect::<HashMap<_, _>>();

    ranked_diagnoses(records.iter().copied().filter(|record| record.died))
        .into_iter()
        .take(n)
        .map(|ranked| {
            let total = admissions
                .get(&ranked.diagnosis)
                .copied()
                .unwrap_or(ranked.count);
            DeathCause {
                rate: percentage(ranked.count, total),
                deaths: ranked.count,
                admissions: total,
                diagnosis: ranked.diagnosis,
            }
        })
        .collect()
}

/// Every breakdown of one admission set
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionProfile {
    pub summary: AdmissionSummary,
    pub age_bands: Vec<(&'static str, usize)>,
    pub sexes: Vec<(Sex, usize)>,
    pub top_diagnoses: Vec<DiagnosisCount>,
    pub monthly_mortality: Vec<MonthlyMortality>,
    pub top_death_causes: Vec<DeathCause>,
}

impl AdmissionProfile {
    pub fn build(records: &[&HospitalAdmissionRecord], top: usize, format: LabelFormat) -> Self {
        Self {
            summary: summary(records),
            age_bands: age_bands(records),
            sexes: sex_distribution(records),
            top_diagnoses: top_diagnoses(records, top),
            monthly_mortality: monthly_mortality(records, format),
            top_death_causes: top_death_causes(records, top),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        age_bands, monthly_mortality, sex_distribution, summary, top_death_causes, top_diagnoses,
        AdmissionFilter, Sex,
    };
    use crate::admissions::test::admission;
    use crate::admissions::{HospitalAdmissionRecord, RIO_DE_JANEIRO};
    use crate::period::{LabelFormat, YearMonth};

    fn patient(age: u32, sex: u8, diagnosis: &str, died: bool) -> HospitalAdmissionRecord {
        let mut record = admission(RIO_DE_JANEIRO, 2017, 6, 1);
        record.age = Some(age);
        record.sex = Some(sex);
        record.principal_diagnosis = Some(diagnosis.to_owned());
        record.length_of_stay = Some(age / 10);
        record.died = died;
        record
    }

    fn cohort() -> Vec<HospitalAdmissionRecord> {
        vec![
            patient(3, 1, "J189", false),
            patient(4, 3, "J189", true),
            patient(40, 3, "J159", false),
            patient(70, 1, "J449", true),
            patient(70, 9, "J449", true),
            patient(105, 3, "J189", false),
        ]
    }

    #[test]
    fn summary_averages_present_values() {
        let records = cohort();
        let refs = records.iter().collect::<Vec<_>>();

        let summary = summary(&refs);

        assert_eq!(summary.admissions, 6);
        approx::assert_relative_eq!(summary.mean_age.unwrap(), 292.0 / 6.0);
        approx::assert_relative_eq!(summary.mortality_rate.unwrap(), 50.0);
        approx::assert_relative_eq!(summary.mean_length_of_stay.unwrap(), 28.0 / 6.0);
    }

    #[test]
    fn ages_fall_into_left_closed_bands() {
        let records = cohort();
        let refs = records.iter().collect::<Vec<_>>();

        let bands = age_bands(&refs);

        assert_eq!(bands.len(), 7);
        assert_eq!(bands[0], ("0-5", 2));
        assert_eq!(bands[4], ("31-50", 1));
        assert_eq!(bands[6], ("66+", 2));
        assert_eq!(bands.iter().map(|(_, count)| count).sum::<usize>(), 5);
    }

    #[test]
    fn unknown_sex_codes_are_ignored() {
        let records = cohort();
        let refs = records.iter().collect::<Vec<_>>();

        assert_eq!(
            sex_distribution(&refs),
            vec![(Sex::Male, 2), (Sex::Female, 3)]
        );
    }

    #[test]
    fn diagnoses_rank_by_count_then_code() {
        let records = cohort();
        let refs = records.iter().collect::<Vec<_>>();

        let top = top_diagnoses(&refs, 2);

        assert_eq!(top.len(), 2);
        assert_eq!((top[0].diagnosis.as_str(), top[0].count), ("J189", 3));
        assert_eq!((top[1].diagnosis.as_str(), top[1].count), ("J449", 2));
    }

    #[test]
    fn death_causes_carry_their_mortality_rate() {
        let records = cohort();
        let refs = records.iter().collect::<Vec<_>>();

        let causes = top_death_causes(&refs, 10);

        assert_eq!(causes.len(), 2);
        assert_eq!(causes[0].diagnosis, "J449");
        assert_eq!((causes[0].deaths, causes[0].admissions), (2, 2));
        approx::assert_relative_eq!(causes[0].rate, 100.0);
        assert_eq!(causes[1].diagnosis, "J189");
        approx::assert_relative_eq!(causes[1].rate, 100.0 / 3.0);
    }

    #[test]
    fn mortality_is_grouped_by_competence_month() {
        let mut records = cohort();
        records[0].competence = YearMonth::new(2017, 7);
        let refs = records.iter().collect::<Vec<_>>();

        let mortality = monthly_mortality(&refs, LabelFormat::Unpadded);

        assert_eq!(mortality.len(), 2);
        assert_eq!(mortality[0].label, "2017-6");
        assert_eq!((mortality[0].admissions, mortality[0].deaths), (5, 3));
        approx::assert_relative_eq!(mortality[0].rate, 60.0);
        approx::assert_relative_eq!(mortality[1].rate, 0.0);
    }

    #[test]
    fn empty_admissions_have_no_statistics() {
        let summary = summary(&[]);
        assert_eq!(summary.admissions, 0);
        assert_eq!(summary.mean_age, None);
        assert_eq!(summary.mortality_rate, None);
        assert!(top_death_causes(&[], 5).is_empty());
    }

    #[test]
    fn filter_narrows_by_competence_and_sex() {
        let mut records = cohort();
        records[5].competence = YearMonth::new(2018, 1);
        let refs = records.iter().collect::<Vec<_>>();

        let women = AdmissionFilter::default().with_sexes([Sex::Female]).apply(&refs);
        assert_eq!(women.len(), 3);
        approx::assert_relative_eq!(summary(&women).mortality_rate.unwrap(), 100.0 / 3.0);

        let june_2017_women = AdmissionFilter::default()
            .with_years([2017])
            .with_months([6])
            .with_sexes([Sex::Female])
            .apply(&refs);
        assert_eq!(june_2017_women.len(), 2);

        // the unknown sex code only survives an unconstrained filter
        assert_eq!(AdmissionFilter::default().apply(&refs).len(), 6);
        let known = AdmissionFilter::default()
            .with_sexes([Sex::Male, Sex::Female])
            .apply(&refs);
        assert_eq!(known.len(), 5);
    }

    #[test]
    fn sex_parses_from_labels_and_codes() {
        assert_eq!("female".parse::<Sex>().ok(), Some(Sex::Female));
        assert_eq!("1".parse::<Sex>().ok(), Some(Sex::Male));
        assert!("9".parse::<Sex>().is_err());
    }
}
