use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::period::{LabelFormat, YearMonth};

/// IBGE code of the municipality of Rio de Janeiro
pub const RIO_DE_JANEIRO: u32 = 330_455;

/// Earliest admission date kept for aggregation
pub const DEFAULT_START_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2012, 1, 1) {
    Some(date) => date,
    None => panic!("invalid start date"),
};

/// One hospital admission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HospitalAdmissionRecord {
    pub municipality_code: u32,
    /// Billing competence, which can lag the admission date
    pub competence: YearMonth,
    pub residence_code: Option<u32>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<u8>,
    pub admission_date: NaiveDate,
    pub discharge_date: Option<NaiveDate>,
    pub principal_diagnosis: Option<String>,
    pub secondary_diagnosis: Option<String>,
    pub age: Option<u32>,
    pub length_of_stay: Option<u32>,
    pub died: bool,
}

impl HospitalAdmissionRecord {
    pub fn admission_period(&self) -> YearMonth {
        YearMonth::of(&self.admission_date)
    }
}

/// Admissions per calendar month of admission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonthlyAdmissionCount {
    pub period: YearMonth,
    pub count: usize,
    pub label: String,
}

impl MonthlyAdmissionCount {
    pub fn year(&self) -> i32 {
        self.period.year
    }

    pub fn month(&self) -> u32 {
        self.period.month
    }
}

/// Which records take part in the admission tables
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionScope {
    pub municipality_code: u32,
    pub start_date: NaiveDate,
}

impl AdmissionScope {
    pub const fn new(municipality_code: u32) -> Self {
        Self {
            municipality_code,
            start_date: DEFAULT_START_DATE,
        }
    }

    #[must_use]
    pub const fn starting(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn contains(&self, record: &HospitalAdmissionRecord) -> bool {
        record.municipality_code == self.municipality_code
            && record.admission_date >= self.start_date
    }

    /// Records of the scoped municipality admitted on or after the start date
    pub fn retain<'a>(
        &self,
        records: &'a [HospitalAdmissionRecord],
    ) -> Vec<&'a HospitalAdmissionRecord> {
        let retained = records
            .iter()
            .filter(|record| self.contains(record))
            .collect::<Vec<_>>();
        tracing::debug!(
            municipality = self.municipality_code,
            start = %self.start_date,
            total = records.len(),
            retained = retained.len(),
            "scoped admission records"
        );
        retained
    }

    /// Count retained admissions per month of the admission date, ordered by period.
    ///
    /// Every retained record counts, whatever its other fields hold.
    pub fn aggregate_monthly(
        &self,
        records: &[HospitalAdmissionRecord],
        format: LabelFormat,
    ) -> Vec<MonthlyAdmissionCount> {
        let mut counts: BTreeMap<YearMonth, usize> = BTreeMap::new();
        for record in self.retain(records) {
            *counts.entry(record.admission_period()).or_default() += 1;
        }

        counts
            .into_iter()
            .map(|(period, count)| MonthlyAdmissionCount {
                period,
                count,
                label: period.label(format),
            })
            .collect()
    }
}

/// Monthly admission counts for one municipality from 2012 onwards, with unpadded labels
pub fn aggregate_monthly(
    records: &[HospitalAdmissionRecord],
    municipality_code: u32,
) -> Vec<MonthlyAdmissionCount> {
    AdmissionScope::new(municipality_code).aggregate_monthly(records, LabelFormat::Unpadded)
}

#[cfg(test)]
pub(crate) mod test {
    use chrono::NaiveDate;

    use super::{aggregate_monthly, AdmissionScope, HospitalAdmissionRecord, RIO_DE_JANEIRO};
    use crate::period::{LabelFormat, YearMonth};

    pub(crate) fn admission(municipality_code: u32, year: i32, month: u32, day: u32) -> HospitalAdmissionRecord {
        let admission_date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        HospitalAdmissionRecord {
            municipality_code,
            competence: YearMonth::new(year, month),
            residence_code: Some(municipality_code),
            birth_date: None,
            sex: None,
            admission_date,
            discharge_date: None,
            principal_diagnosis: None,
            secondary_diagnosis: None,
            age: None,
            length_of_stay: None,
            died: false,
        }
    }

    #[test]
    fn admissions_are_counted_per_month() {
        let mut records = (1..=5)
            .map(|day| admission(RIO_DE_JANEIRO, 2015, 3, day))
            .collect::<Vec<_>>();
        records.push(admission(RIO_DE_JANEIRO, 2015, 4, 2));
        records.push(admission(RIO_DE_JANEIRO, 2015, 4, 9));

        let monthly = aggregate_monthly(&records, RIO_DE_JANEIRO);

        assert_eq!(monthly.len(), 2);
        assert_eq!((monthly[0].year(), monthly[0].month(), monthly[0].count), (2015, 3, 5));
        assert_eq!((monthly[1].year(), monthly[1].month(), monthly[1].count), (2015, 4, 2));
        assert_eq!(monthly[0].label, "2015-3");
    }

    #[test]
    fn other_municipalities_never_appear() {
        let records = vec![
            admission(RIO_DE_JANEIRO, 2016, 7, 1),
            admission(330_490, 2016, 7, 1),
            admission(330_490, 2016, 8, 1),
        ];

        let monthly = aggregate_monthly(&records, RIO_DE_JANEIRO);

        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].count, 1);
    }

    #[test]
    fn admissions_before_the_start_date_are_dropped() {
        let records = vec![
            admission(RIO_DE_JANEIRO, 2011, 12, 31),
            admission(RIO_DE_JANEIRO, 2012, 1, 1),
        ];

        let monthly = aggregate_monthly(&records, RIO_DE_JANEIRO);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].period, YearMonth::new(2012, 1));

        let later = AdmissionScope::new(RIO_DE_JANEIRO)
            .starting(NaiveDate::from_ymd_opt(2013, 1, 1).unwrap())
            .aggregate_monthly(&records, LabelFormat::Unpadded);
        assert!(later.is_empty());
    }

    #[test]
    fn bucketing_follows_the_admission_date_not_the_competence() {
        let mut record = admission(RIO_DE_JANEIRO, 2014, 1, 30);
        record.competence = YearMonth::new(2014, 3);

        let monthly = aggregate_monthly(&[record], RIO_DE_JANEIRO);
        assert_eq!(monthly[0].period, YearMonth::new(2014, 1));
    }

    #[test]
    fn incomplete_records_still_count() {
        let mut complete = admission(RIO_DE_JANEIRO, 2018, 5, 3);
        complete.principal_diagnosis = Some("J189".into());
        complete.age = Some(70);
        let sparse = admission(RIO_DE_JANEIRO, 2018, 5, 4);

        let monthly = aggregate_monthly(&[complete, sparse], RIO_DE_JANEIRO);
        assert_eq!(monthly[0].count, 2);
    }

    #[test]
    fn labels_follow_the_requested_format() {
        let records = vec![admission(RIO_DE_JANEIRO, 2019, 2, 1)];
        let padded = AdmissionScope::new(RIO_DE_JANEIRO)
            .aggregate_monthly(&records, LabelFormat::ZeroPadded);
        assert_eq!(padded[0].label, "2019-02");
    }
}
