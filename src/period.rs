use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Calendar month used as the join key between pollutant and admission tables
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub const fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Render the `<year>-<month>` label used on chart axes.
    ///
    /// ```
    /// use airhealth::period::{LabelFormat, YearMonth};
    ///
    /// let period = YearMonth::new(2015, 3);
    /// assert_eq!(period.label(LabelFormat::Unpadded), "2015-3");
    /// assert_eq!(period.label(LabelFormat::ZeroPadded), "2015-03");
    /// ```
    pub fn label(self, format: LabelFormat) -> String {
        match format {
            LabelFormat::Unpadded => format!("{}-{}", self.year, self.month),
            LabelFormat::ZeroPadded => format!("{}-{:02}", self.year, self.month),
        }
    }
}

/// How the month is rendered in a `year-month` label.
///
/// Historical outputs concatenate the month without padding, so `2015-3` and `2015-10` do not
/// sort lexically. Both renderings are kept so downstream consumers can choose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFormat {
    #[default]
    Unpadded,
    ZeroPadded,
}
