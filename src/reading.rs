use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::field::Measurements;
use crate::period::YearMonth;
use crate::station::Station;

/// An hourly measurement at one station
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    pub station: Station,
    pub timestamp: NaiveDateTime,
    pub values: Measurements,
}

impl SensorReading {
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }

    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }

    pub fn period(&self) -> YearMonth {
        YearMonth::of(&self.timestamp)
    }
}
