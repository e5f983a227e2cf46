use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Calendar day used to bucket daily metrics.
///
/// Always derived from a UTC timestamp so the record key, the display string, and the
/// timestamps written alongside them agree on what "today" is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD`, used as the record identifier.
    pub fn key(&self) -> String {
        format!("{:04}{:02}{:02}", self.0.year(), self.0.month(), self.0.day())
    }

    /// `YYYY-MM-DD`, stored in the record's `date` field.
    pub fn display_date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.0.year(), self.0.month(), self.0.day())
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
