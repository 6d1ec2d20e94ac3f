//! Epoch-second encoding for dates and datetimes.
//!
//! Only whole seconds are stored. Sub-second precision is discarded on
//! encode so that the same instant always produces the same wire value.
//! Timestamps are interpreted as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Seconds since the UNIX epoch for midnight (UTC) of `date`.
pub fn date_to_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Seconds since the UNIX epoch for `datetime`, truncated to whole seconds.
pub fn datetime_to_epoch(datetime: NaiveDateTime) -> i64 {
    datetime.and_utc().timestamp()
}

/// Calendar date (UTC) of an epoch-second timestamp.
///
/// Returns `None` when the timestamp is outside chrono's representable range.
pub fn date_from_epoch(secs: i64) -> Option<NaiveDate> {
    datetime_from_epoch(secs).map(|dt| dt.date())
}

/// Datetime (UTC) of an epoch-second timestamp.
pub fn datetime_from_epoch(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_encodes_to_midnight() {
        let date = NaiveDate::from_ymd_opt(2016, 3, 2).unwrap();
        assert_eq!(date_to_epoch(date), 1_456_876_800);
        assert_eq!(date_from_epoch(1_456_876_800), Some(date));
    }

    #[test]
    fn datetime_drops_sub_second_precision() {
        let base = NaiveDate::from_ymd_opt(2016, 3, 3)
            .unwrap()
            .and_hms_opt(12, 20, 30)
            .unwrap();
        let with_micros = NaiveDate::from_ymd_opt(2016, 3, 3)
            .unwrap()
            .and_hms_micro_opt(12, 20, 30, 2)
            .unwrap();
        assert_eq!(datetime_to_epoch(base), datetime_to_epoch(with_micros));
        assert_eq!(datetime_from_epoch(datetime_to_epoch(with_micros)), Some(base));
    }

    #[test]
    fn epoch_zero() {
        let epoch = datetime_from_epoch(0).unwrap();
        assert_eq!(epoch.to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn out_of_range_timestamp_is_none() {
        assert!(datetime_from_epoch(i64::MAX).is_none());
        assert!(date_from_epoch(i64::MIN).is_none());
    }
}
