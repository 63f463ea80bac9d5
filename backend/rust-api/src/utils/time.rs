use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Calendar days are evaluated in UTC.
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn calendar_day_boundary_is_midnight_utc() {
        let late = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        assert!(!same_calendar_day(late, early));
        assert!(same_calendar_day(early, early + chrono::Duration::hours(23)));
    }

    #[test]
    fn bson_conversion_keeps_millis() {
        let dt = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(chrono_to_bson(dt).timestamp_millis(), 1_700_000_000_123);
    }
}
