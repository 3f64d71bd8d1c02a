use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Server wall-clock time. Schedules and stored timestamps share this
/// representation.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn today() -> NaiveDate {
    now().date()
}

/// Parses a requested return time. Full date-times are taken as-is; a bare
/// `HH:MM` is placed on `reference`'s date, or the next day if that moment has
/// already passed.
pub fn parse_return_time(raw: &str, reference: NaiveDateTime) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    let time = NaiveTime::parse_from_str(raw, "%H:%M").ok()?;
    let candidate = reference.date().and_time(time);
    if candidate > reference {
        Some(candidate)
    } else {
        reference.date().succ_opt().map(|d| d.and_time(time))
    }
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap()
    }

    #[test]
    fn full_datetimes_parse() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        assert_eq!(parse_return_time("2025-03-10T14:00:00", reference()), Some(expected));
        assert_eq!(parse_return_time("2025-03-10 14:00", reference()), Some(expected));
    }

    #[test]
    fn bare_time_lands_on_next_occurrence() {
        let later = parse_return_time("14:00", reference()).unwrap();
        assert_eq!(later.date(), reference().date());

        let tomorrow = parse_return_time("07:00", reference()).unwrap();
        assert_eq!(tomorrow.date(), reference().date().succ_opt().unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_return_time("soon", reference()), None);
        assert_eq!(parse_return_time("", reference()), None);
    }

    #[test]
    fn month_bounds_handle_lengths() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2025, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        assert!(month_bounds(2025, 13).is_none());
        assert!(month_bounds(2025, 0).is_none());
    }
}
