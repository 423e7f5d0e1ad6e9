use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date layouts in priority order. The first one that parses wins, so a string that fits
/// several layouts resolves to the earliest.
pub const DATE_FORMATS: [&str; 8] = [
    "%B %d, %Y",
    "%b %d, %Y",
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%b %d %Y",
];

pub const DEFAULT_HOUR: u32 = 19;

pub fn normalize_timestamp(date_str: &str, time_str: Option<&str>) -> Option<String> {
    let date = parse_date(date_str)?;
    let time = match time_str.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => parse_time(text)?,
        None => NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?,
    };

    Some(format_canonical(NaiveDateTime::new(date, time)))
}

pub fn format_canonical(value: NaiveDateTime) -> String {
    value.format(CANONICAL_FORMAT).to_string()
}

pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

pub fn parse_time(time_str: &str) -> Option<NaiveTime> {
    let upper = time_str.trim().to_uppercase();
    let is_pm = upper.contains("PM");
    let is_am = upper.contains("AM");

    let (mut hour, minute) = if is_pm || is_am {
        let digits: String = upper
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ':')
            .collect();
        split_clock(&digits)?
    } else {
        split_clock(&upper)?
    };

    if is_pm && hour != 12 {
        hour = hour.checked_add(12)?;
    } else if is_am && !is_pm && hour == 12 {
        hour = 0;
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn split_clock(text: &str) -> Option<(u32, u32)> {
    if text.contains(':') {
        let mut parts = text.split(':');
        let hour = parts.next()?.trim().parse().ok()?;
        let minute = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((hour, minute))
    } else {
        Some((text.trim().parse().ok()?, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_month_with_twelve_hour_time() {
        assert_eq!(
            normalize_timestamp("January 15, 2024", Some("7:00 PM")).as_deref(),
            Some("2024-01-15 19:00:00")
        );
    }

    #[test]
    fn iso_date_defaults_to_seven_pm() {
        assert_eq!(
            normalize_timestamp("2024-01-15", None).as_deref(),
            Some("2024-01-15 19:00:00")
        );
        assert_eq!(
            normalize_timestamp("2024-01-15", Some("  ")).as_deref(),
            Some("2024-01-15 19:00:00")
        );
    }

    #[test]
    fn abbreviated_month_with_24_hour_time() {
        assert_eq!(
            normalize_timestamp("Jan 15, 2024", Some("19:00")).as_deref(),
            Some("2024-01-15 19:00:00")
        );
    }

    #[test]
    fn every_supported_layout_parses() {
        let cases = [
            "January 15, 2024",
            "Jan 15, 2024",
            "01/15/2024",
            "2024-01-15",
            "15 January 2024",
            "15 Jan 2024",
            "January 15 2024",
            "Jan 15 2024",
        ];
        for case in cases {
            assert_eq!(
                normalize_timestamp(case, Some("8:30 am")).as_deref(),
                Some("2024-01-15 08:30:00"),
                "{case}"
            );
        }
    }

    #[test]
    fn noon_and_midnight_conversions() {
        assert_eq!(
            normalize_timestamp("2024-03-01", Some("12 PM")).as_deref(),
            Some("2024-03-01 12:00:00")
        );
        assert_eq!(
            normalize_timestamp("2024-03-01", Some("12:15 am")).as_deref(),
            Some("2024-03-01 00:15:00")
        );
        assert_eq!(
            normalize_timestamp("2024-03-01", Some("Doors 6pm")).as_deref(),
            Some("2024-03-01 18:00:00")
        );
        assert_eq!(
            normalize_timestamp("2024-03-01", Some("9")).as_deref(),
            Some("2024-03-01 09:00:00")
        );
    }

    #[test]
    fn unsupported_input_is_absent() {
        assert_eq!(normalize_timestamp("yesterday", None), None);
        assert_eq!(normalize_timestamp("", Some("7:00 PM")), None);
        assert_eq!(normalize_timestamp("2024-01-15", Some("soon")), None);
        assert_eq!(normalize_timestamp("2024-01-15", Some("25:00")), None);
        assert_eq!(normalize_timestamp("2024-01-15", Some("7:00:00 PM")), None);
        assert_eq!(normalize_timestamp("2024-02-30", None), None);
    }

    #[test]
    fn oversized_pm_hour_is_absent() {
        assert_eq!(normalize_timestamp("2024-01-15", Some("4294967290 PM")), None);
        assert_eq!(normalize_timestamp("2024-01-15", Some("4294967295:00 pm")), None);
        assert_eq!(normalize_timestamp("2024-01-15", Some("13 PM")), None);
    }
}
