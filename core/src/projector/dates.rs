use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Layout shown in the table and compared by the date filter.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";
/// Layout used by the date edit control.
pub const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";
/// 24-hour clock, minute precision.
pub const DISPLAY_TIME_FORMAT: &str = "%H:%M";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("'{value}' is not a valid {layout} date")]
pub struct DateFormatError {
    pub value: String,
    pub layout: &'static str,
}

pub fn display_date(timestamp: &DateTime<Utc>, zone: &FixedOffset) -> String {
    timestamp
        .with_timezone(zone)
        .format(DISPLAY_DATE_FORMAT)
        .to_string()
}

pub fn display_time(timestamp: &DateTime<Utc>, zone: &FixedOffset) -> String {
    timestamp
        .with_timezone(zone)
        .format(DISPLAY_TIME_FORMAT)
        .to_string()
}

/// `YYYY-MM-DD` to `DD/MM/YYYY`. Empty input stays empty.
pub fn input_to_display_date(input: &str) -> Result<String, DateFormatError> {
    convert(input, INPUT_DATE_FORMAT, DISPLAY_DATE_FORMAT, "YYYY-MM-DD")
}

/// `DD/MM/YYYY` to `YYYY-MM-DD`. Empty input stays empty.
pub fn display_to_input_date(display: &str) -> Result<String, DateFormatError> {
    convert(display, DISPLAY_DATE_FORMAT, INPUT_DATE_FORMAT, "DD/MM/YYYY")
}

fn convert(
    value: &str,
    from: &str,
    to: &str,
    layout: &'static str,
) -> Result<String, DateFormatError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    NaiveDate::parse_from_str(trimmed, from)
        .map(|date| date.format(to).to_string())
        .map_err(|_| DateFormatError {
            value: value.to_string(),
            layout,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, TimeZone};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn display_fields_follow_viewer_zone() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 23, 30, 0).unwrap();
        assert_eq!(display_date(&ts, &utc()), "05/03/2024");
        assert_eq!(display_time(&ts, &utc()), "23:30");

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(display_date(&ts, &plus_two), "06/03/2024");
        assert_eq!(display_time(&ts, &plus_two), "01:30");
    }

    #[test]
    fn input_and_display_forms_convert() {
        assert_eq!(input_to_display_date("2024-03-05").unwrap(), "05/03/2024");
        assert_eq!(display_to_input_date("05/03/2024").unwrap(), "2024-03-05");
        assert_eq!(input_to_display_date("").unwrap(), "");
        assert_eq!(display_to_input_date("").unwrap(), "");
    }

    #[test]
    fn invalid_dates_are_rejected() {
        assert!(input_to_display_date("2023-02-29").is_err());
        assert!(display_to_input_date("31/04/2024").is_err());
        assert!(input_to_display_date("05/03/2024").is_err());
    }

    #[test]
    fn display_date_round_trips_across_calendar() {
        let mut day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        while day.year() < 2025 {
            let display = day.format(DISPLAY_DATE_FORMAT).to_string();
            let input = display_to_input_date(&display).unwrap();
            assert_eq!(input_to_display_date(&input).unwrap(), display);
            day += Duration::days(1);
        }
    }
}
