//! Cell-level cleaning and coercion. Nothing in here fails: values that do
//! not coerce fall back to their cleaned text (dates) or to absent (ratings).

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::models::RawValue;

pub const DISPLAY_DATE_FORMAT: &str = "%d %B %Y";

const FILENAME_RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

const NO_RATING_MARKERS: [&str; 3] = ["", "0", "None"];
const NO_COMMENT_MARKERS: [&str; 4] = ["", "0", "-", "None"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
];

// Serial 2958465 is 31 December 9999 in the 1900 date system.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Flattens any whitespace (tabs, non-breaking spaces, newlines) to single
/// spaces and trims the ends.
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text form of a raw cell before cleaning.
pub fn raw_to_text(value: &RawValue) -> String {
    match value {
        RawValue::Empty => String::new(),
        RawValue::Text(text) => text.clone(),
        RawValue::Int(number) => number.to_string(),
        RawValue::Float(number) => float_to_text(*number),
        RawValue::Bool(true) => "True".to_string(),
        RawValue::Bool(false) => "False".to_string(),
        RawValue::DateTime(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

pub fn clean_value(value: &RawValue) -> String {
    clean_text(&raw_to_text(value))
}

fn float_to_text(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Formats a session date as `DD Month YYYY`. Unparseable input comes back as
/// its cleaned text; missing input comes back empty.
pub fn format_date(value: &RawValue) -> String {
    match value {
        RawValue::Empty => String::new(),
        RawValue::DateTime(datetime) => datetime.format(DISPLAY_DATE_FORMAT).to_string(),
        RawValue::Int(serial) => excel_serial_to_date(*serial as f64)
            .map(|date| date.format(DISPLAY_DATE_FORMAT).to_string())
            .unwrap_or_else(|| clean_value(value)),
        RawValue::Float(serial) => excel_serial_to_date(*serial)
            .map(|date| date.format(DISPLAY_DATE_FORMAT).to_string())
            .unwrap_or_else(|| clean_value(value)),
        RawValue::Text(_) | RawValue::Bool(_) => {
            let text = clean_value(value);
            parse_date_text(&text)
                .map(|date| date.format(DISPLAY_DATE_FORMAT).to_string())
                .unwrap_or(text)
        }
    }
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let days = serial.floor() as i64;
    // Serial 60 is the phantom 29 February 1900. Serials after it are one
    // day ahead of the calendar, so they count from 1899-12-30.
    let epoch = match days {
        60 => return None,
        1..=59 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    epoch.checked_add_signed(Duration::days(days))
}

/// Replaces characters that are not allowed in file names with `_`. Names
/// made only of dots would resolve to `.` or `..`, so they become `_` too.
pub fn safe_filename(value: &str) -> String {
    let cleaned: String = clean_text(value)
        .chars()
        .map(|ch| if FILENAME_RESERVED.contains(&ch) { '_' } else { ch })
        .collect();
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else if cleaned.chars().all(|ch| ch == '.') {
        "_".repeat(cleaned.len())
    } else {
        cleaned
    }
}

/// Coerces cleaned rating text to a number. Placeholder markers and anything
/// that is not a finite number are treated as no rating.
pub fn parse_rating(text: &str) -> Option<f64> {
    if NO_RATING_MARKERS.contains(&text) {
        return None;
    }
    text.parse::<f64>().ok().filter(|rating| rating.is_finite())
}

pub fn is_no_comment(text: &str) -> bool {
    NO_COMMENT_MARKERS.contains(&text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_flattens_whitespace() {
        assert_eq!(clean_text("  Great\tsession\u{a0}\u{a0}overall \n"), "Great session overall");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn clean_text_is_idempotent() {
        let samples = ["a\u{a0} b", "\t\tx\t", "plain", "  multi   space  ", "line\r\nbreak"];
        for sample in samples {
            let once = clean_text(sample);
            assert_eq!(clean_text(&once), once);
        }
    }

    #[test]
    fn floats_with_integral_values_drop_the_fraction() {
        assert_eq!(clean_value(&RawValue::Float(12.0)), "12");
        assert_eq!(clean_value(&RawValue::Float(4.5)), "4.5");
        assert_eq!(clean_value(&RawValue::Int(7)), "7");
        assert_eq!(clean_value(&RawValue::Empty), "");
    }

    #[test]
    fn formats_native_and_text_dates() {
        let datetime = NaiveDate::from_ymd_opt(2025, 3, 5)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid datetime");
        assert_eq!(format_date(&RawValue::DateTime(datetime)), "05 March 2025");
        assert_eq!(format_date(&RawValue::Text("2025-03-05".into())), "05 March 2025");
        assert_eq!(format_date(&RawValue::Text("2025-03-05 10:30:00".into())), "05 March 2025");
        assert_eq!(format_date(&RawValue::Text("03/05/2025".into())), "05 March 2025");
        assert_eq!(format_date(&RawValue::Text("5 Mar 2025".into())), "05 March 2025");
    }

    #[test]
    fn formats_excel_serial_dates() {
        assert_eq!(format_date(&RawValue::Float(45721.0)), "05 March 2025");
        assert_eq!(format_date(&RawValue::Int(45721)), "05 March 2025");
    }

    #[test]
    fn early_1900_serials_skip_the_phantom_leap_day() {
        assert_eq!(format_date(&RawValue::Int(1)), "01 January 1900");
        assert_eq!(format_date(&RawValue::Int(59)), "28 February 1900");
        assert_eq!(format_date(&RawValue::Int(60)), "60");
        assert_eq!(format_date(&RawValue::Int(61)), "01 March 1900");
    }

    #[test]
    fn unparseable_dates_fall_back_to_clean_text() {
        assert_eq!(format_date(&RawValue::Text("  next  week ".into())), "next week");
        assert_eq!(format_date(&RawValue::Text("None".into())), "None");
        assert_eq!(format_date(&RawValue::Empty), "");
        assert_eq!(format_date(&RawValue::Text("   ".into())), "");
        assert_eq!(format_date(&RawValue::Float(-3.0)), "-3");
    }

    #[test]
    fn safe_filename_replaces_reserved_characters() {
        assert_eq!(safe_filename("Data/Science: Intro?"), "Data_Science_ Intro_");
        assert_eq!(safe_filename("a\\b*c\"d<e>f|g"), "a_b_c_d_e_f_g");
        assert_eq!(safe_filename("   "), "Unknown");
    }

    #[test]
    fn dot_only_names_cannot_escape_their_folder() {
        assert_eq!(safe_filename(".."), "__");
        assert_eq!(safe_filename(" . "), "_");
        assert_eq!(safe_filename("v1.2"), "v1.2");
    }

    #[test]
    fn ratings_respect_placeholder_markers() {
        assert_eq!(parse_rating("4.5"), Some(4.5));
        assert_eq!(parse_rating("5"), Some(5.0));
        assert_eq!(parse_rating("0"), None);
        assert_eq!(parse_rating("None"), None);
        assert_eq!(parse_rating(""), None);
        assert_eq!(parse_rating("excellent"), None);
        assert_eq!(parse_rating("NaN"), None);
        assert_eq!(parse_rating("inf"), None);
    }

    #[test]
    fn no_comment_markers_are_exact() {
        for marker in ["", "0", "-", "None"] {
            assert!(is_no_comment(marker), "{marker:?} should count as no comment");
        }
        assert!(!is_no_comment("none"));
        assert!(!is_no_comment("More examples please"));
    }
}
