// src/utils/date.rs

//! Publication date parsing for BIP notices.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::text::fold_lowercase;

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[./-](\d{1,2})[./-](\d{4})\b").expect("valid day-first pattern")
});

static YEAR_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})[./-](\d{1,2})[./-](\d{1,2})\b").expect("valid year-first pattern")
});

// Applied to diacritic-folded lowercase text.
static MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2})\s+(stycznia|lutego|marca|kwietnia|maja|czerwca|lipca|sierpnia|wrzesnia|pazdziernika|listopada|grudnia)\s+(\d{4})\b",
    )
    .expect("valid month-name pattern")
});

const MONTHS: [&str; 12] = [
    "stycznia",
    "lutego",
    "marca",
    "kwietnia",
    "maja",
    "czerwca",
    "lipca",
    "sierpnia",
    "wrzesnia",
    "pazdziernika",
    "listopada",
    "grudnia",
];

const MIN_YEAR: i32 = 1990;
const MAX_YEAR: i32 = 2100;

fn make_date(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Find the first valid date in free text.
///
/// Recognises `DD.MM.YYYY` (also `-` and `/`), `YYYY-MM-DD` (also `.` and
/// `/`) and `15 stycznia 2026`. When several dates appear, the leftmost valid
/// one wins. Impossible dates (`31.02.2025`) are skipped.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let folded = fold_lowercase(text);
    let mut found: Vec<(usize, NaiveDate)> = Vec::new();

    for caps in DAY_FIRST.captures_iter(&folded) {
        let month = caps[2].parse().ok();
        if let Some(date) = month.and_then(|m| make_date(&caps[3], m, &caps[1])) {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
            break;
        }
    }

    for caps in YEAR_FIRST.captures_iter(&folded) {
        let month = caps[2].parse().ok();
        if let Some(date) = month.and_then(|m| make_date(&caps[1], m, &caps[3])) {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
            break;
        }
    }

    for caps in MONTH_NAME.captures_iter(&folded) {
        let month = MONTHS
            .iter()
            .position(|name| *name == &caps[2])
            .map(|idx| idx as u32 + 1);
        if let Some(date) = month.and_then(|m| make_date(&caps[3], m, &caps[1])) {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
            break;
        }
    }

    found.into_iter().min_by_key(|(pos, _)| *pos).map(|(_, d)| d)
}
