//! Relative date resolution for the `calculate_date` tool.

use chrono::{Days, FixedOffset, NaiveDate, Utc};

/// Offset of the zone callers live in (UTC+9).
pub const CALL_ZONE_OFFSET_SECS: i32 = 9 * 3600;

const MAX_DAYS_AHEAD: u64 = 365;

/// Longer terms first so that "day after tomorrow" wins over "tomorrow".
const TERMS: &[(&str, u64)] = &[
    ("day after tomorrow", 2),
    ("next week", 7),
    ("tomorrow", 1),
    ("today", 0),
    ("あさって", 2),
    ("明後日", 2),
    ("来週", 7),
    ("明日", 1),
    ("今日", 0),
];

/// Today's date in the call zone.
pub fn today_in_call_zone() -> NaiveDate {
    match FixedOffset::east_opt(CALL_ZONE_OFFSET_SECS) {
        Some(zone) => Utc::now().with_timezone(&zone).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Resolves a relative expression against `today`.
///
/// Returns `None` when nothing in the expression is recognised.
pub fn resolve_relative_date(expression: &str, today: NaiveDate) -> Option<NaiveDate> {
    let offset = day_offset(expression)?;
    today.checked_add_days(Days::new(offset))
}

fn day_offset(expression: &str) -> Option<u64> {
    let normalized: String = expression
        .trim()
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect::<String>()
        .to_lowercase();

    if let Some(days) = days_later(&normalized).or_else(|| in_days(&normalized)) {
        return (days <= MAX_DAYS_AHEAD).then_some(days);
    }

    TERMS
        .iter()
        .filter(|(term, _)| normalized.contains(term))
        .max_by_key(|(term, _)| term.chars().count())
        .map(|(_, days)| *days)
}

/// `N日後`
fn days_later(s: &str) -> Option<u64> {
    let idx = s.find("日後")?;
    let digits: Vec<char> = s[..idx]
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.iter().rev().collect::<String>().parse().ok()
}

/// `in N days`
fn in_days(s: &str) -> Option<u64> {
    let words: Vec<&str> = s.split_whitespace().collect();
    words.windows(3).find_map(|w| {
        if w[0] == "in" && w[2].starts_with("day") {
            w[1].parse().ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn japanese_terms() {
        let today = day(2026, 3, 30);
        assert_eq!(resolve_relative_date("明日", today), Some(day(2026, 3, 31)));
        assert_eq!(resolve_relative_date("明後日の午後", today), Some(day(2026, 4, 1)));
        assert_eq!(resolve_relative_date("あさって", today), Some(day(2026, 4, 1)));
        assert_eq!(resolve_relative_date("来週", today), Some(day(2026, 4, 6)));
        assert_eq!(resolve_relative_date("今日", today), Some(today));
    }

    #[test]
    fn english_terms_prefer_longest_match() {
        let today = day(2026, 12, 31);
        assert_eq!(
            resolve_relative_date("the day after tomorrow", today),
            Some(day(2027, 1, 2))
        );
        assert_eq!(resolve_relative_date("Tomorrow", today), Some(day(2027, 1, 1)));
        assert_eq!(resolve_relative_date("next week", today), Some(day(2027, 1, 7)));
    }

    #[test]
    fn numeric_offsets() {
        let today = day(2026, 1, 1);
        assert_eq!(resolve_relative_date("3日後", today), Some(day(2026, 1, 4)));
        assert_eq!(resolve_relative_date("１０日後", today), Some(day(2026, 1, 11)));
        assert_eq!(resolve_relative_date("in 2 days", today), Some(day(2026, 1, 3)));
        assert_eq!(resolve_relative_date("400日後", today), None);
    }

    #[test]
    fn unrecognised_expressions_fail() {
        let today = day(2026, 1, 1);
        assert_eq!(resolve_relative_date("someday", today), None);
        assert_eq!(resolve_relative_date("", today), None);
        assert_eq!(resolve_relative_date("日後", today), None);
    }
}
