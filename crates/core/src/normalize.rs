//! Input normalizers.
//!
//! Pure functions that turn a speech transcription into a typed field value.
//! `None` always means "ask the same question again"; no normalizer substitutes
//! a default for something it could not parse.

use crate::steps::{Field, FieldValue};
use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})(?:[:.](\d{1,2}))?").expect("valid time pattern"));

static INTEGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid integer pattern"));

static ISO_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid ISO pattern"));

static NUMERIC_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/\-](\d{1,2})(?:[/\-](\d{4}|\d{2}))?\b").expect("valid date pattern")
});

static SPOKEN_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2})\s+(?:di\s+)?(gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre)(?:\s+(\d{4}))?\b",
    )
    .expect("valid spoken date pattern")
});

const MONTHS: [&str; 12] = [
    "gennaio",
    "febbraio",
    "marzo",
    "aprile",
    "maggio",
    "giugno",
    "luglio",
    "agosto",
    "settembre",
    "ottobre",
    "novembre",
    "dicembre",
];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("lunedi", Weekday::Mon),
    ("martedi", Weekday::Tue),
    ("mercoledi", Weekday::Wed),
    ("giovedi", Weekday::Thu),
    ("venerdi", Weekday::Fri),
    ("sabato", Weekday::Sat),
    ("domenica", Weekday::Sun),
];

const NUMBER_WORDS: [(&str, u32); 21] = [
    ("uno", 1),
    ("una", 1),
    ("due", 2),
    ("tre", 3),
    ("quattro", 4),
    ("cinque", 5),
    ("sei", 6),
    ("sette", 7),
    ("otto", 8),
    ("nove", 9),
    ("dieci", 10),
    ("undici", 11),
    ("dodici", 12),
    ("tredici", 13),
    ("quattordici", 14),
    ("quindici", 15),
    ("sedici", 16),
    ("diciassette", 17),
    ("diciotto", 18),
    ("diciannove", 19),
    ("venti", 20),
];

/// Runs the normalizer for `field` against a raw utterance.
///
/// `today` anchors relative date expressions such as "domani".
pub fn normalize(field: Field, utterance: &str, today: NaiveDate) -> Option<FieldValue> {
    match field {
        Field::Name => normalize_name(utterance).map(FieldValue::Name),
        Field::Date => normalize_date(utterance, today).map(FieldValue::Date),
        Field::Time => normalize_time(utterance).map(FieldValue::Time),
        Field::PartySize => normalize_people(utterance).map(FieldValue::PartySize),
        Field::ContactNumber => normalize_contact(utterance).map(FieldValue::ContactNumber),
    }
}

pub fn normalize_name(utterance: &str) -> Option<String> {
    let name = utterance.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Extracts the first `H[:MM]` / `HH[.MM]` pattern as a 24-hour `HH:MM` clock time.
pub fn normalize_time(utterance: &str) -> Option<String> {
    let caps = TIME_PATTERN.captures(utterance)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(time.format("%H:%M").to_string())
}

/// Extracts a positive party size, from digits first and Italian number words second.
pub fn normalize_people(utterance: &str) -> Option<u32> {
    let count = match INTEGER_PATTERN.find(utterance) {
        Some(digits) => digits.as_str().parse::<u32>().ok()?,
        None => number_word(utterance)?,
    };
    (count > 0).then_some(count)
}

/// Keeps digits and a single leading `+`.
pub fn normalize_contact(utterance: &str) -> Option<String> {
    let trimmed = utterance.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

/// Parses a free-form Italian date expression relative to `today`.
pub fn normalize_date(utterance: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = fold_accents(&utterance.trim().to_lowercase());
    if text.is_empty() {
        return None;
    }

    // Only the first explicit form present is tried; one that names an
    // impossible date still leaves the relative words a chance.
    let explicit = if let Some(caps) = ISO_DATE_PATTERN.captures(&text) {
        iso_date(&caps)
    } else if let Some(caps) = NUMERIC_DATE_PATTERN.captures(&text) {
        numeric_date(&caps, today)
    } else if let Some(caps) = SPOKEN_DATE_PATTERN.captures(&text) {
        spoken_date(&caps, today)
    } else {
        None
    };
    explicit.or_else(|| relative_date(&text, today))
}

fn iso_date(caps: &Captures<'_>) -> Option<NaiveDate> {
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn numeric_date(caps: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = match caps.get(3) {
        Some(y) if y.as_str().len() == 2 => Some(2000 + y.as_str().parse::<i32>().ok()?),
        Some(y) => Some(y.as_str().parse().ok()?),
        None => None,
    };
    resolve_day_month(day, month, year, today)
}

fn spoken_date(caps: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let day = caps[1].parse().ok()?;
    let month = MONTHS.iter().position(|m| *m == &caps[2])? as u32 + 1;
    let year = match caps.get(3) {
        Some(y) => Some(y.as_str().parse().ok()?),
        None => None,
    };
    resolve_day_month(day, month, year, today)
}

/// `oggi`, `domani`, `dopodomani` or a weekday name.
fn relative_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let relative = |word: &str| match word {
        "oggi" | "stasera" => Some(0),
        "domani" => Some(1),
        "dopodomani" => Some(2),
        _ => None,
    };
    if let Some(offset) = words.iter().find_map(|w| relative(w)) {
        return today.checked_add_days(Days::new(offset));
    }

    let weekday = words
        .iter()
        .find_map(|w| WEEKDAYS.iter().find(|(name, _)| name == w).map(|(_, d)| *d))?;
    next_weekday(today, weekday)
}

/// Builds a date from day and month; without a year, a day already past rolls to next year.
fn resolve_day_month(day: u32, month: u32, year: Option<i32>, today: NaiveDate) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

/// Next occurrence of `weekday` strictly after `today`.
fn next_weekday(today: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let current = today.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let ahead = (target + 7 - current) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today.checked_add_days(Days::new(u64::from(ahead)))
}

fn number_word(utterance: &str) -> Option<u32> {
    let text = utterance.to_lowercase();
    text.split(|c: char| !c.is_alphabetic())
        .find_map(|word| NUMBER_WORDS.iter().find(|(w, _)| *w == word).map(|(_, n)| *n))
}

fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'à' | 'á' => 'a',
            'è' | 'é' => 'e',
            'ì' | 'í' => 'i',
            'ò' | 'ó' => 'o',
            'ù' | 'ú' => 'u',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        // A Monday.
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_name_is_trimmed_and_empty_rejected() {
        assert_eq!(normalize_name("  Mario Rossi "), Some("Mario Rossi".to_string()));
        assert_eq!(normalize_name("   "), None);
        assert_eq!(normalize_name(""), None);
    }

    #[test]
    fn test_time_pads_hour_and_minute() {
        assert_eq!(normalize_time("19.5"), Some("19:05".to_string()));
        assert_eq!(normalize_time("20:30"), Some("20:30".to_string()));
        assert_eq!(normalize_time("alle 8"), Some("08:00".to_string()));
        assert_eq!(normalize_time("verso le 21.15 circa"), Some("21:15".to_string()));
    }

    #[test]
    fn test_time_outside_the_clock_is_rejected() {
        assert_eq!(normalize_time("25:00"), None);
        assert_eq!(normalize_time("19:75"), None);
        assert_eq!(normalize_time("19.75"), None);
        assert_eq!(normalize_time("alle 24"), None);
        assert_eq!(normalize_time("00:00"), Some("00:00".to_string()));
        assert_eq!(normalize_time("23.59"), Some("23:59".to_string()));
    }

    #[test]
    fn test_time_without_digits_is_rejected() {
        assert_eq!(normalize_time("stasera tardi"), None);
        assert_eq!(normalize_time(""), None);
    }

    #[test]
    fn test_people_reads_digits_first() {
        assert_eq!(normalize_people("per 4 persone"), Some(4));
        assert_eq!(normalize_people("12"), Some(12));
    }

    #[test]
    fn test_people_falls_back_to_number_words() {
        assert_eq!(normalize_people("due"), Some(2));
        assert_eq!(normalize_people("Saremo in Sei"), Some(6));
    }

    #[test]
    fn test_people_rejects_zero_and_garbage() {
        assert_eq!(normalize_people("0"), None);
        assert_eq!(normalize_people("tanti"), None);
        assert_eq!(normalize_people("99999999999999999999"), None);
    }

    #[test]
    fn test_contact_keeps_digits_and_leading_plus() {
        assert_eq!(
            normalize_contact("+39 333 1234567"),
            Some("+393331234567".to_string())
        );
        assert_eq!(normalize_contact("333-123 45 67"), Some("3331234567".to_string()));
        assert_eq!(normalize_contact("39+333"), Some("39333".to_string()));
    }

    #[test]
    fn test_contact_without_digits_is_rejected() {
        assert_eq!(normalize_contact("non lo so"), None);
        assert_eq!(normalize_contact("+"), None);
    }

    #[test]
    fn test_date_relative_words() {
        assert_eq!(normalize_date("oggi", today()), Some(today()));
        assert_eq!(normalize_date("domani", today()), Some(date(2026, 10, 20)));
        assert_eq!(normalize_date("Dopodomani sera", today()), Some(date(2026, 10, 21)));
    }

    #[test]
    fn test_date_weekday_is_never_today() {
        assert_eq!(normalize_date("venerdì", today()), Some(date(2026, 10, 23)));
        assert_eq!(normalize_date("lunedi", today()), Some(date(2026, 10, 26)));
    }

    #[test]
    fn test_date_explicit_forms() {
        assert_eq!(normalize_date("2026-12-24", today()), Some(date(2026, 12, 24)));
        assert_eq!(normalize_date("24/12", today()), Some(date(2026, 12, 24)));
        assert_eq!(normalize_date("24/12/27", today()), Some(date(2027, 12, 24)));
        assert_eq!(normalize_date("il 12 maggio", today()), Some(date(2027, 5, 12)));
        assert_eq!(
            normalize_date("sabato 31 ottobre 2026", today()),
            Some(date(2026, 10, 31))
        );
    }

    #[test]
    fn test_date_ignores_a_time_mentioned_alongside() {
        assert_eq!(normalize_date("domani alle 9.10", today()), Some(date(2026, 10, 20)));
        assert_eq!(normalize_date("domani alle 20.30", today()), Some(date(2026, 10, 20)));
        assert_eq!(normalize_date("venerdi alle 20:30", today()), Some(date(2026, 10, 23)));
    }

    #[test]
    fn test_impossible_explicit_date_falls_back_to_words() {
        assert_eq!(normalize_date("domani, non il 31/02", today()), Some(date(2026, 10, 20)));
        assert_eq!(normalize_date("2026-13-05", today()), None);
    }

    #[test]
    fn test_date_rejects_unparseable_input() {
        assert_eq!(normalize_date("non capisco", today()), None);
        assert_eq!(normalize_date("31/02", today()), None);
        assert_eq!(normalize_date("", today()), None);
    }

    #[test]
    fn test_normalize_dispatches_by_field() {
        assert_eq!(
            normalize(Field::PartySize, "due", today()),
            Some(FieldValue::PartySize(2))
        );
        assert_eq!(
            normalize(Field::Date, "domani", today()),
            Some(FieldValue::Date(date(2026, 10, 20)))
        );
        assert_eq!(normalize(Field::Time, "boh", today()), None);
    }
}
