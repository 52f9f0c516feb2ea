//! Rule-based request understanding
//!
//! Pulls a date, a start time and a length out of free text with regular
//! expressions. Used by [`GuidedAssistant`](crate::GuidedAssistant) when no
//! model is configured.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::error::Result;
use crate::intent::RawIntent;

pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// Longer lengths are clamped; the validator rejects them with a clear message
const MAX_EXTRACTED_MINUTES: i64 = 7 * 24 * 60;

const MONTHS: &str = "january|jan|february|feb|march|mar|april|apr|may|june|jun|july|jul|\
                      august|aug|september|sept|sep|october|oct|november|nov|december|dec";

/// What the user is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Book,
    CheckAvailability,
    Other,
}

/// Date, time and length found in one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration: Duration,
}

impl Extraction {
    /// Start of the slot, when both date and time were found
    pub fn start(&self) -> Option<NaiveDateTime> {
        Some(self.date?.and_time(self.time?))
    }

    /// A naive-time intent, read later in the user's zone
    pub fn to_intent(&self) -> Option<RawIntent> {
        let start = self.start()?;
        let end = start.checked_add_signed(self.duration)?;
        Some(RawIntent::new(
            start.format("%Y-%m-%dT%H:%M").to_string(),
            end.format("%Y-%m-%dT%H:%M").to_string(),
        ))
    }
}

pub struct RuleExtractor {
    day_month: Regex,
    month_day: Regex,
    iso_date: Regex,
    clock_12h: Regex,
    clock_24h: Regex,
    oclock: Regex,
    duration: Regex,
    half_hour: Regex,
    one_hour: Regex,
}

impl RuleExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            day_month: Regex::new(&format!(
                r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s*(?:of\s+)?({})\b",
                MONTHS
            ))?,
            month_day: Regex::new(&format!(
                r"\b({})\.?\s*(\d{{1,2}})(?:st|nd|rd|th)?\b",
                MONTHS
            ))?,
            iso_date: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b")?,
            clock_12h: Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\b\.?")?,
            clock_24h: Regex::new(r"\b(\d{1,2}):(\d{2})\b")?,
            oclock: Regex::new(r"\b(\d{1,2})\s*o'?\s?clock\b")?,
            duration: Regex::new(
                r"\b(\d+(?:\.\d+)?)\s*-?\s*(hours?|hrs?|minutes?|mins?)\b",
            )?,
            half_hour: Regex::new(r"\bhalf\s*(?:an\s+)?-?\s*hour\b")?,
            one_hour: Regex::new(r"\b(?:an|one)\s+hour\b")?,
        })
    }

    /// Extract date, time and duration; `today` anchors relative dates
    pub fn extract(&self, text: &str, today: NaiveDate) -> Extraction {
        let text = text.to_lowercase();
        Extraction {
            date: self.date(&text, today),
            time: self.time(&text),
            duration: self.duration(&text),
        }
    }

    fn date(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        if has_word(text, &["tomorrow"]) {
            return today.succ_opt();
        }
        if has_word(text, &["today", "tonight"]) {
            return Some(today);
        }

        if let Some(caps) = self.iso_date.captures(text) {
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let day = caps[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }

        let (month, day) = if let Some(caps) = self.day_month.captures(text) {
            (month_number(&caps[2])?, caps[1].parse::<u32>().ok()?)
        } else if let Some(caps) = self.month_day.captures(text) {
            (month_number(&caps[1])?, caps[2].parse::<u32>().ok()?)
        } else {
            return None;
        };

        // a date already behind us this year means next year
        let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if this_year < today {
            NaiveDate::from_ymd_opt(today.year() + 1, month, day)
        } else {
            Some(this_year)
        }
    }

    fn time(&self, text: &str) -> Option<NaiveTime> {
        if let Some(caps) = self.clock_12h.captures(text) {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
            if !(1..=12).contains(&hour) {
                return None;
            }
            let hour = match (&caps[3], hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                (_, 12) => 12,
                (_, h) => h + 12,
            };
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }

        if let Some(caps) = self.clock_24h.captures(text) {
            let hour = caps[1].parse().ok()?;
            let minute = caps[2].parse().ok()?;
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }

        if let Some(caps) = self.oclock.captures(text) {
            return NaiveTime::from_hms_opt(caps[1].parse().ok()?, 0, 0);
        }

        if has_word(text, &["noon", "midday"]) {
            return NaiveTime::from_hms_opt(12, 0, 0);
        }

        None
    }

    fn duration(&self, text: &str) -> Duration {
        if self.half_hour.is_match(text) {
            return Duration::minutes(30);
        }

        if let Some(caps) = self.duration.captures(text) {
            if let Ok(amount) = caps[1].parse::<f64>() {
                let minutes = if caps[2].starts_with('h') {
                    amount * 60.0
                } else {
                    amount
                };
                let minutes = minutes.round().min(MAX_EXTRACTED_MINUTES as f64) as i64;
                if let Some(duration) = Duration::try_minutes(minutes).filter(|_| minutes > 0) {
                    return duration;
                }
            }
        }

        if self.one_hour.is_match(text) {
            return Duration::minutes(60);
        }

        Duration::minutes(DEFAULT_DURATION_MINUTES)
    }
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Whole-word match against any of `words` (case-insensitive)
pub fn has_word(text: &str, words: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|token| words.iter().any(|w| token.eq_ignore_ascii_case(w)))
}

/// Route a message by keyword
pub fn classify(text: &str) -> RequestKind {
    let lower = text.to_lowercase();
    let mentions = |stems: &[&str]| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| stems.iter().any(|s| token.starts_with(s)))
    };

    if mentions(&["book", "schedul", "appointment", "meeting", "reserv"]) {
        RequestKind::Book
    } else if mentions(&["available", "availability", "free", "check", "open"]) {
        RequestKind::CheckAvailability
    } else {
        RequestKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 7, 1).unwrap()
    }

    fn extract(text: &str) -> Extraction {
        RuleExtractor::new().unwrap().extract(text, today())
    }

    fn hm(hour: u32, minute: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(hour, minute, 0)
    }

    #[test]
    fn test_relative_dates() {
        assert_eq!(extract("tomorrow at 5 pm").date, NaiveDate::from_ymd_opt(2030, 7, 2));
        assert_eq!(extract("Today 10am").date, Some(today()));
    }

    #[test]
    fn test_month_dates() {
        let july_8 = NaiveDate::from_ymd_opt(2030, 7, 8);
        assert_eq!(extract("Book July 8th at 5:00 PM").date, july_8);
        assert_eq!(extract("on 8th of july").date, july_8);
        assert_eq!(extract("8 jul, 3pm").date, july_8);
        assert_eq!(extract("sept 14").date, NaiveDate::from_ymd_opt(2030, 9, 14));
        // already past this year
        assert_eq!(extract("march 3 at 9am").date, NaiveDate::from_ymd_opt(2031, 3, 3));
        assert_eq!(extract("2030-12-24 at 10:00").date, NaiveDate::from_ymd_opt(2030, 12, 24));
        assert_eq!(extract("may I book something").date, None);
        assert_eq!(extract("february 30").date, None);
    }

    #[test]
    fn test_times() {
        assert_eq!(extract("at 5 PM").time, hm(17, 0));
        assert_eq!(extract("at 5:30 pm").time, hm(17, 30));
        assert_eq!(extract("at 9:15am").time, hm(9, 15));
        assert_eq!(extract("12 am").time, hm(0, 0));
        assert_eq!(extract("12pm").time, hm(12, 0));
        assert_eq!(extract("at 17:30").time, hm(17, 30));
        assert_eq!(extract("at 5 o'clock").time, hm(5, 0));
        assert_eq!(extract("around noon").time, hm(12, 0));
        assert_eq!(extract("at 25:00").time, None);
        assert_eq!(extract("sometime soon").time, None);
    }

    #[test]
    fn test_durations() {
        let minutes = |text: &str| extract(text).duration.num_minutes();
        assert_eq!(minutes("for 30 min"), 30);
        assert_eq!(minutes("a 90-minute session"), 90);
        assert_eq!(minutes("for 1.5 hours"), 90);
        assert_eq!(minutes("2 hours please"), 120);
        assert_eq!(minutes("half an hour"), 30);
        assert_eq!(minutes("for an hour"), 60);
        assert_eq!(minutes("at 5:30 pm"), DEFAULT_DURATION_MINUTES);
    }

    #[test]
    fn test_to_intent() {
        let e = extract("Book an appointment on July 8th at 5:00 PM for 30 minutes");
        let intent = e.to_intent().unwrap();
        assert_eq!(intent.start, "2030-07-08T17:00");
        assert_eq!(intent.end, "2030-07-08T17:30");

        assert!(extract("book something at 5pm").to_intent().is_none());
    }

    #[test]
    fn test_huge_duration_is_clamped() {
        let e = extract("book tomorrow at 5pm for 999999999999 minutes");
        assert_eq!(e.duration.num_minutes(), MAX_EXTRACTED_MINUTES);
        let intent = e.to_intent().unwrap();
        assert_eq!(intent.end, "2030-07-09T17:00");

        let hours = extract("for 99999999999999999999 hours");
        assert_eq!(hours.duration.num_minutes(), MAX_EXTRACTED_MINUTES);
    }

    #[test]
    fn test_to_intent_out_of_range_end() {
        let e = Extraction {
            date: Some(NaiveDate::MAX),
            time: hm(23, 0),
            duration: Duration::minutes(DEFAULT_DURATION_MINUTES),
        };
        assert!(e.to_intent().is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Can you book a dentist visit?"), RequestKind::Book);
        assert_eq!(classify("Schedule a call"), RequestKind::Book);
        assert_eq!(classify("Am I free tomorrow at 3pm?"), RequestKind::CheckAvailability);
        assert_eq!(classify("hello there"), RequestKind::Other);
    }

    #[test]
    fn test_has_word() {
        assert!(has_word("Yes, please", &["yes"]));
        assert!(!has_word("I know", &["no"]));
        assert!(has_word("no thanks", &["no"]));
    }
}
