//! Natural-language replies for workflow outcomes

use cb_calendar::TimeInterval;
use chrono_tz::Tz;

use crate::error::IntentError;
use crate::request::BookingResult;

/// `Monday, March 4, 2030, 10:00 AM to 10:30 AM IST`
pub fn format_interval(interval: &TimeInterval, tz: Tz) -> String {
    let start = interval.start().with_timezone(&tz);
    let end = interval.end().with_timezone(&tz);

    if start.date_naive() == end.date_naive() {
        format!(
            "{}, {} to {} {}",
            start.format("%A, %B %-d, %Y"),
            start.format("%-I:%M %p"),
            end.format("%-I:%M %p"),
            start.format("%Z")
        )
    } else {
        format!(
            "{} to {} {}",
            start.format("%A, %B %-d, %Y, %-I:%M %p"),
            end.format("%A, %B %-d, %Y, %-I:%M %p"),
            start.format("%Z")
        )
    }
}

pub fn render_result(result: &BookingResult, tz: Tz) -> String {
    match result {
        BookingResult::Confirmed {
            interval,
            title,
            html_link,
            ..
        } => {
            let mut reply = format!(
                "Done! \"{}\" is booked for {}.",
                title,
                format_interval(interval, tz)
            );
            if let Some(link) = html_link {
                reply.push_str(&format!("\nView it in your calendar: {}", link));
            }
            reply
        }
        BookingResult::Conflict { alternatives } if alternatives.is_empty() => {
            "Sorry, that time is not available, and I couldn't find a free slot of the same \
             length nearby. Could you suggest another day?"
                .to_string()
        }
        BookingResult::Conflict { alternatives } => {
            let mut reply = "Sorry, that time is not available. These slots are free:".to_string();
            for (i, slot) in alternatives.iter().enumerate() {
                reply.push_str(&format!("\n  {}. {}", i + 1, format_interval(slot, tz)));
            }
            reply.push_str("\nWould any of these work?");
            reply
        }
        BookingResult::Failed { .. } => {
            "Sorry, I couldn't reach the calendar to complete that. Please try again later."
                .to_string()
        }
    }
}

pub fn render_intent_error(error: &IntentError) -> String {
    format!(
        "I couldn't use that request: {}. Could you give me the date, time and length again?",
        error.message()
    )
}
