//! Rule-based assistant
//!
//! Used when no model is configured. The dialogue runs the same way every
//! time: the request is checked, a free slot asks for a title, the title asks
//! for a yes/no confirmation, and only a "yes" runs the booking workflow.

use std::sync::Arc;

use async_trait::async_trait;
use cb_calendar::CalendarClient;
use cb_core::Message;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::adapter::Assistant;
use crate::error::Result;
use crate::intent::IntentValidator;
use crate::render::{format_interval, render_intent_error, render_result};
use crate::request::{BookingRequest, BookingResult};
use crate::rules::{classify, has_word, RequestKind, RuleExtractor};
use crate::tools::Clock;
use crate::workflow::BookingWorkflow;

const YES: &[&str] = &["yes", "y", "yeah", "yep", "sure", "ok", "okay", "confirm"];
const NO: &[&str] = &["no", "n", "nope", "cancel", "stop"];

const NEED_DATE_AND_TIME: &str = "I need the date and time. For example: \
    'Book an appointment on July 8th at 5:00 PM for 1 hour'.";
const CANCELLED: &str = "Booking cancelled. How else can I help you?";
const CALENDAR_UNAVAILABLE: &str =
    "I'm having trouble reaching the calendar. Please try again later.";
const HELP: &str = "I can book appointments and check your availability. \
    Try 'Book a meeting tomorrow at 3 PM for 30 minutes' or 'Am I free on July 8th at 10am?'.";

#[derive(Debug, Default)]
enum Pending {
    #[default]
    Nothing,
    Title(BookingRequest),
    Confirmation(BookingRequest),
}

/// Deterministic booking dialogue without a model
pub struct GuidedAssistant<C: CalendarClient + ?Sized> {
    workflow: Arc<BookingWorkflow<C>>,
    validator: Arc<IntentValidator>,
    extractor: RuleExtractor,
    pending: Pending,
    history: Vec<Message>,
    clock: Clock,
}

impl<C: CalendarClient + ?Sized + 'static> GuidedAssistant<C> {
    pub fn new(workflow: Arc<BookingWorkflow<C>>, validator: Arc<IntentValidator>) -> Result<Self> {
        Ok(Self {
            workflow,
            validator,
            extractor: RuleExtractor::new()?,
            pending: Pending::Nothing,
            history: Vec::new(),
            clock: Arc::new(Utc::now),
        })
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn handle(&mut self, turn: &str, now: DateTime<Utc>) -> String {
        match std::mem::take(&mut self.pending) {
            Pending::Confirmation(request) => {
                if has_word(turn, NO) {
                    return CANCELLED.to_string();
                }
                // a new date or time wins over any "yes" in the same message
                if self.looks_like_new_request(turn, now) {
                    debug!("Dropping pending booking for a new request");
                } else if has_word(turn, YES) {
                    return self.book(&request, now).await;
                } else {
                    let reply = format!(
                        "Should I book \"{}\" for {}? Please answer yes or no.",
                        request.title,
                        self.when(&request)
                    );
                    self.pending = Pending::Confirmation(request);
                    return reply;
                }
            }
            Pending::Title(mut request) => {
                if has_word(turn, NO) {
                    return CANCELLED.to_string();
                }
                let title = turn.trim();
                if !title.is_empty() {
                    request.title = title.to_string();
                }
                let reply = self.confirmation(&request);
                self.pending = Pending::Confirmation(request);
                return reply;
            }
            Pending::Nothing => {}
        }

        match classify(turn) {
            RequestKind::Book => self.handle_booking(turn, now).await,
            RequestKind::CheckAvailability => self.handle_check(turn, now).await,
            RequestKind::Other => HELP.to_string(),
        }
    }

    fn looks_like_new_request(&self, turn: &str, now: DateTime<Utc>) -> bool {
        let extraction = self.extractor.extract(turn, self.today(now));
        extraction.date.is_some() || extraction.time.is_some()
    }

    fn today(&self, now: DateTime<Utc>) -> chrono::NaiveDate {
        now.with_timezone(&self.validator.tz()).date_naive()
    }

    fn when(&self, request: &BookingRequest) -> String {
        format_interval(&request.requested, self.validator.tz())
    }

    /// Validated request for the slot mentioned in `turn`
    fn request_from(&self, turn: &str, now: DateTime<Utc>) -> std::result::Result<BookingRequest, String> {
        let extraction = self.extractor.extract(turn, self.today(now));
        let intent = extraction.to_intent().ok_or_else(|| NEED_DATE_AND_TIME.to_string())?;
        self.validator
            .validate(&intent, now)
            .map_err(|e| render_intent_error(&e))
    }

    async fn handle_booking(&mut self, turn: &str, now: DateTime<Utc>) -> String {
        let request = match self.request_from(turn, now) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        match self.workflow.check_availability(request.requested).await {
            Ok(true) => {
                let reply = format!(
                    "Great! {} is available. What would you like to call this appointment?",
                    self.when(&request)
                );
                self.pending = Pending::Title(request);
                reply
            }
            Ok(false) => self.offer_alternatives(&request, now).await,
            Err(e) => {
                warn!("Availability check failed: {}", e);
                CALENDAR_UNAVAILABLE.to_string()
            }
        }
    }

    async fn handle_check(&mut self, turn: &str, now: DateTime<Utc>) -> String {
        let request = match self.request_from(turn, now) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        match self.workflow.check_availability(request.requested).await {
            Ok(true) => format!("{} is available.", self.when(&request)),
            Ok(false) => format!("{} is already booked.", self.when(&request)),
            Err(e) => {
                warn!("Availability check failed: {}", e);
                CALENDAR_UNAVAILABLE.to_string()
            }
        }
    }

    async fn offer_alternatives(&self, request: &BookingRequest, now: DateTime<Utc>) -> String {
        match self.workflow.propose_alternatives(request.requested, now).await {
            Ok(alternatives) => render_result(&BookingResult::Conflict { alternatives }, self.validator.tz()),
            Err(e) => {
                warn!("Alternative lookup failed: {}", e);
                CALENDAR_UNAVAILABLE.to_string()
            }
        }
    }

    fn confirmation(&self, request: &BookingRequest) -> String {
        format!(
            "I'm ready to book your appointment:\n  - Title: {}\n  - When: {}\n  - Duration: {} minutes\n\
             Should I go ahead and book it? (yes/no)",
            request.title,
            self.when(request),
            request.requested.duration().num_minutes()
        )
    }

    async fn book(&self, request: &BookingRequest, now: DateTime<Utc>) -> String {
        let result = self.workflow.run_at(request, now).await;
        render_result(&result, self.validator.tz())
    }
}

#[async_trait]
impl<C: CalendarClient + ?Sized + 'static> Assistant for GuidedAssistant<C> {
    async fn respond(&mut self, turn: &str) -> String {
        let now = (self.clock)();
        self.history.push(Message::user(turn));
        let reply = self.handle(turn, now).await;
        self.history.push(Message::assistant(&reply));
        reply
    }

    fn reset(&mut self) {
        self.pending = Pending::Nothing;
        self.history.clear();
    }

    fn history(&self) -> &[Message] {
        &self.history
    }
}
