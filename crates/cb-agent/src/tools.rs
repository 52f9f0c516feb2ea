//! Booking tools exposed to the model
//!
//! Every input is validated through [`IntentValidator`] first; a rejected
//! intent goes back to the model as a tool error it can relay to the user.

use std::sync::Arc;

use async_trait::async_trait;
use cb_calendar::CalendarClient;
use cb_core::{Result, SchemaBuilder, Tool, ToolManager, ToolResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::intent::{IntentValidator, RawIntent};
use crate::workflow::BookingWorkflow;

const START_DESCRIPTION: &str =
    "Slot start, ISO 8601 (e.g. 2030-03-04T15:00). Times without an offset are in the user's time zone.";
const END_DESCRIPTION: &str = "Slot end, ISO 8601, after start";

/// `{start, end}` input shared by the read-only tools
#[derive(Debug, Deserialize)]
struct SlotInput {
    #[serde(default)]
    start: String,
    #[serde(default)]
    end: String,
}

fn slot_schema() -> JsonValue {
    SchemaBuilder::object()
        .string("start", START_DESCRIPTION, true)
        .string("end", END_DESCRIPTION, true)
        .build()
}

fn parse_input<T: DeserializeOwned>(input: JsonValue) -> std::result::Result<T, ToolResult> {
    serde_json::from_value(input)
        .map_err(|e| ToolResult::error(format!("Invalid arguments: {}", e)))
}

/// Source of "now" for validation
pub(crate) type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Answers whether a slot is free
pub struct CheckAvailabilityTool<C: CalendarClient + ?Sized> {
    workflow: Arc<BookingWorkflow<C>>,
    validator: Arc<IntentValidator>,
    clock: Clock,
}

#[async_trait]
impl<C: CalendarClient + ?Sized + 'static> Tool for CheckAvailabilityTool<C> {
    fn name(&self) -> &str {
        "check_availability"
    }

    fn description(&self) -> &str {
        "Check whether a time slot is free in the calendar. Returns {\"free\": true|false}."
    }

    fn input_schema(&self) -> JsonValue {
        slot_schema()
    }

    async fn execute(&self, input: JsonValue) -> Result<ToolResult> {
        let input: SlotInput = match parse_input(input) {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        let interval = match self.validator.validate_interval(&input.start, &input.end, (self.clock)()) {
            Ok(interval) => interval,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        debug!("check_availability {}", interval);
        match self.workflow.check_availability(interval).await {
            Ok(free) => ToolResult::json(&json!({"free": free})),
            Err(e) => Ok(ToolResult::error(format!("{}. Please try again later.", e))),
        }
    }
}

/// Lists nearby free slots of the same length
pub struct ProposeAlternativesTool<C: CalendarClient + ?Sized> {
    workflow: Arc<BookingWorkflow<C>>,
    validator: Arc<IntentValidator>,
    clock: Clock,
}

#[async_trait]
impl<C: CalendarClient + ?Sized + 'static> Tool for ProposeAlternativesTool<C> {
    fn name(&self) -> &str {
        "propose_alternatives"
    }

    fn description(&self) -> &str {
        "Suggest free slots of the same length near the requested slot, closest first."
    }

    fn input_schema(&self) -> JsonValue {
        slot_schema()
    }

    async fn execute(&self, input: JsonValue) -> Result<ToolResult> {
        let input: SlotInput = match parse_input(input) {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        let now = (self.clock)();
        let interval = match self.validator.validate_interval(&input.start, &input.end, now) {
            Ok(interval) => interval,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        debug!("propose_alternatives {}", interval);
        match self.workflow.propose_alternatives(interval, now).await {
            Ok(alternatives) => ToolResult::json(&json!({"alternatives": alternatives})),
            Err(e) => Ok(ToolResult::error(format!("{}. Please try again later.", e))),
        }
    }
}

/// Books a slot through the full workflow
pub struct BookTool<C: CalendarClient + ?Sized> {
    workflow: Arc<BookingWorkflow<C>>,
    validator: Arc<IntentValidator>,
    clock: Clock,
}

#[async_trait]
impl<C: CalendarClient + ?Sized + 'static> Tool for BookTool<C> {
    fn name(&self) -> &str {
        "book"
    }

    fn description(&self) -> &str {
        "Book a slot in the calendar. Only call this after the user has confirmed the time and title. \
         Returns status confirmed, conflict (with alternatives) or failed."
    }

    fn input_schema(&self) -> JsonValue {
        SchemaBuilder::object()
            .string("start", START_DESCRIPTION, true)
            .string("end", END_DESCRIPTION, true)
            .string("title", "Short appointment title", true)
            .string_array("attendees", "Attendee email addresses", false)
            .build()
    }

    async fn execute(&self, input: JsonValue) -> Result<ToolResult> {
        let raw: RawIntent = match parse_input(input) {
            Ok(raw) => raw,
            Err(result) => return Ok(result),
        };
        let now = (self.clock)();
        let request = match self.validator.validate(&raw, now) {
            Ok(request) => request,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let result = self.workflow.run_at(&request, now).await;
        debug!("book {} -> {}", request.requested, result.status());
        ToolResult::json(&result)
    }
}

/// Register the three booking tools, validating against the wall clock
pub fn register_booking_tools<C: CalendarClient + ?Sized + 'static>(
    manager: &mut ToolManager,
    workflow: Arc<BookingWorkflow<C>>,
    validator: Arc<IntentValidator>,
) {
    register_booking_tools_with_clock(manager, workflow, validator, Arc::new(Utc::now));
}

pub(crate) fn register_booking_tools_with_clock<C: CalendarClient + ?Sized + 'static>(
    manager: &mut ToolManager,
    workflow: Arc<BookingWorkflow<C>>,
    validator: Arc<IntentValidator>,
    clock: Clock,
) {
    manager.register(Arc::new(CheckAvailabilityTool {
        workflow: workflow.clone(),
        validator: validator.clone(),
        clock: clock.clone(),
    }));
    manager.register(Arc::new(ProposeAlternativesTool {
        workflow: workflow.clone(),
        validator: validator.clone(),
        clock: clock.clone(),
    }));
    manager.register(Arc::new(BookTool {
        workflow,
        validator,
        clock,
    }));
}
