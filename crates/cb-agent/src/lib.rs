//! cb-agent: Appointment negotiation for cb-gateway
//!
//! Turns conversational requests into calendar bookings.
//!
//! ## Features
//!
//! - [`IntentValidator`]: untrusted intents (from the model or the user) into
//!   a [`BookingRequest`]
//! - [`BookingWorkflow`]: check, book or propose alternatives, with a single
//!   automatic retry on a lost race
//! - LLM tools (`check_availability`, `propose_alternatives`, `book`)
//! - [`Assistant`] implementations: [`LlmAssistant`] over function calling and
//!   the rule-based [`GuidedAssistant`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cb_agent::{BookingWorkflow, IntentValidator, RawIntent, WorkflowPolicy};
//!
//! let workflow = BookingWorkflow::new(calendar, WorkflowPolicy::from_config(&config.booking)?);
//! let validator = IntentValidator::from_config(&config.booking)?;
//!
//! let request = validator.validate(&raw, chrono::Utc::now())?;
//! let result = workflow.run(&request).await;
//! ```

pub mod adapter;
pub mod error;
pub mod guided;
pub mod intent;
pub mod render;
pub mod request;
pub mod rules;
pub mod tools;
pub mod workflow;

pub use adapter::{Assistant, LlmAssistant};
pub use error::{AgentError, IntentError, Result};
pub use guided::GuidedAssistant;
pub use intent::{IntentValidator, RawIntent};
pub use render::{render_intent_error, render_result};
pub use request::{BookingRequest, BookingResult};
pub use tools::register_booking_tools;
pub use workflow::{BookingWorkflow, WorkflowPolicy, WorkflowState, WorkingHours};
