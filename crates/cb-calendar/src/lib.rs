//! cb-calendar: Calendar access and availability for cb-gateway
//!
//! This crate provides the calendar side of appointment booking.
//!
//! ## Features
//!
//! - Half-open [`TimeInterval`] and merged [`BusySet`] value types
//! - Availability resolver: free/busy checks and alternative slots
//! - [`CalendarClient`] trait with a Google Calendar REST backend and an
//!   in-memory backend
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cb_calendar::{CalendarContext, CalendarClient, GoogleCalendarClient, TimeInterval};
//!
//! let context = CalendarContext::from_config(&config.calendar)?;
//! let client = GoogleCalendarClient::new(context);
//!
//! let range = TimeInterval::new(start, start + chrono::Duration::days(1))?;
//! let busy = client.list_busy(range).await?;
//! ```

pub mod availability;
pub mod busy;
pub mod client;
pub mod context;
pub mod error;
pub mod google;
pub mod interval;
pub mod memory;
pub mod models;

pub use availability::{is_free, suggest_alternatives};
pub use busy::BusySet;
pub use client::CalendarClient;
pub use context::{CalendarContext, CalendarSession};
pub use error::{CalendarError, Result};
pub use google::GoogleCalendarClient;
pub use interval::TimeInterval;
pub use memory::InMemoryCalendar;
pub use models::CalendarEvent;
