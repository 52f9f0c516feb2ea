//! Calendar connection context
//!
//! Holds everything needed to talk to the calendar service. Built once at
//! startup and handed to [`GoogleCalendarClient`](crate::GoogleCalendarClient);
//! each remote call borrows a [`CalendarSession`] from it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cb_core::CalendarConfig;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, info};
use url::Url;

use crate::error::{CalendarError, Result};

/// Shared calendar credentials and HTTP client
pub struct CalendarContext {
    client: Client,
    base_url: Url,
    calendar_id: String,
    access_token: String,
    timeout: Duration,
    open_sessions: AtomicUsize,
}

impl CalendarContext {
    pub fn new(
        base_url: &str,
        calendar_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let calendar_id = calendar_id.into();
        let access_token = access_token.into();
        if calendar_id.trim().is_empty() {
            return Err(CalendarError::Configuration("calendar id is empty".to_string()));
        }
        if access_token.trim().is_empty() {
            return Err(CalendarError::Configuration("access token is empty".to_string()));
        }

        let base_url = Url::parse(base_url).map_err(|e| {
            CalendarError::Configuration(format!("Invalid base URL '{}': {}", base_url, e))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Configuration(e.to_string()))?;

        info!("Calendar context initialized for: {} ({})", calendar_id, base_url);

        Ok(Self {
            client,
            base_url,
            calendar_id,
            access_token,
            timeout,
            open_sessions: AtomicUsize::new(0),
        })
    }

    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        let calendar_id = config
            .calendar_id
            .as_deref()
            .ok_or_else(|| CalendarError::Configuration("calendar_id is not set".to_string()))?;
        let access_token = config
            .access_token
            .as_deref()
            .ok_or_else(|| CalendarError::Configuration("access_token is not set".to_string()))?;

        Self::new(
            &config.base_url,
            calendar_id,
            access_token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sessions currently held
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Borrow a session for the duration of one remote call
    pub fn acquire(&self) -> CalendarSession<'_> {
        let open = self.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Calendar session acquired ({} open)", open);
        CalendarSession { context: self }
    }
}

/// Scoped access to the calendar; released on drop
pub struct CalendarSession<'a> {
    context: &'a CalendarContext,
}

impl CalendarSession<'_> {
    /// `{base}/calendars/{id}/events`, with the id percent-encoded
    pub fn events_url(&self) -> Result<Url> {
        let mut url = self.context.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CalendarError::Configuration(format!(
                    "Base URL cannot have a path: {}",
                    self.context.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["calendars", self.context.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.context
            .client
            .get(url)
            .bearer_auth(&self.context.access_token)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.context
            .client
            .post(url)
            .bearer_auth(&self.context.access_token)
    }
}

impl Drop for CalendarSession<'_> {
    fn drop(&mut self) {
        let open = self.context.open_sessions.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("Calendar session released ({} open)", open);
    }
}
