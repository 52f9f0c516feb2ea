//! Google Calendar v3 REST client

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::availability::is_free;
use crate::busy::BusySet;
use crate::client::CalendarClient;
use crate::context::CalendarContext;
use crate::error::{CalendarError, Result};
use crate::interval::TimeInterval;
use crate::models::CalendarEvent;

/// Safety valve for runaway pagination
const MAX_PAGES: usize = 50;
const PAGE_SIZE: &str = "250";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    summary: String,
    description: Option<String>,
    #[serde(default)]
    transparency: String,
    start: Option<EventTime>,
    end: Option<EventTime>,
    html_link: Option<String>,
    #[serde(default)]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<DateTime<Utc>>,
    /// All-day events carry a date instead of a timestamp
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct Attendee {
    #[serde(default)]
    email: String,
}

impl EventTime {
    fn instant(&self) -> Option<DateTime<Utc>> {
        self.date_time
            .or_else(|| self.date.map(|d| d.and_time(NaiveTime::MIN).and_utc()))
    }
}

impl GoogleEvent {
    /// Whether the event occupies time on the calendar
    fn blocks_time(&self) -> bool {
        self.status != "cancelled" && self.transparency != "transparent"
    }

    fn interval(&self) -> Option<TimeInterval> {
        let start = self.start.as_ref()?.instant()?;
        let end = self.end.as_ref()?.instant()?;
        TimeInterval::new(start, end).ok()
    }
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Map a non-2xx response onto the calendar error kinds
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CalendarError::Upstream(format!(
            "authentication failed ({}): {}",
            status, body
        ))),
        StatusCode::CONFLICT => Err(CalendarError::Conflict(format!(
            "calendar rejected the write ({}): {}",
            status, body
        ))),
        _ => Err(CalendarError::Upstream(format!(
            "request failed ({}): {}",
            status, body
        ))),
    }
}

/// Calendar client backed by the Google Calendar REST API
pub struct GoogleCalendarClient {
    context: Arc<CalendarContext>,
}

impl GoogleCalendarClient {
    pub fn new(context: impl Into<Arc<CalendarContext>>) -> Self {
        Self {
            context: context.into(),
        }
    }

    pub fn context(&self) -> &CalendarContext {
        &self.context
    }

    async fn fetch_page(&self, range: &TimeInterval, page_token: Option<&str>) -> Result<EventList> {
        let session = self.context.acquire();
        let url = session.events_url()?;

        let mut query = vec![
            ("timeMin", rfc3339(range.start())),
            ("timeMax", rfc3339(range.end())),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        debug!("Listing events from: {} ({})", url, range);
        let response = session.get(url).query(&query).send().await?;
        let text = check_status(response).await?.text().await?;

        serde_json::from_str(&text)
            .map_err(|e| CalendarError::Parse(format!("Invalid event list: {}", e)))
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn list_busy(&self, range: TimeInterval) -> Result<BusySet> {
        let mut intervals = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let list = self.fetch_page(&range, page_token.as_deref()).await?;
            for event in list.items.iter().filter(|e| e.blocks_time()) {
                match event.interval() {
                    Some(interval) => intervals.push(interval),
                    None => debug!("Skipping event without a usable time range: {}", event.id),
                }
            }

            page_token = list.next_page_token;
            if page_token.is_none() {
                let busy = BusySet::from_intervals(intervals);
                info!("Fetched {} busy intervals for {}", busy.len(), range);
                return Ok(busy);
            }
        }

        // a partial listing could report busy time as free
        warn!("Event listing for {} did not finish after {} pages", range, MAX_PAGES);
        Err(CalendarError::Upstream(format!(
            "event listing did not finish after {} pages",
            MAX_PAGES
        )))
    }

    async fn create_event(
        &self,
        interval: TimeInterval,
        title: &str,
        attendees: &BTreeSet<String>,
    ) -> Result<CalendarEvent> {
        let busy = self.list_busy(interval).await?;
        if !is_free(&interval, &busy) {
            return Err(CalendarError::Conflict(format!("{} is no longer free", interval)));
        }

        let body = json!({
            "summary": title,
            "description": format!("Booked via cb-gateway: {}", title),
            "start": {"dateTime": rfc3339(interval.start()), "timeZone": "UTC"},
            "end": {"dateTime": rfc3339(interval.end()), "timeZone": "UTC"},
            "attendees": attendees.iter().map(|email| json!({"email": email})).collect::<Vec<_>>(),
        });

        let session = self.context.acquire();
        let url = session.events_url()?;
        debug!("Creating event '{}' at {}", title, interval);

        let response = session.post(url).json(&body).send().await.map_err(|e| {
            error!("Event creation request failed: {}", e);
            CalendarError::from(e)
        })?;
        let response = match check_status(response).await {
            Ok(response) => response,
            Err(e) => {
                error!("Event creation rejected: {}", e);
                return Err(e);
            }
        };

        let text = response.text().await?;
        let created: GoogleEvent = serde_json::from_str(&text)
            .map_err(|e| CalendarError::Parse(format!("Invalid created event: {}", e)))?;

        let event = CalendarEvent {
            interval: created.interval().unwrap_or(interval),
            title: if created.summary.is_empty() {
                title.to_string()
            } else {
                created.summary
            },
            description: created.description,
            attendees: created.attendees.into_iter().map(|a| a.email).collect(),
            html_link: created.html_link,
            id: created.id,
        };

        info!("Created event {} at {}", event.id, event.interval);
        Ok(event)
    }
}
