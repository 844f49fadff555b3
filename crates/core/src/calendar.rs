//! Calendar collaborator.
//!
//! Bookings are mirrored as calendar events tagged with the booking key as a
//! private extended property, which is what makes event creation idempotent.

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Base URL for the Google Calendar v3 API.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Name of the private extended property that carries the booking key.
pub const BOOKING_KEY_PROPERTY: &str = "bookingKey";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub html_link: Option<String>,
}

impl CalendarEvent {
    /// A reference the caller can follow: the event link when known, the id otherwise.
    pub fn reference(&self) -> &str {
        self.html_link.as_deref().unwrap_or(&self.id)
    }
}

/// Everything needed to create an event for a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub duration_minutes: i64,
    pub booking_key: String,
}

impl NewCalendarEvent {
    pub fn end(&self) -> NaiveDateTime {
        self.start + TimeDelta::minutes(self.duration_minutes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar is not configured: {0} is missing")]
    NotConfigured(&'static str),
    #[error("calendar request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("calendar API returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Looks up the event previously created for `booking_key`, if any.
    async fn find_by_booking_key(
        &self,
        booking_key: &str,
    ) -> Result<Option<CalendarEvent>, CalendarError>;

    async fn create_event(&self, event: &NewCalendarEvent) -> Result<CalendarEvent, CalendarError>;
}

/// Settings for [`GoogleCalendarClient`]. Missing values are reported when a call is made.
#[derive(Debug, Clone, Default)]
pub struct GoogleCalendarSettings {
    pub calendar_id: Option<String>,
    pub access_token: Option<String>,
    pub time_zone: String,
}

/// `CalendarService` backed by the Google Calendar REST API.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    client: reqwest::Client,
    settings: GoogleCalendarSettings,
    base_url: String,
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

impl GoogleCalendarClient {
    pub fn new(settings: GoogleCalendarSettings) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            settings,
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Returns the events URL and bearer token, failing before any network I/O.
    fn target(&self) -> Result<(String, &str), CalendarError> {
        let calendar_id = self
            .settings
            .calendar_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(CalendarError::NotConfigured("calendar id"))?;
        let token = self
            .settings
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(CalendarError::NotConfigured("calendar credentials"))?;
        Ok((
            format!("{}/calendars/{}/events", self.base_url, calendar_id),
            token,
        ))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn find_by_booking_key(
        &self,
        booking_key: &str,
    ) -> Result<Option<CalendarEvent>, CalendarError> {
        let (url, token) = self.target()?;
        let filter = format!("{BOOKING_KEY_PROPERTY}={booking_key}");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("privateExtendedProperty", filter.as_str()),
                ("maxResults", "1"),
                ("showDeleted", "false"),
            ])
            .send()
            .await?;
        let list: EventList = Self::check(response).await?.json().await?;
        debug!(booking_key, found = !list.items.is_empty(), "Calendar lookup finished");
        Ok(list.items.into_iter().next())
    }

    async fn create_event(&self, event: &NewCalendarEvent) -> Result<CalendarEvent, CalendarError> {
        let (url, token) = self.target()?;
        let time_zone = &self.settings.time_zone;
        let body = json!({
            "summary": event.summary,
            "description": event.description,
            "start": {
                "dateTime": event.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": time_zone,
            },
            "end": {
                "dateTime": event.end().format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": time_zone,
            },
            "extendedProperties": {
                "private": { BOOKING_KEY_PROPERTY: event.booking_key },
            },
        });
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let created: CalendarEvent = Self::check(response).await?.json().await?;
        Ok(created)
    }
}

/// A process-local `CalendarService` for development and integration testing.
///
/// Honours the booking-key contract exactly like the remote calendar does.
#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<(NewCalendarEvent, CalendarEvent)>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events created so far, in creation order.
    pub async fn events(&self) -> Vec<NewCalendarEvent> {
        self.events
            .lock()
            .await
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }
}

#[async_trait]
impl CalendarService for InMemoryCalendar {
    async fn find_by_booking_key(
        &self,
        booking_key: &str,
    ) -> Result<Option<CalendarEvent>, CalendarError> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .find(|(request, _)| request.booking_key == booking_key)
            .map(|(_, event)| event.clone()))
    }

    async fn create_event(&self, event: &NewCalendarEvent) -> Result<CalendarEvent, CalendarError> {
        let mut events = self.events.lock().await;
        let created = CalendarEvent {
            id: format!("evt-{}", events.len() + 1),
            html_link: None,
        };
        events.push((event.clone(), created.clone()));
        Ok(created)
    }
}
