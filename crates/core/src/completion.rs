//! Completion pipeline.
//!
//! Runs once per call after the last field is collected:
//! 1.  Builds the booking and checks its start timestamp.
//! 2.  Reuses the calendar event tagged with the booking key, or creates one.
//! 3.  Stores the booking when a repository is configured (best effort).
//! 4.  Texts a confirmation to the caller (best effort, never retried).
//!
//! Only steps 1 and 2 can fail the pipeline. Nothing here retries on its own.

use crate::booking::{Booking, BookingRepository};
use crate::calendar::{CalendarError, CalendarEvent, CalendarService, NewCalendarEvent};
use crate::messaging::MessagingService;
use crate::steps::{CollectedFields, Field};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("booking is missing the {0} field")]
    MissingField(Field),
    #[error("cannot build a start time from date {date} and time {time}")]
    InvalidStart { date: String, time: String },
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub event_duration_minutes: i64,
    pub restaurant_name: String,
}

/// The result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub booking: Booking,
    pub event: CalendarEvent,
    /// `true` when an event for this booking key already existed.
    pub event_reused: bool,
    pub persisted: bool,
    pub notified: bool,
}

pub struct CompletionPipeline {
    calendar: Arc<dyn CalendarService>,
    messaging: Arc<dyn MessagingService>,
    repository: Option<Arc<dyn BookingRepository>>,
    settings: CompletionSettings,
}

impl CompletionPipeline {
    pub fn new(
        calendar: Arc<dyn CalendarService>,
        messaging: Arc<dyn MessagingService>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            calendar,
            messaging,
            repository: None,
            settings,
        }
    }

    /// Enables durable persistence of confirmed bookings.
    pub fn with_repository(mut self, repository: Arc<dyn BookingRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn restaurant_name(&self) -> &str {
        &self.settings.restaurant_name
    }

    /// Records the booking identified by `booking_key`.
    ///
    /// Running it again with the same key reuses the existing calendar event.
    pub async fn complete(
        &self,
        booking_key: &str,
        fields: &CollectedFields,
    ) -> Result<Confirmation, CompletionError> {
        let mut booking = Booking::from_fields(booking_key, fields)?;

        let (event, event_reused) = self.ensure_event(&booking).await?;
        booking.calendar_event_id = Some(event.id.clone());

        let persisted = self.persist(&booking).await;
        let notified = self.notify(&booking, &event).await;

        Ok(Confirmation {
            booking,
            event,
            event_reused,
            persisted,
            notified,
        })
    }

    async fn ensure_event(&self, booking: &Booking) -> Result<(CalendarEvent, bool), CompletionError> {
        if let Some(existing) = self
            .calendar
            .find_by_booking_key(&booking.booking_key)
            .await?
        {
            info!(booking_key = %booking.booking_key, event_id = %existing.id, "Reusing existing calendar event");
            return Ok((existing, true));
        }

        let request = NewCalendarEvent {
            summary: booking.summary(&self.settings.restaurant_name),
            description: booking.description(),
            start: booking.start(),
            duration_minutes: self.settings.event_duration_minutes,
            booking_key: booking.booking_key.clone(),
        };
        let created = self.calendar.create_event(&request).await?;
        info!(booking_key = %booking.booking_key, event_id = %created.id, "Calendar event created");
        Ok((created, false))
    }

    async fn persist(&self, booking: &Booking) -> bool {
        let Some(repository) = &self.repository else {
            return false;
        };
        let result = async {
            let day = repository.upsert_business_day(booking.date).await?;
            repository.create_booking(booking, day.id).await
        }
        .await;
        match result {
            Ok(record) => {
                info!(booking_key = %booking.booking_key, record_id = %record.id, "Booking stored");
                true
            }
            Err(e) => {
                warn!(booking_key = %booking.booking_key, error = ?e, "Failed to store booking; calendar event remains the record");
                false
            }
        }
    }

    async fn notify(&self, booking: &Booking, event: &CalendarEvent) -> bool {
        let body = format!(
            "{}: prenotazione confermata per {} il {} alle {}, {} persone. Riferimento: {}",
            self.settings.restaurant_name,
            booking.name,
            booking.display_date(),
            booking.display_time(),
            booking.party_size,
            event.reference()
        );
        match self
            .messaging
            .send_message(&booking.contact_number, &body)
            .await
        {
            Ok(receipt) => {
                info!(booking_key = %booking.booking_key, message_sid = %receipt.sid, "Confirmation sent");
                true
            }
            Err(e) => {
                warn!(booking_key = %booking.booking_key, error = %e, "Confirmation not delivered");
                false
            }
        }
    }
}
