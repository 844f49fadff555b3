//! The booking produced by a completed call, and the optional store that keeps it.

use crate::completion::CompletionError;
use crate::steps::{CollectedFields, Field};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// A fully collected reservation.
///
/// `booking_key` equals the call identifier and is the idempotency token shared
/// by the calendar and the persistence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub booking_key: String,
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: u32,
    pub contact_number: String,
    pub status: BookingStatus,
    pub calendar_event_id: Option<String>,
}

impl Booking {
    /// Builds a booking from a session's answers, validating the start time.
    pub fn from_fields(
        booking_key: &str,
        fields: &CollectedFields,
    ) -> Result<Self, CompletionError> {
        let name = fields
            .name
            .clone()
            .ok_or(CompletionError::MissingField(Field::Name))?;
        let date = fields
            .date
            .ok_or(CompletionError::MissingField(Field::Date))?;
        let raw_time = fields
            .time
            .as_deref()
            .ok_or(CompletionError::MissingField(Field::Time))?;
        let party_size = fields
            .party_size
            .ok_or(CompletionError::MissingField(Field::PartySize))?;
        let contact_number = fields
            .contact_number
            .clone()
            .ok_or(CompletionError::MissingField(Field::ContactNumber))?;

        let time = NaiveTime::parse_from_str(raw_time, "%H:%M").map_err(|_| {
            CompletionError::InvalidStart {
                date: date.to_string(),
                time: raw_time.to_string(),
            }
        })?;

        Ok(Self {
            booking_key: booking_key.to_string(),
            name,
            date,
            time,
            party_size,
            contact_number,
            status: BookingStatus::Confirmed,
            calendar_event_id: None,
        })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Human-readable `DD/MM/YYYY` date, as spoken and texted to the caller.
    pub fn display_date(&self) -> String {
        self.date.format("%d/%m/%Y").to_string()
    }

    pub fn display_time(&self) -> String {
        self.time.format("%H:%M").to_string()
    }

    pub fn summary(&self, restaurant: &str) -> String {
        format!("{restaurant}: {} ({} persone)", self.name, self.party_size)
    }

    pub fn description(&self) -> String {
        format!(
            "Prenotazione telefonica\nNome: {}\nPersone: {}\nTelefono: {}\nRiferimento: {}",
            self.name, self.party_size, self.contact_number, self.booking_key
        )
    }
}

/// A calendar day that holds bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDay {
    pub id: i64,
    pub day: NaiveDate,
}

/// A booking row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Uuid,
    pub business_day_id: i64,
    pub booking_key: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for confirmed bookings.
///
/// Both operations must treat their natural key (the day, the booking key) as
/// unique, returning the existing row when it is already present.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn upsert_business_day(&self, day: NaiveDate) -> anyhow::Result<BusinessDay>;

    async fn create_booking(
        &self,
        booking: &Booking,
        business_day_id: i64,
    ) -> anyhow::Result<BookingRecord>;
}
