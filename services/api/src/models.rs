//! API and Database Models
//!
//! This module defines the webhook payloads, the operational endpoint responses,
//! and the row types used with `sqlx`, plus their conversions into core types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tablecall_core::booking::{BookingRecord, BookingStatus, BusinessDay};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fields of a Twilio voice webhook that this service reads.
///
/// Twilio posts `application/x-www-form-urlencoded` bodies with PascalCase keys.
#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
pub struct VoiceWebhookForm {
    #[serde(rename = "CallSid", default)]
    #[schema(example = "CA0123456789abcdef0123456789abcdef")]
    pub call_sid: Option<String>,
    #[serde(rename = "SpeechResult", default)]
    #[schema(example = "per 4 persone")]
    pub speech_result: Option<String>,
    /// Twilio's view of the call, e.g. `in-progress`, `completed`, `no-answer`.
    #[serde(rename = "CallStatus", default)]
    #[schema(example = "completed")]
    pub call_status: Option<String>,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub active_sessions: usize,
    pub checked_at: DateTime<Utc>,
}

/// Which collaborators have configuration. Never carries secret values.
#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq, Eq)]
pub struct ConfigStatusResponse {
    pub calendar: bool,
    pub messaging: bool,
    pub forwarding: bool,
    pub persistence: bool,
    pub max_retries: u32,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct DatabaseStatusResponse {
    #[schema(example = "ready")]
    pub status: String,
    pub detail: String,
}

#[derive(sqlx::Type, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
pub enum DbBookingStatus {
    Confirmed,
    Cancelled,
}

impl From<BookingStatus> for DbBookingStatus {
    fn from(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Confirmed => DbBookingStatus::Confirmed,
            BookingStatus::Cancelled => DbBookingStatus::Cancelled,
        }
    }
}

impl From<DbBookingStatus> for BookingStatus {
    fn from(status: DbBookingStatus) -> Self {
        match status {
            DbBookingStatus::Confirmed => BookingStatus::Confirmed,
            DbBookingStatus::Cancelled => BookingStatus::Cancelled,
        }
    }
}

#[derive(FromRow, Debug, Clone)]
pub struct BusinessDayRow {
    pub id: i64,
    pub day: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<BusinessDayRow> for BusinessDay {
    fn from(row: BusinessDayRow) -> Self {
        BusinessDay {
            id: row.id,
            day: row.day,
        }
    }
}

#[derive(FromRow, Debug, Clone)]
pub struct BookingRow {
    pub id: Uuid,
    pub business_day_id: i64,
    pub booking_key: String,
    pub customer_name: String,
    pub booking_time: NaiveTime,
    pub party_size: i32,
    pub contact_number: String,
    pub status: DbBookingStatus,
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingRow> for BookingRecord {
    fn from(row: BookingRow) -> Self {
        BookingRecord {
            id: row.id,
            business_day_id: row.business_day_id,
            booking_key: row.booking_key,
            status: row.status.into(),
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_booking_status_round_trips_between_layers() {
        let db: DbBookingStatus = BookingStatus::Confirmed.into();
        assert_eq!(db, DbBookingStatus::Confirmed);
        let core: BookingStatus = DbBookingStatus::Cancelled.into();
        assert_eq!(core, BookingStatus::Cancelled);
    }

    #[test]
    fn test_booking_row_converts_to_record() {
        let created_at = Utc.with_ymd_and_hms(2026, 10, 19, 18, 0, 0).unwrap();
        let row = BookingRow {
            id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            business_day_id: 3,
            booking_key: "CA123".to_string(),
            customer_name: "Mario".to_string(),
            booking_time: NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
            party_size: 2,
            contact_number: "+393331234567".to_string(),
            status: DbBookingStatus::Confirmed,
            calendar_event_id: Some("evt1".to_string()),
            created_at,
        };

        let record: BookingRecord = row.into();
        assert_eq!(record.business_day_id, 3);
        assert_eq!(record.booking_key, "CA123");
        assert_eq!(record.status, BookingStatus::Confirmed);
        assert_eq!(record.created_at, created_at);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "CallSid is required".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        let expected = r#"{"message":"CallSid is required"}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_config_status_serialization() {
        let status = ConfigStatusResponse {
            calendar: true,
            messaging: false,
            forwarding: false,
            persistence: true,
            max_retries: 2,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["calendar"], true);
        assert_eq!(json["messaging"], false);
        assert_eq!(json["max_retries"], 2);
    }
}
