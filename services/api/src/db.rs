//! Data Access Layer
//!
//! Stores confirmed bookings grouped by business day in PostgreSQL.
//! Queries are bound at runtime and mapped through the row types in `models`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tablecall_core::booking::{Booking, BookingRecord, BookingRepository, BusinessDay};
use uuid::Uuid;

use crate::models::{BookingRow, BusinessDayRow, DbBookingStatus};

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Round-trips a trivial query to prove the pool can reach the database.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database did not answer SELECT 1")?;
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for Db {
    async fn upsert_business_day(&self, day: NaiveDate) -> Result<BusinessDay> {
        let row = sqlx::query_as::<_, BusinessDayRow>(
            r#"
            INSERT INTO business_days (day)
            VALUES ($1)
            ON CONFLICT (day) DO UPDATE SET day = EXCLUDED.day
            RETURNING id, day, created_at
            "#,
        )
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Inserts the booking, or returns the stored one when the key was seen before.
    async fn create_booking(&self, booking: &Booking, business_day_id: i64) -> Result<BookingRecord> {
        let party_size = i32::try_from(booking.party_size)
            .with_context(|| format!("party size {} does not fit the schema", booking.party_size))?;

        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (id, business_day_id, booking_key, customer_name, booking_time,
                                  party_size, contact_number, status, calendar_event_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (booking_key) DO UPDATE
                SET calendar_event_id = COALESCE(EXCLUDED.calendar_event_id, bookings.calendar_event_id)
            RETURNING id, business_day_id, booking_key, customer_name, booking_time,
                      party_size, contact_number, status, calendar_event_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(business_day_id)
        .bind(&booking.booking_key)
        .bind(&booking.name)
        .bind(booking.time)
        .bind(party_size)
        .bind(&booking.contact_number)
        .bind(DbBookingStatus::from(booking.status))
        .bind(booking.calendar_event_id.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use tablecall_core::booking::BookingStatus;

    fn unreachable_db() -> Db {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy("postgres://tablecall@127.0.0.1:9/tablecall")
            .unwrap();
        Db::new(pool)
    }

    #[tokio::test]
    async fn test_ping_reports_unreachable_database() {
        let db = unreachable_db();
        assert!(db.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_party_is_rejected_before_query() {
        let db = unreachable_db();
        let booking = Booking {
            booking_key: "CA123".to_string(),
            name: "Mario".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
            party_size: u32::MAX,
            contact_number: "+393331234567".to_string(),
            status: BookingStatus::Confirmed,
            calendar_event_id: None,
        };

        let err = db.create_booking(&booking, 1).await.unwrap_err();
        assert!(err.to_string().contains("does not fit the schema"));
    }

    /// Connects to the database named by `DATABASE_URL` and brings its schema up to date.
    async fn live_db() -> Db {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let db = Db::new(PgPool::connect(&url).await.unwrap());
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a disposable Postgres"]
    async fn test_repeated_booking_key_keeps_one_row() {
        let db = live_db().await;
        let key = format!("CA-{}", Uuid::new_v4());
        let day = NaiveDate::from_ymd_opt(2099, 12, 31).unwrap();

        let first_day = db.upsert_business_day(day).await.unwrap();
        let second_day = db.upsert_business_day(day).await.unwrap();
        assert_eq!(first_day.id, second_day.id);
        assert_eq!(second_day.day, day);

        let mut booking = Booking {
            booking_key: key.clone(),
            name: "Mario".to_string(),
            date: day,
            time: NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
            party_size: 2,
            contact_number: "+393331234567".to_string(),
            status: BookingStatus::Confirmed,
            calendar_event_id: Some("evt-1".to_string()),
        };
        let first = db.create_booking(&booking, first_day.id).await.unwrap();
        booking.calendar_event_id = None;
        let second = db.create_booking(&booking, first_day.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.business_day_id, first_day.id);
        assert_eq!(second.status, BookingStatus::Confirmed);

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE booking_key = $1")
            .bind(&key)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let (event_id,): (Option<String>,) =
            sqlx::query_as("SELECT calendar_event_id FROM bookings WHERE booking_key = $1")
                .bind(&key)
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(event_id.as_deref(), Some("evt-1"));
    }
}
