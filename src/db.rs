use std::{env, fs, path::Path};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    booking::{Booking, BookingStore, CatalogStore, ServiceOffering, StylistProfile},
    errors::ApiError,
    models::{BookingRow, Role, ServiceRow, StylistRow, DEFAULT_SPECIALTY, DEFAULT_ZONE},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for SqlitePool {
    async fn find_stylist(&self, id: &str) -> Result<Option<StylistProfile>, sqlx::Error> {
        let row = sqlx::query_as::<_, StylistRow>(
            r#"SELECT s.user_id, u.display_name, s.specialty, s.zone
               FROM stylists s
               JOIN users u ON s.user_id = u.id
               WHERE s.user_id = ?
               LIMIT 1"#,
        )
        .bind(id)
        .fetch_optional(self)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let services = fetch_services(self, &row.user_id).await?;
        Ok(Some(StylistProfile {
            id: row.user_id,
            display_name: row.display_name,
            specialty: row.specialty,
            zone: row.zone,
            services,
        }))
    }
}

#[async_trait]
impl BookingStore for SqlitePool {
    async fn exists_active_booking(
        &self,
        stylist_id: &str,
        date: &str,
        time: &str,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM bookings
               WHERE stylist_id = ? AND date = ? AND time = ?
                 AND status IN ('pending', 'confirmed')"#,
        )
        .bind(stylist_id)
        .bind(date)
        .bind(time)
        .fetch_one(self)
        .await?;
        Ok(count > 0)
    }
}

async fn fetch_services(
    pool: &SqlitePool,
    stylist_id: &str,
) -> Result<Vec<ServiceOffering>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT name, price FROM services WHERE stylist_id = ? ORDER BY name",
    )
    .bind(stylist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ServiceOffering {
            name: row.name,
            price: row.price,
        })
        .collect())
}

pub async fn list_stylists(pool: &SqlitePool) -> Result<Vec<StylistProfile>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StylistRow>(
        r#"SELECT s.user_id, u.display_name, s.specialty, s.zone
           FROM stylists s
           JOIN users u ON s.user_id = u.id
           ORDER BY u.display_name"#,
    )
    .fetch_all(pool)
    .await?;

    let mut profiles = Vec::with_capacity(rows.len());
    for row in rows {
        let services = fetch_services(pool, &row.user_id).await?;
        profiles.push(StylistProfile {
            id: row.user_id,
            display_name: row.display_name,
            specialty: row.specialty,
            zone: row.zone,
            services,
        });
    }
    Ok(profiles)
}

/// Persist the booking produced by the engine. The partial unique index on
/// (stylist_id, date, time) for pending/confirmed rows makes the second
/// writer of a raced slot fail here; that failure surfaces as the same
/// conflict the engine's own check would have reported.
pub async fn insert_booking(pool: &SqlitePool, booking: &Booking) -> Result<(), ApiError> {
    sqlx::query(
        r#"INSERT INTO bookings
           (id, client_id, stylist_id, service, date, time, modality, address, total, status, requested_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&booking.id)
    .bind(&booking.client_id)
    .bind(&booking.stylist_id)
    .bind(&booking.service)
    .bind(&booking.date)
    .bind(&booking.time)
    .bind(booking.modality.as_str())
    .bind(&booking.address)
    .bind(booking.total)
    .bind(booking.status.as_str())
    .bind(&booking.requested_at)
    .execute(pool)
    .await
    .map_err(|err| match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => ApiError::Conflict("slot already taken"),
        _ => ApiError::Infrastructure(err),
    })?;
    Ok(())
}

pub async fn fetch_booking(
    pool: &SqlitePool,
    booking_id: &str,
) -> Result<Option<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(
        r#"SELECT id, client_id, stylist_id, service, date, time, modality, address, total, status, requested_at
           FROM bookings
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await
}

pub async fn bookings_for_client(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Vec<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(
        r#"SELECT id, client_id, stylist_id, service, date, time, modality, address, total, status, requested_at
           FROM bookings
           WHERE client_id = ?
           ORDER BY date DESC, time DESC"#,
    )
    .bind(client_id)
    .fetch_all(pool)
    .await
}

pub async fn bookings_for_stylist(
    pool: &SqlitePool,
    stylist_id: &str,
) -> Result<Vec<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(
        r#"SELECT id, client_id, stylist_id, service, date, time, modality, address, total, status, requested_at
           FROM bookings
           WHERE stylist_id = ?
           ORDER BY date DESC, time DESC"#,
    )
    .bind(stylist_id)
    .fetch_all(pool)
    .await
}

pub async fn update_booking_status(
    pool: &SqlitePool,
    booking_id: &str,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(status)
        .bind(booking_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    booking_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, booking_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(booking_id)
    .execute(pool)
    .await;
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let stylist_seed = env::var("SEED_STYLIST").unwrap_or_else(|_| "false".to_string());
    if stylist_seed != "true" {
        return Ok(());
    }

    let exists = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(Role::Stylist.as_str())
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let email = env::var("STYLIST_EMAIL").unwrap_or_else(|_| "stylist@example.com".to_string());
    let password = env::var("STYLIST_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    let display_name = env::var("STYLIST_DISPLAY_NAME").unwrap_or_else(|_| "Demo Stylist".to_string());
    if password == "change-me" {
        log::warn!("STYLIST_PASSWORD not set. Using default password 'change-me'. Set STYLIST_PASSWORD in production.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let user_id = new_id();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO users (id, email, display_name, phone, role, password_hash, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(email)
    .bind(display_name)
    .bind("000000000")
    .bind(Role::Stylist.as_str())
    .bind(password_hash)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO stylists (user_id, specialty, zone) VALUES (?, ?, ?)")
        .bind(&user_id)
        .bind(DEFAULT_SPECIALTY)
        .bind(DEFAULT_ZONE)
        .execute(pool)
        .await?;

    sqlx::query("INSERT INTO services (id, stylist_id, name, price) VALUES (?, ?, ?, ?)")
        .bind(new_id())
        .bind(&user_id)
        .bind("Haircut")
        .bind(1000_i64)
        .execute(pool)
        .await?;

    Ok(())
}
