//! Booking engine: validates a booking request against the stylist's
//! catalog, prices it, checks the slot, and yields a `pending` booking.
//!
//! The engine performs no writes. It reads through the two store traits and
//! returns a booking value; persisting it (and surviving the read-then-write
//! race via the unique slot index) is the caller's job.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::{
    auth::new_id,
    models::{BookingStatus, Modality},
    state::PricingConfig,
};

#[derive(Debug, Clone, Serialize)]
pub struct ServiceOffering {
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StylistProfile {
    pub id: String,
    pub display_name: String,
    pub specialty: String,
    pub zone: String,
    pub services: Vec<ServiceOffering>,
}

impl StylistProfile {
    /// Exact-name catalog lookup. Service names are unique per profile.
    pub fn price_of(&self, service: &str) -> Option<i64> {
        self.services
            .iter()
            .find(|offering| offering.name == service)
            .map(|offering| offering.price)
    }
}

/// A booking request as it arrives from the transport layer, before the
/// engine has validated it.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub stylist_id: String,
    pub service: String,
    pub date: String,
    pub time: String,
    pub modality: Modality,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: String,
    pub client_id: String,
    pub stylist_id: String,
    pub service: String,
    pub date: String,
    pub time: String,
    pub modality: Modality,
    pub address: Option<String>,
    pub total: i64,
    pub status: BookingStatus,
    pub requested_at: String,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("service is not offered by this stylist")]
    ServiceNotOffered,
    #[error("stylist not found")]
    StylistNotFound,
    #[error("slot already taken")]
    SlotTaken,
    #[error(transparent)]
    Infrastructure(#[from] sqlx::Error),
}

#[async_trait]
pub trait CatalogStore {
    async fn find_stylist(&self, id: &str) -> Result<Option<StylistProfile>, sqlx::Error>;
}

#[async_trait]
pub trait BookingStore {
    /// True iff a booking exists at exactly (stylist, date, time) with a
    /// status that still occupies the slot (pending or confirmed).
    async fn exists_active_booking(
        &self,
        stylist_id: &str,
        date: &str,
        time: &str,
    ) -> Result<bool, sqlx::Error>;
}

/// Validation is ordered cheapest-first: presence and format, then stylist
/// existence, then catalog membership and pricing, and only then the
/// conflict check that costs a store round-trip.
pub async fn request_booking<C, B>(
    catalog: &C,
    bookings: &B,
    pricing: &PricingConfig,
    requester_id: &str,
    request: NewBooking,
) -> Result<Booking, BookingError>
where
    C: CatalogStore + ?Sized,
    B: BookingStore + ?Sized,
{
    let stylist_id = request.stylist_id.trim();
    let service = request.service.trim();
    let date = request.date.trim();
    let time = request.time.trim();

    if stylist_id.is_empty() {
        return Err(BookingError::Validation("stylist_id is required"));
    }
    if service.is_empty() {
        return Err(BookingError::Validation("service is required"));
    }
    if date.is_empty() {
        return Err(BookingError::Validation("date is required"));
    }
    if time.is_empty() {
        return Err(BookingError::Validation("time is required"));
    }
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(BookingError::Validation("date must be formatted YYYY-MM-DD"));
    }
    if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
        return Err(BookingError::Validation("time must be formatted HH:MM"));
    }

    let profile = catalog
        .find_stylist(stylist_id)
        .await?
        .ok_or(BookingError::StylistNotFound)?;

    let price = profile
        .price_of(service)
        .ok_or(BookingError::ServiceNotOffered)?;

    let (total, address) = match request.modality {
        Modality::AtHome => {
            let address = request.address.as_deref().map(str::trim).unwrap_or("");
            if address.is_empty() {
                return Err(BookingError::Validation(
                    "address is required for at-home bookings",
                ));
            }
            (price + pricing.home_surcharge, Some(address.to_string()))
        }
        // In-salon bookings ignore any supplied address.
        Modality::InSalon => (price, None),
    };

    if bookings.exists_active_booking(stylist_id, date, time).await? {
        return Err(BookingError::SlotTaken);
    }

    Ok(Booking {
        id: new_id(),
        client_id: requester_id.to_string(),
        stylist_id: stylist_id.to_string(),
        service: service.to_string(),
        date: date.to_string(),
        time: time.to_string(),
        modality: request.modality,
        address,
        total,
        status: BookingStatus::Pending,
        requested_at: Utc::now().to_rfc3339(),
    })
}
