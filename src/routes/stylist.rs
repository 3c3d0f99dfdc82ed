use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;

use crate::{
    auth::{stylist_validator, AuthUser},
    db,
    errors::ApiError,
    models::BookingStatus,
    state::AppState,
};

#[derive(Deserialize)]
struct StatusUpdateBody {
    status: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stylist")
            .wrap(HttpAuthentication::bearer(stylist_validator))
            .service(web::resource("/bookings").route(web::get().to(list_bookings)))
            .service(
                web::resource("/bookings/{id}/status").route(web::post().to(update_status)),
            ),
    );
}

async fn list_bookings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let bookings = db::bookings_for_stylist(&state.db, &auth.id).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn update_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    body: web::Json<StatusUpdateBody>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let next = BookingStatus::parse(body.status.trim())
        .filter(|status| *status != BookingStatus::Pending)
        .ok_or_else(|| {
            ApiError::validation("status must be one of confirmed, completed, cancelled")
        })?;

    let booking = db::fetch_booking(&state.db, &booking_id)
        .await?
        .filter(|row| row.stylist_id == auth.id)
        .ok_or(ApiError::NotFound("booking"))?;

    let current = BookingStatus::parse(&booking.status)
        .ok_or(ApiError::Conflict("booking is in an unknown state"))?;
    if current.is_terminal() {
        return Err(ApiError::Conflict("booking is already closed"));
    }

    db::update_booking_status(&state.db, &booking_id, next.as_str()).await?;

    db::log_activity(
        &state.db,
        "stylist_status_update",
        &format!(
            "{} updated booking {} to {}.",
            auth.display_name,
            booking_id,
            next.as_str()
        ),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let updated = db::fetch_booking(&state.db, &booking_id)
        .await?
        .ok_or(ApiError::NotFound("booking"))?;
    Ok(HttpResponse::Ok().json(updated))
}
