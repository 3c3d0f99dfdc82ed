use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;

use crate::{
    auth::{client_validator, AuthUser},
    booking::{request_booking, NewBooking},
    db,
    errors::ApiError,
    models::{BookingStatus, Modality},
    state::AppState,
};

#[derive(Deserialize)]
struct BookingRequestBody {
    stylist_id: String,
    service: String,
    date: String,
    time: String,
    modality: Modality,
    address: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .wrap(HttpAuthentication::bearer(client_validator))
            .service(
                web::resource("")
                    .route(web::post().to(create_booking))
                    .route(web::get().to(list_bookings)),
            )
            .service(web::resource("/{id}/cancel").route(web::post().to(cancel_booking))),
    );
}

async fn create_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    body: web::Json<BookingRequestBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let request = NewBooking {
        stylist_id: body.stylist_id,
        service: body.service,
        date: body.date,
        time: body.time,
        modality: body.modality,
        address: body.address,
    };

    let booking = request_booking(&state.db, &state.db, &state.pricing, &auth.id, request).await?;
    db::insert_booking(&state.db, &booking).await?;

    db::log_activity(
        &state.db,
        "booking_created",
        &format!(
            "{} booked {} with stylist {} on {} {}.",
            auth.display_name, booking.service, booking.stylist_id, booking.date, booking.time
        ),
        Some(&auth.id),
        Some(&booking.id),
    )
    .await;

    Ok(HttpResponse::Created().json(booking))
}

async fn list_bookings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let bookings = db::bookings_for_client(&state.db, &auth.id).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn cancel_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let booking = db::fetch_booking(&state.db, &booking_id)
        .await?
        .filter(|row| row.client_id == auth.id)
        .ok_or(ApiError::NotFound("booking"))?;

    let status = BookingStatus::parse(&booking.status)
        .ok_or(ApiError::Conflict("booking is in an unknown state"))?;
    if status.is_terminal() {
        return Err(ApiError::Conflict("booking is already closed"));
    }

    db::update_booking_status(&state.db, &booking_id, BookingStatus::Cancelled.as_str()).await?;

    db::log_activity(
        &state.db,
        "booking_cancelled",
        &format!("{} cancelled booking {}.", auth.display_name, booking_id),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let updated = db::fetch_booking(&state.db, &booking_id)
        .await?
        .ok_or(ApiError::NotFound("booking"))?;
    Ok(HttpResponse::Ok().json(updated))
}
