use std::collections::HashSet;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{authenticate_credentials, hash_password, issue_token, new_id},
    db,
    errors::ApiError,
    models::{Role, DEFAULT_SPECIALTY, DEFAULT_ZONE},
    state::AppState,
};

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    display_name: String,
    phone: String,
    password: String,
    role: Role,
    specialty: Option<String>,
    zone: Option<String>,
    #[serde(default)]
    services: Vec<ServiceInput>,
}

#[derive(Deserialize)]
struct ServiceInput {
    name: String,
    price: i64,
}

#[derive(Serialize)]
struct UserView {
    id: String,
    email: String,
    display_name: String,
    phone: String,
    role: Role,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/register").route(web::post().to(register)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/stylists").route(web::get().to(list_stylists)))
        .service(web::resource("/stylists/{id}").route(web::get().to(stylist_profile)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let email = body.email.trim().to_string();
    let display_name = body.display_name.trim().to_string();
    let phone = body.phone.trim().to_string();

    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::validation("a valid email is required"));
    }
    if display_name.is_empty() {
        return Err(ApiError::validation("display_name is required"));
    }
    if phone.is_empty() {
        return Err(ApiError::validation("phone is required"));
    }
    if body.password.trim().is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let services = if body.role == Role::Stylist {
        let mut seen = HashSet::new();
        let mut services = Vec::with_capacity(body.services.len());
        for service in &body.services {
            let name = service.name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::validation("service names must not be empty"));
            }
            if service.price < 0 {
                return Err(ApiError::validation("service prices must not be negative"));
            }
            if !seen.insert(name.clone()) {
                return Err(ApiError::validation(
                    "service names must be unique within a profile",
                ));
            }
            services.push((name, service.price));
        }
        services
    } else {
        Vec::new()
    };

    let password_hash =
        hash_password(&body.password).map_err(|_| ApiError::validation("password rejected"))?;
    let user_id = new_id();
    let now = Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"INSERT INTO users (id, email, display_name, phone, role, password_hash, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(&email)
    .bind(&display_name)
    .bind(&phone)
    .bind(body.role.as_str())
    .bind(&password_hash)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|err| match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            ApiError::Conflict("email already registered")
        }
        _ => ApiError::Infrastructure(err),
    })?;

    // A stylist account carries a profile and its catalog; a client is just
    // the user record. Unspecified specialty and zone keep their defaults.
    if body.role == Role::Stylist {
        let specialty = body
            .specialty
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_SPECIALTY);
        let zone = body
            .zone
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ZONE);

        sqlx::query("INSERT INTO stylists (user_id, specialty, zone) VALUES (?, ?, ?)")
            .bind(&user_id)
            .bind(specialty)
            .bind(zone)
            .execute(&mut *tx)
            .await?;

        for (name, price) in &services {
            sqlx::query("INSERT INTO services (id, stylist_id, name, price) VALUES (?, ?, ?, ?)")
                .bind(new_id())
                .bind(&user_id)
                .bind(name)
                .bind(*price)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    log::info!("Registered {} account {}", body.role.as_str(), user_id);

    Ok(HttpResponse::Created().json(UserView {
        id: user_id,
        email,
        display_name,
        phone,
        role: body.role,
    }))
}

async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let user = authenticate_credentials(&state, body.email.trim(), &body.password)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let token = issue_token(&state.tokens, &user)?;

    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "token_type": "Bearer",
        "expires_in": state.tokens.ttl_hours * 3600,
    })))
}

async fn list_stylists(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stylists = db::list_stylists(&state.db).await?;
    Ok(HttpResponse::Ok().json(stylists))
}

async fn stylist_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    use crate::booking::CatalogStore;

    let stylist_id = path.into_inner();
    let profile = state
        .db
        .find_stylist(&stylist_id)
        .await?
        .ok_or(ApiError::NotFound("stylist"))?;
    Ok(HttpResponse::Ok().json(profile))
}
