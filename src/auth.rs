use actix_web::{dev::ServiceRequest, web, Error, HttpMessage};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ApiError,
    models::{Role, UserRow},
    state::{AppState, TokenConfig},
};

/// Requester identity resolved from a bearer token, available to handlers
/// through request extensions.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn issue_token(
    config: &TokenConfig,
    user: &UserRow,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        name: user.display_name.clone(),
        role: user.role.clone(),
        iat: now,
        exp: now + config.ttl_hours * 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

pub fn verify_token(config: &TokenConfig, token: &str) -> Option<AuthUser> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    let role = Role::parse(&data.claims.role)?;
    Some(AuthUser {
        id: data.claims.sub,
        display_name: data.claims.name,
        role,
    })
}

pub async fn authenticate_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, display_name, phone, role, password_hash, created_at
           FROM users
           WHERE email = ?
           LIMIT 1"#,
    )
    .bind(email)
    .fetch_optional(&state.db)
    .await?;

    let user = match user {
        Some(user) => user,
        None => return Ok(None),
    };

    if !verify_password(password, &user.password_hash) {
        return Ok(None);
    }

    Ok(Some(user))
}

fn authenticate(req: &ServiceRequest, credentials: &BearerAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or(ApiError::Unauthorized)?;
    verify_token(&state.tokens, credentials.token()).ok_or_else(|| ApiError::Unauthorized.into())
}

pub async fn client_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials) {
        Ok(user) if user.role == Role::Client => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Ok(_) => Err((ApiError::Unauthorized.into(), req)),
        Err(err) => Err((err, req)),
    }
}

pub async fn stylist_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials) {
        Ok(user) if user.role == Role::Stylist => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Ok(_) => Err((ApiError::Unauthorized.into(), req)),
        Err(err) => Err((err, req)),
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(role: Role) -> UserRow {
        UserRow {
            id: "user-1".to_string(),
            email: "ana@example.com".to_string(),
            display_name: "Ana".to_string(),
            phone: "600111222".to_string(),
            role: role.as_str().to_string(),
            password_hash: String::new(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret-pass", "not-a-hash"));
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let config = TokenConfig {
            secret: "test-secret".to_string(),
            ttl_hours: 1,
        };
        let token = issue_token(&config, &test_user(Role::Stylist)).unwrap();
        let auth = verify_token(&config, &token).unwrap();
        assert_eq!(auth.id, "user-1");
        assert_eq!(auth.display_name, "Ana");
        assert_eq!(auth.role, Role::Stylist);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = TokenConfig {
            secret: "test-secret".to_string(),
            ttl_hours: 1,
        };
        let token = issue_token(&config, &test_user(Role::Client)).unwrap();
        let other = TokenConfig {
            secret: "another-secret".to_string(),
            ttl_hours: 1,
        };
        assert!(verify_token(&other, &token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = TokenConfig {
            secret: "test-secret".to_string(),
            ttl_hours: -1,
        };
        let token = issue_token(&config, &test_user(Role::Client)).unwrap();
        assert!(verify_token(&config, &token).is_none());
    }
}
