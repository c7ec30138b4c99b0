use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::errors::{ApiError, ServiceError};
use crate::AppState;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // Subject (user ID)
    pub username: String, // Login name, for logs and greetings
    pub role: String,     // "customer" or "admin"
    pub iat: i64,         // Issued at time
    pub exp: i64,         // Expiration time
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Extractor that additionally requires the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Signs a JWT for the given user.
pub fn issue_token(
    user: &user::Model,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role.as_str().to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + expiration_secs as i64,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("Token creation failed: {}", e)))
}

/// Decodes and validates a JWT, returning its claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ServiceError::Unauthorized("Token expired".to_string())
        }
        _ => ServiceError::Unauthorized("Invalid token".to_string()),
    })
}

impl TryFrom<Claims> for AuthUser {
    type Error = ServiceError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Invalid token subject".to_string()))?;
        let role = match claims.role.as_str() {
            "admin" => UserRole::Admin,
            "customer" => UserRole::Customer,
            other => {
                return Err(ServiceError::Unauthorized(format!(
                    "Unknown role in token: {}",
                    other
                )))
            }
        };
        Ok(AuthUser {
            user_id,
            username: claims.username,
            role,
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ServiceError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let token = bearer_token(parts).map_err(ApiError::ServiceError)?;
        let claims =
            decode_token(token, &app_state.config.jwt_secret).map_err(ApiError::ServiceError)?;
        AuthUser::try_from(claims).map_err(ApiError::ServiceError)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::ServiceError(ServiceError::Forbidden(
                "Admin access required".to_string(),
            )));
        }
        Ok(AdminUser(user))
    }
}

/// Hashes a password with argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("Password hashing failed: {}", e)))
}

/// Verifies a password against a stored PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::InternalError(format!("Corrupt password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 6-digit signup verification code, zero-padded.
pub fn generate_otp_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user(role: UserRole) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            username: "shopper".to_string(),
            email: "shopper@example.com".to_string(),
            password_hash: String::new(),
            role,
            phone: None,
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trips_claims() {
        let user = test_user(UserRole::Customer);
        let token = issue_token(&user, "secret", 3600).unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, "shopper");
        assert_eq!(claims.role, "customer");

        let auth: AuthUser = claims.try_into().unwrap();
        assert_eq!(auth.user_id, user.id);
        assert!(!auth.is_admin());
    }

    #[test]
    fn admin_role_survives_round_trip() {
        let user = test_user(UserRole::Admin);
        let token = issue_token(&user, "secret", 3600).unwrap();
        let auth: AuthUser = decode_token(&token, "secret").unwrap().try_into().unwrap();
        assert!(auth.is_admin());
    }

    #[test]
    fn wrong_secret_rejected() {
        let user = test_user(UserRole::Customer);
        let token = issue_token(&user, "secret", 3600).unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2-but-longer").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2-but-longer", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn otp_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
