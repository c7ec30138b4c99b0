use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use dashmap::DashMap;
use redis::{AsyncCommands, Client};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{ApiError, ServiceError};

/// Header carrying the opaque session id the client owns.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Delivery choice frozen at selection time. Pricing always reads this
/// snapshot, so an admin editing the fee schedule cannot change a quote
/// the shopper has already seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub key: String,
    pub label: String,
    pub amount: Decimal,
}

/// Coupon terms frozen at apply time; enough to price a quote without a
/// database read. Checkout re-validates against the live row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponSnapshot {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: Decimal,
    #[serde(default)]
    pub max_discount_amount: Option<Decimal>,
}

/// Server-side session state. Cart keys are `product_id` or
/// `product_id:color`; the same product in two colors is two lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub cart: BTreeMap<String, i32>,
    #[serde(default)]
    pub delivery: Option<DeliverySnapshot>,
    #[serde(default)]
    pub coupon: Option<CouponSnapshot>,
}

impl SessionData {
    pub fn cart_key(product_id: Uuid, color: Option<&str>) -> String {
        match color {
            Some(c) => format!("{}:{}", product_id, c),
            None => product_id.to_string(),
        }
    }

    /// Splits a cart key back into product id and color. Keys that do not
    /// start with a well-formed UUID are unresolvable.
    pub fn parse_cart_key(key: &str) -> Option<(Uuid, Option<String>)> {
        match key.split_once(':') {
            Some((id, color)) => {
                let id = Uuid::parse_str(id).ok()?;
                if color.is_empty() {
                    Some((id, None))
                } else {
                    Some((id, Some(color.to_string())))
                }
            }
            None => Uuid::parse_str(key).ok().map(|id| (id, None)),
        }
    }

    pub fn cart_is_empty(&self) -> bool {
        self.cart.is_empty()
    }

    /// Clears everything checkout consumes. Called only after the order
    /// transaction has committed.
    pub fn reset_after_checkout(&mut self) {
        self.cart.clear();
        self.coupon = None;
        self.delivery = None;
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SessionStoreError> for ServiceError {
    fn from(err: SessionStoreError) -> Self {
        ServiceError::SessionError(err.to_string())
    }
}

/// Backing store for session state. Absent sessions load as empty; saving
/// refreshes the TTL.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<SessionData, SessionStoreError>;
    async fn save(&self, session_id: &str, data: &SessionData) -> Result<(), SessionStoreError>;
    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError>;
}

/// Redis-backed store, one JSON blob per session.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: Arc<Client>,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, SessionStoreError> {
        let redis = Client::open(redis_url).map_err(SessionStoreError::Redis)?;
        Ok(Self {
            redis: Arc::new(redis),
            ttl_secs,
        })
    }

    fn session_key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip(self))]
    async fn load(&self, session_id: &str) -> Result<SessionData, SessionStoreError> {
        let mut conn = self.redis.get_async_connection().await?;
        let json: Option<String> = conn.get(Self::session_key(session_id)).await?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(SessionData::default()),
        }
    }

    #[instrument(skip(self, data))]
    async fn save(&self, session_id: &str, data: &SessionData) -> Result<(), SessionStoreError> {
        let mut conn = self.redis.get_async_connection().await?;
        let json = serde_json::to_string(data)?;
        let _: () = conn
            .set_ex(Self::session_key(session_id), json, self.ttl_secs as usize)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let mut conn = self.redis.get_async_connection().await?;
        let _: () = conn.del(Self::session_key(session_id)).await?;
        Ok(())
    }
}

/// In-process store used in tests and when no Redis URL is configured.
/// No TTL; entries live as long as the process.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, SessionData>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<SessionData, SessionStoreError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &str, data: &SessionData) -> Result<(), SessionStoreError> {
        self.sessions.insert(session_id.to_string(), data.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

/// Extractor for the client's session id. Carts are guest-capable, so this
/// is independent of authentication.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest(format!("Missing {} header", SESSION_ID_HEADER))
            })?;

        if value.len() > 128 {
            return Err(ApiError::BadRequest(format!(
                "{} header too long",
                SESSION_ID_HEADER
            )));
        }

        Ok(SessionId(value.to_string()))
    }
}
