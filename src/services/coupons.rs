use crate::{
    entities::{coupon, coupon_usage, Coupon, CouponUsage},
    errors::ServiceError,
    pricing::{self, CartQuote, CouponRejection, PricedLine},
    services::cart::resolve_cart_lines,
    session::{CouponSnapshot, SessionStore},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Coupon service.
///
/// Apply/remove only ever touch the session snapshot; the durable
/// ledger (`total_uses`, `coupon_usages`) is written exclusively by
/// checkout, inside the order transaction. Apply-time validation is a
/// courtesy check so the shopper finds out early; it is repeated at
/// commit time where it actually counts.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
    sessions: Arc<dyn SessionStore>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { db, sessions }
    }

    /// Validates a code against the shopper's cart and, if it passes,
    /// snapshots it into the session. Returns the refreshed quote.
    ///
    /// Rejections are typed (`CouponRejection`) and checked in a fixed
    /// order: existence, active flag, expiry, global ceiling, per-user
    /// ceiling, and finally the empty-cart rule.
    #[instrument(skip(self))]
    pub async fn apply(
        &self,
        session_id: &str,
        user_id: Uuid,
        code: &str,
    ) -> Result<CartQuote, ServiceError> {
        let normalized = pricing::normalize_code(code);
        let coupon = Coupon::find()
            .filter(coupon::Column::Code.eq(normalized.clone()))
            .one(&*self.db)
            .await?
            .ok_or(CouponRejection::NotFound)?;

        let mut session = self.sessions.load(session_id).await?;
        let (lines, _removed) = resolve_cart_lines(&*self.db, &session).await?;

        let user_use_count = CouponUsage::find()
            .filter(coupon_usage::Column::CouponId.eq(coupon.id))
            .filter(coupon_usage::Column::UserId.eq(user_id))
            .count(&*self.db)
            .await?;

        pricing::check_coupon_terms(&coupon, Utc::now(), user_use_count as i64, lines.is_empty())?;

        session.coupon = Some(CouponSnapshot {
            id: coupon.id,
            code: coupon.code.clone(),
            discount_percent: coupon.discount_percent,
            max_discount_amount: coupon.max_discount_amount,
        });
        self.sessions.save(session_id, &session).await?;
        info!("Applied coupon {} to session", coupon.code);

        let priced: Vec<PricedLine> = lines.iter().map(|l| l.priced()).collect();
        Ok(pricing::quote(
            &priced,
            session.coupon.as_ref(),
            session.delivery.as_ref(),
        ))
    }

    /// Clears the coupon snapshot and returns the quote without it.
    #[instrument(skip(self))]
    pub async fn remove(&self, session_id: &str) -> Result<CartQuote, ServiceError> {
        let mut session = self.sessions.load(session_id).await?;
        session.coupon = None;
        self.sessions.save(session_id, &session).await?;

        let (lines, _removed) = resolve_cart_lines(&*self.db, &session).await?;
        let priced: Vec<PricedLine> = lines.iter().map(|l| l.priced()).collect();
        Ok(pricing::quote(&priced, None, session.delivery.as_ref()))
    }

    #[instrument(skip(self))]
    pub async fn list_coupons(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<coupon::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = Coupon::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let coupons = paginator.fetch_page(page - 1).await?;
        Ok((coupons, total))
    }

    #[instrument(skip(self, input))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let code = pricing::normalize_code(&input.code);
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Coupon code cannot be empty".to_string(),
            ));
        }
        validate_percent(input.discount_percent)?;
        validate_caps(
            input.max_discount_amount,
            input.max_uses_per_user,
            input.max_total_uses,
        )?;

        let taken = Coupon::find()
            .filter(coupon::Column::Code.eq(code.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                code
            )));
        }

        let now = Utc::now();
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            discount_percent: Set(input.discount_percent),
            max_discount_amount: Set(input.max_discount_amount),
            max_uses_per_user: Set(input.max_uses_per_user),
            max_total_uses: Set(input.max_total_uses),
            total_uses: Set(0),
            is_active: Set(input.is_active.unwrap_or(true)),
            expires_at: Set(input.expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let coupon = model.insert(&*self.db).await?;
        info!("Created coupon {}", coupon.code);
        Ok(coupon)
    }

    /// Partial update. `total_uses` is deliberately not editable here;
    /// only the checkout transaction moves that counter.
    #[instrument(skip(self, input))]
    pub async fn update_coupon(
        &self,
        coupon_id: Uuid,
        input: UpdateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let existing = Coupon::find_by_id(coupon_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))?;

        let mut active: coupon::ActiveModel = existing.clone().into();
        if let Some(code) = input.code {
            let code = pricing::normalize_code(&code);
            if code.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Coupon code cannot be empty".to_string(),
                ));
            }
            if code != existing.code {
                let taken = Coupon::find()
                    .filter(coupon::Column::Code.eq(code.clone()))
                    .one(&*self.db)
                    .await?
                    .is_some();
                if taken {
                    return Err(ServiceError::Conflict(format!(
                        "Coupon code {} already exists",
                        code
                    )));
                }
            }
            active.code = Set(code);
        }
        if let Some(percent) = input.discount_percent {
            validate_percent(percent)?;
            active.discount_percent = Set(percent);
        }
        if let Some(cap) = input.max_discount_amount {
            if cap <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Maximum discount must be greater than zero".to_string(),
                ));
            }
            active.max_discount_amount = Set(Some(cap));
        }
        if let Some(per_user) = input.max_uses_per_user {
            if per_user <= 0 {
                return Err(ServiceError::ValidationError(
                    "Per-user limit must be at least 1".to_string(),
                ));
            }
            active.max_uses_per_user = Set(Some(per_user));
        }
        if let Some(total) = input.max_total_uses {
            if total <= 0 {
                return Err(ServiceError::ValidationError(
                    "Total use limit must be at least 1".to_string(),
                ));
            }
            active.max_total_uses = Set(Some(total));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(expires_at) = input.expires_at {
            active.expires_at = Set(Some(expires_at));
        }
        active.updated_at = Set(Utc::now());

        let coupon = active.update(&*self.db).await?;
        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn delete_coupon(&self, coupon_id: Uuid) -> Result<(), ServiceError> {
        let result = Coupon::delete_by_id(coupon_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Coupon {} not found",
                coupon_id
            )));
        }
        info!("Deleted coupon {}", coupon_id);
        Ok(())
    }
}

fn validate_percent(percent: Decimal) -> Result<(), ServiceError> {
    if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(ServiceError::ValidationError(
            "Discount percent must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

fn validate_caps(
    max_discount_amount: Option<Decimal>,
    max_uses_per_user: Option<i32>,
    max_total_uses: Option<i32>,
) -> Result<(), ServiceError> {
    if matches!(max_discount_amount, Some(cap) if cap <= Decimal::ZERO) {
        return Err(ServiceError::ValidationError(
            "Maximum discount must be greater than zero".to_string(),
        ));
    }
    if matches!(max_uses_per_user, Some(n) if n <= 0) {
        return Err(ServiceError::ValidationError(
            "Per-user limit must be at least 1".to_string(),
        ));
    }
    if matches!(max_total_uses, Some(n) if n <= 0) {
        return Err(ServiceError::ValidationError(
            "Total use limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Input for creating a coupon
#[derive(Debug, Deserialize)]
pub struct CreateCouponInput {
    pub code: String,
    pub discount_percent: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub max_uses_per_user: Option<i32>,
    pub max_total_uses: Option<i32>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for updating a coupon
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCouponInput {
    pub code: Option<String>,
    pub discount_percent: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub max_uses_per_user: Option<i32>,
    pub max_total_uses: Option<i32>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ==================== Validation Tests ====================

    #[test]
    fn percent_must_be_in_range() {
        assert!(validate_percent(dec!(0.5)).is_ok());
        assert!(validate_percent(dec!(100)).is_ok());
        assert!(validate_percent(Decimal::ZERO).is_err());
        assert!(validate_percent(dec!(100.01)).is_err());
        assert!(validate_percent(dec!(-10)).is_err());
    }

    #[test]
    fn caps_must_be_positive_when_present() {
        assert!(validate_caps(None, None, None).is_ok());
        assert!(validate_caps(Some(dec!(150)), Some(1), Some(50)).is_ok());
        assert!(validate_caps(Some(Decimal::ZERO), None, None).is_err());
        assert!(validate_caps(None, Some(0), None).is_err());
        assert!(validate_caps(None, None, Some(-3)).is_err());
    }

    // ==================== Input Parsing ====================

    #[test]
    fn create_input_parses_decimal_fields_from_strings() {
        let json = r#"{
            "code": "save10",
            "discount_percent": "10",
            "max_discount_amount": "100.00",
            "max_total_uses": 50
        }"#;
        let input: CreateCouponInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.discount_percent, dec!(10));
        assert_eq!(input.max_discount_amount, Some(dec!(100.00)));
        assert_eq!(input.max_total_uses, Some(50));
        assert!(input.expires_at.is_none());
    }
}
