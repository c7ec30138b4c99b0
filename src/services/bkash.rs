use crate::{
    entities::{bkash_number, BkashNumber},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Receiving bKash numbers. At most one is active at a time; checkout
/// snapshots the active number onto every bKash order and refuses bKash
/// payment when none is active.
#[derive(Clone)]
pub struct BkashNumberService {
    db: Arc<DatabaseConnection>,
}

impl BkashNumberService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_numbers(&self) -> Result<Vec<bkash_number::Model>, ServiceError> {
        let numbers = BkashNumber::find()
            .order_by_desc(bkash_number::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(numbers)
    }

    /// Registers a number. New numbers start inactive; an explicit
    /// activate call flips the switch.
    #[instrument(skip(self, input))]
    pub async fn create_number(
        &self,
        input: CreateBkashNumberInput,
    ) -> Result<bkash_number::Model, ServiceError> {
        let number = validate_number(&input.number)?;

        let taken = BkashNumber::find()
            .filter(bkash_number::Column::Number.eq(number.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::Conflict(
                "Number is already registered".to_string(),
            ));
        }

        let model = bkash_number::ActiveModel {
            id: Set(Uuid::new_v4()),
            number: Set(number),
            is_active: Set(false),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;
        info!("Registered bKash number {}", created.number);
        Ok(created)
    }

    /// Makes this the active receiving number, deactivating every
    /// other one in the same transaction.
    #[instrument(skip(self))]
    pub async fn activate_number(&self, number_id: Uuid) -> Result<bkash_number::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let target = BkashNumber::find_by_id(number_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("bKash number {} not found", number_id))
            })?;

        BkashNumber::update_many()
            .col_expr(bkash_number::Column::IsActive, Expr::value(false))
            .exec(&txn)
            .await?;

        let mut active: bkash_number::ActiveModel = target.into();
        active.is_active = Set(true);
        let activated = active.update(&txn).await?;

        txn.commit().await?;

        info!("Activated bKash number {}", activated.number);
        Ok(activated)
    }

    /// Removes a number. Deleting the active one leaves bKash checkout
    /// unavailable until another is activated.
    #[instrument(skip(self))]
    pub async fn delete_number(&self, number_id: Uuid) -> Result<(), ServiceError> {
        let result = BkashNumber::delete_by_id(number_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "bKash number {} not found",
                number_id
            )));
        }
        info!("Deleted bKash number {}", number_id);
        Ok(())
    }
}

/// Bangladeshi mobile format: 11 digits starting with 01.
fn validate_number(raw: &str) -> Result<String, ServiceError> {
    let number = raw.trim().to_string();
    if number.len() != 11 || !number.starts_with("01") || !number.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ServiceError::ValidationError(
            "Number must be 11 digits starting with 01".to_string(),
        ));
    }
    Ok(number)
}

/// Input for registering a number
#[derive(Debug, Deserialize)]
pub struct CreateBkashNumberInput {
    pub number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Number Validation ====================

    #[test]
    fn valid_numbers_pass() {
        assert_eq!(validate_number("01712345678").unwrap(), "01712345678");
        assert_eq!(validate_number("  01898765432 ").unwrap(), "01898765432");
    }

    #[test]
    fn malformed_numbers_fail() {
        assert!(validate_number("1712345678").is_err());
        assert!(validate_number("017123456789").is_err());
        assert!(validate_number("0171234567x").is_err());
        assert!(validate_number("+8801712345678").is_err());
        assert!(validate_number("").is_err());
    }
}
