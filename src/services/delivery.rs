use crate::{
    entities::{delivery_option, DeliveryOption},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Delivery option service. Options are the admin-managed fee schedule
/// shoppers pick from at checkout; the storefront shows them ordered by
/// `position`.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DatabaseConnection>,
}

impl DeliveryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_options(&self) -> Result<Vec<delivery_option::Model>, ServiceError> {
        let options = DeliveryOption::find()
            .order_by_asc(delivery_option::Column::Position)
            .all(&*self.db)
            .await?;
        Ok(options)
    }

    #[instrument(skip(self, input))]
    pub async fn create_option(
        &self,
        input: CreateDeliveryOptionInput,
    ) -> Result<delivery_option::Model, ServiceError> {
        let key = normalize_key(&input.key)?;
        let label = input.label.trim().to_string();
        if label.is_empty() {
            return Err(ServiceError::ValidationError(
                "Label cannot be empty".to_string(),
            ));
        }
        validate_amount(input.amount)?;

        let taken = DeliveryOption::find()
            .filter(delivery_option::Column::Key.eq(key.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::Conflict(format!(
                "Delivery option {} already exists",
                key
            )));
        }

        let now = Utc::now();
        let model = delivery_option::ActiveModel {
            id: Set(Uuid::new_v4()),
            key: Set(key),
            label: Set(label),
            amount: Set(input.amount),
            position: Set(input.position.unwrap_or(0)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let option = model.insert(&*self.db).await?;
        info!("Created delivery option {} ({})", option.key, option.amount);
        Ok(option)
    }

    /// Partial update. The `key` is immutable once created: sessions
    /// hold it by value, and renaming a live key would silently strand
    /// their delivery snapshots.
    #[instrument(skip(self, input))]
    pub async fn update_option(
        &self,
        option_id: Uuid,
        input: UpdateDeliveryOptionInput,
    ) -> Result<delivery_option::Model, ServiceError> {
        let existing = DeliveryOption::find_by_id(option_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Delivery option {} not found", option_id))
            })?;

        let mut active: delivery_option::ActiveModel = existing.into();
        if let Some(label) = input.label {
            let label = label.trim().to_string();
            if label.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Label cannot be empty".to_string(),
                ));
            }
            active.label = Set(label);
        }
        if let Some(amount) = input.amount {
            validate_amount(amount)?;
            active.amount = Set(amount);
        }
        if let Some(position) = input.position {
            active.position = Set(position);
        }
        active.updated_at = Set(Utc::now());

        let option = active.update(&*self.db).await?;
        Ok(option)
    }

    /// Deletes an option. Sessions that snapshotted it lose the
    /// snapshot on their next cart view.
    #[instrument(skip(self))]
    pub async fn delete_option(&self, option_id: Uuid) -> Result<(), ServiceError> {
        let result = DeliveryOption::delete_by_id(option_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Delivery option {} not found",
                option_id
            )));
        }
        info!("Deleted delivery option {}", option_id);
        Ok(())
    }
}

fn normalize_key(raw: &str) -> Result<String, ServiceError> {
    let key = raw.trim().to_lowercase();
    if key.is_empty() {
        return Err(ServiceError::ValidationError(
            "Key cannot be empty".to_string(),
        ));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServiceError::ValidationError(
            "Key may only contain letters, digits, hyphen and underscore".to_string(),
        ));
    }
    Ok(key)
}

fn validate_amount(amount: Decimal) -> Result<(), ServiceError> {
    if amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Amount cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Input for creating a delivery option
#[derive(Debug, Deserialize)]
pub struct CreateDeliveryOptionInput {
    pub key: String,
    pub label: String,
    pub amount: Decimal,
    pub position: Option<i32>,
}

/// Input for updating a delivery option (key is immutable)
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDeliveryOptionInput {
    pub label: Option<String>,
    pub amount: Option<Decimal>,
    pub position: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ==================== Key Normalization ====================

    #[test]
    fn keys_are_lowercased_and_trimmed() {
        assert_eq!(normalize_key("  Inside-Dhaka ").unwrap(), "inside-dhaka");
        assert_eq!(normalize_key("express_24h").unwrap(), "express_24h");
    }

    #[test]
    fn keys_reject_spaces_and_symbols() {
        assert!(normalize_key("inside dhaka").is_err());
        assert!(normalize_key("fee!").is_err());
        assert!(normalize_key("").is_err());
    }

    // ==================== Amount Validation ====================

    #[test]
    fn free_delivery_is_allowed() {
        assert!(validate_amount(Decimal::ZERO).is_ok());
        assert!(validate_amount(dec!(60)).is_ok());
    }

    #[test]
    fn negative_fees_are_rejected() {
        assert!(validate_amount(dec!(-0.01)).is_err());
    }
}
