use crate::{
    entities::{order, order_item, Order, OrderItem, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order read paths and the admin status workflow. Order rows are only
/// ever created by checkout; this service never inserts.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// A customer's own orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;
        Ok((orders, total))
    }

    /// A customer's own order with its items. An order belonging to
    /// someone else is indistinguishable from a missing one.
    #[instrument(skip(self))]
    pub async fn get_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        self.with_items(order).await
    }

    /// Admin listing across all customers, optionally filtered by
    /// status.
    #[instrument(skip(self))]
    pub async fn admin_list(
        &self,
        page: u64,
        per_page: u64,
        status: Option<OrderStatus>,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let page = page.max(1);
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let paginator = query.paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;
        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn admin_get(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        self.with_items(order).await
    }

    /// Moves an order to a new status.
    ///
    /// Any transition is allowed except a no-op, so the back office can
    /// undo mistakes (a cancelled order can go back to processing). The
    /// status-changed event fires only after the row is durable; the
    /// worker mails the shopper when the order enters `shipped` or
    /// `completed`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: &str,
    ) -> Result<order::Model, ServiceError> {
        let new_status = OrderStatus::from_str(new_status.trim()).map_err(|_| {
            ServiceError::ValidationError(format!("Unknown order status {}", new_status))
        })?;

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if old_status == new_status {
            return Err(ServiceError::InvalidOperation(format!(
                "Order is already {}",
                new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        info!(
            "Order {} moved from {} to {}",
            updated.order_number, old_status, new_status
        );
        Ok(updated)
    }

    async fn with_items(&self, order: order::Model) -> Result<OrderWithItems, ServiceError> {
        let items = order.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderWithItems { order, items })
    }
}

/// An order with its line items
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Status Parsing ====================

    #[test]
    fn status_strings_parse_case_insensitively() {
        assert_eq!(
            OrderStatus::from_str("ProcessinG").unwrap(),
            OrderStatus::Processing
        );
        assert_eq!(
            OrderStatus::from_str("cancelled").unwrap(),
            OrderStatus::Cancelled
        );
        assert!(OrderStatus::from_str("refunded").is_err());
    }

    #[test]
    fn status_displays_lowercase() {
        assert_eq!(OrderStatus::Shipped.to_string(), "shipped");
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
    }
}
