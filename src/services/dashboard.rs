use crate::{
    entities::{
        order, product, product_visit, user, Order, OrderStatus, Product, ProductVisit, User,
        UserRole,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, Iterable, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read-only aggregates for the admin landing page.
#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// One round of counters: order totals and per-status breakdown,
    /// customer and product counts, revenue over non-cancelled orders,
    /// the ten newest orders, and the five most-viewed products.
    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let total_orders = Order::find().count(&*self.db).await?;

        let mut orders_by_status = BTreeMap::new();
        for status in OrderStatus::iter() {
            let count = Order::find()
                .filter(order::Column::Status.eq(status))
                .count(&*self.db)
                .await?;
            orders_by_status.insert(status.to_string(), count);
        }

        let total_customers = User::find()
            .filter(user::Column::Role.eq(UserRole::Customer))
            .count(&*self.db)
            .await?;

        let total_products = Product::find().count(&*self.db).await?;

        let revenue = Order::find()
            .select_only()
            .column_as(order::Column::TotalAmount.sum(), "revenue")
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .into_model::<RevenueRow>()
            .one(&*self.db)
            .await?
            .and_then(|row| row.revenue)
            .unwrap_or(Decimal::ZERO);

        let recent_orders = Order::find()
            .select_only()
            .column(order::Column::Id)
            .column(order::Column::OrderNumber)
            .column(order::Column::Status)
            .column(order::Column::TotalAmount)
            .column(order::Column::CreatedAt)
            .column_as(user::Column::Username, "username")
            .join(JoinType::InnerJoin, order::Relation::User.def())
            .order_by_desc(order::Column::CreatedAt)
            .limit(10)
            .into_model::<RecentOrder>()
            .all(&*self.db)
            .await?;

        let top_products = ProductVisit::find()
            .select_only()
            .column(product_visit::Column::ProductId)
            .column_as(product::Column::Name, "name")
            .column(product_visit::Column::VisitCount)
            .join(JoinType::InnerJoin, product_visit::Relation::Product.def())
            .order_by_desc(product_visit::Column::VisitCount)
            .limit(5)
            .into_model::<TopProduct>()
            .all(&*self.db)
            .await?;

        Ok(DashboardSummary {
            total_orders,
            orders_by_status,
            total_customers,
            total_products,
            revenue,
            recent_orders,
            top_products,
        })
    }
}

/// Admin dashboard payload
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_orders: u64,
    pub orders_by_status: BTreeMap<String, u64>,
    pub total_customers: u64,
    pub total_products: u64,
    pub revenue: Decimal,
    pub recent_orders: Vec<RecentOrder>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, FromQueryResult)]
struct RevenueRow {
    revenue: Option<Decimal>,
}

/// Recent order row with the customer's username joined in
#[derive(Debug, Serialize, FromQueryResult)]
pub struct RecentOrder {
    pub id: Uuid,
    pub order_number: String,
    pub username: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Most-viewed product row
#[derive(Debug, Serialize, FromQueryResult)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub visit_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn summary_serializes_status_map_by_name() {
        let mut orders_by_status = BTreeMap::new();
        orders_by_status.insert("pending".to_string(), 4_u64);
        orders_by_status.insert("shipped".to_string(), 1_u64);

        let summary = DashboardSummary {
            total_orders: 5,
            orders_by_status,
            total_customers: 12,
            total_products: 30,
            revenue: dec!(15750.00),
            recent_orders: vec![],
            top_products: vec![],
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["orders_by_status"]["pending"], 4);
        assert_eq!(json["revenue"], "15750.00");
    }

    #[test]
    fn every_status_appears_in_the_iterator() {
        let statuses: Vec<String> = OrderStatus::iter().map(|s| s.to_string()).collect();
        assert_eq!(
            statuses,
            vec!["pending", "processing", "shipped", "completed", "cancelled"]
        );
    }
}
