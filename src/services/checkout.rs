use crate::{
    entities::{
        bkash_number, coupon, coupon_usage, delivery_option, order, order_item, BkashNumber,
        Coupon, CouponUsage, DeliveryOption, OrderItem, OrderStatus, PaymentMethod,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    pricing::{self, CartQuote, CouponRejection, PricedLine},
    services::cart::{resolve_cart_lines, ResolvedLine},
    session::SessionStore,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Checkout service: turns a priced session cart into a durable order.
///
/// Everything durable happens in one transaction: the coupon claim, the
/// order row, the usage row, and the order items. The session is
/// touched only after the transaction commits, so a failed checkout
/// leaves the shopper's cart exactly as it was.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    sessions: Arc<dyn SessionStore>,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            sessions,
            event_sender,
        }
    }

    /// Places an order from the session's cart, delivery, and coupon
    /// state.
    ///
    /// The sequence:
    /// 1. resolve the cart against live products; an empty resolvable
    ///    cart cannot check out
    /// 2. a delivery option must have been selected, and its key must
    ///    still exist (a stale snapshot is discarded and the shopper
    ///    asked to re-select)
    /// 3. bKash payments need a trimmed `trx_id` and an active
    ///    receiving number to snapshot
    /// 4. re-price with the same pure engine the quote endpoint uses
    /// 5. one transaction: claim the coupon use with a conditional
    ///    update, insert the order, the usage row, and the items
    /// 6. only after commit: clear the session and emit `OrderPlaced`
    ///
    /// The coupon claim is the race-sensitive step. Two checkouts can
    /// both hold an apply-time snapshot of the last use; the
    /// conditional `UPDATE ... WHERE total_uses < max_total_uses`
    /// guarantees only one of them commits.
    #[instrument(skip(self, input), fields(session_id = %session_id))]
    pub async fn place_order(
        &self,
        session_id: &str,
        user_id: Uuid,
        input: PlaceOrderInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let mut session = self.sessions.load(session_id).await?;

        let (lines, _removed) = resolve_cart_lines(&*self.db, &session).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let delivery = match &session.delivery {
            Some(snapshot) => snapshot.clone(),
            None => {
                return Err(ServiceError::ValidationError(
                    "Please select a delivery option".to_string(),
                ))
            }
        };
        let delivery_exists = DeliveryOption::find()
            .filter(delivery_option::Column::Key.eq(delivery.key.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if !delivery_exists {
            session.delivery = None;
            self.sessions.save(session_id, &session).await?;
            return Err(ServiceError::ValidationError(
                "Selected delivery option is no longer available, please choose another"
                    .to_string(),
            ));
        }

        let customer_name = required_field(&input.customer_name, "Customer name")?;
        let shipping_address = required_field(&input.shipping_address, "Shipping address")?;
        let phone = required_field(&input.phone, "Phone number")?;

        let payment_method = PaymentMethod::from_str(input.payment_method.trim())
            .map_err(|_| {
                ServiceError::ValidationError("Payment method must be cash or bkash".to_string())
            })?;

        let (trx_id, receiving_number) = match payment_method {
            PaymentMethod::Cash => (None, None),
            PaymentMethod::Bkash => {
                let trx = input
                    .trx_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "Transaction ID is required for bKash payment".to_string(),
                        )
                    })?;
                let number = BkashNumber::find()
                    .filter(bkash_number::Column::IsActive.eq(true))
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InvalidOperation(
                            "bKash payment is currently unavailable".to_string(),
                        )
                    })?;
                (Some(trx.to_string()), Some(number.number))
            }
        };

        let priced: Vec<PricedLine> = lines.iter().map(ResolvedLine::priced).collect();
        let quote = pricing::quote(&priced, session.coupon.as_ref(), Some(&delivery));

        let order_id = Uuid::new_v4();
        let order_number = format!(
            "ORD-{}",
            order_id.simple().to_string()[..8].to_uppercase()
        );
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let coupon_snapshot = session.coupon.clone();
        if let Some(snapshot) = &coupon_snapshot {
            claim_coupon_use(&txn, snapshot.id, user_id).await?;
        }

        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            subtotal: Set(quote.subtotal),
            discount_amount: Set(quote.discount_amount),
            delivery_key: Set(Some(delivery.key.clone())),
            delivery_label: Set(Some(delivery.label.clone())),
            delivery_amount: Set(quote.delivery_amount),
            total_amount: Set(quote.grand_total),
            coupon_id: Set(coupon_snapshot.as_ref().map(|c| c.id)),
            coupon_code: Set(coupon_snapshot.as_ref().map(|c| c.code.clone())),
            payment_method: Set(payment_method),
            trx_id: Set(trx_id),
            receiving_bkash_number: Set(receiving_number),
            customer_name: Set(customer_name),
            shipping_address: Set(shipping_address),
            phone: Set(phone),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order_model.insert(&txn).await?;

        if let Some(snapshot) = &coupon_snapshot {
            let usage = coupon_usage::ActiveModel {
                id: Set(Uuid::new_v4()),
                coupon_id: Set(snapshot.id),
                user_id: Set(user_id),
                order_id: Set(order_id),
                used_at: Set(now),
            };
            CouponUsage::insert(usage).exec(&txn).await?;
        }

        let item_rows = priced.iter().map(|line| order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            color: Set(line.color.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            line_total: Set(line.line_total),
        });
        OrderItem::insert_many(item_rows).exec(&txn).await?;

        txn.commit().await?;

        // The order is durable from here; a session-store hiccup must
        // not fail the checkout.
        session.reset_after_checkout();
        if let Err(e) = self.sessions.save(session_id, &session).await {
            warn!("Failed to clear session after checkout: {}", e);
        }

        self.event_sender
            .send_or_log(Event::OrderPlaced { order_id })
            .await;

        info!(
            "Placed order {} for user {}: {}",
            order_number, user_id, quote.grand_total
        );

        Ok(CheckoutOutcome {
            order_id: order.id,
            order_number: order.order_number,
            quote,
        })
    }
}

/// Re-validates the coupon inside the checkout transaction and claims
/// one use with a conditional increment. Zero rows affected means the
/// coupon ran out between apply and commit.
async fn claim_coupon_use(
    txn: &impl ConnectionTrait,
    coupon_id: Uuid,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    let coupon_row = Coupon::find_by_id(coupon_id)
        .one(txn)
        .await?
        .ok_or(CouponRejection::NotFound)?;

    let user_use_count = CouponUsage::find()
        .filter(coupon_usage::Column::CouponId.eq(coupon_id))
        .filter(coupon_usage::Column::UserId.eq(user_id))
        .count(txn)
        .await?;

    pricing::check_coupon_terms(&coupon_row, Utc::now(), user_use_count as i64, false)?;

    let claim = Coupon::update_many()
        .col_expr(
            coupon::Column::TotalUses,
            Expr::col(coupon::Column::TotalUses).add(1),
        )
        .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(coupon::Column::Id.eq(coupon_id))
        .filter(
            Condition::any()
                .add(coupon::Column::MaxTotalUses.is_null())
                .add(
                    Expr::col(coupon::Column::TotalUses)
                        .lt(Expr::col(coupon::Column::MaxTotalUses)),
                ),
        )
        .exec(txn)
        .await?;

    if claim.rows_affected == 0 {
        return Err(CouponRejection::UsageLimitReached.into());
    }
    Ok(())
}

fn required_field(raw: &str, label: &str) -> Result<String, ServiceError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot be empty",
            label
        )));
    }
    Ok(value.to_string())
}

/// Checkout request body
#[derive(Debug, Deserialize)]
pub struct PlaceOrderInput {
    pub customer_name: String,
    pub shipping_address: String,
    pub phone: String,
    pub payment_method: String,
    pub trx_id: Option<String>,
}

/// Checkout response: the order reference plus the priced totals the
/// shopper saw.
#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order_id: Uuid,
    pub order_number: String,
    #[serde(flatten)]
    pub quote: CartQuote,
}
