use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entities::{order, order_item, product_visit, user, OrderStatus};
use crate::errors::ServiceError;
use crate::mailer::{self, Mailer};

/// Events emitted by the request path and handled off it. Losing one
/// costs a mail or a view count, never order data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    ProductViewed {
        product_id: Uuid,
    },
    SignupOtpIssued {
        email: String,
        code: String,
    },
}

impl Event {
    /// Short name for log lines. OTP codes never reach the logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "order_placed",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::ProductViewed { .. } => "product_viewed",
            Event::SignupOtpIssued { .. } => "signup_otp_issued",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing the caller when the
    /// worker is gone or the channel is full.
    pub async fn send_or_log(&self, event: Event) {
        let kind = event.kind();
        if let Err(e) = self.send(event).await {
            warn!("Dropping {} event: {}", kind, e);
        }
    }
}

/// Everything the event worker needs to act on events.
pub struct EventContext {
    pub db: Arc<DatabaseConnection>,
    pub mailer: Arc<dyn Mailer>,
    /// Back-office addresses copied on every new order.
    pub order_recipients: Vec<String>,
}

// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, ctx: EventContext) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {}", event.kind());

        match event {
            Event::ProductViewed { product_id } => {
                if let Err(e) = record_product_visit(&ctx, product_id).await {
                    error!(
                        "Failed to record product visit: product_id={}, error={}",
                        product_id, e
                    );
                }
            }
            Event::OrderPlaced { order_id } => {
                if let Err(e) = handle_order_placed(&ctx, order_id).await {
                    error!(
                        "Failed to handle order placed event: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                if let Err(e) =
                    handle_order_status_changed(&ctx, order_id, old_status, new_status).await
                {
                    error!(
                        "Failed to handle status change event: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::SignupOtpIssued { email, code } => {
                if let Err(e) = handle_signup_otp(&ctx, &email, &code).await {
                    error!("Failed to send signup code: email={}, error={}", email, e);
                }
            }
        }
    }

    warn!("Event processing loop has ended");
}

/// Bumps the per-product view counter. The worker is the only writer
/// of this table, so read-then-write is race-free.
async fn record_product_visit(ctx: &EventContext, product_id: Uuid) -> Result<(), ServiceError> {
    match product_visit::Entity::find_by_id(product_id)
        .one(&*ctx.db)
        .await?
    {
        Some(visit) => {
            let count = visit.visit_count;
            let mut active: product_visit::ActiveModel = visit.into();
            active.visit_count = Set(count + 1);
            active.last_visited_at = Set(Utc::now());
            active.update(&*ctx.db).await?;
        }
        None => {
            product_visit::ActiveModel {
                product_id: Set(product_id),
                visit_count: Set(1),
                last_visited_at: Set(Utc::now()),
            }
            .insert(&*ctx.db)
            .await?;
        }
    }
    Ok(())
}

async fn load_order_with_owner(
    ctx: &EventContext,
    order_id: Uuid,
) -> Result<(order::Model, user::Model), ServiceError> {
    let order = order::Entity::find_by_id(order_id)
        .one(&*ctx.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    let owner = user::Entity::find_by_id(order.user_id)
        .one(&*ctx.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", order.user_id)))?;
    Ok((order, owner))
}

/// Confirmation mail to the shopper plus a copy to the back office.
async fn handle_order_placed(ctx: &EventContext, order_id: Uuid) -> Result<(), ServiceError> {
    let (order, owner) = load_order_with_owner(ctx, order_id).await?;
    let items = order.find_related(order_item::Entity).all(&*ctx.db).await?;

    let (subject, html) = mailer::order_placed_message(&order, &items);
    ctx.mailer.send(&owner.email, &subject, &html).await?;

    let office_subject = format!("New order {}", order.order_number);
    for recipient in &ctx.order_recipients {
        if let Err(e) = ctx.mailer.send(recipient, &office_subject, &html).await {
            warn!("Back-office notification to {} failed: {}", recipient, e);
        }
    }
    Ok(())
}

/// Shoppers only hear about the milestones they care about.
async fn handle_order_status_changed(
    ctx: &EventContext,
    order_id: Uuid,
    old_status: OrderStatus,
    new_status: OrderStatus,
) -> Result<(), ServiceError> {
    info!(
        "Order {} moved from {} to {}",
        order_id, old_status, new_status
    );

    if !matches!(new_status, OrderStatus::Shipped | OrderStatus::Completed) {
        return Ok(());
    }

    let (order, owner) = load_order_with_owner(ctx, order_id).await?;
    let (subject, html) = mailer::order_status_message(&order);
    ctx.mailer.send(&owner.email, &subject, &html).await?;
    Ok(())
}

async fn handle_signup_otp(ctx: &EventContext, email: &str, code: &str) -> Result<(), ServiceError> {
    let (subject, html) = mailer::signup_otp_message(code);
    ctx.mailer.send(email, &subject, &html).await?;
    Ok(())
}
