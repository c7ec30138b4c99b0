use crate::{
    entities::{delivery_option, product, DeliveryOption, Product, ProductStatus},
    errors::ServiceError,
    pricing::{self, CartQuote, PricedLine},
    session::{DeliverySnapshot, SessionData, SessionStore},
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Session cart service.
///
/// The cart itself is a `{cart_key: quantity}` map inside the session
/// document; nothing is written to the database until checkout. This
/// service owns every mutation of that map plus the delivery snapshot,
/// and produces the priced view the storefront renders:
/// - lines resolved against the live catalog
/// - keys whose product has vanished reported once and pruned
/// - a quote from the pure pricing engine
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    sessions: Arc<dyn SessionStore>,
}

/// A cart key joined back to its live product row.
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    pub key: String,
    pub product: product::Model,
    pub color: Option<String>,
    pub quantity: i32,
}

impl ResolvedLine {
    pub fn priced(&self) -> PricedLine {
        PricedLine::new(
            self.key.clone(),
            self.product.id,
            self.product.name.clone(),
            self.color.clone(),
            self.quantity,
            self.product.price,
        )
    }
}

/// Resolves session cart keys against the catalog. Keys that fail to
/// parse, or whose product is gone or inactive, come back in the second
/// list so the caller can tell the shopper what disappeared.
pub async fn resolve_cart_lines(
    conn: &impl ConnectionTrait,
    session: &SessionData,
) -> Result<(Vec<ResolvedLine>, Vec<String>), ServiceError> {
    let mut parsed = Vec::new();
    let mut removed = Vec::new();

    for (key, quantity) in &session.cart {
        match SessionData::parse_cart_key(key) {
            Some((product_id, color)) if *quantity > 0 => {
                parsed.push((key.clone(), product_id, color, *quantity));
            }
            _ => removed.push(key.clone()),
        }
    }

    let ids: Vec<Uuid> = parsed.iter().map(|(_, id, _, _)| *id).collect();
    let products = if ids.is_empty() {
        Vec::new()
    } else {
        Product::find()
            .filter(product::Column::Id.is_in(ids))
            .all(conn)
            .await?
    };

    let mut lines = Vec::new();
    for (key, product_id, color, quantity) in parsed {
        match products
            .iter()
            .find(|p| p.id == product_id && p.status == ProductStatus::Active)
        {
            Some(p) => lines.push(ResolvedLine {
                key,
                product: p.clone(),
                color,
                quantity,
            }),
            None => removed.push(key),
        }
    }

    Ok((lines, removed))
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { db, sessions }
    }

    /// Returns the priced cart for a session.
    ///
    /// Side effects on the stored session, both deliberate:
    /// - cart keys that no longer resolve are pruned (they are reported
    ///   in `removed_keys` exactly once)
    /// - a delivery snapshot whose `key` has been deleted from
    ///   `delivery_options` is discarded, reverting delivery to unset
    #[instrument(skip(self))]
    pub async fn view(&self, session_id: &str) -> Result<CartView, ServiceError> {
        let mut session = self.sessions.load(session_id).await?;
        let mut dirty = false;

        let (lines, removed_keys) = resolve_cart_lines(&*self.db, &session).await?;

        for key in &removed_keys {
            session.cart.remove(key);
            dirty = true;
        }

        if let Some(delivery_key) = session.delivery.as_ref().map(|d| d.key.clone()) {
            let still_exists = DeliveryOption::find()
                .filter(delivery_option::Column::Key.eq(delivery_key.clone()))
                .one(&*self.db)
                .await?
                .is_some();
            if !still_exists {
                info!("Discarding stale delivery snapshot {}", delivery_key);
                session.delivery = None;
                dirty = true;
            }
        }

        if dirty {
            self.sessions.save(session_id, &session).await?;
        }

        let priced: Vec<PricedLine> = lines.iter().map(ResolvedLine::priced).collect();
        let quote = pricing::quote(&priced, session.coupon.as_ref(), session.delivery.as_ref());

        Ok(CartView {
            lines: priced,
            removed_keys,
            delivery: session.delivery,
            coupon_code: session.coupon.map(|c| c.code),
            quote,
        })
    }

    /// Adds a product to the cart, or bumps the quantity of an
    /// existing line.
    ///
    /// Color rules follow the catalog: a product with variants requires
    /// one of its listed colors, a product without variants accepts none.
    #[instrument(skip(self))]
    pub async fn add(&self, session_id: &str, input: AddToCartInput) -> Result<CartView, ServiceError> {
        let quantity = input.quantity.unwrap_or(1);
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.status == ProductStatus::Active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let color = match (product.has_colors(), input.color.as_deref().map(str::trim)) {
            (true, Some(c)) if !c.is_empty() => {
                if !product.color_list().iter().any(|known| known == c) {
                    return Err(ServiceError::ValidationError(format!(
                        "Color {} is not available for this product",
                        c
                    )));
                }
                Some(c.to_string())
            }
            (true, _) => {
                return Err(ServiceError::ValidationError(
                    "This product requires a color choice".to_string(),
                ))
            }
            (false, Some(c)) if !c.is_empty() => {
                return Err(ServiceError::ValidationError(
                    "This product has no color variants".to_string(),
                ))
            }
            (false, _) => None,
        };

        let key = SessionData::cart_key(product.id, color.as_deref());

        let mut session = self.sessions.load(session_id).await?;
        *session.cart.entry(key.clone()).or_insert(0) += quantity;
        self.sessions.save(session_id, &session).await?;

        info!("Added {} x{} to cart", key, quantity);
        self.view(session_id).await
    }

    /// Sets the quantity of an existing line. Zero removes the line.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        session_id: &str,
        key: &str,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Quantity cannot be negative".to_string(),
            ));
        }

        let mut session = self.sessions.load(session_id).await?;
        if !session.cart.contains_key(key) {
            return Err(ServiceError::NotFound(format!(
                "Cart line {} not found",
                key
            )));
        }

        if quantity == 0 {
            session.cart.remove(key);
        } else {
            session.cart.insert(key.to_string(), quantity);
        }
        self.sessions.save(session_id, &session).await?;

        self.view(session_id).await
    }

    /// Removes a line outright.
    #[instrument(skip(self))]
    pub async fn remove(&self, session_id: &str, key: &str) -> Result<CartView, ServiceError> {
        let mut session = self.sessions.load(session_id).await?;
        if session.cart.remove(key).is_none() {
            return Err(ServiceError::NotFound(format!(
                "Cart line {} not found",
                key
            )));
        }
        self.sessions.save(session_id, &session).await?;

        self.view(session_id).await
    }

    /// Empties the cart map. Delivery and coupon snapshots survive.
    #[instrument(skip(self))]
    pub async fn clear(&self, session_id: &str) -> Result<CartView, ServiceError> {
        let mut session = self.sessions.load(session_id).await?;
        session.cart.clear();
        self.sessions.save(session_id, &session).await?;

        info!("Cleared cart for session");
        self.view(session_id).await
    }

    /// Snapshots a delivery option `{key, label, amount}` into the
    /// session. Quotes use the snapshot from here on; a later admin fee
    /// edit does not reach this shopper.
    #[instrument(skip(self))]
    pub async fn set_delivery(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<CartView, ServiceError> {
        let option = DeliveryOption::find()
            .filter(delivery_option::Column::Key.eq(key))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Delivery option {} not found", key)))?;

        let mut session = self.sessions.load(session_id).await?;
        session.delivery = Some(DeliverySnapshot {
            key: option.key,
            label: option.label,
            amount: option.amount,
        });
        self.sessions.save(session_id, &session).await?;

        self.view(session_id).await
    }

    /// Reverts delivery to unset.
    #[instrument(skip(self))]
    pub async fn clear_delivery(&self, session_id: &str) -> Result<CartView, ServiceError> {
        let mut session = self.sessions.load(session_id).await?;
        session.delivery = None;
        self.sessions.save(session_id, &session).await?;

        self.view(session_id).await
    }
}

/// Input for adding a product to the cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub color: Option<String>,
    pub quantity: Option<i32>,
}

/// Priced cart as the storefront renders it
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<PricedLine>,
    /// Keys dropped because their product vanished since they were added
    pub removed_keys: Vec<String>,
    pub delivery: Option<DeliverySnapshot>,
    pub coupon_code: Option<String>,
    pub quote: CartQuote,
}

impl CartView {
    pub fn subtotal(&self) -> Decimal {
        self.quote.subtotal
    }
}
