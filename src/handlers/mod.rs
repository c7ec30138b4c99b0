pub mod auth;
pub mod bkash;
pub mod blog;
pub mod cart;
pub mod checkout;
pub mod common;
pub mod coupons;
pub mod dashboard;
pub mod delivery;
pub mod orders;
pub mod products;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    BkashNumberService, BlogService, CartService, CatalogService, CheckoutService, CouponService,
    DashboardService, DeliveryService, OrderService, UserService,
};
use crate::session::SessionStore;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub delivery: Arc<DeliveryService>,
    pub coupons: Arc<CouponService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub users: Arc<UserService>,
    pub blog: Arc<BlogService>,
    pub bkash: Arc<BkashNumberService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            cart: Arc::new(CartService::new(db.clone(), sessions.clone())),
            delivery: Arc::new(DeliveryService::new(db.clone())),
            coupons: Arc::new(CouponService::new(db.clone(), sessions.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                sessions,
                event_sender.clone(),
            )),
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            users: Arc::new(UserService::new(db.clone(), config, event_sender)),
            blog: Arc::new(BlogService::new(db.clone())),
            bkash: Arc::new(BkashNumberService::new(db.clone())),
            dashboard: Arc::new(DashboardService::new(db)),
        }
    }
}
