// Storefront services
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod delivery;
pub mod orders;
pub mod users;

// Content and back office
pub mod bkash;
pub mod blog;
pub mod dashboard;

pub use bkash::BkashNumberService;
pub use blog::BlogService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use coupons::CouponService;
pub use dashboard::DashboardService;
pub use delivery::DeliveryService;
pub use orders::OrderService;
pub use users::UserService;
