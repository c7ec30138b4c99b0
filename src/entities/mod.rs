pub mod bkash_number;
pub mod blog_post;
pub mod coupon;
pub mod coupon_usage;
pub mod delivery_option;
pub mod order;
pub mod order_item;
pub mod otp_token;
pub mod product;
pub mod product_image;
pub mod product_visit;
pub mod user;

// Re-export entities
pub use bkash_number::{Entity as BkashNumber, Model as BkashNumberModel};
pub use blog_post::{Entity as BlogPost, Model as BlogPostModel};
pub use coupon::{Entity as Coupon, Model as CouponModel};
pub use coupon_usage::{Entity as CouponUsage, Model as CouponUsageModel};
pub use delivery_option::{Entity as DeliveryOption, Model as DeliveryOptionModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use otp_token::{Entity as OtpToken, Model as OtpTokenModel};
pub use product::{Entity as Product, Model as ProductModel, ProductStatus};
pub use product_image::{Entity as ProductImage, Model as ProductImageModel};
pub use product_visit::{Entity as ProductVisit, Model as ProductVisitModel};
pub use user::{Entity as User, Model as UserModel, UserRole};
