use crate::{
    entities::{product, product_image, Product, ProductImage, ProductStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Catalog service: storefront product reads plus the admin CRUD behind
/// them. Storefront reads only ever see active products; the admin
/// surface sees everything.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Active products, newest first. Returns the page plus the total
    /// count of active products.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = Product::find()
            .filter(product::Column::Status.eq(ProductStatus::Active))
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;
        Ok((products, total))
    }

    /// Storefront product detail: the product with its ordered images
    /// and parsed color list. Emits `ProductViewed` so the background
    /// worker can bump the visit counter without delaying the response.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.status == ProductStatus::Active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let images = product
            .find_related(ProductImage)
            .order_by_asc(product_image::Column::Position)
            .all(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::ProductViewed { product_id })
            .await;

        let colors = product.color_list();
        Ok(ProductDetail {
            product,
            images,
            colors,
        })
    }

    /// Admin listing: every product regardless of status, newest first.
    #[instrument(skip(self))]
    pub async fn admin_list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = Product::find()
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;
        Ok((products, total))
    }

    /// Admin detail: any status, with images.
    #[instrument(skip(self))]
    pub async fn admin_get_product(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let images = product
            .find_related(ProductImage)
            .order_by_asc(product_image::Column::Position)
            .all(&*self.db)
            .await?;

        let colors = product.color_list();
        Ok(ProductDetail {
            product,
            images,
            colors,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let name = validate_name(&input.name)?;
        validate_price(input.price)?;
        let stock = input.stock.unwrap_or(0);
        validate_stock(stock)?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(input.description.filter(|d| !d.trim().is_empty())),
            price: Set(input.price),
            stock: Set(stock),
            colors: Set(normalize_colors(input.colors)),
            status: Set(input.status.unwrap_or(ProductStatus::Active)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = model.insert(&*self.db).await?;
        info!("Created product {} ({})", product.name, product.id);
        Ok(product)
    }

    /// Partial update. `colors: []` clears the variant list; absent
    /// fields are left untouched.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let existing = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(validate_name(&name)?);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description).filter(|d| !d.trim().is_empty()));
        }
        if let Some(price) = input.price {
            validate_price(price)?;
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            validate_stock(stock)?;
            active.stock = Set(stock);
        }
        if let Some(colors) = input.colors {
            active.colors = Set(normalize_colors(Some(colors)));
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        let product = active.update(&*self.db).await?;
        Ok(product)
    }

    /// Deletes a product. Its images go with it via the cascading
    /// foreign key; existing order items keep their name snapshot.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let result = Product::delete_by_id(product_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }
        info!("Deleted product {}", product_id);
        Ok(())
    }

    /// Replaces a product's image list in one transaction. Positions
    /// follow the order of the submitted URLs.
    #[instrument(skip(self, urls))]
    pub async fn set_product_images(
        &self,
        product_id: Uuid,
        urls: Vec<String>,
    ) -> Result<Vec<product_image::Model>, ServiceError> {
        let urls: Vec<String> = urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();

        let txn = self.db.begin().await?;

        Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        ProductImage::delete_many()
            .filter(product_image::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        if !urls.is_empty() {
            let rows = urls.iter().enumerate().map(|(position, url)| {
                product_image::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    url: Set(url.clone()),
                    position: Set(position as i32),
                }
            });
            ProductImage::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;

        let images = ProductImage::find()
            .filter(product_image::Column::ProductId.eq(product_id))
            .order_by_asc(product_image::Column::Position)
            .all(&*self.db)
            .await?;
        info!("Replaced images for product {}: {}", product_id, images.len());
        Ok(images)
    }
}

fn validate_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "Product name cannot be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_price(price: Decimal) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<(), ServiceError> {
    if stock < 0 {
        return Err(ServiceError::ValidationError(
            "Stock cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Joins the submitted variant names back into the stored CSV form.
/// Empty and whitespace-only entries are dropped; an empty result is
/// stored as NULL.
fn normalize_colors(colors: Option<Vec<String>>) -> Option<String> {
    let joined = colors?
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub colors: Option<Vec<String>>,
    pub status: Option<ProductStatus>,
}

/// Input for partially updating a product
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub colors: Option<Vec<String>>,
    pub status: Option<ProductStatus>,
}

/// Product detail with images and parsed colors
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: product::Model,
    pub images: Vec<product_image::Model>,
    pub colors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ==================== Validation Tests ====================

    #[test]
    fn name_is_trimmed_and_required() {
        assert_eq!(validate_name("  Mug  ").unwrap(), "Mug");
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn price_must_be_positive() {
        assert!(validate_price(dec!(0.01)).is_ok());
        assert!(validate_price(Decimal::ZERO).is_err());
        assert!(validate_price(dec!(-5)).is_err());
    }

    #[test]
    fn stock_cannot_go_negative() {
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(250).is_ok());
        assert!(validate_stock(-1).is_err());
    }

    // ==================== Color Normalization ====================

    #[test]
    fn colors_join_to_csv() {
        let stored = normalize_colors(Some(vec![
            " Red ".to_string(),
            "Navy Blue".to_string(),
            "".to_string(),
        ]));
        assert_eq!(stored.as_deref(), Some("Red,Navy Blue"));
    }

    #[test]
    fn empty_color_list_clears_variants() {
        assert_eq!(normalize_colors(Some(vec![])), None);
        assert_eq!(normalize_colors(Some(vec!["  ".to_string()])), None);
        assert_eq!(normalize_colors(None), None);
    }

    // ==================== Input Parsing ====================

    #[test]
    fn update_input_fields_default_to_absent() {
        let input: UpdateProductInput = serde_json::from_str("{}").unwrap();
        assert!(input.name.is_none());
        assert!(input.price.is_none());
        assert!(input.colors.is_none());
    }

    #[test]
    fn create_input_parses_price_from_string() {
        let json = r#"{"name": "Mug", "price": "49.99"}"#;
        let input: CreateProductInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.price, dec!(49.99));
    }
}
