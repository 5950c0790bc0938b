//! Product and cart operations the checkout flow relies on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, OrderError, Product, Variant};
use crate::domain::value_objects::{Sku, Vnd};
use crate::error::{AppError, AppResult};
use crate::store::Store;

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub price: Vnd,
    pub sale_price: Option<Vnd>,
    pub images: Vec<String>,
    /// Stock of a product sold without variants.
    pub stock: i32,
    pub variants: Vec<NewVariant>,
}

#[derive(Clone, Debug)]
pub struct NewVariant {
    pub sku: Sku,
    pub size: String,
    pub color: String,
    pub additional_price: Vnd,
    pub stock: i32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// Creates a product with its variants; the aggregate stock is the sum of variant stock.
    pub async fn create_product(&self, input: NewProduct, now: DateTime<Utc>) -> AppResult<ProductDetails> {
        let mut product = Product::create(input.name, input.price, input.sale_price, input.images, now)?;
        let variants = input.variants.into_iter()
            .map(|v| Variant::create(&product, v.sku, v.size, v.color, v.additional_price, v.stock, now))
            .collect::<Result<Vec<_>, _>>()?;
        product.total_stock = if variants.is_empty() { input.stock.max(0) } else { variants.iter().map(|v| v.stock).sum() };

        self.store.insert_product(&product, &variants).await?;
        tracing::info!(product = %product.id, variants = variants.len(), "product created");
        Ok(ProductDetails { product, variants })
    }

    pub async fn product(&self, id: Uuid) -> AppResult<ProductDetails> {
        let product = self.store.product(id).await?.ok_or(AppError::NotFound("sản phẩm"))?;
        let variants = self.store.variants_of(id).await?;
        Ok(ProductDetails { product, variants })
    }

    pub async fn cart(&self, user: Uuid) -> AppResult<Cart> {
        Ok(self.store.cart(user).await?)
    }

    /// Adds a line to the user's cart after checking the product (and variant) exist.
    pub async fn add_to_cart(&self, user: Uuid, product: Uuid, variant: Option<Uuid>, quantity: i32, now: DateTime<Utc>) -> AppResult<Cart> {
        if quantity <= 0 { return Err(OrderError::InvalidQuantity.into()); }
        self.store.product(product).await?.ok_or(AppError::NotFound("sản phẩm"))?;
        if let Some(id) = variant {
            self.store.variant(id).await?.filter(|v| v.product == product).ok_or(AppError::NotFound("biến thể sản phẩm"))?;
        }
        let mut cart = self.store.cart(user).await?;
        cart.add_item(CartItem::new(product, variant, quantity), now);
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }
}
