//! Product Aggregate
//!
//! Catalog entities as the order flow sees them: a product carries the base
//! price and an aggregate stock counter, each variant is one purchasable
//! size/color combination with its own SKU and stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Sku, Vnd};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Vnd,
    pub sale_price: Option<Vnd>,
    pub images: Vec<String>,
    pub total_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: Uuid,
    pub product: Uuid,
    pub sku: Sku,
    pub size: String,
    pub color: String,
    pub additional_price: Vnd,
    pub stock: i32,
    pub status: VariantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus { Active, OutOfStock }

impl VariantStatus {
    pub fn for_stock(stock: i32) -> Self { if stock > 0 { Self::Active } else { Self::OutOfStock } }
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::OutOfStock => "out_of_stock" }
    }
}

impl fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for VariantStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "out_of_stock" => Ok(Self::OutOfStock),
            other => Err(format!("unknown variant status `{other}`")),
        }
    }
}

impl Product {
    pub fn create(name: impl Into<String>, price: Vnd, sale_price: Option<Vnd>, images: Vec<String>, now: DateTime<Utc>) -> Result<Self, ProductError> {
        if price < 0 || sale_price.is_some_and(|p| p < 0) { return Err(ProductError::NegativePrice); }
        Ok(Self {
            id: Uuid::now_v7(), name: name.into(), price, sale_price, images,
            total_stock: 0, created_at: now, updated_at: now,
        })
    }

    /// Price a shopper pays for the base product: the sale price when one is set.
    pub fn effective_price(&self) -> Vnd { self.sale_price.unwrap_or(self.price) }

    pub fn primary_image(&self) -> Option<&str> { self.images.first().map(String::as_str) }

    /// Moves the aggregate counter; it is informational and floors at zero.
    pub fn adjust_total_stock(&mut self, delta: i32, now: DateTime<Utc>) {
        self.total_stock = self.total_stock.saturating_add(delta).max(0);
        self.updated_at = now;
    }
}

impl Variant {
    pub fn create(product: &Product, sku: Sku, size: impl Into<String>, color: impl Into<String>, additional_price: Vnd, stock: i32, now: DateTime<Utc>) -> Result<Self, ProductError> {
        if stock < 0 { return Err(ProductError::NegativeStock); }
        if product.effective_price() + additional_price < 0 { return Err(ProductError::NegativePrice); }
        Ok(Self {
            id: Uuid::now_v7(), product: product.id, sku, size: size.into(), color: color.into(),
            additional_price, stock, status: VariantStatus::for_stock(stock), created_at: now, updated_at: now,
        })
    }

    /// Human label used in line-item names and stock messages.
    pub fn label(&self) -> String { format!("Size {} / {}", self.size, self.color) }

    pub fn unit_price(&self, product: &Product) -> Vnd { product.effective_price() + self.additional_price }

    /// Decrement-if-sufficient; stock is left untouched on failure.
    pub fn take_stock(&mut self, quantity: i32, now: DateTime<Utc>) -> Result<(), ProductError> {
        if quantity > self.stock { return Err(ProductError::InsufficientStock { available: self.stock }); }
        self.stock -= quantity;
        self.status = VariantStatus::for_stock(self.stock);
        self.updated_at = now;
        Ok(())
    }

    pub fn restock(&mut self, quantity: i32, now: DateTime<Utc>) {
        self.stock = self.stock.saturating_add(quantity);
        self.status = VariantStatus::for_stock(self.stock);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Giá sản phẩm không được âm")]
    NegativePrice,
    #[error("Tồn kho không được âm")]
    NegativeStock,
    #[error("Chỉ còn {available} sản phẩm trong kho")]
    InsufficientStock { available: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product::create("Air Force 1", 2_500_000, None, vec!["/img/af1.jpg".into()], Utc::now()).unwrap()
    }

    #[test]
    fn test_variant_status_follows_stock() {
        let p = product();
        let mut v = Variant::create(&p, Sku::new("af1-42-white").unwrap(), "42", "Trắng", 0, 2, Utc::now()).unwrap();
        assert_eq!(v.status, VariantStatus::Active);
        v.take_stock(2, Utc::now()).unwrap();
        assert_eq!(v.stock, 0);
        assert_eq!(v.status, VariantStatus::OutOfStock);
        v.restock(1, Utc::now());
        assert_eq!(v.status, VariantStatus::Active);
    }

    #[test]
    fn test_take_stock_never_overdraws() {
        let p = product();
        let mut v = Variant::create(&p, Sku::new("af1-43-black").unwrap(), "43", "Đen", 0, 1, Utc::now()).unwrap();
        assert_eq!(v.take_stock(2, Utc::now()), Err(ProductError::InsufficientStock { available: 1 }));
        assert_eq!(v.stock, 1);
    }

    #[test]
    fn test_unit_price_uses_sale_price() {
        let mut p = product();
        let v = Variant::create(&p, Sku::new("af1-44").unwrap(), "44", "Trắng", 100_000, 5, Utc::now()).unwrap();
        assert_eq!(v.unit_price(&p), 2_600_000);
        p.sale_price = Some(2_000_000);
        assert_eq!(v.unit_price(&p), 2_100_000);
        assert_eq!(v.label(), "Size 44 / Trắng");
    }

    #[test]
    fn test_variant_price_cannot_go_below_zero() {
        let mut p = Product::create("Vans Old Skool", 100_000, None, vec![], Utc::now()).unwrap();
        let err = Variant::create(&p, Sku::new("OS-40").unwrap(), "40", "Đen", -500_000, 1, Utc::now()).unwrap_err();
        assert_eq!(err, ProductError::NegativePrice);

        let v = Variant::create(&p, Sku::new("OS-41").unwrap(), "41", "Đen", -100_000, 1, Utc::now()).unwrap();
        assert_eq!(v.unit_price(&p), 0);

        p.sale_price = Some(80_000);
        assert!(Variant::create(&p, Sku::new("OS-42").unwrap(), "42", "Đen", -90_000, 1, Utc::now()).is_err());
    }

    #[test]
    fn test_total_stock_floors_at_zero() {
        let mut p = product();
        p.adjust_total_stock(3, Utc::now());
        p.adjust_total_stock(-5, Utc::now());
        assert_eq!(p.total_stock, 0);
    }
}
