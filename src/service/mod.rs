//! Application services: the order lifecycle plus the catalog, coupon and
//! cart operations it depends on.

pub mod catalog;
pub mod coupons;
pub mod orders;

pub use catalog::{CatalogService, NewProduct, NewVariant, ProductDetails};
pub use coupons::{CouponPreview, CouponService};
pub use orders::{Checkout, CheckoutItem, OrderService};

use uuid::Uuid;

/// Authenticated principal as forwarded by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub is_admin: bool,
}

impl Caller {
    pub fn customer(id: Uuid) -> Self { Self { id, is_admin: false } }
    pub fn admin(id: Uuid) -> Self { Self { id, is_admin: true } }
}
