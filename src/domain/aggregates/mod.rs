//! Aggregates module
pub mod product;
pub mod order;
pub mod coupon;
pub mod cart;

pub use product::{Product, ProductError, Variant, VariantStatus};
pub use order::{
    AppliedCoupon, LineItem, Order, OrderDraft, OrderError, OrderStatistics, OrderStatus, PaymentMethod,
    PaymentStatus, ShippingAddress, StatusChange, StockLine, Transition, TransitionError,
};
pub use coupon::{Coupon, CouponDefinitionError, CouponDraft, CouponError, CouponKind};
pub use cart::{Cart, CartItem};
