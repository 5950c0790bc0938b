//! SneakerHub order service
//!
//! Checkout and order lifecycle for the SneakerHub storefront.
//!
//! ## Features
//! - Server-side pricing from the product catalog
//! - Percentage and fixed-amount coupons with usage limits
//! - Atomic placement: coupon usage, variant stock and cart cleanup commit together
//! - Admin status workflow with stock returned on cancellation and refund
//! - Order events on NATS

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod http;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use http::{router, AppState};
