//! HTTP surface: router, extractors and handlers under `/api/v1`.

pub mod auth;
pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod response;

use std::sync::Arc;

use axum::{routing::{get, patch, post}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::events::EventPublisher;
use crate::service::{CatalogService, CouponService, OrderService};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub coupons: CouponService,
    pub catalog: CatalogService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher) -> Self {
        Self {
            orders: OrderService::new(store.clone(), events),
            coupons: CouponService::new(store.clone()),
            catalog: CatalogService::new(store),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/mine", get(orders::list_my_orders))
        .route("/orders/statistics", get(orders::statistics))
        .route("/orders/number/:order_number", get(orders::get_order_by_number))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", patch(orders::update_status))
        .route("/orders/:id/cancel", patch(orders::cancel_order))
        .route("/coupons", post(coupons::create_coupon).get(coupons::list_coupons))
        .route("/coupons/validate", post(coupons::validate_coupon))
        .route("/products", post(catalog::create_product))
        .route("/products/:id", get(catalog::get_product))
        .route("/cart", get(catalog::get_cart))
        .route("/cart/items", post(catalog::add_cart_item));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "sneakerhub-orders"})) }))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
