//! Domain events
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::{Order, OrderStatus, PaymentStatus, Transition};
use crate::domain::value_objects::Vnd;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, user: Option<Uuid>, total: Vnd, coupon: Option<Uuid>, at: DateTime<Utc> },
    StatusChanged { order_id: Uuid, order_number: String, from: OrderStatus, to: OrderStatus, payment_status: PaymentStatus, restocked: bool, at: DateTime<Utc> },
}

impl OrderEvent {
    pub fn placed(order: &Order) -> Self {
        Self::Placed {
            order_id: order.id, order_number: order.order_number.clone(), user: order.user,
            total: order.total, coupon: order.coupon, at: order.created_at,
        }
    }

    pub fn status_changed(order: &Order, transition: Transition) -> Self {
        Self::StatusChanged {
            order_id: order.id, order_number: order.order_number.clone(), from: transition.from, to: transition.to,
            payment_status: order.payment_status, restocked: transition.releases_stock(), at: order.updated_at,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self { Self::Placed { .. } => "orders.placed", Self::StatusChanged { .. } => "orders.status_changed" }
    }
}
