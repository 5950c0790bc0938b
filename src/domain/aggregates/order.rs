//! Order Aggregate
//!
//! An order is created once at checkout from immutable line-item snapshots and
//! afterwards only moves through the status machine below:
//!
//! ```text
//! pending ──► processing ──► shipped ──► delivered ──► refunded
//!    │            │             │
//!    └────────────┴─────────────┴──► cancelled
//! ```
//!
//! `cancelled` and `refunded` are terminal. Every accepted move appends one
//! entry to the status history.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{CouponCode, Vnd};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub subtotal: Vnd,
    pub shipping_fee: Vnd,
    pub discount: Vnd,
    pub total: Vnd,
    pub coupon: Option<Uuid>,
    pub coupon_code: Option<CouponCode>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub shipping_address: ShippingAddress,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of what was bought, frozen at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product: Uuid,
    pub variant: Option<Uuid>,
    pub name: String,
    pub sku: Option<String>,
    pub price: Vnd,
    pub image: Option<String>,
    pub quantity: i32,
}

impl LineItem {
    pub fn line_total(&self) -> Vnd { self.price * Vnd::from(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress { pub full_name: String, pub email: String, pub phone: String, pub address: String, pub city: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange { pub status: OrderStatus, pub timestamp: DateTime<Utc>, pub note: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { #[default] Cod, BankTransfer, Momo, Vnpay }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Unpaid, Paid, Refunded }

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [Self::Pending, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled, Self::Refunded];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Processing => "processing", Self::Shipped => "shipped",
            Self::Delivered => "delivered", Self::Cancelled => "cancelled", Self::Refunded => "refunded",
        }
    }

    /// Label shown to shoppers and admins.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Chờ xác nhận", Self::Processing => "Đang xử lý", Self::Shipped => "Đang giao hàng",
            Self::Delivered => "Đã giao hàng", Self::Cancelled => "Đã hủy", Self::Refunded => "Đã hoàn tiền",
        }
    }

    pub fn next_allowed(&self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered, Self::Cancelled],
            Self::Delivered => &[Self::Refunded],
            Self::Cancelled | Self::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool { self.next_allowed().contains(&to) }
    pub fn is_terminal(&self) -> bool { self.next_allowed().is_empty() }
    /// States a customer may still cancel from.
    pub fn is_customer_cancellable(&self) -> bool { matches!(self, Self::Pending | Self::Processing) }
    /// Entering these states hands the ordered units back to inventory.
    pub fn releases_stock(&self) -> bool { matches!(self, Self::Cancelled | Self::Refunded) }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Cod => "cod", Self::BankTransfer => "bank_transfer", Self::Momo => "momo", Self::Vnpay => "vnpay" }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Unpaid => "unpaid", Self::Paid => "paid", Self::Refunded => "refunded" }
    }
}

macro_rules! text_enum {
    ($ty:ty, $what:literal, [$($variant:expr),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }
        impl FromStr for $ty {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+].into_iter().find(|v| v.as_str() == s).ok_or_else(|| format!("unknown {} `{s}`", $what))
            }
        }
    };
}

text_enum!(OrderStatus, "order status", [OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Cancelled, OrderStatus::Refunded]);
text_enum!(PaymentMethod, "payment method", [PaymentMethod::Cod, PaymentMethod::BankTransfer, PaymentMethod::Momo, PaymentMethod::Vnpay]);
text_enum!(PaymentStatus, "payment status", [PaymentStatus::Unpaid, PaymentStatus::Paid, PaymentStatus::Refunded]);

/// Coupon outcome frozen into the order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedCoupon { pub id: Uuid, pub code: CouponCode, pub discount: Vnd }

/// Everything checkout has resolved before the order exists.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub user: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub shipping_fee: Vnd,
    pub coupon: Option<AppliedCoupon>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub shipping_address: ShippingAddress,
}

/// Stock movement implied by an order, one entry per product/variant pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockLine { pub product: Uuid, pub variant: Option<Uuid>, pub quantity: i32 }

/// Outcome of an accepted status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition { pub from: OrderStatus, pub to: OrderStatus }

impl Transition {
    pub fn releases_stock(&self) -> bool { self.to.releases_stock() }
}

impl Order {
    pub fn place(draft: OrderDraft, order_number: String, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if draft.items.is_empty() { return Err(OrderError::NoItems); }
        if draft.items.iter().any(|i| i.quantity <= 0) { return Err(OrderError::InvalidQuantity); }
        if draft.shipping_fee < 0 { return Err(OrderError::NegativeShippingFee); }
        if draft.items.iter().any(|i| i.price < 0) { return Err(OrderError::NegativePrice); }

        let subtotal: Vnd = draft.items.iter().map(LineItem::line_total).sum();
        let discount = draft.coupon.as_ref().map_or(0, |c| c.discount.clamp(0, subtotal));
        Ok(Self {
            id: Uuid::now_v7(), order_number, user: draft.user, items: draft.items,
            subtotal, shipping_fee: draft.shipping_fee, discount,
            total: subtotal + draft.shipping_fee - discount,
            coupon: draft.coupon.as_ref().map(|c| c.id), coupon_code: draft.coupon.map(|c| c.code),
            payment_method: draft.payment_method, payment_status: PaymentStatus::Unpaid,
            notes: draft.notes, shipping_address: draft.shipping_address,
            status: OrderStatus::Pending,
            status_history: vec![StatusChange { status: OrderStatus::Pending, timestamp: now, note: "Đơn hàng đã được tạo".into() }],
            created_at: now, updated_at: now,
        })
    }

    pub fn is_owned_by(&self, user: Uuid) -> bool { self.user == Some(user) }

    /// Admin-driven move along the status table.
    pub fn transition(&mut self, to: OrderStatus, note: Option<String>, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
        let from = self.status;
        if !from.can_transition_to(to) { return Err(TransitionError::NotAllowed { from, to }); }

        match to {
            OrderStatus::Delivered if self.payment_method == PaymentMethod::Cod => self.payment_status = PaymentStatus::Paid,
            OrderStatus::Refunded if self.payment_status == PaymentStatus::Paid => self.payment_status = PaymentStatus::Refunded,
            _ => {}
        }

        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Đơn hàng chuyển sang trạng thái: {}", to.label()));
        self.status = to;
        self.status_history.push(StatusChange { status: to, timestamp: now, note });
        self.updated_at = now;
        Ok(Transition { from, to })
    }

    /// Cancellation requested from the order page; only allowed before shipment.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
        if !self.status.is_customer_cancellable() { return Err(TransitionError::NotCancellable(self.status)); }
        let note = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
            .map_or_else(|| "Đơn hàng đã bị hủy".to_string(), |r| format!("Đơn hàng đã bị hủy: {r}"));
        self.transition(OrderStatus::Cancelled, Some(note), now)
    }

    /// Quantities per product/variant pair, in first-seen order.
    pub fn stock_lines(&self) -> Vec<StockLine> { stock_lines(&self.items) }
}

pub fn stock_lines(items: &[LineItem]) -> Vec<StockLine> {
    let mut lines: Vec<StockLine> = Vec::new();
    for item in items {
        match lines.iter_mut().find(|l| l.product == item.product && l.variant == item.variant) {
            Some(line) => line.quantity += item.quantity,
            None => lines.push(StockLine { product: item.product, variant: item.variant, quantity: item.quantity }),
        }
    }
    lines
}

/// `ORD` + `yyMMddHHmmss` + four random digits.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    format!("ORD{}{:04}", now.format("%y%m%d%H%M%S"), rand::thread_rng().gen_range(0..10_000))
}

/// Dashboard numbers for the order list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub total_orders: i64,
    pub by_status: BTreeMap<String, i64>,
    pub revenue: Vnd,
}

impl OrderStatistics {
    /// Every status is present in `by_status`, zero when no order has it.
    pub fn from_counts(counts: impl IntoIterator<Item = (OrderStatus, i64)>, revenue: Vnd) -> Self {
        let mut by_status: BTreeMap<String, i64> = OrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let mut total_orders = 0;
        for (status, count) in counts {
            *by_status.entry(status.as_str().to_string()).or_default() += count;
            total_orders += count;
        }
        Self { total_orders, by_status, revenue }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Đơn hàng phải có ít nhất một sản phẩm")]
    NoItems,
    #[error("Số lượng sản phẩm phải lớn hơn 0")]
    InvalidQuantity,
    #[error("Phí vận chuyển không hợp lệ")]
    NegativeShippingFee,
    #[error("Giá sản phẩm trong đơn hàng không hợp lệ")]
    NegativePrice,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Không thể chuyển đơn hàng từ trạng thái '{}' sang '{}'", .from.label(), .to.label())]
    NotAllowed { from: OrderStatus, to: OrderStatus },
    #[error("Không thể hủy đơn hàng đang ở trạng thái '{}'", .0.label())]
    NotCancellable(OrderStatus),
}
