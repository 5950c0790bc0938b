//! Persistence seam for the order lifecycle.
//!
//! Each operation that touches more than one record (placing an order,
//! persisting a status transition) is a single atomic unit in every
//! backend: either all of its writes land or none do.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, Coupon, Order, OrderStatistics, OrderStatus, PaymentStatus, Product, StockLine, Variant,
};
use crate::domain::value_objects::CouponCode;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("record not found")]
    NotFound,

    #[error("record was modified concurrently")]
    Conflict,

    #[error("related record not found")]
    InvalidReference,

    #[error("stored row is malformed: {0}")]
    Corrupt(String),

    #[error("storage error")]
    Sql(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::Duplicate("record"),
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            _ => Self::Sql(error),
        }
    }
}

/// Why an order could not be committed. Nothing was written when this is returned.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("coupon is no longer available")]
    CouponUnavailable,

    #[error("variant {variant} has only {available} units left")]
    InsufficientStock { variant: Uuid, available: i32 },

    #[error("variant {0} does not exist")]
    MissingVariant(Uuid),

    #[error("order number is already taken")]
    DuplicateOrderNumber,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for PlacementError {
    fn from(error: sqlx::Error) -> Self { Self::Store(error.into()) }
}

/// The write set of a checkout.
#[derive(Clone, Debug)]
pub struct Placement {
    pub order: Order,
    /// Units to take out of inventory; variant lines are decremented only if enough stock remains.
    pub stock: Vec<StockLine>,
    /// Coupon whose usage is consumed, re-checked against its cap at commit time.
    pub coupon: Option<Uuid>,
    /// Cart lines of the ordering user to drop once the order exists.
    pub cart_items: Vec<Uuid>,
}

impl Placement {
    pub fn at(&self) -> DateTime<Utc> { self.order.created_at }
}

/// An order after a status transition, plus the inventory it hands back.
#[derive(Clone, Debug)]
pub struct StatusUpdate {
    pub order: Order,
    /// Status the order must still have in storage for the update to apply.
    pub expected: OrderStatus,
    pub restock: Vec<StockLine>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderSort { #[default] Newest, Oldest, TotalDesc, TotalAsc }

impl OrderSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "newest" | "-createdAt" => Some(Self::Newest),
            "oldest" | "createdAt" => Some(Self::Oldest),
            "total_desc" | "-total" => Some(Self::TotalDesc),
            "total_asc" | "total" => Some(Self::TotalAsc),
            _ => None,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id DESC",
            Self::Oldest => "created_at ASC, id ASC",
            Self::TotalDesc => "total DESC, created_at DESC, id DESC",
            Self::TotalAsc => "total ASC, created_at DESC, id DESC",
        }
    }

    /// In-memory counterpart of `sql`; both backends break ties the same way.
    fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let newest = || b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id));
        match self {
            Self::Newest => newest(),
            Self::Oldest => a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)),
            Self::TotalDesc => b.total.cmp(&a.total).then_with(newest),
            Self::TotalAsc => a.total.cmp(&b.total).then_with(newest),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrderFilter {
    pub user: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub sort: OrderSort,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl OrderFilter {
    pub fn offset(&self) -> u32 { self.page.saturating_sub(1).saturating_mul(self.limit) }

    fn matches(&self, order: &Order) -> bool {
        self.user.map_or(true, |u| order.user == Some(u))
            && self.status.map_or(true, |s| order.status == s)
            && self.payment_status.map_or(true, |p| order.payment_status == p)
    }
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self { user: None, status: None, payment_status: None, sort: OrderSort::Newest, page: 1, limit: 10 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a product together with its variants.
    async fn insert_product(&self, product: &Product, variants: &[Variant]) -> StoreResult<()>;
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn variant(&self, id: Uuid) -> StoreResult<Option<Variant>>;
    async fn variants_of(&self, product: Uuid) -> StoreResult<Vec<Variant>>;

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()>;
    async fn coupon_by_code(&self, code: &CouponCode) -> StoreResult<Option<Coupon>>;
    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>>;

    /// The user's cart, empty when they never added anything.
    async fn cart(&self, user: Uuid) -> StoreResult<Cart>;
    async fn save_cart(&self, cart: &Cart) -> StoreResult<()>;

    /// Commits a checkout: consumes the coupon, takes stock, stores the order
    /// and clears the bought cart lines, all or nothing.
    async fn place_order(&self, placement: &Placement) -> Result<(), PlacementError>;
    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn order_by_number(&self, number: &str) -> StoreResult<Option<Order>>;
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Page<Order>>;
    /// Persists a transition with a compare-and-set on the previous status and
    /// restocks in the same unit. `Conflict` when the order moved meanwhile.
    async fn save_transition(&self, update: &StatusUpdate) -> StoreResult<()>;
    async fn order_statistics(&self) -> StoreResult<OrderStatistics>;
}
