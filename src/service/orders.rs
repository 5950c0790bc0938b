//! Order lifecycle: checkout, status transitions and cancellation.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Caller;
use crate::domain::aggregates::{
    order::{generate_order_number, stock_lines},
    AppliedCoupon, CouponError, LineItem, Order, OrderDraft, OrderError, OrderStatistics, OrderStatus, PaymentMethod,
    Product, ShippingAddress, Transition, Variant,
};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{CouponCode, Vnd};
use crate::error::{AppError, AppResult};
use crate::events::EventPublisher;
use crate::store::{OrderFilter, Page, Placement, PlacementError, StatusUpdate, Store};

/// Attempts at drawing a fresh order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Checkout payload after request validation.
#[derive(Clone, Debug)]
pub struct Checkout {
    pub shipping_address: ShippingAddress,
    pub items: Vec<CheckoutItem>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub shipping_fee: Vnd,
    pub coupon_code: Option<CouponCode>,
}

#[derive(Clone, Debug)]
pub struct CheckoutItem {
    pub product: Uuid,
    pub variant: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    events: EventPublisher,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher) -> Self { Self { store, events } }

    /// Places an order for `caller`, or a guest order when there is none.
    #[tracing::instrument(skip_all, fields(user = ?caller.map(|c| c.id), items = checkout.items.len()))]
    pub async fn create_order(&self, caller: Option<&Caller>, checkout: Checkout, now: DateTime<Utc>) -> AppResult<Order> {
        if checkout.items.is_empty() { return Err(OrderError::NoItems.into()); }
        if checkout.items.iter().any(|i| i.quantity <= 0) { return Err(OrderError::InvalidQuantity.into()); }

        let (items, variants) = self.snapshot_items(&checkout.items).await?;
        ensure_in_stock(&items, &variants)?;
        if items.iter().any(|i| i.price < 0) { return Err(OrderError::NegativePrice.into()); }

        let subtotal: Vnd = items.iter().map(LineItem::line_total).sum();
        let coupon = match &checkout.coupon_code {
            Some(code) => {
                let coupon = self.store.coupon_by_code(code).await?.ok_or(CouponError::NotFound)?;
                let discount = coupon.validate_at(now, subtotal)?;
                Some(AppliedCoupon { id: coupon.id, code: coupon.code, discount })
            }
            None => None,
        };

        let cart_items = match caller {
            Some(caller) => {
                let bought: Vec<(Uuid, Option<Uuid>)> = items.iter().map(|i| (i.product, i.variant)).collect();
                self.store.cart(caller.id).await?.ids_matching(&bought)
            }
            None => Vec::new(),
        };

        let draft = OrderDraft {
            user: caller.map(|c| c.id), items, shipping_fee: checkout.shipping_fee, coupon,
            payment_method: checkout.payment_method, notes: checkout.notes, shipping_address: checkout.shipping_address,
        };

        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let order = Order::place(draft.clone(), generate_order_number(now), now)?;
            let placement = Placement { stock: order.stock_lines(), coupon: order.coupon, cart_items: cart_items.clone(), order };
            match self.store.place_order(&placement).await {
                Ok(()) => {
                    let order = placement.order;
                    tracing::info!(order_number = %order.order_number, total = order.total, discount = order.discount, "order placed");
                    self.events.publish(&OrderEvent::placed(&order)).await;
                    return Ok(order);
                }
                Err(PlacementError::CouponUnavailable) => return Err(self.coupon_unavailable(&placement.order).await),
                Err(PlacementError::DuplicateOrderNumber) => {
                    tracing::warn!(order_number = %placement.order.order_number, "order number collision, retrying");
                }
                Err(error) => return Err(placement_error(error, &placement.order.items)),
            }
        }
        Err(AppError::Conflict("Không thể tạo mã đơn hàng, vui lòng thử lại".into()))
    }

    /// Resolves products and variants and freezes them into line items.
    /// Prices come from the catalog, never from the client.
    async fn snapshot_items(&self, requested: &[CheckoutItem]) -> AppResult<(Vec<LineItem>, HashMap<Uuid, Variant>)> {
        let mut products: HashMap<Uuid, Product> = HashMap::new();
        let mut variants: HashMap<Uuid, Variant> = HashMap::new();
        let mut items = Vec::with_capacity(requested.len());

        for item in requested {
            if !products.contains_key(&item.product) {
                let product = self.store.product(item.product).await?.ok_or(AppError::NotFound("sản phẩm"))?;
                products.insert(product.id, product);
            }
            let product = &products[&item.product];

            let line = match item.variant {
                Some(id) => {
                    if !variants.contains_key(&id) {
                        let variant = self.store.variant(id).await?
                            .filter(|v| v.product == product.id)
                            .ok_or(AppError::NotFound("biến thể sản phẩm"))?;
                        variants.insert(id, variant);
                    }
                    let variant = &variants[&id];
                    LineItem {
                        product: product.id, variant: Some(variant.id),
                        name: format!("{} - {}", product.name, variant.label()),
                        sku: Some(variant.sku.to_string()), price: variant.unit_price(product),
                        image: product.primary_image().map(str::to_string), quantity: item.quantity,
                    }
                }
                None => LineItem {
                    product: product.id, variant: None, name: product.name.clone(), sku: None,
                    price: product.effective_price(), image: product.primary_image().map(str::to_string), quantity: item.quantity,
                },
            };
            items.push(line);
        }
        Ok((items, variants))
    }

    /// The coupon passed validation but could not be consumed at commit time.
    /// Re-reads it so the shopper learns whether it ran out or was switched off.
    async fn coupon_unavailable(&self, order: &Order) -> AppError {
        let Some(code) = &order.coupon_code else { return CouponError::Exhausted.into() };
        match self.store.coupon_by_code(code).await {
            Ok(None) => CouponError::NotFound.into(),
            Ok(Some(coupon)) if !coupon.is_exhausted() && !coupon.is_active => CouponError::Inactive.into(),
            Ok(Some(_)) => CouponError::Exhausted.into(),
            Err(error) => error.into(),
        }
    }

    pub async fn get_order(&self, caller: &Caller, id: Uuid) -> AppResult<Order> {
        let order = self.store.order(id).await?.ok_or(AppError::NotFound("đơn hàng"))?;
        ensure_can_view(caller, &order)?;
        Ok(order)
    }

    /// Lookup for order tracking. Guest orders are visible to anyone holding the number.
    pub async fn get_order_by_number(&self, caller: Option<&Caller>, number: &str) -> AppResult<Order> {
        let order = self.store.order_by_number(number).await?.ok_or(AppError::NotFound("đơn hàng"))?;
        match (caller, order.user) {
            (_, None) => Ok(order),
            (Some(caller), Some(_)) => { ensure_can_view(caller, &order)?; Ok(order) }
            (None, Some(_)) => Err(AppError::Unauthenticated),
        }
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Page<Order>> {
        Ok(self.store.list_orders(filter).await?)
    }

    pub async fn list_my_orders(&self, caller: &Caller, mut filter: OrderFilter) -> AppResult<Page<Order>> {
        filter.user = Some(caller.id);
        filter.payment_status = None;
        Ok(self.store.list_orders(&filter).await?)
    }

    /// Admin status change along the transition table.
    #[tracing::instrument(skip(self, note, now))]
    pub async fn update_status(&self, id: Uuid, to: OrderStatus, note: Option<String>, now: DateTime<Utc>) -> AppResult<Order> {
        let mut order = self.store.order(id).await?.ok_or(AppError::NotFound("đơn hàng"))?;
        let transition = order.transition(to, note, now)?;
        self.persist_transition(order, transition).await
    }

    /// Cancellation by the owner (or an admin acting for them) before shipment.
    #[tracing::instrument(skip(self, caller, reason, now), fields(caller = %caller.id))]
    pub async fn cancel_order(&self, caller: &Caller, id: Uuid, reason: Option<String>, now: DateTime<Utc>) -> AppResult<Order> {
        let mut order = self.store.order(id).await?.ok_or(AppError::NotFound("đơn hàng"))?;
        if !caller.is_admin && !order.is_owned_by(caller.id) {
            return Err(AppError::Forbidden("Bạn không có quyền hủy đơn hàng này"));
        }
        let transition = order.cancel(reason, now)?;
        self.persist_transition(order, transition).await
    }

    async fn persist_transition(&self, order: Order, transition: Transition) -> AppResult<Order> {
        let restock = if transition.releases_stock() { order.stock_lines() } else { Vec::new() };
        let update = StatusUpdate { order, expected: transition.from, restock };
        self.store.save_transition(&update).await?;

        let order = update.order;
        tracing::info!(order_number = %order.order_number, from = %transition.from, to = %transition.to, restocked = !update.restock.is_empty(), "order status changed");
        self.events.publish(&OrderEvent::status_changed(&order, transition)).await;
        Ok(order)
    }

    pub async fn statistics(&self) -> AppResult<OrderStatistics> {
        Ok(self.store.order_statistics().await?)
    }
}

fn ensure_can_view(caller: &Caller, order: &Order) -> AppResult<()> {
    if caller.is_admin || order.is_owned_by(caller.id) { Ok(()) } else { Err(AppError::Forbidden("Bạn không có quyền xem đơn hàng này")) }
}

/// Every variant line must fit in the stock seen at checkout; the whole order fails otherwise.
fn ensure_in_stock(items: &[LineItem], variants: &HashMap<Uuid, Variant>) -> AppResult<()> {
    for line in stock_lines(items) {
        let Some(variant) = line.variant.and_then(|id| variants.get(&id)) else { continue };
        if line.quantity > variant.stock {
            return Err(AppError::InsufficientStock { name: line_name(items, variant.id), available: variant.stock });
        }
    }
    Ok(())
}

fn line_name(items: &[LineItem], variant: Uuid) -> String {
    items.iter().find(|i| i.variant == Some(variant)).map(|i| i.name.clone()).unwrap_or_default()
}

fn placement_error(error: PlacementError, items: &[LineItem]) -> AppError {
    match error {
        PlacementError::CouponUnavailable => CouponError::Exhausted.into(),
        PlacementError::InsufficientStock { variant, available } => AppError::InsufficientStock { name: line_name(items, variant), available },
        PlacementError::MissingVariant(_) => AppError::NotFound("biến thể sản phẩm"),
        PlacementError::DuplicateOrderNumber => AppError::Conflict("Không thể tạo mã đơn hàng, vui lòng thử lại".into()),
        PlacementError::Store(error) => error.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::domain::aggregates::{Cart, CartItem, Coupon, CouponDraft, CouponKind, PaymentStatus};
    use crate::domain::value_objects::Sku;
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        orders: OrderService,
        product: Product,
        variant: Variant,
        other: Variant,
    }

    async fn fixture(stock: i32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let mut product = Product::create("Nike Air Max 90", 3_000_000, None, vec!["/uploads/am90.jpg".into()], now).unwrap();
        let variant = Variant::create(&product, Sku::new("AM90-42-BLK").unwrap(), "42", "Đen", 0, stock, now).unwrap();
        let other = Variant::create(&product, Sku::new("AM90-43-WHT").unwrap(), "43", "Trắng", 100_000, 10, now).unwrap();
        product.total_stock = stock + other.stock;
        store.insert_product(&product, &[variant.clone(), other.clone()]).await.unwrap();
        let orders = OrderService::new(store.clone(), EventPublisher::disabled());
        Fixture { store, orders, product, variant, other }
    }

    async fn add_coupon(store: &MemoryStore, code: &str, kind: CouponKind, value: Vnd, max_usage: i32) -> Coupon {
        let now = Utc::now();
        let coupon = Coupon::create(CouponDraft {
            code: CouponCode::new(code).unwrap(), kind, value, min_order_amount: 0, max_usage,
            start_date: now - Duration::days(1), end_date: now + Duration::days(7), is_active: true,
        }, now).unwrap();
        store.insert_coupon(&coupon).await.unwrap();
        coupon
    }

    fn checkout(items: Vec<CheckoutItem>, coupon: Option<&str>) -> Checkout {
        Checkout {
            shipping_address: ShippingAddress {
                full_name: "Nguyễn Văn A".into(), email: "a@example.com".into(), phone: "0901234567".into(),
                address: "12 Lê Lợi".into(), city: "Hồ Chí Minh".into(),
            },
            items, payment_method: PaymentMethod::Cod, notes: None, shipping_fee: 30_000,
            coupon_code: coupon.map(|c| CouponCode::new(c).unwrap()),
        }
    }

    fn line(f: &Fixture, quantity: i32) -> CheckoutItem {
        CheckoutItem { product: f.product.id, variant: Some(f.variant.id), quantity }
    }

    async fn stock_of(f: &Fixture) -> i32 { f.store.variant(f.variant.id).await.unwrap().unwrap().stock }

    #[tokio::test]
    async fn test_create_order_decrements_stock() {
        let f = fixture(5).await;
        let caller = Caller::customer(Uuid::now_v7());
        let order = f.orders.create_order(Some(&caller), checkout(vec![line(&f, 2)], None), Utc::now()).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.subtotal, 6_000_000);
        assert_eq!(order.total, order.subtotal + order.shipping_fee - order.discount);
        assert_eq!(order.items[0].name, "Nike Air Max 90 - Size 42 / Đen");
        assert_eq!(order.items[0].image.as_deref(), Some("/uploads/am90.jpg"));
        assert_eq!(stock_of(&f).await, 3);
        assert_eq!(f.store.product(f.product.id).await.unwrap().unwrap().total_stock, 13);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_whole_order() {
        let f = fixture(1).await;
        let items = vec![
            CheckoutItem { product: f.product.id, variant: Some(f.other.id), quantity: 2 },
            line(&f, 2),
        ];
        let err = f.orders.create_order(None, checkout(items, None), Utc::now()).await.unwrap_err();

        assert!(matches!(&err, AppError::InsufficientStock { available: 1, .. }), "got {err:?}");
        assert!(err.to_string().contains("Size 42 / Đen"));
        assert_eq!(stock_of(&f).await, 1);
        assert_eq!(f.store.variant(f.other.id).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_summed_for_stock_check() {
        let f = fixture(3).await;
        let err = f.orders.create_order(None, checkout(vec![line(&f, 2), line(&f, 2)], None), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 3, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unknown_product_or_variant_not_found() {
        let f = fixture(3).await;
        let missing_product = CheckoutItem { product: Uuid::now_v7(), variant: None, quantity: 1 };
        let err = f.orders.create_order(None, checkout(vec![missing_product], None), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("sản phẩm")));

        let missing_variant = CheckoutItem { product: f.product.id, variant: Some(Uuid::now_v7()), quantity: 1 };
        let err = f.orders.create_order(None, checkout(vec![line(&f, 1), missing_variant], None), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("biến thể sản phẩm")));
        assert_eq!(stock_of(&f).await, 3);
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let f = fixture(3).await;
        let err = f.orders.create_order(None, checkout(vec![], None), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Order(OrderError::NoItems)));
    }

    #[tokio::test]
    async fn test_coupon_applied_and_consumed_once() {
        let f = fixture(5).await;
        let coupon = add_coupon(&f.store, "giam10", CouponKind::Percentage, 10, 1).await;
        let order = f.orders.create_order(None, checkout(vec![line(&f, 1)], Some("GIAM10")), Utc::now()).await.unwrap();

        assert_eq!(order.discount, 300_000);
        assert_eq!(order.coupon, Some(coupon.id));
        assert_eq!(order.total, 3_000_000 + 30_000 - 300_000);

        let stored = f.store.coupon_by_code(&coupon.code).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 1);
        assert!(!stored.is_active);

        let err = f.orders.create_order(None, checkout(vec![line(&f, 1)], Some("giam10")), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Coupon(CouponError::Inactive)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_failed_order_does_not_consume_coupon() {
        let f = fixture(1).await;
        let coupon = add_coupon(&f.store, "FIXED50K", CouponKind::Fixed, 50_000, 0).await;
        let err = f.orders.create_order(None, checkout(vec![line(&f, 4)], Some("FIXED50K")), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));
        assert_eq!(f.store.coupon_by_code(&coupon.code).await.unwrap().unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn test_unavailable_coupon_reports_cause() {
        let f = fixture(5).await;
        let caller = Caller::customer(Uuid::now_v7());
        let mut order = f.orders.create_order(Some(&caller), checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();

        let mut switched_off = add_coupon(&f.store, "OFF10", CouponKind::Percentage, 10, 0).await;
        switched_off.id = Uuid::now_v7();
        switched_off.code = CouponCode::new("PAUSED10").unwrap();
        switched_off.is_active = false;
        f.store.insert_coupon(&switched_off).await.unwrap();
        order.coupon_code = Some(switched_off.code.clone());
        let err = f.orders.coupon_unavailable(&order).await;
        assert!(matches!(err, AppError::Coupon(CouponError::Inactive)), "got {err:?}");

        let used_up = add_coupon(&f.store, "ONCE", CouponKind::Fixed, 50_000, 1).await;
        f.orders.create_order(Some(&caller), checkout(vec![line(&f, 1)], Some("ONCE")), Utc::now()).await.unwrap();
        order.coupon_code = Some(used_up.code);
        let err = f.orders.coupon_unavailable(&order).await;
        assert!(matches!(err, AppError::Coupon(CouponError::Exhausted)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_negative_line_price_rejected() {
        let f = fixture(5).await;
        let mut cheap = Product::create("Dép tổ ong", 0, None, vec![], Utc::now()).unwrap();
        let mut variant = Variant::create(&cheap, Sku::new("DTO-40").unwrap(), "40", "Trắng", 0, 3, Utc::now()).unwrap();
        variant.additional_price = -10_000;
        cheap.total_stock = 3;
        f.store.insert_product(&cheap, &[variant.clone()]).await.unwrap();

        let item = CheckoutItem { product: cheap.id, variant: Some(variant.id), quantity: 1 };
        let err = f.orders.create_order(None, checkout(vec![item], None), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Order(OrderError::NegativePrice)), "got {err:?}");
        assert_eq!(f.store.variant(variant.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_unknown_coupon_rejected() {
        let f = fixture(5).await;
        let err = f.orders.create_order(None, checkout(vec![line(&f, 1)], Some("NOPE")), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Coupon(CouponError::NotFound)));
        assert_eq!(stock_of(&f).await, 5);
    }

    #[tokio::test]
    async fn test_checkout_clears_bought_cart_lines() {
        let f = fixture(5).await;
        let caller = Caller::customer(Uuid::now_v7());
        let mut cart = Cart::empty(caller.id, Utc::now());
        cart.add_item(CartItem::new(f.product.id, Some(f.variant.id), 2), Utc::now());
        cart.add_item(CartItem::new(Uuid::now_v7(), None, 1), Utc::now());
        f.store.save_cart(&cart).await.unwrap();

        f.orders.create_order(Some(&caller), checkout(vec![line(&f, 2)], None), Utc::now()).await.unwrap();
        assert_eq!(f.store.cart(caller.id).await.unwrap().item_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let f = fixture(5).await;
        let caller = Caller::customer(Uuid::now_v7());
        let order = f.orders.create_order(Some(&caller), checkout(vec![line(&f, 2)], None), Utc::now()).await.unwrap();
        assert_eq!(stock_of(&f).await, 3);

        let cancelled = f.orders.cancel_order(&caller, order.id, Some("Đặt nhầm size".into()), Utc::now()).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.status_history.len(), 2);
        assert_eq!(stock_of(&f).await, 5);
        assert_eq!(f.store.product(f.product.id).await.unwrap().unwrap().total_stock, 15);
    }

    #[tokio::test]
    async fn test_cancel_requires_owner_or_admin() {
        let f = fixture(5).await;
        let owner = Caller::customer(Uuid::now_v7());
        let order = f.orders.create_order(Some(&owner), checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();

        let stranger = Caller::customer(Uuid::now_v7());
        let err = f.orders.cancel_order(&stranger, order.id, None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let admin = Caller::admin(Uuid::now_v7());
        assert!(f.orders.cancel_order(&admin, order.id, None, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_after_shipment_rejected() {
        let f = fixture(5).await;
        let owner = Caller::customer(Uuid::now_v7());
        let order = f.orders.create_order(Some(&owner), checkout(vec![line(&f, 2)], None), Utc::now()).await.unwrap();
        f.orders.update_status(order.id, OrderStatus::Processing, None, Utc::now()).await.unwrap();
        f.orders.update_status(order.id, OrderStatus::Shipped, None, Utc::now()).await.unwrap();

        let err = f.orders.cancel_order(&owner, order.id, None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Transition(_)));
        assert_eq!(stock_of(&f).await, 3);
    }

    #[tokio::test]
    async fn test_cod_order_walks_to_delivered() {
        let f = fixture(5).await;
        let order = f.orders.create_order(None, checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();
        for to in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            f.orders.update_status(order.id, to, None, Utc::now()).await.unwrap();
        }
        let admin = Caller::admin(Uuid::now_v7());
        let delivered = f.orders.get_order(&admin, order.id).await.unwrap();
        assert_eq!(delivered.payment_status, PaymentStatus::Paid);
        assert_eq!(delivered.status_history.len(), 4);

        let err = f.orders.update_status(order.id, OrderStatus::Cancelled, None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Transition(_)));

        let stats = f.orders.statistics().await.unwrap();
        assert_eq!(stats.revenue, delivered.total);
        assert_eq!(stats.by_status.get("delivered"), Some(&1));
    }

    #[tokio::test]
    async fn test_refund_restocks_once() {
        let f = fixture(5).await;
        let order = f.orders.create_order(None, checkout(vec![line(&f, 2)], None), Utc::now()).await.unwrap();
        for to in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Refunded] {
            f.orders.update_status(order.id, to, None, Utc::now()).await.unwrap();
        }
        assert_eq!(stock_of(&f).await, 5);
        assert!(f.orders.update_status(order.id, OrderStatus::Refunded, None, Utc::now()).await.is_err());
        assert_eq!(stock_of(&f).await, 5);
    }

    #[tokio::test]
    async fn test_view_rules() {
        let f = fixture(5).await;
        let owner = Caller::customer(Uuid::now_v7());
        let order = f.orders.create_order(Some(&owner), checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();
        let stranger = Caller::customer(Uuid::now_v7());

        assert!(f.orders.get_order(&owner, order.id).await.is_ok());
        assert!(matches!(f.orders.get_order(&stranger, order.id).await, Err(AppError::Forbidden(_))));
        assert!(matches!(f.orders.get_order_by_number(None, &order.order_number).await, Err(AppError::Unauthenticated)));

        let guest = f.orders.create_order(None, checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();
        assert!(f.orders.get_order_by_number(None, &guest.order_number).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_my_orders_only_returns_own() {
        let f = fixture(10).await;
        let me = Caller::customer(Uuid::now_v7());
        let other = Caller::customer(Uuid::now_v7());
        f.orders.create_order(Some(&me), checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();
        f.orders.create_order(Some(&me), checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();
        f.orders.create_order(Some(&other), checkout(vec![line(&f, 1)], None), Utc::now()).await.unwrap();

        let page = f.orders.list_my_orders(&me, OrderFilter::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|o| o.is_owned_by(me.id)));
    }
}
