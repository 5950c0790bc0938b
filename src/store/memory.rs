//! In-process store used for local runs without `DATABASE_URL` and in tests.
//!
//! One mutex guards all collections, so every trait operation is a single
//! critical section. Multi-record writes stage their changes on copies and
//! only swap them in once every check has passed.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{OrderFilter, Page, Placement, PlacementError, StatusUpdate, Store, StoreError, StoreResult};
use crate::domain::aggregates::{Cart, Coupon, Order, OrderStatistics, PaymentStatus, Product, Variant};
use crate::domain::value_objects::CouponCode;

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, Variant>,
    coupons: HashMap<Uuid, Coupon>,
    carts: HashMap<Uuid, Cart>,
    orders: Vec<Order>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_product(&self, product: &Product, variants: &[Variant]) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.id) { return Err(StoreError::Duplicate("product")); }
        for (i, v) in variants.iter().enumerate() {
            let taken = state.variants.values().any(|o| o.sku == v.sku) || variants[..i].iter().any(|o| o.sku == v.sku);
            if taken { return Err(StoreError::Duplicate("sku")); }
        }
        state.products.insert(product.id, product.clone());
        state.variants.extend(variants.iter().map(|v| (v.id, v.clone())));
        Ok(())
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn variant(&self, id: Uuid) -> StoreResult<Option<Variant>> {
        Ok(self.state.lock().await.variants.get(&id).cloned())
    }

    async fn variants_of(&self, product: Uuid) -> StoreResult<Vec<Variant>> {
        let state = self.state.lock().await;
        let mut variants: Vec<Variant> = state.variants.values().filter(|v| v.product == product).cloned().collect();
        variants.sort_by(|a, b| a.sku.as_str().cmp(b.sku.as_str()));
        Ok(variants)
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.coupons.values().any(|c| c.code == coupon.code) { return Err(StoreError::Duplicate("coupon")); }
        state.coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn coupon_by_code(&self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        Ok(self.state.lock().await.coupons.values().find(|c| &c.code == code).cloned())
    }

    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        let mut coupons: Vec<Coupon> = self.state.lock().await.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn cart(&self, user: Uuid) -> StoreResult<Cart> {
        let state = self.state.lock().await;
        Ok(state.carts.get(&user).cloned().unwrap_or_else(|| Cart::empty(user, chrono::Utc::now())))
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        self.state.lock().await.carts.insert(cart.user, cart.clone());
        Ok(())
    }

    async fn place_order(&self, placement: &Placement) -> Result<(), PlacementError> {
        let mut state = self.state.lock().await;
        let at = placement.at();
        let order = &placement.order;
        if state.orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(PlacementError::DuplicateOrderNumber);
        }

        let coupon = match placement.coupon {
            Some(id) => {
                let mut coupon = state.coupons.get(&id).cloned().ok_or(PlacementError::CouponUnavailable)?;
                if !coupon.is_active || coupon.is_exhausted() { return Err(PlacementError::CouponUnavailable); }
                coupon.record_usage(at);
                Some(coupon)
            }
            None => None,
        };

        let mut variants = Vec::new();
        let mut products = Vec::new();
        for line in &placement.stock {
            if let Some(id) = line.variant {
                let mut variant = state.variants.get(&id).cloned().ok_or(PlacementError::MissingVariant(id))?;
                variant.take_stock(line.quantity, at)
                    .map_err(|_| PlacementError::InsufficientStock { variant: id, available: variant.stock })?;
                variants.push(variant);
            }
            let staged = products.iter_mut().find(|p: &&mut Product| p.id == line.product);
            match staged {
                Some(product) => product.adjust_total_stock(-line.quantity, at),
                None => {
                    if let Some(mut product) = state.products.get(&line.product).cloned() {
                        product.adjust_total_stock(-line.quantity, at);
                        products.push(product);
                    }
                }
            }
        }

        // Every check passed; apply the staged writes.
        if let Some(coupon) = coupon { state.coupons.insert(coupon.id, coupon); }
        for v in variants { state.variants.insert(v.id, v); }
        for p in products { state.products.insert(p.id, p); }
        if let (Some(user), false) = (order.user, placement.cart_items.is_empty()) {
            if let Some(cart) = state.carts.get_mut(&user) { cart.remove_items(&placement.cart_items, at); }
        }
        state.orders.push(order.clone());
        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_by_number(&self, number: &str) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.iter().find(|o| o.order_number == number).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Page<Order>> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Order> = state.orders.iter().filter(|o| filter.matches(o)).collect();
        matching.sort_by(|a, b| filter.sort.compare(a, b));
        let total = matching.len() as i64;
        let items = matching.into_iter().skip(filter.offset() as usize).take(filter.limit as usize).cloned().collect();
        Ok(Page { items, total })
    }

    async fn save_transition(&self, update: &StatusUpdate) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let at = update.order.updated_at;
        let slot = state.orders.iter().position(|o| o.id == update.order.id).ok_or(StoreError::NotFound)?;
        if state.orders[slot].status != update.expected { return Err(StoreError::Conflict); }
        state.orders[slot] = update.order.clone();

        for line in &update.restock {
            if let Some(variant) = line.variant.and_then(|id| state.variants.get_mut(&id)) {
                variant.restock(line.quantity, at);
            }
            if let Some(product) = state.products.get_mut(&line.product) {
                product.adjust_total_stock(line.quantity, at);
            }
        }
        Ok(())
    }

    async fn order_statistics(&self) -> StoreResult<OrderStatistics> {
        let state = self.state.lock().await;
        let revenue = state.orders.iter().filter(|o| o.payment_status == PaymentStatus::Paid).map(|o| o.total).sum();
        Ok(OrderStatistics::from_counts(state.orders.iter().map(|o| (o.status, 1)), revenue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use crate::domain::aggregates::{LineItem, OrderDraft, OrderStatus, PaymentMethod, ShippingAddress};
    use crate::domain::value_objects::{Sku, Vnd};
    use crate::store::OrderSort;

    async fn seed(store: &MemoryStore, stock: i32) -> (Product, Variant) {
        let now = Utc::now();
        let mut product = Product::create("New Balance 550", 2_900_000, None, vec![], now).unwrap();
        let variant = Variant::create(&product, Sku::new(format!("NB550-{}", Uuid::now_v7())).unwrap(), "42", "Trắng", 0, stock, now).unwrap();
        product.total_stock = stock;
        store.insert_product(&product, &[variant.clone()]).await.unwrap();
        (product, variant)
    }

    async fn place(store: &MemoryStore, variant: &Variant, price: Vnd, number: &str, at: DateTime<Utc>) -> Order {
        let draft = OrderDraft {
            user: None,
            items: vec![LineItem {
                product: variant.product, variant: Some(variant.id), name: "New Balance 550 - Size 42 / Trắng".into(),
                sku: Some(variant.sku.to_string()), price, image: None, quantity: 1,
            }],
            shipping_fee: 0, coupon: None, payment_method: PaymentMethod::Cod, notes: None,
            shipping_address: ShippingAddress::default(),
        };
        let order = Order::place(draft, number.into(), at).unwrap();
        let placement = Placement { stock: order.stock_lines(), coupon: None, cart_items: vec![], order };
        store.place_order(&placement).await.unwrap();
        placement.order
    }

    #[tokio::test]
    async fn test_stale_transition_conflicts_without_restocking() {
        let store = MemoryStore::new();
        let (_, variant) = seed(&store, 5).await;
        let order = place(&store, &variant, 100_000, "ORD0001", Utc::now()).await;
        assert_eq!(store.variant(variant.id).await.unwrap().unwrap().stock, 4);

        let mut cancelled = order.clone();
        let transition = cancelled.cancel(None, Utc::now()).unwrap();
        let update = StatusUpdate { restock: cancelled.stock_lines(), order: cancelled.clone(), expected: transition.from };
        store.save_transition(&update).await.unwrap();
        assert_eq!(store.variant(variant.id).await.unwrap().unwrap().stock, 5);

        // A second writer still holding the pending copy.
        let mut racing = order.clone();
        let transition = racing.transition(OrderStatus::Cancelled, None, Utc::now()).unwrap();
        let update = StatusUpdate { restock: racing.stock_lines(), order: racing, expected: transition.from };
        let err = store.save_transition(&update).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict), "got {err:?}");

        assert_eq!(store.variant(variant.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.order(order.id).await.unwrap().unwrap(), cancelled);
    }

    #[tokio::test]
    async fn test_total_sort_breaks_ties_newest_first() {
        let store = MemoryStore::new();
        let (_, variant) = seed(&store, 10).await;
        let t0 = Utc::now();
        let first = place(&store, &variant, 100_000, "ORD0001", t0).await;
        let big = place(&store, &variant, 200_000, "ORD0002", t0 + Duration::seconds(1)).await;
        let last = place(&store, &variant, 100_000, "ORD0003", t0 + Duration::seconds(2)).await;

        let ids = |page: Page<Order>| page.items.into_iter().map(|o| o.id).collect::<Vec<_>>();
        let filter = |sort| OrderFilter { sort, ..OrderFilter::default() };

        assert_eq!(ids(store.list_orders(&filter(OrderSort::TotalDesc)).await.unwrap()), vec![big.id, last.id, first.id]);
        assert_eq!(ids(store.list_orders(&filter(OrderSort::TotalAsc)).await.unwrap()), vec![last.id, first.id, big.id]);
        assert_eq!(ids(store.list_orders(&filter(OrderSort::Newest)).await.unwrap()), vec![last.id, big.id, first.id]);
    }
}
