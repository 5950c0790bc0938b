//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, types::Json, FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{OrderFilter, Page, Placement, PlacementError, StatusUpdate, Store, StoreError, StoreResult};
use crate::domain::aggregates::{
    Cart, CartItem, Coupon, LineItem, Order, OrderStatistics, OrderStatus, Product, ShippingAddress, StatusChange,
    StockLine, Variant,
};
use crate::domain::value_objects::{CouponCode, Sku};

const TAKE_VARIANT_STOCK_SQL: &str = "UPDATE product_variants \
    SET stock = stock - $2, status = CASE WHEN stock - $2 > 0 THEN 'active' ELSE 'out_of_stock' END, updated_at = $3 \
    WHERE id = $1 AND stock >= $2";
const RETURN_VARIANT_STOCK_SQL: &str = "UPDATE product_variants \
    SET stock = stock + $2, status = CASE WHEN stock + $2 > 0 THEN 'active' ELSE 'out_of_stock' END, updated_at = $3 \
    WHERE id = $1";
const ADJUST_TOTAL_STOCK_SQL: &str = "UPDATE products SET total_stock = GREATEST(total_stock + $2, 0), updated_at = $3 WHERE id = $1";
const CONSUME_COUPON_SQL: &str = "UPDATE coupons \
    SET usage_count = usage_count + 1, \
        is_active = CASE WHEN max_usage > 0 AND usage_count + 1 >= max_usage THEN FALSE ELSE is_active END, \
        updated_at = $2 \
    WHERE id = $1 AND is_active AND (max_usage = 0 OR usage_count < max_usage)";
const INSERT_ORDER_SQL: &str = "INSERT INTO orders (id, order_number, user_id, items, subtotal, shipping_fee, discount, total, \
    coupon_id, coupon_code, payment_method, payment_status, notes, shipping_address, status, status_history, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)";
const UPDATE_ORDER_STATUS_SQL: &str = "UPDATE orders \
    SET status = $2, payment_status = $3, status_history = $4, updated_at = $5 \
    WHERE id = $1 AND status = $6";

#[derive(Debug, Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }
}

#[derive(Debug, FromRow)]
struct ProductRow { id: Uuid, name: String, price: i64, sale_price: Option<i64>, images: Vec<String>, total_stock: i32, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Debug, FromRow)]
struct VariantRow { id: Uuid, product_id: Uuid, sku: String, size: String, color: String, additional_price: i64, stock: i32, status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Debug, FromRow)]
struct CouponRow {
    id: Uuid, code: String, kind: String, value: i64, min_order_amount: i64, max_usage: i32, usage_count: i32,
    start_date: DateTime<Utc>, end_date: DateTime<Utc>, is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CartItemRow { id: Uuid, product_id: Uuid, variant_id: Option<Uuid>, quantity: i32, created_at: DateTime<Utc> }

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, user_id: Option<Uuid>, items: Json<Vec<LineItem>>,
    subtotal: i64, shipping_fee: i64, discount: i64, total: i64,
    coupon_id: Option<Uuid>, coupon_code: Option<String>, payment_method: String, payment_status: String,
    notes: Option<String>, shipping_address: Json<ShippingAddress>, status: String,
    status_history: Json<Vec<StatusChange>>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

fn corrupt(field: &str) -> impl Fn(String) -> StoreError + '_ {
    move |e| StoreError::Corrupt(format!("{field}: {e}"))
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product { id: r.id, name: r.name, price: r.price, sale_price: r.sale_price, images: r.images, total_stock: r.total_stock, created_at: r.created_at, updated_at: r.updated_at }
    }
}

impl TryFrom<VariantRow> for Variant {
    type Error = StoreError;
    fn try_from(r: VariantRow) -> Result<Self, Self::Error> {
        Ok(Variant {
            id: r.id, product: r.product_id, sku: Sku::new(r.sku).map_err(|e| corrupt("sku")(e.to_string()))?,
            size: r.size, color: r.color, additional_price: r.additional_price, stock: r.stock,
            status: r.status.parse().map_err(corrupt("status"))?, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;
    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: r.id, code: CouponCode::new(r.code).map_err(|e| corrupt("code")(e.to_string()))?,
            kind: r.kind.parse().map_err(corrupt("kind"))?, value: r.value, min_order_amount: r.min_order_amount,
            max_usage: r.max_usage, usage_count: r.usage_count, start_date: r.start_date, end_date: r.end_date,
            is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: r.id, order_number: r.order_number, user: r.user_id, items: r.items.0,
            subtotal: r.subtotal, shipping_fee: r.shipping_fee, discount: r.discount, total: r.total,
            coupon: r.coupon_id,
            coupon_code: r.coupon_code.map(CouponCode::new).transpose().map_err(|e| corrupt("coupon_code")(e.to_string()))?,
            payment_method: r.payment_method.parse().map_err(corrupt("payment_method"))?,
            payment_status: r.payment_status.parse().map_err(corrupt("payment_status"))?,
            notes: r.notes, shipping_address: r.shipping_address.0,
            status: r.status.parse().map_err(corrupt("status"))?, status_history: r.status_history.0,
            created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

async fn return_stock(tx: &mut Transaction<'_, Postgres>, lines: &[StockLine], at: DateTime<Utc>) -> Result<(), sqlx::Error> {
    for line in lines {
        if let Some(variant) = line.variant {
            sqlx::query(RETURN_VARIANT_STOCK_SQL).bind(variant).bind(line.quantity).bind(at).execute(&mut **tx).await?;
        }
        sqlx::query(ADJUST_TOTAL_STOCK_SQL).bind(line.product).bind(line.quantity).bind(at).execute(&mut **tx).await?;
    }
    Ok(())
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(user) = filter.user { qb.push(" AND user_id = ").push_bind(user); }
    if let Some(status) = filter.status { qb.push(" AND status = ").push_bind(status.as_str()); }
    if let Some(payment) = filter.payment_status { qb.push(" AND payment_status = ").push_bind(payment.as_str()); }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_product(&self, product: &Product, variants: &[Variant]) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT INTO products (id, name, price, sale_price, images, total_stock, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(product.id).bind(&product.name).bind(product.price).bind(product.sale_price).bind(&product.images)
            .bind(product.total_stock).bind(product.created_at).bind(product.updated_at)
            .execute(&mut *tx).await?;
        for v in variants {
            sqlx::query("INSERT INTO product_variants (id, product_id, sku, size, color, additional_price, stock, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
                .bind(v.id).bind(v.product).bind(v.sku.as_str()).bind(&v.size).bind(&v.color).bind(v.additional_price)
                .bind(v.stock).bind(v.status.as_str()).bind(v.created_at).bind(v.updated_at)
                .execute(&mut *tx).await
                .map_err(|e| match StoreError::from(e) { StoreError::Duplicate(_) => StoreError::Duplicate("sku"), other => other })?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(Product::from))
    }

    async fn variant(&self, id: Uuid) -> StoreResult<Option<Variant>> {
        sqlx::query_as::<_, VariantRow>("SELECT * FROM product_variants WHERE id = $1").bind(id)
            .fetch_optional(&self.db).await?.map(Variant::try_from).transpose()
    }

    async fn variants_of(&self, product: Uuid) -> StoreResult<Vec<Variant>> {
        sqlx::query_as::<_, VariantRow>("SELECT * FROM product_variants WHERE product_id = $1 ORDER BY sku").bind(product)
            .fetch_all(&self.db).await?.into_iter().map(Variant::try_from).collect()
    }

    async fn insert_coupon(&self, c: &Coupon) -> StoreResult<()> {
        sqlx::query("INSERT INTO coupons (id, code, kind, value, min_order_amount, max_usage, usage_count, start_date, end_date, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)")
            .bind(c.id).bind(c.code.as_str()).bind(c.kind.as_str()).bind(c.value).bind(c.min_order_amount).bind(c.max_usage)
            .bind(c.usage_count).bind(c.start_date).bind(c.end_date).bind(c.is_active).bind(c.created_at).bind(c.updated_at)
            .execute(&self.db).await
            .map_err(|e| match StoreError::from(e) { StoreError::Duplicate(_) => StoreError::Duplicate("coupon"), other => other })?;
        Ok(())
    }

    async fn coupon_by_code(&self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1").bind(code.as_str())
            .fetch_optional(&self.db).await?.map(Coupon::try_from).transpose()
    }

    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC")
            .fetch_all(&self.db).await?.into_iter().map(Coupon::try_from).collect()
    }

    async fn cart(&self, user: Uuid) -> StoreResult<Cart> {
        let rows = sqlx::query_as::<_, CartItemRow>("SELECT id, product_id, variant_id, quantity, created_at FROM cart_items WHERE user_id = $1 ORDER BY created_at, id")
            .bind(user).fetch_all(&self.db).await?;
        let updated_at = rows.iter().map(|r| r.created_at).max().unwrap_or_else(Utc::now);
        let items = rows.into_iter().map(|r| CartItem { id: r.id, product: r.product_id, variant: r.variant_id, quantity: r.quantity }).collect();
        Ok(Cart { user, items, updated_at })
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(cart.user).execute(&mut *tx).await?;
        for item in &cart.items {
            sqlx::query("INSERT INTO cart_items (id, user_id, product_id, variant_id, quantity, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(item.id).bind(cart.user).bind(item.product).bind(item.variant).bind(item.quantity).bind(cart.updated_at)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(order_number = %placement.order.order_number))]
    async fn place_order(&self, placement: &Placement) -> Result<(), PlacementError> {
        let at = placement.at();
        let o = &placement.order;
        // Dropping `tx` on any early return rolls every step back.
        let mut tx = self.db.begin().await?;

        if let Some(coupon) = placement.coupon {
            let consumed = sqlx::query(CONSUME_COUPON_SQL).bind(coupon).bind(at).execute(&mut *tx).await?;
            if consumed.rows_affected() == 0 { return Err(PlacementError::CouponUnavailable); }
        }

        for line in &placement.stock {
            if let Some(variant) = line.variant {
                let taken = sqlx::query(TAKE_VARIANT_STOCK_SQL).bind(variant).bind(line.quantity).bind(at).execute(&mut *tx).await?;
                if taken.rows_affected() == 0 {
                    let stock: Option<(i32,)> = sqlx::query_as("SELECT stock FROM product_variants WHERE id = $1")
                        .bind(variant).fetch_optional(&mut *tx).await?;
                    return Err(match stock {
                        Some((available,)) => PlacementError::InsufficientStock { variant, available },
                        None => PlacementError::MissingVariant(variant),
                    });
                }
            }
            sqlx::query(ADJUST_TOTAL_STOCK_SQL).bind(line.product).bind(-line.quantity).bind(at).execute(&mut *tx).await?;
        }

        sqlx::query(INSERT_ORDER_SQL)
            .bind(o.id).bind(&o.order_number).bind(o.user).bind(Json(&o.items))
            .bind(o.subtotal).bind(o.shipping_fee).bind(o.discount).bind(o.total)
            .bind(o.coupon).bind(o.coupon_code.as_ref().map(CouponCode::as_str))
            .bind(o.payment_method.as_str()).bind(o.payment_status.as_str()).bind(&o.notes)
            .bind(Json(&o.shipping_address)).bind(o.status.as_str()).bind(Json(&o.status_history))
            .bind(o.created_at).bind(o.updated_at)
            .execute(&mut *tx).await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Duplicate(_) => PlacementError::DuplicateOrderNumber,
                other => PlacementError::Store(other),
            })?;

        if let (Some(user), false) = (o.user, placement.cart_items.is_empty()) {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
                .bind(user).bind(&placement.cart_items).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id)
            .fetch_optional(&self.db).await?.map(Order::try_from).transpose()
    }

    async fn order_by_number(&self, number: &str) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_number = $1").bind(number)
            .fetch_optional(&self.db).await?.map(Order::try_from).transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Page<Order>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders WHERE TRUE");
        push_order_filters(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM orders WHERE TRUE");
        push_order_filters(&mut select, filter);
        select.push(" ORDER BY ").push(filter.sort.sql())
            .push(" LIMIT ").push_bind(i64::from(filter.limit))
            .push(" OFFSET ").push_bind(i64::from(filter.offset()));
        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(&self.db).await?;

        let items = rows.into_iter().map(Order::try_from).collect::<StoreResult<Vec<_>>>()?;
        Ok(Page { items, total })
    }

    #[tracing::instrument(skip_all, fields(order_number = %update.order.order_number))]
    async fn save_transition(&self, update: &StatusUpdate) -> StoreResult<()> {
        let o = &update.order;
        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(UPDATE_ORDER_STATUS_SQL)
            .bind(o.id).bind(o.status.as_str()).bind(o.payment_status.as_str()).bind(Json(&o.status_history))
            .bind(o.updated_at).bind(update.expected.as_str())
            .execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1").bind(o.id).fetch_optional(&mut *tx).await?;
            return Err(if exists.is_some() { StoreError::Conflict } else { StoreError::NotFound });
        }
        return_stock(&mut tx, &update.restock, o.updated_at).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn order_statistics(&self) -> StoreResult<OrderStatistics> {
        let counts: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status").fetch_all(&self.db).await?;
        let (revenue,): (i64,) = sqlx::query_as("SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders WHERE payment_status = 'paid'")
            .fetch_one(&self.db).await?;
        let counts = counts.into_iter()
            .map(|(status, n)| status.parse::<OrderStatus>().map(|s| (s, n)).map_err(corrupt("status")))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(OrderStatistics::from_counts(counts, revenue))
    }
}
