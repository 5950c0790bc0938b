//! Order endpoints.

use axum::{
    extract::{rejection::{JsonRejection, PathRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{auth::{Admin, OptionalCaller}, response::{ApiResponse, PageMeta}, AppState};
use crate::domain::aggregates::{Order, OrderStatistics, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};
use crate::domain::value_objects::CouponCode;
use crate::error::{AppError, AppResult};
use crate::service::{Caller, Checkout, CheckoutItem};
use crate::store::{OrderFilter, OrderSort, Page};

/// Largest page an order listing returns.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressRequest {
    #[validate(length(min = 1, max = 100, message = "Họ tên không được để trống"))]
    pub full_name: String,
    #[validate(email(message = "Email không hợp lệ"))]
    pub email: String,
    #[validate(length(min = 8, max = 15, message = "Số điện thoại không hợp lệ"))]
    pub phone: String,
    #[validate(length(min = 1, max = 255, message = "Địa chỉ không được để trống"))]
    pub address: String,
    #[validate(length(min = 1, max = 100, message = "Tỉnh/thành phố không được để trống"))]
    pub city: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product: Uuid,
    pub variant: Option<Uuid>,
    #[validate(range(min = 1, max = 100, message = "Số lượng phải từ 1 đến 100"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddressRequest,
    #[validate(length(min = 1, message = "Đơn hàng phải có ít nhất một sản phẩm"))]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500, message = "Ghi chú tối đa 500 ký tự"))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Phí vận chuyển không hợp lệ"))]
    pub shipping_fee: i64,
    pub coupon_code: Option<String>,
}

impl CreateOrderRequest {
    /// Validates the payload and its nested parts. Client-side prices and
    /// totals are not part of the request; unknown fields are ignored.
    fn into_checkout(self) -> AppResult<Checkout> {
        self.validate()?;
        self.shipping_address.validate()?;
        for item in &self.items {
            item.validate()?;
        }
        let coupon_code = match self.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(CouponCode::new(code)?),
            _ => None,
        };
        let address = self.shipping_address;
        Ok(Checkout {
            shipping_address: ShippingAddress {
                full_name: address.full_name.trim().to_string(), email: address.email.trim().to_string(),
                phone: address.phone.trim().to_string(), address: address.address.trim().to_string(),
                city: address.city.trim().to_string(),
            },
            items: self.items.into_iter()
                .map(|i| CheckoutItem { product: i.product, variant: i.variant, quantity: i.quantity })
                .collect(),
            payment_method: self.payment_method,
            notes: self.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            shipping_fee: self.shipping_fee,
            coupon_code,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub sort: Option<String>,
}

impl OrderListQuery {
    fn into_filter(self) -> AppResult<OrderFilter> {
        let defaults = OrderFilter::default();
        let sort = match self.sort.as_deref() {
            Some(value) => OrderSort::parse(value)
                .ok_or_else(|| AppError::Validation(format!("Kiểu sắp xếp không hợp lệ: {value}")))?,
            None => defaults.sort,
        };
        Ok(OrderFilter {
            status: self.status,
            payment_status: self.payment_status,
            sort,
            page: self.page.unwrap_or(defaults.page).max(1),
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
            ..defaults
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 500, message = "Ghi chú tối đa 500 ký tự"))]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[validate(length(max = 500, message = "Lý do tối đa 500 ký tự"))]
    pub reason: Option<String>,
}

fn paged(message: &str, filter: &OrderFilter, page: Page<Order>) -> Json<ApiResponse<Vec<Order>>> {
    Json(ApiResponse::ok(message, page.items).with_meta(PageMeta::new(filter.page, filter.limit, page.total)))
}

pub async fn create_order(
    State(state): State<AppState>,
    OptionalCaller(caller): OptionalCaller,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let Json(request) = payload?;
    let checkout = request.into_checkout()?;
    let order = state.orders.create_order(caller.as_ref(), checkout, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Đặt hàng thành công", order))))
}

pub async fn list_orders(
    State(state): State<AppState>,
    _admin: Admin,
    query: Result<Query<OrderListQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    let page = state.orders.list_orders(&filter).await?;
    Ok(paged("Lấy danh sách đơn hàng thành công", &filter, page))
}

pub async fn list_my_orders(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<OrderListQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    let page = state.orders.list_my_orders(&caller, filter.clone()).await?;
    Ok(paged("Lấy danh sách đơn hàng thành công", &filter, page))
}

pub async fn statistics(State(state): State<AppState>, _admin: Admin) -> AppResult<Json<ApiResponse<OrderStatistics>>> {
    let stats = state.orders.statistics().await?;
    Ok(Json(ApiResponse::ok("Lấy thống kê đơn hàng thành công", stats)))
}

pub async fn get_order_by_number(
    State(state): State<AppState>,
    OptionalCaller(caller): OptionalCaller,
    Path(number): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.get_order_by_number(caller.as_ref(), number.trim()).await?;
    Ok(Json(ApiResponse::ok("Lấy thông tin đơn hàng thành công", order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let Path(id) = id?;
    let order = state.orders.get_order(&caller, id).await?;
    Ok(Json(ApiResponse::ok("Lấy thông tin đơn hàng thành công", order)))
}

pub async fn update_status(
    State(state): State<AppState>,
    _admin: Admin,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let Path(id) = id?;
    let Json(request) = payload?;
    request.validate()?;
    let note = request.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let order = state.orders.update_status(id, request.status, note, Utc::now()).await?;
    Ok(Json(ApiResponse::ok("Cập nhật trạng thái đơn hàng thành công", order)))
}

/// The body is optional; a bare `PATCH` cancels without a reason.
pub async fn cancel_order(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Option<Json<CancelRequest>>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let Path(id) = id?;
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let reason = request.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    let order = state.orders.cancel_order(&caller, id, reason, Utc::now()).await?;
    Ok(Json(ApiResponse::ok("Hủy đơn hàng thành công", order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(json).unwrap()
    }

    fn body() -> serde_json::Value {
        serde_json::json!({
            "shippingAddress": {
                "fullName": "Nguyễn Văn A", "email": "a@example.com", "phone": "0901234567",
                "address": "12 Lê Lợi", "city": "Hồ Chí Minh"
            },
            "items": [{"product": Uuid::now_v7(), "quantity": 2, "price": 1}],
            "subtotal": 2,
            "total": 2
        })
    }

    #[test]
    fn test_checkout_defaults() {
        let checkout = request(body()).into_checkout().unwrap();
        assert_eq!(checkout.payment_method, PaymentMethod::Cod);
        assert_eq!(checkout.shipping_fee, 0);
        assert!(checkout.coupon_code.is_none());
        assert_eq!(checkout.items[0].quantity, 2);
    }

    #[test]
    fn test_blank_coupon_ignored() {
        let mut json = body();
        json["couponCode"] = serde_json::json!("  ");
        assert!(request(json).into_checkout().unwrap().coupon_code.is_none());

        let mut json = body();
        json["couponCode"] = serde_json::json!(" sale10 ");
        assert_eq!(request(json).into_checkout().unwrap().coupon_code.unwrap().as_str(), "SALE10");
    }

    #[test]
    fn test_nested_validation() {
        let mut json = body();
        json["shippingAddress"]["email"] = serde_json::json!("not-an-email");
        let err = request(json).into_checkout().unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("Email không hợp lệ")), "got {err:?}");

        let mut json = body();
        json["items"][0]["quantity"] = serde_json::json!(0);
        assert!(matches!(request(json).into_checkout(), Err(AppError::Validation(_))));

        let mut json = body();
        json["items"] = serde_json::json!([]);
        assert!(matches!(request(json).into_checkout(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_list_query_limits() {
        let filter = OrderListQuery { page: Some(0), limit: Some(500), ..Default::default() }.into_filter().unwrap();
        assert_eq!((filter.page, filter.limit), (1, MAX_PAGE_SIZE));

        let filter = OrderListQuery { sort: Some("total_asc".into()), ..Default::default() }.into_filter().unwrap();
        assert_eq!(filter.sort, OrderSort::TotalAsc);
        assert_eq!(filter.limit, 10);

        let err = OrderListQuery { sort: Some("price".into()), ..Default::default() }.into_filter().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
