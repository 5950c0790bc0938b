//! Coupon endpoints.

use axum::{extract::{rejection::JsonRejection, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::{auth::Admin, response::ApiResponse, AppState};
use crate::domain::aggregates::{Coupon, CouponDraft, CouponKind};
use crate::domain::value_objects::CouponCode;
use crate::error::AppResult;
use crate::service::CouponPreview;

fn default_active() -> bool { true }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 32, message = "Mã giảm giá phải từ 3 đến 32 ký tự"))]
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub value: i64,
    #[serde(default)]
    pub min_order_amount: i64,
    #[serde(default)]
    pub max_usage: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "Vui lòng nhập mã giảm giá"))]
    pub code: String,
    #[validate(range(min = 0, message = "Giá trị đơn hàng không hợp lệ"))]
    pub order_amount: i64,
}

pub async fn create_coupon(
    State(state): State<AppState>,
    _admin: Admin,
    payload: Result<Json<CreateCouponRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Coupon>>)> {
    let Json(request) = payload?;
    request.validate()?;
    let draft = CouponDraft {
        code: CouponCode::new(&request.code)?, kind: request.kind, value: request.value,
        min_order_amount: request.min_order_amount, max_usage: request.max_usage,
        start_date: request.start_date, end_date: request.end_date, is_active: request.is_active,
    };
    let coupon = state.coupons.create(draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Tạo mã giảm giá thành công", coupon))))
}

pub async fn list_coupons(State(state): State<AppState>, _admin: Admin) -> AppResult<Json<ApiResponse<Vec<Coupon>>>> {
    let coupons = state.coupons.list().await?;
    Ok(Json(ApiResponse::ok("Lấy danh sách mã giảm giá thành công", coupons)))
}

pub async fn validate_coupon(
    State(state): State<AppState>,
    payload: Result<Json<ValidateCouponRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<CouponPreview>>> {
    let Json(request) = payload?;
    request.validate()?;
    let code = CouponCode::new(&request.code)?;
    let preview = state.coupons.preview(&code, request.order_amount, Utc::now()).await?;
    Ok(Json(ApiResponse::ok("Mã giảm giá hợp lệ", preview)))
}
