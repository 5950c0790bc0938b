//! Product and cart endpoints used by the storefront before checkout.

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{auth::Admin, response::ApiResponse, AppState};
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::Sku;
use crate::error::AppResult;
use crate::service::{Caller, NewProduct, NewVariant, ProductDetails};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Tên sản phẩm không được để trống"))]
    pub name: String,
    #[validate(range(min = 0, message = "Giá sản phẩm không hợp lệ"))]
    pub price: i64,
    pub sale_price: Option<i64>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub variants: Vec<VariantRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariantRequest {
    #[validate(length(min = 1, max = 50, message = "SKU không hợp lệ"))]
    pub sku: String,
    #[validate(length(min = 1, max = 10, message = "Kích cỡ không được để trống"))]
    pub size: String,
    #[validate(length(min = 1, max = 50, message = "Màu sắc không được để trống"))]
    pub color: String,
    #[serde(default)]
    pub additional_price: i64,
    #[validate(range(min = 0, message = "Tồn kho không hợp lệ"))]
    pub stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product: Uuid,
    pub variant: Option<Uuid>,
    #[validate(range(min = 1, max = 100, message = "Số lượng phải từ 1 đến 100"))]
    pub quantity: i32,
}

pub async fn create_product(
    State(state): State<AppState>,
    _admin: Admin,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductDetails>>)> {
    let Json(request) = payload?;
    request.validate()?;
    let mut variants = Vec::with_capacity(request.variants.len());
    for variant in request.variants {
        variant.validate()?;
        variants.push(NewVariant {
            sku: Sku::new(variant.sku)?, size: variant.size.trim().to_string(), color: variant.color.trim().to_string(),
            additional_price: variant.additional_price, stock: variant.stock,
        });
    }
    let input = NewProduct {
        name: request.name.trim().to_string(), price: request.price, sale_price: request.sale_price,
        images: request.images, stock: request.stock, variants,
    };
    let product = state.catalog.create_product(input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Tạo sản phẩm thành công", product))))
}

pub async fn get_product(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<ProductDetails>>> {
    let Path(id) = id?;
    let product = state.catalog.product(id).await?;
    Ok(Json(ApiResponse::ok("Lấy thông tin sản phẩm thành công", product)))
}

pub async fn get_cart(State(state): State<AppState>, caller: Caller) -> AppResult<Json<ApiResponse<Cart>>> {
    let cart = state.catalog.cart(caller.id).await?;
    Ok(Json(ApiResponse::ok("Lấy giỏ hàng thành công", cart)))
}

pub async fn add_cart_item(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<AddCartItemRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let Json(request) = payload?;
    request.validate()?;
    let cart = state.catalog
        .add_to_cart(caller.id, request.product, request.variant, request.quantity, Utc::now())
        .await?;
    Ok(Json(ApiResponse::ok("Đã thêm sản phẩm vào giỏ hàng", cart)))
}
