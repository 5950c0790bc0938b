//! Errors surfaced to API clients.
//!
//! Every variant carries the Vietnamese message the storefront shows as-is;
//! internal failures are logged and replaced by a generic message.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::domain::aggregates::{CouponDefinitionError, CouponError, OrderError, ProductError, TransitionError};
use crate::domain::value_objects::CodeError;
use crate::http::response::ApiResponse;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    CouponDefinition(#[from] CouponDefinitionError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Sản phẩm \"{name}\" chỉ còn {available} sản phẩm trong kho")]
    InsufficientStock { name: String, available: i32 },

    #[error("Không tìm thấy {0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Đơn hàng vừa được cập nhật bởi một yêu cầu khác, vui lòng thử lại")]
    ConcurrentUpdate,

    #[error("Vui lòng đăng nhập để tiếp tục")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Đã xảy ra lỗi, vui lòng thử lại sau")]
    Internal(#[source] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Order(_) | Self::Coupon(_) | Self::CouponDefinition(_) | Self::Product(_)
            | Self::Transition(_) | Self::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::ConcurrentUpdate => StatusCode::CONFLICT,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => Self::ConcurrentUpdate,
            StoreError::Duplicate(what) => Self::Conflict(format!("Dữ liệu đã tồn tại ({what})")),
            StoreError::InvalidReference => Self::Validation("Dữ liệu tham chiếu không tồn tại".into()),
            other => Self::Internal(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<String> = errors.field_errors().into_iter()
            .flat_map(|(field, errs)| errs.iter().map(move |e| {
                let message = e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string());
                format!("{field}: {message}")
            }))
            .collect();
        details.sort();
        Self::Validation(format!("Dữ liệu không hợp lệ: {}", details.join("; ")))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Dữ liệu gửi lên không hợp lệ: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(format!("Đường dẫn không hợp lệ: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(format!("Tham số truy vấn không hợp lệ: {}", rejection.body_text()))
    }
}

impl From<CodeError> for AppError {
    fn from(error: CodeError) -> Self {
        Self::Validation(format!("Mã không hợp lệ: {error}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(source) = &self {
            tracing::error!(error = ?source, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        (status, Json(ApiResponse::<()>::failure(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OrderStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::from(CouponError::Expired).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("đơn hàng").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(StoreError::Conflict).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(StoreError::Corrupt("x".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::Forbidden("no").status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_messages_name_the_cause() {
        let err = AppError::InsufficientStock { name: "Air Max 90 - Size 42 / Đen".into(), available: 1 };
        assert_eq!(err.to_string(), "Sản phẩm \"Air Max 90 - Size 42 / Đen\" chỉ còn 1 sản phẩm trong kho");

        let err = AppError::from(TransitionError::NotAllowed { from: OrderStatus::Delivered, to: OrderStatus::Pending });
        assert_eq!(err.to_string(), "Không thể chuyển đơn hàng từ trạng thái 'Đã giao hàng' sang 'Chờ xác nhận'");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::from(StoreError::Corrupt("status: unknown".into()));
        assert_eq!(err.to_string(), "Đã xảy ra lỗi, vui lòng thử lại sau");
    }
}
