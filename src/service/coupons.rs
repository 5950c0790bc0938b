//! Coupon administration and checkout preview.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::aggregates::{Coupon, CouponDraft, CouponError};
use crate::domain::value_objects::{CouponCode, Vnd};
use crate::error::AppResult;
use crate::store::Store;

/// What the checkout page shows before the order is placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPreview {
    pub code: CouponCode,
    pub discount: Vnd,
    pub total_after_discount: Vnd,
}

#[derive(Clone)]
pub struct CouponService {
    store: Arc<dyn Store>,
}

impl CouponService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn create(&self, draft: CouponDraft, now: DateTime<Utc>) -> AppResult<Coupon> {
        let coupon = Coupon::create(draft, now)?;
        self.store.insert_coupon(&coupon).await?;
        tracing::info!(code = %coupon.code, kind = %coupon.kind, value = coupon.value, "coupon created");
        Ok(coupon)
    }

    pub async fn list(&self) -> AppResult<Vec<Coupon>> {
        Ok(self.store.list_coupons().await?)
    }

    /// Runs the same checks as checkout without consuming a use.
    pub async fn preview(&self, code: &CouponCode, order_amount: Vnd, now: DateTime<Utc>) -> AppResult<CouponPreview> {
        let coupon = self.store.coupon_by_code(code).await?.ok_or(CouponError::NotFound)?;
        let discount = coupon.validate_at(now, order_amount)?;
        Ok(CouponPreview { code: coupon.code, discount, total_after_discount: order_amount - discount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::domain::aggregates::CouponKind;
    use crate::error::AppError;
    use crate::store::MemoryStore;

    fn draft(code: &str, kind: CouponKind, value: Vnd) -> CouponDraft {
        let now = Utc::now();
        CouponDraft {
            code: CouponCode::new(code).unwrap(), kind, value, min_order_amount: 0, max_usage: 0,
            start_date: now - Duration::hours(1), end_date: now + Duration::days(30), is_active: true,
        }
    }

    #[tokio::test]
    async fn test_preview_does_not_consume() {
        let service = CouponService::new(Arc::new(MemoryStore::new()));
        let coupon = service.create(draft("tet2027", CouponKind::Percentage, 10), Utc::now()).await.unwrap();

        let preview = service.preview(&coupon.code, 100_000, Utc::now()).await.unwrap();
        assert_eq!(preview.discount, 10_000);
        assert_eq!(preview.total_after_discount, 90_000);
        assert_eq!(service.list().await.unwrap()[0].usage_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let service = CouponService::new(Arc::new(MemoryStore::new()));
        service.create(draft("FREESHIP", CouponKind::Fixed, 30_000), Utc::now()).await.unwrap();
        let err = service.create(draft("freeship", CouponKind::Fixed, 10_000), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_preview_unknown_code() {
        let service = CouponService::new(Arc::new(MemoryStore::new()));
        let err = service.preview(&CouponCode::new("GHOST").unwrap(), 100_000, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Coupon(CouponError::NotFound)));
        assert_eq!(err.to_string(), "Mã giảm giá không tồn tại");
    }
}
