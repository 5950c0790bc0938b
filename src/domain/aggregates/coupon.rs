//! Coupon Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{format_vnd, CouponCode, Vnd};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: CouponCode,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub value: Vnd,
    pub min_order_amount: Vnd,
    /// Zero means unlimited.
    pub max_usage: i32,
    pub usage_count: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind { Percentage, Fixed }

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
}

impl fmt::Display for CouponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for CouponKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown coupon type `{other}`")),
        }
    }
}

/// Admin input for a new coupon.
#[derive(Clone, Debug)]
pub struct CouponDraft {
    pub code: CouponCode,
    pub kind: CouponKind,
    pub value: Vnd,
    pub min_order_amount: Vnd,
    pub max_usage: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

impl Coupon {
    pub fn create(draft: CouponDraft, now: DateTime<Utc>) -> Result<Self, CouponDefinitionError> {
        match draft.kind {
            CouponKind::Percentage if !(1..=100).contains(&draft.value) => return Err(CouponDefinitionError::PercentOutOfRange),
            CouponKind::Fixed if draft.value <= 0 => return Err(CouponDefinitionError::NonPositiveValue),
            _ => {}
        }
        if draft.min_order_amount < 0 || draft.max_usage < 0 { return Err(CouponDefinitionError::NegativeLimit); }
        if draft.end_date <= draft.start_date { return Err(CouponDefinitionError::EmptyWindow); }
        Ok(Self {
            id: Uuid::now_v7(), code: draft.code, kind: draft.kind, value: draft.value,
            min_order_amount: draft.min_order_amount, max_usage: draft.max_usage, usage_count: 0,
            start_date: draft.start_date, end_date: draft.end_date, is_active: draft.is_active,
            created_at: now, updated_at: now,
        })
    }

    pub fn is_exhausted(&self) -> bool { self.max_usage > 0 && self.usage_count >= self.max_usage }

    /// Runs the validity checks in order and returns the discount for `order_amount`.
    pub fn validate_at(&self, now: DateTime<Utc>, order_amount: Vnd) -> Result<Vnd, CouponError> {
        if !self.is_active { return Err(CouponError::Inactive); }
        if self.is_exhausted() { return Err(CouponError::Exhausted); }
        if now < self.start_date { return Err(CouponError::NotStarted); }
        if now > self.end_date { return Err(CouponError::Expired); }
        if order_amount < self.min_order_amount { return Err(CouponError::BelowMinimum(self.min_order_amount)); }
        Ok(self.discount_for(order_amount))
    }

    /// Discount never exceeds the order amount, so an order total cannot go negative.
    pub fn discount_for(&self, order_amount: Vnd) -> Vnd {
        let order_amount = order_amount.max(0);
        let raw = match self.kind {
            CouponKind::Percentage => order_amount * self.value / 100,
            CouponKind::Fixed => self.value,
        };
        raw.clamp(0, order_amount)
    }

    /// Counts one successful application; a capped coupon switches itself off once used up.
    pub fn record_usage(&mut self, now: DateTime<Utc>) {
        self.usage_count += 1;
        if self.is_exhausted() { self.is_active = false; }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Mã giảm giá không tồn tại")]
    NotFound,
    #[error("Mã giảm giá đã bị vô hiệu hóa")]
    Inactive,
    #[error("Mã giảm giá đã hết lượt sử dụng")]
    Exhausted,
    #[error("Mã giảm giá chưa đến thời gian áp dụng")]
    NotStarted,
    #[error("Mã giảm giá đã hết hạn")]
    Expired,
    #[error("Đơn hàng tối thiểu {} để áp dụng mã giảm giá này", format_vnd(*.0))]
    BelowMinimum(Vnd),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponDefinitionError {
    #[error("Giá trị phần trăm phải nằm trong khoảng 1-100")]
    PercentOutOfRange,
    #[error("Giá trị giảm phải lớn hơn 0")]
    NonPositiveValue,
    #[error("Giá trị tối thiểu và số lượt sử dụng không được âm")]
    NegativeLimit,
    #[error("Ngày kết thúc phải sau ngày bắt đầu")]
    EmptyWindow,
}
