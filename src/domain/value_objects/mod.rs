//! Value Objects for the storefront

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Amount in Vietnamese dong. The store never deals in fractional units.
pub type Vnd = i64;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, CodeError> {
        normalize_code(value.into(), 50).map(Self)
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = CodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

/// Coupon code, always stored trimmed and upper-cased so lookups are case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CodeError> {
        normalize_code(value.into(), 32).map(Self)
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

fn normalize_code(value: String, max_len: usize) -> Result<String, CodeError> {
    let value = value.trim().to_uppercase();
    if value.is_empty() { return Err(CodeError::Empty); }
    if value.chars().count() > max_len { return Err(CodeError::TooLong(max_len)); }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("mã không được để trống")]
    Empty,
    #[error("mã không được dài quá {0} ký tự")]
    TooLong(usize),
}

/// Formats an amount the way the storefront prints prices, e.g. `1.250.000đ`.
pub fn format_vnd(amount: Vnd) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 { grouped.push('.'); }
        grouped.push(c);
    }
    if amount < 0 { format!("-{grouped}đ") } else { format!("{grouped}đ") }
}
