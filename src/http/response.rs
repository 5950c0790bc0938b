//! Uniform response envelope: `{success, message, data?, meta?}`.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i64 = i64::from(limit.max(1));
        Self { page, limit, total, total_pages: (total + limit_i64 - 1) / limit_i64 }
    }
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data), meta: None }
    }

    pub fn with_meta(mut self, meta: PageMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None, meta: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(PageMeta::new(1, 10, 0).total_pages, 0);
        assert_eq!(PageMeta::new(1, 10, 10).total_pages, 1);
        assert_eq!(PageMeta::new(2, 10, 11).total_pages, 2);
    }

    #[test]
    fn test_failure_omits_data() {
        let body = serde_json::to_value(ApiResponse::<()>::failure("Không tìm thấy đơn hàng")).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "message": "Không tìm thấy đơn hàng"}));
    }
}
