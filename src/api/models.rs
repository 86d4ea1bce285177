//! API data models

use serde::{Deserialize, Serialize};

use crate::shopping::ProductRecord;

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Body of `POST /api/analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Video or image path on the server
    pub path: String,
    pub question: String,
    #[serde(default)]
    pub frame_interval: Option<u64>,
}

/// Result of `POST /api/prices`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResponse {
    pub products: Vec<ProductRecord>,
    /// Rendered product grid
    pub html: String,
}
