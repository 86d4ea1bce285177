//! API request handlers

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::path::Path;

use super::models::{AnalyzeRequest, PriceResponse};
use crate::config::Config;
use crate::pipeline::{analyze_with_config, AnalysisReport};
use crate::presentation::product_grid;
use crate::shopping::{ProductQuery, ShoppingSearch};

/// Handle health check requests
pub async fn health_check() -> Result<Value> {
    Ok(serde_json::json!({
        "status": "healthy",
        "service": "planogram-vision",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Run the analysis pipeline on a file already on the server
pub async fn analyze(config: &Config, request: &AnalyzeRequest) -> Result<AnalysisReport> {
    if request.question.trim().is_empty() {
        return Err(anyhow!("question must not be empty"));
    }

    let path = Path::new(&request.path);
    if !path.exists() {
        return Err(anyhow!("File not found: {}", request.path));
    }

    Ok(analyze_with_config(config, path, request.question.trim(), request.frame_interval).await)
}

/// Search prices and render the product grid
pub async fn prices(search: &ShoppingSearch, query: &ProductQuery) -> Result<PriceResponse> {
    let products = search.search(query).await?;
    let html = product_grid(&products, query, &search.config().currency_symbol);
    Ok(PriceResponse { products, html })
}
