//! Price search across e-commerce platforms.

pub mod platform;
pub mod price_range;
pub mod quantity;
pub mod search;

pub use platform::Platform;
pub use price_range::{extract_price_range, split_price_range, PriceRange};
pub use quantity::{ProductCategory, Quantity, QuantityUnit};
pub use search::{rank_products, ShoppingSearch};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shown when a listing has no image
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150?text=No+Image";

#[derive(Debug, thiserror::Error)]
pub enum ShoppingError {
    #[error("Shopping search API key is missing (set SERPAPI_API_KEY)")]
    MissingApiKey,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Search service error: {0}")]
    Service(String),
}

/// Result ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Composite best-match score
    #[default]
    Recommendation,
    PriceLow,
    PriceHigh,
    Rating,
    Reviews,
    Delivery,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Recommendation => "recommendation",
            SortBy::PriceLow => "price_low",
            SortBy::PriceHigh => "price_high",
            SortBy::Rating => "rating",
            SortBy::Reviews => "reviews",
            SortBy::Delivery => "delivery",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortBy::Recommendation => "Best match",
            SortBy::PriceLow => "Price: low to high",
            SortBy::PriceHigh => "Price: high to low",
            SortBy::Rating => "Highest rated",
            SortBy::Reviews => "Most reviewed",
            SortBy::Delivery => "Fastest delivery",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recommendation" | "best" | "best_match" => Ok(SortBy::Recommendation),
            "price_low" | "price-low" | "cheapest" => Ok(SortBy::PriceLow),
            "price_high" | "price-high" => Ok(SortBy::PriceHigh),
            "rating" => Ok(SortBy::Rating),
            "reviews" => Ok(SortBy::Reviews),
            "delivery" => Ok(SortBy::Delivery),
            other => Err(format!(
                "unknown sort key '{}' (expected recommendation, price_low, price_high, rating, reviews or delivery)",
                other
            )),
        }
    }
}

/// What to shop for. Every filter is independent and optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQuery {
    pub product_name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ProductQuery {
    pub fn new(product_name: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            ..Self::default()
        }
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    pub fn with_price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Text sent to the search engine: `"{name} {quantity}"`
    pub fn search_text(&self) -> String {
        match self.quantity.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(quantity) => format!("{} {}", self.product_name.trim(), quantity),
            None => self.product_name.trim().to_string(),
        }
    }

    pub fn price_range(&self) -> PriceRange {
        PriceRange {
            min: self.min_price,
            max: self.max_price,
        }
    }

    pub fn target_quantity(&self) -> Option<Quantity> {
        self.quantity.as_deref().and_then(Quantity::parse)
    }
}

/// One normalized listing.
///
/// Missing upstream fields are filled in: `price` 0.0 with `price_display`
/// "Price unavailable", `rating` 0.0, `reviews` 0, the placeholder image, a
/// search link, and the platform's usual delivery estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub title: String,
    pub price: f64,
    pub price_display: String,
    pub original_price: Option<f64>,
    /// `original_price - price` when positive, else 0.0
    pub savings: f64,
    pub savings_percent: f64,
    pub rating: f64,
    pub reviews: u64,
    pub image_url: String,
    pub link: String,
    pub platform: Platform,
    pub platform_name: String,
    pub delivery: String,
    /// Pack size found in the title
    pub quantity: Option<String>,
    /// 1-based position after sorting
    pub rank: usize,
}

impl ProductRecord {
    pub fn has_price(&self) -> bool {
        self.price > 0.0
    }
}
