use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use super::{Platform, ProductQuery, ProductRecord, Quantity, ShoppingError, SortBy, PLACEHOLDER_IMAGE};
use crate::config::ShoppingConfig;
use crate::product_name::is_unknown;

/// SerpAPI `google_shopping` client
#[derive(Clone)]
pub struct ShoppingSearch {
    client: Client,
    config: ShoppingConfig,
}

impl ShoppingSearch {
    pub fn new(config: ShoppingConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    pub fn config(&self) -> &ShoppingConfig {
        &self.config
    }

    /// Search, normalize, filter, sort and truncate. No results is `Ok(vec![])`.
    pub async fn search(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, ShoppingError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ShoppingError::MissingApiKey)?;

        if is_unknown(&query.product_name) {
            return Err(ShoppingError::InvalidQuery("a product name is required".to_string()));
        }

        let search_text = query.search_text();
        info!("🛒 Searching prices for: {}", search_text);

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("engine", "google_shopping"),
                ("q", search_text.as_str()),
                ("gl", self.config.country.as_str()),
                ("hl", self.config.language.as_str()),
                ("api_key", api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShoppingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = response.json().await?;

        if let Some(error) = data["error"].as_str() {
            if error.to_lowercase().contains("hasn't returned any results") {
                info!("No shopping results for: {}", search_text);
                return Ok(Vec::new());
            }
            return Err(ShoppingError::Service(error.to_string()));
        }

        let records = normalize_results(&data, &search_text, &self.config.currency_symbol);
        debug!("Normalized {} listings", records.len());

        let ranked = rank_products(records, query, self.config.default_limit);
        info!("✅ Found {} products for {}", ranked.len(), search_text);
        Ok(ranked)
    }
}

fn amount_regex() -> &'static Regex {
    static AMOUNT: OnceLock<Regex> = OnceLock::new();
    AMOUNT.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid amount regex"))
}

fn delivery_regex() -> &'static Regex {
    static DELIVERY: OnceLock<Regex> = OnceLock::new();
    DELIVERY.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(?:-\s*\d+\s*)?(minutes?|mins?|hours?|hrs?|days?)").expect("valid delivery regex")
    })
}

/// First number in a price string: "₹1,299.00" -> 1299.0
pub fn parse_amount(text: &str) -> Option<f64> {
    amount_regex()
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

fn number_field(item: &Value, numeric: &str, text: &str) -> Option<f64> {
    item[numeric]
        .as_f64()
        .or_else(|| item[text].as_f64())
        .or_else(|| item[text].as_str().and_then(parse_amount))
        .filter(|value| *value > 0.0)
}

fn string_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| item[*key].as_str())
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Google Shopping search page, used when a listing has no link
pub fn fallback_link(search_text: &str) -> String {
    format!(
        "https://www.google.com/search?tbm=shop&q={}",
        urlencoding::encode(search_text)
    )
}

/// Estimated hours until delivery; unknown estimates sort last
pub fn delivery_hours(delivery: &str) -> f64 {
    let lower = delivery.to_lowercase();
    if lower.contains("same day") || lower.contains("today") {
        return 12.0;
    }
    if lower.contains("tomorrow") {
        return 24.0;
    }

    delivery_regex()
        .captures(&lower)
        .and_then(|caps| {
            let value: f64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str();
            Some(if unit.starts_with("min") {
                value / 60.0
            } else if unit.starts_with('h') {
                value
            } else {
                value * 24.0
            })
        })
        .unwrap_or(f64::INFINITY)
}

fn normalize_item(item: &Value, search_text: &str, currency: &str) -> Option<ProductRecord> {
    let title = string_field(item, &["title"])?.to_string();

    let price = number_field(item, "extracted_price", "price");
    let original_price = number_field(item, "extracted_old_price", "old_price");
    let savings = match (price, original_price) {
        (Some(price), Some(original)) if original > price => original - price,
        _ => 0.0,
    };
    let savings_percent = match original_price {
        Some(original) if savings > 0.0 => savings / original * 100.0,
        _ => 0.0,
    };

    let price_display = match (string_field(item, &["price"]), price) {
        (Some(display), _) => display.to_string(),
        (None, Some(price)) => format!("{}{:.2}", currency, price),
        (None, None) => "Price unavailable".to_string(),
    };

    let reviews = item["reviews"]
        .as_u64()
        .or_else(|| item["reviews"].as_str().and_then(parse_amount).map(|r| r as u64))
        .unwrap_or(0);

    let link = string_field(item, &["link", "product_link"])
        .map(str::to_string)
        .unwrap_or_else(|| fallback_link(search_text));

    let source = string_field(item, &["source", "seller"]).unwrap_or_default();
    let platform = Platform::detect(source, &link);
    let platform_name = if platform == Platform::Other && !source.is_empty() {
        source.to_string()
    } else {
        platform.display_name().to_string()
    };

    let delivery = string_field(item, &["delivery"])
        .map(str::to_string)
        .unwrap_or_else(|| platform.default_delivery().to_string());

    Some(ProductRecord {
        quantity: Quantity::parse(&title).map(|q| q.to_string()),
        title,
        price: price.unwrap_or(0.0),
        price_display,
        original_price,
        savings,
        savings_percent,
        rating: item["rating"].as_f64().unwrap_or(0.0).clamp(0.0, 5.0),
        reviews,
        image_url: string_field(item, &["thumbnail", "serpapi_thumbnail"])
            .unwrap_or(PLACEHOLDER_IMAGE)
            .to_string(),
        link,
        platform,
        platform_name,
        delivery,
        rank: 0,
    })
}

/// Flatten `shopping_results` and `inline_shopping_results` into records
pub fn normalize_results(data: &Value, search_text: &str, currency: &str) -> Vec<ProductRecord> {
    ["shopping_results", "inline_shopping_results"]
        .iter()
        .filter_map(|key| data[*key].as_array())
        .flatten()
        .filter_map(|item| normalize_item(item, search_text, currency))
        .collect()
}

/// Composite score: rating, review volume, price, pack-size fit and platform trust
pub fn best_match_score(record: &ProductRecord, lowest_price: Option<f64>, target: Option<&Quantity>) -> f64 {
    let rating = record.rating / 5.0;
    let reviews = ((record.reviews as f64).ln_1p() / 10_000f64.ln_1p()).min(1.0);
    let price = match lowest_price {
        Some(lowest) if record.has_price() => lowest / record.price,
        _ => 0.0,
    };
    let quantity = match (target, record.quantity.as_deref().and_then(Quantity::parse)) {
        (Some(target), Some(found)) => target.proximity(&found),
        (Some(_), None) => 0.0,
        (None, _) => 1.0,
    };

    0.35 * rating + 0.20 * reviews + 0.20 * price + 0.15 * quantity + 0.10 * record.platform.trust_score()
}

/// Apply price and quantity filters, order by `query.sort_by`, truncate and
/// assign 1-based ranks.
pub fn rank_products(records: Vec<ProductRecord>, query: &ProductQuery, default_limit: usize) -> Vec<ProductRecord> {
    let bounds = query.price_range();
    let mut records: Vec<ProductRecord> = if bounds.is_unbounded() {
        records
    } else {
        records
            .into_iter()
            .filter(|r| r.has_price() && bounds.contains(r.price))
            .collect()
    };

    let target = query.target_quantity();
    if let Some(target) = &target {
        let matching: Vec<ProductRecord> = records
            .iter()
            .filter(|r| r.quantity.as_deref().and_then(Quantity::parse).is_some_and(|q| target.matches(&q)))
            .cloned()
            .collect();

        if matching.is_empty() {
            debug!("No listing within 20% of {}, keeping all sizes", target);
        } else {
            records = matching;
        }
    }

    let by_price = |a: &ProductRecord, b: &ProductRecord| -> Ordering {
        // unpriced listings always last
        b.has_price().cmp(&a.has_price()).then(a.price.total_cmp(&b.price))
    };

    match query.sort_by {
        SortBy::Recommendation => {
            let lowest = records.iter().filter(|r| r.has_price()).map(|r| r.price).reduce(f64::min);
            let mut scored: Vec<(f64, ProductRecord)> = records
                .into_iter()
                .map(|r| (best_match_score(&r, lowest, target.as_ref()), r))
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            records = scored.into_iter().map(|(_, r)| r).collect();
        }
        SortBy::PriceLow => records.sort_by(by_price),
        SortBy::PriceHigh => records.sort_by(|a, b| b.has_price().cmp(&a.has_price()).then(b.price.total_cmp(&a.price))),
        SortBy::Rating => records.sort_by(|a, b| b.rating.total_cmp(&a.rating).then(b.reviews.cmp(&a.reviews))),
        SortBy::Reviews => records.sort_by(|a, b| b.reviews.cmp(&a.reviews)),
        SortBy::Delivery => records.sort_by(|a, b| {
            delivery_hours(&a.delivery)
                .total_cmp(&delivery_hours(&b.delivery))
                .then_with(|| by_price(a, b))
        }),
    }

    let limit = query.limit.filter(|l| *l > 0).unwrap_or(default_limit);
    records.truncate(limit);

    for (index, record) in records.iter_mut().enumerate() {
        record.rank = index + 1;
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(title: &str, price: f64, rating: f64, reviews: u64, platform: Platform) -> ProductRecord {
        ProductRecord {
            title: title.to_string(),
            price,
            price_display: format!("₹{}", price),
            original_price: None,
            savings: 0.0,
            savings_percent: 0.0,
            rating,
            reviews,
            image_url: PLACEHOLDER_IMAGE.to_string(),
            link: "https://example.com".to_string(),
            platform,
            platform_name: platform.display_name().to_string(),
            delivery: platform.default_delivery().to_string(),
            quantity: Quantity::parse(title).map(|q| q.to_string()),
            rank: 0,
        }
    }

    fn catalogue() -> Vec<ProductRecord> {
        vec![
            record("Tide Detergent 1L", 210.0, 4.2, 1200, Platform::Amazon),
            record("Tide Detergent 500ml", 120.0, 4.0, 300, Platform::Flipkart),
            record("Tide Detergent 2L", 399.0, 4.6, 5000, Platform::BigBasket),
            record("Tide Detergent 1.1L", 235.0, 3.1, 20, Platform::Zepto),
            record("Tide Detergent Pack", 0.0, 0.0, 0, Platform::Other),
        ]
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("₹1,299.00"), Some(1299.0));
        assert_eq!(parse_amount("Rs. 85"), Some(85.0));
        assert_eq!(parse_amount("free"), None);
    }

    #[test]
    fn test_delivery_hours() {
        assert!(delivery_hours("10 minutes") < delivery_hours("Same day"));
        assert_eq!(delivery_hours("2-4 days"), 48.0);
        assert_eq!(delivery_hours("Delivery by tomorrow"), 24.0);
        assert_eq!(delivery_hours("Free delivery"), f64::INFINITY);
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let data = json!({
            "shopping_results": [
                {
                    "title": "Surf Excel Matic Liquid 1L",
                    "price": "₹230.00",
                    "extracted_price": 230.0,
                    "old_price": "₹275.00",
                    "rating": 4.4,
                    "reviews": 2451,
                    "thumbnail": "https://img.example/surf.jpg",
                    "product_link": "https://www.flipkart.com/surf-excel",
                    "source": "Flipkart"
                },
                { "title": "Surf Excel Bar", "source": "Kirana Mart" },
                { "price": "₹10" }
            ],
            "inline_shopping_results": [
                { "title": "Surf Excel Quick Wash 2 kg", "price": "Rs. 410", "link": "https://www.amazon.in/dp/B0", "delivery": "Free delivery by Tuesday" }
            ]
        });

        let records = normalize_results(&data, "Surf Excel 1L", "₹");
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.platform, Platform::Flipkart);
        assert_eq!(first.original_price, Some(275.0));
        assert_eq!(first.savings, 45.0);
        assert_eq!(first.quantity.as_deref(), Some("1L"));
        assert_eq!(first.delivery, "2-4 days");

        let bare = &records[1];
        assert_eq!(bare.price, 0.0);
        assert_eq!(bare.price_display, "Price unavailable");
        assert_eq!(bare.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(bare.platform_name, "Kirana Mart");
        assert_eq!(bare.link, "https://www.google.com/search?tbm=shop&q=Surf%20Excel%201L");

        let inline = &records[2];
        assert_eq!(inline.platform, Platform::Amazon);
        assert_eq!(inline.price, 410.0);
        assert_eq!(inline.quantity.as_deref(), Some("2kg"));
    }

    #[test]
    fn test_sort_by_price_puts_unpriced_last() {
        let query = ProductQuery::new("Tide").with_sort(SortBy::PriceLow).with_limit(10);
        let ranked = rank_products(catalogue(), &query, 5);
        let prices: Vec<f64> = ranked.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![120.0, 210.0, 235.0, 399.0, 0.0]);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        let query = ProductQuery::new("Tide").with_sort(SortBy::PriceHigh);
        let ranked = rank_products(catalogue(), &query, 5);
        assert_eq!(ranked[0].price, 399.0);
        assert_eq!(ranked[4].price, 0.0);
    }

    #[test]
    fn test_limit_defaults_and_truncates() {
        let ranked = rank_products(catalogue(), &ProductQuery::new("Tide"), 3);
        assert_eq!(ranked.len(), 3);

        let ranked = rank_products(catalogue(), &ProductQuery::new("Tide").with_limit(1), 3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn test_price_bounds_drop_unpriced_and_out_of_range() {
        let query = ProductQuery::new("Tide").with_price_range(Some(150.0), Some(300.0));
        let ranked = rank_products(catalogue(), &query, 10);
        assert!(ranked.iter().all(|r| r.price >= 150.0 && r.price <= 300.0));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_quantity_filter_with_fallback() {
        let query = ProductQuery::new("Tide").with_quantity("1L").with_sort(SortBy::PriceLow);
        let ranked = rank_products(catalogue(), &query, 10);
        let titles: Vec<&str> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Tide Detergent 1L", "Tide Detergent 1.1L"]);

        let query = ProductQuery::new("Tide").with_quantity("5kg");
        assert_eq!(rank_products(catalogue(), &query, 10).len(), 5);
    }

    #[test]
    fn test_rating_and_reviews_order() {
        let ranked = rank_products(catalogue(), &ProductQuery::new("Tide").with_sort(SortBy::Rating), 10);
        assert_eq!(ranked[0].rating, 4.6);

        let ranked = rank_products(catalogue(), &ProductQuery::new("Tide").with_sort(SortBy::Reviews), 10);
        assert_eq!(ranked[0].reviews, 5000);
    }

    #[test]
    fn test_delivery_order() {
        let ranked = rank_products(catalogue(), &ProductQuery::new("Tide").with_sort(SortBy::Delivery), 10);
        assert_eq!(ranked[0].platform, Platform::Zepto);
        assert_eq!(ranked[1].platform, Platform::BigBasket);
    }

    #[test]
    fn test_recommendation_prefers_well_rated_listing() {
        let ranked = rank_products(catalogue(), &ProductQuery::new("Tide"), 10);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[4].title, "Tide Detergent Pack");
        assert!(ranked[0].rating >= 4.0);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let search = ShoppingSearch::new(ShoppingConfig {
            endpoint: "http://127.0.0.1:9/unreachable".to_string(),
            ..ShoppingConfig::default()
        });

        match search.search(&ProductQuery::new("Tide")).await {
            Err(ShoppingError::MissingApiKey) => {}
            other => panic!("expected missing key, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_product_is_invalid() {
        let search = ShoppingSearch::new(ShoppingConfig {
            api_key: Some("key".to_string()),
            endpoint: "http://127.0.0.1:9/unreachable".to_string(),
            ..ShoppingConfig::default()
        });

        assert!(matches!(
            search.search(&ProductQuery::new("unknown")).await,
            Err(ShoppingError::InvalidQuery(_))
        ));
    }
}
