use serde::{Deserialize, Serialize};
use url::Url;

/// E-commerce platforms with dedicated badges and trust weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Amazon,
    Flipkart,
    BigBasket,
    JioMart,
    Nykaa,
    Zepto,
    Blinkit,
    Meesho,
    Other,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::Amazon,
        Platform::Flipkart,
        Platform::BigBasket,
        Platform::JioMart,
        Platform::Nykaa,
        Platform::Zepto,
        Platform::Blinkit,
        Platform::Meesho,
    ];

    fn keys(&self) -> &'static [&'static str] {
        match self {
            Platform::Amazon => &["amazon"],
            Platform::Flipkart => &["flipkart"],
            Platform::BigBasket => &["bigbasket", "big basket"],
            Platform::JioMart => &["jiomart", "jio mart"],
            Platform::Nykaa => &["nykaa"],
            Platform::Zepto => &["zepto"],
            Platform::Blinkit => &["blinkit"],
            Platform::Meesho => &["meesho"],
            Platform::Other => &[],
        }
    }

    /// Detect from the merchant name, then from the link's host
    pub fn detect(source: &str, link: &str) -> Self {
        let source = source.to_lowercase();
        if let Some(platform) = Self::ALL.into_iter().find(|p| p.keys().iter().any(|k| source.contains(k))) {
            return platform;
        }

        let host = Url::parse(link)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_default();

        Self::ALL
            .into_iter()
            .find(|p| p.keys().iter().any(|k| !k.contains(' ') && host.contains(k)))
            .unwrap_or(Platform::Other)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Amazon => "Amazon",
            Platform::Flipkart => "Flipkart",
            Platform::BigBasket => "BigBasket",
            Platform::JioMart => "JioMart",
            Platform::Nykaa => "Nykaa",
            Platform::Zepto => "Zepto",
            Platform::Blinkit => "Blinkit",
            Platform::Meesho => "Meesho",
            Platform::Other => "Online Store",
        }
    }

    /// Badge (background, text) colours
    pub fn badge_colors(&self) -> (&'static str, &'static str) {
        match self {
            Platform::Amazon => ("#FF9900", "#000000"),
            Platform::Flipkart => ("#2874F0", "#FFFFFF"),
            Platform::BigBasket => ("#84C225", "#FFFFFF"),
            Platform::JioMart => ("#0078AD", "#FFFFFF"),
            Platform::Nykaa => ("#FC2779", "#FFFFFF"),
            Platform::Zepto => ("#5A189A", "#FFFFFF"),
            Platform::Blinkit => ("#F8CB46", "#000000"),
            Platform::Meesho => ("#9F2089", "#FFFFFF"),
            Platform::Other => ("#6C757D", "#FFFFFF"),
        }
    }

    /// Weight in the best-match score, 0.0 to 1.0
    pub fn trust_score(&self) -> f64 {
        match self {
            Platform::Amazon => 0.95,
            Platform::Flipkart => 0.90,
            Platform::BigBasket => 0.88,
            Platform::JioMart => 0.85,
            Platform::Nykaa => 0.85,
            Platform::Zepto => 0.80,
            Platform::Blinkit => 0.80,
            Platform::Meesho => 0.70,
            Platform::Other => 0.60,
        }
    }

    /// Used when a listing carries no delivery estimate
    pub fn default_delivery(&self) -> &'static str {
        match self {
            Platform::Amazon => "1-2 days",
            Platform::Flipkart => "2-4 days",
            Platform::BigBasket => "Same day",
            Platform::JioMart => "1-3 days",
            Platform::Nykaa => "3-5 days",
            Platform::Zepto => "10 minutes",
            Platform::Blinkit => "10 minutes",
            Platform::Meesho => "5-7 days",
            Platform::Other => "3-7 days",
        }
    }
}
