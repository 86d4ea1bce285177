//! Pack-size parsing and matching ("250ml", "1L", "500 g", "3 pieces").

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Tolerance for treating two sizes as the same pack
pub const MATCH_TOLERANCE: f64 = 0.20;

fn quantity_regex() -> &'static Regex {
    static QUANTITY: OnceLock<Regex> = OnceLock::new();
    QUANTITY.get_or_init(|| {
        Regex::new(
            r"(?i)(\d+(?:\.\d+)?)\s*(millilitres?|milliliters?|ml|litres?|liters?|ltrs?|l|kilograms?|kgs?|grams?|gms?|g|pieces?|pcs?|bars?)\b",
        )
        .expect("valid quantity regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityUnit {
    Millilitre,
    Gram,
    Piece,
}

/// A pack size normalized to millilitres, grams or pieces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: QuantityUnit,
}

impl Quantity {
    /// Parse the first size mentioned in `text`
    pub fn parse(text: &str) -> Option<Self> {
        let caps = quantity_regex().captures(text)?;
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_lowercase();

        let (value, unit) = match unit.as_str() {
            "ml" | "millilitre" | "millilitres" | "milliliter" | "milliliters" => (value, QuantityUnit::Millilitre),
            "l" | "ltr" | "ltrs" | "litre" | "litres" | "liter" | "liters" => (value * 1000.0, QuantityUnit::Millilitre),
            "g" | "gm" | "gms" | "gram" | "grams" => (value, QuantityUnit::Gram),
            "kg" | "kgs" | "kilogram" | "kilograms" => (value * 1000.0, QuantityUnit::Gram),
            _ => (value, QuantityUnit::Piece),
        };

        (value > 0.0).then_some(Self { value, unit })
    }

    /// Same unit and within 20% of `self`
    pub fn matches(&self, other: &Quantity) -> bool {
        self.unit == other.unit && (other.value - self.value).abs() <= self.value * MATCH_TOLERANCE
    }

    /// 1.0 for an exact match, falling towards 0.0 as sizes diverge
    pub fn proximity(&self, other: &Quantity) -> f64 {
        if self.unit != other.unit {
            return 0.0;
        }
        (1.0 - (other.value - self.value).abs() / self.value).clamp(0.0, 1.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            QuantityUnit::Millilitre if self.value >= 1000.0 => write!(f, "{}L", trim_number(self.value / 1000.0)),
            QuantityUnit::Millilitre => write!(f, "{}ml", trim_number(self.value)),
            QuantityUnit::Gram if self.value >= 1000.0 => write!(f, "{}kg", trim_number(self.value / 1000.0)),
            QuantityUnit::Gram => write!(f, "{}g", trim_number(self.value)),
            QuantityUnit::Piece if self.value == 1.0 => write!(f, "1 piece"),
            QuantityUnit::Piece => write!(f, "{} pieces", trim_number(self.value)),
        }
    }
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as u64)
    } else {
        format!("{:.2}", value).trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Broad product family, used to suggest pack sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Detergent,
    Soap,
    Other,
}

const DETERGENT_KEYWORDS: &[&str] = &[
    "detergent", "washing powder", "washing liquid", "laundry", "surf excel", "tide", "ariel", "rin", "wheel", "ghadi",
    "henko",
];

const SOAP_KEYWORDS: &[&str] = &[
    "soap", "handwash", "hand wash", "body wash", "lux", "dove", "lifebuoy", "dettol", "pears", "santoor", "hamam",
    "cinthol", "medimix",
];

impl ProductCategory {
    pub fn detect(product_name: &str) -> Self {
        let lower = product_name.to_lowercase();
        let has_word = |keyword: &&str| {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
                .windows(keyword.split(' ').count())
                .any(|window| window.join(" ") == **keyword)
        };

        if DETERGENT_KEYWORDS.iter().any(has_word) {
            ProductCategory::Detergent
        } else if SOAP_KEYWORDS.iter().any(has_word) {
            ProductCategory::Soap
        } else {
            ProductCategory::Other
        }
    }

    /// Common pack sizes for this category
    pub fn suggested_quantities(&self) -> &'static [&'static str] {
        match self {
            ProductCategory::Detergent => &["250ml", "500ml", "1L", "2L", "500g", "1kg"],
            ProductCategory::Soap => &["75g", "100g", "125g", "150g", "1 piece", "3 pieces"],
            ProductCategory::Other => &["250ml", "500ml", "1L", "500g", "1kg", "1 piece"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_normalize() {
        assert_eq!(Quantity::parse("250ml"), Some(Quantity { value: 250.0, unit: QuantityUnit::Millilitre }));
        assert_eq!(Quantity::parse("1L"), Some(Quantity { value: 1000.0, unit: QuantityUnit::Millilitre }));
        assert_eq!(Quantity::parse("500 g"), Some(Quantity { value: 500.0, unit: QuantityUnit::Gram }));
        assert_eq!(Quantity::parse("1kg"), Some(Quantity { value: 1000.0, unit: QuantityUnit::Gram }));
        assert_eq!(Quantity::parse("3 pieces"), Some(Quantity { value: 3.0, unit: QuantityUnit::Piece }));
        assert_eq!(Quantity::parse("1.5 Litre"), Some(Quantity { value: 1500.0, unit: QuantityUnit::Millilitre }));
        assert_eq!(Quantity::parse("large"), None);
    }

    #[test]
    fn test_extract_from_title() {
        let quantity = Quantity::parse("Surf Excel Easy Wash Detergent Powder - 1.5 kg").unwrap();
        assert_eq!(quantity.to_string(), "1.5kg");

        // "Lux" alone is not a unit
        assert_eq!(Quantity::parse("Lux Soft Touch Soap"), None);
    }

    #[test]
    fn test_match_within_twenty_percent() {
        let target = Quantity::parse("1L").unwrap();
        assert!(target.matches(&Quantity::parse("1150 ml").unwrap()));
        assert!(target.matches(&Quantity::parse("850 ml").unwrap()));
        assert!(!target.matches(&Quantity::parse("500ml").unwrap()));
        assert!(!target.matches(&Quantity::parse("1kg").unwrap()));
    }

    #[test]
    fn test_proximity() {
        let target = Quantity::parse("500g").unwrap();
        assert_eq!(target.proximity(&Quantity::parse("500 g").unwrap()), 1.0);
        assert!((target.proximity(&Quantity::parse("400g").unwrap()) - 0.8).abs() < 1e-9);
        assert_eq!(target.proximity(&Quantity::parse("2kg").unwrap()), 0.0);
        assert_eq!(target.proximity(&Quantity::parse("500ml").unwrap()), 0.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::parse("2000ml").unwrap().to_string(), "2L");
        assert_eq!(Quantity::parse("1 piece").unwrap().to_string(), "1 piece");
        assert_eq!(Quantity::parse("3 pcs").unwrap().to_string(), "3 pieces");
    }

    #[test]
    fn test_category_detection() {
        assert_eq!(ProductCategory::detect("Tide Detergent"), ProductCategory::Detergent);
        assert_eq!(ProductCategory::detect("Dove Cream Beauty Bar"), ProductCategory::Soap);
        assert_eq!(ProductCategory::detect("Maggi Noodles"), ProductCategory::Other);
        // no substring matches inside other words
        assert_eq!(ProductCategory::detect("Printed Kurta"), ProductCategory::Other);
        assert_eq!(ProductCategory::Soap.suggested_quantities()[0], "75g");
    }
}
