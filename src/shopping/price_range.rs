//! Price bounds stated in free text ("under ₹20000", "between ₹100 and ₹500").

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::OnceLock;

const AMOUNT: &str = r"(?:₹|rs\.?|inr)?\s*(\d[\d,]*(?:\.\d+)?)\s*(k\b)?";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        self.min.map_or(true, |min| price >= min) && self.max.map_or(true, |max| price <= max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

struct Patterns {
    between: Regex,
    span: Regex,
    under: Regex,
    above: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |pattern: String| Regex::new(&pattern).expect("valid price pattern");
        Patterns {
            between: build(format!(r"(?i)\b(?:between|from)\s+{AMOUNT}\s+(?:and|to)\s+{AMOUNT}")),
            span: build(format!(r"(?i){AMOUNT}\s*(?:-|–|to)\s*{AMOUNT}")),
            under: build(format!(
                r"(?i)\b(?:under|below|less\s+than|within|up\s*to|max(?:imum)?|cheaper\s+than)\s+{AMOUNT}"
            )),
            above: build(format!(r"(?i)\b(?:above|over|more\s+than|at\s+least|min(?:imum)?)\s+{AMOUNT}")),
        }
    })
}

fn unit_regex() -> &'static Regex {
    static UNIT: OnceLock<Regex> = OnceLock::new();
    UNIT.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:ml|millilit(?:re|er)s?|litres?|liters?|ltrs?|l|kgs?|kilograms?|grams?|gms?|g|pieces?|pcs?|bars?|packs?)\b",
        )
        .expect("valid unit pattern")
    })
}

fn amount(caps: &Captures, number: usize, thousands: usize) -> Option<f64> {
    let value: f64 = caps.get(number)?.as_str().replace(',', "").parse().ok()?;
    Some(if caps.get(thousands).is_some() { value * 1000.0 } else { value })
}

/// Price range plus the byte span of the phrase that stated it
fn find_price_range(text: &str) -> Option<(PriceRange, Range<usize>)> {
    let p = patterns();

    if let Some(caps) = p.between.captures(text) {
        let (a, b) = (amount(&caps, 1, 2)?, amount(&caps, 3, 4)?);
        return Some((PriceRange { min: Some(a.min(b)), max: Some(a.max(b)) }, caps.get(0)?.range()));
    }

    // "1-2 kg" is a pack size, not a price span
    let span = p
        .span
        .captures_iter(text)
        .find(|caps| caps.get(0).map_or(false, |m| !unit_regex().is_match(&text[m.end()..])));
    if let Some(caps) = span {
        let (a, b) = (amount(&caps, 1, 2)?, amount(&caps, 3, 4)?);
        return Some((PriceRange { min: Some(a.min(b)), max: Some(a.max(b)) }, caps.get(0)?.range()));
    }

    if let Some(caps) = p.under.captures(text) {
        return Some((PriceRange { min: None, max: Some(amount(&caps, 1, 2)?) }, caps.get(0)?.range()));
    }

    if let Some(caps) = p.above.captures(text) {
        return Some((PriceRange { min: Some(amount(&caps, 1, 2)?), max: None }, caps.get(0)?.range()));
    }

    None
}

/// Extract a price range; `None` when the text states no bound
pub fn extract_price_range(text: &str) -> Option<PriceRange> {
    find_price_range(text).map(|(range, _)| range)
}

/// Split "Tide detergent under ₹500" into the product text and its range
pub fn split_price_range(text: &str) -> (String, Option<PriceRange>) {
    match find_price_range(text) {
        Some((range, span)) => {
            let rest = format!("{} {}", &text[..span.start], &text[span.end..]);
            (rest.split_whitespace().collect::<Vec<_>>().join(" "), Some(range))
        }
        None => (text.trim().to_string(), None),
    }
}
