//! Product name extraction from summaries and user questions.

use regex::Regex;
use std::sync::OnceLock;

pub const UNKNOWN_PRODUCT: &str = "unknown";

/// The marker may start a line or trail the answer on the same line;
/// the value runs to the end of the line.
fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"(?i)\bproduct_name[ \t]*=[ \t]*([^\r\n]*)").expect("valid marker regex"))
}

fn question_regex() -> &'static Regex {
    static QUESTION: OnceLock<Regex> = OnceLock::new();
    QUESTION.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:where\s+(?:is|are|can\s+i\s+find)|find|locate|looking\s+for|search\s+for|price\s+of|prices\s+for|buy|show\s+me|is\s+there\s+(?:any|a|an))\s+(?:the\s+|a\s+|an\s+|some\s+|any\s+)?([a-z0-9][a-z0-9&'\-\. ]{0,60}?)(?:\s+(?:located|placed|kept|present|visible|stocked|on|in|at|near|from)\b|[?.!,;]|$)",
        )
        .expect("valid question regex")
    })
}

/// Words too generic to count as a product name
const GENERIC_NOUNS: &[&str] = &[
    "product", "products", "item", "items", "it", "this", "that", "them", "shelf", "shelves",
    "everything", "something", "anything", "stuff", "thing", "things",
];

/// Value of the `product_name = <value>` line, if present and non-empty
pub fn find_marker(text: &str) -> Option<String> {
    marker_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| clean_value(m.as_str()))
        .find(|value| !value.is_empty())
}

/// Cut every line at its marker, drop lines left with nothing but markdown
/// decoration, and collapse the blank lines this leaves behind
pub fn strip_marker_lines(text: &str) -> String {
    text.lines()
        .filter_map(|line| match marker_regex().find(line) {
            None => Some(line),
            Some(marker) => {
                let before = line[..marker.start()].trim_end_matches(|c: char| c.is_whitespace() || c == '`' || c == '*');
                let decoration_only = before.chars().all(|c| c.is_whitespace() || matches!(c, '`' | '*' | '>' | '-'));
                (!decoration_only).then_some(before)
            }
        })
        .fold(Vec::<&str>::new(), |mut kept, line| {
            let blank = line.trim().is_empty();
            let previous_blank = kept.last().map_or(true, |l| l.trim().is_empty());
            if !(blank && previous_blank) {
                kept.push(line);
            }
            kept
        })
        .join("\n")
        .trim()
        .to_string()
}

fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == '*' || c == '<' || c == '>')
        .trim()
        .to_string()
}

/// Heuristic noun-phrase scan for questions like "Where is Tide powder located?"
fn heuristic_name(text: &str) -> Option<String> {
    question_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches('.').trim().to_string())
        .find(|candidate| {
            !candidate.is_empty() && !GENERIC_NOUNS.contains(&candidate.to_lowercase().as_str())
        })
}

/// Extract a product name from free text, or `"unknown"`
pub fn extract_product_name(text: &str) -> String {
    find_marker(text)
        .or_else(|| heuristic_name(text))
        .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string())
}

/// Summary first, then the user's question; `"unknown"` if both fail
pub fn resolve_product_name(summary: &str, question: &str) -> String {
    let from_summary = extract_product_name(summary);
    if !is_unknown(&from_summary) {
        return from_summary;
    }
    extract_product_name(question)
}

pub fn is_unknown(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.eq_ignore_ascii_case(UNKNOWN_PRODUCT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_extraction() {
        assert_eq!(extract_product_name("...\nproduct_name = Tide Detergent\n"), "Tide Detergent");
        assert_eq!(extract_product_name("Found it.\nPRODUCT_NAME=  Surf Excel  "), "Surf Excel");
        assert_eq!(extract_product_name("Found it.\n`product_name = Dettol Handwash`"), "Dettol Handwash");
    }

    #[test]
    fn test_inline_marker_keeps_answer() {
        let text = "Tide is on the second shelf near the entrance. product_name = Tide";
        assert_eq!(find_marker(text).as_deref(), Some("Tide"));
        assert_eq!(extract_product_name(text), "Tide");
        assert_eq!(strip_marker_lines(text), "Tide is on the second shelf near the entrance.");

        let decorated = "Surf Excel is on the left. **product_name = Surf Excel**\nAsk again for more.";
        assert_eq!(find_marker(decorated).as_deref(), Some("Surf Excel"));
        assert_eq!(strip_marker_lines(decorated), "Surf Excel is on the left.\nAsk again for more.");
    }

    #[test]
    fn test_marker_value_stops_at_line_end() {
        assert_eq!(find_marker("product_name = \nNext line"), None);
        assert_eq!(strip_marker_lines("> `product_name = Lux`\nLux is on the right."), "Lux is on the right.");
    }

    #[test]
    fn test_empty_marker_falls_through() {
        assert_eq!(find_marker("Summary text.\nproduct_name = \n"), None);
    }

    #[test]
    fn test_unparseable_question_is_unknown() {
        assert_eq!(extract_product_name("What is on the shelf?"), UNKNOWN_PRODUCT);
        assert_eq!(extract_product_name("Where is the product?"), UNKNOWN_PRODUCT);
        assert_eq!(extract_product_name(""), UNKNOWN_PRODUCT);
    }

    #[test]
    fn test_heuristic_question_scan() {
        assert_eq!(extract_product_name("Where is Tide powder located?"), "Tide powder");
        assert_eq!(extract_product_name("Can you find the Colgate toothpaste on the shelf?"), "Colgate toothpaste");
        assert_eq!(extract_product_name("I am looking for Maggi noodles"), "Maggi noodles");
    }

    #[test]
    fn test_resolve_falls_back_to_question() {
        assert_eq!(
            resolve_product_name("The requested item sits on the bottom shelf.", "Where is Vim bar placed?"),
            "Vim bar"
        );
        assert_eq!(
            resolve_product_name("Lux soap is on the left.\nproduct_name = Lux Soap", "Where is Dove?"),
            "Lux Soap"
        );
        assert_eq!(resolve_product_name("Nothing useful.", "What is on the shelf?"), UNKNOWN_PRODUCT);
    }

    #[test]
    fn test_strip_marker_lines() {
        let text = "Tide is on the top shelf.\n\nproduct_name = Tide\n\nIt is near the entrance.";
        assert_eq!(strip_marker_lines(text), "Tide is on the top shelf.\n\nIt is near the entrance.");
        assert_eq!(strip_marker_lines("product_name = Tide"), "");
    }
}
