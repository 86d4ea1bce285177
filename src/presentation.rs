//! Single-line HTML fragments for the dashboard.
//!
//! Every fragment is one line with no tabs or comments; all text taken from
//! listings or queries is escaped.

use crate::shopping::{ProductQuery, ProductRecord, PLACEHOLDER_IMAGE};

/// Width of the timeline bar the markers are placed on
pub const TIMELINE_WIDTH_PX: f64 = 576.0;

/// Escape text for HTML content and attributes, folding line breaks and tabs to spaces
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            c => escaped.push(c),
        }
    }
    escaped
}

/// `mm:ss.cc`
pub fn format_timestamp(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let centis = (ms % 1000) / 10;
    format!("{:02}:{:02}.{:02}", minutes, seconds, centis)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// "₹1,299" for whole amounts, "₹1,299.50" otherwise
pub fn format_price(value: f64, currency: &str) -> String {
    let cents = (value * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    match cents % 100 {
        0 => format!("{}{}", currency, whole),
        fraction => format!("{}{}.{:02}", currency, whole, fraction),
    }
}

/// Markers positioned at `ts / duration * 576` px
pub fn timeline_markers(timestamps: &[u64], duration_ms: f64) -> String {
    if duration_ms <= 0.0 {
        return String::new();
    }

    let markers: String = timestamps
        .iter()
        .map(|&ts| {
            let left = (ts as f64 / duration_ms * TIMELINE_WIDTH_PX).clamp(0.0, TIMELINE_WIDTH_PX);
            format!(
                "<div class=\"timeline-marker\" style=\"left:{:.1}px;\" title=\"{}\"></div>",
                left,
                format_timestamp(ts)
            )
        })
        .collect();

    format!(
        "<div class=\"timeline\" style=\"position:relative;width:{}px;height:12px;\">{}</div>",
        TIMELINE_WIDTH_PX, markers
    )
}

/// Thumbnails of the frames at the detected timestamps
pub fn frame_gallery(frames: &[(u64, String)]) -> String {
    if frames.is_empty() {
        return String::new();
    }

    let figures: String = frames
        .iter()
        .map(|(ts, src)| {
            let label = format_timestamp(*ts);
            format!(
                "<figure class=\"frame\" style=\"margin:0;\"><img src=\"{}\" alt=\"Frame at {}\" style=\"width:180px;border-radius:4px;\"><figcaption>{}</figcaption></figure>",
                escape_html(src),
                label,
                label
            )
        })
        .collect();

    format!(
        "<div class=\"frame-gallery\" style=\"display:flex;flex-wrap:wrap;gap:8px;\">{}</div>",
        figures
    )
}

pub fn platform_badge(record: &ProductRecord) -> String {
    let (background, color) = record.platform.badge_colors();
    format!(
        "<span class=\"platform-badge\" style=\"background:{};color:{};padding:2px 8px;border-radius:10px;font-size:12px;\">{}</span>",
        background,
        color,
        escape_html(&record.platform_name)
    )
}

fn rating_line(record: &ProductRecord) -> String {
    if record.rating <= 0.0 {
        return "<div class=\"rating\">No ratings yet</div>".to_string();
    }
    format!(
        "<div class=\"rating\">&#9733; {:.1} ({} reviews)</div>",
        record.rating,
        group_thousands(record.reviews)
    )
}

fn price_line(record: &ProductRecord, currency: &str) -> String {
    if !record.has_price() {
        return format!("<div class=\"price\">{}</div>", escape_html(&record.price_display));
    }

    let mut line = format!("<div class=\"price\">{}", format_price(record.price, currency));
    if let Some(original) = record.original_price.filter(|_| record.savings > 0.0) {
        line.push_str(&format!(
            " <s class=\"original-price\">{}</s> <span class=\"savings\">Save {} ({:.0}%)</span>",
            format_price(original, currency),
            format_price(record.savings, currency),
            record.savings_percent
        ));
    }
    line.push_str("</div>");
    line
}

pub fn product_card(record: &ProductRecord, currency: &str) -> String {
    let image = if record.image_url.is_empty() {
        PLACEHOLDER_IMAGE
    } else {
        record.image_url.as_str()
    };

    let quantity = record
        .quantity
        .as_deref()
        .map(|q| format!("<div class=\"quantity\">{}</div>", escape_html(q)))
        .unwrap_or_default();

    format!(
        "<div class=\"product-card\" data-rank=\"{rank}\" style=\"border:1px solid #ddd;border-radius:8px;padding:12px;\">\
         <div class=\"rank\">#{rank}</div>\
         <img src=\"{image}\" alt=\"{title}\" style=\"width:150px;height:150px;object-fit:contain;\">\
         <div class=\"title\">{title}</div>\
         {quantity}\
         {badge}\
         {price}\
         {rating}\
         <div class=\"delivery\">Delivery: {delivery}</div>\
         <a class=\"buy-now\" href=\"{link}\" target=\"_blank\" rel=\"noopener noreferrer\">Buy Now</a>\
         </div>",
        rank = record.rank,
        image = escape_html(image),
        title = escape_html(&record.title),
        quantity = quantity,
        badge = platform_badge(record),
        price = price_line(record, currency),
        rating = rating_line(record),
        delivery = escape_html(&record.delivery),
        link = escape_html(&record.link),
    )
}

pub fn comparison_header(query: &ProductQuery, count: usize) -> String {
    format!(
        "<div class=\"comparison-header\"><h3>Price comparison for {}</h3><span class=\"result-count\">{} {}</span></div>",
        escape_html(&query.search_text()),
        count,
        if count == 1 { "result" } else { "results" }
    )
}

/// Banner for the cheapest priced listing; empty when nothing has a price
pub fn best_deal_banner(records: &[ProductRecord], currency: &str) -> String {
    let Some(best) = records
        .iter()
        .filter(|r| r.has_price())
        .min_by(|a, b| a.price.total_cmp(&b.price))
    else {
        return String::new();
    };

    let savings = if best.savings > 0.0 {
        format!(" (save {})", format_price(best.savings, currency))
    } else {
        String::new()
    };

    format!(
        "<div class=\"best-deal\" style=\"background:#E8F5E9;border-left:4px solid #2E7D32;padding:8px;\">\
         Best deal: <strong>{}</strong> at <strong>{}</strong> on {}{}</div>",
        escape_html(&best.title),
        format_price(best.price, currency),
        escape_html(&best.platform_name),
        savings
    )
}

pub fn filter_summary(query: &ProductQuery, currency: &str) -> String {
    let mut filters = Vec::new();

    if let Some(quantity) = query.quantity.as_deref().filter(|q| !q.trim().is_empty()) {
        filters.push(format!("Quantity: {}", escape_html(quantity.trim())));
    }

    match (query.min_price, query.max_price) {
        (Some(min), Some(max)) => filters.push(format!(
            "Price: {} - {}",
            format_price(min, currency),
            format_price(max, currency)
        )),
        (Some(min), None) => filters.push(format!("Price: above {}", format_price(min, currency))),
        (None, Some(max)) => filters.push(format!("Price: under {}", format_price(max, currency))),
        (None, None) => {}
    }

    filters.push(format!("Sorted by: {}", query.sort_by.label()));

    format!("<div class=\"filter-summary\">{}</div>", filters.join(" | "))
}

/// Header, filters, best deal and one card per record
pub fn product_grid(records: &[ProductRecord], query: &ProductQuery, currency: &str) -> String {
    if records.is_empty() {
        return format!(
            "<div class=\"product-grid empty\">{}<p>No products found for {}.</p></div>",
            filter_summary(query, currency),
            escape_html(&query.search_text())
        );
    }

    let cards: String = records.iter().map(|r| product_card(r, currency)).collect();

    format!(
        "<div class=\"product-grid\">{}{}{}<div class=\"cards\" style=\"display:grid;grid-template-columns:repeat(auto-fill,minmax(220px,1fr));gap:16px;\">{}</div></div>",
        comparison_header(query, records.len()),
        filter_summary(query, currency),
        best_deal_banner(records, currency),
        cards
    )
}
