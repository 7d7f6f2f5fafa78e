//! Amount parsing and formatting with configurable separators

use bigdecimal::{BigDecimal, RoundingMode, Signed, Zero};
use std::str::FromStr;
use tracing::debug;

/// Cell values that mean "no amount"
const PLACEHOLDERS: &[&str] = &["-", "--", "n/a", "na", "nil", "none", "null", "\u{2014}", "\u{2013}"];

/// Leading currency markers stripped before parsing
const CURRENCY_PREFIXES: &[&str] = &["$", "£", "€", "¥", "₹", "AUD", "NZD", "USD", "GBP", "EUR"];

/// Decimal and thousands separators used by a counterparty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal_separator: String,
    pub thousands_separator: String,
}

impl NumberFormat {
    pub fn new(decimal_separator: impl Into<String>, thousands_separator: impl Into<String>) -> Self {
        Self {
            decimal_separator: decimal_separator.into(),
            thousands_separator: thousands_separator.into(),
        }
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::new(".", ",")
    }
}

fn is_placeholder(text: &str) -> bool {
    let lower = text.to_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
}

fn strip_currency(text: &str) -> &str {
    for prefix in CURRENCY_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    text
}

/// Parse an amount cell such as `"1,234.50"`, `"(99.00)"`, `"$ 12.00 CR"` or `"1.234,50"`.
///
/// Returns `None` for blanks, placeholders and anything that is not a number.
/// A trailing `CR`/`DR` marker is removed without changing the sign; the
/// column role decides debit versus credit.
pub fn parse_amount(text: &str, format: &NumberFormat) -> Option<BigDecimal> {
    let mut s = text.trim().replace('\u{2212}', "-");
    if s.is_empty() || is_placeholder(&s) {
        return None;
    }

    let mut negative = false;
    if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = s[1..s.len() - 1].trim().to_string();
    }

    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest.trim_start().to_string();
    }
    s = strip_currency(&s).to_string();

    let lower = s.to_ascii_lowercase();
    if lower.ends_with("cr") || lower.ends_with("dr") {
        s.truncate(s.len() - 2);
    }

    let mut cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let decimal = format.decimal_separator.as_str();
    let thousands = format.thousands_separator.as_str();
    if !thousands.trim().is_empty() && thousands != decimal {
        cleaned = cleaned.replace(thousands, "");
    }
    if !decimal.is_empty() && decimal != "." {
        cleaned = cleaned.replace(decimal, ".");
    }

    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        debug!(value = text, "Amount cell has no digits");
        return None;
    }

    match BigDecimal::from_str(&cleaned) {
        Ok(value) if negative => Some(-value.abs()),
        Ok(value) => Some(value),
        Err(_) => {
            debug!(value = text, "Amount cell is not numeric");
            None
        }
    }
}

/// Whether a cell holds a non-zero amount
pub fn has_amount(text: &str, format: &NumberFormat) -> bool {
    parse_amount(text, format).is_some_and(|v| !v.is_zero())
}

/// Render an amount with two decimals (half-even) and grouped thousands
pub fn format_amount(value: &BigDecimal, format: &NumberFormat) -> String {
    let rounded = value.with_scale_round(2, RoundingMode::HalfEven);
    let sign = if rounded.is_negative() { "-" } else { "" };
    let text = rounded.abs().to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push_str(&format.thousands_separator);
        }
        grouped.push(*digit);
    }

    format!("{sign}{grouped}{}{frac_part}", format.decimal_separator)
}
