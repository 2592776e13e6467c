// Utility helpers for parsing, ratios and number formatting.
//
// This module centralizes all the "dirty" text/number handling so the rest
// of the code can assume clean, typed values, and it owns the single zero
// policy every rate or ratio goes through.
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in French CSV exports.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace and drops space / non-breaking-space separators.
/// - Rejects values that contain alphabetic characters (except an exponent).
/// - A lone comma is read as the decimal separator (`"12,5"`); with both a
///   comma and a dot present, commas are thousands separators.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let compact: String = s
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if compact
        .chars()
        .any(|c| c.is_alphabetic() && c != 'e' && c != 'E')
    {
        return None;
    }
    let cleaned = if compact.contains('.') {
        compact.replace(',', "")
    } else if compact.matches(',').count() == 1 {
        compact.replace(',', ".")
    } else {
        compact.replace(',', "")
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer field, accepting float renderings of whole numbers
/// (`"2017.0"`), which spreadsheet exports produce for year columns.
pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i32>() {
        return Some(v);
    }
    let v = parse_f64_safe(Some(s))?;
    if v.fract() != 0.0 || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let year = v as i32;
    Some(year)
}

/// Populations are non-negative whole numbers; anything else is missing.
pub fn parse_u64_safe(s: Option<&str>) -> Option<u64> {
    let v = parse_f64_safe(s)?;
    if v < 0.0 || v.fract() != 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = v as u64;
    Some(whole)
}

/// Yes/no commune flags. Unknown spellings stay missing.
pub fn parse_flag(s: Option<&str>) -> Option<bool> {
    match s?.trim().to_uppercase().as_str() {
        "OUI" | "O" | "YES" | "Y" | "TRUE" | "1" => Some(true),
        "NON" | "N" | "NO" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

/// Trim and collapse inner whitespace runs to a single space.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical commune key: collapsed whitespace, Unicode upper case.
pub fn canonical_commune(s: &str) -> String {
    normalize_text(s).to_uppercase()
}

/// `numerator / denominator`, or `0.0` whenever the denominator is zero or
/// the quotient is not finite. Every derived rate goes through here.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

/// Percentage change from `previous` to `current`.
///
/// Unlike [`safe_ratio`] a zero base is *undefined* here, not zero.
pub fn pct_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let (previous, current) = (previous?, current?);
    if previous == 0.0 {
        return None;
    }
    let change = (current - previous) / previous * 100.0;
    change.is_finite().then_some(change)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    // `-0.00` reads badly in tables; only keep the sign if something survives.
    let is_zero = res.chars().all(|c| matches!(c, '0' | '.' | ','));
    if n.is_sign_negative() && !is_zero {
        format!("-{res}")
    } else {
        res
    }
}

/// Like [`format_number`] but always carries an explicit sign.
pub fn format_signed(n: f64, decimals: usize) -> String {
    let body = format_number(n, decimals);
    if body.starts_with('-') {
        body
    } else {
        format!("+{body}")
    }
}

/// Short human rendering with a `K` / `M` / `Md` suffix (`1.2M`).
pub fn format_compact(n: f64, decimals: usize) -> String {
    let abs = n.abs();
    let (scaled, suffix) = if abs >= 1_000_000_000.0 {
        (n / 1_000_000_000.0, "Md")
    } else if abs >= 1_000_000.0 {
        (n / 1_000_000.0, "M")
    } else if abs >= 1_000.0 {
        (n / 1_000.0, "K")
    } else {
        (n, "")
    };
    format!("{}{suffix}", format_number(scaled, decimals))
}

/// Optional values render as `-` in tables.
pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    n.map_or_else(|| "-".to_string(), |v| format_number(v, decimals))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for integer-like values. This is used
    // for counts in console messages (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}
