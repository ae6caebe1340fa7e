/// Trim whitespace and strip one pair of outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lenient numeric parse: `None` for anything that is not a number.
/// NaN spellings count as missing, not as a value.
pub fn parse_f64(raw: &str) -> Option<f64> {
    clean_str(raw).parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Integer value of `raw`, accepting float spellings of whole numbers
/// (`"123.0"`, `"1.23e2"`) and leading zeros.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned = clean_str(raw);
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    let v: f64 = cleaned.parse().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Integer identifier rendered without float artifacts: `"123"`, `"123.0"`
/// and `"1.23e2"` all become `"123"`. Non-integral values yield `None`.
pub fn integer_string(raw: &str) -> Option<String> {
    parse_integer(raw).map(|v| v.to_string())
}
