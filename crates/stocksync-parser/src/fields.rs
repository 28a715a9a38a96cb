//! Lenient scalar parsing. Exports routinely carry empty strings and comma
//! decimal separators, so none of these functions fail.

/// Empty or unparsable input yields `0.0`; `,` is accepted as the decimal separator.
pub fn parse_decimal(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.replace(',', ".").parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Empty or unparsable input yields `0`.
pub fn parse_integer(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

/// `Y`, `T`, `1` and `TAK` (any case) are true, everything else is false.
pub fn parse_flag(raw: &str) -> bool {
    let value = raw.trim();
    ["Y", "T", "1", "TAK"]
        .iter()
        .any(|candidate| value.eq_ignore_ascii_case(candidate))
}

/// Strict integer parsing for identity fields.
pub(crate) fn parse_identity(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}
