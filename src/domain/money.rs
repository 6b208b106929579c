use thiserror::Error;

/// Money is represented as integer cents to avoid floating-point drift when
/// summing line totals. R$ 3,95 = 395 cents.
pub type Cents = i64;

/// Format cents as a plain decimal string.
/// Example: 790 -> "7.90", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCentsError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid money format: {0}")]
    InvalidFormat(String),
}

/// Parse a user-entered decimal amount into cents.
/// Accepts both `.` and `,` as the decimal separator ("3,95" is how amounts
/// are typed at the counter). Extra decimal places are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseCentsError::Empty);
    }
    let invalid = || ParseCentsError::InvalidFormat(trimmed.to_string());

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let normalized = body.replace(',', ".");

    let (units_str, decimal_str) = match normalized.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (normalized.as_str(), ""),
    };
    if decimal_str.contains('.') || (units_str.is_empty() && decimal_str.is_empty()) {
        return Err(invalid());
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(units_str) || !all_digits(decimal_str) {
        return Err(invalid());
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| invalid())?
    };
    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => decimal_str.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => decimal_str[..2].parse().map_err(|_| invalid())?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or_else(invalid)?;
    Ok(if negative { -cents } else { cents })
}

/// Convert a decimal amount as found in persisted JSON (`7.9`) into cents.
/// Returns `None` for NaN and infinities.
pub fn cents_from_decimal(value: f64) -> Option<Cents> {
    if !value.is_finite() {
        return None;
    }
    let cents = (value * 100.0).round();
    if cents.abs() > i64::MAX as f64 {
        return None;
    }
    Some(cents as Cents)
}

/// Convert cents back into the decimal number written to persisted JSON.
pub fn cents_to_decimal(cents: Cents) -> f64 {
    cents as f64 / 100.0
}
