use thiserror::Error;

/// Money is an integer number of cents (smallest currency unit).
/// All balances, reservations and log amounts use this representation;
/// nothing in the crate touches floating point.
pub type Cents = i64;

/// Format cents as a decimal string: 5000 -> "50.00", -1 -> "-0.01".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    #[error("invalid money format: {0:?}")]
    InvalidFormat(String),
    #[error("at most two decimal places are allowed: {0:?}")]
    TooManyDecimals(String),
}

/// Parse a decimal string into cents. Accepts "50", "50.0" and "50.00";
/// rejects more than two decimal places rather than silently truncating.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let invalid = || ParseCentsError::InvalidFormat(input.to_string());

    let cents = match digits.split_once('.') {
        None => {
            let units: i64 = digits.parse().map_err(|_| invalid())?;
            units * 100
        }
        Some((units_part, decimal_part)) => {
            let units: i64 = if units_part.is_empty() {
                0
            } else {
                units_part.parse().map_err(|_| invalid())?
            };
            let decimal: i64 = match decimal_part.len() {
                0 => 0,
                1 => decimal_part.parse::<i64>().map_err(|_| invalid())? * 10,
                2 => decimal_part.parse().map_err(|_| invalid())?,
                _ => return Err(ParseCentsError::TooManyDecimals(input.to_string())),
            };
            units * 100 + decimal
        }
    };

    Ok(if negative { -cents } else { cents })
}
