use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("{0} is not a fraction in the range (0, 1]")]
    OutOfRange(Decimal),
}

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parses a fraction such as `0.2`. Zero and values above one are rejected.
pub fn parse_fraction(value: &str) -> Result<Decimal, ParseError> {
    let fraction = Decimal::from_str(value.trim()).map_err(|_| ParseError::NotANumber(value.to_string()))?;
    if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
        return Err(ParseError::OutOfRange(fraction));
    }
    Ok(fraction)
}
