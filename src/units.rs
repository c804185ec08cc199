// Units - fixed-point amount parsing and formatting
//
// All ledger arithmetic works on integer amounts of the smallest unit.
// Decimal strings only exist at the edges (CLI input, display).

use thiserror::Error;

/// Amount of value in the smallest indivisible unit
pub type Amount = u128;

/// Number of fractional digits in one whole unit
pub const DECIMALS: u8 = 18;

/// One whole unit expressed in the smallest unit
pub const ONE: Amount = 1_000_000_000_000_000_000;

/// Largest supported decimals value (10^38 still fits in u128)
pub const MAX_DECIMALS: u8 = 38;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid character '{0}' in amount")]
    InvalidCharacter(char),

    #[error("Too many decimal points")]
    MultipleDecimalPoints,

    #[error("Too many fractional digits: got {got}, max {max}")]
    TooPrecise { got: usize, max: u8 },

    #[error("Unsupported decimals: {0}")]
    UnsupportedDecimals(u8),

    #[error("Amount overflows the unit representation")]
    Overflow,
}

/// Parse a decimal string like "1", "0.5" or "2.000" into the smallest unit
pub fn parse_units(text: &str, decimals: u8) -> Result<Amount, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedDecimals(decimals));
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }

    let mut parts = text.splitn(3, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(UnitsError::MultipleDecimalPoints);
    }
    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::Empty);
    }
    if let Some(c) = text.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
        return Err(UnitsError::InvalidCharacter(c));
    }
    if fraction.len() > decimals as usize {
        return Err(UnitsError::TooPrecise {
            got: fraction.len(),
            max: decimals,
        });
    }

    let scale = 10u128.pow(decimals as u32);
    let whole_value = digits_to_amount(whole)?
        .checked_mul(scale)
        .ok_or(UnitsError::Overflow)?;

    let padding = 10u128.pow((decimals as usize - fraction.len()) as u32);
    let fraction_value = digits_to_amount(fraction)?
        .checked_mul(padding)
        .ok_or(UnitsError::Overflow)?;

    whole_value
        .checked_add(fraction_value)
        .ok_or(UnitsError::Overflow)
}

/// Format an amount in the smallest unit as a decimal string
///
/// Trailing fractional zeros are trimmed but one digit is always kept,
/// so `ONE` formats as "1.0".
pub fn format_units(amount: Amount, decimals: u8) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    if decimals == 0 {
        return amount.to_string();
    }

    let scale = 10u128.pow(decimals as u32);
    let whole = amount / scale;
    let fraction = amount % scale;

    let mut fraction = format!("{:0width$}", fraction, width = decimals as usize);
    while fraction.len() > 1 && fraction.ends_with('0') {
        fraction.pop();
    }

    format!("{}.{}", whole, fraction)
}

fn digits_to_amount(digits: &str) -> Result<Amount, UnitsError> {
    digits.bytes().try_fold(0u128, |acc, b| {
        acc.checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as u128))
            .ok_or(UnitsError::Overflow)
    })
}
