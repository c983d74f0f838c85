//! Ounce-price to per-gram local-currency conversion

use crate::error::{AppError, Result};

/// Grams in one troy ounce
pub const OUNCE_TO_GRAM: f64 = 31.1035;

/// Convert a USD/oz price into local currency per gram.
///
/// Both operands must be finite and strictly positive. The result is not
/// rounded; callers store it as-is.
pub fn to_gram_price(raw_price: f64, rate: f64) -> Result<f64> {
    if !raw_price.is_finite() || raw_price <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "raw price must be positive and finite, got {}",
            raw_price
        )));
    }
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "conversion rate must be positive and finite, got {}",
            rate
        )));
    }

    Ok((raw_price / OUNCE_TO_GRAM) * rate)
}
