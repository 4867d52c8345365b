use crate::pricing::{self, FEE_MAX, FEE_MIN};
use crate::{CoreError, CoreResult};

pub fn validate_handling_fee(fee: f64) -> CoreResult<()> {
    if !fee.is_finite() || !(FEE_MIN..=FEE_MAX).contains(&fee) {
        return Err(CoreError::ValidationError(format!(
            "handling_fee must be between {} and {}, got {}",
            FEE_MIN, FEE_MAX, fee
        )));
    }
    Ok(())
}

pub fn validate_weight(weight: f64) -> CoreResult<()> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(CoreError::ValidationError(format!(
            "weight must be greater than 0, got {}",
            weight
        )));
    }
    // The cost must stay representable at the highest fee, or it would
    // serialize as null.
    if !pricing::shipping_cost(weight, FEE_MAX).is_finite() {
        return Err(CoreError::ValidationError(format!(
            "weight is too large to price, got {}",
            weight
        )));
    }
    Ok(())
}

/// Returns the trimmed name, or an error if nothing is left.
pub fn normalize_warehouse_name(name: &str) -> CoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationError(
            "name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
