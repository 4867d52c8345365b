/// Base shipping rate per kilogram, before the handling fee.
pub const BASE_RATE_PER_KG: f64 = 50.0;

/// Lowest handling fee a warehouse may charge, in percent.
pub const FEE_MIN: f64 = 0.0;

/// Highest handling fee a warehouse may charge, in percent.
pub const FEE_MAX: f64 = 20.0;

/// Shipping cost of a package.
///
/// `base = weight * 50`, then the warehouse's handling fee is added as a
/// percentage of `base`. No rounding is applied.
///
/// Callers validate `weight > 0` and `handling_fee` in `FEE_MIN..=FEE_MAX`.
pub fn shipping_cost(weight: f64, handling_fee: f64) -> f64 {
    let base = weight * BASE_RATE_PER_KG;
    base + base * (handling_fee / 100.0)
}
