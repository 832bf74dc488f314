use rust_decimal::Decimal;

use super::MetricBounds;
use crate::funding::domain::MetricOrientation;

/// Scales a raw score against the batch maximum for its metric.
///
/// Increasing metrics score `raw / max`; decreasing metrics score the complement,
/// `1 - raw / max`. A zero maximum scores 0 in either orientation. When a single application
/// is scored, `min == max == raw`, so it gets 1 (increasing) or 0 (decreasing).
///
/// `None` when the result does not fit in a `Decimal`.
pub fn normalize_score(
    raw_score: Decimal,
    bounds: &MetricBounds,
    orientation: MetricOrientation,
) -> Option<Decimal> {
    if bounds.max_value.is_zero() {
        return Some(Decimal::ZERO);
    }

    let ratio = raw_score.checked_div(bounds.max_value)?;
    if orientation.is_increasing() {
        Some(ratio)
    } else {
        Decimal::ONE.checked_sub(ratio)
    }
}
