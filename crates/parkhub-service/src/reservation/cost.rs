//! Parking cost formula.

use chrono::{DateTime, Utc};

use parkhub_core::types::money::round_cents;

/// Cost of a stay from `parked_at` to `left_at`.
///
/// Billable hours are the exact elapsed hours, floored at one hour, and
/// the product is rounded to cents.
pub fn compute_cost(parked_at: DateTime<Utc>, left_at: DateTime<Utc>, price_per_hour: f64) -> f64 {
    let seconds = (left_at - parked_at).num_milliseconds() as f64 / 1000.0;
    let hours = (seconds / 3600.0).max(1.0);
    round_cents(hours * price_per_hour)
}
