// src/domain/pricing.rs

/// Slot duration tiers, in hours.
pub const SLOT_DURATIONS: [i32; 3] = [3, 6, 12];

/// Fraction of the full-day price charged for a slot tier.
pub fn rate_for(duration_hours: i32) -> Option<f64> {
    match duration_hours {
        3 => Some(0.30),
        6 => Some(0.50),
        12 => Some(0.75),
        _ => None,
    }
}

pub fn is_valid_duration(duration_hours: i32) -> bool {
    rate_for(duration_hours).is_some()
}

/// Price of one slot. Durations outside the tiers price at 0; callers
/// validate the tier before persisting.
pub fn slot_price(full_day_price: f64, duration_hours: i32) -> f64 {
    match rate_for(duration_hours) {
        Some(rate) => round2(full_day_price * rate),
        None => 0.0,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
