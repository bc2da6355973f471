//! Linear time decay shared by the edge-weight store and the recall
//! recency boost.
//!
//! Stored values lose strength linearly over roughly six months but never
//! drop below 10% of their stored magnitude, so old-but-once-strong
//! connections stay faintly visible.

/// Days until the decay reaches its floor.
pub const DECAY_HORIZON_DAYS: f64 = 180.0;

/// Fraction of the stored value retained after the horizon.
pub const DECAY_FLOOR: f64 = 0.1;

/// Multiplier applied to a stored value given its age in days.
/// Monotonically non-increasing in `days`; clamped to `DECAY_FLOOR`.
pub fn linear_decay(days: f64) -> f64 {
    if days <= 0.0 {
        return 1.0;
    }
    (1.0 - days / DECAY_HORIZON_DAYS).max(DECAY_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_value_undecayed() {
        assert_eq!(linear_decay(0.0), 1.0);
        assert_eq!(linear_decay(-5.0), 1.0);
    }

    #[test]
    fn monotonically_non_increasing() {
        let mut prev = linear_decay(0.0);
        for d in 1..400 {
            let cur = linear_decay(d as f64);
            assert!(cur <= prev, "decay increased at day {d}");
            prev = cur;
        }
    }

    #[test]
    fn never_below_floor() {
        assert_eq!(linear_decay(180.0), DECAY_FLOOR);
        assert_eq!(linear_decay(10_000.0), DECAY_FLOOR);
    }

    #[test]
    fn halfway_point() {
        assert!((linear_decay(90.0) - 0.5).abs() < 1e-9);
    }
}
