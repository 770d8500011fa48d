//! Trigger evaluation.
//!
//! Pure and deterministic; the monitor re-runs it on every poll tick since
//! the price is external.

use serde::Serialize;

use crate::order::{Order, TriggerCondition};

/// Outcome of evaluating an order against the current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerDecision {
    /// Condition met and not expired: execute now.
    Fire,
    /// Condition not met yet.
    Wait,
    /// Past expiry. Terminal; never fires.
    Expired,
}

/// `expiry = 0` never expires.
#[must_use]
pub fn is_expired(expiry: i64, now: i64) -> bool {
    expiry > 0 && now > expiry
}

/// Decide whether an order fires.
///
/// Expiry is checked first and wins over a satisfied price condition.
/// Both comparisons are inclusive at the boundary.
#[must_use]
pub fn evaluate(
    current_price: u64,
    condition: TriggerCondition,
    trigger_price: u64,
    expiry: i64,
    now: i64,
) -> TriggerDecision {
    if is_expired(expiry, now) {
        return TriggerDecision::Expired;
    }

    let met = match condition {
        TriggerCondition::Below => current_price <= trigger_price,
        TriggerCondition::Above => current_price >= trigger_price,
    };

    if met {
        TriggerDecision::Fire
    } else {
        TriggerDecision::Wait
    }
}

impl Order {
    /// Evaluate this order's trigger at `current_price` and time `now`.
    #[must_use]
    pub fn evaluate(&self, current_price: u64, now: i64) -> TriggerDecision {
        evaluate(
            current_price,
            self.trigger_condition,
            self.trigger_price,
            self.expiry,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_below_condition() {
        let eval = |p| evaluate(p, TriggerCondition::Below, 50_000, 0, NOW);
        assert_eq!(eval(49_000), TriggerDecision::Fire);
        assert_eq!(eval(50_000), TriggerDecision::Fire);
        assert_eq!(eval(51_000), TriggerDecision::Wait);
    }

    #[test]
    fn test_above_condition() {
        let eval = |p| evaluate(p, TriggerCondition::Above, 50_000, 0, NOW);
        assert_eq!(eval(49_000), TriggerDecision::Wait);
        assert_eq!(eval(50_000), TriggerDecision::Fire);
        assert_eq!(eval(51_000), TriggerDecision::Fire);
    }

    #[test]
    fn test_expired_wins_over_price() {
        // Price condition holds, but expiry passed
        let d = evaluate(40_000, TriggerCondition::Below, 50_000, NOW - 1, NOW);
        assert_eq!(d, TriggerDecision::Expired);

        let d = evaluate(60_000, TriggerCondition::Above, 50_000, NOW - 1, NOW);
        assert_eq!(d, TriggerDecision::Expired);
    }

    #[test]
    fn test_expiry_boundary_not_expired() {
        // now == expiry is still live
        let d = evaluate(40_000, TriggerCondition::Below, 50_000, NOW, NOW);
        assert_eq!(d, TriggerDecision::Fire);
    }

    #[test]
    fn test_zero_expiry_never_expires() {
        assert!(!is_expired(0, i64::MAX));
        let d = evaluate(51_000, TriggerCondition::Below, 50_000, 0, i64::MAX);
        assert_eq!(d, TriggerDecision::Wait);
    }
}
