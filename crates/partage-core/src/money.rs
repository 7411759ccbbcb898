//! Cent-precise rounding shared by the balance engine and settlement planner.
//!
//! Amounts flow through the system as `f64` (matching the currency-amount
//! fields on entries), but every split and settlement computation happens in
//! integer cents so replicas converge bit-for-bit. These helpers are the only
//! place that crosses between the two representations.

/// Round a default-currency amount to integer cents, half-away-from-zero.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Convert integer cents back to a default-currency amount.
pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Round a floating amount to 2 decimal places, the precision settlement
/// transactions are reported at.
pub fn round2(amount: f64) -> f64 {
    from_cents(to_cents(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_exact_cents() {
        assert_eq!(to_cents(33.34), 3334);
        assert_eq!(from_cents(3334), 33.34);
    }

    #[test]
    fn round2_clamps_float_noise() {
        assert_eq!(round2(0.1 + 0.2), 0.3);
    }
}
