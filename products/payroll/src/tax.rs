use serde::Serialize;

use crate::error::ValidationError;

/// Flat deduction applied when the payroll is projected for display.
pub const DEFAULT_TAX_RATE: f64 = 0.2;

/// A flat tax rate in `[0, 1]`. Applied exactly once, to the gross pay of a
/// displayed row; the store only ever holds hours and rate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TaxPolicy {
    rate: f64,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            rate: DEFAULT_TAX_RATE,
        }
    }
}

impl TaxPolicy {
    pub fn flat(rate: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ValidationError::InvalidTaxRate(rate));
        }
        Ok(Self { rate })
    }

    pub fn untaxed() -> Self {
        Self { rate: 0.0 }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn net_pay(&self, hours: i32, hourly_rate: f64) -> f64 {
        f64::from(hours) * hourly_rate * (1.0 - self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_deducts_twenty_percent() {
        let net = TaxPolicy::default().net_pay(10, 10.0);
        assert!((net - 80.0).abs() < 1e-9);
    }

    #[test]
    fn untaxed_policy_keeps_gross() {
        assert_eq!(TaxPolicy::untaxed().net_pay(10, 10.0), 100.0);
    }

    #[test]
    fn rates_outside_unit_interval_are_rejected() {
        assert!(TaxPolicy::flat(-0.1).is_err());
        assert!(TaxPolicy::flat(1.5).is_err());
        assert!(TaxPolicy::flat(f64::NAN).is_err());
        assert_eq!(TaxPolicy::flat(1.0).unwrap().net_pay(5, 3.0), 0.0);
    }
}
