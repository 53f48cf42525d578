use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::OwnerId;

/// engine-wide settings; values are configuration supplied by the settings
/// collaborator, not part of the core algorithms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// default due day-of-month for new schedules
    pub due_day: u32,
    /// grace months between settlement and the first due date
    pub grace_months: u32,
    /// tolerance for rounding closure and reversal comparisons
    pub collection_tolerance: Money,
    /// cutoff tolerance for recourse collections
    pub resource_tolerance: Money,
    /// tolerance for reconciling a caller-supplied installment value
    pub value_tolerance: Money,
    /// owner assigned to newly generated installments
    pub default_owner: OwnerId,
}

impl Settings {
    pub fn new(due_day: u32, grace_months: u32, collection_tolerance: Decimal) -> Self {
        Settings {
            due_day,
            grace_months,
            collection_tolerance: Money::from_decimal(collection_tolerance),
            ..Settings::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            due_day: 28,
            grace_months: 2,
            collection_tolerance: Money::from_decimal(dec!(0.1)),
            resource_tolerance: Money::from_decimal(dec!(0.05)),
            value_tolerance: Money::ONE,
            default_owner: OwnerId(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.due_day, 28);
        assert_eq!(settings.grace_months, 2);
        assert_eq!(settings.collection_tolerance, Money::from_cents(10));
        assert_eq!(settings.resource_tolerance, Money::from_cents(5));
    }

    #[test]
    fn test_new_overrides_schedule_settings() {
        let settings = Settings::new(10, 0, dec!(0.2));
        assert_eq!(settings.due_day, 10);
        assert_eq!(settings.grace_months, 0);
        assert_eq!(settings.collection_tolerance, Money::from_cents(20));
    }
}
