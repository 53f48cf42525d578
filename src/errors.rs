use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{CreditId, InstallmentId, Selector};

#[derive(Error, Debug)]
pub enum ServicingError {
    #[error("there are no credits for the selector ({selector})")]
    IdentifierError {
        selector: Selector,
    },

    #[error("there are no credits without recourse for the selector ({selector})")]
    ResourceError {
        selector: Selector,
    },

    #[error(
        "the rate ({rate}) and the number of installments ({term}) don't match \
         the provided installment value ({provided}, computed {computed})"
    )]
    ValueMismatch {
        rate: String,
        term: u32,
        provided: Money,
        computed: Money,
    },

    #[error("invalid first due date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error(
        "inconsistent ledger state at installment {installment_id}: \
         remaining budget {budget}, balance {balance}, scheduled {scheduled}"
    )]
    InconsistentState {
        installment_id: InstallmentId,
        budget: Money,
        balance: Money,
        scheduled: Money,
    },

    #[error("unknown credit: {id}")]
    UnknownCredit {
        id: CreditId,
    },

    #[error("storage violation during run {run_id}: {message}")]
    Storage {
        run_id: Uuid,
        message: String,
    },
}

impl ServicingError {
    /// recoverable conditions are expected during batch runs and are caught
    /// per selector instead of aborting the whole run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServicingError::IdentifierError { .. } | ServicingError::ResourceError { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ServicingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CustomerId;

    #[test]
    fn test_recoverable_classification() {
        let identifier = ServicingError::IdentifierError {
            selector: Selector::ByCustomer(CustomerId(3)),
        };
        let resource = ServicingError::ResourceError {
            selector: Selector::ByOperation(CreditId(1)),
        };
        let fatal = ServicingError::InconsistentState {
            installment_id: InstallmentId(1),
            budget: Money::from_major(10),
            balance: Money::ZERO,
            scheduled: Money::from_major(100),
        };
        assert!(identifier.is_recoverable());
        assert!(resource.is_recoverable());
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_identifier_error_message() {
        let err = ServicingError::IdentifierError {
            selector: Selector::ByCustomer(CustomerId(42)),
        };
        assert_eq!(
            err.to_string(),
            "there are no credits for the selector (customer 42)"
        );
    }
}
