use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Money, Rate};

macro_rules! sequence_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }
    };
}

sequence_id!(
    /// store-allocated credit identifier
    CreditId
);
sequence_id!(
    /// store-allocated installment identifier
    InstallmentId
);
sequence_id!(
    /// store-allocated ledger entry identifier
    EntryId
);
sequence_id!(
    /// customer identifier, owned by the master-data collaborator
    CustomerId
);
sequence_id!(
    /// originating company identifier
    IssuerId
);
sequence_id!(
    /// portfolio purchase/sale lot identifier
    LotId
);
sequence_id!(
    /// collection-rights owner identifier
    OwnerId
);

/// one loan: terms fixed at origination, immutable once posted except for
/// the portfolio ownership links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: CreditId,
    pub external_id: Option<u64>,
    pub customer_id: CustomerId,
    pub issuer_id: Option<IssuerId>,
    pub settlement_date: NaiveDate,
    pub principal_requested: Money,
    pub principal_granted: Money,
    /// count of installments
    pub term: u32,
    /// periodic rate, tax-inclusive
    pub rate: Rate,
    pub installment_value: Money,
    pub first_due_date: NaiveDate,
    pub purchase_lot: Option<LotId>,
    pub sale_lot: Option<LotId>,
}

/// one scheduled payment of a credit; created in a batch by the schedule
/// generator and immutable thereafter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub credit_id: CreditId,
    /// 1-based sequence number within the credit
    pub number: u32,
    pub due_date: NaiveDate,
    pub principal: Money,
    pub interest: Money,
    pub tax: Money,
    pub total: Money,
    pub owner: OwnerId,
}

/// closed set of ledger entry tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// full settlement of an installment in due-date order
    Regular,
    /// payment applied ahead of schedule, leaving a residual on the installment
    EarlyAnticipated,
    /// manually entered partial collection
    Partial,
    /// clears a sub-tolerance residual after a waterfall run
    Rounding,
    /// overpayment booked as synthetic debt owed back to the customer
    Penalty,
    /// principal prepaid on a not-yet-due installment
    EarlyCancel,
    /// interest and tax forgiven on a prepaid installment; zero cash impact
    EarlyCancelBonus,
    /// negated offset of previously collected amounts
    Reversal,
    /// settlement of installments outside a purchased lot
    NotPurchased,
    /// recourse collection against the originating company
    Resource,
}

/// a signed ledger row recording money applied to (or reversed from) exactly
/// one installment; append-only, never edited in place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub id: EntryId,
    pub installment_id: InstallmentId,
    /// run that appended this entry; one run's entries form an atomic batch
    pub run_id: Uuid,
    pub emission_date: NaiveDate,
    pub entry_type: EntryType,
    pub principal: Money,
    pub interest: Money,
    pub tax: Money,
    pub total: Money,
}

/// ledger row awaiting an id from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub installment_id: InstallmentId,
    pub emission_date: NaiveDate,
    pub entry_type: EntryType,
    pub principal: Money,
    pub interest: Money,
    pub tax: Money,
    pub total: Money,
}

impl NewEntry {
    /// round all components to cent precision
    pub fn to_cents(mut self) -> Self {
        self.principal = self.principal.to_cents();
        self.interest = self.interest.to_cents();
        self.tax = self.tax.to_cents();
        self.total = self.total.to_cents();
        self
    }
}

/// portfolio purchase lot; a recourse-excluded lot makes its credits
/// ineligible for the standard collection paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLot {
    pub id: LotId,
    pub recourse_excluded: bool,
}

/// target of a collection or reversal run, resolved once at the boundary
/// into a concrete set of credit ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// fan out to every credit of the customer
    ByCustomer(CustomerId),
    /// a single credit by its own id
    ByOperation(CreditId),
    /// a single credit by its external id
    ByExternalId(u64),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::ByCustomer(id) => write!(f, "customer {id}"),
            Selector::ByOperation(id) => write!(f, "credit {id}"),
            Selector::ByExternalId(id) => write!(f, "external {id}"),
        }
    }
}

/// canonical processing order: due date, then credit id, then sequence number
pub fn canonical_key(due_date: NaiveDate, credit_id: CreditId, number: u32) -> (NaiveDate, CreditId, u32) {
    (due_date, credit_id, number)
}
