pub mod balance;
pub mod batch;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod reversal;
pub mod schedule;
pub mod store;
pub mod types;
pub mod waterfall;

// re-export key types
pub use balance::{balance_rows, BalanceRow};
pub use batch::{run_batch, BatchFailure, BatchItem, BatchReport};
pub use config::Settings;
pub use decimal::{Money, Rate};
pub use engine::{CreditRequest, PenaltyDebt, RunOutcome, ServicingEngine};
pub use errors::{Result, ServicingError};
pub use store::{MemoryStore, RunBatch, ServicingStore};
pub use types::{
    CollectionEntry, Credit, CreditId, CustomerId, EntryId, EntryType, Installment, InstallmentId,
    IssuerId, LotId, NewEntry, OwnerId, PurchaseLot, Selector,
};
pub use waterfall::{AllocationPlan, CollectionPolicy};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
