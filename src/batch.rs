use chrono::NaiveDate;

use crate::decimal::Money;
use crate::engine::{RunOutcome, ServicingEngine};
use crate::errors::{Result, ServicingError};
use crate::store::ServicingStore;
use crate::types::Selector;
use crate::waterfall::CollectionPolicy;

/// one payment to apply against one debtor selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchItem {
    pub selector: Selector,
    pub amount: Money,
}

/// an item the batch skipped because its error was recoverable
#[derive(Debug)]
pub struct BatchFailure {
    pub item: BatchItem,
    pub error: ServicingError,
}

/// outcome of a batch run: per-item results plus the items that were skipped
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RunOutcome>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn collected(&self) -> Money {
        self.outcomes
            .iter()
            .map(|o| o.total_collected())
            .fold(Money::ZERO, |acc, x| acc + x)
    }
}

/// apply a list of payments through the engine. amounts for the same
/// selector are summed first so one debtor gets one waterfall run.
/// recoverable errors (unknown selector, recourse exclusion) are reported,
/// anything else aborts the batch.
pub fn run_batch<S: ServicingStore>(
    engine: &mut ServicingEngine<S>,
    items: &[BatchItem],
    policy: CollectionPolicy,
    date: Option<NaiveDate>,
    save: bool,
) -> Result<BatchReport> {
    let grouped = group_items(items);
    let mut report = BatchReport::default();

    for item in grouped {
        let result = match policy {
            CollectionPolicy::Standard => {
                engine.charge_debt(item.selector, item.amount, None, date, save)
            }
            CollectionPolicy::EarlyCancel => {
                engine.charge_debt_with_early_cancel(item.selector, item.amount, None, date, save)
            }
        };
        match result {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(error) if error.is_recoverable() => {
                log::warn!("skipping batch item for {}: {}", item.selector, error);
                report.failures.push(BatchFailure { item, error });
            }
            Err(error) => return Err(error),
        }
    }

    log::info!(
        "batch finished: {} runs, {} skipped, {} collected",
        report.outcomes.len(),
        report.failures.len(),
        report.collected()
    );
    Ok(report)
}

/// sum amounts per selector, preserving first-seen order
fn group_items(items: &[BatchItem]) -> Vec<BatchItem> {
    let mut grouped: Vec<BatchItem> = Vec::new();
    for item in items {
        match grouped.iter_mut().find(|g| g.selector == item.selector) {
            Some(existing) => existing.amount += item.amount,
            None => grouped.push(*item),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::decimal::{Money, Rate};
    use crate::store::{MemoryStore, ServicingStore};
    use crate::types::{
        Credit, CreditId, CustomerId, EntryType, Installment, InstallmentId, IssuerId, OwnerId,
    };
    use chrono::{TimeZone, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_engine(store: MemoryStore) -> ServicingEngine<MemoryStore> {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        ));
        ServicingEngine::new(store, Settings::default(), time)
    }

    fn seed_credit(store: &mut MemoryStore, customer: u64) -> CreditId {
        let credit_id = store.allocate_credit_id();
        let installment_id = store.allocate_installment_id();
        let credit = Credit {
            id: credit_id,
            external_id: None,
            customer_id: CustomerId(customer),
            issuer_id: Some(IssuerId(1)),
            settlement_date: date(2024, 1, 15),
            principal_requested: Money::from_major(800),
            principal_granted: Money::from_major(800),
            term: 1,
            rate: Rate::from_decimal(dec!(0.25)),
            installment_value: Money::from_major(1000),
            first_due_date: date(2024, 2, 28),
            purchase_lot: None,
            sale_lot: None,
        };
        let installment = Installment {
            id: installment_id,
            credit_id,
            number: 1,
            due_date: date(2024, 2, 28),
            principal: Money::from_major(800),
            interest: Money::from_major(165),
            tax: Money::from_major(35),
            total: Money::from_major(1000),
            owner: OwnerId(1),
        };
        store.insert_credit(credit, vec![installment]).unwrap();
        credit_id
    }

    #[test]
    fn test_items_for_same_selector_are_merged() {
        let selector = Selector::ByCustomer(CustomerId(1));
        let items = vec![
            BatchItem { selector, amount: Money::from_major(300) },
            BatchItem {
                selector: Selector::ByCustomer(CustomerId(2)),
                amount: Money::from_major(50),
            },
            BatchItem { selector, amount: Money::from_major(700) },
        ];
        let grouped = group_items(&items);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].amount, Money::from_major(1000));
        assert_eq!(grouped[1].amount, Money::from_major(50));
    }

    #[test]
    fn test_recoverable_failures_do_not_abort_the_batch() {
        let mut store = MemoryStore::new();
        let known = seed_credit(&mut store, 1);
        let mut engine = test_engine(store);

        let items = vec![
            BatchItem {
                selector: Selector::ByCustomer(CustomerId(99)),
                amount: Money::from_major(100),
            },
            BatchItem {
                selector: Selector::ByOperation(known),
                amount: Money::from_major(1000),
            },
        ];
        let report = run_batch(
            &mut engine,
            &items,
            CollectionPolicy::Standard,
            Some(date(2024, 3, 1)),
            true,
        )
        .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            ServicingError::IdentifierError { .. }
        ));
        assert_eq!(report.collected(), Money::from_major(1000));

        // the successful item was persisted despite the skipped one
        let rows = engine.get_balance(Some(&[known]));
        assert!(rows[0].is_settled());
    }

    #[test]
    fn test_batch_applies_the_requested_policy() {
        let mut store = MemoryStore::new();
        let credit = seed_credit(&mut store, 1);
        let mut engine = test_engine(store);

        let items = vec![BatchItem {
            selector: Selector::ByOperation(credit),
            amount: Money::from_major(600),
        }];
        let report = run_batch(
            &mut engine,
            &items,
            CollectionPolicy::Standard,
            Some(date(2024, 3, 1)),
            false,
        )
        .unwrap();
        let entry = &report.outcomes[0].entries[0];
        assert_eq!(entry.entry_type, EntryType::EarlyAnticipated);
        assert_eq!(entry.installment_id, InstallmentId(1));
        assert_eq!(entry.principal, Money::from_major(400));
    }
}
