use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{canonical_key, CollectionEntry, CreditId, Installment, InstallmentId, NewEntry};

/// outstanding amounts of one installment, derived from the schedule minus
/// the ledger; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub installment_id: InstallmentId,
    pub credit_id: CreditId,
    pub number: u32,
    pub due_date: NaiveDate,
    /// outstanding components, rounded to cents
    pub principal: Money,
    pub interest: Money,
    pub tax: Money,
    pub total: Money,
    /// original schedule components, for gap computations
    pub scheduled_principal: Money,
    pub scheduled_interest: Money,
    pub scheduled_tax: Money,
    pub scheduled_total: Money,
}

impl BalanceRow {
    /// what has been collected so far, per component
    pub fn collected_total(&self) -> Money {
        self.scheduled_total - self.total
    }

    pub fn is_settled(&self) -> bool {
        self.total.is_zero()
    }
}

/// derive one balance row per installment: schedule amounts minus the sum of
/// all ledger entries referencing it, rounded to cents, in canonical order
pub fn balance_rows(installments: &[Installment], entries: &[CollectionEntry]) -> Vec<BalanceRow> {
    let mut rows: Vec<BalanceRow> = installments
        .iter()
        .map(|inst| {
            let mut principal = inst.principal;
            let mut interest = inst.interest;
            let mut tax = inst.tax;
            let mut total = inst.total;
            for entry in entries.iter().filter(|e| e.installment_id == inst.id) {
                principal -= entry.principal;
                interest -= entry.interest;
                tax -= entry.tax;
                total -= entry.total;
            }
            BalanceRow {
                installment_id: inst.id,
                credit_id: inst.credit_id,
                number: inst.number,
                due_date: inst.due_date,
                principal: principal.to_cents(),
                interest: interest.to_cents(),
                tax: tax.to_cents(),
                total: total.to_cents(),
                scheduled_principal: inst.principal.to_cents(),
                scheduled_interest: inst.interest.to_cents(),
                scheduled_tax: inst.tax.to_cents(),
                scheduled_total: inst.total.to_cents(),
            }
        })
        .collect();

    rows.sort_by_key(|r| canonical_key(r.due_date, r.credit_id, r.number));
    rows
}

/// re-derive the rows after subtracting a run's draft entries; used by the
/// rounding closure before anything is persisted
pub fn apply_drafts(rows: &[BalanceRow], drafts: &[NewEntry]) -> Vec<BalanceRow> {
    rows.iter()
        .map(|row| {
            let mut updated = row.clone();
            for draft in drafts.iter().filter(|d| d.installment_id == row.installment_id) {
                updated.principal = (updated.principal - draft.principal).to_cents();
                updated.interest = (updated.interest - draft.interest).to_cents();
                updated.tax = (updated.tax - draft.tax).to_cents();
                updated.total = (updated.total - draft.total).to_cents();
            }
            updated
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryId, EntryType, OwnerId};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn installment(id: u64, credit: u64, number: u32, due: NaiveDate) -> Installment {
        Installment {
            id: InstallmentId(id),
            credit_id: CreditId(credit),
            number,
            due_date: due,
            principal: Money::from_major(800),
            interest: Money::from_major(165),
            tax: Money::from_major(35),
            total: Money::from_major(1000),
            owner: OwnerId(1),
        }
    }

    fn entry(installment_id: u64, total_cents: i64) -> CollectionEntry {
        let total = Money::from_cents(total_cents);
        CollectionEntry {
            id: EntryId(1),
            installment_id: InstallmentId(installment_id),
            run_id: Uuid::new_v4(),
            emission_date: date(2024, 3, 1),
            entry_type: EntryType::Regular,
            principal: total,
            interest: Money::ZERO,
            tax: Money::ZERO,
            total,
        }
    }

    #[test]
    fn test_balance_is_schedule_minus_ledger() {
        let inst = installment(1, 1, 1, date(2024, 2, 28));
        let rows = balance_rows(&[inst], &[entry(1, 30_000)]);
        assert_eq!(rows[0].principal, Money::from_major(500));
        assert_eq!(rows[0].total, Money::from_major(700));
        assert_eq!(rows[0].scheduled_total, Money::from_major(1000));
        assert_eq!(rows[0].collected_total(), Money::from_major(300));
    }

    #[test]
    fn test_rows_follow_canonical_order() {
        let installments = vec![
            installment(3, 2, 1, date(2024, 3, 28)),
            installment(1, 1, 2, date(2024, 2, 28)),
            installment(2, 1, 1, date(2024, 2, 28)),
        ];
        let rows = balance_rows(&installments, &[]);
        let order: Vec<u64> = rows.iter().map(|r| r.installment_id.0).collect();
        // same due date resolves by credit id then number; later date last
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let installments = vec![installment(1, 1, 1, date(2024, 2, 28))];
        let entries = vec![entry(1, 12_345)];
        let first = balance_rows(&installments, &entries);
        let second = balance_rows(&installments, &entries);
        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_drafts_reduces_outstanding() {
        let installments = vec![installment(1, 1, 1, date(2024, 2, 28))];
        let rows = balance_rows(&installments, &[]);
        let draft = NewEntry {
            installment_id: InstallmentId(1),
            emission_date: date(2024, 3, 1),
            entry_type: EntryType::Regular,
            principal: Money::from_major(800),
            interest: Money::from_major(165),
            tax: Money::from_major(35),
            total: Money::from_major(1000),
        };
        let residual = apply_drafts(&rows, &[draft]);
        assert!(residual[0].is_settled());
        assert_eq!(residual[0].principal, Money::ZERO);
    }
}
