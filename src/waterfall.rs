use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::balance::{apply_drafts, BalanceRow};
use crate::config::Settings;
use crate::decimal::{gross_split, Money};
use crate::types::{EntryType, NewEntry};

/// allocation policy for an incoming payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionPolicy {
    /// due-date order, partial-installment split, penalty synthesis
    Standard,
    /// settle due installments, then prepay future principal with full
    /// interest/tax forgiveness
    EarlyCancel,
}

/// outcome of the pure allocation pass; any excess feeds penalty synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub entries: Vec<NewEntry>,
    pub excess: Money,
}

/// amounts of a synthesized penalty debt: the excess booked as pure
/// interest plus its tax
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyAmounts {
    pub interest: Money,
    pub tax: Money,
    pub total: Money,
}

/// split an overpayment excess into the penalty components
pub fn penalty_amounts(excess: Money) -> PenaltyAmounts {
    let (interest, tax) = gross_split(excess);
    PenaltyAmounts {
        interest: interest.to_cents(),
        tax: tax.to_cents(),
        total: excess.to_cents(),
    }
}

/// allocate a payment across the outstanding rows under the given policy;
/// rows must already be in canonical order
pub fn allocate(
    rows: &[BalanceRow],
    amount: Money,
    value_date: NaiveDate,
    policy: CollectionPolicy,
    settings: &Settings,
) -> AllocationPlan {
    let mut entries = Vec::new();
    let mut remaining = amount;

    let (current, future): (Vec<&BalanceRow>, Vec<&BalanceRow>) = match policy {
        CollectionPolicy::Standard => (rows.iter().collect(), Vec::new()),
        CollectionPolicy::EarlyCancel => rows.iter().partition(|r| r.due_date <= value_date),
    };

    remaining = settle_in_order(&current, remaining, value_date, settings, &mut entries);

    if policy == CollectionPolicy::EarlyCancel && remaining.is_positive() {
        remaining = prepay_future(&future, remaining, value_date, &mut entries);
    }

    let excess = remaining.to_cents().max(Money::ZERO);
    log::debug!(
        "allocated {} across {} entries, excess {}",
        amount,
        entries.len(),
        excess
    );
    AllocationPlan { entries, excess }
}

/// full settlements in canonical order while the cumulative total fits, then
/// one partial payment to the next unsettled installment
fn settle_in_order(
    rows: &[&BalanceRow],
    budget: Money,
    value_date: NaiveDate,
    settings: &Settings,
    entries: &mut Vec<NewEntry>,
) -> Money {
    let mut remaining = budget;
    let mut cumulative = Money::ZERO;
    let mut partial_target: Option<&BalanceRow> = None;

    for row in rows {
        cumulative += row.total;
        if cumulative <= budget {
            if !row.is_settled() {
                let entry = NewEntry {
                    installment_id: row.installment_id,
                    emission_date: value_date,
                    entry_type: EntryType::Regular,
                    principal: row.principal,
                    interest: row.interest,
                    tax: row.tax,
                    total: row.total,
                }
                .to_cents();
                remaining -= entry.total;
                entries.push(entry);
            }
        } else if row.is_settled() {
            continue;
        } else {
            partial_target = Some(row);
            break;
        }
    }

    if let Some(row) = partial_target.filter(|_| remaining.is_positive()) {
        let (principal, interest, tax) = if row.interest + row.tax >= remaining {
            // the interest+tax budget absorbs the whole remainder, split
            // proportionally out of the gross amount
            let (interest, tax) = gross_split(remaining);
            (Money::ZERO, interest, tax)
        } else {
            (remaining - (row.interest + row.tax), row.interest, row.tax)
        };
        let total = principal + interest + tax;
        let residual = row.total - total;
        let entry_type = if residual >= settings.collection_tolerance {
            EntryType::EarlyAnticipated
        } else {
            EntryType::Regular
        };
        let entry = NewEntry {
            installment_id: row.installment_id,
            emission_date: value_date,
            entry_type,
            principal,
            interest,
            tax,
            total,
        }
        .to_cents();
        remaining -= entry.total;
        entries.push(entry);
    }

    remaining
}

/// offer full prepayment of outstanding principal on not-yet-due
/// installments, pairing each with a bonus entry that forgives the whole
/// remaining interest and tax at zero cash impact
fn prepay_future(
    rows: &[&BalanceRow],
    budget: Money,
    value_date: NaiveDate,
    entries: &mut Vec<NewEntry>,
) -> Money {
    let mut remaining = budget;
    let mut cumulative = Money::ZERO;
    let mut bonuses = Vec::new();

    for row in rows {
        if row.is_settled() || !row.principal.is_positive() {
            continue;
        }
        cumulative += row.principal;
        if cumulative > budget {
            break;
        }
        let cancel = NewEntry {
            installment_id: row.installment_id,
            emission_date: value_date,
            entry_type: EntryType::EarlyCancel,
            principal: row.principal,
            interest: Money::ZERO,
            tax: Money::ZERO,
            total: row.principal,
        }
        .to_cents();
        remaining -= cancel.total;
        entries.push(cancel);

        let forgiven = row.interest + row.tax;
        if forgiven.is_positive() {
            bonuses.push(
                NewEntry {
                    installment_id: row.installment_id,
                    emission_date: value_date,
                    entry_type: EntryType::EarlyCancelBonus,
                    principal: Money::ZERO,
                    interest: row.interest,
                    tax: row.tax,
                    total: forgiven,
                }
                .to_cents(),
            );
        }
    }

    entries.extend(bonuses);
    remaining
}

/// clear sub-tolerance residuals left by cent rounding: any installment
/// whose rederived total lies strictly between zero and the tolerance (in
/// either direction) gets an offsetting rounding entry
pub fn rounding_entries(
    rows: &[BalanceRow],
    drafts: &[NewEntry],
    value_date: NaiveDate,
    settings: &Settings,
) -> Vec<NewEntry> {
    apply_drafts(rows, drafts)
        .into_iter()
        .filter(|r| !r.total.is_zero() && r.total.abs() < settings.collection_tolerance)
        .map(|r| {
            NewEntry {
                installment_id: r.installment_id,
                emission_date: value_date,
                entry_type: EntryType::Rounding,
                principal: r.principal,
                interest: r.interest,
                tax: r.tax,
                total: r.total,
            }
            .to_cents()
        })
        .collect()
}
