use chrono::NaiveDate;

use crate::balance::BalanceRow;
use crate::config::Settings;
use crate::decimal::{tax_factor, tax_rate, Money};
use crate::errors::{Result, ServicingError};
use crate::types::{EntryType, NewEntry};

/// walk settled installments most-recently-due first and emit negative
/// entries that undo prior collection, until the reversal budget runs out;
/// operates purely off the balance view, so it must be exact
pub fn reverse(
    rows: &[BalanceRow],
    amount: Money,
    value_date: NaiveDate,
    settings: &Settings,
) -> Result<Vec<NewEntry>> {
    let tolerance = settings.collection_tolerance;
    let mut budget = amount;
    let mut entries = Vec::new();

    // rows arrive in canonical ascending order; reversal consumes them in
    // descending order
    for row in rows.iter().rev() {
        let balance = row.total;
        let scheduled = row.scheduled_total;
        let gap = scheduled - balance;

        if balance == scheduled {
            // nothing was ever collected here
            continue;
        }

        if balance.is_positive() && balance < scheduled && budget >= gap {
            // undo the whole collected gap
            entries.push(negated_entry(
                row,
                value_date,
                row.scheduled_principal - row.principal,
                row.scheduled_interest - row.interest,
                row.scheduled_tax - row.tax,
            ));
            budget -= gap;
        } else if balance.is_zero() && budget - scheduled >= -tolerance {
            // fully collected and the budget covers the whole installment
            entries.push(negated_entry(
                row,
                value_date,
                row.scheduled_principal,
                row.scheduled_interest,
                row.scheduled_tax,
            ));
            budget -= scheduled;
        } else if budget.abs() < tolerance {
            break;
        } else if !balance.is_negative() && balance <= scheduled && budget < gap {
            // budget smaller than the gap: principal first, then pre-tax
            // interest, then its tax, each capped by what is left
            let principal_gap = row.scheduled_principal - row.principal;
            let principal = budget.min(principal_gap);
            budget -= principal;

            let interest_gap = row.scheduled_interest - row.interest;
            let interest = if budget >= interest_gap {
                interest_gap
            } else {
                budget / tax_factor()
            };
            budget -= interest;

            let tax_gap = row.scheduled_tax - row.tax;
            let tax = if budget >= tax_gap {
                tax_gap
            } else {
                interest * tax_rate()
            };

            entries.push(negated_entry(row, value_date, principal, interest, tax));
            budget = Money::ZERO;
        } else {
            return Err(ServicingError::InconsistentState {
                installment_id: row.installment_id,
                budget,
                balance,
                scheduled,
            });
        }
    }

    log::debug!(
        "reversal of {} produced {} entries, unspent budget {}",
        amount,
        entries.len(),
        budget
    );
    Ok(entries)
}

fn negated_entry(
    row: &BalanceRow,
    value_date: NaiveDate,
    principal: Money,
    interest: Money,
    tax: Money,
) -> NewEntry {
    NewEntry {
        installment_id: row.installment_id,
        emission_date: value_date,
        entry_type: EntryType::Reversal,
        principal: -principal,
        interest: -interest,
        tax: -tax,
        total: -(principal + interest + tax),
    }
    .to_cents()
}
