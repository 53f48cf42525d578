use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::config::Settings;
use crate::decimal::{gross_split, Money, Rate};
use crate::errors::{Result, ServicingError};

/// one generated installment, before the store assigns ids
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleLine {
    pub number: u32,
    pub due_date: NaiveDate,
    pub principal: Money,
    pub interest: Money,
    pub tax: Money,
    pub total: Money,
}

/// constant periodic payment of the annuity: V = P·r·(1+r)^n / ((1+r)^n − 1)
pub fn annuity_payment(principal: Money, rate: Rate, term: u32) -> Money {
    if term == 0 {
        return principal;
    }

    let r = rate.as_decimal();
    if r.is_zero() {
        return principal / Decimal::from(term);
    }

    let mut compound = Decimal::ONE;
    let base = Decimal::ONE + r;
    for _ in 0..term {
        compound *= base;
    }

    let numerator = principal.as_decimal() * r * compound;
    let denominator = compound - Decimal::ONE;
    Money::from_decimal(numerator / denominator)
}

/// reconcile a caller-supplied installment value against the one computed
/// from rate, term and principal
pub fn validate_installment_value(
    principal: Money,
    rate: Rate,
    term: u32,
    provided: Option<Money>,
    settings: &Settings,
) -> Result<Money> {
    let computed = annuity_payment(principal, rate, term);
    match provided {
        None => Ok(computed),
        Some(value) => {
            if (computed - value).abs() > settings.value_tolerance {
                Err(ServicingError::ValueMismatch {
                    rate: rate.to_string(),
                    term,
                    provided: value,
                    computed,
                })
            } else {
                Ok(value)
            }
        }
    }
}

/// the earliest allowed due date is the settlement month anchored at the
/// configured due day
pub fn settlement_anchor(settlement: NaiveDate, settings: &Settings) -> NaiveDate {
    let day = settings.due_day.min(days_in_month(settlement.year(), settlement.month()));
    NaiveDate::from_ymd_opt(settlement.year(), settlement.month(), day)
        .expect("clamped day is always valid")
}

/// resolve the first due date: default is the settlement anchor advanced by
/// the grace months; an explicit date must not precede the anchor
pub fn resolve_first_due(
    settlement: NaiveDate,
    requested: Option<NaiveDate>,
    settings: &Settings,
) -> Result<NaiveDate> {
    let anchor = settlement_anchor(settlement, settings);
    match requested {
        None => Ok(add_months_anchored(anchor, settings.grace_months)),
        Some(date) if date < anchor => Err(ServicingError::InvalidDate {
            message: format!(
                "first due date {date} precedes the settlement anchor {anchor}"
            ),
        }),
        Some(date) => Ok(date),
    }
}

/// generate the full schedule: per period the gross interest is the rate on
/// the remaining balance, the pre-tax interest is gross / 1.21, the tax is
/// pre-tax * 0.21 and the principal is the payment minus gross interest
pub fn generate(principal: Money, rate: Rate, term: u32, first_due: NaiveDate) -> Vec<ScheduleLine> {
    let payment = annuity_payment(principal, rate, term);
    let mut lines = Vec::with_capacity(term as usize);
    let mut balance = principal;

    for i in 1..=term {
        let gross = balance * rate.as_decimal();
        let (interest, tax) = gross_split(gross);
        let mut principal_portion = payment - gross;
        balance -= principal_portion;

        // fold the annuity residual into the last period so the schedule
        // principal sums exactly to the granted amount
        if i == term {
            principal_portion += balance;
            balance = Money::ZERO;
        }

        lines.push(ScheduleLine {
            number: i,
            due_date: add_months_anchored(first_due, i - 1),
            principal: principal_portion,
            interest,
            tax,
            total: payment,
        });
    }

    lines
}

/// advance a date by whole calendar months, keeping the anchor's
/// day-of-month and clamping at month end
pub fn add_months_anchored(anchor: NaiveDate, months: u32) -> NaiveDate {
    let total = anchor.year() * 12 + anchor.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = anchor.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
