use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use crate::balance::{balance_rows, BalanceRow};
use crate::config::Settings;
use crate::decimal::{Money, Rate};
use crate::errors::{Result, ServicingError};
use crate::reversal;
use crate::schedule;
use crate::store::{RunBatch, ServicingStore};
use crate::types::{
    Credit, CreditId, CustomerId, EntryType, Installment, IssuerId, LotId, NewEntry, Selector,
};
use crate::waterfall::{self, CollectionPolicy};

/// parameters for originating one credit
#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub customer_id: CustomerId,
    pub external_id: Option<u64>,
    pub issuer_id: Option<IssuerId>,
    pub settlement_date: NaiveDate,
    pub principal_requested: Money,
    pub principal_granted: Money,
    pub term: u32,
    /// periodic rate, tax-inclusive
    pub rate: Rate,
    /// caller-supplied installment value, reconciled against the computed one
    pub installment_value: Option<Money>,
    /// explicit first due date; defaults to the settlement anchor plus grace
    pub first_due_date: Option<NaiveDate>,
    pub purchase_lot: Option<LotId>,
    pub sale_lot: Option<LotId>,
}

/// debt synthesized for an overpayment, owed back to the paying customer
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyDebt {
    pub credit: Credit,
    pub installment: Installment,
}

/// the rows one collection or reversal run wants appended
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub entries: Vec<NewEntry>,
    pub penalty: Option<PenaltyDebt>,
}

impl RunOutcome {
    fn empty() -> Self {
        RunOutcome {
            run_id: Uuid::new_v4(),
            entries: Vec::new(),
            penalty: None,
        }
    }

    /// cash moved by this run: every entry except the zero-cash forgiveness
    /// bonuses
    pub fn total_collected(&self) -> Money {
        self.entries
            .iter()
            .filter(|e| e.entry_type != EntryType::EarlyCancelBonus)
            .map(|e| e.total)
            .fold(Money::ZERO, |acc, x| acc + x)
    }
}

/// the servicing engine: schedule generation, collection waterfalls and
/// reversals over an explicit persistence context
pub struct ServicingEngine<S: ServicingStore> {
    store: S,
    settings: Settings,
    time: SafeTimeProvider,
}

impl<S: ServicingStore> ServicingEngine<S> {
    pub fn new(store: S, settings: Settings, time: SafeTimeProvider) -> Self {
        ServicingEngine {
            store,
            settings,
            time,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn value_date(&self, date: Option<NaiveDate>) -> NaiveDate {
        date.unwrap_or_else(|| self.time.now().date_naive())
    }

    /// originate a credit: validate the terms, generate the schedule and
    /// persist both in one batch
    pub fn new_credit(&mut self, request: CreditRequest) -> Result<(Credit, Vec<Installment>)> {
        let installment_value = schedule::validate_installment_value(
            request.principal_granted,
            request.rate,
            request.term,
            request.installment_value,
            &self.settings,
        )?;
        let first_due = schedule::resolve_first_due(
            request.settlement_date,
            request.first_due_date,
            &self.settings,
        )?;

        let credit_id = self.store.allocate_credit_id();
        let credit = Credit {
            id: credit_id,
            external_id: request.external_id,
            customer_id: request.customer_id,
            issuer_id: request.issuer_id,
            settlement_date: request.settlement_date,
            principal_requested: request.principal_requested,
            principal_granted: request.principal_granted,
            term: request.term,
            rate: request.rate,
            installment_value,
            first_due_date: first_due,
            purchase_lot: request.purchase_lot,
            sale_lot: request.sale_lot,
        };

        let installments: Vec<Installment> =
            schedule::generate(request.principal_granted, request.rate, request.term, first_due)
                .into_iter()
                .map(|line| Installment {
                    id: self.store.allocate_installment_id(),
                    credit_id,
                    number: line.number,
                    due_date: line.due_date,
                    principal: line.principal,
                    interest: line.interest,
                    tax: line.tax,
                    total: line.total,
                    owner: self.settings.default_owner,
                })
                .collect();

        self.store.insert_credit(credit.clone(), installments.clone())?;
        log::info!(
            "originated credit {} with {} installments of {}",
            credit.id,
            credit.term,
            credit.installment_value
        );
        Ok((credit, installments))
    }

    /// derive the outstanding balance per installment for the given credits,
    /// or for the whole book when none are given
    pub fn get_balance(&self, credit_ids: Option<&[CreditId]>) -> Vec<BalanceRow> {
        let ids: Vec<CreditId> = match credit_ids {
            Some(ids) => ids.to_vec(),
            None => self.store.all_credit_ids(),
        };
        self.balance_for(&ids)
    }

    fn balance_for(&self, ids: &[CreditId]) -> Vec<BalanceRow> {
        let installments = self.store.installments_for(ids);
        let installment_ids: Vec<_> = installments.iter().map(|i| i.id).collect();
        let entries = self.store.entries_for(&installment_ids);
        balance_rows(&installments, &entries)
    }

    /// apply a payment through the standard waterfall
    pub fn charge_debt(
        &mut self,
        selector: Selector,
        amount: Money,
        issuer: Option<IssuerId>,
        date: Option<NaiveDate>,
        save: bool,
    ) -> Result<RunOutcome> {
        self.charge(selector, amount, issuer, date, CollectionPolicy::Standard, save)
    }

    /// apply a payment, prepaying not-yet-due principal with interest and
    /// tax forgiven in full
    pub fn charge_debt_with_early_cancel(
        &mut self,
        selector: Selector,
        amount: Money,
        issuer: Option<IssuerId>,
        date: Option<NaiveDate>,
        save: bool,
    ) -> Result<RunOutcome> {
        self.charge(selector, amount, issuer, date, CollectionPolicy::EarlyCancel, save)
    }

    fn charge(
        &mut self,
        selector: Selector,
        amount: Money,
        issuer: Option<IssuerId>,
        date: Option<NaiveDate>,
        policy: CollectionPolicy,
        save: bool,
    ) -> Result<RunOutcome> {
        if !amount.is_positive() {
            return Ok(RunOutcome::empty());
        }

        let value_date = self.value_date(date);
        let credit_ids = self.resolve_selector(selector, issuer)?;
        let credit_ids = self.filter_recourse_excluded(credit_ids, selector)?;
        let rows = self.balance_for(&credit_ids);

        let plan = waterfall::allocate(&rows, amount, value_date, policy, &self.settings);
        let mut entries = plan.entries;
        let mut penalty = None;

        if plan.excess.is_positive() {
            if let Some(&first) = credit_ids.first() {
                let customer_id = self
                    .store
                    .credit(first)
                    .ok_or(ServicingError::UnknownCredit { id: first })?
                    .customer_id;
                let (debt, entry) = self.synthesize_penalty(customer_id, plan.excess, value_date);
                entries.push(entry);
                penalty = Some(debt);
            }
        }

        entries.extend(waterfall::rounding_entries(
            &rows,
            &entries,
            value_date,
            &self.settings,
        ));

        let outcome = RunOutcome {
            run_id: Uuid::new_v4(),
            entries,
            penalty,
        };
        log::info!(
            "charge of {} against {} resolved into {} entries (run {})",
            amount,
            selector,
            outcome.entries.len(),
            outcome.run_id
        );

        if save {
            self.persist(&outcome)?;
        }
        Ok(outcome)
    }

    /// undo previously recorded collection, most recently due first
    pub fn reverse_collection(
        &mut self,
        selector: Selector,
        amount: Money,
        issuer: Option<IssuerId>,
        date: Option<NaiveDate>,
        save: bool,
    ) -> Result<RunOutcome> {
        let value_date = self.value_date(date);
        // reversal reaches recourse-excluded credits too
        let credit_ids = self.resolve_selector(selector, issuer)?;
        let rows = self.balance_for(&credit_ids);

        let entries = reversal::reverse(&rows, amount, value_date, &self.settings)?;
        let outcome = RunOutcome {
            run_id: Uuid::new_v4(),
            entries,
            penalty: None,
        };
        log::info!(
            "reversal of {} against {} produced {} entries (run {})",
            amount,
            selector,
            outcome.entries.len(),
            outcome.run_id
        );

        if save {
            self.persist(&outcome)?;
        }
        Ok(outcome)
    }

    /// resolve a selector into a concrete, non-empty set of credit ids
    fn resolve_selector(&self, selector: Selector, issuer: Option<IssuerId>) -> Result<Vec<CreditId>> {
        let ids = match selector {
            Selector::ByCustomer(customer) => {
                let mut ids = self.store.credits_for_customer(customer);
                if let Some(issuer) = issuer {
                    ids.retain(|id| {
                        self.store
                            .credit(*id)
                            .map(|c| c.issuer_id == Some(issuer))
                            .unwrap_or(false)
                    });
                }
                ids
            }
            Selector::ByOperation(id) => {
                self.store.credit(id).map(|c| vec![c.id]).unwrap_or_default()
            }
            Selector::ByExternalId(external) => self
                .store
                .credit_by_external(external)
                .map(|id| vec![id])
                .unwrap_or_default(),
        };
        if ids.is_empty() {
            return Err(ServicingError::IdentifierError { selector });
        }
        Ok(ids)
    }

    /// drop credits sold with recourse excluded; failing only when the
    /// exclusion empties an originally non-empty set
    fn filter_recourse_excluded(
        &self,
        credit_ids: Vec<CreditId>,
        selector: Selector,
    ) -> Result<Vec<CreditId>> {
        let originally = credit_ids.len();
        let kept: Vec<CreditId> = credit_ids
            .into_iter()
            .filter(|id| {
                let excluded = self
                    .store
                    .credit(*id)
                    .and_then(|c| c.purchase_lot)
                    .and_then(|lot| self.store.purchase_lot(lot))
                    .map(|lot| lot.recourse_excluded)
                    .unwrap_or(false);
                !excluded
            })
            .collect();
        if kept.is_empty() && originally > 0 {
            return Err(ServicingError::ResourceError { selector });
        }
        Ok(kept)
    }

    /// book an overpayment excess as a zero-rate single-installment credit
    /// owed back to the paying customer
    fn synthesize_penalty(
        &mut self,
        customer_id: CustomerId,
        excess: Money,
        value_date: NaiveDate,
    ) -> (PenaltyDebt, NewEntry) {
        let amounts = waterfall::penalty_amounts(excess);
        let credit_id = self.store.allocate_credit_id();
        let installment_id = self.store.allocate_installment_id();

        let credit = Credit {
            id: credit_id,
            external_id: None,
            customer_id,
            issuer_id: None,
            settlement_date: value_date,
            principal_requested: Money::ZERO,
            principal_granted: Money::ZERO,
            term: 1,
            rate: Rate::ZERO,
            installment_value: amounts.total,
            first_due_date: value_date,
            purchase_lot: None,
            sale_lot: None,
        };
        let installment = Installment {
            id: installment_id,
            credit_id,
            number: 1,
            due_date: value_date,
            principal: Money::ZERO,
            interest: amounts.interest,
            tax: amounts.tax,
            total: amounts.total,
            owner: self.settings.default_owner,
        };
        let entry = NewEntry {
            installment_id,
            emission_date: value_date,
            entry_type: EntryType::Penalty,
            principal: Money::ZERO,
            interest: amounts.interest,
            tax: amounts.tax,
            total: amounts.total,
        };

        log::debug!(
            "synthesized penalty credit {} of {} for customer {}",
            credit_id,
            amounts.total,
            customer_id
        );
        (PenaltyDebt { credit, installment }, entry)
    }

    fn persist(&mut self, outcome: &RunOutcome) -> Result<()> {
        let (penalty_credit, penalty_installments) = match &outcome.penalty {
            Some(debt) => (Some(debt.credit.clone()), vec![debt.installment.clone()]),
            None => (None, Vec::new()),
        };
        self.store.append_run(RunBatch {
            run_id: outcome.run_id,
            penalty_credit,
            penalty_installments,
            entries: outcome.entries.clone(),
        })?;
        Ok(())
    }
}
