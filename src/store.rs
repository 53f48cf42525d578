use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, ServicingError};
use crate::types::{
    CollectionEntry, Credit, CreditId, CustomerId, EntryId, Installment, InstallmentId, LotId,
    NewEntry, PurchaseLot,
};

/// everything one waterfall or reversal run wants persisted; applied
/// atomically or not at all
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunBatch {
    pub run_id: Uuid,
    pub penalty_credit: Option<Credit>,
    pub penalty_installments: Vec<Installment>,
    pub entries: Vec<NewEntry>,
}

impl RunBatch {
    pub fn entries_only(run_id: Uuid, entries: Vec<NewEntry>) -> Self {
        RunBatch {
            run_id,
            penalty_credit: None,
            penalty_installments: Vec::new(),
            entries,
        }
    }
}

/// persistence context for the engine; the relational schema and connection
/// setup behind an implementation are provided externally
pub trait ServicingStore {
    fn credit(&self, id: CreditId) -> Option<Credit>;
    fn all_credit_ids(&self) -> Vec<CreditId>;
    fn credits_for_customer(&self, customer: CustomerId) -> Vec<CreditId>;
    fn credit_by_external(&self, external_id: u64) -> Option<CreditId>;
    fn installments_for(&self, credits: &[CreditId]) -> Vec<Installment>;
    /// all ledger entries referencing the given installment set
    fn entries_for(&self, installments: &[InstallmentId]) -> Vec<CollectionEntry>;
    fn purchase_lot(&self, id: LotId) -> Option<PurchaseLot>;

    /// explicit id sequences owned by the store; allocation reserves the id
    fn allocate_credit_id(&mut self) -> CreditId;
    fn allocate_installment_id(&mut self) -> InstallmentId;

    /// persist a newly originated credit with its generated schedule
    fn insert_credit(&mut self, credit: Credit, schedule: Vec<Installment>) -> Result<()>;
    /// append one run's rows; never updates existing rows in place
    fn append_run(&mut self, batch: RunBatch) -> Result<Vec<CollectionEntry>>;
}

/// in-memory store with JSON snapshot support; the reference implementation
/// of the persistence contract
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    credits: Vec<Credit>,
    installments: Vec<Installment>,
    entries: Vec<CollectionEntry>,
    lots: Vec<PurchaseLot>,
    next_credit_id: u64,
    next_installment_id: u64,
    next_entry_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            next_credit_id: 1,
            next_installment_id: 1,
            next_entry_id: 1,
            ..MemoryStore::default()
        }
    }

    pub fn insert_lot(&mut self, lot: PurchaseLot) {
        self.lots.push(lot);
    }

    pub fn credits(&self) -> &[Credit] {
        &self.credits
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn entries(&self) -> &[CollectionEntry] {
        &self.entries
    }

    /// serialize the full store state
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// restore a store from a snapshot
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn installment_known(&self, id: InstallmentId, batch: &RunBatch) -> bool {
        self.installments.iter().any(|i| i.id == id)
            || batch.penalty_installments.iter().any(|i| i.id == id)
    }
}

impl ServicingStore for MemoryStore {
    fn credit(&self, id: CreditId) -> Option<Credit> {
        self.credits.iter().find(|c| c.id == id).cloned()
    }

    fn all_credit_ids(&self) -> Vec<CreditId> {
        self.credits.iter().map(|c| c.id).collect()
    }

    fn credits_for_customer(&self, customer: CustomerId) -> Vec<CreditId> {
        self.credits
            .iter()
            .filter(|c| c.customer_id == customer)
            .map(|c| c.id)
            .collect()
    }

    fn credit_by_external(&self, external_id: u64) -> Option<CreditId> {
        self.credits
            .iter()
            .find(|c| c.external_id == Some(external_id))
            .map(|c| c.id)
    }

    fn installments_for(&self, credits: &[CreditId]) -> Vec<Installment> {
        self.installments
            .iter()
            .filter(|i| credits.contains(&i.credit_id))
            .cloned()
            .collect()
    }

    fn entries_for(&self, installments: &[InstallmentId]) -> Vec<CollectionEntry> {
        self.entries
            .iter()
            .filter(|e| installments.contains(&e.installment_id))
            .cloned()
            .collect()
    }

    fn purchase_lot(&self, id: LotId) -> Option<PurchaseLot> {
        self.lots.iter().find(|l| l.id == id).cloned()
    }

    fn allocate_credit_id(&mut self) -> CreditId {
        let id = CreditId(self.next_credit_id);
        self.next_credit_id += 1;
        id
    }

    fn allocate_installment_id(&mut self) -> InstallmentId {
        let id = InstallmentId(self.next_installment_id);
        self.next_installment_id += 1;
        id
    }

    fn insert_credit(&mut self, credit: Credit, schedule: Vec<Installment>) -> Result<()> {
        self.credits.push(credit);
        self.installments.extend(schedule);
        Ok(())
    }

    fn append_run(&mut self, batch: RunBatch) -> Result<Vec<CollectionEntry>> {
        // validate every reference before touching state so a bad batch
        // leaves the store untouched
        for entry in &batch.entries {
            if !self.installment_known(entry.installment_id, &batch) {
                return Err(ServicingError::Storage {
                    run_id: batch.run_id,
                    message: format!(
                        "entry references unknown installment {}",
                        entry.installment_id
                    ),
                });
            }
        }

        if let Some(credit) = batch.penalty_credit {
            self.credits.push(credit);
        }
        self.installments.extend(batch.penalty_installments.clone());

        let mut appended = Vec::with_capacity(batch.entries.len());
        for entry in batch.entries {
            let id = EntryId(self.next_entry_id);
            self.next_entry_id += 1;
            let row = CollectionEntry {
                id,
                installment_id: entry.installment_id,
                run_id: batch.run_id,
                emission_date: entry.emission_date,
                entry_type: entry.entry_type,
                principal: entry.principal,
                interest: entry.interest,
                tax: entry.tax,
                total: entry.total,
            };
            self.entries.push(row.clone());
            appended.push(row);
        }
        Ok(appended)
    }
}
