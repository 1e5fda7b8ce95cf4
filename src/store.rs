//! Storage seams for the intake engine
//!
//! Scoring never touches storage. The pricing table and the deal pipeline
//! talk to these traits instead, so the same code runs against the SQLite
//! database in production and `MemoryStore` in tests.

use crate::deal::{DealStage, DealSubmission};
use std::cell::RefCell;
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed key the pricing list is stored under
pub const PRICING_KEY: &str = "custom_credit_pricing";

/// Error type for storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Backend(String),
    #[error("Stored record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Wholesale key-value storage for the pricing list
pub trait PricingStore {
    /// Raw JSON stored under [`PRICING_KEY`], `None` if never written
    fn load_pricing_json(&self) -> Result<Option<String>>;

    /// Replace the stored JSON (last write wins)
    fn save_pricing_json(&self, json: &str) -> Result<()>;
}

/// Deal submission repository
pub trait DealStore {
    /// Persist a new submission. Id and timestamps are always assigned here;
    /// whatever the caller put in them is discarded.
    fn save_deal(&self, deal: DealSubmission) -> Result<DealSubmission>;

    /// All submissions, oldest first
    fn all_deals(&self) -> Result<Vec<DealSubmission>>;

    fn deal_by_id(&self, id: &str) -> Result<Option<DealSubmission>>;

    /// Submissions at one pipeline stage, oldest first
    fn deals_in_stage(&self, stage: DealStage) -> Result<Vec<DealSubmission>> {
        Ok(self
            .all_deals()?
            .into_iter()
            .filter(|d| d.deal_stage.as_ref() == Some(&stage))
            .collect())
    }

    /// Replace a submission's contents. Keeps id and `created_at`, bumps `updated_at`.
    /// Returns `None` when no submission has that id.
    fn update_deal(&self, id: &str, deal: DealSubmission) -> Result<Option<DealSubmission>>;

    /// Returns whether anything was deleted
    fn delete_deal(&self, id: &str) -> Result<bool>;
}

impl<T: PricingStore + ?Sized> PricingStore for &T {
    fn load_pricing_json(&self) -> Result<Option<String>> {
        (**self).load_pricing_json()
    }

    fn save_pricing_json(&self, json: &str) -> Result<()> {
        (**self).save_pricing_json(json)
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Stamp a submission for first save with a fresh id and timestamps
pub fn prepare_new(mut deal: DealSubmission) -> DealSubmission {
    let now = now_rfc3339();
    deal.id = Some(format!("deal_{}", Uuid::new_v4().simple()));
    deal.created_at = Some(now.clone());
    deal.updated_at = Some(now);
    deal
}

/// Carry identity over from `existing` onto the replacement record
pub fn prepare_update(existing: &DealSubmission, mut deal: DealSubmission) -> DealSubmission {
    deal.id = existing.id.clone();
    deal.created_at = existing.created_at.clone();
    deal.updated_at = Some(now_rfc3339());
    deal
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
    deals: RefCell<Vec<DealSubmission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PricingStore for MemoryStore {
    fn load_pricing_json(&self) -> Result<Option<String>> {
        Ok(self.values.borrow().get(PRICING_KEY).cloned())
    }

    fn save_pricing_json(&self, json: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(PRICING_KEY.to_string(), json.to_string());
        Ok(())
    }
}

impl DealStore for MemoryStore {
    fn save_deal(&self, deal: DealSubmission) -> Result<DealSubmission> {
        let deal = prepare_new(deal);
        self.deals.borrow_mut().push(deal.clone());
        Ok(deal)
    }

    fn all_deals(&self) -> Result<Vec<DealSubmission>> {
        Ok(self.deals.borrow().clone())
    }

    fn deal_by_id(&self, id: &str) -> Result<Option<DealSubmission>> {
        Ok(self
            .deals
            .borrow()
            .iter()
            .find(|d| d.id.as_deref() == Some(id))
            .cloned())
    }

    fn update_deal(&self, id: &str, deal: DealSubmission) -> Result<Option<DealSubmission>> {
        let mut deals = self.deals.borrow_mut();
        match deals.iter_mut().find(|d| d.id.as_deref() == Some(id)) {
            Some(slot) => {
                let updated = prepare_update(slot, deal);
                *slot = updated.clone();
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }

    fn delete_deal(&self, id: &str) -> Result<bool> {
        let mut deals = self.deals.borrow_mut();
        let before = deals.len();
        deals.retain(|d| d.id.as_deref() != Some(id));
        Ok(deals.len() != before)
    }
}
