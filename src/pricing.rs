//! Credit pricing table
//!
//! A flat list of rates (credits per unit) keyed by a machine key such as
//! `call.tool.web_fetch`. The list is read and written wholesale through a
//! [`PricingStore`]; editing one rate rewrites the whole list, and a reset
//! writes the built-in defaults back.

use crate::store::{PricingStore, StoreError};
use serde::{Deserialize, Serialize};

/// Machine keys of the built-in rates
pub mod keys {
    pub const CREATE_AGENT: &str = "create.agent";
    pub const CREATE_APP: &str = "create.app";
    pub const CREATE_KB: &str = "create.kb";
    pub const KB_INGEST: &str = "kb.ingest";
    pub const KB_STORAGE: &str = "kb.storage";
    pub const KB_RETRIEVE: &str = "call.kb.retrieve";
    pub const MEMORY_OP: &str = "call.memory.op";
    pub const API_LIGHT: &str = "call.tool.api_light";
    pub const WEB_FETCH: &str = "call.tool.web_fetch";
    pub const DEEP_CRAWL: &str = "call.tool.deep_crawl";
    pub const RAI_RUN: &str = "call.rai_hm.run";
    pub const EVAL_STANDARD: &str = "call.eval.standard";
    pub const AGENT_COMM: &str = "inter-agent.msg";
}

/// Tokens covered by one `inter-agent.msg` price unit
pub const AGENT_COMM_PER_TOKENS: f64 = 1_000_000.0;
/// Tokens covered by one `kb.ingest` price unit
pub const KB_INGEST_PER_TOKENS: f64 = 100_000.0;

/// User-facing rejection for a bad price edit
pub const INVALID_PRICE: &str = "Please enter a valid non-negative number";

/// (category, key, price, unit)
const DEFAULT_RATES: &[(&str, &str, f64, &str)] = &[
    ("Agent Creation", keys::CREATE_AGENT, 0.05, "per agent"),
    ("App Creation", keys::CREATE_APP, 1.0, "one-time"),
    ("Knowledge Base Creation", keys::CREATE_KB, 1.0, "one-time"),
    ("Knowledge Base Ingestion", keys::KB_INGEST, 1.0, "per 100k tokens"),
    ("KB Storage", keys::KB_STORAGE, 0.2, "per GB/month"),
    ("Knowledge Retrieval", keys::KB_RETRIEVE, 0.05, "per lookup"),
    ("Memory Operation", keys::MEMORY_OP, 0.05, "per step"),
    ("API Call (Light)", keys::API_LIGHT, 0.05, "per call"),
    ("Web Fetch", keys::WEB_FETCH, 0.1, "per URL/PDF"),
    ("Deep Crawl", keys::DEEP_CRAWL, 0.25, "per extra page"),
    ("RAI Human Monitor", keys::RAI_RUN, 0.1, "per run"),
    ("Evaluation Suite", keys::EVAL_STANDARD, 1.0, "per 100 tests"),
    ("Inter-Agent Communication", keys::AGENT_COMM, 1.0, "per 1M tokens"),
];

fn default_true() -> bool {
    true
}

/// One row of the pricing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-rs", derive(ts_rs::TS))]
pub struct CreditPricingItem {
    pub category: String,
    pub key: String,
    pub price: f64,
    pub unit: String,
    #[serde(default = "default_true")]
    pub editable: bool,
}

/// The built-in pricing list
pub fn default_pricing() -> Vec<CreditPricingItem> {
    DEFAULT_RATES
        .iter()
        .map(|(category, key, price, unit)| CreditPricingItem {
            category: category.to_string(),
            key: key.to_string(),
            price: *price,
            unit: unit.to_string(),
            editable: true,
        })
        .collect()
}

fn default_rate(key: &str) -> f64 {
    DEFAULT_RATES
        .iter()
        .find(|(_, k, _, _)| *k == key)
        .map(|(_, _, price, _)| *price)
        .unwrap_or(0.0)
}

/// Resolved rates used by the scenario calculator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateCard {
    pub web_fetch: f64,
    pub deep_crawl: f64,
    pub kb_retrieve: f64,
    pub memory_op: f64,
    pub api_light: f64,
    pub rai_run: f64,
    /// Credits per [`AGENT_COMM_PER_TOKENS`] tokens
    pub agent_comm: f64,
    pub create_agent: f64,
    pub create_kb: f64,
    /// Credits per [`KB_INGEST_PER_TOKENS`] tokens
    pub kb_ingest: f64,
    pub kb_storage_gb_month: f64,
}

impl RateCard {
    /// Build from a pricing list. Keys missing from the list use the built-in rate.
    pub fn from_items(items: &[CreditPricingItem]) -> Self {
        let rate = |key: &str| {
            items
                .iter()
                .find(|item| item.key == key)
                .map(|item| item.price)
                .unwrap_or_else(|| default_rate(key))
        };

        Self {
            web_fetch: rate(keys::WEB_FETCH),
            deep_crawl: rate(keys::DEEP_CRAWL),
            kb_retrieve: rate(keys::KB_RETRIEVE),
            memory_op: rate(keys::MEMORY_OP),
            api_light: rate(keys::API_LIGHT),
            rai_run: rate(keys::RAI_RUN),
            agent_comm: rate(keys::AGENT_COMM),
            create_agent: rate(keys::CREATE_AGENT),
            create_kb: rate(keys::CREATE_KB),
            kb_ingest: rate(keys::KB_INGEST),
            kb_storage_gb_month: rate(keys::KB_STORAGE),
        }
    }

    /// Credits per single inter-agent token
    pub fn agent_comm_per_token(&self) -> f64 {
        self.agent_comm / AGENT_COMM_PER_TOKENS
    }
}

impl Default for RateCard {
    fn default() -> Self {
        Self::from_items(&default_pricing())
    }
}

/// Error type for pricing operations
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// User-facing rejection of an edit
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PricingError>;

/// Pricing table service over a store
pub struct PricingTable<S> {
    store: S,
}

impl<S: PricingStore> PricingTable<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current list. Falls back to the defaults when nothing is stored or the
    /// stored list can't be decoded.
    pub fn all_rates(&self) -> Result<Vec<CreditPricingItem>> {
        let Some(json) = self.store.load_pricing_json()? else {
            return Ok(default_pricing());
        };
        match serde_json::from_str::<Vec<CreditPricingItem>>(&json) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(error = %e, "stored pricing is unreadable, using defaults");
                Ok(default_pricing())
            }
        }
    }

    pub fn get_rate(&self, key: &str) -> Result<Option<f64>> {
        Ok(self
            .all_rates()?
            .into_iter()
            .find(|item| item.key == key)
            .map(|item| item.price))
    }

    /// Change one rate. The whole list is written back.
    pub fn set_rate(&self, key: &str, price: f64) -> Result<CreditPricingItem> {
        if !price.is_finite() || price < 0.0 {
            return Err(PricingError::Rejected(INVALID_PRICE.to_string()));
        }

        let mut items = self.all_rates()?;
        let item = items
            .iter_mut()
            .find(|item| item.key == key)
            .ok_or_else(|| PricingError::Rejected(format!("Unknown pricing key '{}'", key)))?;
        if !item.editable {
            return Err(PricingError::Rejected(format!(
                "Pricing for '{}' is not editable",
                item.category
            )));
        }

        let previous = item.price;
        item.price = price;
        let updated = item.clone();

        self.save(&items)?;
        tracing::info!(key, previous, price, "credit rate updated");
        Ok(updated)
    }

    /// Parse form input and apply it with [`set_rate`](Self::set_rate)
    pub fn set_rate_str(&self, key: &str, input: &str) -> Result<CreditPricingItem> {
        let price = input
            .trim()
            .parse::<f64>()
            .map_err(|_| PricingError::Rejected(INVALID_PRICE.to_string()))?;
        self.set_rate(key, price)
    }

    /// Write the built-in list back
    pub fn reset_to_defaults(&self) -> Result<Vec<CreditPricingItem>> {
        let defaults = default_pricing();
        self.save(&defaults)?;
        tracing::info!("credit pricing reset to defaults");
        Ok(defaults)
    }

    pub fn rate_card(&self) -> Result<RateCard> {
        Ok(RateCard::from_items(&self.all_rates()?))
    }

    fn save(&self, items: &[CreditPricingItem]) -> Result<()> {
        let json = serde_json::to_string(items).map_err(StoreError::from)?;
        self.store.save_pricing_json(&json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_defaults_when_empty() {
        let table = PricingTable::new(MemoryStore::new());
        let rates = table.all_rates().unwrap();
        assert_eq!(rates.len(), DEFAULT_RATES.len());
        assert_eq!(table.get_rate(keys::WEB_FETCH).unwrap(), Some(0.1));
        assert_eq!(table.get_rate("nope").unwrap(), None);
    }

    #[test]
    fn test_set_rate_only_touches_one_entry() {
        let table = PricingTable::new(MemoryStore::new());
        table.set_rate(keys::WEB_FETCH, 0.2).unwrap();

        let rates = table.all_rates().unwrap();
        for item in &rates {
            if item.key == keys::WEB_FETCH {
                assert_eq!(item.price, 0.2);
            } else {
                assert_eq!(item.price, default_rate(&item.key), "{} changed", item.key);
            }
        }
    }

    #[test]
    fn test_rejects_bad_prices() {
        let table = PricingTable::new(MemoryStore::new());
        for bad in [-0.01, f64::NAN, f64::INFINITY] {
            match table.set_rate(keys::WEB_FETCH, bad) {
                Err(PricingError::Rejected(msg)) => assert_eq!(msg, INVALID_PRICE),
                other => panic!("expected rejection, got {:?}", other),
            }
        }
        assert!(matches!(
            table.set_rate_str(keys::WEB_FETCH, "abc"),
            Err(PricingError::Rejected(_))
        ));
        // Nothing was written
        assert!(table.store.load_pricing_json().unwrap().is_none());
    }

    #[test]
    fn test_zero_is_allowed() {
        let table = PricingTable::new(MemoryStore::new());
        let item = table.set_rate_str(keys::API_LIGHT, " 0 ").unwrap();
        assert_eq!(item.price, 0.0);
    }

    #[test]
    fn test_unknown_and_locked_keys() {
        let store = MemoryStore::new();
        let mut items = default_pricing();
        items[0].editable = false;
        store
            .save_pricing_json(&serde_json::to_string(&items).unwrap())
            .unwrap();

        let table = PricingTable::new(&store);
        assert!(matches!(
            table.set_rate("does.not.exist", 1.0),
            Err(PricingError::Rejected(_))
        ));
        assert!(matches!(
            table.set_rate(keys::CREATE_AGENT, 1.0),
            Err(PricingError::Rejected(_))
        ));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let table = PricingTable::new(MemoryStore::new());
        table.set_rate(keys::DEEP_CRAWL, 9.0).unwrap();
        table.reset_to_defaults().unwrap();
        assert_eq!(table.all_rates().unwrap(), default_pricing());
    }

    #[test]
    fn test_unreadable_store_falls_back() {
        let store = MemoryStore::new();
        store.save_pricing_json("{not json").unwrap();
        let table = PricingTable::new(&store);
        assert_eq!(table.all_rates().unwrap(), default_pricing());
    }

    #[test]
    fn test_rate_card_uses_table_and_fills_gaps() {
        let items = vec![CreditPricingItem {
            category: "Web Fetch".to_string(),
            key: keys::WEB_FETCH.to_string(),
            price: 0.5,
            unit: "per URL/PDF".to_string(),
            editable: true,
        }];
        let card = RateCard::from_items(&items);
        assert_eq!(card.web_fetch, 0.5);
        assert_eq!(card.deep_crawl, 0.25);
        assert_eq!(card.kb_retrieve, 0.05);
        assert!((card.agent_comm_per_token() - 0.000001).abs() < 1e-15);
    }
}
