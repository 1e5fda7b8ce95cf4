//! Dealscope - opportunity scoring and credit forecasting for automation deal intake
//!
//! Score a deal, size the agent roster, project credits and timelines.
//!
//! # Overview
//!
//! A sales team submits a [`DealSubmission`] describing a prospective
//! automation project. Dealscope turns it into:
//!
//! | Output | Module |
//! |--------|--------|
//! | Opportunity and complexity scores, agent roster, tools, risks | [`analysis`] |
//! | Phase-based credit forecast, delivery timeline, responsible-AI controls | [`forecast`] |
//! | Per-unit and monthly credit estimates for a usage scenario | [`scenario`] |
//! | Editable credit rate table | [`pricing`] |
//!
//! Scoring is pure. Storage sits behind the traits in [`store`], backed by
//! SQLite in [`db`] and served over HTTP by [`serve`].
//!
//! # Quick Start
//!
//! ```no_run
//! use dealscope::{DealReport, DealSubmission};
//!
//! let deal = DealSubmission {
//!     requestor_name: "Ada".to_string(),
//!     company: Some("Acme".to_string()),
//!     ..Default::default()
//! };
//!
//! let report = DealReport::build_now(&deal);
//! println!(
//!     "score {} / {} agents / {} weeks",
//!     report.analysis.opportunity_score,
//!     report.analysis.estimated_agents,
//!     report.timeline.total_weeks
//! );
//! ```

pub mod analysis;
pub mod config;
pub mod db;
pub mod deal;
pub mod forecast;
pub mod pricing;
pub mod report;
pub mod scenario;
pub mod schema;
pub mod serve;
pub mod store;

pub use analysis::{generate_opportunity_analysis, ComplexityLevel, EffortLevel, OpportunityAnalysis};
pub use config::Config;
pub use db::Database;
pub use deal::{DealStage, DealSubmission, TagSet, ValidationErrors};
pub use forecast::{calculate_credits, calculate_timeline, responsible_ai_features};
pub use pricing::{default_pricing, CreditPricingItem, PricingTable, RateCard};
pub use report::DealReport;
pub use scenario::{estimate_credits, ScenarioEstimate, ScenarioRequest};
pub use store::{DealStore, MemoryStore, PricingStore};

// Re-export TS trait for type generation
#[cfg(feature = "ts-rs")]
pub use ts_rs::TS;
