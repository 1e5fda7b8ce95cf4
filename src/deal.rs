//! Deal submission records
//!
//! A `DealSubmission` is what the intake form (or an admin, or the chat flow)
//! hands to the scoring engine. Only five fields are required; everything else
//! is optional and simply contributes nothing to scoring when absent.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex");
}

/// Delivery path the customer would like to start with.
///
/// Free text from the chat flow that matches no known path is kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PreferredPath {
    RapidPrototype,
    PaidPilot,
    Other(String),
}

impl PreferredPath {
    pub fn as_str(&self) -> &str {
        match self {
            PreferredPath::RapidPrototype => "Rapid Prototype (1 week)",
            PreferredPath::PaidPilot => "Paid Pilot (3 months)",
            PreferredPath::Other(text) => text,
        }
    }
}

impl From<String> for PreferredPath {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Rapid Prototype (1 week)" => PreferredPath::RapidPrototype,
            "Paid Pilot (3 months)" => PreferredPath::PaidPilot,
            _ => PreferredPath::Other(label),
        }
    }
}

impl From<PreferredPath> for String {
    fn from(path: PreferredPath) -> Self {
        match path {
            PreferredPath::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

/// Budget band of the opportunity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BudgetBand {
    Under500k,
    Under1M,
    Over1M,
    Other(String),
}

impl BudgetBand {
    pub fn as_str(&self) -> &str {
        match self {
            BudgetBand::Under500k => "$250k–$500k",
            BudgetBand::Under1M => "$500k–$1M",
            BudgetBand::Over1M => ">$1M",
            BudgetBand::Other(text) => text,
        }
    }
}

impl From<String> for BudgetBand {
    fn from(label: String) -> Self {
        match label.as_str() {
            "$250k–$500k" => BudgetBand::Under500k,
            "$500k–$1M" => BudgetBand::Under1M,
            ">$1M" => BudgetBand::Over1M,
            _ => BudgetBand::Other(label),
        }
    }
}

impl From<BudgetBand> for String {
    fn from(band: BudgetBand) -> Self {
        match band {
            BudgetBand::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

/// Pipeline stage of the deal.
///
/// Stored labels must match exactly; anything else is kept as `Other` and
/// counts as no known stage. [`FromStr`] is the lenient parser for filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DealStage {
    IntroDiscovery,
    Prototype,
    Rfp,
    Shortlist,
    Negotiation,
    ClosedWon,
    ClosedLost,
    Other(String),
}

impl DealStage {
    pub const ALL: [DealStage; 7] = [
        DealStage::IntroDiscovery,
        DealStage::Prototype,
        DealStage::Rfp,
        DealStage::Shortlist,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            DealStage::IntroDiscovery => "Intro/Discovery",
            DealStage::Prototype => "Prototype",
            DealStage::Rfp => "RFP",
            DealStage::Shortlist => "Shortlist",
            DealStage::Negotiation => "Negotiation",
            DealStage::ClosedWon => "Closed-Won",
            DealStage::ClosedLost => "Closed-Lost",
            DealStage::Other(text) => text,
        }
    }

    /// RFP and Shortlist are the late, competitive stages
    pub fn is_competitive(&self) -> bool {
        matches!(self, DealStage::Rfp | DealStage::Shortlist)
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DealStage {
    fn from(label: String) -> Self {
        DealStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == label)
            .unwrap_or(DealStage::Other(label))
    }
}

impl From<DealStage> for String {
    fn from(stage: DealStage) -> Self {
        match stage {
            DealStage::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for DealStage {
    type Err = String;

    /// Case-insensitive; only the known stages parse
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DealStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let all = DealStage::ALL;
                let names: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
                format!("Unknown deal stage '{}'. Expected one of: {}", wanted, names.join(", "))
            })
    }
}

/// A set of requirement tags (deployment options, privacy tags, integrations).
///
/// Keeps first-seen order for display but drops blanks and duplicates, so
/// counting and membership behave like a set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Vec<String>")]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into().trim().to_string();
        if tag.is_empty() || self.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive membership test
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// True if any tag starts with `prefix` (case-insensitive)
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase();
        self.0.iter().any(|t| t.to_ascii_lowercase().starts_with(&prefix))
    }

    /// True if any tag contains `word` as a whole word (case-insensitive).
    /// "Microsoft SharePoint" contains the word "sharepoint".
    pub fn contains_word(&self, word: &str) -> bool {
        self.0.iter().any(|t| {
            t.split(|c: char| !c.is_alphanumeric())
                .any(|w| w.eq_ignore_ascii_case(word))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }
}

impl From<Vec<String>> for TagSet {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

/// `null` from the wire is an empty set
impl From<Option<Vec<String>>> for TagSet {
    fn from(tags: Option<Vec<String>>) -> Self {
        tags.map(TagSet::from).unwrap_or_default()
    }
}

impl From<TagSet> for Vec<String> {
    fn from(tags: TagSet) -> Self {
        tags.0
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    File,
    Url,
}

/// A file or link attached to the submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Absent and `null` both mean "not given"
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The central intake record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealSubmission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub requestor_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub requestor_email: String,
    pub company: Option<String>,
    pub region: Option<String>,
    pub business_unit: Option<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub problem_statement: String,
    #[serde(deserialize_with = "null_as_default")]
    pub expected_outcomes: String,

    /// ISO date (YYYY-MM-DD)
    #[serde(deserialize_with = "null_as_default")]
    pub target_production_date: String,
    pub preferred_path: Option<PreferredPath>,
    pub deployment_preference: TagSet,
    pub data_privacy_requirements: TagSet,
    pub data_notes: Option<String>,
    pub critical_integrations: TagSet,
    pub integration_notes: Option<String>,

    pub executive_sponsor_name: Option<String>,
    pub executive_sponsor_email: Option<String>,
    pub budget_band: Option<BudgetBand>,
    pub competitors: Option<String>,
    pub deal_stage: Option<DealStage>,
    pub win_factors: Option<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One failed field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field errors found on a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

impl DealSubmission {
    /// Check required fields and email shapes, collecting every problem
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        let mut require = |field: &'static str, value: &str, label: &str| {
            if is_blank(value) {
                errors.push(FieldError {
                    field,
                    message: format!("{} is required", label),
                });
                false
            } else {
                true
            }
        };

        require("requestor_name", &self.requestor_name, "Requestor name");
        let has_email = require("requestor_email", &self.requestor_email, "Requestor email");
        require("problem_statement", &self.problem_statement, "Problem statement");
        require("expected_outcomes", &self.expected_outcomes, "Expected outcomes");
        require(
            "target_production_date",
            &self.target_production_date,
            "Target production date",
        );

        if has_email && !is_valid_email(self.requestor_email.trim()) {
            errors.push(FieldError {
                field: "requestor_email",
                message: "Invalid email format".to_string(),
            });
        }
        if let Some(email) = non_blank(&self.executive_sponsor_email) {
            if !is_valid_email(email) {
                errors.push(FieldError {
                    field: "executive_sponsor_email",
                    message: "Invalid email format".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    pub fn integration_count(&self) -> usize {
        self.critical_integrations.len()
    }

    pub fn has_integrations(&self) -> bool {
        !self.critical_integrations.is_empty()
    }

    pub fn has_privacy_tag(&self, tag: &str) -> bool {
        self.data_privacy_requirements.contains(tag)
    }

    pub fn is_on_prem(&self) -> bool {
        self.deployment_preference.contains("On-Prem")
    }

    /// Matches "Customer VPC" as well as "Customer VPC (Cloud)"
    pub fn is_customer_vpc(&self) -> bool {
        self.deployment_preference.contains_prefix("Customer VPC")
    }

    /// On-prem or customer-VPC deployments need gateway work
    pub fn has_complex_deployment(&self) -> bool {
        self.is_on_prem() || self.is_customer_vpc()
    }

    pub fn has_sponsor(&self) -> bool {
        non_blank(&self.executive_sponsor_name).is_some()
    }

    pub fn has_competitors(&self) -> bool {
        non_blank(&self.competitors).is_some()
    }

    pub fn is_rapid_prototype(&self) -> bool {
        self.preferred_path == Some(PreferredPath::RapidPrototype)
    }

    pub fn is_high_budget(&self) -> bool {
        self.budget_band == Some(BudgetBand::Over1M)
    }

    /// Display name used in listings
    pub fn display_name(&self) -> &str {
        non_blank(&self.company).unwrap_or(self.requestor_name.as_str())
    }
}
