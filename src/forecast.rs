//! Deal-level credit and timeline forecast
//!
//! Independent of the per-unit scenario calculator: its own base rate and
//! multipliers, driven by the analyzer's agent count and complexity tier.

use crate::analysis::ComplexityLevel;
use crate::deal::DealSubmission;
use serde::{Deserialize, Serialize};

pub const CREDITS_PER_AGENT: f64 = 50_000.0;
pub const INTEGRATION_STEP: f64 = 0.15;
pub const SENSITIVE_DATA_MULTIPLIER: f64 = 1.3;
/// Months of production usage included in the total
pub const PRODUCTION_MONTHS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPhases {
    pub prototype_phase: u64,
    pub pilot_phase: u64,
    pub production_monthly: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditFactors {
    pub agent_count: u32,
    pub integration_complexity: f64,
    pub data_volume_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealCreditForecast {
    pub total_credits: u64,
    pub breakdown: CreditPhases,
    pub factors: CreditFactors,
}

/// 1.3 when any PHI, PCI or Confidential data is involved
fn data_multiplier(deal: &DealSubmission) -> f64 {
    let sensitive = ["PHI", "PCI", "Confidential"]
        .iter()
        .any(|tag| deal.has_privacy_tag(tag));
    if sensitive {
        SENSITIVE_DATA_MULTIPLIER
    } else {
        1.0
    }
}

pub fn calculate_credits(deal: &DealSubmission, agents: u32) -> DealCreditForecast {
    let integration = 1.0 + deal.integration_count() as f64 * INTEGRATION_STEP;
    let data = data_multiplier(deal);
    let base = f64::from(agents) * CREDITS_PER_AGENT;

    let breakdown = CreditPhases {
        prototype_phase: (base * 0.3).round() as u64,
        pilot_phase: (base * 0.7 * integration).round() as u64,
        production_monthly: (base * integration * data).round() as u64,
    };

    DealCreditForecast {
        total_credits: breakdown.prototype_phase
            + breakdown.pilot_phase
            + PRODUCTION_MONTHS * breakdown.production_monthly,
        breakdown,
        factors: CreditFactors {
            agent_count: agents,
            integration_complexity: integration,
            data_volume_multiplier: data,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-rs", derive(ts_rs::TS))]
pub struct TimelinePhase {
    pub name: String,
    pub weeks: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEstimate {
    pub total_weeks: u32,
    pub phases: Vec<TimelinePhase>,
}

fn phase(name: &str, weeks: u32, description: &str) -> TimelinePhase {
    TimelinePhase {
        name: name.to_string(),
        weeks,
        description: description.to_string(),
    }
}

/// Phased delivery plan. The rapid path front-loads a one-week prototype;
/// otherwise a paid pilot is planned.
pub fn calculate_timeline(deal: &DealSubmission, complexity: ComplexityLevel) -> TimelineEstimate {
    let mut phases = if deal.is_rapid_prototype() {
        let build = match complexity {
            ComplexityLevel::Low => 6,
            ComplexityLevel::Medium => 8,
            ComplexityLevel::High => 10,
            ComplexityLevel::VeryHigh => 12,
        };
        vec![
            phase("Rapid Prototype", 1, "Quick proof of concept with core functionality"),
            phase("Feedback & Iteration", 1, "Gather stakeholder feedback and refine approach"),
            phase("Development", build, "Full agent development and integration"),
        ]
    } else {
        let build = match complexity {
            ComplexityLevel::Low => 4,
            ComplexityLevel::Medium => 6,
            ComplexityLevel::High => 8,
            ComplexityLevel::VeryHigh => 10,
        };
        vec![
            phase("Discovery & Planning", 2, "Requirements gathering and technical design"),
            phase("Pilot Development", build, "Build core agents and integrations for pilot"),
            phase("Pilot Testing", 4, "User testing, feedback, and optimization"),
        ]
    };

    phases.push(phase(
        "Production Hardening",
        3,
        "Security review, performance tuning, deployment prep",
    ));
    phases.push(phase(
        "Deployment & Support",
        2,
        "Production rollout and initial support",
    ));

    TimelineEstimate {
        total_weeks: phases.iter().map(|p| p.weeks).sum(),
        phases,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsibleAiFeatures {
    pub required: Vec<String>,
    pub recommended: Vec<String>,
}

/// Push unless already present, keeping first-seen order
fn push_unique(list: &mut Vec<String>, items: &[&str]) {
    for item in items {
        if !list.iter().any(|existing| existing == item) {
            list.push(item.to_string());
        }
    }
}

pub fn responsible_ai_features(deal: &DealSubmission) -> ResponsibleAiFeatures {
    let mut features = ResponsibleAiFeatures::default();
    let required = &mut features.required;

    if deal.has_privacy_tag("PHI") {
        push_unique(
            required,
            &[
                "HIPAA Compliance Module",
                "Audit Logging & Traceability",
                "Data Encryption at Rest & Transit",
            ],
        );
    }
    if deal.has_privacy_tag("PCI") {
        push_unique(
            required,
            &[
                "PCI-DSS Compliance Controls",
                "Secure Data Masking",
                "Access Control & Authentication",
            ],
        );
    }
    if deal.has_privacy_tag("PII") || deal.has_privacy_tag("Confidential") {
        push_unique(
            required,
            &["Data Privacy Controls", "Role-Based Access Control (RBAC)"],
        );
    }
    if deal.has_privacy_tag("EU-only") {
        push_unique(
            required,
            &[
                "GDPR Compliance Framework",
                "Data Residency Controls (EU)",
                "Right to Deletion Support",
            ],
        );
    }
    push_unique(
        required,
        &["Explainable AI Decisions", "Bias Detection & Monitoring"],
    );

    let recommended = &mut features.recommended;
    if deal.is_on_prem() {
        push_unique(
            recommended,
            &["On-Premise Security Hardening", "Network Isolation Controls"],
        );
    }
    push_unique(
        recommended,
        &[
            "Human-in-the-Loop (HITL) Review Workflows",
            "Confidence Scoring for Recommendations",
            "Continuous Model Performance Monitoring",
            "Ethical AI Guidelines Enforcement",
        ],
    );

    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::{PreferredPath, TagSet};

    fn tags(values: &[&str]) -> TagSet {
        values.iter().copied().collect()
    }

    #[test]
    fn test_credits_plain_deal() {
        let forecast = calculate_credits(&DealSubmission::default(), 2);
        assert_eq!(forecast.breakdown.prototype_phase, 30_000);
        assert_eq!(forecast.breakdown.pilot_phase, 70_000);
        assert_eq!(forecast.breakdown.production_monthly, 100_000);
        assert_eq!(forecast.total_credits, 400_000);
        assert_eq!(forecast.factors.data_volume_multiplier, 1.0);
    }

    #[test]
    fn test_credits_with_integrations_and_phi() {
        let deal = DealSubmission {
            critical_integrations: tags(&["Salesforce", "SAP", "Epic", "Jira"]),
            data_privacy_requirements: tags(&["PHI"]),
            ..Default::default()
        };
        let forecast = calculate_credits(&deal, 6);
        // base 300k, integration 1.6, data 1.3
        assert_eq!(forecast.breakdown.prototype_phase, 90_000);
        assert_eq!(forecast.breakdown.pilot_phase, 336_000);
        assert_eq!(forecast.breakdown.production_monthly, 624_000);
        assert_eq!(forecast.total_credits, 90_000 + 336_000 + 3 * 624_000);
        assert!((forecast.factors.integration_complexity - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_pii_alone_is_not_sensitive_volume() {
        let deal = DealSubmission {
            data_privacy_requirements: tags(&["PII"]),
            ..Default::default()
        };
        assert_eq!(calculate_credits(&deal, 2).factors.data_volume_multiplier, 1.0);
    }

    #[test]
    fn test_pilot_timeline() {
        let timeline = calculate_timeline(&DealSubmission::default(), ComplexityLevel::High);
        let names: Vec<&str> = timeline.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Discovery & Planning",
                "Pilot Development",
                "Pilot Testing",
                "Production Hardening",
                "Deployment & Support",
            ]
        );
        assert_eq!(timeline.phases[1].weeks, 8);
        assert_eq!(timeline.total_weeks, 2 + 8 + 4 + 3 + 2);
    }

    #[test]
    fn test_rapid_timeline_scales_with_complexity() {
        let deal = DealSubmission {
            preferred_path: Some(PreferredPath::RapidPrototype),
            ..Default::default()
        };
        let weeks: Vec<u32> = [
            ComplexityLevel::Low,
            ComplexityLevel::Medium,
            ComplexityLevel::High,
            ComplexityLevel::VeryHigh,
        ]
        .iter()
        .map(|c| calculate_timeline(&deal, *c).total_weeks)
        .collect();
        assert_eq!(weeks, vec![13, 15, 17, 19]);
        assert_eq!(
            calculate_timeline(&deal, ComplexityLevel::Low).phases[0].name,
            "Rapid Prototype"
        );
    }

    #[test]
    fn test_baseline_controls_always_present() {
        let features = responsible_ai_features(&DealSubmission::default());
        assert_eq!(
            features.required,
            vec!["Explainable AI Decisions", "Bias Detection & Monitoring"]
        );
        assert_eq!(features.recommended.len(), 4);
    }

    #[test]
    fn test_privacy_rules_and_dedup() {
        let deal = DealSubmission {
            data_privacy_requirements: tags(&["PHI", "PCI", "PII", "Confidential", "EU-only"]),
            deployment_preference: tags(&["On-Prem"]),
            ..Default::default()
        };
        let features = responsible_ai_features(&deal);
        assert_eq!(features.required.len(), 3 + 3 + 2 + 3 + 2);
        assert_eq!(features.required[0], "HIPAA Compliance Module");
        assert!(features
            .required
            .contains(&"Role-Based Access Control (RBAC)".to_string()));
        assert_eq!(features.recommended[0], "On-Premise Security Hardening");

        let mut seen = std::collections::HashSet::new();
        assert!(features.required.iter().all(|r| seen.insert(r)));
    }
}
