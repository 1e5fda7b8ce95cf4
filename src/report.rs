//! Full deal report: analysis, credit forecast, timeline and responsible-AI controls

use crate::analysis::{generate_opportunity_analysis_at, OpportunityAnalysis};
use crate::deal::DealSubmission;
use crate::forecast::{
    calculate_credits, calculate_timeline, responsible_ai_features, DealCreditForecast,
    ResponsibleAiFeatures, TimelineEstimate,
};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    pub display_name: String,
    pub analysis: OpportunityAnalysis,
    pub credits: DealCreditForecast,
    pub timeline: TimelineEstimate,
    pub responsible_ai: ResponsibleAiFeatures,
}

impl DealReport {
    /// The forecaster takes the analyzer's agent count and tier
    pub fn build(deal: &DealSubmission, today: NaiveDate) -> Self {
        let analysis = generate_opportunity_analysis_at(deal, today);
        let credits = calculate_credits(deal, analysis.estimated_agents);
        let timeline = calculate_timeline(deal, analysis.complexity_level);

        Self {
            deal_id: deal.id.clone(),
            display_name: deal.display_name().to_string(),
            credits,
            timeline,
            responsible_ai: responsible_ai_features(deal),
            analysis,
        }
    }

    /// Report against today's local date
    pub fn build_now(deal: &DealSubmission) -> Self {
        Self::build(deal, chrono::Local::now().date_naive())
    }
}
