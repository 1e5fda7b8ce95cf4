//! Per-unit scenario credit calculator
//!
//! A scenario is a named unit of work ("post", "ticket", "daily run") with a
//! monthly volume and two usage profiles. Each profile is a vector of seven
//! usage counters priced against a [`RateCard`]. Totals are always rounded
//! *up* to the next thousandth of a credit so an estimate never under-bills.

use crate::pricing::{RateCard, KB_INGEST_PER_TOKENS};
use crate::pricing::keys;
use serde::{Deserialize, Serialize};

/// Fixed disclaimer attached to every estimate
pub const ESTIMATE_NOTES: &str = "Agent-action credits only; LLM/provider and external vendor/API fees are excluded. 30-day projection uses calendar days.";

/// Token count per unit at or above which the token soft limit is raised
pub const TOKEN_SOFT_LIMIT: u32 = 1_000_000;
/// Calls per category per unit above which the call-count soft limit is raised
pub const CALL_SOFT_LIMIT: u32 = 20;

/// Allowed float noise (in credits) before a value counts as past a thousandth.
/// A published total is never more than this below the raw value.
const CEIL_TOLERANCE: f64 = 1e-9;

/// Round up to the nearest 0.001 credit.
///
/// Values that are already on a thousandth (within float noise) are left there,
/// so 0.2 + 0.1 + 0.015 publishes as 0.315 rather than 0.316.
pub fn ceil_to_thousandth(value: f64) -> f64 {
    let scaled = value * 1000.0;
    let nearest = scaled.round();
    if (scaled - nearest).abs() <= CEIL_TOLERANCE * 1000.0 {
        nearest / 1000.0
    } else {
        scaled.ceil() / 1000.0
    }
}

/// Usage per unit of work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageCounters {
    pub pages_checked: u32,
    pub extra_pages: u32,
    pub knowledge_lookups: u32,
    pub memory_steps: u32,
    pub api_actions: u32,
    pub safety_checks: u32,
    pub agent_chatter_tokens: u32,
}

impl UsageCounters {
    /// Light profile used when a caller only names a unit and a volume
    pub fn custom_light() -> Self {
        Self {
            pages_checked: 2,
            extra_pages: 0,
            knowledge_lookups: 1,
            memory_steps: 0,
            api_actions: 2,
            safety_checks: 0,
            agent_chatter_tokens: 15_000,
        }
    }

    /// Heavy profile used when a caller only names a unit and a volume
    pub fn custom_heavy() -> Self {
        Self {
            pages_checked: 5,
            extra_pages: 3,
            knowledge_lookups: 4,
            memory_steps: 2,
            api_actions: 8,
            safety_checks: 1,
            agent_chatter_tokens: 60_000,
        }
    }

    /// Largest per-unit call count, tokens excluded
    pub fn max_calls(&self) -> u32 {
        [
            self.pages_checked,
            self.extra_pages,
            self.knowledge_lookups,
            self.memory_steps,
            self.api_actions,
            self.safety_checks,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Short human summary, e.g. "2 pages checked; 15000 agent tokens"
    pub fn describe(&self) -> String {
        let parts = [
            (self.pages_checked, "pages checked"),
            (self.extra_pages, "extra pages"),
            (self.knowledge_lookups, "knowledge lookups"),
            (self.memory_steps, "memory steps"),
            (self.api_actions, "API actions"),
            (self.safety_checks, "safety checks"),
            (self.agent_chatter_tokens, "agent tokens"),
        ];
        parts
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, label)| format!("{} {}", n, label))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// One priced line of a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-rs", derive(ts_rs::TS))]
pub struct UsageBreakdownItem {
    pub resource: String,
    pub units: u32,
    pub rate: f64,
    pub credits: f64,
}

/// Priced profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioCalculation {
    pub inputs: UsageCounters,
    pub breakdown: Vec<UsageBreakdownItem>,
    pub per_unit_total: f64,
    pub monthly_total_30d: f64,
}

/// Price one usage profile. `monthly_total_30d` is left at zero; see [`estimate_credits`].
pub fn calculate_scenario(rates: &RateCard, inputs: &UsageCounters) -> ScenarioCalculation {
    let lines = [
        ("Pages checked", inputs.pages_checked, rates.web_fetch),
        ("Extra pages (same site)", inputs.extra_pages, rates.deep_crawl),
        ("Knowledge lookups", inputs.knowledge_lookups, rates.kb_retrieve),
        ("Memory step", inputs.memory_steps, rates.memory_op),
        ("App/API actions", inputs.api_actions, rates.api_light),
        ("Safety check", inputs.safety_checks, rates.rai_run),
        ("Agent chatter (tokens)", inputs.agent_chatter_tokens, rates.agent_comm_per_token()),
    ];

    let breakdown: Vec<UsageBreakdownItem> = lines
        .iter()
        .filter(|(_, units, _)| *units > 0)
        .map(|(resource, units, rate)| UsageBreakdownItem {
            resource: resource.to_string(),
            units: *units,
            rate: *rate,
            credits: f64::from(*units) * rate,
        })
        .collect();

    let raw_total: f64 = breakdown.iter().map(|line| line.credits).sum();

    ScenarioCalculation {
        inputs: *inputs,
        breakdown,
        per_unit_total: ceil_to_thousandth(raw_total),
        monthly_total_30d: 0.0,
    }
}

/// Optional one-time and storage costs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    /// Add agent creation (and KB creation when ingesting)
    pub include_setup: bool,
    pub kb_ingestion_tokens: u64,
    pub kb_storage_gb_month: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupItem {
    pub item: String,
    pub credits: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupCosts {
    pub include: bool,
    pub items: Vec<SetupItem>,
    pub kb_ingestion_tokens: u64,
    pub kb_ingestion_credits: f64,
    pub kb_storage_gb_month: Option<f64>,
    pub kb_storage_credits: Option<f64>,
    pub setup_total: f64,
}

/// Advisory signals for a human reviewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SoftLimitFlags {
    pub tokens_soft_limit_per_unit: bool,
    pub call_count_soft_limit_per_unit: bool,
}

impl SoftLimitFlags {
    pub fn any(&self) -> bool {
        self.tokens_soft_limit_per_unit || self.call_count_soft_limit_per_unit
    }
}

/// Everything needed to run an estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub scenario: String,
    pub unit: String,
    pub units_per_30d: u32,
    #[serde(default = "UsageCounters::custom_light")]
    pub light: UsageCounters,
    #[serde(default = "UsageCounters::custom_heavy")]
    pub heavy: UsageCounters,
    #[serde(default)]
    pub setup: SetupOptions,
}

impl ScenarioRequest {
    /// A custom workflow priced with the default light/heavy profiles
    pub fn custom(scenario: impl Into<String>, unit: impl Into<String>, units_per_30d: u32) -> Self {
        Self {
            scenario: scenario.into(),
            unit: unit.into(),
            units_per_30d,
            light: UsageCounters::custom_light(),
            heavy: UsageCounters::custom_heavy(),
            setup: SetupOptions::default(),
        }
    }
}

/// Light and heavy projection for one scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioEstimate {
    pub scenario: String,
    pub unit: String,
    pub units_per_30d: u32,
    pub light: ScenarioCalculation,
    pub heavy: ScenarioCalculation,
    pub setup: SetupCosts,
    pub flags: SoftLimitFlags,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateError {
    #[error("Invalid {field}: {value} (must be a finite, non-negative number)")]
    InvalidQuantity { field: &'static str, value: f64 },
}

fn setup_costs(rates: &RateCard, options: &SetupOptions) -> Result<SetupCosts, EstimateError> {
    if let Some(gb) = options.kb_storage_gb_month {
        if !gb.is_finite() || gb < 0.0 {
            return Err(EstimateError::InvalidQuantity {
                field: "kb_storage_gb_month",
                value: gb,
            });
        }
    }

    let mut items = Vec::new();
    let mut total = 0.0;

    if options.include_setup {
        items.push(SetupItem {
            item: keys::CREATE_AGENT.to_string(),
            credits: rates.create_agent,
        });
        total += rates.create_agent;

        if options.kb_ingestion_tokens > 0 {
            items.push(SetupItem {
                item: keys::CREATE_KB.to_string(),
                credits: rates.create_kb,
            });
            total += rates.create_kb;
        }
    }

    let ingestion = options.kb_ingestion_tokens as f64 / KB_INGEST_PER_TOKENS * rates.kb_ingest;
    total += ingestion;

    let storage = options
        .kb_storage_gb_month
        .filter(|gb| *gb > 0.0)
        .map(|gb| gb * rates.kb_storage_gb_month);
    if let Some(storage) = storage {
        total += storage;
    }

    Ok(SetupCosts {
        include: options.include_setup,
        items,
        kb_ingestion_tokens: options.kb_ingestion_tokens,
        kb_ingestion_credits: ceil_to_thousandth(ingestion),
        kb_storage_gb_month: options.kb_storage_gb_month,
        kb_storage_credits: storage.map(ceil_to_thousandth),
        setup_total: ceil_to_thousandth(total),
    })
}

/// Price both profiles, project 30 days and raise advisory flags
pub fn estimate_credits(rates: &RateCard, request: &ScenarioRequest) -> Result<ScenarioEstimate, EstimateError> {
    let setup = setup_costs(rates, &request.setup)?;
    let volume = f64::from(request.units_per_30d);

    let mut light = calculate_scenario(rates, &request.light);
    let mut heavy = calculate_scenario(rates, &request.heavy);
    light.monthly_total_30d = ceil_to_thousandth(light.per_unit_total * volume);
    heavy.monthly_total_30d = ceil_to_thousandth(heavy.per_unit_total * volume);

    let max_tokens = request.light.agent_chatter_tokens.max(request.heavy.agent_chatter_tokens);
    let max_calls = request.light.max_calls().max(request.heavy.max_calls());
    let flags = SoftLimitFlags {
        tokens_soft_limit_per_unit: max_tokens >= TOKEN_SOFT_LIMIT,
        call_count_soft_limit_per_unit: max_calls > CALL_SOFT_LIMIT,
    };

    tracing::debug!(
        scenario = %request.scenario,
        light = light.monthly_total_30d,
        heavy = heavy.monthly_total_30d,
        "scenario estimated"
    );

    Ok(ScenarioEstimate {
        scenario: request.scenario.clone(),
        unit: request.unit.clone(),
        units_per_30d: request.units_per_30d,
        light,
        heavy,
        setup,
        flags,
        notes: ESTIMATE_NOTES.to_string(),
    })
}

/// A packaged example scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoScenario {
    pub name: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
    pub units_per_month: u32,
    pub light: UsageCounters,
    pub heavy: UsageCounters,
}

impl DemoScenario {
    pub fn request(&self) -> ScenarioRequest {
        ScenarioRequest {
            scenario: self.name.to_string(),
            unit: self.unit.to_string(),
            units_per_30d: self.units_per_month,
            light: self.light,
            heavy: self.heavy,
            setup: SetupOptions::default(),
        }
    }
}

pub fn demo_scenarios() -> Vec<DemoScenario> {
    vec![
        DemoScenario {
            name: "Blog Post Writer",
            unit: "post",
            description: "AI agent that researches topics and writes blog posts",
            units_per_month: 20,
            light: UsageCounters {
                pages_checked: 2,
                agent_chatter_tokens: 10_000,
                ..Default::default()
            },
            heavy: UsageCounters {
                pages_checked: 8,
                extra_pages: 4,
                knowledge_lookups: 2,
                memory_steps: 1,
                api_actions: 2,
                safety_checks: 1,
                agent_chatter_tokens: 50_000,
            },
        },
        DemoScenario {
            name: "Research Digest",
            unit: "daily run",
            description: "Daily automated research summary and email delivery",
            units_per_month: 30,
            light: UsageCounters {
                api_actions: 5,
                agent_chatter_tokens: 20_000,
                ..Default::default()
            },
            heavy: UsageCounters {
                pages_checked: 10,
                memory_steps: 1,
                api_actions: 10,
                safety_checks: 1,
                agent_chatter_tokens: 50_000,
                ..Default::default()
            },
        },
        DemoScenario {
            name: "Media Plan Session",
            unit: "session",
            description: "Interactive media planning with research and recommendations",
            units_per_month: 50,
            light: UsageCounters {
                pages_checked: 1,
                knowledge_lookups: 2,
                memory_steps: 1,
                api_actions: 4,
                agent_chatter_tokens: 20_000,
                ..Default::default()
            },
            heavy: UsageCounters {
                pages_checked: 3,
                extra_pages: 4,
                knowledge_lookups: 6,
                memory_steps: 2,
                api_actions: 12,
                safety_checks: 1,
                agent_chatter_tokens: 80_000,
            },
        },
    ]
}

/// Look a demo scenario up by name (case-insensitive) or 1-based index
pub fn find_demo_scenario(name_or_index: &str) -> Option<DemoScenario> {
    let wanted = name_or_index.trim();
    let scenarios = demo_scenarios();
    if let Ok(index) = wanted.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| scenarios.get(i).cloned());
    }
    scenarios
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(wanted))
}

/// Credits with three decimals
pub fn format_credits(credits: f64) -> String {
    format!("{:.3}", credits)
}

/// Currency with two decimals, e.g. "$6.30"
pub fn format_currency(amount: f64, symbol: &str) -> String {
    format!("{}{:.2}", symbol, amount)
}

/// The legacy credit scale was 100x finer
pub fn to_legacy_credits(credits: f64) -> f64 {
    credits * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_light_profile_example() {
        let rates = RateCard::default();
        let request = ScenarioRequest {
            scenario: "Blog".to_string(),
            unit: "post".to_string(),
            units_per_30d: 20,
            light: UsageCounters {
                pages_checked: 2,
                api_actions: 2,
                agent_chatter_tokens: 15_000,
                ..Default::default()
            },
            heavy: UsageCounters::default(),
            setup: SetupOptions::default(),
        };

        let estimate = estimate_credits(&rates, &request).unwrap();
        assert_eq!(estimate.light.breakdown.len(), 3);
        assert_eq!(estimate.light.per_unit_total, 0.315);
        assert_eq!(estimate.light.monthly_total_30d, 6.3);
        assert_eq!(format_credits(estimate.light.monthly_total_30d), "6.300");
    }

    #[test]
    fn test_zero_counters_emit_no_lines() {
        let calc = calculate_scenario(&RateCard::default(), &UsageCounters::default());
        assert!(calc.breakdown.is_empty());
        assert_eq!(calc.per_unit_total, 0.0);
    }

    #[test]
    fn test_breakdown_order_and_token_rate() {
        let calc = calculate_scenario(
            &RateCard::default(),
            &UsageCounters {
                agent_chatter_tokens: 500_000,
                safety_checks: 1,
                pages_checked: 1,
                ..Default::default()
            },
        );
        let names: Vec<&str> = calc.breakdown.iter().map(|l| l.resource.as_str()).collect();
        assert_eq!(names, vec!["Pages checked", "Safety check", "Agent chatter (tokens)"]);
        assert!(close(calc.breakdown[2].credits, 0.5));
        assert_eq!(calc.per_unit_total, 0.7);
    }

    #[test]
    fn test_ceiling_rounds_up() {
        assert_eq!(ceil_to_thousandth(0.0001), 0.001);
        assert_eq!(ceil_to_thousandth(1.2341), 1.235);
        assert_eq!(ceil_to_thousandth(0.315), 0.315);
        assert_eq!(ceil_to_thousandth(0.0), 0.0);
    }

    #[test]
    fn test_soft_limit_flags() {
        let rates = RateCard::default();
        let mut request = ScenarioRequest::custom("Custom Workflow", "ticket", 100);
        let estimate = estimate_credits(&rates, &request).unwrap();
        assert!(!estimate.flags.any());

        request.heavy.agent_chatter_tokens = TOKEN_SOFT_LIMIT;
        let estimate = estimate_credits(&rates, &request).unwrap();
        assert!(estimate.flags.tokens_soft_limit_per_unit);
        assert!(!estimate.flags.call_count_soft_limit_per_unit);

        request.heavy.agent_chatter_tokens = 0;
        request.light.api_actions = 20;
        assert!(!estimate_credits(&rates, &request).unwrap().flags.call_count_soft_limit_per_unit);
        request.light.api_actions = 21;
        assert!(estimate_credits(&rates, &request).unwrap().flags.call_count_soft_limit_per_unit);
    }

    #[test]
    fn test_setup_costs() {
        let rates = RateCard::default();
        let mut request = ScenarioRequest::custom("Support", "ticket", 10);
        request.setup = SetupOptions {
            include_setup: true,
            kb_ingestion_tokens: 250_000,
            kb_storage_gb_month: Some(2.0),
        };

        let setup = estimate_credits(&rates, &request).unwrap().setup;
        let items: Vec<&str> = setup.items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(items, vec![keys::CREATE_AGENT, keys::CREATE_KB]);
        assert_eq!(setup.kb_ingestion_credits, 2.5);
        assert_eq!(setup.kb_storage_credits, Some(0.4));
        // 0.05 + 1.0 + 2.5 + 0.4
        assert_eq!(setup.setup_total, 3.95);
    }

    #[test]
    fn test_ingestion_counts_without_setup_flag() {
        let rates = RateCard::default();
        let mut request = ScenarioRequest::custom("Support", "ticket", 10);
        request.setup.kb_ingestion_tokens = 100_000;

        let setup = estimate_credits(&rates, &request).unwrap().setup;
        assert!(setup.items.is_empty());
        assert_eq!(setup.setup_total, 1.0);
        assert_eq!(setup.kb_storage_credits, None);
    }

    #[test]
    fn test_rejects_bad_storage_quantity() {
        let mut request = ScenarioRequest::custom("Support", "ticket", 10);
        request.setup.kb_storage_gb_month = Some(f64::NAN);
        assert!(estimate_credits(&RateCard::default(), &request).is_err());
        request.setup.kb_storage_gb_month = Some(-1.0);
        assert!(estimate_credits(&RateCard::default(), &request).is_err());
    }

    #[test]
    fn test_demo_lookup() {
        assert_eq!(find_demo_scenario("2").unwrap().name, "Research Digest");
        assert_eq!(find_demo_scenario("blog post writer").unwrap().unit, "post");
        assert!(find_demo_scenario("0").is_none());
        assert!(find_demo_scenario("4").is_none());
    }

    #[test]
    fn test_demo_blog_post_estimate() {
        let demo = find_demo_scenario("Blog Post Writer").unwrap();
        let estimate = estimate_credits(&RateCard::default(), &demo.request()).unwrap();
        // 2 x 0.1 + 10k tokens x 1e-6
        assert_eq!(estimate.light.per_unit_total, 0.21);
        assert_eq!(estimate.light.monthly_total_30d, 4.2);
    }

    #[test]
    fn test_describe_and_formatting() {
        let counters = UsageCounters {
            pages_checked: 2,
            agent_chatter_tokens: 15_000,
            ..Default::default()
        };
        assert_eq!(counters.describe(), "2 pages checked; 15000 agent tokens");
        assert_eq!(format_currency(6.3, "$"), "$6.30");
        assert!(close(to_legacy_credits(6.3), 630.0));
    }

    fn counters() -> impl Strategy<Value = UsageCounters> {
        (
            0u32..50,
            0u32..50,
            0u32..50,
            0u32..50,
            0u32..50,
            0u32..50,
            0u32..2_000_000,
        )
            .prop_map(|(a, b, c, d, e, f, g)| UsageCounters {
                pages_checked: a,
                extra_pages: b,
                knowledge_lookups: c,
                memory_steps: d,
                api_actions: e,
                safety_checks: f,
                agent_chatter_tokens: g,
            })
    }

    fn raw_total(rates: &RateCard, c: &UsageCounters) -> f64 {
        f64::from(c.pages_checked) * rates.web_fetch
            + f64::from(c.extra_pages) * rates.deep_crawl
            + f64::from(c.knowledge_lookups) * rates.kb_retrieve
            + f64::from(c.memory_steps) * rates.memory_op
            + f64::from(c.api_actions) * rates.api_light
            + f64::from(c.safety_checks) * rates.rai_run
            + f64::from(c.agent_chatter_tokens) * rates.agent_comm / 1_000_000.0
    }

    proptest! {
        #[test]
        fn prop_total_is_sum_of_lines(c in counters()) {
            let rates = RateCard::default();
            let calc = calculate_scenario(&rates, &c);
            let sum: f64 = calc.breakdown.iter().map(|l| l.credits).sum();
            prop_assert!((sum - raw_total(&rates, &c)).abs() < 1e-6);
            for line in &calc.breakdown {
                prop_assert!(line.units > 0);
                prop_assert!((line.credits - f64::from(line.units) * line.rate).abs() < 1e-12);
            }
        }

        #[test]
        fn prop_per_unit_total_is_ceiling(c in counters()) {
            let rates = RateCard::default();
            let raw = raw_total(&rates, &c);
            let published = calculate_scenario(&rates, &c).per_unit_total;
            prop_assert!(published >= raw - CEIL_TOLERANCE);
            prop_assert!(published - raw <= 0.001 + 1e-6);
        }

        #[test]
        fn prop_monthly_total_is_ceiling(c in counters(), volume in 0u32..10_000) {
            let rates = RateCard::default();
            let mut request = ScenarioRequest::custom("p", "unit", volume);
            request.light = c;
            let estimate = estimate_credits(&rates, &request).unwrap();
            let raw = estimate.light.per_unit_total * f64::from(volume);
            prop_assert!(estimate.light.monthly_total_30d >= raw - CEIL_TOLERANCE);
            prop_assert!(estimate.light.monthly_total_30d - raw <= 0.001 + 1e-6);
        }

        #[test]
        fn prop_counters_are_monotonic(c in counters(), which in 0usize..7, bump in 1u32..1000) {
            let rates = RateCard::default();
            let mut more = c;
            match which {
                0 => more.pages_checked += bump,
                1 => more.extra_pages += bump,
                2 => more.knowledge_lookups += bump,
                3 => more.memory_steps += bump,
                4 => more.api_actions += bump,
                5 => more.safety_checks += bump,
                _ => more.agent_chatter_tokens += bump,
            }
            let before = calculate_scenario(&rates, &c).per_unit_total;
            let after = calculate_scenario(&rates, &more).per_unit_total;
            prop_assert!(after >= before);
        }
    }
}
