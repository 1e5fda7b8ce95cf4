//! Opportunity analyzer
//!
//! Turns a [`DealSubmission`] into a feasibility analysis: complexity tier,
//! agent roster, tools, integration gateways, effort, cost band, timeline,
//! risks and narrative. Everything here is a pure function of the deal (and,
//! for the timeline risk, a reference date). Missing fields contribute nothing.

use crate::deal::{DealSubmission, TagSet};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BASE_COMPLEXITY: u32 = 30;
pub const HOURS_PER_AGENT: u32 = 80;
pub const HOURS_PER_INTEGRATION: u32 = 40;
pub const HOURLY_RATE: f64 = 150.0;
pub const OPPORTUNITY_CAP: u8 = 95;

const LONG_PROBLEM_CHARS: usize = 300;
const TIGHT_TIMELINE_MONTHS: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl ComplexityLevel {
    /// Tier breakpoints: ≤40 Low, 41-55 Medium, 56-70 High, >70 Very High
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s > 70 => ComplexityLevel::VeryHigh,
            s if s > 55 => ComplexityLevel::High,
            s if s > 40 => ComplexityLevel::Medium,
            _ => ComplexityLevel::Low,
        }
    }

    /// Agent count for the tier
    pub fn agent_count(&self) -> u32 {
        match self {
            ComplexityLevel::Low => 2,
            ComplexityLevel::Medium => 3,
            ComplexityLevel::High => 4,
            ComplexityLevel::VeryHigh => 6,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, ComplexityLevel::High | ComplexityLevel::VeryHigh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Low => "Low",
            ComplexityLevel::Medium => "Medium",
            ComplexityLevel::High => "High",
            ComplexityLevel::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffortLevel {
    Small,
    Medium,
    Large,
    #[serde(rename = "Extra Large")]
    ExtraLarge,
}

impl EffortLevel {
    pub fn from_hours(hours: u32) -> Self {
        match hours {
            h if h > 600 => EffortLevel::ExtraLarge,
            h if h > 400 => EffortLevel::Large,
            h if h > 200 => EffortLevel::Medium,
            _ => EffortLevel::Small,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffortLevel::Small => "Small",
            EffortLevel::Medium => "Medium",
            EffortLevel::Large => "Large",
            EffortLevel::ExtraLarge => "Extra Large",
        }
    }
}

impl fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub role: String,
    pub purpose: String,
    pub complexity: ComplexityLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub purpose: String,
    pub integration: String,
}

/// Conceptual integration/security gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpDescriptor {
    pub name: String,
    pub purpose: String,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityAnalysis {
    pub opportunity_score: u8,
    pub complexity_score: u32,
    pub complexity_level: ComplexityLevel,
    pub estimated_agents: u32,
    pub agent_details: Vec<AgentDescriptor>,
    pub tool_calling_required: bool,
    pub tool_details: Vec<ToolDescriptor>,
    pub mcp_servers_required: bool,
    pub mcp_details: Vec<McpDescriptor>,
    pub estimated_level_of_effort: EffortLevel,
    pub estimated_hours: u32,
    pub scope_of_work: String,
    pub estimated_cost_min: f64,
    pub estimated_cost_max: f64,
    pub key_technical_requirements: Vec<String>,
    pub risk_factors: Vec<String>,
    pub recommended_approach: String,
    pub timeline_estimate_weeks: u32,
}

// ============================================================================
// Scores
// ============================================================================

/// Weighted complexity score, starting at 30
pub fn complexity_score(deal: &DealSubmission) -> u32 {
    let mut score = BASE_COMPLEXITY;
    if deal.has_integrations() {
        score += 15;
    }
    if deal.has_complex_deployment() {
        score += 10;
    }
    if !deal.data_privacy_requirements.is_empty() {
        score += 15;
    }
    if deal.problem_statement.chars().count() > LONG_PROBLEM_CHARS {
        score += 10;
    }
    if deal.integration_count() > 3 {
        score += 10;
    }
    score
}

/// Commercial attractiveness, 65 to 95
pub fn opportunity_score(deal: &DealSubmission) -> u8 {
    let budget = if deal.is_high_budget() { 20 } else { 10 };
    let stage = if deal.deal_stage.as_ref().is_some_and(|s| s.is_competitive()) {
        15
    } else {
        5
    };
    let sponsor = if deal.has_sponsor() { 10 } else { 0 };
    (50 + budget + stage + sponsor).min(OPPORTUNITY_CAP)
}

pub fn estimated_hours(deal: &DealSubmission, agents: u32) -> u32 {
    agents * HOURS_PER_AGENT + deal.integration_count() as u32 * HOURS_PER_INTEGRATION
}

/// Person-weeks at two people, rounded up
pub fn timeline_weeks(hours: u32) -> u32 {
    hours.div_ceil(40 * 2)
}

// ============================================================================
// Roster
// ============================================================================

struct RosterSlot {
    min_agents: u32,
    name: &'static str,
    role: &'static str,
    purpose: fn(&DealSubmission) -> String,
    complexity: fn(&DealSubmission) -> ComplexityLevel,
}

fn orchestrator_purpose(_: &DealSubmission) -> String {
    "Manages the overall workflow, coordinates between different agents, and ensures proper task sequencing".to_string()
}

fn data_processing_purpose(_: &DealSubmission) -> String {
    "Handles data extraction, transformation, and loading operations. Ensures data quality and consistency".to_string()
}

fn integration_purpose(deal: &DealSubmission) -> String {
    let targets: Vec<&str> = deal.critical_integrations.iter().take(3).collect();
    let targets = if targets.is_empty() {
        "external systems".to_string()
    } else {
        targets.join(", ")
    };
    format!("Manages connections to {} and handles API communications", targets)
}

fn compliance_purpose(deal: &DealSubmission) -> String {
    let regimes = if deal.data_privacy_requirements.is_empty() {
        "regulatory".to_string()
    } else {
        deal.data_privacy_requirements.join(", ")
    };
    format!("Ensures {} compliance and monitors security protocols", regimes)
}

fn analytics_purpose(_: &DealSubmission) -> String {
    "Tracks KPIs, generates insights, and provides real-time performance metrics".to_string()
}

fn interface_purpose(_: &DealSubmission) -> String {
    "Handles user queries, provides conversational interface, and manages user sessions".to_string()
}

fn medium(_: &DealSubmission) -> ComplexityLevel {
    ComplexityLevel::Medium
}

fn high(_: &DealSubmission) -> ComplexityLevel {
    ComplexityLevel::High
}

fn data_processing_complexity(deal: &DealSubmission) -> ComplexityLevel {
    if deal.data_privacy_requirements.len() > 2 {
        ComplexityLevel::High
    } else {
        ComplexityLevel::Medium
    }
}

/// Agents unlocked by count, in roster order
const ROSTER: &[RosterSlot] = &[
    RosterSlot {
        min_agents: 0,
        name: "Orchestrator Agent",
        role: "Workflow Coordination",
        purpose: orchestrator_purpose,
        complexity: medium,
    },
    RosterSlot {
        min_agents: 0,
        name: "Data Processing Agent",
        role: "Data Analysis & Transformation",
        purpose: data_processing_purpose,
        complexity: data_processing_complexity,
    },
    RosterSlot {
        min_agents: 3,
        name: "Integration Agent",
        role: "External System Integration",
        purpose: integration_purpose,
        complexity: high,
    },
    RosterSlot {
        min_agents: 4,
        name: "Compliance Agent",
        role: "Regulatory Compliance & Security",
        purpose: compliance_purpose,
        complexity: high,
    },
    RosterSlot {
        min_agents: 5,
        name: "Analytics Agent",
        role: "Performance Monitoring & Insights",
        purpose: analytics_purpose,
        complexity: medium,
    },
    RosterSlot {
        min_agents: 6,
        name: "User Interface Agent",
        role: "User Interaction & Experience",
        purpose: interface_purpose,
        complexity: medium,
    },
];

/// Agent roster for `agents`. Orchestrator and Data Processing are always present.
pub fn agent_roster(deal: &DealSubmission, agents: u32) -> Vec<AgentDescriptor> {
    ROSTER
        .iter()
        .filter(|slot| agents >= slot.min_agents)
        .map(|slot| AgentDescriptor {
            name: slot.name.to_string(),
            role: slot.role.to_string(),
            purpose: (slot.purpose)(deal),
            complexity: (slot.complexity)(deal),
        })
        .collect()
}

// ============================================================================
// Tools and gateways
// ============================================================================

/// (integration word, tool name, purpose, integration method)
const TOOL_CATALOG: &[(&str, &str, &str, &str)] = &[
    (
        "Salesforce",
        "Salesforce CRM Tool",
        "Query and update Salesforce records, manage opportunities, contacts, and custom objects",
        "REST API via OAuth 2.0 with real-time event streaming",
    ),
    (
        "SharePoint",
        "SharePoint Document Management Tool",
        "Access, create, and manage SharePoint documents, lists, and metadata",
        "Microsoft Graph API with delegated permissions",
    ),
    (
        "Snowflake",
        "Snowflake Data Warehouse Tool",
        "Execute queries, retrieve analytics data, and perform data transformations",
        "Snowflake Connector with OAuth authentication",
    ),
    (
        "ServiceNow",
        "ServiceNow ITSM Tool",
        "Create, update, and query incidents, change requests, and service tickets",
        "ServiceNow REST API with table API access",
    ),
    (
        "Epic",
        "Epic EHR Integration Tool",
        "Access patient records, appointments, and clinical data with FHIR compliance",
        "Epic FHIR API with OAuth 2.0 authorization",
    ),
    (
        "SAP",
        "SAP ERP Tool",
        "Connect to SAP systems for financial data, inventory, and supply chain operations",
        "SAP OData API with OAuth/SAML authentication",
    ),
    (
        "Workday",
        "Workday HR Tool",
        "Access employee data, payroll information, and organizational hierarchies",
        "Workday REST API with ISU authentication",
    ),
    (
        "Jira",
        "Jira Project Management Tool",
        "Create, update, and track issues, projects, and workflows",
        "Jira REST API v3 with OAuth 2.0",
    ),
];

const GENERIC_TOOLS: &[(&str, &str, &str)] = &[
    (
        "Generic HTTP Client Tool",
        "Handle custom API calls to additional third-party services and legacy systems",
        "Configurable HTTP client supporting OAuth, API keys, and basic auth",
    ),
    (
        "Data Validation Tool",
        "Validate and sanitize data from all integrated sources before processing",
        "Schema validation with custom business rules engine",
    ),
];

/// Tools for the deal's integrations; empty when there are none
pub fn tool_details(deal: &DealSubmission) -> Vec<ToolDescriptor> {
    if !deal.has_integrations() {
        return Vec::new();
    }

    let recognized = TOOL_CATALOG
        .iter()
        .filter(|(word, ..)| deal.critical_integrations.contains_word(word))
        .map(|(_, name, purpose, integration)| (*name, *purpose, *integration));

    recognized
        .chain(GENERIC_TOOLS.iter().copied())
        .map(|(name, purpose, integration)| ToolDescriptor {
            name: name.to_string(),
            purpose: purpose.to_string(),
            integration: integration.to_string(),
        })
        .collect()
}

fn mcp(name: &str, purpose: &str, endpoints: &[&str]) -> McpDescriptor {
    McpDescriptor {
        name: name.to_string(),
        purpose: purpose.to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    }
}

/// Integration gateways; only generated for on-prem or customer-VPC deployments
pub fn mcp_details(deal: &DealSubmission) -> Vec<McpDescriptor> {
    if !deal.has_complex_deployment() {
        return Vec::new();
    }

    let mut servers = Vec::new();

    if deal.is_on_prem() || deal.has_privacy_tag("Confidential") {
        servers.push(mcp(
            "Secure Data Gateway MCP",
            "Provides secure access to on-premise data sources while maintaining data sovereignty and compliance",
            &[
                "/v1/data/query - Execute secure SQL queries with row-level security",
                "/v1/data/transform - Transform and enrich data within secure boundary",
                "/v1/audit/log - Track all data access for compliance reporting",
                "/v1/encryption/manage - Manage encryption keys and data masking rules",
            ],
        ));
    }

    if deal.integration_count() > 2 {
        servers.push(mcp(
            "Integration Hub MCP",
            "Centralized integration orchestration for multiple external systems with retry logic and error handling",
            &[
                "/v1/integrate/sync - Synchronize data across systems with conflict resolution",
                "/v1/integrate/webhook - Handle incoming webhooks with signature verification",
                "/v1/integrate/batch - Process bulk data transfers efficiently",
                "/v1/integrate/status - Monitor integration health and performance metrics",
                "/v1/integrate/retry - Manage failed requests with exponential backoff",
            ],
        ));
    }

    if deal.has_privacy_tag("PHI") || deal.has_privacy_tag("PCI") {
        servers.push(mcp(
            "Compliance & Security MCP",
            "Enforce HIPAA/PCI compliance rules, data encryption, and access controls",
            &[
                "/v1/compliance/validate - Validate requests against compliance rules",
                "/v1/security/encrypt - Encrypt sensitive data fields",
                "/v1/security/decrypt - Decrypt data with proper authorization",
                "/v1/audit/access - Log all PHI/PCI data access with timestamps",
                "/v1/compliance/report - Generate compliance audit reports",
            ],
        ));
    }

    if deal.is_customer_vpc() {
        servers.push(mcp(
            "VPC Network Gateway MCP",
            "Manages secure connectivity between platform services and customer VPC resources",
            &[
                "/v1/network/connect - Establish secure VPN/PrivateLink connections",
                "/v1/network/firewall - Configure VPC security groups and firewall rules",
                "/v1/network/dns - Resolve private DNS names within customer network",
                "/v1/network/monitor - Track network latency and connection health",
            ],
        ));
    }

    if deal.critical_integrations.contains_word("Snowflake") || deal.critical_integrations.contains_word("SAP") {
        servers.push(mcp(
            "Enterprise Data MCP",
            "Optimized data warehouse and ERP connectivity with connection pooling and caching",
            &[
                "/v1/warehouse/query - Execute optimized data warehouse queries",
                "/v1/warehouse/cache - Manage query result caching for performance",
                "/v1/erp/transaction - Handle transactional ERP operations",
                "/v1/data/lineage - Track data lineage and transformation history",
            ],
        ));
    }

    // Observability only makes sense next to another gateway
    if !servers.is_empty() {
        servers.push(mcp(
            "Observability & Monitoring MCP",
            "Centralized logging, metrics, and tracing for all MCP operations",
            &[
                "/v1/metrics/collect - Collect performance and usage metrics",
                "/v1/logs/stream - Stream real-time logs to observability platform",
                "/v1/trace/context - Distributed tracing across all MCP servers",
                "/v1/alerts/trigger - Trigger alerts based on configurable thresholds",
            ],
        ));
    }

    servers
}

// ============================================================================
// Narrative
// ============================================================================

fn join_or(tags: &TagSet, sep: &str, fallback: &str) -> String {
    if tags.is_empty() {
        fallback.to_string()
    } else {
        tags.join(sep)
    }
}

pub fn scope_of_work(deal: &DealSubmission, agents: u32, hours: u32) -> String {
    let agent_weeks = hours.div_ceil(40 * 3);
    let integration_weeks = deal.integration_count() * 2;

    format!(
        "Project Scope Summary:

1. Initial Discovery & Requirements (2 weeks)
   - Stakeholder interviews and requirements gathering
   - Technical architecture design
   - Data flow mapping and integration planning

2. AI Agent Development ({agent_weeks} weeks)
   - Development of {agents} specialized AI agents
   - Agent training and fine-tuning
   - Inter-agent communication protocols

3. Integration Development ({integration_weeks} weeks)
   - Integration with {integrations}
   - API development and testing
   - Data synchronization mechanisms

4. Security & Compliance (3 weeks)
   - Implementation of {controls} controls
   - Compliance validation and documentation
   - Security testing and vulnerability assessment

5. Testing & QA (3 weeks)
   - Unit testing of individual agents
   - Integration testing
   - User acceptance testing
   - Performance optimization

6. Deployment & Training (2 weeks)
   - {deployment} deployment
   - User training and documentation
   - Knowledge transfer

7. Post-Launch Support (4 weeks)
   - Monitoring and optimization
   - Bug fixes and enhancements
   - Performance tuning",
        integrations = join_or(&deal.critical_integrations, ", ", "external systems"),
        controls = join_or(&deal.data_privacy_requirements, ", ", "security"),
        deployment = join_or(&deal.deployment_preference, " or ", "Production"),
    )
}

pub fn technical_requirements(deal: &DealSubmission) -> Vec<String> {
    let mut reqs = vec![
        "Cloud infrastructure with auto-scaling capabilities".to_string(),
        "Secure API gateway for external integrations".to_string(),
    ];

    if deal.has_privacy_tag("PHI") || deal.has_privacy_tag("PCI") {
        reqs.push("HIPAA/PCI DSS compliant infrastructure".to_string());
        reqs.push("End-to-end encryption for data in transit and at rest".to_string());
    }
    if deal.is_on_prem() {
        reqs.push("On-premise deployment capability with containerization".to_string());
    }
    if deal.has_integrations() {
        reqs.push(format!(
            "Integration capabilities for {} external systems",
            deal.integration_count()
        ));
    }

    reqs.push("Real-time monitoring and logging infrastructure".to_string());
    reqs.push("Backup and disaster recovery mechanisms".to_string());
    reqs.push("Multi-tenant architecture with data isolation".to_string());
    reqs
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp
fn parse_target_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Less than six 30-day months between `today` and the target date.
/// Past targets are tight; unreadable dates are not.
pub fn is_tight_timeline(deal: &DealSubmission, today: NaiveDate) -> bool {
    match parse_target_date(&deal.target_production_date) {
        Some(target) => ((target - today).num_days() as f64 / 30.0) < TIGHT_TIMELINE_MONTHS,
        None => false,
    }
}

pub fn risk_factors(deal: &DealSubmission, today: NaiveDate) -> Vec<String> {
    let checks = [
        (
            is_tight_timeline(deal, today),
            "Aggressive timeline may require additional resources or scope reduction",
        ),
        (
            deal.integration_count() > 3,
            "Multiple integrations increase complexity and potential points of failure",
        ),
        (
            deal.is_on_prem(),
            "On-premise deployment may require additional security reviews and infrastructure setup time",
        ),
        (
            !deal.has_sponsor(),
            "Lack of executive sponsorship may impact project prioritization and resource allocation",
        ),
        (
            deal.data_privacy_requirements.len() > 2,
            "Multiple compliance requirements may extend validation and certification timeline",
        ),
        (
            deal.has_competitors(),
            "Competitive landscape requires differentiated features and accelerated delivery",
        ),
    ];

    checks
        .into_iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, risk)| risk.to_string())
        .collect()
}

const RAPID_APPROACH: &str = "Recommended Approach: Agile Rapid Prototyping

Phase 1 (Week 1): Build minimal viable prototype focusing on core use case
- Demonstrate key AI agent capabilities
- Mock integrations with sample data
- Gather stakeholder feedback

Phase 2 (Weeks 2-4): Iterative development with 2-week sprints
- Implement real integrations
- Expand agent capabilities
- Continuous user feedback and refinement

Phase 3: Production hardening and deployment
- Security and compliance validation
- Performance optimization
- Production deployment and monitoring";

const PILOT_APPROACH: &str = "Recommended Approach: Phased Pilot Implementation

Phase 1 (Month 1): Foundation
- Complete technical architecture
- Build core AI agents
- Set up development environment

Phase 2 (Month 2): Integration & Testing
- Implement all required integrations
- End-to-end testing
- Security validation

Phase 3 (Month 3): Pilot Deployment
- Deploy to pilot user group
- Gather metrics and feedback
- Optimize based on real usage

Phase 4: Scale & Production
- Full production rollout
- Ongoing support and enhancement";

const HIGH_COMPLEXITY_ADVICE: &str = "\n\nGiven the high complexity, we recommend:
- Dedicated technical architect
- Weekly stakeholder reviews
- Incremental delivery of features
- Comprehensive documentation and knowledge transfer";

/// Pilot is the default when no path was chosen
pub fn recommended_approach(deal: &DealSubmission, complexity: ComplexityLevel) -> String {
    let mut approach = if deal.is_rapid_prototype() {
        RAPID_APPROACH.to_string()
    } else {
        PILOT_APPROACH.to_string()
    };
    if complexity.is_high() {
        approach.push_str(HIGH_COMPLEXITY_ADVICE);
    }
    approach
}

// ============================================================================
// Entry points
// ============================================================================

/// Analyze a deal against today's local date
pub fn generate_opportunity_analysis(deal: &DealSubmission) -> OpportunityAnalysis {
    generate_opportunity_analysis_at(deal, chrono::Local::now().date_naive())
}

/// Analyze a deal against a fixed reference date
pub fn generate_opportunity_analysis_at(deal: &DealSubmission, today: NaiveDate) -> OpportunityAnalysis {
    let complexity_score = complexity_score(deal);
    let complexity_level = ComplexityLevel::from_score(complexity_score);
    let agents = complexity_level.agent_count();
    let hours = estimated_hours(deal, agents);
    let cost = f64::from(hours) * HOURLY_RATE;

    let tool_details = tool_details(deal);
    let mcp_details = mcp_details(deal);

    tracing::debug!(
        complexity_score,
        complexity = %complexity_level,
        agents,
        hours,
        "opportunity analysed"
    );

    OpportunityAnalysis {
        opportunity_score: opportunity_score(deal),
        complexity_score,
        complexity_level,
        estimated_agents: agents,
        agent_details: agent_roster(deal, agents),
        tool_calling_required: deal.has_integrations(),
        tool_details,
        mcp_servers_required: deal.has_complex_deployment(),
        mcp_details,
        estimated_level_of_effort: EffortLevel::from_hours(hours),
        estimated_hours: hours,
        scope_of_work: scope_of_work(deal, agents, hours),
        estimated_cost_min: cost * 0.8,
        estimated_cost_max: cost * 1.2,
        key_technical_requirements: technical_requirements(deal),
        risk_factors: risk_factors(deal, today),
        recommended_approach: recommended_approach(deal, complexity_level),
        timeline_estimate_weeks: timeline_weeks(hours),
    }
}
