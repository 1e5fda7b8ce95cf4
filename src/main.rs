use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use dealscope::deal::ValidationErrors;
use dealscope::db::DbError;
use dealscope::pricing::PricingError;
use dealscope::scenario::{
    demo_scenarios, estimate_credits, find_demo_scenario, format_credits, format_currency, EstimateError,
    ScenarioCalculation, ScenarioEstimate, ScenarioRequest,
};
use dealscope::serve::{start_api_server, Api, SimulatedLatency};
use dealscope::store::{DealStore, StoreError};
use dealscope::{Config, Database, DealReport, DealStage, DealSubmission, PricingTable};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dealscope")]
#[command(author, version, about = "Score automation deals and forecast their credits")]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a deal from a JSON file without storing it
    Analyze {
        /// Path to a deal JSON file
        file: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Reference date for timeline risk (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Estimate monthly credits for a scenario
    Estimate {
        /// Built-in scenario name or number (see `dealscope scenarios`)
        #[arg(short, long)]
        scenario: Option<String>,

        /// Unit of work for a custom workflow (e.g. "ticket")
        #[arg(short, long)]
        unit: Option<String>,

        /// Units per 30 days
        #[arg(long)]
        volume: Option<u32>,

        /// Include one-time agent (and KB) creation
        #[arg(long)]
        setup: bool,

        /// Knowledge-base tokens to ingest
        #[arg(long, default_value = "0")]
        kb_tokens: u64,

        /// Knowledge-base storage in GB-months
        #[arg(long)]
        kb_storage_gb: Option<f64>,

        #[arg(long)]
        json: bool,
    },

    /// List built-in scenarios
    Scenarios,

    /// Show or edit credit pricing
    Pricing {
        #[command(subcommand)]
        action: PricingAction,
    },

    /// Manage stored deal submissions
    Deals {
        #[command(subcommand)]
        action: DealsAction,
    },

    /// Start the HTTP JSON API
    Serve {
        /// Port to listen on (default: config, then 3001)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum PricingAction {
    /// Show the current rate table
    List,
    /// Change one rate
    Set {
        /// Machine key, e.g. call.tool.web_fetch
        key: String,
        /// Credits per unit
        #[arg(allow_hyphen_values = true)]
        price: String,
    },
    /// Restore the built-in rates
    Reset,
}

#[derive(Subcommand, Debug)]
enum DealsAction {
    /// Validate and store a deal from a JSON file
    Add { file: PathBuf },
    /// List stored deals
    List {
        /// Only deals at this stage (e.g. RFP, Shortlist)
        #[arg(long)]
        stage: Option<DealStage>,
    },
    /// Show a stored deal as JSON
    Show { id: String },
    /// Analyze a stored deal
    Analyze {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored deal
    Delete { id: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error("Deal is not valid: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("Server error: {0}")]
    Server(std::io::Error),
}

type Result<T> = std::result::Result<T, CliError>;

fn main() {
    let cli = Cli::parse();
    let config = Config::load();
    init_logging(&config, cli.verbose);

    if let Err(e) = run(cli.command, &config) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// RUST_LOG wins, then the config level; -v forces debug
fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Analyze { file, json, today } => {
            let deal = read_deal(&file)?;
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let report = DealReport::build(&deal, today);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report, config);
            }
        }

        Command::Estimate {
            scenario,
            unit,
            volume,
            setup,
            kb_tokens,
            kb_storage_gb,
            json,
        } => {
            let mut request = match scenario {
                Some(name) => find_demo_scenario(&name)
                    .map(|demo| demo.request())
                    .ok_or_else(|| {
                        let names: Vec<&str> = demo_scenarios().iter().map(|s| s.name).collect();
                        CliError::Usage(format!(
                            "Unknown scenario '{}'. Built-in scenarios: {}",
                            name,
                            names.join(", ")
                        ))
                    })?,
                None => ScenarioRequest::custom(
                    "Custom Workflow",
                    unit.clone().unwrap_or_else(|| "task".to_string()),
                    volume.unwrap_or(100),
                ),
            };
            if let Some(unit) = unit {
                request.unit = unit;
            }
            if let Some(volume) = volume {
                request.units_per_30d = volume;
            }
            request.setup.include_setup = setup;
            request.setup.kb_ingestion_tokens = kb_tokens;
            request.setup.kb_storage_gb_month = kb_storage_gb;

            let db = Database::open()?;
            let rates = PricingTable::new(&db).rate_card()?;
            let estimate = estimate_credits(&rates, &request)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            } else {
                print_estimate(&estimate, config);
            }
        }

        Command::Scenarios => {
            for (i, demo) in demo_scenarios().iter().enumerate() {
                println!(
                    "{}. {} ({} per {}, {}/month)",
                    i + 1,
                    demo.name.bold(),
                    demo.description,
                    demo.unit,
                    demo.units_per_month
                );
                println!("     light: {}", demo.light.describe());
                println!("     heavy: {}", demo.heavy.describe());
            }
        }

        Command::Pricing { action } => {
            let db = Database::open()?;
            let table = PricingTable::new(&db);
            match action {
                PricingAction::List => {
                    for item in table.all_rates()? {
                        let lock = if item.editable { "" } else { " (locked)" };
                        println!(
                            "{:<28} {:<22} {:>8} {}{}",
                            item.category,
                            item.key.cyan(),
                            item.price,
                            item.unit.dimmed(),
                            lock
                        );
                    }
                }
                PricingAction::Set { key, price } => {
                    let item = table.set_rate_str(&key, &price)?;
                    println!("{} {} = {} {}", "Updated".green(), item.key, item.price, item.unit);
                }
                PricingAction::Reset => {
                    let items = table.reset_to_defaults()?;
                    println!("{} {} rates to defaults", "Reset".green(), items.len());
                }
            }
        }

        Command::Deals { action } => run_deals(action, config)?,

        Command::Serve { port } => {
            let db = Database::open()?;
            let port = port.unwrap_or(config.serve.port);
            let latency = SimulatedLatency::new(Duration::from_millis(config.serve.analysis_delay_ms));
            start_api_server(Api::new(db, latency), port).map_err(CliError::Server)?;
        }

        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dealscope", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn run_deals(action: DealsAction, config: &Config) -> Result<()> {
    let db = Database::open()?;
    match action {
        DealsAction::Add { file } => {
            let deal = read_deal(&file)?;
            deal.validate()?;
            let saved = db.save_deal(deal)?;
            println!(
                "{} {} ({})",
                "Saved".green(),
                saved.id.as_deref().unwrap_or_default(),
                saved.display_name()
            );
        }
        DealsAction::List { stage } => {
            let deals = match stage {
                Some(stage) => db.deals_in_stage(stage)?,
                None => db.all_deals()?,
            };
            if deals.is_empty() {
                println!("No deals.");
            }
            for deal in &deals {
                println!(
                    "{}  {:<30} {:<16} {}",
                    deal.id.as_deref().unwrap_or_default().cyan(),
                    deal.display_name(),
                    deal.deal_stage.as_ref().map(|s| s.as_str()).unwrap_or("-"),
                    deal.created_at.as_deref().unwrap_or_default().dimmed()
                );
            }
        }
        DealsAction::Show { id } => {
            let deal = find_deal(&db, &id)?;
            println!("{}", serde_json::to_string_pretty(&deal)?);
        }
        DealsAction::Analyze { id, json } => {
            let deal = find_deal(&db, &id)?;
            let report = DealReport::build_now(&deal);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report, config);
            }
        }
        DealsAction::Delete { id } => {
            if !db.delete_deal(&id)? {
                return Err(CliError::Usage(format!("Deal '{}' not found", id)));
            }
            println!("{} {}", "Deleted".green(), id);
        }
    }
    Ok(())
}

fn read_deal(path: &Path) -> Result<DealSubmission> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

fn find_deal(db: &Database, id: &str) -> Result<DealSubmission> {
    db.deal_by_id(id)?
        .ok_or_else(|| CliError::Usage(format!("Deal '{}' not found", id)))
}

fn heading(title: &str) {
    println!("\n{}", title.cyan().bold());
}

fn print_report(report: &DealReport, config: &Config) {
    let a = &report.analysis;

    println!("{}", format!("Opportunity analysis: {}", report.display_name).bold());
    println!("   Opportunity score: {}/100", a.opportunity_score);
    println!(
        "   Complexity:        {} (score {})",
        a.complexity_level, a.complexity_score
    );
    println!("   Agents:            {}", a.estimated_agents);
    println!(
        "   Effort:            {} ({} hours)",
        a.estimated_level_of_effort, a.estimated_hours
    );
    println!(
        "   Cost range:        {} - {}",
        format_currency(a.estimated_cost_min, &config.display.currency_symbol),
        format_currency(a.estimated_cost_max, &config.display.currency_symbol)
    );
    println!("   Timeline:          {} weeks", a.timeline_estimate_weeks);

    heading("Agents");
    for agent in &a.agent_details {
        println!("   {} [{}] {}", agent.name.bold(), agent.complexity, agent.role);
        println!("      {}", agent.purpose.dimmed());
    }

    if a.tool_calling_required {
        heading("Tools");
        for tool in &a.tool_details {
            println!("   {} - {}", tool.name.bold(), tool.integration);
        }
    }

    if a.mcp_servers_required && !a.mcp_details.is_empty() {
        heading("Integration gateways");
        for server in &a.mcp_details {
            println!("   {}", server.name.bold());
            for endpoint in &server.endpoints {
                println!("      {}", endpoint.dimmed());
            }
        }
    }

    heading("Credit forecast");
    let c = &report.credits;
    println!("   Prototype:          {} credits", c.breakdown.prototype_phase);
    println!("   Pilot:              {} credits", c.breakdown.pilot_phase);
    println!("   Production/month:   {} credits", c.breakdown.production_monthly);
    println!("   Total:              {} credits", c.total_credits.to_string().bold());

    heading(&format!("Timeline ({} weeks)", report.timeline.total_weeks));
    for phase in &report.timeline.phases {
        println!("   {:<24} {:>2} wk  {}", phase.name, phase.weeks, phase.description.dimmed());
    }

    heading("Responsible AI");
    for control in &report.responsible_ai.required {
        println!("   {} {}", "required".red(), control);
    }
    for control in &report.responsible_ai.recommended {
        println!("   {} {}", "recommended".yellow(), control);
    }

    heading("Technical requirements");
    for req in &a.key_technical_requirements {
        println!("   - {}", req);
    }

    if !a.risk_factors.is_empty() {
        heading("Risks");
        for risk in &a.risk_factors {
            println!("   {} {}", "!".yellow().bold(), risk);
        }
    }

    heading("Recommended approach");
    println!("{}", a.recommended_approach);
}

fn print_profile(label: &str, calc: &ScenarioCalculation, unit: &str, config: &Config) {
    println!(
        "   {:<6} {} credits per {} ({}), {} credits / 30 days ({})",
        label.bold(),
        format_credits(calc.per_unit_total),
        unit,
        config.format_money(calc.per_unit_total),
        format_credits(calc.monthly_total_30d),
        config.format_money(calc.monthly_total_30d)
    );
    for line in &calc.breakdown {
        println!(
            "          {:<26} {:>8} x {:<10} = {}",
            line.resource,
            line.units,
            line.rate,
            format_credits(line.credits)
        );
    }
}

fn print_estimate(estimate: &ScenarioEstimate, config: &Config) {
    println!(
        "{} ({} {}s per 30 days)",
        estimate.scenario.bold(),
        estimate.units_per_30d,
        estimate.unit
    );
    print_profile("light", &estimate.light, &estimate.unit, config);
    print_profile("heavy", &estimate.heavy, &estimate.unit, config);

    let setup = &estimate.setup;
    if setup.setup_total > 0.0 {
        heading("Setup");
        for item in &setup.items {
            println!("   {:<26} {}", item.item, format_credits(item.credits));
        }
        if setup.kb_ingestion_tokens > 0 {
            println!(
                "   {:<26} {}",
                format!("KB ingestion ({} tokens)", setup.kb_ingestion_tokens),
                format_credits(setup.kb_ingestion_credits)
            );
        }
        if let Some(storage) = setup.kb_storage_credits {
            println!("   {:<26} {}", "KB storage (per month)", format_credits(storage));
        }
        println!("   {:<26} {}", "Total".bold(), format_credits(setup.setup_total));
    }

    if estimate.flags.tokens_soft_limit_per_unit {
        println!("{} token volume per unit is above the soft limit", "warning:".yellow().bold());
    }
    if estimate.flags.call_count_soft_limit_per_unit {
        println!("{} call count per unit is above the soft limit", "warning:".yellow().bold());
    }
    println!("\n{}", estimate.notes.dimmed());
}
