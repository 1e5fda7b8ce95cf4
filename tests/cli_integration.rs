//! Integration tests for the dealscope CLI
//!
//! These tests exercise the full CLI workflow using a temporary database.
//! They verify that commands work end-to-end without mocking.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Helper to run dealscope with a specific database path, from inside `dir`
fn run_dealscope(args: &[&str], dir: &Path, db_path: &PathBuf) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_dealscope"))
        .args(args)
        .current_dir(dir)
        .env("DEALSCOPE_DB_PATH", db_path)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute dealscope")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

struct Workspace {
    dir: TempDir,
    db: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("test.db");
        Self { dir, db }
    }

    fn run(&self, args: &[&str]) -> std::process::Output {
        run_dealscope(args, self.dir.path(), &self.db)
    }

    fn write(&self, name: &str, contents: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().to_string()
    }
}

const DEAL_JSON: &str = r#"{
    "requestor_name": "Ada Lovelace",
    "requestor_email": "ada@example.com",
    "company": "Acme Corp",
    "problem_statement": "Automate invoice triage",
    "expected_outcomes": "Faster approvals",
    "target_production_date": "2030-01-01",
    "critical_integrations": ["SAP", "Slack"],
    "deal_stage": "RFP"
}"#;

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let ws = Workspace::new();
    let output = ws.run(&["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("dealscope"));
    assert!(out.contains("estimate"));
}

#[test]
fn test_version_command() {
    let ws = Workspace::new();
    let output = ws.run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("dealscope"));
}

#[test]
fn test_completion_zsh() {
    let ws = Workspace::new();
    let output = ws.run(&["completion", "zsh"]);
    assert!(output.status.success(), "completion zsh failed: {}", stderr(&output));
    assert!(stdout(&output).contains("#compdef dealscope"));
}

// =============================================================================
// Analyze Tests
// =============================================================================

#[test]
fn test_analyze_json_report() {
    let ws = Workspace::new();
    let file = ws.write("deal.json", DEAL_JSON);
    let output = ws.run(&["analyze", &file, "--json", "--today", "2029-01-01"]);
    assert!(output.status.success(), "analyze failed: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["display_name"], "Acme Corp");
    let score = report["analysis"]["opportunity_score"].as_u64().unwrap();
    assert!((65..=95).contains(&score));
    assert!(report["analysis"]["tool_calling_required"].as_bool().unwrap());
    assert!(report["timeline"]["total_weeks"].as_u64().unwrap() > 0);
}

#[test]
fn test_analyze_text_output() {
    let ws = Workspace::new();
    let file = ws.write("deal.json", DEAL_JSON);
    let output = ws.run(&["analyze", &file]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Acme Corp"));
    assert!(out.contains("Credit forecast"));
}

#[test]
fn test_analyze_missing_file_fails() {
    let ws = Workspace::new();
    let output = ws.run(&["analyze", "does-not-exist.json"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Cannot read"));
}

// =============================================================================
// Estimate Tests
// =============================================================================

#[test]
fn test_estimate_builtin_scenario_json() {
    let ws = Workspace::new();
    let output = ws.run(&["estimate", "--scenario", "Blog Post Writer", "--json"]);
    assert!(output.status.success(), "estimate failed: {}", stderr(&output));

    let estimate: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(estimate["unit"], "post");
    assert_eq!(estimate["units_per_30d"], 20);
    // 2 web fetches at 0.1 plus 10k chatter tokens at 1 per 1M
    let per_unit = estimate["light"]["per_unit_total"].as_f64().unwrap();
    assert!((per_unit - 0.21).abs() < 1e-9, "per unit was {}", per_unit);
}

#[test]
fn test_estimate_volume_override() {
    let ws = Workspace::new();
    let output = ws.run(&["estimate", "--scenario", "1", "--volume", "40", "--json"]);
    assert!(output.status.success());
    let estimate: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(estimate["units_per_30d"], 40);
}

#[test]
fn test_estimate_unknown_scenario_fails() {
    let ws = Workspace::new();
    let output = ws.run(&["estimate", "--scenario", "Nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown scenario"));
}

#[test]
fn test_estimate_uses_edited_rates() {
    let ws = Workspace::new();
    assert!(ws.run(&["pricing", "set", "call.tool.web_fetch", "1"]).status.success());

    let output = ws.run(&["estimate", "--scenario", "Blog Post Writer", "--json"]);
    let estimate: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let per_unit = estimate["light"]["per_unit_total"].as_f64().unwrap();
    assert!((per_unit - 2.01).abs() < 1e-9, "per unit was {}", per_unit);
}

#[test]
fn test_scenarios_lists_builtins() {
    let ws = Workspace::new();
    let output = ws.run(&["scenarios"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Blog Post Writer"));
    assert!(out.contains("Research Digest"));
    assert!(out.contains("Media Plan Session"));
}

// =============================================================================
// Pricing Tests
// =============================================================================

#[test]
fn test_pricing_set_and_reset() {
    let ws = Workspace::new();

    let output = ws.run(&["pricing", "list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("call.kb.retrieve"));

    let output = ws.run(&["pricing", "set", "call.kb.retrieve", "0.5"]);
    assert!(output.status.success(), "set failed: {}", stderr(&output));
    assert!(stdout(&output).contains("0.5"));

    let output = ws.run(&["pricing", "reset"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("13"));
}

#[test]
fn test_pricing_rejects_negative() {
    let ws = Workspace::new();
    let output = ws.run(&["pricing", "set", "call.kb.retrieve", "-1"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("valid non-negative number"));
}

// =============================================================================
// Deal Pipeline Tests
// =============================================================================

fn saved_id(output: &std::process::Output) -> String {
    stdout(output)
        .split_whitespace()
        .find(|w| w.starts_with("deal_"))
        .expect("saved deal id in output")
        .to_string()
}

#[test]
fn test_deal_lifecycle() {
    let ws = Workspace::new();
    let file = ws.write("deal.json", DEAL_JSON);

    let output = ws.run(&["deals", "add", &file]);
    assert!(output.status.success(), "add failed: {}", stderr(&output));
    let id = saved_id(&output);

    let output = ws.run(&["deals", "list"]);
    assert!(stdout(&output).contains(&id));

    let output = ws.run(&["deals", "list", "--stage", "rfp"]);
    assert!(stdout(&output).contains(&id));
    let output = ws.run(&["deals", "list", "--stage", "Shortlist"]);
    assert!(!stdout(&output).contains(&id));

    let output = ws.run(&["deals", "show", &id]);
    let shown: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(shown["company"], "Acme Corp");

    let output = ws.run(&["deals", "analyze", &id, "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["deal_id"], id.as_str());

    assert!(ws.run(&["deals", "delete", &id]).status.success());
    let output = ws.run(&["deals", "delete", &id]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

#[test]
fn test_deals_add_rejects_invalid() {
    let ws = Workspace::new();
    let file = ws.write("bad.json", r#"{"requestor_name": "Ada", "requestor_email": "nope"}"#);
    let output = ws.run(&["deals", "add", &file]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not valid"));

    let output = ws.run(&["deals", "list"]);
    assert!(stdout(&output).contains("No deals."));
}

#[test]
fn test_deals_unknown_stage_fails() {
    let ws = Workspace::new();
    let output = ws.run(&["deals", "list", "--stage", "Won"]);
    assert!(!output.status.success());
}
