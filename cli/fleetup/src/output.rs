//! Output formatting for run summaries and dry-run plans.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use fleetup_orchestrator::ledger::{EntryStatus, LedgerEntry};
use fleetup_orchestrator::{BootstrapPlan, BootstrapReport};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

#[derive(Debug, Tabled)]
struct PhaseRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Readiness")]
    readiness: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&LedgerEntry> for PhaseRow {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            phase: entry.phase.to_string(),
            service: entry.service.clone().unwrap_or_else(|| "-".to_string()),
            status: match entry.status {
                EntryStatus::InProgress => "in progress",
                EntryStatus::Completed => "completed",
                EntryStatus::Failed => "failed",
            },
            readiness: entry
                .readiness
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            detail: entry.detail.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Tabled)]
struct StepRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Readiness")]
    readiness: String,
}

/// Print the summary of a completed run.
pub fn print_report(report: &BootstrapReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<PhaseRow> = report.ledger.entries().iter().map(PhaseRow::from).collect();
            println!("{}", Table::new(rows));

            let elapsed = report.completed_at - report.started_at;
            print_success(&format!(
                "project {} bootstrapped with {} in {:.1}s (run {})",
                report.project,
                report.topology,
                elapsed.num_milliseconds() as f64 / 1000.0,
                report.run_id
            ));
        }
        OutputFormat::Json => print_json(report)?,
    }
    Ok(())
}

/// Print a dry-run plan.
pub fn print_plan(plan: &BootstrapPlan, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            print_info(&format!(
                "dry run for project {}: {} (no platform commands issued)",
                plan.project, plan.topology
            ));
            let rows: Vec<StepRow> = plan
                .steps
                .iter()
                .map(|step| StepRow {
                    phase: step.phase.to_string(),
                    action: step.action.clone(),
                    readiness: step.readiness.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Json => print_json(plan)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}
