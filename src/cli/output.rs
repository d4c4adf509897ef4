//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans,
//! execution results, and validation output in text or JSON form.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::graph::{DeploymentPlan, ExecutionResult, ResourceStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
}

/// Execution report row for table display.
#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// JSON view of a deployment plan.
#[derive(Serialize)]
struct PlanJson {
    fingerprint: String,
    resources: Vec<PlanResourceJson>,
}

/// JSON view of one planned resource.
#[derive(Serialize)]
struct PlanResourceJson {
    name: String,
    kind: String,
    depends_on: Vec<String>,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&Self::plan_json(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    fn plan_json(plan: &DeploymentPlan) -> PlanJson {
        PlanJson {
            fingerprint: plan.fingerprint.clone(),
            resources: plan
                .order()
                .iter()
                .map(|id| {
                    let node = plan.node(*id);
                    PlanResourceJson {
                        name: node.name.clone(),
                        kind: node.kind.to_string(),
                        depends_on: node
                            .depends_on
                            .iter()
                            .map(|dep| plan.node(*dep).name.clone())
                            .collect(),
                    }
                })
                .collect(),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &DeploymentPlan, detailed: bool) -> String {
        if plan.is_empty() {
            return format!("{} Nothing to deploy - the plan is empty.\n", "✓".green());
        }

        let mut output = String::new();
        let _ = writeln!(output, "\nDeployment plan");
        let _ = writeln!(output, "   Fingerprint: {}\n", &plan.fingerprint[..8]);

        let rows: Vec<PlanRow> = plan
            .order()
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let node = plan.node(*id);
                let depends_on = if node.depends_on.is_empty() {
                    String::from("-")
                } else {
                    node.depends_on
                        .iter()
                        .map(|dep| plan.node(*dep).name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                PlanRow {
                    position: i + 1,
                    resource: node.name.clone(),
                    kind: node.kind.to_string(),
                    depends_on,
                }
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = writeln!(
            output,
            "\nPlan: {} resources to create",
            plan.len().to_string().green()
        );

        if detailed {
            let _ = writeln!(output, "\nProperty bindings:");
            for id in plan.order() {
                let node = plan.node(*id);
                let _ = writeln!(output, "  {} '{}':", node.kind, node.name);
                for (key, property) in &node.properties {
                    let _ = writeln!(output, "    {key} = {}", property.fingerprint());
                }
            }
        }

        output
    }

    /// Formats an execution result for display.
    #[must_use]
    pub fn format_execution(&self, result: &ExecutionResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => Self::format_execution_text(result),
        }
    }

    /// Formats an execution result as text.
    fn format_execution_text(result: &ExecutionResult) -> String {
        let mut output = String::new();

        let rows: Vec<ReportRow> = result
            .reports
            .iter()
            .map(|report| {
                let detail = report
                    .error
                    .as_deref()
                    .map(|error| Self::truncate(error, 48))
                    .or_else(|| report.remote_id.clone())
                    .unwrap_or_else(|| String::from("-"));
                ReportRow {
                    resource: report.name.clone(),
                    kind: report.kind.to_string(),
                    status: Self::format_status(report.status),
                    detail,
                }
            })
            .collect();

        output.push('\n');
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = writeln!(
            output,
            "\n{}: {} succeeded, {} failed, {} skipped, {} unchanged",
            if result.success {
                "Done".green().to_string()
            } else {
                "Completed with errors".red().to_string()
            },
            result.succeeded,
            result.failed,
            result.skipped,
            result.unchanged
        );

        if !result.exports.is_empty() {
            let _ = writeln!(output, "\nOutputs:");
            for (name, value) in &result.exports {
                let _ = writeln!(output, "  {} = {value}", name.bold());
            }
        }

        for unresolved in &result.unresolved_exports {
            let _ = writeln!(
                output,
                "  {} {} could not be resolved: {}",
                "⚠".yellow(),
                unresolved.name,
                unresolved.reason
            );
        }

        output
    }

    /// Formats a validation result for display.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        let mut output = String::new();

        if result.is_valid() {
            let _ = writeln!(output, "{} Stack configuration is valid.", "✓".green());
        } else {
            let _ = writeln!(output, "{} Stack configuration has errors:", "✗".red());
            for error in &result.errors {
                let _ = writeln!(output, "  - {error}");
            }
        }

        if show_warnings && !result.warnings.is_empty() {
            let _ = writeln!(output, "\nWarnings:");
            for warning in &result.warnings {
                let _ = writeln!(output, "  - {warning}");
            }
        }

        output
    }

    /// Colors a resource status for text display.
    fn format_status(status: ResourceStatus) -> String {
        match status {
            ResourceStatus::Succeeded => "succeeded".green().to_string(),
            ResourceStatus::Failed => "failed".red().to_string(),
            ResourceStatus::Skipped => "skipped".yellow().to_string(),
            ResourceStatus::Unchanged => "unchanged".dimmed().to_string(),
        }
    }

    /// Truncates a string for table display.
    fn truncate(text: &str, max_len: usize) -> String {
        if text.len() <= max_len {
            text.to_string()
        } else {
            format!("{}...", &text[..max_len.saturating_sub(3)])
        }
    }
}
