//! Console output: progress lines, status tables, plans and run summaries.

use folio_schema::executor::ProgressSink;
use folio_schema::operation::{Operation, OperationStatus};
use folio_schema::pipeline::{CollectionStatus, Presence};
use folio_schema::report::RunReport;

use crate::error::CliResult;

/// Prints one line per attempted operation.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn operation_finished(&self, operation: &Operation) {
        println!("{}", progress_line(operation));
    }
}

fn status_tag(status: &OperationStatus) -> &'static str {
    match status {
        OperationStatus::Pending => "[pending]",
        OperationStatus::Applied => "[applied]",
        OperationStatus::AlreadyExists => "[exists]",
        OperationStatus::Failed(_) => "[FAILED]",
    }
}

pub fn progress_line(operation: &Operation) -> String {
    let mut line = format!("{:<10} {operation}", status_tag(&operation.status));
    if let Some(cause) = operation.status.cause() {
        line.push_str(" - ");
        line.push_str(cause);
    }
    line
}

pub fn print_statuses(statuses: &[CollectionStatus], json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }

    let width = statuses.iter().map(|s| s.name.len()).max().unwrap_or(4).max(4);
    println!("{:<width$}  {:<20}  STATUS", "NAME", "ID");
    for status in statuses {
        let marker = match status.presence {
            Presence::Present => "present",
            Presence::Missing => "MISSING",
        };
        println!("{:<width$}  {:<20}  {marker}", status.name, status.id);
    }
    Ok(())
}

pub fn print_plan(operations: &[Operation], json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(operations)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("Schema is up to date. Nothing to apply.");
        return Ok(());
    }
    println!("{} operation(s) would be applied:", operations.len());
    for operation in operations {
        println!("  {operation}");
    }
    Ok(())
}

pub fn print_report(report: &RunReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!();
        println!("{report}");
    }
    Ok(())
}
