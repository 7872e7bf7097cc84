//! Subcommand handlers over a live automation.
//!
//! Each handler returns the text meant for stdout; notices go through the
//! automation's UI sink (stderr) as they happen.

use std::future::Future;

use listsweep::filter;
use listsweep::{Automation, DeletionOutcome, JobReport, PageDriver};

use crate::commands::{Commands, DeleteArgs};
use crate::error::{CliError, CliResult};
use crate::output::{item_row, ProgressReporter};

/// Run one page command; `interrupt` resolving cancels a running deletion
pub async fn dispatch<D, I>(
    command: &Commands,
    automation: &mut Automation<D>,
    reporter: &ProgressReporter,
    interrupt: I,
) -> CliResult<Option<String>>
where
    D: PageDriver,
    I: Future<Output = ()>,
{
    match command {
        Commands::Status => Ok(Some(status(automation).await)),
        Commands::Toggle => {
            automation.toggle_mode();
            Ok(None)
        }
        Commands::List(args) => Ok(Some(list(automation, args.filter.as_deref()).await)),
        Commands::Select(args) => {
            for id in &args.ids {
                if !automation.select(id.as_str()) {
                    break;
                }
            }
            Ok(Some(selected_line(automation)))
        }
        Commands::Deselect(args) => {
            for id in &args.ids {
                if !automation.deselect(id.as_str()) {
                    break;
                }
            }
            Ok(Some(selected_line(automation)))
        }
        Commands::SelectAll => {
            automation.select_all().await;
            Ok(Some(selected_line(automation)))
        }
        Commands::DeselectAll => {
            automation.deselect_all();
            Ok(None)
        }
        Commands::Delete(args) => delete(automation, reporter, args, interrupt).await,
        Commands::Request(args) => Ok(Some(automation.handle_json(&args.json).await?)),
        Commands::Stats => Err(CliError::invalid_argument(
            "stats reads the state file and never opens a page",
        )),
    }
}

async fn status<D: PageDriver>(automation: &Automation<D>) -> String {
    let status = automation.status().await;
    format!(
        "Mode:          {}\nSelected:      {}\nItems on page: {}\nDeleting:      {}",
        if status.enabled { "enabled" } else { "disabled" },
        status.selected_count,
        status.total_items,
        if status.is_deleting { "yes" } else { "no" },
    )
}

fn selected_line<D: PageDriver>(automation: &Automation<D>) -> String {
    format!("Selected: {}", automation.selection().size())
}

async fn list<D: PageDriver>(automation: &Automation<D>, term: Option<&str>) -> String {
    let items = automation.scan_items().await;
    let term = term.unwrap_or_default();
    if !term.is_empty() {
        let visible = automation.filter(term).await;
        tracing::info!(term, visible, "filter applied on page");
    }

    let rows: Vec<String> = items
        .iter()
        .filter(|item| filter::matches(&item.title, term))
        .map(|item| item_row(item, automation.selection().contains(&item.id)))
        .collect();
    if rows.is_empty() {
        return "No items".to_string();
    }
    rows.join("\n")
}

async fn delete<D, I>(
    automation: &mut Automation<D>,
    reporter: &ProgressReporter,
    args: &DeleteArgs,
    interrupt: I,
) -> CliResult<Option<String>>
where
    D: PageDriver,
    I: Future<Output = ()>,
{
    if !args.yes {
        let question = if args.all {
            "Remove every item on this page?".to_string()
        } else {
            format!("Remove {} selected items?", automation.selection().size())
        };
        if !reporter.confirm(&question)? {
            reporter.info("Nothing removed");
            return Ok(None);
        }
    }

    let handle = automation.cancel_handle();
    let all = args.all;
    let job = async {
        if all {
            automation.delete_all().await
        } else {
            automation.delete_selected().await
        }
    };
    tokio::pin!(job);

    // Interrupt first: a Ctrl-C that lands during the scan must win.
    let report = tokio::select! {
        biased;
        () = interrupt => {
            if !handle.cancel() {
                // Still scanning; no item has been touched.
                reporter.warning("Interrupted before the first item");
                reporter.info("Nothing removed");
                return Ok(None);
            }
            reporter.warning("Cancelling after the current item");
            job.await
        }
        report = &mut job => report,
    };

    Ok(report.map(|report| summarize(&report)))
}

/// One line per failed item, then the counts
#[must_use]
pub fn summarize(report: &JobReport) -> String {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .filter_map(|o| match o.outcome {
            DeletionOutcome::Failed(ref failure) => {
                Some(format!("failed {} ({failure})", o.id.as_str()))
            }
            _ => None,
        })
        .collect();
    lines.push(format!(
        "Removed: {}  Failed: {}  Skipped: {}  Total: {}",
        report.completed,
        report.failed(),
        report.skipped(),
        report.total
    ));
    lines.join("\n")
}
