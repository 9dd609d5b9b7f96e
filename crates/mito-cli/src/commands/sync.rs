use chrono::Utc;
use mito_core::outbox::PendingAction;
use mito_core::sync::{SyncReport, MAX_REPLAY_RETRIES};
use serde::Serialize;

use crate::commands::common::{format_action_line, AppContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncReportItem {
    pub synced: Vec<String>,
    pub retained: Vec<String>,
    pub dropped: Vec<String>,
    pub pending: usize,
}

impl SyncReportItem {
    pub fn new(report: &SyncReport, pending: usize) -> Self {
        let ids = |actions: &[PendingAction]| -> Vec<String> {
            actions.iter().map(|action| action.id.clone()).collect()
        };
        Self {
            synced: ids(&report.synced),
            retained: ids(&report.retained),
            dropped: ids(&report.dropped),
            pending,
        }
    }
}

pub fn run_queue(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let actions = context.action_log.list();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    if actions.is_empty() {
        println!("No pending actions.");
        return Ok(());
    }

    let now = Utc::now();
    for action in &actions {
        println!("{}", format_action_line(action, now));
    }
    Ok(())
}

pub async fn run_sync(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    if !context.connectivity.is_online() {
        let pending = context.action_log.len();
        println!("Offline: {pending} pending action(s) left for later.");
        return Ok(());
    }

    let session = context.session()?;
    let report = context.sync_coordinator().drain(&session.token).await?;
    let pending = context.action_log.len();

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&SyncReportItem::new(&report, pending))?
        );
        return Ok(());
    }

    for line in format_sync_report(&report, pending) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport, pending: usize) -> Vec<String> {
    if report.is_empty() {
        return vec!["Nothing to sync.".to_string()];
    }

    let mut lines = vec![format!("Synced {} action(s).", report.synced.len())];
    for action in &report.retained {
        lines.push(format!(
            "Kept {} {} for retry ({}/{MAX_REPLAY_RETRIES} failed attempts)",
            action.method, action.url, action.retry_count
        ));
    }
    for action in &report.dropped {
        lines.push(format!(
            "Dropped {} {} after {} failed attempts",
            action.method, action.url, action.retry_count
        ));
    }
    if pending > 0 {
        lines.push(format!("{pending} action(s) still pending."));
    }
    lines
}
