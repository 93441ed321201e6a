//! Subcommands and their text output

use crate::config::AppConfig;
use anyhow::Context;
use std::fmt::Write as _;
use std::sync::Arc;
use tabula_entities::{DocumentStatus, Repositories};
use tabula_lifecycle::{
    Clock, DisabledFileStore, DocumentService, DocumentView, ExpirationSweep, LogNotifier,
    Statistics, SweepReport, SystemClock,
};
use tabula_repository::{StoreScheduler, TabularStore};
use tabula_sheets::SheetsStore;
use tracing::info;

/// What to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Expire approvals whose validity window has passed
    Sweep {
        /// Report what would expire without writing
        dry_run: bool,
    },
    /// Document counts per status
    Stats {
        /// JSON instead of text
        json: bool,
    },
    /// Documents waiting for review
    Pending {
        /// JSON instead of text
        json: bool,
    },
    /// Print the effective configuration and whether it is usable
    CheckConfig,
}

/// Services wired over one store
pub struct App {
    service: DocumentService,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").field("service", &self.service).finish_non_exhaustive()
    }
}

impl App {
    /// Connect to the configured spreadsheet
    ///
    /// Uploads are not available from the command line, so the file store is
    /// disabled and notifications are logged.
    ///
    /// # Errors
    /// Incomplete sheets configuration or missing token.
    pub fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let store = SheetsStore::new(&config.sheets).context("connecting to the spreadsheet")?;
        info!(spreadsheet = %config.sheets.spreadsheet_id, "connected");
        Self::from_store(Arc::new(store), config, Arc::new(SystemClock))
    }

    /// Wire the services over an existing store
    ///
    /// # Errors
    /// Entity layouts that do not form a valid schema.
    pub fn from_store(
        store: Arc<dyn TabularStore>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let scheduler = StoreScheduler::new(config.scheduler.clone());
        let repos = Repositories::new(&store, &scheduler, &config.repository)?;
        let service = DocumentService::new(
            repos,
            Arc::new(DisabledFileStore),
            Arc::new(LogNotifier),
            Arc::clone(&clock),
            config.lifecycle.clone(),
        );
        Ok(Self { service, clock })
    }

    /// Run `action` and render its output
    ///
    /// # Errors
    /// Store failures.
    pub async fn execute(&self, action: Action, config: &AppConfig) -> anyhow::Result<String> {
        match action {
            Action::Sweep { dry_run } => {
                let report = self.sweep(dry_run).await?;
                Ok(render_sweep(&report, dry_run))
            }
            Action::Stats { json } => {
                let stats = self.service.statistics().await?;
                if json {
                    Ok(serde_json::to_string_pretty(&stats)?)
                } else {
                    Ok(render_statistics(&stats))
                }
            }
            Action::Pending { json } => {
                let pending = self.service.pending_documents().await?;
                if json {
                    Ok(serde_json::to_string_pretty(&pending)?)
                } else {
                    Ok(render_pending(&pending))
                }
            }
            Action::CheckConfig => Ok(check_config(config).0),
        }
    }

    /// Sweep for today; a dry run only plans
    ///
    /// # Errors
    /// Store failures.
    pub async fn sweep(&self, dry_run: bool) -> anyhow::Result<SweepReport> {
        if !dry_run {
            return Ok(self.service.sweep_expired().await?);
        }
        let (total, due) = ExpirationSweep::new(self.service.repositories().clone())
            .plan(self.clock.today())
            .await?;
        let expired_ids: Vec<String> = due.into_iter().map(|doc| doc.id).collect();
        Ok(SweepReport {
            total,
            expired: expired_ids.len(),
            expired_ids,
        })
    }
}

/// Sweep summary, one expired id per line
#[must_use]
pub fn render_sweep(report: &SweepReport, dry_run: bool) -> String {
    let verb = if dry_run { "would expire" } else { "expired" };
    let mut out = format!("{} of {} documents {verb}\n", report.expired, report.total);
    for id in &report.expired_ids {
        let _ = writeln!(out, "  {id}");
    }
    out
}

/// Counts per status in reporting order, then unrecognised labels
#[must_use]
pub fn render_statistics(stats: &Statistics) -> String {
    let mut out = format!("total: {}\n", stats.total);
    for status in DocumentStatus::ALL {
        let _ = writeln!(out, "  {status}: {}", stats.count(status));
    }
    for (label, count) in &stats.unexpected {
        let _ = writeln!(out, "  ? {label:?}: {count}");
    }
    out
}

/// One pending document per line: id, owner, type, dose, upload date
#[must_use]
pub fn render_pending(pending: &[DocumentView]) -> String {
    if pending.is_empty() {
        return "no documents waiting for review\n".to_string();
    }
    let mut out = String::new();
    for view in pending {
        let document = &view.document;
        let uploaded = document
            .uploaded_on
            .map_or_else(|| "-".to_string(), |date| date.to_string());
        let _ = writeln!(
            out,
            "{}\t{}\t{}\tdosis {}\t{uploaded}",
            document.id, document.owner_id, view.document_type.name, document.dose
        );
    }
    out
}

/// Effective configuration without secrets, and whether a client could be built
#[must_use]
pub fn check_config(config: &AppConfig) -> (String, bool) {
    let mut out = match config.to_toml() {
        Ok(text) => text,
        Err(err) => format!("# configuration cannot be printed: {err:#}\n"),
    };
    let mut usable = true;
    if let Err(err) = config.sheets.validate() {
        usable = false;
        let _ = writeln!(out, "# sheets: {err}");
    }
    match config.sheets.resolve_token() {
        Ok(_) if config.sheets.access_token.is_some() => {
            out.push_str("# access token: configured\n");
        }
        Ok(_) => {
            let _ = writeln!(out, "# access token: from ${}", config.sheets.access_token_env);
        }
        Err(err) => {
            usable = false;
            let _ = writeln!(out, "# access token: {err}");
        }
    }
    (out, usable)
}
