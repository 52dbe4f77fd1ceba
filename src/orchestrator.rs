// src/orchestrator.rs

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::db::scrapes::{end_scrape_run, get_recent_scrapes, start_scrape_run, RunTotals};
use crate::db::{listings, Database};
use crate::ingest::{IngestCoordinator, IngestJob, IngestReport};
use crate::notifications::{NotificationSink, Notifier, NotifierSettings, NotifyReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Ingest,
    Notify,
    Done,
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Option<i64>,
    pub states: Vec<RunState>,
    pub ingest: IngestReport,
    pub notify: Option<NotifyReport>,
    pub notify_error: Option<String>,
}

/// One Ingest -> Notify cycle. Every state runs, whatever happened in the
/// one before it.
pub struct Orchestrator<'a> {
    config: &'a AppConfig,
    db: &'a Database,
    sink: &'a dyn NotificationSink,
    chat_id: String,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a AppConfig,
        db: &'a Database,
        sink: &'a dyn NotificationSink,
        chat_id: String,
    ) -> Self {
        Self {
            config,
            db,
            sink,
            chat_id,
        }
    }

    pub fn run(&self, jobs: &[IngestJob]) -> RunSummary {
        let mut states = Vec::with_capacity(4);

        // Init
        states.push(RunState::Init);
        info!(sources = jobs.len(), "--- Run started ---");
        self.check_previous_run();
        let run_id = match start_scrape_run(self.db, Utc::now()) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Could not record run start");
                None
            }
        };

        // Ingest
        states.push(RunState::Ingest);
        let ingest = IngestCoordinator::new(self.db, self.config.ingest.workers).run(jobs);
        info!(
            sources_ok = ingest.ok(),
            sources_failed = ingest.failed(),
            seen = ingest.seen(),
            inserted = ingest.inserted(),
            "Ingest finished"
        );

        // Notify
        states.push(RunState::Notify);
        let settings = NotifierSettings::from_config(self.config, self.chat_id.clone());
        let (notify, notify_error) = match Notifier::new(self.db, self.sink, settings).run() {
            Ok(report) => (Some(report), None),
            Err(e) => {
                error!(error = %e, "Notify stage failed");
                (None, Some(e.to_string()))
            }
        };

        // Done
        states.push(RunState::Done);
        if let Some(id) = run_id {
            let totals = RunTotals {
                sources_ok: ingest.ok(),
                sources_failed: ingest.failed(),
                listings_seen: ingest.seen(),
                listings_inserted: ingest.inserted(),
                notified: notify.as_ref().map_or(0, |n| n.delivered),
                notify_failed: notify.as_ref().map_or(0, |n| n.failed),
                error: notify_error.clone(),
            };
            if let Err(e) = end_scrape_run(self.db, id, Utc::now(), &totals) {
                warn!(run_id = id, error = %e, "Could not record run end");
            }
        }

        match (listings::count_listings(self.db), listings::count_unnotified(self.db)) {
            (Ok(stored), Ok(backlog)) => info!(run_id, stored, backlog, "--- Run finished ---"),
            _ => info!(run_id, "--- Run finished ---"),
        }

        RunSummary {
            run_id,
            states,
            ingest,
            notify,
            notify_error,
        }
    }

    /// A run row left without `finished_at` means the last process died
    /// mid-run. Everything it wrote is still valid; this run picks up the rest.
    fn check_previous_run(&self) {
        let previous = match get_recent_scrapes(self.db, 1) {
            Ok(runs) => runs.into_iter().next(),
            Err(e) => {
                warn!(error = %e, "Could not read run history");
                return;
            }
        };
        let Some(prev) = previous else { return };

        match prev.finished_at {
            None => warn!(
                prev_run = prev.id,
                started_at = %prev.started_at,
                "Previous run never finished"
            ),
            Some(finished_at) => debug!(
                prev_run = prev.id,
                %finished_at,
                success = ?prev.success,
                sources_ok = ?prev.sources_ok,
                sources_failed = ?prev.sources_failed,
                seen = ?prev.listings_seen,
                inserted = ?prev.listings_inserted,
                notified = ?prev.notified,
                notify_failed = ?prev.notify_failed,
                error = ?prev.error_message,
                "Previous run"
            ),
        }
    }
}
