// src/ingest.rs

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SourceConfig;
use crate::db::{listings, Database};
use crate::domain::listing::{AdType, SourceSite};
use crate::scraper::ListingAdapter;

/// One configured source paired with the adapter that reads it.
pub struct IngestJob {
    pub source: SourceConfig,
    pub adapter: Box<dyn ListingAdapter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Complete,
    /// Stream ended early after yielding something.
    Partial(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub site: SourceSite,
    pub ad_type: AdType,
    pub seen: usize,
    pub inserted: usize,
    pub status: SourceStatus,
}

impl SourceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl IngestReport {
    pub fn seen(&self) -> usize {
        self.outcomes.iter().map(|o| o.seen).sum()
    }

    pub fn inserted(&self) -> usize {
        self.outcomes.iter().map(|o| o.inserted).sum()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn ok(&self) -> usize {
        self.outcomes.len() - self.failed()
    }
}

#[derive(Default)]
struct Progress {
    seen: usize,
    inserted: usize,
}

/// Runs every job and stores listings it hasn't seen before. A job that
/// fails, blocks or panics is recorded and never stops the others.
pub struct IngestCoordinator<'a> {
    db: &'a Database,
    workers: usize,
}

impl<'a> IngestCoordinator<'a> {
    pub fn new(db: &'a Database, workers: usize) -> Self {
        Self {
            db,
            workers: workers.max(1),
        }
    }

    pub fn run(&self, jobs: &[IngestJob]) -> IngestReport {
        let outcomes = if self.workers == 1 || jobs.len() <= 1 {
            jobs.iter().map(|job| self.run_job(job)).collect()
        } else {
            self.run_pool(jobs)
        };
        IngestReport { outcomes }
    }

    /// Bounded pool of scoped threads pulling jobs by index. Outcomes come
    /// back in job order.
    fn run_pool(&self, jobs: &[IngestJob]) -> Vec<SourceOutcome> {
        let next = AtomicUsize::new(0);
        let workers = self.workers.min(jobs.len());

        let mut indexed: Vec<(usize, SourceOutcome)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let i = next.fetch_add(1, Ordering::SeqCst);
                            let Some(job) = jobs.get(i) else { break };
                            done.push((i, self.run_job(job)));
                        }
                        done
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_default())
                .collect()
        });

        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn run_job(&self, job: &IngestJob) -> SourceOutcome {
        let site = job.source.site;
        let ad_type = job.source.ad_type;
        let started = Instant::now();
        info!(%site, %ad_type, adapter = job.adapter.name(), "Starting source");

        let mut progress = Progress::default();
        let status = match panic::catch_unwind(AssertUnwindSafe(|| self.ingest_source(job, &mut progress))) {
            Ok(status) => status,
            Err(payload) => SourceStatus::Failed(format!("adapter panicked: {}", panic_message(&*payload))),
        };

        let elapsed = started.elapsed();
        match &status {
            SourceStatus::Complete if progress.seen == 0 => {
                warn!(%site, %ad_type, ?elapsed, "No listings found (blocked or page layout changed?)")
            }
            SourceStatus::Complete => {
                info!(%site, %ad_type, seen = progress.seen, inserted = progress.inserted, ?elapsed, "✅ Source done")
            }
            SourceStatus::Partial(reason) => {
                warn!(%site, %ad_type, seen = progress.seen, inserted = progress.inserted, reason = %reason, ?elapsed, "Source ended early")
            }
            SourceStatus::Failed(reason) => {
                error!(%site, %ad_type, seen = progress.seen, inserted = progress.inserted, reason = %reason, ?elapsed, "❌ Source failed")
            }
        }

        SourceOutcome {
            site,
            ad_type,
            seen: progress.seen,
            inserted: progress.inserted,
            status,
        }
    }

    fn ingest_source(&self, job: &IngestJob, progress: &mut Progress) -> SourceStatus {
        let stream = match job.adapter.fetch(&job.source) {
            Ok(stream) => stream,
            Err(e) => return SourceStatus::Failed(e.to_string()),
        };

        for item in stream {
            let mut listing = match item {
                Ok(listing) => listing,
                Err(e) if progress.seen == 0 => return SourceStatus::Failed(e.to_string()),
                Err(e) => return SourceStatus::Partial(e.to_string()),
            };
            progress.seen += 1;

            // Stored under the configured (site, ad_type), whatever the adapter said.
            listing.source_site = job.source.site;
            listing.ad_type = job.source.ad_type;

            match listings::exists(self.db, &listing.id) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => return SourceStatus::Failed(format!("store error: {e}")),
            }
            match listings::insert_if_absent(self.db, &listing) {
                Ok(true) => {
                    progress.inserted += 1;
                    debug!(listing_id = %listing.id, title = %listing.title, "New listing stored");
                }
                // Lost a race with another worker.
                Ok(false) => {}
                Err(e) => return SourceStatus::Failed(format!("store error: {e}")),
            }
        }
        SourceStatus::Complete
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
