// src/tests/utils.rs
use crate::config::SourceConfig;
use crate::db::{init_db, Database};
use crate::domain::listing::{AdType, Listing, SourceSite};
use crate::ingest::IngestJob;
use crate::notifications::sink::OutgoingMessage;
use crate::notifications::{NotificationSink, SinkError};
use crate::scraper::adapter::ListingStream;
use crate::scraper::{ListingAdapter, ScraperError};
use std::collections::HashSet;
use std::sync::Mutex;
use tempfile::TempDir;

/// Fresh migrated database in its own temp dir. Keep the `TempDir` alive
/// for as long as the database is used.
pub fn make_db() -> (TempDir, Database) {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::new(dir.path().join("listings.sqlite3"));
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    (dir, db)
}

pub fn source(site: SourceSite, ad_type: AdType) -> SourceConfig {
    SourceConfig {
        site,
        ad_type,
        start_url: "https://example.com/imoveis".to_string(),
        max_pages: 1,
        settle_ms: 0,
        default_location: None,
        category: None,
        enabled: true,
    }
}

pub fn listing(id: &str, title: &str) -> Listing {
    Listing {
        id: id.to_string(),
        title: title.to_string(),
        price: "R$300.000".to_string(),
        url: format!("https://example.com/{id}"),
        category: "Casa".to_string(),
        location: "Centro".to_string(),
        source_site: SourceSite::Olx,
        ad_type: AdType::Owner,
    }
}

pub enum FakeMode {
    Listings(Vec<Listing>),
    /// `fetch` itself fails.
    FailToStart(ScraperError),
    /// Yields the listings, then ends with the error.
    FailAfter(Vec<Listing>, ScraperError),
    Panic,
}

pub struct FakeAdapter {
    pub mode: FakeMode,
}

impl FakeAdapter {
    pub fn yielding(listings: Vec<Listing>) -> Self {
        Self {
            mode: FakeMode::Listings(listings),
        }
    }
}

impl ListingAdapter for FakeAdapter {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn fetch<'a>(&'a self, _source: &'a SourceConfig) -> Result<ListingStream<'a>, ScraperError> {
        match &self.mode {
            FakeMode::Listings(items) => Ok(Box::new(items.iter().cloned().map(Ok::<_, ScraperError>))),
            FakeMode::FailToStart(e) => Err(e.clone()),
            FakeMode::FailAfter(items, e) => Ok(Box::new(
                items
                    .iter()
                    .cloned()
                    .map(Ok::<_, ScraperError>)
                    .chain(std::iter::once(Err(e.clone()))),
            )),
            FakeMode::Panic => panic!("layout exploded"),
        }
    }
}

pub fn job(site: SourceSite, ad_type: AdType, adapter: FakeAdapter) -> IngestJob {
    IngestJob {
        source: source(site, ad_type),
        adapter: Box::new(adapter),
    }
}

/// Records every message; rejects the ones whose text mentions a failing id.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub failing: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn fail_for(&self, listing_id: &str) {
        self.failing.lock().unwrap().insert(listing_id.to_string());
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, message: &OutgoingMessage) -> Result<(), SinkError> {
        let failing = self.failing.lock().unwrap();
        if failing.iter().any(|id| message.text.contains(&format!("/{id}\""))) {
            return Err(SinkError::Rejected {
                status: 400,
                description: "Bad Request".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}
