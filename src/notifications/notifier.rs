// src/notifications/notifier.rs

use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::{listings, Database};
use crate::errors::StoreError;

use super::message::render_listing;
use super::sink::{NotificationSink, OutgoingMessage, ParseMode, SinkError};

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub chat_id: String,
    pub batch_limit: usize,
    pub disable_link_preview: bool,
}

impl NotifierSettings {
    pub fn from_config(config: &AppConfig, chat_id: String) -> Self {
        Self {
            chat_id,
            batch_limit: config.notify.batch_limit.max(1),
            disable_link_preview: config.telegram.disable_link_preview,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotifyReport {
    pub candidates: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers one bounded batch of unnotified listings.
pub struct Notifier<'a> {
    db: &'a Database,
    sink: &'a dyn NotificationSink,
    settings: NotifierSettings,
}

impl<'a> Notifier<'a> {
    pub fn new(db: &'a Database, sink: &'a dyn NotificationSink, settings: NotifierSettings) -> Self {
        Self { db, sink, settings }
    }

    /// Send, then mark, one listing at a time: a crash between the two can
    /// repeat at most that one message on the next run.
    ///
    /// Only the initial batch read can fail the whole call.
    pub fn run(&self) -> Result<NotifyReport, StoreError> {
        let batch = listings::fetch_unnotified(self.db, self.settings.batch_limit.max(1))?;
        let mut report = NotifyReport {
            candidates: batch.len(),
            ..NotifyReport::default()
        };
        info!(candidates = batch.len(), channel = self.sink.channel_name(), "Notifying new listings");

        for record in &batch {
            let listing = &record.listing;
            let message = OutgoingMessage {
                chat_id: self.settings.chat_id.clone(),
                text: render_listing(listing),
                parse_mode: ParseMode::Html,
                disable_link_preview: self.settings.disable_link_preview,
            };

            let sent = panic::catch_unwind(AssertUnwindSafe(|| self.sink.send(&message)))
                .unwrap_or_else(|_| Err(SinkError::Request("sink panicked".to_string())));
            if let Err(e) = sent {
                warn!(listing_id = %listing.id, site = %listing.source_site, error = %e, "Delivery failed, will retry next run");
                report.failed += 1;
                continue;
            }

            match listings::mark_notified(self.db, &listing.id) {
                Ok(()) => {
                    report.delivered += 1;
                    info!(listing_id = %listing.id, site = %listing.source_site, ad_type = %listing.ad_type, "📨 Notified");
                }
                Err(e) => {
                    // Delivered but not marked: it goes out again next run.
                    error!(listing_id = %listing.id, error = %e, "Failed to mark listing as notified");
                    report.failed += 1;
                }
            }
        }

        info!(
            candidates = report.candidates,
            delivered = report.delivered,
            failed = report.failed,
            "Notifications done"
        );
        Ok(report)
    }
}
