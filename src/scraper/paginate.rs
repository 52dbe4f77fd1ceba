// src/scraper/paginate.rs

use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::listing::Listing;
use crate::scraper::ScraperError;

/// Lazily walks pages `1..=max_pages`, yielding listings in page order.
///
/// Stops after the cap, on a page with no listings, on a page holding only
/// ids already yielded, or after yielding a page fault as its last item.
pub struct Paginator<F>
where
    F: FnMut(u32) -> Result<Vec<Listing>, ScraperError>,
{
    fetch_page: F,
    max_pages: u32,
    next_page: u32,
    page_delay: Duration,
    buffer: VecDeque<Listing>,
    seen: HashSet<String>,
    done: bool,
}

impl<F> Paginator<F>
where
    F: FnMut(u32) -> Result<Vec<Listing>, ScraperError>,
{
    pub fn new(max_pages: u32, page_delay: Duration, fetch_page: F) -> Self {
        Self {
            fetch_page,
            max_pages,
            next_page: 1,
            page_delay,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            done: false,
        }
    }
}

impl<F> Iterator for Paginator<F>
where
    F: FnMut(u32) -> Result<Vec<Listing>, ScraperError>,
{
    type Item = Result<Listing, ScraperError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(listing) = self.buffer.pop_front() {
                return Some(Ok(listing));
            }
            if self.done || self.next_page > self.max_pages {
                self.done = true;
                return None;
            }

            let page = self.next_page;
            self.next_page += 1;
            if page > 1 && !self.page_delay.is_zero() {
                std::thread::sleep(self.page_delay);
            }

            let listings = match (self.fetch_page)(page) {
                Ok(listings) => listings,
                Err(e) => {
                    warn!(page, error = %e, "Page failed, ending stream");
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let total = listings.len();
            let mut fresh = 0;
            for listing in listings {
                if listing.id.is_empty() {
                    warn!(page, url = %listing.url, "Dropping listing without id");
                    continue;
                }
                if self.seen.insert(listing.id.clone()) {
                    self.buffer.push_back(listing);
                    fresh += 1;
                }
            }

            if total == 0 {
                debug!(page, "🏁 No listings found, stopping");
                self.done = true;
            } else if fresh == 0 {
                debug!(page, "🔁 Page repeats earlier listings, stopping");
                self.done = true;
            } else {
                debug!(page, total, fresh, "✅ Page parsed");
            }
        }
    }
}
