pub mod adapter;
pub mod cards;
pub mod fetch;
pub mod olx;
pub mod paginate;
mod scraper_error;

pub use adapter::ListingAdapter;
pub use scraper_error::ScraperError;

use std::time::Duration;

use crate::config::{HttpConfig, SourceConfig};
use crate::domain::listing::SourceSite;
use cards::CardAdapter;
use fetch::HttpFetcher;
use olx::OlxAdapter;

/// Build the adapter for one configured source. Each adapter gets its own
/// HTTP session, so adapters never share one when run in parallel.
pub fn build_adapter(
    source: &SourceConfig,
    http: &HttpConfig,
) -> Result<Box<dyn ListingAdapter>, ScraperError> {
    let fetcher = HttpFetcher::new(http)?;
    let delay = Duration::from_millis(http.page_delay_ms);

    Ok(match source.site {
        SourceSite::Olx => Box::new(OlxAdapter::new(fetcher, delay)),
        SourceSite::Riviera => Box::new(CardAdapter::new(fetcher, &cards::RIVIERA, delay)),
        SourceSite::Iz => Box::new(CardAdapter::new(fetcher, &cards::IZ, delay)),
        SourceSite::Tropical => Box::new(CardAdapter::new(fetcher, &cards::TROPICAL, delay)),
        SourceSite::Adimov => Box::new(CardAdapter::new(fetcher, &cards::ADIMOV, delay)),
    })
}
