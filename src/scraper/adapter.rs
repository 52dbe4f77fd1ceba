use crate::config::SourceConfig;
use crate::domain::listing::Listing;
use crate::scraper::ScraperError;

/// A finite, lazily-fetched run of listings. An `Err` item reports why the
/// stream ended early and is always the last item.
pub type ListingStream<'a> = Box<dyn Iterator<Item = Result<Listing, ScraperError>> + 'a>;

/// Fetch-and-normalize for one source.
///
/// Every yielded listing has a non-empty id and sentinel strings for
/// anything the page didn't say. Calling `fetch` again on the next run
/// starts over from page one.
pub trait ListingAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` here means the adapter couldn't start at all.
    fn fetch<'a>(&'a self, source: &'a SourceConfig) -> Result<ListingStream<'a>, ScraperError>;
}
