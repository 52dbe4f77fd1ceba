// src/scraper/cards.rs

use ::scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::SourceConfig;
use crate::domain::listing::{make_scoped_id, or_sentinel, Listing, UNKNOWN_PRICE};
use crate::scraper::adapter::{ListingAdapter, ListingStream};
use crate::scraper::fetch::PageFetcher;
use crate::scraper::paginate::Paginator;
use crate::scraper::ScraperError;

/// Where things live on a site that renders one card per listing.
///
/// Selector lists are tried in order; the first match wins.
pub struct CardLayout {
    pub name: &'static str,
    pub id_prefix: &'static str,
    pub card: &'static str,
    /// `None` when the card itself is the `<a>`.
    pub link: Option<&'static str>,
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    /// Last-resort price: first `div` in the card whose text contains this.
    pub price_marker: Option<&'static str>,
    pub location: &'static [&'static str],
    pub native_id: fn(&Url) -> Option<String>,
    /// `None` for sites where only the first page is read.
    pub page_url: Option<fn(&Url, u32) -> Option<Url>>,
}

pub static RIVIERA: CardLayout = CardLayout {
    name: "riviera",
    id_prefix: "riv",
    card: "article.c49-property-card",
    link: Some("a.c49btn-details"),
    title: &["h2", ".c49-property-card_title"],
    price: &[".c49-property-card_rent-price"],
    price_marker: Some("R$"),
    location: &[".c49-property-card_address", ".c49-property-card_header div"],
    native_id: riviera_segment,
    page_url: Some(replace_last_segment),
};

pub static IZ: CardLayout = CardLayout {
    name: "iz",
    id_prefix: "iz",
    card: "a.card-with-buttons",
    link: None,
    title: &["h2", ".card-with-buttons__title"],
    price: &[".card-with-buttons__value"],
    price_marker: None,
    location: &[],
    native_id: last_segment,
    page_url: None,
};

pub static TROPICAL: CardLayout = CardLayout {
    name: "tropical",
    id_prefix: "trop",
    card: "a.link_resultado",
    link: None,
    title: &["h3"],
    price: &["h5"],
    price_marker: None,
    location: &[".final_card"],
    native_id: last_segment,
    page_url: Some(replace_pagina_segment),
};

pub static ADIMOV: CardLayout = CardLayout {
    name: "adimov",
    id_prefix: "adi",
    card: "article",
    link: Some("a.c49btn-details"),
    title: &[".c49-property-card_header h2", "h2"],
    price: &[".c49-property-card_price"],
    price_marker: None,
    location: &[],
    native_id: last_segment,
    page_url: None,
};

/// Adapter for any [`CardLayout`] site.
pub struct CardAdapter<P: PageFetcher> {
    fetcher: P,
    layout: &'static CardLayout,
    page_delay: Duration,
}

impl<P: PageFetcher> CardAdapter<P> {
    pub fn new(fetcher: P, layout: &'static CardLayout, page_delay: Duration) -> Self {
        Self {
            fetcher,
            layout,
            page_delay,
        }
    }
}

impl<P: PageFetcher> ListingAdapter for CardAdapter<P> {
    fn name(&self) -> &'static str {
        self.layout.name
    }

    fn fetch<'a>(&'a self, source: &'a SourceConfig) -> Result<ListingStream<'a>, ScraperError> {
        let base = Url::parse(&source.start_url)
            .map_err(|e| ScraperError::Config(format!("bad start_url {}: {e}", source.start_url)))?;
        let settle = Duration::from_millis(source.settle_ms);
        let layout = self.layout;

        Ok(Box::new(Paginator::new(
            source.max_pages,
            self.page_delay,
            move |page| {
                let url = if page == 1 {
                    base.clone()
                } else {
                    match layout.page_url.and_then(|next| next(&base, page)) {
                        Some(url) => url,
                        None => return Ok(Vec::new()),
                    }
                };
                info!(site = layout.name, ad_type = %source.ad_type, page, %url, "📄 Fetching page");
                let html = self.fetcher.fetch_html(url.as_str(), settle)?;
                parse_cards(&html, &url, layout, source)
            },
        )))
    }
}

pub fn parse_cards(
    html: &str,
    page_url: &Url,
    layout: &CardLayout,
    source: &SourceConfig,
) -> Result<Vec<Listing>, ScraperError> {
    let document = Html::parse_document(html);
    let card_sel = selector(layout.card)?;
    let link_sel = layout.link.map(selector).transpose()?;
    let title_sels = selectors(layout.title)?;
    let price_sels = selectors(layout.price)?;
    let location_sels = selectors(layout.location)?;
    let div_sel = selector("div")?;

    let cards: Vec<ElementRef<'_>> = document.select(&card_sel).collect();
    debug!(site = layout.name, cards = cards.len(), "Cards found");

    let mut out = Vec::new();
    for card in cards {
        let link = match &link_sel {
            Some(sel) => card.select(sel).next(),
            None => Some(card),
        };
        let Some(href) = link.and_then(|a| a.value().attr("href")) else {
            continue;
        };
        let Some(title) = first_text(card, &title_sels) else {
            continue;
        };
        let Ok(url) = page_url.join(href.trim()) else {
            debug!(site = layout.name, href, "Skipping card with unusable href");
            continue;
        };
        let Some(native_id) = (layout.native_id)(&url) else {
            debug!(site = layout.name, %url, "Skipping card without id in url");
            continue;
        };

        let price = first_text(card, &price_sels).or_else(|| {
            layout.price_marker.and_then(|marker| {
                card.select(&div_sel)
                    .map(element_text)
                    .find(|text| text.contains(marker))
            })
        });

        let mut listing = Listing::for_source(source, make_scoped_id(layout.id_prefix, &native_id));
        listing.title = title;
        listing.price = or_sentinel(price.as_deref(), UNKNOWN_PRICE);
        listing.url = url.to_string();
        if let Some(location) = first_text(card, &location_sels) {
            listing.location = location;
        }
        out.push(listing);
    }
    Ok(out)
}

fn selector(css: &'static str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::HtmlParse(format!("{css}: {e}")))
}

fn selectors(list: &'static [&'static str]) -> Result<Vec<Selector>, ScraperError> {
    list.iter().map(|css| selector(*css)).collect()
}

fn first_text(card: ElementRef<'_>, sels: &[Selector]) -> Option<String> {
    sels.iter()
        .filter_map(|sel| card.select(sel).next())
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Whitespace-normalized text content.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default()
}

fn last_segment(url: &Url) -> Option<String> {
    segments(url).last().map(|s| s.to_string())
}

/// Riviera detail links sometimes end in a page number `1`.
fn riviera_segment(url: &Url) -> Option<String> {
    let segs = segments(url);
    match segs.as_slice() {
        [.., prev, "1"] => Some(prev.to_string()),
        [.., last] => Some(last.to_string()),
        [] => None,
    }
}

/// `/imoveis/364/1` -> `/imoveis/364/{page}`
fn replace_last_segment(base: &Url, page: u32) -> Option<Url> {
    let mut segs: Vec<String> = segments(base).into_iter().map(str::to_string).collect();
    let last = segs.last_mut()?;
    last.parse::<u32>().ok()?;
    *last = page.to_string();
    let mut url = base.clone();
    url.set_path(&format!("/{}", segs.join("/")));
    Some(url)
}

/// `/comprar/sp/sao-sebastiao/pagina-1/` -> `.../pagina-{page}/`
fn replace_pagina_segment(base: &Url, page: u32) -> Option<Url> {
    let path = base.path();
    let start = path.find("pagina-")?;
    let digits_start = start + "pagina-".len();
    let digits_len = path[digits_start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits_len == 0 {
        return None;
    }
    let new_path = format!(
        "{}{}{}",
        &path[..digits_start],
        page,
        &path[digits_start + digits_len..]
    );
    let mut url = base.clone();
    url.set_path(&new_path);
    Some(url)
}
