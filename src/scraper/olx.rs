// src/scraper/olx.rs

use ::scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::config::SourceConfig;
use crate::domain::listing::{make_scoped_id, or_sentinel, Listing, UNKNOWN_CATEGORY};
use crate::scraper::adapter::{ListingAdapter, ListingStream};
use crate::scraper::fetch::PageFetcher;
use crate::scraper::paginate::Paginator;
use crate::scraper::ScraperError;

const ID_PREFIX: &str = "olx";

/// OLX's own wording for an ad without a price.
pub const UNPRICED: &str = "Sob consulta";

// props
//  └── pageProps
//       └── ads[]
//            ├── listId
//            ├── subject
//            ├── price
//            ├── url
//            ├── location
//            └── category

/// OLX search results. The page embeds its data as Next.js state, so no DOM
/// walking is needed.
pub struct OlxAdapter<P: PageFetcher> {
    fetcher: P,
    page_delay: Duration,
}

impl<P: PageFetcher> OlxAdapter<P> {
    pub fn new(fetcher: P, page_delay: Duration) -> Self {
        Self {
            fetcher,
            page_delay,
        }
    }
}

impl<P: PageFetcher> ListingAdapter for OlxAdapter<P> {
    fn name(&self) -> &'static str {
        "olx"
    }

    fn fetch<'a>(&'a self, source: &'a SourceConfig) -> Result<ListingStream<'a>, ScraperError> {
        let base = Url::parse(&source.start_url)
            .map_err(|e| ScraperError::Config(format!("bad start_url {}: {e}", source.start_url)))?;
        let settle = Duration::from_millis(source.settle_ms);

        Ok(Box::new(Paginator::new(
            source.max_pages,
            self.page_delay,
            move |page| {
                let url = page_url(&base, page);
                info!(site = "olx", ad_type = %source.ad_type, page, %url, "📄 Fetching page");
                let html = self.fetcher.fetch_html(url.as_str(), settle)?;
                parse_page(&html, source)
            },
        )))
    }
}

/// Page N > 1 is the same search with `o=N`.
pub fn page_url(base: &Url, page: u32) -> Url {
    if page <= 1 {
        return base.clone();
    }
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != "o")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("o", &page.to_string());
    url
}

pub fn parse_page(html: &str, source: &SourceConfig) -> Result<Vec<Listing>, ScraperError> {
    let data = extract_next_data(html)?;

    let ads = match data.pointer("/props/pageProps/ads") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(ads)) => ads,
        Some(_) => {
            return Err(ScraperError::UnexpectedShape(
                "props.pageProps.ads is not an array".to_string(),
            ))
        }
    };

    // Entries without `listId` are ad slots, not listings.
    Ok(ads
        .iter()
        .filter_map(|ad| {
            let native_id = scalar(ad, "listId")?;
            let mut listing = Listing::for_source(source, make_scoped_id(ID_PREFIX, &native_id));
            listing.title = or_sentinel(scalar(ad, "subject").as_deref(), "");
            listing.price = or_sentinel(scalar(ad, "price").as_deref(), UNPRICED);
            listing.url = or_sentinel(scalar(ad, "url").as_deref(), "");
            if let Some(location) = scalar(ad, "location").filter(|l| !l.trim().is_empty()) {
                listing.location = location.trim().to_string();
            }
            listing.category = or_sentinel(
                scalar(ad, "category")
                    .as_deref()
                    .or(source.category.as_deref()),
                UNKNOWN_CATEGORY,
            );
            Some(listing)
        })
        .collect())
}

fn extract_next_data(html: &str) -> Result<Value, ScraperError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[id="__NEXT_DATA__"]"#)
        .map_err(|e| ScraperError::HtmlParse(e.to_string()))?;

    let element = document
        .select(&selector)
        .next()
        .ok_or(ScraperError::MissingNextData)?;

    let json_text: String = element.text().collect();
    if json_text.trim().is_empty() {
        return Err(ScraperError::MissingNextData);
    }
    serde_json::from_str(&json_text).map_err(|e| ScraperError::JsonParse(e.to_string()))
}

/// String or number field as text.
fn scalar(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::{AdType, SourceSite};
    use std::sync::Mutex;

    fn source() -> SourceConfig {
        SourceConfig {
            site: SourceSite::Olx,
            ad_type: AdType::Owner,
            start_url: "https://www.olx.com.br/imoveis/sao-sebastiao?f=p".into(),
            max_pages: 3,
            settle_ms: 0,
            default_location: Some("S. Sebastião".into()),
            category: None,
            enabled: true,
        }
    }

    fn page_html(ads: &str) -> String {
        format!(
            r#"<html><head></head><body>
            <script id="__NEXT_DATA__" type="application/json">
            {{"props":{{"pageProps":{{"ads":{ads}}}}}}}
            </script></body></html>"#
        )
    }

    #[test]
    fn parses_next_data_ads() {
        let html = page_html(
            r#"[
                {"listId": 1, "subject": "Casa", "price": "R$ 300.000", "url": "https://x/1", "location": "Centro", "category": "Casas"},
                {"subject": "banner"},
                {"listId": "2", "subject": "Apto", "url": "https://x/2"}
            ]"#,
        );
        let got = parse_page(&html, &source()).unwrap();
        assert_eq!(got.len(), 2);

        assert_eq!(got[0].id, "olx-1");
        assert_eq!(got[0].title, "Casa");
        assert_eq!(got[0].price, "R$ 300.000");
        assert_eq!(got[0].location, "Centro");
        assert_eq!(got[0].category, "Casas");

        assert_eq!(got[1].id, "olx-2");
        assert_eq!(got[1].price, "Sob consulta");
        assert_eq!(got[1].location, "S. Sebastião");
        assert_eq!(got[1].category, UNKNOWN_CATEGORY);
        assert_eq!(got[1].source_site, SourceSite::Olx);
        assert_eq!(got[1].ad_type, AdType::Owner);
    }

    #[test]
    fn missing_next_data_is_a_fault() {
        let err = parse_page("<html><body>captcha</body></html>", &source()).unwrap_err();
        assert!(matches!(err, ScraperError::MissingNextData));
    }

    #[test]
    fn missing_ads_is_an_empty_page() {
        let html = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{}}}</script>"#;
        assert!(parse_page(html, &source()).unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_a_parse_fault() {
        let html = r#"<script id="__NEXT_DATA__">{"props": </script>"#;
        assert!(matches!(
            parse_page(html, &source()),
            Err(ScraperError::JsonParse(_))
        ));
    }

    #[test]
    fn page_url_replaces_offset() {
        let base = Url::parse("https://www.olx.com.br/imoveis?f=p").unwrap();
        assert_eq!(page_url(&base, 1).as_str(), "https://www.olx.com.br/imoveis?f=p");
        assert_eq!(page_url(&base, 2).as_str(), "https://www.olx.com.br/imoveis?f=p&o=2");

        let already = Url::parse("https://www.olx.com.br/imoveis?o=2&f=c").unwrap();
        assert_eq!(page_url(&already, 3).as_str(), "https://www.olx.com.br/imoveis?f=c&o=3");
    }

    struct ScriptedFetcher {
        pages: Mutex<Vec<Result<String, ScraperError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl PageFetcher for ScriptedFetcher {
        fn fetch_html(&self, url: &str, _settle: Duration) -> Result<String, ScraperError> {
            self.urls.lock().unwrap().push(url.to_string());
            self.pages.lock().unwrap().remove(0)
        }
    }

    #[test]
    fn adapter_walks_pages_until_fault() {
        let fetcher = ScriptedFetcher {
            pages: Mutex::new(vec![
                Ok(page_html(r#"[{"listId": 10, "subject": "A"}]"#)),
                Err(ScraperError::Blocked("HTTP 403".into())),
            ]),
            urls: Mutex::new(Vec::new()),
        };
        let adapter = OlxAdapter::new(fetcher, Duration::ZERO);
        let src = source();

        let items: Vec<_> = adapter.fetch(&src).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().id, "olx-10");
        assert!(matches!(items[1], Err(ScraperError::Blocked(_))));

        let urls = adapter.fetcher.urls.lock().unwrap().clone();
        assert_eq!(
            urls,
            vec![
                "https://www.olx.com.br/imoveis/sao-sebastiao?f=p".to_string(),
                "https://www.olx.com.br/imoveis/sao-sebastiao?f=p&o=2".to_string(),
            ]
        );
    }
}
