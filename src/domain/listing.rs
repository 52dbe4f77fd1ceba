// src/domain/listing.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::SourceConfig;

/// Stored when a source doesn't publish a price.
pub const UNKNOWN_PRICE: &str = "Consulte";
pub const UNKNOWN_CATEGORY: &str = "Imóvel";
pub const UNKNOWN_LOCATION: &str = "Não informado";

/// Which adapter produced a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSite {
    Olx,
    Riviera,
    Iz,
    Tropical,
    Adimov,
}

impl SourceSite {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceSite::Olx => "olx",
            SourceSite::Riviera => "riviera",
            SourceSite::Iz => "iz",
            SourceSite::Tropical => "tropical",
            SourceSite::Adimov => "adimov",
        }
    }
}

impl fmt::Display for SourceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "olx" => Ok(SourceSite::Olx),
            "riviera" => Ok(SourceSite::Riviera),
            "iz" => Ok(SourceSite::Iz),
            "tropical" => Ok(SourceSite::Tropical),
            "adimov" => Ok(SourceSite::Adimov),
            other => Err(format!("unknown source site: {other}")),
        }
    }
}

/// Owner-posted ads are leads; agency ads are tracked as competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdType {
    Owner,
    Competitor,
}

impl AdType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdType::Owner => "owner",
            AdType::Competitor => "competitor",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(AdType::Owner),
            "competitor" => Ok(AdType::Competitor),
            other => Err(format!("unknown ad type: {other}")),
        }
    }
}

/// A normalized ad, as yielded by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: String,
    pub url: String,
    pub category: String,
    pub location: String,
    pub source_site: SourceSite,
    pub ad_type: AdType,
}

impl Listing {
    /// Start a listing for `source` with every optional field at its sentinel.
    pub fn for_source(source: &SourceConfig, id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            title: String::new(),
            price: UNKNOWN_PRICE.to_string(),
            url: String::new(),
            category: source
                .category
                .clone()
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            location: source
                .default_location
                .clone()
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            source_site: source.site,
            ad_type: source.ad_type,
        }
    }
}

/// A listing as persisted: the ad plus its bookkeeping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub listing: Listing,
    pub date_added: DateTime<Utc>,
    pub notified: bool,
}

/// Prefix a native id with the source tag so ids can't collide across sources.
/// Example: "riv-12345"
pub fn make_scoped_id(prefix: &str, raw_id: &str) -> String {
    format!("{}-{}", prefix.trim(), raw_id.trim())
}

/// Collapse an optional scraped string to a trimmed value or a sentinel.
pub fn or_sentinel(value: Option<&str>, sentinel: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(sentinel)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_and_ad_type_parse_case_insensitively() {
        assert_eq!("OLX".parse::<SourceSite>().unwrap(), SourceSite::Olx);
        assert_eq!(" adimov ".parse::<SourceSite>().unwrap(), SourceSite::Adimov);
        assert_eq!("Competitor".parse::<AdType>().unwrap(), AdType::Competitor);
        assert!("zap".parse::<SourceSite>().is_err());
    }

    #[test]
    fn or_sentinel_trims_and_falls_back() {
        assert_eq!(or_sentinel(Some("  R$ 1  "), UNKNOWN_PRICE), "R$ 1");
        assert_eq!(or_sentinel(Some("   "), UNKNOWN_PRICE), UNKNOWN_PRICE);
        assert_eq!(or_sentinel(None, UNKNOWN_CATEGORY), UNKNOWN_CATEGORY);
    }

    #[test]
    fn scoped_id_joins_prefix_and_native_id() {
        assert_eq!(make_scoped_id("iz", " casa-123 "), "iz-casa-123");
    }
}
