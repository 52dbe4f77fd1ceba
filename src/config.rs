// src/config.rs

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::domain::listing::{AdType, SourceSite};
use crate::errors::ConfigError;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// Everything a run needs, built once in `main` and passed down by reference.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Literal token or `${ENV_VAR}`. Empty falls back to `TELEGRAM_TOKEN`.
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub disable_link_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Max listings delivered per run.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// 1 = sources run one after another.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between two pages of the same source.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Optional rendering proxy (ZenRows-style `?url=&apikey=` API).
    #[serde(default)]
    pub render_proxy_url: Option<String>,
    #[serde(default)]
    pub render_proxy_key: Option<String>,
}

/// One `{site, ad_type, start_url, max_pages}` tuple.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub site: SourceSite,
    pub ad_type: AdType,
    pub start_url: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// JS render wait forwarded to the render proxy. Direct fetches ignore it.
    #[serde(default)]
    pub settle_ms: u64,
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("listing_watch.sqlite3")
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_batch_limit() -> usize {
    20
}

fn default_workers() -> usize {
    1
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_max_pages() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

fn source(
    site: SourceSite,
    ad_type: AdType,
    start_url: &str,
    max_pages: u32,
    settle_ms: u64,
    default_location: &str,
    category: Option<&str>,
) -> SourceConfig {
    SourceConfig {
        site,
        ad_type,
        start_url: start_url.to_string(),
        max_pages,
        settle_ms,
        default_location: Some(default_location.to_string()),
        category: category.map(str::to_string),
        enabled: true,
    }
}

/// The São Sebastião watch list.
pub fn default_sources() -> Vec<SourceConfig> {
    let mut tropical = source(
        SourceSite::Tropical,
        AdType::Competitor,
        "https://tropicalimobiliaria.com.br/comprar/sp/sao-sebastiao/pagina-1/",
        1,
        5000,
        "São Sebastião",
        Some("Venda"),
    );
    // Strong anti-bot on this one.
    tropical.enabled = false;

    vec![
        source(
            SourceSite::Olx,
            AdType::Owner,
            "https://www.olx.com.br/imoveis/estado-sp/vale-do-paraiba-e-litoral-norte/sao-sebastiao?f=p",
            2,
            3000,
            "S. Sebastião",
            None,
        ),
        source(
            SourceSite::Olx,
            AdType::Competitor,
            "https://www.olx.com.br/imoveis/estado-sp/vale-do-paraiba-e-litoral-norte/sao-sebastiao?f=c",
            2,
            3000,
            "S. Sebastião",
            None,
        ),
        source(
            SourceSite::Riviera,
            AdType::Competitor,
            "https://www.rivieraimoveis.com/imobiliaria/venda/sao-sebastiao-sp/imoveis/364/1",
            1,
            10000,
            "São Sebastião",
            Some("Venda"),
        ),
        source(
            SourceSite::Iz,
            AdType::Competitor,
            "https://www.izimoveis.com.br/imoveis/a-venda/sao-sebastiao",
            1,
            5000,
            "São Sebastião",
            Some("Venda"),
        ),
        tropical,
        source(
            SourceSite::Adimov,
            AdType::Competitor,
            "https://www.adimov.com.br/imobiliaria/imoveis",
            1,
            8000,
            "São Sebastião",
            Some("Venda"),
        ),
    ]
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_api_base(),
            disable_link_preview: false,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_attempts: default_max_attempts(),
            page_delay_ms: default_page_delay_ms(),
            render_proxy_url: None,
            render_proxy_key: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            telegram: TelegramConfig::default(),
            notify: NotifyConfig::default(),
            ingest: IngestConfig::default(),
            http: HttpConfig::default(),
            sources: default_sources(),
        }
    }
}

impl AppConfig {
    /// Load config from `path`. A missing file yields the defaults unless
    /// `required` is set (the user named the file explicitly).
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        if !path.exists() && !required {
            debug!(config_path = %path.display(), "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        debug!(config_path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.workers == 0 {
            return Err(ConfigError::Invalid("ingest.workers must be >= 1".into()));
        }
        if self.notify.batch_limit == 0 {
            return Err(ConfigError::Invalid("notify.batch_limit must be >= 1".into()));
        }
        if self.http.max_attempts == 0 {
            return Err(ConfigError::Invalid("http.max_attempts must be >= 1".into()));
        }
        for s in &self.sources {
            if s.max_pages == 0 {
                return Err(ConfigError::Invalid(format!(
                    "source {} ({}): max_pages must be >= 1",
                    s.site, s.ad_type
                )));
            }
            Url::parse(&s.start_url).map_err(|e| {
                ConfigError::Invalid(format!(
                    "source {} ({}): bad start_url {}: {e}",
                    s.site, s.ad_type, s.start_url
                ))
            })?;
        }
        Ok(())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

impl TelegramConfig {
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        resolve_secret(&self.bot_token, TOKEN_ENV)
    }

    pub fn resolve_chat_id(&self) -> Result<String, ConfigError> {
        resolve_secret(&self.chat_id, CHAT_ID_ENV)
    }
}

impl HttpConfig {
    pub fn resolve_proxy_key(&self) -> Result<Option<String>, ConfigError> {
        match self.render_proxy_key.as_deref() {
            Some(raw) => resolve_secret(raw, "RENDER_PROXY_KEY").map(Some),
            None => Ok(None),
        }
    }
}

/// `${VAR}` is read from the environment, an empty value falls back to
/// `fallback_env`, anything else is taken literally.
pub fn resolve_secret(raw: &str, fallback_env: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let resolved = if let Some(rest) = raw.strip_prefix("${") {
        let var_name = rest.strip_suffix('}').ok_or_else(|| {
            ConfigError::Invalid(format!("Malformed env var reference: {raw}"))
        })?;
        std::env::var(var_name).map_err(|_| {
            ConfigError::MissingSecret(format!("Environment variable '{var_name}' is not set"))
        })?
    } else if raw.is_empty() {
        std::env::var(fallback_env).map_err(|_| {
            ConfigError::MissingSecret(format!(
                "not configured and environment variable '{fallback_env}' is not set"
            ))
        })?
    } else {
        raw.to_string()
    };

    if resolved.trim().is_empty() {
        return Err(ConfigError::MissingSecret(format!(
            "value for '{fallback_env}' must not be empty"
        )));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_original_sources() {
        let config = AppConfig::default();
        config.validate().unwrap();

        let enabled: Vec<_> = config
            .enabled_sources()
            .map(|s| (s.site, s.ad_type))
            .collect();
        assert_eq!(
            enabled,
            vec![
                (SourceSite::Olx, AdType::Owner),
                (SourceSite::Olx, AdType::Competitor),
                (SourceSite::Riviera, AdType::Competitor),
                (SourceSite::Iz, AdType::Competitor),
                (SourceSite::Adimov, AdType::Competitor),
            ]
        );
        assert!(config
            .sources
            .iter()
            .any(|s| s.site == SourceSite::Tropical && !s.enabled));
    }

    #[test]
    fn parses_minimal_toml_with_sources() {
        let config = AppConfig::from_toml_str(
            r#"
            database_path = "/tmp/x.sqlite3"

            [notify]
            batch_limit = 5

            [[sources]]
            site = "olx"
            ad_type = "owner"
            start_url = "https://www.olx.com.br/imoveis?f=p"
            max_pages = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/x.sqlite3"));
        assert_eq!(config.notify.batch_limit, 5);
        assert_eq!(config.ingest.workers, 1);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].max_pages, 3);
        assert!(config.sources[0].enabled);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
    }

    #[test]
    fn rejects_zero_pages_and_bad_urls() {
        let zero = AppConfig::from_toml_str(
            r#"
            [[sources]]
            site = "iz"
            ad_type = "competitor"
            start_url = "https://www.izimoveis.com.br/"
            max_pages = 0
            "#,
        );
        assert!(matches!(zero, Err(ConfigError::Invalid(_))));

        let bad_url = AppConfig::from_toml_str(
            r#"
            [[sources]]
            site = "iz"
            ad_type = "competitor"
            start_url = "not a url"
            "#,
        );
        assert!(matches!(bad_url, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_site() {
        let result = AppConfig::from_toml_str(
            r#"
            [[sources]]
            site = "zap"
            ad_type = "owner"
            start_url = "https://example.com"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn secret_resolution() {
        assert_eq!(resolve_secret("123:ABC", "UNUSED_VAR").unwrap(), "123:ABC");

        std::env::set_var("LISTING_WATCH_TEST_TOKEN", "999:XYZ");
        assert_eq!(
            resolve_secret("${LISTING_WATCH_TEST_TOKEN}", "UNUSED_VAR").unwrap(),
            "999:XYZ"
        );
        std::env::remove_var("LISTING_WATCH_TEST_TOKEN");

        let missing = resolve_secret("${LISTING_WATCH_NOPE_XYZ}", "UNUSED_VAR");
        assert!(missing
            .unwrap_err()
            .to_string()
            .contains("LISTING_WATCH_NOPE_XYZ"));

        let malformed = resolve_secret("${OOPS", "UNUSED_VAR");
        assert!(matches!(malformed, Err(ConfigError::Invalid(_))));

        let empty = resolve_secret("", "LISTING_WATCH_FALLBACK_NOT_SET");
        assert!(matches!(empty, Err(ConfigError::MissingSecret(_))));
    }
}
