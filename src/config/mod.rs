use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub pagination: PaginationConfig,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub get_timeout_secs: u64,
    pub post_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub jitter_ms: u64,
    /// Endpoint answering load-more requests with an `<ajaxResponse>` envelope.
    pub load_more_url: String,
}

/// Pagination configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Round-trips allowed per source before giving up on the `-1` marker.
    pub max_pages: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "card-market-finder/1.0 (+https://localhost)".to_string(),
            get_timeout_secs: 30,
            post_timeout_secs: 60,
            request_delay_ms: 0,
            jitter_ms: 0,
            load_more_url: "https://www.cardmarket.com/en/Pokemon/AjaxAction/Product_LoadMoreArticles"
                .to_string(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { max_pages: 500 }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("CMF").separator("__"))
            .build()?;

        let app_cfg = match cfg.try_deserialize::<AppConfig>() {
            Ok(c) => c,
            Err(e) => {
                warn!("Ignoring unreadable configuration ({}), using defaults", e);
                AppConfig::default()
            }
        };
        Ok(app_cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                "[pagination]\nmax_pages = 7\n\n[client]\njitter_ms = 40\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let app: AppConfig = cfg.try_deserialize().unwrap();
        assert_eq!(app.pagination.max_pages, 7);
        assert_eq!(app.client.jitter_ms, 40);
        assert_eq!(app.client.get_timeout_secs, 30);
        assert!(app.client.load_more_url.ends_with("Product_LoadMoreArticles"));
    }
}
