pub mod envelope;
pub mod http_client;
pub mod matcher;
pub mod parsers;

use crate::error::CollectError;
use async_trait::async_trait;

pub use self::envelope::decode_envelope;
pub use self::http_client::HttpClient;
pub use self::parsers::{extract_hidden_fields, extract_seller_items};

// ── Transport trait ───────────────────────────────────────────────────────────

/// Swappable page transport. One blocking round-trip per call, no retries.
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// GET `url` and return the body text.
    async fn fetch_page(&self, url: &str, cookie: Option<&str>) -> Result<String, CollectError>;

    /// POST `fields` as multipart/form-data to `url` and return the body text.
    async fn submit_page(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Result<String, CollectError>;
}
