//! Load-more pagination: POST the current cursor, decode the envelope,
//! extract seller items from its rows, follow `newPage` until `-1`.

use crate::error::CollectError;
use crate::models::{PageCursor, PageToken, SellerItem};
use crate::scraper::{decode_envelope, extract_seller_items, PageTransport};
use tracing::{debug, warn};

/// Empty filter set the endpoint expects on every request.
const FILTER_SETTINGS: &str = "[]";

pub struct Paginator<'a> {
    transport: &'a dyn PageTransport,
    url: &'a str,
    max_pages: usize,
}

impl<'a> Paginator<'a> {
    pub fn new(transport: &'a dyn PageTransport, url: &'a str, max_pages: usize) -> Self {
        Self {
            transport,
            url,
            // at least one load-more request is always made
            max_pages: max_pages.max(1),
        }
    }

    /// Every seller item across all pages, duplicates kept. Any failure
    /// discards what was gathered so far.
    pub async fn collect(
        &self,
        token: &PageToken,
        cookie: Option<&str>,
    ) -> Result<Vec<SellerItem>, CollectError> {
        let mut collected = Vec::new();
        let mut cursor = PageCursor::first();

        for round in 1..=self.max_pages {
            let fields = [
                ("__cmtkn", token.cmtkn.as_str()),
                ("idProduct", token.id_product.as_str()),
                ("page", cursor.as_str()),
                ("filterSettings", FILTER_SETTINGS),
            ];
            let body = self.transport.submit_page(self.url, &fields, cookie).await?;

            let envelope = decode_envelope(&body)?;
            let items = extract_seller_items(&envelope.rows_html);
            debug!(
                "Page {} (round {}): {} items, next {}",
                cursor,
                round,
                items.len(),
                envelope.next_page
            );
            if items.is_empty() {
                warn!("Page {} returned no seller items", cursor);
            }
            collected.extend(items);

            if envelope.next_page.is_end() {
                return Ok(collected);
            }
            cursor = envelope.next_page;
        }

        warn!("Giving up after {} pages, cursor still {}", self.max_pages, cursor);
        Err(CollectError::PageLimitExceeded {
            limit: self.max_pages,
            cursor: cursor.to_string(),
        })
    }
}
