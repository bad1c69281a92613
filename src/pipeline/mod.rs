//! Collector: ties transport → extraction → pagination → aggregation together.
//!
//! `collect_all_pages()` handles one product page:
//!   1. GET the page, read the `__cmtkn` / `idProduct` / `isSingle` hidden inputs
//!   2. Extract the seller items rendered on the page itself
//!   3. Page through the load-more endpoint and append every item
//!
//! `run_round()` does that for each URL in turn and intersects the results.
//! Sources never run concurrently and the first failure ends the round.

pub mod aggregate;
pub mod pagination;

use crate::config::AppConfig;
use crate::error::CollectError;
use crate::models::{CommonSellers, PageToken, SellerItem};
use crate::scraper::{extract_hidden_fields, extract_seller_items, PageTransport};
use tracing::{info, warn};

use self::aggregate::intersect_by_href;
use self::pagination::Paginator;

/// Hidden inputs a product page must carry. `isSingle` is not sent anywhere
/// but its absence means the page is not a product page.
pub const REQUIRED_FIELDS: [&str; 3] = ["__cmtkn", "idProduct", "isSingle"];

pub struct Collector<'a> {
    transport: &'a dyn PageTransport,
    config: &'a AppConfig,
}

impl<'a> Collector<'a> {
    pub fn new(transport: &'a dyn PageTransport, config: &'a AppConfig) -> Self {
        Self { transport, config }
    }

    /// All seller items for one product page, first page then every
    /// load-more page, duplicates kept.
    pub async fn collect_all_pages(
        &self,
        url: &str,
        cookie: Option<&str>,
    ) -> Result<Vec<SellerItem>, CollectError> {
        let html = self.transport.fetch_page(url, cookie).await?;
        let fields = extract_hidden_fields(&html, &REQUIRED_FIELDS)?;
        let token = PageToken {
            cmtkn: fields["__cmtkn"].clone(),
            id_product: fields["idProduct"].clone(),
        };

        let mut items = extract_seller_items(&html);
        info!("{}: {} sellers on the product page (idProduct={})", url, items.len(), token.id_product);

        let paginator = Paginator::new(
            self.transport,
            &self.config.client.load_more_url,
            self.config.pagination.max_pages,
        );
        let more = paginator.collect(&token, cookie).await?;
        info!("{}: {} more sellers from load-more pages", url, more.len());
        items.extend(more);

        if items.is_empty() {
            warn!("{}: no seller items found", url);
        }
        Ok(items)
    }

    /// One aggregation round over `urls`, strictly in order.
    pub async fn run_round(
        &self,
        urls: &[String],
        cookie: Option<&str>,
    ) -> Result<CommonSellers, CollectError> {
        let mut per_source = Vec::with_capacity(urls.len());
        for url in urls {
            per_source.push(self.collect_all_pages(url, cookie).await?);
        }

        let common = intersect_by_href(&per_source)?;
        info!("{} sellers common to {} URLs", common.len(), urls.len());
        Ok(common)
    }
}
