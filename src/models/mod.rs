use std::collections::BTreeMap;
use std::fmt;

// ── Seller listing ────────────────────────────────────────────────────────────

/// One seller offer found on a product page or a load-more fragment.
/// `href` is kept exactly as it appears in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerItem {
    pub href: String,
    pub price: Option<String>,
}

impl SellerItem {
    pub fn new(href: impl Into<String>, price: Option<String>) -> Self {
        Self {
            href: href.into(),
            price,
        }
    }
}

impl fmt::Display for SellerItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sellerHref={}", self.href)?;
        match self.price.as_deref() {
            Some(price) if !price.is_empty() => write!(f, " | price={}", price),
            _ => Ok(()),
        }
    }
}

// ── Load-more envelope ────────────────────────────────────────────────────────

/// Decoded `<ajaxResponse>` payload: the rows fragment plus the next cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxEnvelope {
    pub rows_html: String,
    pub next_page: PageCursor,
}

// ── Pagination cursor ─────────────────────────────────────────────────────────

/// Opaque page token handed back by the server. `"-1"` ends pagination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    pub const END: &'static str = "-1";

    pub fn first() -> Self {
        Self("1".to_string())
    }

    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn is_end(&self) -> bool {
        self.0 == Self::END
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Hidden form fields ────────────────────────────────────────────────────────

/// Values of the requested hidden inputs, keyed by the requested spelling.
pub type HiddenFields = BTreeMap<String, String>;

/// Product-page fields the load-more endpoint needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken {
    pub cmtkn: String,
    pub id_product: String,
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Seller hrefs shared by every source, each with the prices seen across all
/// sources. Iteration order is ascending by href.
pub type CommonSellers = BTreeMap<String, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_is_trimmed() {
        assert!(PageCursor::new("  -1\n").is_end());
        assert_eq!(PageCursor::new(" 7 ").as_str(), "7");
        assert!(!PageCursor::first().is_end());
    }

    #[test]
    fn test_seller_item_display() {
        let item = SellerItem::new("/s/alice", Some("€12.50".into()));
        assert_eq!(item.to_string(), "sellerHref=/s/alice | price=€12.50");
        assert_eq!(SellerItem::new("/s/bob", None).to_string(), "sellerHref=/s/bob");
    }
}
