use crate::error::CollectError;
use crate::models::{HiddenFields, SellerItem};
use tracing::debug;

use super::matcher::{scan, ElementFrame, OpenTag, TagListener};

// ── Class markers ─────────────────────────────────────────────────────────────

/// `div.col-sellerProductInfo.col` wraps one offer in the current layout.
const SELLER_COLUMN: &[&str] = &["col-sellerProductInfo", "col"];
/// Price span inside a seller column.
const PRICE_SPAN: &[&str] = &["color-primary", "fw-bold"];
/// Legacy layout: `span.seller-name.d-flex` → `span.d-flex.has-content-centered.me-1` → `a[href]`.
const LEGACY_NAME_ROW: &[&str] = &["seller-name", "d-flex"];
const LEGACY_LINK_WRAPPER: &[&str] = &["d-flex", "has-content-centered", "me-1"];

// ── Seller items ──────────────────────────────────────────────────────────────

/// State of the seller column currently being read.
#[derive(Debug)]
struct SellerBlock {
    depth: usize,
    href: Option<String>,
    capturing_price: bool,
    price_depth: usize,
    price_parts: Vec<String>,
}

impl SellerBlock {
    fn new() -> Self {
        Self {
            depth: 1,
            href: None,
            capturing_price: false,
            price_depth: 0,
            price_parts: Vec::new(),
        }
    }

    fn finish(self) -> Option<SellerItem> {
        let price = self.price_parts.concat().trim().to_string();
        let href = self.href?;
        Some(SellerItem {
            href,
            price: (!price.is_empty()).then_some(price),
        })
    }
}

#[derive(Debug, Default)]
struct SellerItemCollector {
    block: Option<SellerBlock>,
    items: Vec<SellerItem>,
}

impl TagListener for SellerItemCollector {
    fn open(&mut self, tag: &OpenTag, stack: &[ElementFrame]) {
        let Some((frame, ancestors)) = stack.split_last() else {
            return;
        };

        if frame.is("div", SELLER_COLUMN) {
            self.block = Some(SellerBlock::new());
        } else if let Some(block) = self.block.as_mut() {
            block.depth += 1;
        }

        if frame.tag == "a" {
            match self.block.as_mut() {
                Some(block) => {
                    if block.href.is_none() {
                        block.href = tag.attr("href").map(str::to_string);
                    }
                }
                None => {
                    let in_name_row = ancestors.iter().any(|f| f.is("span", LEGACY_NAME_ROW));
                    let in_wrapper = ancestors.iter().any(|f| f.is("span", LEGACY_LINK_WRAPPER));
                    if in_name_row && in_wrapper {
                        if let Some(href) = tag.attr("href") {
                            self.items.push(SellerItem::new(href, None));
                        }
                    }
                }
            }
        }

        if frame.tag == "span" {
            if let Some(block) = self.block.as_mut() {
                if frame.has_classes(PRICE_SPAN) {
                    block.capturing_price = true;
                    block.price_depth = 1;
                } else if block.capturing_price {
                    block.price_depth += 1;
                }
            }
        }
    }

    fn close(&mut self, tag: &str, matched: bool, _stack: &[ElementFrame]) {
        let Some(block) = self.block.as_mut() else {
            return;
        };

        block.depth = block.depth.saturating_sub(1);
        if block.depth == 0 {
            if let Some(item) = self.block.take().and_then(SellerBlock::finish) {
                self.items.push(item);
            }
            return;
        }

        if matched && tag == "span" && block.capturing_price {
            block.price_depth = block.price_depth.saturating_sub(1);
            if block.price_depth == 0 {
                block.capturing_price = false;
            }
        }
    }

    fn text(&mut self, text: &str, _stack: &[ElementFrame]) {
        if let Some(block) = self.block.as_mut() {
            if block.capturing_price {
                block.price_parts.push(text.to_string());
            }
        }
    }
}

/// Seller profile links (and prices, when the layout has them) in document
/// order. Never fails; unrecognised or broken markup just yields fewer items.
pub fn extract_seller_items(html: &str) -> Vec<SellerItem> {
    let mut collector = SellerItemCollector::default();
    scan(html, &mut collector);
    debug!("Extracted {} seller items", collector.items.len());
    collector.items
}

// ── Hidden inputs ─────────────────────────────────────────────────────────────

struct HiddenInputCollector<'a> {
    wanted: &'a [&'a str],
    found: HiddenFields,
}

impl TagListener for HiddenInputCollector<'_> {
    fn open(&mut self, tag: &OpenTag, _stack: &[ElementFrame]) {
        if tag.name != "input" {
            return;
        }
        if let Some(kind) = tag.attr("type") {
            if !kind.eq_ignore_ascii_case("hidden") {
                return;
            }
        }
        let Some(name) = tag.attr("name") else {
            return;
        };
        if let Some(wanted) = self.wanted.iter().find(|w| w.eq_ignore_ascii_case(name)) {
            let value = tag.raw_attr("value").unwrap_or_default().to_string();
            self.found.insert((*wanted).to_string(), value);
        }
    }
}

/// Read the hidden `<input>` values for `names`. The last matching input wins;
/// every requested name must be present.
pub fn extract_hidden_fields(html: &str, names: &[&str]) -> Result<HiddenFields, CollectError> {
    let mut collector = HiddenInputCollector {
        wanted: names,
        found: HiddenFields::new(),
    };
    scan(html, &mut collector);

    let missing: Vec<String> = names
        .iter()
        .filter(|n| !collector.found.contains_key(**n))
        .map(|n| n.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CollectError::MissingRequiredField(missing));
    }

    Ok(collector.found)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn item(href: &str, price: Option<&str>) -> SellerItem {
        SellerItem::new(href, price.map(str::to_string))
    }

    #[test]
    fn test_no_blocks_yields_nothing() {
        assert!(extract_seller_items("").is_empty());
        assert!(extract_seller_items("<html><body><a href='/s/x'>x</a></body></html>").is_empty());
        assert!(extract_seller_items("<div class='col'><<<</span></a>").is_empty());
    }

    #[test]
    fn test_preferred_block_with_nested_price() {
        let html = r#"
            <div class="row">
              <div class="col-sellerProductInfo col">
                <span class="seller-name"><a href="/s/alice">alice</a></span>
                <div class="price-container">
                  <span class="fw-bold color-primary small"> <span>€</span><span>12.50</span> </span>
                </div>
              </div>
            </div>"#;
        assert_eq!(extract_seller_items(html), vec![item("/s/alice", Some("€12.50"))]);
    }

    #[test]
    fn test_first_anchor_wins_within_block() {
        let html = r#"<div class="col col-sellerProductInfo">
            <a href="/s/first">1</a><a href="/s/second">2</a>
            <span class="color-primary fw-bold">3,00 €</span></div>"#;
        assert_eq!(extract_seller_items(html), vec![item("/s/first", Some("3,00 €"))]);
    }

    #[test]
    fn test_block_without_anchor_is_dropped() {
        let html = r#"<div class="col-sellerProductInfo col">
            <span class="color-primary fw-bold">1,00 €</span></div>"#;
        assert!(extract_seller_items(html).is_empty());
    }

    #[test]
    fn test_block_without_price_span() {
        let html = r#"<div class="col-sellerProductInfo col"><a href="/s/bob">bob</a>
            <span class="color-primary">not a price</span></div>"#;
        assert_eq!(extract_seller_items(html), vec![item("/s/bob", None)]);
    }

    #[test]
    fn test_whitespace_only_price_is_none() {
        let html = r#"<div class="col-sellerProductInfo col"><a href="/s/bob">bob</a>
            <span class="color-primary fw-bold">   </span></div>"#;
        assert_eq!(extract_seller_items(html), vec![item("/s/bob", None)]);
    }

    #[test]
    fn test_text_after_price_span_not_captured() {
        let html = r#"<div class="col-sellerProductInfo col"><a href="/s/c">c</a>
            <span class="color-primary fw-bold">2,00 €</span><span>available: 4</span></div>"#;
        assert_eq!(extract_seller_items(html), vec![item("/s/c", Some("2,00 €"))]);
    }

    #[test]
    fn test_duplicates_are_kept_in_order() {
        let block = |href: &str, price: &str| {
            format!(
                r#"<div class="col-sellerProductInfo col"><a href="{href}">x</a><span class="color-primary fw-bold">{price}</span></div>"#
            )
        };
        let html = [block("/s/a", "1"), block("/s/b", "2"), block("/s/a", "3")].concat();
        assert_eq!(
            extract_seller_items(&html),
            vec![item("/s/a", Some("1")), item("/s/b", Some("2")), item("/s/a", Some("3"))]
        );
    }

    const LEGACY: &str = r#"
        <span class="seller-name d-flex">
          <span class="icon"></span>
          <span class="d-flex has-content-centered me-1"><a href="/Users/legacy">legacy</a></span>
        </span>"#;

    #[test]
    fn test_legacy_anchor() {
        assert_eq!(extract_seller_items(LEGACY), vec![item("/Users/legacy", None)]);
    }

    #[test]
    fn test_legacy_needs_both_markers() {
        let no_row = LEGACY.replace("seller-name d-flex", "d-flex");
        assert!(extract_seller_items(&no_row).is_empty());

        let no_wrapper = LEGACY.replace("has-content-centered", "centered");
        assert!(extract_seller_items(&no_wrapper).is_empty());
    }

    #[test]
    fn test_legacy_ignored_inside_preferred_block() {
        let html = format!(
            r#"<div class="col-sellerProductInfo col">{LEGACY}<span class="color-primary fw-bold">5 €</span></div>"#
        );
        assert_eq!(extract_seller_items(&html), vec![item("/Users/legacy", Some("5 €"))]);
    }

    #[test]
    fn test_unclosed_block_emits_nothing() {
        let html = r#"<div class="col-sellerProductInfo col"><a href="/s/open">x</a>"#;
        assert!(extract_seller_items(html).is_empty());
    }

    #[test]
    fn test_block_survives_bang_markup_and_script() {
        let html = r#"<!DOCTYPE html><![if !IE]><link rel="x"><![endif]>
            <div class="col-sellerProductInfo col">
              <!ELEMENT junk> wow <! nice
              <script>var s = '</div>'; if (a < b) {}</script>
              <a href="/s/alice">alice</a>
              <span class="color-primary fw-bold">1,00 €</span>
            </div>"#;
        assert_eq!(extract_seller_items(html), vec![item("/s/alice", Some("1,00 €"))]);
    }

    #[test]
    fn test_entities_in_href_and_price_decode_per_reference() {
        let html = r#"<div class="col-sellerProductInfo col"><a href="/s/a?x=1&amp;y=&bogus;">a</a>
            <span class="color-primary fw-bold">1&nbsp;&euro; &foo;</span></div>"#;
        assert_eq!(
            extract_seller_items(html),
            vec![item("/s/a?x=1&y=&bogus;", Some("1\u{a0}€ &foo;"))]
        );
    }

    const FORM: &str = r#"
        <form>
          <input type="hidden" name="__cmtkn" value="first">
          <input type="text" name="idProduct" value="visible">
          <INPUT NAME="IDPRODUCT" VALUE="42">
          <input type="HIDDEN" name="isSingle">
          <input type="hidden" name="__cmtkn" value="second"/>
        </form>"#;

    #[test]
    fn test_hidden_fields_last_match_wins() {
        let fields = extract_hidden_fields(FORM, &["__cmtkn", "idProduct", "isSingle"]).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["__cmtkn"], "second");
        assert_eq!(fields["idProduct"], "42");
        assert_eq!(fields["isSingle"], "");
    }

    #[test]
    fn test_hidden_fields_missing_is_named() {
        let err = extract_hidden_fields(FORM, &["__cmtkn", "sessionId"]).unwrap_err();
        match err {
            CollectError::MissingRequiredField(missing) => assert_eq!(missing, vec!["sessionId"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_hidden_fields_after_conditional_comments() {
        let page = format!(
            r#"<html><head><![if !IE]><link rel="stylesheet" href="/a.css"><![endif]>
            <style>.x > .y {{ content: "<input type=hidden name=__cmtkn value=fake>"; }}</style>
            </head><body>{FORM}</body></html>"#
        );
        let fields = extract_hidden_fields(&page, &["__cmtkn", "idProduct", "isSingle"]).unwrap();
        assert_eq!(fields["__cmtkn"], "second");
        assert_eq!(fields["idProduct"], "42");
    }
}
