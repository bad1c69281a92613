use crate::error::CollectError;
use crate::models::{CommonSellers, SellerItem};
use std::collections::BTreeSet;
use tracing::debug;

/// Keep the seller hrefs present in every source and collate their prices.
///
/// Prices are appended source by source in input order, each source in its
/// own item order; missing prices are skipped. An empty intersection (or no
/// sources at all) is [`CollectError::NoCommonItems`].
pub fn intersect_by_href(sources: &[Vec<SellerItem>]) -> Result<CommonSellers, CollectError> {
    let mut href_sets = sources
        .iter()
        .map(|items| items.iter().map(|i| i.href.as_str()).collect::<BTreeSet<_>>());

    let Some(first) = href_sets.next() else {
        return Err(CollectError::NoCommonItems);
    };
    let common = href_sets.fold(first, |acc, set| acc.intersection(&set).copied().collect());

    debug!("{} hrefs common to {} sources", common.len(), sources.len());
    if common.is_empty() {
        return Err(CollectError::NoCommonItems);
    }

    let mut collated: CommonSellers = common
        .iter()
        .map(|href| (href.to_string(), Vec::new()))
        .collect();
    for item in sources.iter().flatten() {
        if let (Some(prices), Some(price)) = (collated.get_mut(&item.href), item.price.as_deref()) {
            if !price.is_empty() {
                prices.push(price.to_string());
            }
        }
    }

    Ok(collated)
}
