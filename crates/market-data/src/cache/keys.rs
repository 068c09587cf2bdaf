use crate::models::{AssetCategory, Market};

/// Partition segment used when a request is not partitioned.
pub const ALL_PARTITIONS: &str = "all";

/// Build a cache key of the form `namespace:category:partition:id`.
pub fn cache_key(
    namespace: &str,
    category: AssetCategory,
    market: Option<Market>,
    id: &str,
) -> String {
    let partition = market.map_or(ALL_PARTITIONS, |m| m.as_str());
    format!("{}:{}:{}:{}", namespace, category, partition, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_layout() {
        assert_eq!(
            cache_key("findata", AssetCategory::Stock, Some(Market::HK), "list"),
            "findata:stock:HK:list"
        );
        assert_eq!(
            cache_key("findata", AssetCategory::Fund, None, "list"),
            "findata:fund:all:list"
        );
    }
}
