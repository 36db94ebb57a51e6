//! Pair symbol normalization.
//!
//! Different providers format the same pair differently (`BTC/USD`,
//! `btc-usd`, `BTCUSD`). The canonical form is lowercase with separators
//! stripped, so levels from any provider compare against one bound pair.

/// Normalize a pair to canonical form: trimmed, lowercased, with `/`, `-`,
/// `_` and inner whitespace removed.
///
/// # Examples
///
/// ```
/// use orderbook_common::pairs;
///
/// assert_eq!(pairs::normalize("BTC/USD"), "btcusd");
/// assert_eq!(pairs::normalize(" eth-btc "), "ethbtc");
/// ```
pub fn normalize(pair: &str) -> String {
    pair.trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether two pair strings refer to the same pair after normalization.
pub fn is_same(first: &str, second: &str) -> bool {
    normalize(first) == normalize(second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators_and_case() {
        assert_eq!(normalize("BTC/USD"), "btcusd");
        assert_eq!(normalize("btc-usd"), "btcusd");
        assert_eq!(normalize("BTC_USD"), "btcusd");
        assert_eq!(normalize("  BTC USD  "), "btcusd");
        assert_eq!(normalize("btcusd"), "btcusd");
    }

    #[test]
    fn is_same_compares_normalized_forms() {
        assert!(is_same("BTC/USD", "btc-usd"));
        assert!(!is_same("BTC/USD", "ETH/USD"));
    }
}
