//! Legacy and venue-internal tickers mapped onto one canonical symbol, so that
//! the same asset listed on several exchanges coalesces into a single node.

/// `(alias, canonical)` pairs. Lookups are done on upper-cased input.
const ALIASES: &[(&str, &str)] = &[
    ("XBT", "BTC"),
    ("XXBT", "BTC"),
    ("XBTC", "BTC"),
    ("XETH", "ETH"),
    ("XXDG", "DOGE"),
    ("XDG", "DOGE"),
    ("XXRP", "XRP"),
    ("XLTC", "LTC"),
    ("XXLM", "XLM"),
    ("XETC", "ETC"),
    ("XZEC", "ZEC"),
    ("XXMR", "XMR"),
    ("ZUSD", "USD"),
    ("ZEUR", "EUR"),
    ("ZGBP", "GBP"),
    ("ZCAD", "CAD"),
    ("ZJPY", "JPY"),
    ("ZAUD", "AUD"),
    ("ZCHF", "CHF"),
];

/// Returns the canonical symbol for `symbol`: trimmed, upper-cased and passed
/// through the alias table.
pub fn canonical_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(upper)
}

/// Whether `symbol` (already upper-cased) is a known alias.
pub fn is_alias(symbol: &str) -> bool {
    ALIASES.iter().any(|(alias, _)| *alias == symbol)
}
