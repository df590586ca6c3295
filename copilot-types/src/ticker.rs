//! Canonical ticker normalisation and the static symbol directory.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Upper-cased, whitespace-trimmed, whitespace-collapsed ticker used as every cache key.
///
/// `normalise` is idempotent: `normalise(normalise(x)) == normalise(x)`.
#[must_use]
pub fn normalise(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().to_ascii_uppercase()
}

/// Asset class recorded in the [`Directory`] for a canonical ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Common/preferred equity.
    Stock,
    /// Exchange-traded fund.
    Etf,
    /// Fixed-income instrument.
    Bond,
    /// Digital asset.
    Crypto,
    /// Open-end mutual fund.
    MutualFund,
    /// FX pair.
    Currency,
}

impl AssetKind {
    /// Lowercase, snake_case wire form (matches the `serde` rename).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Etf => "etf",
            Self::Bond => "bond",
            Self::Crypto => "crypto",
            Self::MutualFund => "mutual_fund",
            Self::Currency => "currency",
        }
    }
}

/// A directory entry: the external symbol a canonical ticker maps to, plus display metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Exchange-qualified symbol understood by the primary chart provider (e.g. `BRK-B`, `NESN.SW`).
    pub external_symbol: String,
    /// Human-readable display name.
    pub name: String,
    /// Asset class for client-side rendering decisions.
    pub kind: AssetKind,
}

/// Process-lifetime immutable table of known canonical → external symbol mappings.
///
/// The source data this table was distilled from defines duplicate entries for some
/// canonical tickers (two each for `IAG` and `NESN`); per the open question in the
/// specification this implementation resolves duplicates by keeping the *last* entry
/// in insertion order below, matching the observed last-write-wins behaviour of the
/// source's plain object literal.
#[must_use]
pub fn known_symbols() -> &'static HashMap<&'static str, DirectoryEntry> {
    static TABLE: OnceLock<HashMap<&'static str, DirectoryEntry>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        let mut insert = |canonical: &'static str, external: &str, name: &str, kind: AssetKind| {
            m.insert(
                canonical,
                DirectoryEntry {
                    external_symbol: external.to_string(),
                    name: name.to_string(),
                    kind,
                },
            );
        };
        insert("BRK B", "BRK-B", "Berkshire Hathaway Inc.", AssetKind::Stock);
        insert("BRK A", "BRK-A", "Berkshire Hathaway Inc.", AssetKind::Stock);
        insert("BTC", "BTC-USD", "Bitcoin", AssetKind::Crypto);
        insert("ETH", "ETH-USD", "Ethereum", AssetKind::Crypto);
        // First IAG entry (London Stock Exchange); superseded below per open question.
        insert("IAG", "IAG.L", "International Consolidated Airlines Group", AssetKind::Stock);
        // Second IAG entry wins: the US ticker for Iamgold Corp takes the canonical slot.
        insert("IAG", "IAG", "Iamgold Corp", AssetKind::Stock);
        // First NESN entry (Swiss exchange); superseded below.
        insert("NESN", "NESN.SW", "Nestle S.A.", AssetKind::Stock);
        insert("NESN", "NSRGY", "Nestle S.A. (ADR)", AssetKind::Stock);
        m
    })
}

/// Look up the directory entry for a canonical ticker, if statically known.
#[must_use]
pub fn lookup(canonical: &str) -> Option<&'static DirectoryEntry> {
    known_symbols().get(canonical)
}

/// Generate syntactic external-symbol variants of a canonical ticker (score 40 candidates,
/// see the Symbol Resolver algorithm).
#[must_use]
pub fn syntactic_variants(canonical: &str) -> Vec<String> {
    let collapsed = canonical.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut variants = Vec::with_capacity(3);
    if collapsed.contains(' ') {
        variants.push(collapsed.replace(' ', "."));
        variants.push(collapsed.replace(' ', "-"));
    }
    if !collapsed.contains('.') {
        variants.push(format!("{collapsed}.US"));
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_trims_and_uppercases() {
        assert_eq!(normalise("  aapl  "), "AAPL");
        assert_eq!(normalise("brk b"), "BRK B");
        assert_eq!(normalise("brk   b"), "BRK B");
    }

    #[test]
    fn normalise_is_idempotent() {
        let once = normalise(" tsla ");
        assert_eq!(normalise(&once), once);
    }

    #[test]
    fn duplicate_directory_entries_resolve_to_last_write() {
        assert_eq!(lookup("IAG").unwrap().external_symbol, "IAG");
        assert_eq!(lookup("NESN").unwrap().external_symbol, "NSRGY");
    }

    #[test]
    fn syntactic_variants_cover_dot_dash_and_us_suffix() {
        let variants = syntactic_variants("BRK B");
        assert!(variants.contains(&"BRK.B".to_string()));
        assert!(variants.contains(&"BRK-B".to_string()));
        assert!(!variants.iter().any(|v| v.ends_with(".US")));

        let single = syntactic_variants("AAPL");
        assert_eq!(single, vec!["AAPL.US".to_string()]);
    }

    proptest::proptest! {
        #[test]
        fn normalise_idempotent_prop(s in "\\PC{0,40}") {
            let once = normalise(&s);
            let twice = normalise(&once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
