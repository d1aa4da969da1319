//! Instrument identifier type
//!
//! Symbols are plain identifiers (e.g. "BTC", "ETH/USDT") used both as map
//! keys and as file stems when resolving historical data sources, so the
//! only structural requirement is non-emptiness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a simulated instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol from a string.
    ///
    /// # Panics
    /// Panics if the symbol is empty.
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(!s.is_empty(), "Symbol must not be empty");
        Self(s)
    }

    /// Try to create a Symbol, returning None if empty.
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the symbol string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem used when resolving data files for this symbol.
    ///
    /// Path separators in pair notation ("ETH/USDT") are replaced so the
    /// symbol never escapes the data directory.
    pub fn file_stem(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_creation() {
        let symbol = Symbol::new("BTC");
        assert_eq!(symbol.as_str(), "BTC");
    }

    #[test]
    fn test_symbol_try_new() {
        assert!(Symbol::try_new("ETH").is_some());
        assert!(Symbol::try_new("").is_none());
    }

    #[test]
    #[should_panic(expected = "Symbol must not be empty")]
    fn test_symbol_empty_panics() {
        Symbol::new("");
    }

    #[test]
    fn test_symbol_file_stem() {
        assert_eq!(Symbol::new("BTC").file_stem(), "BTC");
        assert_eq!(Symbol::new("ETH/USDT").file_stem(), "ETH-USDT");
    }

    #[test]
    fn test_symbol_serialization() {
        let symbol = Symbol::new("SOL");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"SOL\"");

        let deserialized: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(symbol, deserialized);
    }

    #[test]
    fn test_symbol_ordering() {
        let mut symbols = vec![Symbol::new("ETH"), Symbol::new("BTC")];
        symbols.sort();
        assert_eq!(symbols[0].as_str(), "BTC");
    }
}
