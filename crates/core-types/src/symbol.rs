use serde::{Deserialize, Serialize};
use std::fmt;

/// An uppercase base+quote token (e.g. `BTCUSDT`), canonical across
/// providers. Providers translate to/from their native form via
/// `ExchangeProvider::normalize`/`denormalize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Symbol::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_uppercase() {
        assert_eq!(Symbol::new("btcusdt").as_str(), "BTCUSDT");
        assert_eq!(Symbol::new("  ethusdt  ").as_str(), "ETHUSDT");
    }

    #[test]
    fn equal_regardless_of_source_case() {
        assert_eq!(Symbol::new("btcusdt"), Symbol::new("BTCUSDT"));
    }
}
