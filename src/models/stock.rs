use serde::{Deserialize, Serialize};

/// One row of the NASDAQ-100 dataset.
///
/// `market_cap`, `pe_ratio` and `dividend_yield` are kept as strings because
/// the upstream overview endpoints return them as strings and the CSV cache
/// stores the literal `"Unknown"` sentinel for degraded records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub ytd: f64,
    pub sector: String,
    pub industry: String,
    pub market_cap: String,
    pub pe_ratio: String,
    pub dividend_yield: String,
}

impl StockRecord {
    /// Sentinel record returned when every provider attempt failed.
    /// Numeric fields are zeroed, text fields carry "Unknown".
    pub fn unknown(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price: 0.0,
            ytd: 0.0,
            sector: "Unknown".to_string(),
            industry: "Unknown".to_string(),
            market_cap: "Unknown".to_string(),
            pe_ratio: "Unknown".to_string(),
            dividend_yield: "Unknown".to_string(),
        }
    }

    pub fn needs_sector(&self) -> bool {
        self.sector.trim().is_empty() || self.sector == "Unknown"
    }
}

/// Metadata about one persisted recommendation file.
#[derive(Debug, Clone, Serialize)]
pub struct ResultFile {
    pub name: String,
    pub date: String,
    pub size: u64,
}
