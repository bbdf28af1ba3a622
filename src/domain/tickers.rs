//! Energy commodity proxies, sector ETFs, majors and futures tracked by the refresh.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ticker {
    pub symbol: &'static str,
    pub name: &'static str,
}

impl Ticker {
    /// File stem used for the ticker's CSV (`CL=F` -> `CL_F`).
    pub fn file_stem(&self) -> String {
        self.symbol.replace('=', "_")
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.file_stem())
    }
}

const fn t(symbol: &'static str, name: &'static str) -> Ticker {
    Ticker { symbol, name }
}

pub const TICKERS: &[Ticker] = &[
    // Commodity ETFs/proxies
    t("USO", "United States Oil Fund"),
    t("UNG", "United States Natural Gas Fund"),
    t("URA", "Global X Uranium ETF"),
    t("COAL", "VanEck Coal ETF"),
    // Energy sector ETFs
    t("XLE", "Energy Select Sector SPDR Fund"),
    t("XOP", "SPDR S&P Oil & Gas Exploration & Production ETF"),
    t("VDE", "Vanguard Energy ETF"),
    t("IYE", "iShares U.S. Energy ETF"),
    // Major energy companies
    t("XOM", "Exxon Mobil Corporation"),
    t("CVX", "Chevron Corporation"),
    t("COP", "ConocoPhillips"),
    t("SLB", "Schlumberger Limited"),
    t("HAL", "Halliburton Company"),
    t("BKR", "Baker Hughes Company"),
    t("OXY", "Occidental Petroleum Corporation"),
    // Futures
    t("CL=F", "WTI Crude Oil Futures"),
    t("NG=F", "Natural Gas Futures"),
    t("BZ=F", "Brent Crude Oil Futures"),
    t("RB=F", "Gasoline RBOB Futures"),
    t("HO=F", "Heating Oil Futures"),
];

/// Case-insensitive lookup by symbol or file stem (`cl_f` finds `CL=F`).
pub fn find_ticker(symbol: &str) -> Option<&'static Ticker> {
    let wanted = symbol.trim().to_uppercase();
    TICKERS
        .iter()
        .find(|t| t.symbol == wanted || t.file_stem() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_twenty_unique_symbols() {
        let mut symbols: Vec<&str> = TICKERS.iter().map(|t| t.symbol).collect();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), 20);
    }

    #[test]
    fn test_futures_file_name_replaces_equals() {
        let crude = find_ticker("CL=F").unwrap();
        assert_eq!(crude.file_name(), "CL_F.csv");
        assert_eq!(find_ticker("cl_f").unwrap().symbol, "CL=F");
        assert!(find_ticker("AAPL").is_none());
    }
}
