//! Commodity names and their database tables.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Commodity {
    NaturalGas,
    CrudeOil,
    Electricity,
    /// Any other lower-cased, trimmed name. Loaded from `<name>_data`.
    Other(String),
}

impl Commodity {
    /// Normalize a free-form commodity name (`"NatGas"`, `"wti"`, `"power"`...).
    pub fn parse(name: &str) -> Self {
        let key = name.trim().to_lowercase();
        match key.as_str() {
            "natural_gas" | "natgas" | "ng" | "natural gas" => Self::NaturalGas,
            "crude_oil" | "crude" | "oil" | "wti" | "brent" | "crude oil" => Self::CrudeOil,
            "power" | "electric" | "electricity" => Self::Electricity,
            _ => Self::Other(key),
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Self::NaturalGas => "natural_gas",
            Self::CrudeOil => "crude_oil",
            Self::Electricity => "electricity",
            Self::Other(name) => name.as_str(),
        }
    }

    /// Raw table the pipeline loads from.
    pub fn raw_table(&self) -> String {
        match self {
            Self::NaturalGas => "natural_gas_prices".to_string(),
            Self::CrudeOil => "crude_oil_prices".to_string(),
            Self::Electricity => "power_demand".to_string(),
            Self::Other(name) => format!("{}_data", name),
        }
    }

    /// Table the pipeline replaces with its output.
    pub fn processed_table(&self) -> String {
        format!("{}_processed", self.slug())
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Commodity::parse(" NatGas "), Commodity::NaturalGas);
        assert_eq!(Commodity::parse("natural gas"), Commodity::NaturalGas);
        assert_eq!(Commodity::parse("WTI"), Commodity::CrudeOil);
        assert_eq!(Commodity::parse("brent"), Commodity::CrudeOil);
        assert_eq!(Commodity::parse("power"), Commodity::Electricity);
        assert_eq!(Commodity::parse(" Uranium"), Commodity::Other("uranium".into()));
    }

    #[test]
    fn test_tables() {
        assert_eq!(Commodity::NaturalGas.raw_table(), "natural_gas_prices");
        assert_eq!(Commodity::Electricity.raw_table(), "power_demand");
        assert_eq!(Commodity::parse("coal").raw_table(), "coal_data");
        assert_eq!(Commodity::CrudeOil.processed_table(), "crude_oil_processed");
    }
}
