use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-letter country code as it appears in the source data (`"DNK"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CountryCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl From<&str> for CountryCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// The two daily measures tracked per country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Cases,
    Deaths,
}

impl Measure {
    pub fn as_str(self) -> &'static str {
        match self {
            Measure::Cases => "cases",
            Measure::Deaths => "deaths",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the accumulator treats dates on which a country reported nothing.
///
/// In both policies an absent cell contributes zero to the running sum.
/// They differ only in what is written to the output cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillPolicy {
    /// Every output cell is defined; dates before a country's first report hold 0.
    #[default]
    Zero,
    /// Output cells stay absent wherever the input cell was absent.
    PreserveGaps,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_code_normalizes() {
        assert_eq!(CountryCode::new(" dnk ").as_str(), "DNK");
        assert_eq!(CountryCode::from("usa").to_string(), "USA");
    }

    #[test]
    fn test_fill_policy_yaml_names() {
        let policy: FillPolicy = serde_yaml::from_str("preserve-gaps").unwrap();
        assert_eq!(policy, FillPolicy::PreserveGaps);
        assert_eq!(FillPolicy::default(), FillPolicy::Zero);
    }
}
