use super::lot::{AccountingMethod, Fifo, Hifo, Lifo};
use chrono::Duration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;

/// Decimal places used when rendering fiat amounts
pub const FIAT_DECIMALS: u32 = 4;
/// Decimal places used when rendering asset amounts
pub const CRYPTO_DECIMALS: u32 = 8;

const DEFAULT_LONG_TERM_DAYS: i64 = 365;

/// Lot selection method applied to every asset and holder in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountingMethodKind {
    /// First in, first out
    #[default]
    Fifo,
    /// Last in, first out
    Lifo,
    /// Highest cost per unit first
    Hifo,
}

impl AccountingMethodKind {
    pub fn method(self) -> &'static dyn AccountingMethod {
        match self {
            AccountingMethodKind::Fifo => &Fifo,
            AccountingMethodKind::Lifo => &Lifo,
            AccountingMethodKind::Hifo => &Hifo,
        }
    }
}

/// How the crypto fee of a disposal relates to its sent amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisposalFeePolicy {
    /// Fee is charged on top of the sent amount
    #[default]
    Exclusive,
    /// Fee is taken out of the sent amount
    Inclusive,
}

/// Run configuration: closed identifier sets plus calculation options
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Configuration {
    /// Known asset symbols (e.g. "BTC")
    pub assets: BTreeSet<String>,
    /// Known exchange / wallet names
    pub exchanges: BTreeSet<String>,
    /// Known holder names
    pub holders: BTreeSet<String>,
    #[serde(default)]
    pub accounting_method: AccountingMethodKind,
    #[serde(default)]
    pub disposal_fee: DisposalFeePolicy,
    /// Holding period (days) after which a gain is long-term. `null` disables classification.
    #[serde(default = "default_long_term_days")]
    pub long_term_days: Option<i64>,
}

fn default_long_term_days() -> Option<i64> {
    Some(DEFAULT_LONG_TERM_DAYS)
}

impl Configuration {
    pub fn new<A, E, H>(assets: A, exchanges: E, holders: H) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
        H: IntoIterator,
        H::Item: Into<String>,
    {
        Configuration {
            assets: assets.into_iter().map(Into::into).collect(),
            exchanges: exchanges.into_iter().map(Into::into).collect(),
            holders: holders.into_iter().map(Into::into).collect(),
            accounting_method: AccountingMethodKind::default(),
            disposal_fee: DisposalFeePolicy::default(),
            long_term_days: default_long_term_days(),
        }
    }

    pub fn with_accounting_method(mut self, method: AccountingMethodKind) -> Self {
        self.accounting_method = method;
        self
    }

    pub fn with_disposal_fee(mut self, policy: DisposalFeePolicy) -> Self {
        self.disposal_fee = policy;
        self
    }

    pub fn with_long_term_days(mut self, days: Option<i64>) -> Self {
        self.long_term_days = days;
        self
    }

    /// Read configuration from JSON
    pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Self> {
        let config: Configuration = serde_json::from_reader(reader)?;
        if let Some(days) = config.long_term_days {
            anyhow::ensure!(days >= 0, "long_term_days must not be negative: {days}");
            anyhow::ensure!(
                Duration::try_days(days).is_some(),
                "long_term_days is out of range: {days}"
            );
        }
        log::debug!(
            "Loaded configuration: {} assets, {} exchanges, {} holders, method={:?}",
            config.assets.len(),
            config.exchanges.len(),
            config.holders.len(),
            config.accounting_method
        );
        Ok(config)
    }

    pub fn is_known_asset(&self, symbol: &str) -> bool {
        !symbol.is_empty() && self.assets.contains(symbol)
    }

    pub fn is_known_exchange(&self, name: &str) -> bool {
        !name.is_empty() && self.exchanges.contains(name)
    }

    pub fn is_known_holder(&self, name: &str) -> bool {
        !name.is_empty() && self.holders.contains(name)
    }

    pub fn method(&self) -> &'static dyn AccountingMethod {
        self.accounting_method.method()
    }

    /// Saturates at the longest representable duration
    pub fn long_term_threshold(&self) -> Option<Duration> {
        self.long_term_days
            .map(|days| Duration::try_days(days).unwrap_or(Duration::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        Configuration::new(["B1", "B2"], ["Coinbase", "BlockFi"], ["Alice", "Bob"])
    }

    #[test]
    fn lookups_are_exact() {
        let config = config();
        assert!(config.is_known_asset("B1"));
        assert!(!config.is_known_asset("b1"));
        assert!(config.is_known_exchange("BlockFi"));
        assert!(!config.is_known_exchange("COinbase"));
        assert!(config.is_known_holder("Alice"));
        assert!(!config.is_known_holder("A lice"));
    }

    #[test]
    fn empty_names_are_never_known() {
        let config = Configuration::new([""], [""], [""]);
        assert!(!config.is_known_asset(""));
        assert!(!config.is_known_exchange(""));
        assert!(!config.is_known_holder(""));
    }

    #[test]
    fn defaults_applied_when_reading_json() {
        let json = r#"{"assets": ["BTC"], "exchanges": ["Kraken"], "holders": ["Bob"]}"#;
        let config = Configuration::read_json(json.as_bytes()).unwrap();
        assert_eq!(config.accounting_method, AccountingMethodKind::Fifo);
        assert_eq!(config.disposal_fee, DisposalFeePolicy::Exclusive);
        assert_eq!(config.long_term_days, Some(365));
    }

    #[test]
    fn options_read_from_json() {
        let json = r#"{
            "assets": ["BTC"],
            "exchanges": ["Kraken"],
            "holders": ["Bob"],
            "accounting_method": "hifo",
            "disposal_fee": "inclusive",
            "long_term_days": null
        }"#;
        let config = Configuration::read_json(json.as_bytes()).unwrap();
        assert_eq!(config.accounting_method, AccountingMethodKind::Hifo);
        assert_eq!(config.method().name(), "HIFO");
        assert_eq!(config.disposal_fee, DisposalFeePolicy::Inclusive);
        assert!(config.long_term_threshold().is_none());
    }

    #[test]
    fn negative_threshold_rejected() {
        let json = r#"{"assets": [], "exchanges": [], "holders": [], "long_term_days": -1}"#;
        assert!(Configuration::read_json(json.as_bytes()).is_err());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let json = r#"{"assets": [], "exchanges": [], "holders": [], "long_term_days": 1000000000000}"#;
        let err = Configuration::read_json(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let config = config().with_long_term_days(Some(1_000_000_000_000));
        assert_eq!(config.long_term_threshold(), Some(Duration::MAX));
    }
}
