use super::config::{Configuration, DisposalFeePolicy};
use super::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Ledger category used by reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    #[serde(rename = "INTRA")]
    Intra,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::In => "IN",
            Category::Out => "OUT",
            Category::Intra => "INTRA",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant tag of a [`Transaction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransactionKind {
    Acquisition,
    Disposal,
    Transfer,
}

impl TransactionKind {
    pub fn name(self) -> &'static str {
        match self {
            TransactionKind::Acquisition => "Acquisition",
            TransactionKind::Disposal => "Disposal",
            TransactionKind::Transfer => "Transfer",
        }
    }

    pub fn category(self) -> Category {
        match self {
            TransactionKind::Acquisition => Category::In,
            TransactionKind::Disposal => Category::Out,
            TransactionKind::Transfer => Category::Intra,
        }
    }

    /// Accepts the variant name as well as the ledger category, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "acquisition" | "in" => Some(TransactionKind::Acquisition),
            "disposal" | "out" => Some(TransactionKind::Disposal),
            "transfer" | "intra" => Some(TransactionKind::Transfer),
            _ => None,
        }
    }
}

/// How an asset was acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionKind {
    Buy,
    Income,
    Interest,
    Mining,
    Staking,
    Airdrop,
    Gift,
}

impl AcquisitionKind {
    pub const ALL: [AcquisitionKind; 7] = [
        AcquisitionKind::Buy,
        AcquisitionKind::Income,
        AcquisitionKind::Interest,
        AcquisitionKind::Mining,
        AcquisitionKind::Staking,
        AcquisitionKind::Airdrop,
        AcquisitionKind::Gift,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AcquisitionKind::Buy => "buy",
            AcquisitionKind::Income => "income",
            AcquisitionKind::Interest => "interest",
            AcquisitionKind::Mining => "mining",
            AcquisitionKind::Staking => "staking",
            AcquisitionKind::Airdrop => "airdrop",
            AcquisitionKind::Gift => "gift",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Whether the fiat value received is taxable income at the time of receipt
    pub fn is_income(self) -> bool {
        !matches!(self, AcquisitionKind::Buy | AcquisitionKind::Gift)
    }
}

/// How an asset was disposed of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisposalKind {
    Sell,
    Gift,
    Donate,
    Expense,
}

impl DisposalKind {
    pub const ALL: [DisposalKind; 4] = [
        DisposalKind::Sell,
        DisposalKind::Gift,
        DisposalKind::Donate,
        DisposalKind::Expense,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DisposalKind::Sell => "sell",
            DisposalKind::Gift => "gift",
            DisposalKind::Donate => "donate",
            DisposalKind::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Fields shared by every variant, before validation
#[derive(Debug, Clone, Copy)]
pub struct CommonInput<'a> {
    pub line: u64,
    /// ISO-8601 timestamp with an explicit offset
    pub timestamp: &'a str,
    pub asset: &'a str,
    /// Fiat price per unit of asset
    pub spot_price: Decimal,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub struct AcquisitionInput<'a> {
    pub common: CommonInput<'a>,
    pub exchange: &'a str,
    pub holder: &'a str,
    pub kind: AcquisitionKind,
    pub crypto_in: Decimal,
    pub crypto_fee: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct DisposalInput<'a> {
    pub common: CommonInput<'a>,
    pub exchange: &'a str,
    pub holder: &'a str,
    pub kind: DisposalKind,
    pub crypto_sent: Decimal,
    pub crypto_fee: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferInput<'a> {
    pub common: CommonInput<'a>,
    pub from_exchange: &'a str,
    pub from_holder: &'a str,
    pub to_exchange: &'a str,
    pub to_holder: &'a str,
    pub crypto_sent: Decimal,
    pub crypto_received: Decimal,
}

/// Validated fields shared by every variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Common {
    line: u64,
    timestamp: DateTime<FixedOffset>,
    asset: String,
    spot_price: Decimal,
    notes: Option<String>,
}

impl Common {
    fn new(config: &Configuration, input: &CommonInput) -> Result<Self> {
        let line = check_line(input.line)?;
        let timestamp = parse_timestamp(line, "timestamp", input.timestamp)?;
        let asset = check_known(line, "asset", input.asset, config.is_known_asset(input.asset))?;
        let spot_price = check_positive(line, "spot_price", input.spot_price)?;
        Ok(Common {
            line,
            timestamp,
            asset,
            spot_price,
            notes: input.notes.filter(|n| !n.is_empty()).map(str::to_string),
        })
    }
}

/// Asset entering a holder's account from outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    common: Common,
    exchange: String,
    holder: String,
    kind: AcquisitionKind,
    crypto_in: Decimal,
    crypto_fee: Decimal,
    fiat_in_no_fee: Decimal,
    fiat_fee: Decimal,
    fiat_in_with_fee: Decimal,
    fiat_taxable_amount: Decimal,
}

impl Acquisition {
    pub fn new(config: &Configuration, input: AcquisitionInput) -> Result<Self> {
        let common = Common::new(config, &input.common)?;
        let line = common.line;
        let exchange = check_known(
            line,
            "exchange",
            input.exchange,
            config.is_known_exchange(input.exchange),
        )?;
        let holder = check_known(line, "holder", input.holder, config.is_known_holder(input.holder))?;
        let crypto_in = check_positive(line, "crypto_in", input.crypto_in)?;
        let crypto_fee = check_non_negative(line, "crypto_fee", input.crypto_fee)?;

        let fiat_in_no_fee = checked_mul(line, "fiat_in_no_fee", crypto_in, common.spot_price)?;
        let fiat_fee = checked_mul(line, "fiat_fee", crypto_fee, common.spot_price)?;
        let fiat_in_with_fee = checked_add(line, "fiat_in_with_fee", fiat_in_no_fee, fiat_fee)?;
        let fiat_taxable_amount = if input.kind.is_income() {
            fiat_in_no_fee
        } else {
            Decimal::ZERO
        };

        Ok(Acquisition {
            exchange,
            holder,
            kind: input.kind,
            crypto_in,
            crypto_fee,
            fiat_in_no_fee,
            fiat_fee,
            fiat_in_with_fee,
            fiat_taxable_amount,
            common,
        })
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn kind(&self) -> AcquisitionKind {
        self.kind
    }

    pub fn crypto_in(&self) -> Decimal {
        self.crypto_in
    }

    pub fn crypto_fee(&self) -> Decimal {
        self.crypto_fee
    }

    pub fn fiat_in_no_fee(&self) -> Decimal {
        self.fiat_in_no_fee
    }

    /// Total cost basis of the lot this acquisition opens
    pub fn fiat_in_with_fee(&self) -> Decimal {
        self.fiat_in_with_fee
    }
}

/// Asset leaving a holder's account to an outside party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposal {
    common: Common,
    exchange: String,
    holder: String,
    kind: DisposalKind,
    fee_policy: DisposalFeePolicy,
    crypto_sent: Decimal,
    crypto_fee: Decimal,
    crypto_disposed: Decimal,
    crypto_out_no_fee: Decimal,
    fiat_out_no_fee: Decimal,
    fiat_fee: Decimal,
    fiat_out_with_fee: Decimal,
}

impl Disposal {
    pub fn new(config: &Configuration, input: DisposalInput) -> Result<Self> {
        let common = Common::new(config, &input.common)?;
        let line = common.line;
        let exchange = check_known(
            line,
            "exchange",
            input.exchange,
            config.is_known_exchange(input.exchange),
        )?;
        let holder = check_known(line, "holder", input.holder, config.is_known_holder(input.holder))?;
        let crypto_sent = check_non_zero(line, "crypto_sent", input.crypto_sent)?;
        let crypto_fee = check_non_negative(line, "crypto_fee", input.crypto_fee)?;

        let fee_policy = config.disposal_fee;
        let (crypto_disposed, crypto_out_no_fee) = match fee_policy {
            DisposalFeePolicy::Exclusive => (
                checked_add(line, "crypto_disposed", crypto_sent, crypto_fee)?,
                crypto_sent,
            ),
            DisposalFeePolicy::Inclusive => {
                if crypto_fee >= crypto_sent {
                    return Err(Error::FeeNotLessThanAmount {
                        line,
                        fee: crypto_fee,
                        amount: crypto_sent,
                    });
                }
                (crypto_sent, crypto_sent - crypto_fee)
            }
        };

        let spot_price = common.spot_price;
        let fiat_out_no_fee = checked_mul(line, "fiat_out_no_fee", crypto_out_no_fee, spot_price)?;
        let fiat_fee = checked_mul(line, "fiat_fee", crypto_fee, spot_price)?;
        let fiat_out_with_fee = checked_mul(line, "fiat_out_with_fee", crypto_disposed, spot_price)?;
        Ok(Disposal {
            exchange,
            holder,
            kind: input.kind,
            fee_policy,
            crypto_sent,
            crypto_fee,
            crypto_disposed,
            crypto_out_no_fee,
            fiat_out_no_fee,
            fiat_fee,
            fiat_out_with_fee,
            common,
        })
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn kind(&self) -> DisposalKind {
        self.kind
    }

    pub fn fee_policy(&self) -> DisposalFeePolicy {
        self.fee_policy
    }

    pub fn crypto_sent(&self) -> Decimal {
        self.crypto_sent
    }

    pub fn crypto_fee(&self) -> Decimal {
        self.crypto_fee
    }

    /// Quantity that leaves the holder and is matched against lots
    pub fn crypto_disposed(&self) -> Decimal {
        self.crypto_disposed
    }

    /// Quantity that reaches the counterparty
    pub fn crypto_out_no_fee(&self) -> Decimal {
        self.crypto_out_no_fee
    }

    /// Proceeds of the disposal
    pub fn fiat_out_no_fee(&self) -> Decimal {
        self.fiat_out_no_fee
    }

    pub fn fiat_out_with_fee(&self) -> Decimal {
        self.fiat_out_with_fee
    }
}

/// Asset moving between two accounts of the same owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    common: Common,
    from_exchange: String,
    from_holder: String,
    to_exchange: String,
    to_holder: String,
    crypto_sent: Decimal,
    crypto_received: Decimal,
    crypto_fee: Decimal,
    fiat_fee: Decimal,
}

impl Transfer {
    pub fn new(config: &Configuration, input: TransferInput) -> Result<Self> {
        let common = Common::new(config, &input.common)?;
        let line = common.line;
        let from_exchange = check_known(
            line,
            "from_exchange",
            input.from_exchange,
            config.is_known_exchange(input.from_exchange),
        )?;
        let from_holder = check_known(
            line,
            "from_holder",
            input.from_holder,
            config.is_known_holder(input.from_holder),
        )?;
        let to_exchange = check_known(
            line,
            "to_exchange",
            input.to_exchange,
            config.is_known_exchange(input.to_exchange),
        )?;
        let to_holder = check_known(
            line,
            "to_holder",
            input.to_holder,
            config.is_known_holder(input.to_holder),
        )?;
        let crypto_sent = check_non_zero(line, "crypto_sent", input.crypto_sent)?;
        let crypto_received = check_positive(line, "crypto_received", input.crypto_received)?;

        if from_exchange == to_exchange && from_holder == to_holder {
            return Err(Error::SendingToSelf { line });
        }
        if crypto_sent < crypto_received {
            return Err(Error::SentLessThanReceived {
                line,
                sent: crypto_sent,
                received: crypto_received,
            });
        }

        let crypto_fee = crypto_sent - crypto_received;
        let fiat_fee = checked_mul(line, "fiat_fee", crypto_fee, common.spot_price)?;
        Ok(Transfer {
            from_exchange,
            from_holder,
            to_exchange,
            to_holder,
            crypto_sent,
            crypto_received,
            crypto_fee,
            fiat_fee,
            common,
        })
    }

    pub fn from_exchange(&self) -> &str {
        &self.from_exchange
    }

    pub fn from_holder(&self) -> &str {
        &self.from_holder
    }

    pub fn to_exchange(&self) -> &str {
        &self.to_exchange
    }

    pub fn to_holder(&self) -> &str {
        &self.to_holder
    }

    pub fn crypto_sent(&self) -> Decimal {
        self.crypto_sent
    }

    pub fn crypto_received(&self) -> Decimal {
        self.crypto_received
    }

    /// Whether the asset changes holder (and therefore lot queue)
    pub fn changes_holder(&self) -> bool {
        self.from_holder != self.to_holder
    }
}

/// A validated, immutable ledger record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Acquisition(Acquisition),
    Disposal(Disposal),
    Transfer(Transfer),
}

impl From<Acquisition> for Transaction {
    fn from(t: Acquisition) -> Self {
        Transaction::Acquisition(t)
    }
}

impl From<Disposal> for Transaction {
    fn from(t: Disposal) -> Self {
        Transaction::Disposal(t)
    }
}

impl From<Transfer> for Transaction {
    fn from(t: Transfer) -> Self {
        Transaction::Transfer(t)
    }
}

impl Transaction {
    fn common(&self) -> &Common {
        match self {
            Transaction::Acquisition(t) => &t.common,
            Transaction::Disposal(t) => &t.common,
            Transaction::Transfer(t) => &t.common,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Acquisition(_) => TransactionKind::Acquisition,
            Transaction::Disposal(_) => TransactionKind::Disposal,
            Transaction::Transfer(_) => TransactionKind::Transfer,
        }
    }

    pub fn category(&self) -> Category {
        self.kind().category()
    }

    /// Fails with a type error naming `name` unless this is a `expected` record
    pub fn type_check(&self, name: &str, expected: TransactionKind) -> Result<()> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(Error::WrongVariant {
                name: name.to_string(),
                expected: expected.name(),
                found: self.kind().name(),
            })
        }
    }

    pub fn as_acquisition(&self) -> Option<&Acquisition> {
        match self {
            Transaction::Acquisition(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_disposal(&self) -> Option<&Disposal> {
        match self {
            Transaction::Disposal(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_transfer(&self) -> Option<&Transfer> {
        match self {
            Transaction::Transfer(t) => Some(t),
            _ => None,
        }
    }

    pub fn line(&self) -> u64 {
        self.common().line
    }

    pub fn timestamp(&self) -> &DateTime<FixedOffset> {
        &self.common().timestamp
    }

    pub fn asset(&self) -> &str {
        &self.common().asset
    }

    pub fn spot_price(&self) -> Decimal {
        self.common().spot_price
    }

    pub fn notes(&self) -> Option<&str> {
        self.common().notes.as_deref()
    }

    /// Total order used for resolution: instant, then source line
    pub fn sort_key(&self) -> (DateTime<FixedOffset>, u64) {
        (self.common().timestamp, self.common().line)
    }

    pub fn crypto_fee(&self) -> Decimal {
        match self {
            Transaction::Acquisition(t) => t.crypto_fee,
            Transaction::Disposal(t) => t.crypto_fee,
            Transaction::Transfer(t) => t.crypto_fee,
        }
    }

    pub fn fiat_fee(&self) -> Decimal {
        match self {
            Transaction::Acquisition(t) => t.fiat_fee,
            Transaction::Disposal(t) => t.fiat_fee,
            Transaction::Transfer(t) => t.fiat_fee,
        }
    }

    pub fn is_taxable(&self) -> bool {
        match self {
            Transaction::Acquisition(t) => t.kind.is_income(),
            Transaction::Disposal(_) => true,
            Transaction::Transfer(t) => t.crypto_fee > Decimal::ZERO,
        }
    }

    pub fn fiat_taxable_amount(&self) -> Decimal {
        match self {
            Transaction::Acquisition(t) => t.fiat_taxable_amount,
            Transaction::Disposal(t) => t.fiat_out_no_fee,
            Transaction::Transfer(t) => t.fiat_fee,
        }
    }

    /// Change of the owner's total holdings in asset units
    pub fn crypto_balance_change(&self) -> Decimal {
        match self {
            Transaction::Acquisition(t) => t.crypto_in,
            Transaction::Disposal(t) => Decimal::ZERO - t.crypto_disposed,
            Transaction::Transfer(t) => Decimal::ZERO - t.crypto_fee,
        }
    }

    pub fn fiat_balance_change(&self) -> Decimal {
        match self {
            Transaction::Acquisition(t) => t.fiat_in_with_fee,
            Transaction::Disposal(t) => Decimal::ZERO - t.fiat_out_with_fee,
            Transaction::Transfer(t) => Decimal::ZERO - t.fiat_fee,
        }
    }
}

fn check_line(line: u64) -> Result<u64> {
    if line == 0 {
        return Err(Error::NonPositiveLine(line));
    }
    Ok(line)
}

fn check_known(line: u64, name: &'static str, value: &str, known: bool) -> Result<String> {
    if !known {
        return Err(Error::Unknown {
            line,
            name,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

fn check_positive(line: u64, name: &'static str, value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(Error::NonPositive { line, name, value });
    }
    Ok(value)
}

fn check_non_zero(line: u64, name: &'static str, value: Decimal) -> Result<Decimal> {
    if value.is_zero() {
        return Err(Error::Zero { line, name });
    }
    check_positive(line, name, value)
}

fn check_non_negative(line: u64, name: &'static str, value: Decimal) -> Result<Decimal> {
    if value < Decimal::ZERO {
        return Err(Error::Negative { line, name, value });
    }
    Ok(value)
}

fn checked_mul(line: u64, name: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or(Error::Overflow { line, name })
}

fn checked_add(line: u64, name: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or(Error::Overflow { line, name })
}

/// Accepts RFC 3339 and the rendered form; rejects timestamps without an offset
pub(crate) fn parse_timestamp(
    line: u64,
    name: &'static str,
    s: &str,
) -> Result<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Ok(dt);
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
    if naive {
        return Err(Error::NoTimezone {
            line,
            name,
            value: s.to_string(),
        });
    }
    Err(Error::InvalidTimestamp {
        line,
        name,
        value: s.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use chrono::{Datelike, Timelike};
    use rust_decimal_macros::dec;

    pub(crate) fn config() -> Configuration {
        Configuration::new(
            ["B1", "B2", "BTC"],
            ["Coinbase", "Coinbase Pro", "BlockFi", "Kraken"],
            ["Alice", "Bob"],
        )
    }

    pub(crate) fn common(line: u64, timestamp: &'static str, asset: &'static str, spot: Decimal) -> CommonInput<'static> {
        CommonInput {
            line,
            timestamp,
            asset,
            spot_price: spot,
            notes: None,
        }
    }

    fn taxable_transfer_input() -> TransferInput<'static> {
        TransferInput {
            common: common(19, "2021-01-02T08:42:43.882Z", "B1", dec!(1000.0)),
            from_exchange: "Coinbase Pro",
            from_holder: "Bob",
            to_exchange: "BlockFi",
            to_holder: "Alice",
            crypto_sent: dec!(2.0002),
            crypto_received: dec!(1.9998),
        }
    }

    fn acquisition_input() -> AcquisitionInput<'static> {
        AcquisitionInput {
            common: common(45, "2021-01-12T11:51:38Z", "B1", dec!(10000)),
            exchange: "BlockFi",
            holder: "Bob",
            kind: AcquisitionKind::Buy,
            crypto_in: dec!(1),
            crypto_fee: dec!(0),
        }
    }

    fn disposal_input() -> DisposalInput<'static> {
        DisposalInput {
            common: common(50, "2021-03-01T10:00:00+01:00", "B1", dec!(12000)),
            exchange: "Coinbase",
            holder: "Alice",
            kind: DisposalKind::Sell,
            crypto_sent: dec!(0.5),
            crypto_fee: dec!(0.01),
        }
    }

    #[test]
    fn taxable_transfer() {
        let config = config();
        let tx: Transaction = Transfer::new(&config, taxable_transfer_input()).unwrap().into();

        tx.type_check("my_instance", TransactionKind::Transfer).unwrap();
        assert!(tx.is_taxable());
        assert_eq!(tx.category(), Category::Intra);
        assert_eq!(tx.fiat_taxable_amount(), dec!(0.4));
        assert_eq!(tx.line(), 19);

        let ts = tx.timestamp();
        assert_eq!(ts.year(), 2021);
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.day(), 2);
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts.minute(), 42);
        assert_eq!(ts.second(), 43);
        assert_eq!(ts.nanosecond(), 882_000_000);
        assert_eq!(ts.offset().local_minus_utc(), 0);

        let transfer = tx.as_transfer().unwrap();
        assert_eq!(tx.asset(), "B1");
        assert_eq!(transfer.from_exchange(), "Coinbase Pro");
        assert_eq!(transfer.from_holder(), "Bob");
        assert_eq!(transfer.to_exchange(), "BlockFi");
        assert_eq!(transfer.to_holder(), "Alice");
        assert_eq!(tx.spot_price(), dec!(1000));
        assert_eq!(transfer.crypto_sent(), dec!(2.0002));
        assert_eq!(transfer.crypto_received(), dec!(1.9998));
        assert_eq!(tx.crypto_fee(), dec!(0.0004));
        assert_eq!(tx.fiat_fee(), dec!(0.4));
        assert_eq!(tx.crypto_balance_change(), dec!(-0.0004));
        assert_eq!(tx.fiat_balance_change(), dec!(-0.4));
    }

    #[test]
    fn non_taxable_transfer() {
        let config = config();
        let tx: Transaction = Transfer::new(
            &config,
            TransferInput {
                common: common(19, "2021-01-02T08:42:43.882Z", "B2", dec!(100.0)),
                from_exchange: "Coinbase",
                from_holder: "Bob",
                to_exchange: "Coinbase",
                to_holder: "Alice",
                crypto_sent: dec!(30),
                crypto_received: dec!(30),
            },
        )
        .unwrap()
        .into();

        assert!(!tx.is_taxable());
        assert_eq!(tx.fiat_taxable_amount(), Decimal::ZERO);
        assert_eq!(tx.asset(), "B2");
        assert_eq!(tx.crypto_fee(), Decimal::ZERO);
        assert_eq!(tx.fiat_fee(), Decimal::ZERO);
        assert_eq!(tx.crypto_balance_change(), Decimal::ZERO);
        assert_eq!(tx.fiat_balance_change(), Decimal::ZERO);
    }

    #[test]
    fn transfer_fee_is_sent_minus_received() {
        let config = config();
        for (sent, received, spot) in [
            (dec!(1), dec!(1), dec!(5)),
            (dec!(3.5), dec!(3.25), dec!(20000)),
            (dec!(0.00000002), dec!(0.00000001), dec!(31000.1234)),
        ] {
            let mut input = taxable_transfer_input();
            input.crypto_sent = sent;
            input.crypto_received = received;
            input.common.spot_price = spot;
            let tx: Transaction = Transfer::new(&config, input).unwrap().into();
            assert_eq!(tx.crypto_fee(), sent - received);
            assert_eq!(tx.crypto_balance_change(), received - sent);
            assert_eq!(tx.fiat_taxable_amount(), (sent - received) * spot);
        }
    }

    #[test]
    fn sending_to_self_rejected() {
        let config = config();
        let mut input = taxable_transfer_input();
        input.from_exchange = "BlockFi";
        input.to_exchange = "BlockFi";
        input.from_holder = "Alice";
        input.to_holder = "Alice";

        let err = Transfer::new(&config, input).unwrap_err();
        assert_eq!(err, Error::SendingToSelf { line: 19 });
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.to_string().contains("sending to self"));
    }

    #[test]
    fn sent_less_than_received_rejected() {
        let config = config();
        let mut input = taxable_transfer_input();
        input.crypto_sent = dec!(1.0002);
        input.crypto_received = dec!(2.9998);

        let err = Transfer::new(&config, input).unwrap_err();
        assert!(matches!(err, Error::SentLessThanReceived { line: 19, .. }));
        assert!(err.to_string().contains("crypto sent < crypto received"));
    }

    #[test]
    fn transfer_amount_checks() {
        let config = config();

        let mut input = taxable_transfer_input();
        input.crypto_sent = dec!(0);
        assert_eq!(
            Transfer::new(&config, input).unwrap_err(),
            Error::Zero {
                line: 19,
                name: "crypto_sent"
            }
        );

        let mut input = taxable_transfer_input();
        input.crypto_sent = dec!(-2);
        assert!(matches!(
            Transfer::new(&config, input).unwrap_err(),
            Error::NonPositive {
                name: "crypto_sent",
                ..
            }
        ));

        let mut input = taxable_transfer_input();
        input.crypto_received = dec!(-1.9998);
        assert!(matches!(
            Transfer::new(&config, input).unwrap_err(),
            Error::NonPositive {
                name: "crypto_received",
                ..
            }
        ));

        let mut input = taxable_transfer_input();
        input.common.spot_price = dec!(-1000);
        assert!(matches!(
            Transfer::new(&config, input).unwrap_err(),
            Error::NonPositive {
                name: "spot_price",
                ..
            }
        ));
    }

    #[test]
    fn unknown_identifiers_rejected() {
        let config = config();
        let cases: [(fn(&mut TransferInput<'static>), &str); 5] = [
            (|i| i.common.asset = "hhh", "asset"),
            (|i| i.from_exchange = "COinbase Pro", "from_exchange"),
            (|i| i.from_holder = "", "from_holder"),
            (|i| i.to_exchange = "", "to_exchange"),
            (|i| i.to_holder = "A lice", "to_holder"),
        ];
        for (mutate, field) in cases {
            let mut input = taxable_transfer_input();
            mutate(&mut input);
            let err = Transfer::new(&config, input).unwrap_err();
            assert!(
                matches!(&err, Error::Unknown { name, .. } if *name == field),
                "expected unknown {field}, got {err:?}"
            );
            assert_eq!(err.kind(), ErrorKind::Value);
        }
    }

    #[test]
    fn line_must_be_positive() {
        let config = config();
        let mut input = taxable_transfer_input();
        input.common.line = 0;
        assert_eq!(
            Transfer::new(&config, input).unwrap_err(),
            Error::NonPositiveLine(0)
        );
    }

    #[test]
    fn timestamp_requires_offset() {
        let config = config();
        let mut input = taxable_transfer_input();
        input.common.timestamp = "2021-01-02T08:42:43";
        let err = Transfer::new(&config, input).unwrap_err();
        assert!(matches!(err, Error::NoTimezone { .. }));
        assert_eq!(err.kind(), ErrorKind::Value);

        let mut input = taxable_transfer_input();
        input.common.timestamp = "yesterday";
        let err = Transfer::new(&config, input).unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp { .. }));
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn type_check_names_actual_variant() {
        let config = config();
        let tx: Transaction = Acquisition::new(&config, acquisition_input()).unwrap().into();
        let err = tx
            .type_check("my_instance", TransactionKind::Transfer)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter 'my_instance' is not of type Transfer: Acquisition"
        );
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(tx.as_transfer().is_none());
        assert!(tx.as_acquisition().is_some());
    }

    #[test]
    fn buy_acquisition_not_taxable() {
        let config = config();
        let mut input = acquisition_input();
        input.crypto_fee = dec!(0.001);
        let tx: Transaction = Acquisition::new(&config, input).unwrap().into();

        assert_eq!(tx.category(), Category::In);
        assert!(!tx.is_taxable());
        assert_eq!(tx.fiat_taxable_amount(), Decimal::ZERO);
        assert_eq!(tx.fiat_fee(), dec!(10));
        assert_eq!(tx.crypto_balance_change(), dec!(1));
        assert_eq!(tx.fiat_balance_change(), dec!(10010));
        assert_eq!(tx.as_acquisition().unwrap().fiat_in_with_fee(), dec!(10010));
    }

    #[test]
    fn income_acquisition_taxable_at_receipt() {
        let config = config();
        for kind in AcquisitionKind::ALL {
            let mut input = acquisition_input();
            input.kind = kind;
            input.crypto_in = dec!(0.25);
            let tx: Transaction = Acquisition::new(&config, input).unwrap().into();
            if kind.is_income() {
                assert!(tx.is_taxable(), "{kind:?}");
                assert_eq!(tx.fiat_taxable_amount(), dec!(2500));
            } else {
                assert!(!tx.is_taxable(), "{kind:?}");
                assert_eq!(tx.fiat_taxable_amount(), Decimal::ZERO);
            }
        }
    }

    #[test]
    fn acquisition_amount_checks() {
        let config = config();
        let mut input = acquisition_input();
        input.crypto_in = dec!(0);
        assert!(matches!(
            Acquisition::new(&config, input).unwrap_err(),
            Error::NonPositive {
                name: "crypto_in",
                ..
            }
        ));

        let mut input = acquisition_input();
        input.crypto_fee = dec!(-0.1);
        assert!(matches!(
            Acquisition::new(&config, input).unwrap_err(),
            Error::Negative {
                name: "crypto_fee",
                ..
            }
        ));
    }

    #[test]
    fn exclusive_disposal_fee_adds_to_disposed_quantity() {
        let config = config();
        let tx: Transaction = Disposal::new(&config, disposal_input()).unwrap().into();
        let disposal = tx.as_disposal().unwrap();

        assert_eq!(tx.category(), Category::Out);
        assert!(tx.is_taxable());
        assert_eq!(disposal.crypto_disposed(), dec!(0.51));
        assert_eq!(disposal.crypto_out_no_fee(), dec!(0.5));
        assert_eq!(tx.fiat_taxable_amount(), dec!(6000));
        assert_eq!(tx.fiat_fee(), dec!(120));
        assert_eq!(tx.crypto_balance_change(), dec!(-0.51));
        assert_eq!(tx.fiat_balance_change(), dec!(-6120));
    }

    #[test]
    fn inclusive_disposal_fee_taken_from_sent_amount() {
        let config = config().with_disposal_fee(DisposalFeePolicy::Inclusive);
        let tx: Transaction = Disposal::new(&config, disposal_input()).unwrap().into();
        let disposal = tx.as_disposal().unwrap();

        assert_eq!(disposal.crypto_disposed(), dec!(0.5));
        assert_eq!(disposal.crypto_out_no_fee(), dec!(0.49));
        assert_eq!(tx.fiat_taxable_amount(), dec!(5880));
        assert_eq!(tx.crypto_balance_change(), dec!(-0.5));
    }

    #[test]
    fn inclusive_fee_must_be_less_than_amount() {
        let config = config().with_disposal_fee(DisposalFeePolicy::Inclusive);
        let mut input = disposal_input();
        input.crypto_fee = dec!(0.5);
        assert!(matches!(
            Disposal::new(&config, input).unwrap_err(),
            Error::FeeNotLessThanAmount { line: 50, .. }
        ));
    }

    #[test]
    fn zero_quantity_disposal_rejected() {
        let config = config();
        let mut input = disposal_input();
        input.crypto_sent = dec!(0);
        let err = Disposal::new(&config, input).unwrap_err();
        assert_eq!(
            err,
            Error::Zero {
                line: 50,
                name: "crypto_sent"
            }
        );
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn sort_key_orders_by_instant_then_line() {
        let config = config();
        let mut early = acquisition_input();
        early.common.line = 9;
        early.common.timestamp = "2021-01-12T12:51:38+01:00";
        let late: Transaction = Acquisition::new(&config, acquisition_input()).unwrap().into();
        let early: Transaction = Acquisition::new(&config, early).unwrap().into();
        assert!(early.sort_key() < late.sort_key());
    }

    #[test]
    fn unrepresentable_fiat_value_is_a_value_error() {
        let config = config();
        let mut input = acquisition_input();
        input.crypto_in = dec!(1000000000000000);
        input.common.spot_price = dec!(1000000000000000);
        let err = Acquisition::new(&config, input).unwrap_err();
        assert_eq!(err, Error::Overflow { line: 45, name: "fiat_in_no_fee" });
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.line(), Some(45));

        let mut input = disposal_input();
        input.crypto_sent = dec!(1000000000000000);
        input.common.spot_price = dec!(1000000000000000);
        let err = Disposal::new(&config, input).unwrap_err();
        assert_eq!(err, Error::Overflow { line: 50, name: "fiat_out_no_fee" });
    }
}
