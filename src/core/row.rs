use super::config::Configuration;
use super::error::{Error, Result};
use super::transaction::{
    Acquisition, AcquisitionInput, AcquisitionKind, CommonInput, Disposal, DisposalInput,
    DisposalKind, Transaction, TransactionKind, Transfer, TransferInput,
};
use csv::{ReaderBuilder, Trim};
use lotc_derive::CsvSchema;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::str::FromStr;

/// Column description generated by `CsvSchema`
#[derive(Debug, Clone, Copy)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// One already-split input row; cells are kept as text until conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, CsvSchema)]
pub struct TransactionRow {
    /// Physical line in the source file
    #[serde(skip)]
    pub line: u64,
    /// acquisition (in), disposal (out) or transfer (intra)
    #[csv(required)]
    pub kind: Option<String>,
    /// Timestamp with explicit offset (e.g. 2021-01-02T08:42:43.882Z)
    #[csv(required)]
    pub timestamp: Option<String>,
    /// Asset symbol (e.g. BTC)
    #[csv(required)]
    pub asset: Option<String>,
    /// Exchange or wallet (sending side for transfers)
    #[csv(required)]
    pub exchange: Option<String>,
    /// Holder name (sending side for transfers)
    #[csv(required)]
    pub holder: Option<String>,
    /// Receiving exchange or wallet (transfers only)
    pub to_exchange: Option<String>,
    /// Receiving holder (transfers only)
    pub to_holder: Option<String>,
    /// buy, income, interest, mining, staking, airdrop, gift (acquisitions); sell, gift, donate, expense (disposals)
    pub classification: Option<String>,
    /// Fiat price per unit of asset
    #[csv(required)]
    pub spot_price: Option<String>,
    /// Amount received (acquisitions) or sent (disposals, transfers)
    #[csv(required)]
    pub crypto_amount: Option<String>,
    /// Fee in asset units (acquisitions, disposals); defaults to 0
    pub crypto_fee: Option<String>,
    /// Amount received (transfers only)
    pub crypto_received: Option<String>,
    /// Free text
    pub notes: Option<String>,
}

/// Read rows from CSV, recording the source line of each
pub fn read_rows_csv<R: Read>(reader: R) -> anyhow::Result<Vec<TransactionRow>> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row: TransactionRow = record.deserialize(Some(&headers))?;
        row.line = record.position().map_or(0, |p| p.line());
        rows.push(row);
    }
    log::debug!("Read {} transaction rows", rows.len());
    Ok(rows)
}

impl Transaction {
    /// Type-check the raw cells of `row`, then construct and validate the record
    pub fn from_row(config: &Configuration, row: &TransactionRow) -> Result<Self> {
        let line = row.line;
        let kind_cell = required(line, "kind", &row.kind)?;
        let kind = TransactionKind::parse(kind_cell).ok_or_else(|| Error::Unknown {
            line,
            name: "kind",
            value: kind_cell.to_string(),
        })?;

        let common = CommonInput {
            line,
            timestamp: required(line, "timestamp", &row.timestamp)?,
            asset: required(line, "asset", &row.asset)?,
            spot_price: decimal(line, "spot_price", required(line, "spot_price", &row.spot_price)?)?,
            notes: row.notes.as_deref().filter(|n| !n.is_empty()),
        };
        let exchange = required(line, "exchange", &row.exchange)?;
        let holder = required(line, "holder", &row.holder)?;

        match kind {
            TransactionKind::Acquisition => {
                let crypto_in =
                    decimal(line, "crypto_in", required(line, "crypto_amount", &row.crypto_amount)?)?;
                let crypto_fee = optional_decimal(line, "crypto_fee", &row.crypto_fee)?;
                let class = required(line, "classification", &row.classification)?;
                let kind = AcquisitionKind::parse(class).ok_or_else(|| Error::Unknown {
                    line,
                    name: "classification",
                    value: class.to_string(),
                })?;
                Acquisition::new(
                    config,
                    AcquisitionInput {
                        common,
                        exchange,
                        holder,
                        kind,
                        crypto_in,
                        crypto_fee,
                    },
                )
                .map(Transaction::Acquisition)
            }
            TransactionKind::Disposal => {
                let crypto_sent = decimal(
                    line,
                    "crypto_sent",
                    required(line, "crypto_amount", &row.crypto_amount)?,
                )?;
                let crypto_fee = optional_decimal(line, "crypto_fee", &row.crypto_fee)?;
                let class = required(line, "classification", &row.classification)?;
                let kind = DisposalKind::parse(class).ok_or_else(|| Error::Unknown {
                    line,
                    name: "classification",
                    value: class.to_string(),
                })?;
                Disposal::new(
                    config,
                    DisposalInput {
                        common,
                        exchange,
                        holder,
                        kind,
                        crypto_sent,
                        crypto_fee,
                    },
                )
                .map(Transaction::Disposal)
            }
            TransactionKind::Transfer => {
                let to_exchange = required(line, "to_exchange", &row.to_exchange)?;
                let to_holder = required(line, "to_holder", &row.to_holder)?;
                let crypto_sent = decimal(
                    line,
                    "crypto_sent",
                    required(line, "crypto_amount", &row.crypto_amount)?,
                )?;
                let crypto_received = decimal(
                    line,
                    "crypto_received",
                    required(line, "crypto_received", &row.crypto_received)?,
                )?;
                Transfer::new(
                    config,
                    TransferInput {
                        common,
                        from_exchange: exchange,
                        from_holder: holder,
                        to_exchange,
                        to_holder,
                        crypto_sent,
                        crypto_received,
                    },
                )
                .map(Transaction::Transfer)
            }
        }
    }
}

fn required<'a>(line: u64, name: &'static str, cell: &'a Option<String>) -> Result<&'a str> {
    cell.as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingField { line, name })
}

fn decimal(line: u64, name: &'static str, cell: &str) -> Result<Decimal> {
    Decimal::from_str(cell.trim()).map_err(|_| Error::NonNumeric {
        line,
        name,
        value: cell.to_string(),
    })
}

fn optional_decimal(line: u64, name: &'static str, cell: &Option<String>) -> Result<Decimal> {
    match cell.as_deref() {
        None | Some("") => Ok(Decimal::ZERO),
        Some(s) => decimal(line, name, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::transaction::tests::config;
    use rust_decimal_macros::dec;

    const LEDGER: &str = "\
kind,timestamp,asset,exchange,holder,to_exchange,to_holder,classification,spot_price,crypto_amount,crypto_fee,crypto_received,notes
in,2021-01-01T00:00:00Z,BTC,Coinbase,Alice,,,buy,100,2,,,first buy
out,2021-02-01T00:00:00Z,BTC,Coinbase,Alice,,,sell,150,1,0.01,,
intra,2021-01-02T08:42:43.882Z,B1,Coinbase Pro,Bob,BlockFi,Alice,,1000.0,2.0002,,1.9998,
";

    #[test]
    fn reads_rows_with_source_lines() {
        let rows = read_rows_csv(LEDGER.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.line).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(rows[0].notes.as_deref(), Some("first buy"));
    }

    #[test]
    fn converts_every_variant() {
        let config = config();
        let rows = read_rows_csv(LEDGER.as_bytes()).unwrap();
        let transactions: Vec<Transaction> = rows
            .iter()
            .map(|row| Transaction::from_row(&config, row))
            .collect::<Result<_>>()
            .unwrap();

        let acquisition = transactions[0].as_acquisition().unwrap();
        assert_eq!(acquisition.kind(), AcquisitionKind::Buy);
        assert_eq!(acquisition.crypto_fee(), Decimal::ZERO);
        assert_eq!(transactions[0].notes(), Some("first buy"));

        let disposal = transactions[1].as_disposal().unwrap();
        assert_eq!(disposal.crypto_disposed(), dec!(1.01));
        assert_eq!(transactions[1].notes(), None);

        assert!(transactions[2].is_taxable());
        assert_eq!(transactions[2].fiat_taxable_amount(), dec!(0.4));
        assert_eq!(transactions[2].line(), 4);
    }

    fn mining_row() -> TransactionRow {
        TransactionRow {
            line: 7,
            kind: Some("acquisition".to_string()),
            timestamp: Some("2021-01-01T00:00:00+01:00".to_string()),
            asset: Some("BTC".to_string()),
            exchange: Some("Kraken".to_string()),
            holder: Some("Bob".to_string()),
            classification: Some("mining".to_string()),
            spot_price: Some("30000".to_string()),
            crypto_amount: Some("0.01".to_string()),
            ..TransactionRow::default()
        }
    }

    #[test]
    fn missing_cell_is_a_type_error() {
        let config = config();
        let mut row = mining_row();
        row.spot_price = Some(String::new());
        let err = Transaction::from_row(&config, &row).unwrap_err();
        assert_eq!(
            err,
            Error::MissingField {
                line: 7,
                name: "spot_price"
            }
        );
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn non_numeric_cell_is_a_type_error() {
        let config = config();
        let mut row = mining_row();
        row.crypto_fee = Some("a lot".to_string());
        let err = Transaction::from_row(&config, &row).unwrap_err();
        assert!(matches!(
            err,
            Error::NonNumeric {
                line: 7,
                name: "crypto_fee",
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn unknown_tags_are_value_errors() {
        let config = config();

        let mut row = mining_row();
        row.kind = Some("swap".to_string());
        let err = Transaction::from_row(&config, &row).unwrap_err();
        assert!(matches!(err, Error::Unknown { name: "kind", .. }));

        let mut row = mining_row();
        row.classification = Some("sell".to_string());
        let err = Transaction::from_row(&config, &row).unwrap_err();
        assert!(matches!(err, Error::Unknown { name: "classification", .. }));
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn transfer_needs_receiving_side() {
        let config = config();
        let mut row = mining_row();
        row.kind = Some("Transfer".to_string());
        row.crypto_received = Some("0.01".to_string());
        let err = Transaction::from_row(&config, &row).unwrap_err();
        assert_eq!(
            err,
            Error::MissingField {
                line: 7,
                name: "to_exchange"
            }
        );
    }

    #[test]
    fn header_lists_every_column() {
        assert_eq!(
            TransactionRow::csv_header(),
            "kind,timestamp,asset,exchange,holder,to_exchange,to_holder,classification,spot_price,crypto_amount,crypto_fee,crypto_received,notes"
        );
        let required: Vec<&str> = TransactionRow::csv_schema()
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        assert_eq!(
            required,
            vec!["kind", "timestamp", "asset", "exchange", "holder", "spot_price", "crypto_amount"]
        );
    }
}
