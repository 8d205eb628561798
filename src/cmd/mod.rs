pub mod balances;
pub mod report;
pub mod schema;
pub mod validate;

use crate::core::{read_rows_csv, resolve, Configuration, Ledger, Transaction, TransactionRow};
use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

/// Input options shared by every command that reads a ledger
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Configuration file (JSON) with known assets, exchanges and holders
    #[arg(short, long)]
    config: PathBuf,

    /// Transactions CSV file. Reads from stdin if not specified.
    #[arg(default_value = "-")]
    file: PathBuf,
}

impl InputArgs {
    pub fn read_config(&self) -> anyhow::Result<Configuration> {
        let file = File::open(&self.config)
            .with_context(|| format!("Cannot open configuration {}", self.config.display()))?;
        Configuration::read_json(BufReader::new(file))
            .with_context(|| format!("Invalid configuration {}", self.config.display()))
    }

    /// Read raw rows (or stdin with "-")
    pub fn read_rows(&self) -> anyhow::Result<Vec<TransactionRow>> {
        if self.file.as_os_str() == "-" {
            read_rows_from_stdin()
        } else {
            let file = File::open(&self.file)
                .with_context(|| format!("Cannot open transactions {}", self.file.display()))?;
            read_rows_csv(BufReader::new(file))
        }
    }

    /// Read and construct every transaction, failing on the first invalid row
    pub fn read_transactions(&self, config: &Configuration) -> anyhow::Result<Vec<Transaction>> {
        let transactions = self
            .read_rows()?
            .iter()
            .map(|row| Transaction::from_row(config, row))
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("Loaded {} transactions", transactions.len());
        Ok(transactions)
    }

    pub fn read_ledger(&self) -> anyhow::Result<Ledger> {
        let config = self.read_config()?;
        let transactions = self.read_transactions(&config)?;
        Ok(resolve(&config, transactions)?)
    }
}

fn read_rows_from_stdin() -> anyhow::Result<Vec<TransactionRow>> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    read_rows_csv(io::Cursor::new(buffer))
}

fn format_fiat(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn format_fiat_signed(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-{:.2}", amount.abs())
    } else {
        format!("{:.2}", amount)
    }
}

fn format_quantity(qty: Decimal) -> String {
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
