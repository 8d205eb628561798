use super::engine::{AssetBook, GainRecord, HoldingPeriod};
use super::format;
use super::lot::Lot;
use super::transaction::{Category, Transaction, TransactionKind};
use chrono::{DateTime, Datelike, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// One resolved transaction with the gain records it produced
#[derive(Debug, Clone)]
pub struct Entry {
    transaction: Transaction,
    gains: Vec<GainRecord>,
}

impl Entry {
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn gains(&self) -> &[GainRecord] {
        &self.gains
    }

    pub fn category(&self) -> Category {
        self.transaction.category()
    }

    pub fn kind(&self) -> TransactionKind {
        self.transaction.kind()
    }

    pub fn line(&self) -> u64 {
        self.transaction.line()
    }

    pub fn timestamp(&self) -> &DateTime<FixedOffset> {
        self.transaction.timestamp()
    }

    pub fn asset(&self) -> &str {
        self.transaction.asset()
    }

    pub fn is_taxable(&self) -> bool {
        self.transaction.is_taxable()
    }

    pub fn fiat_taxable_amount(&self) -> Decimal {
        self.transaction.fiat_taxable_amount()
    }

    pub fn crypto_balance_change(&self) -> Decimal {
        self.transaction.crypto_balance_change()
    }

    pub fn fiat_balance_change(&self) -> Decimal {
        self.transaction.fiat_balance_change()
    }

    /// Realized gain over all fragments of this entry
    pub fn gain(&self) -> Decimal {
        self.gains.iter().map(|g| g.gain).sum()
    }

    fn in_year(&self, year: Option<i32>) -> bool {
        year.map_or(true, |y| self.timestamp().year() == y)
    }
}

/// Resolution result: entries in global order, final balances and open lots
#[derive(Debug)]
pub struct Ledger {
    method: &'static str,
    entries: Vec<Entry>,
    balances: BTreeMap<(String, String), Decimal>,
    lots: BTreeMap<(String, String), Vec<Lot>>,
}

/// Summary figures for a calendar year, or for all years
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub disposal_count: usize,
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub gain: Decimal,
    pub short_term_gain: Decimal,
    pub long_term_gain: Decimal,
    pub unclassified_gain: Decimal,
    /// Fiat value of income-like acquisitions
    pub income: Decimal,
    /// Fiat value of transfer fees
    pub transfer_fees: Decimal,
}

/// CSV record for gain output
#[derive(Debug, Serialize, Deserialize)]
pub struct GainCsvRecord {
    pub line: u64,
    pub kind: String,
    pub timestamp: String,
    pub asset: String,
    pub holder: String,
    pub acquired_line: u64,
    pub acquired_at: String,
    pub holding_period: String,
    pub quantity: String,
    pub cost_basis: String,
    pub proceeds: String,
    pub gain: String,
}

impl From<&GainRecord> for GainCsvRecord {
    fn from(g: &GainRecord) -> Self {
        GainCsvRecord {
            line: g.line,
            kind: g.kind.name().to_string(),
            timestamp: format::timestamp(&g.timestamp),
            asset: g.asset.clone(),
            holder: g.holder.clone(),
            acquired_line: g.acquired_line,
            acquired_at: format::timestamp(&g.acquired_at),
            holding_period: g.holding_period.display().to_string(),
            quantity: format::crypto(g.quantity),
            cost_basis: format::fiat(g.cost_basis),
            proceeds: format::fiat(g.proceeds),
            gain: format::fiat(g.gain),
        }
    }
}

impl Ledger {
    pub(crate) fn new(
        method: &'static str,
        transactions: Vec<Transaction>,
        gains: Vec<Vec<GainRecord>>,
        books: BTreeMap<String, AssetBook>,
    ) -> Self {
        let entries = transactions
            .into_iter()
            .zip(gains)
            .map(|(transaction, gains)| Entry { transaction, gains })
            .collect();

        let mut balances = BTreeMap::new();
        let mut lots = BTreeMap::new();
        for (asset, book) in books {
            for (holder, balance) in book.balances {
                balances.insert((asset.clone(), holder), balance);
            }
            for (holder, open) in book.lots {
                lots.insert((asset.clone(), holder), open);
            }
        }

        Ledger {
            method,
            entries,
            balances,
            lots,
        }
    }

    /// Name of the accounting method the ledger was resolved with
    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// All gain records in global order
    pub fn gains(&self) -> impl Iterator<Item = &GainRecord> {
        self.entries.iter().flat_map(|e| e.gains.iter())
    }

    pub fn balance(&self, asset: &str, holder: &str) -> Decimal {
        self.balances
            .get(&(asset.to_string(), holder.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Final balance per (asset, holder)
    pub fn balances(&self) -> &BTreeMap<(String, String), Decimal> {
        &self.balances
    }

    pub fn open_lots(&self, asset: &str, holder: &str) -> &[Lot] {
        self.lots
            .get(&(asset.to_string(), holder.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Open lots of every (asset, holder), in acquisition order within each
    pub fn all_open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.values().flatten()
    }

    pub fn totals(&self, year: Option<i32>) -> Totals {
        let mut totals = Totals::default();
        for entry in self.entries.iter().filter(|e| e.in_year(year)) {
            match entry.kind() {
                TransactionKind::Acquisition => totals.income += entry.fiat_taxable_amount(),
                TransactionKind::Transfer => totals.transfer_fees += entry.fiat_taxable_amount(),
                TransactionKind::Disposal => {}
            }
            if !entry.gains.is_empty() {
                totals.disposal_count += 1;
            }
            for gain in &entry.gains {
                totals.proceeds += gain.proceeds;
                totals.cost_basis += gain.cost_basis;
                totals.gain += gain.gain;
                match gain.holding_period {
                    HoldingPeriod::ShortTerm => totals.short_term_gain += gain.gain,
                    HoldingPeriod::LongTerm => totals.long_term_gain += gain.gain,
                    HoldingPeriod::Unclassified => totals.unclassified_gain += gain.gain,
                }
            }
        }
        totals
    }

    /// Write gain records to CSV, amounts rounded for presentation
    pub fn write_gains_csv<W: Write>(&self, writer: W, year: Option<i32>) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for entry in self.entries.iter().filter(|e| e.in_year(year)) {
            for gain in &entry.gains {
                let record: GainCsvRecord = gain.into();
                wtr.serialize(record)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}
