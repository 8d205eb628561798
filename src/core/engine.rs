//! Tax-lot resolution
//!
//! Transactions are put in global order (instant, then source line) and split by asset.
//! Each asset is resolved on its own, in parallel, with one lot queue per holder.
//! Disposals and transfer fees consume lots picked by the configured
//! [`AccountingMethod`], producing one [`GainRecord`] per lot fragment; transfers
//! between holders move the remaining fragments into the receiver's queue.

use super::config::Configuration;
use super::error::{Error, Result};
use super::ledger::Ledger;
use super::lot::{proportion, AccountingMethod, Fragment, Lot};
use super::transaction::{Transaction, TransactionKind};
use chrono::{DateTime, Duration, FixedOffset};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HoldingPeriod {
    ShortTerm,
    LongTerm,
    /// No long-term threshold configured
    Unclassified,
}

impl HoldingPeriod {
    fn classify(held: Duration, threshold: Option<Duration>) -> Self {
        match threshold {
            Some(threshold) if held > threshold => HoldingPeriod::LongTerm,
            Some(_) => HoldingPeriod::ShortTerm,
            None => HoldingPeriod::Unclassified,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            HoldingPeriod::ShortTerm => "Short",
            HoldingPeriod::LongTerm => "Long",
            HoldingPeriod::Unclassified => "-",
        }
    }
}

impl fmt::Display for HoldingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Realized gain of one lot fragment consumed by a disposal or a transfer fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GainRecord {
    /// Line of the disposal or transfer
    pub line: u64,
    pub kind: TransactionKind,
    pub timestamp: DateTime<FixedOffset>,
    pub asset: String,
    pub holder: String,
    /// Line of the acquisition the fragment came from
    pub acquired_line: u64,
    pub acquired_at: DateTime<FixedOffset>,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub gain: Decimal,
    pub holding_period: HoldingPeriod,
}

/// Final state of one asset's partition
#[derive(Debug, Default)]
pub(crate) struct AssetBook {
    pub lots: BTreeMap<String, Vec<Lot>>,
    pub balances: BTreeMap<String, Decimal>,
}

/// Per-asset resolution output: gain records by global index, plus final state
struct Resolved {
    asset: String,
    gains: Vec<(usize, Vec<GainRecord>)>,
    book: AssetBook,
}

/// Resolve `transactions` into a [`Ledger`]
///
/// Fails with the error of the earliest failing transaction; no partial results are returned.
pub fn resolve(config: &Configuration, mut transactions: Vec<Transaction>) -> Result<Ledger> {
    transactions.sort_by_key(Transaction::sort_key);

    let mut partitions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, transaction) in transactions.iter().enumerate() {
        partitions.entry(transaction.asset()).or_default().push(index);
    }
    log::debug!(
        "Resolving {} transactions over {} assets using {}",
        transactions.len(),
        partitions.len(),
        config.method().name()
    );

    let outcomes: Vec<std::result::Result<Resolved, (usize, Error)>> = partitions
        .into_iter()
        .collect::<Vec<_>>()
        .par_iter()
        .map(|(asset, indices)| Resolver::new(config, asset).run(&transactions, indices))
        .collect();

    let mut gains: Vec<Vec<GainRecord>> = vec![Vec::new(); transactions.len()];
    let mut books = BTreeMap::new();
    let mut first_error: Option<(usize, Error)> = None;
    for outcome in outcomes {
        match outcome {
            Ok(resolved) => {
                for (index, records) in resolved.gains {
                    gains[index] = records;
                }
                books.insert(resolved.asset, resolved.book);
            }
            Err((index, err)) => {
                if first_error.as_ref().map_or(true, |(first, _)| index < *first) {
                    first_error = Some((index, err));
                }
            }
        }
    }
    if let Some((_, err)) = first_error {
        return Err(err);
    }
    log::info!(
        "Resolved {} transactions over {} assets: {} gain records",
        transactions.len(),
        books.len(),
        gains.iter().map(Vec::len).sum::<usize>()
    );

    Ok(Ledger::new(config.method().name(), transactions, gains, books))
}

struct Resolver<'a> {
    asset: &'a str,
    method: &'static dyn AccountingMethod,
    long_term: Option<Duration>,
    book: AssetBook,
}

impl<'a> Resolver<'a> {
    fn new(config: &Configuration, asset: &'a str) -> Self {
        Resolver {
            asset,
            method: config.method(),
            long_term: config.long_term_threshold(),
            book: AssetBook::default(),
        }
    }

    fn run(
        mut self,
        transactions: &[Transaction],
        indices: &[usize],
    ) -> std::result::Result<Resolved, (usize, Error)> {
        let mut gains = Vec::new();
        for &index in indices {
            let records = self.apply(&transactions[index]).map_err(|e| (index, e))?;
            if !records.is_empty() {
                gains.push((index, records));
            }
        }
        self.book.lots.retain(|_, lots| !lots.is_empty());
        Ok(Resolved {
            asset: self.asset.to_string(),
            gains,
            book: self.book,
        })
    }

    fn apply(&mut self, transaction: &Transaction) -> Result<Vec<GainRecord>> {
        let records = match transaction {
            Transaction::Acquisition(acquisition) => {
                self.adjust_balance(transaction, acquisition.holder(), acquisition.crypto_in())?;
                if let Some(lot) = Lot::open(transaction) {
                    log::debug!(
                        "{} {} line {} OPEN: qty={}, cost={}",
                        self.asset,
                        lot.holder(),
                        lot.line(),
                        lot.quantity(),
                        lot.remaining_cost()
                    );
                    self.queue(acquisition.holder()).push(lot);
                }
                self.check_holder(transaction, acquisition.holder())?;
                Vec::new()
            }
            Transaction::Disposal(disposal) => {
                let holder = disposal.holder();
                let quantity = disposal.crypto_disposed();
                self.ensure_available(transaction, holder, quantity)?;
                let fragments = self.take(transaction, holder, quantity)?;
                let records =
                    self.gain_records(transaction, holder, fragments, disposal.fiat_out_no_fee())?;
                self.adjust_balance(transaction, holder, Decimal::ZERO - quantity)?;
                self.check_holder(transaction, holder)?;
                records
            }
            Transaction::Transfer(transfer) => {
                let from = transfer.from_holder();
                let to = transfer.to_holder();
                let fee = transfer.crypto_sent() - transfer.crypto_received();
                let required = if transfer.changes_holder() {
                    transfer.crypto_sent()
                } else {
                    fee
                };
                self.ensure_available(transaction, from, required)?;
                if transfer.changes_holder() {
                    self.adjust_balance(transaction, to, transfer.crypto_received())?;
                }
                self.adjust_balance(transaction, from, Decimal::ZERO - required)?;

                let records = if fee > Decimal::ZERO {
                    let fragments = self.take(transaction, from, fee)?;
                    self.gain_records(transaction, from, fragments, transaction.fiat_fee())?
                } else {
                    Vec::new()
                };
                if transfer.changes_holder() {
                    let moved = self.take(transaction, from, transfer.crypto_received())?;
                    self.migrate(to, moved);
                }

                self.check_holder(transaction, from)?;
                self.check_holder(transaction, to)?;
                records
            }
        };
        Ok(records)
    }

    fn queue(&mut self, holder: &str) -> &mut Vec<Lot> {
        self.book.lots.entry(holder.to_string()).or_default()
    }

    fn available(&self, holder: &str) -> Decimal {
        self.book
            .lots
            .get(holder)
            .map(|lots| lots.iter().map(Lot::remaining).sum())
            .unwrap_or_default()
    }

    fn ensure_available(&self, transaction: &Transaction, holder: &str, required: Decimal) -> Result<()> {
        let available = self.available(holder);
        if required > available {
            log::debug!(
                "{} at line {}: {} {} needed from {}, {} available",
                transaction.kind().name(),
                transaction.line(),
                required,
                self.asset,
                holder,
                available
            );
            return Err(Error::InsufficientLots {
                kind: transaction.kind().name(),
                line: transaction.line(),
                asset: self.asset.to_string(),
                holder: holder.to_string(),
                required,
                available,
            });
        }
        Ok(())
    }

    /// Consume `quantity` from `holder`'s lots; availability must have been checked
    fn take(&mut self, transaction: &Transaction, holder: &str, quantity: Decimal) -> Result<Vec<Fragment>> {
        let method = self.method;
        let lots = self.queue(holder);
        let mut outstanding = quantity;
        let mut fragments = Vec::new();
        while outstanding > Decimal::ZERO {
            let Some(index) = method.select(lots) else {
                break;
            };
            if index >= lots.len() {
                return Err(Error::Internal(format!(
                    "{} selected lot {} of {} open lots",
                    method.name(),
                    index,
                    lots.len()
                )));
            }
            let fragment = lots[index].take(outstanding).ok_or(Error::Overflow {
                line: transaction.line(),
                name: "cost_basis",
            })?;
            outstanding -= fragment.quantity;
            if lots[index].is_exhausted() {
                lots.remove(index);
            }
            fragments.push(fragment);
        }
        Ok(fragments)
    }

    /// Place moved fragments in `holder`'s queue, keeping acquisition order
    fn migrate(&mut self, holder: &str, fragments: Vec<Fragment>) {
        let asset = self.asset;
        let lots = self.queue(holder);
        for fragment in fragments {
            let key = (fragment.acquired_at, fragment.line);
            match lots.binary_search_by_key(&key, Lot::order_key) {
                Ok(existing) => lots[existing].absorb(&fragment),
                Err(position) => lots.insert(position, Lot::from_fragment(asset, holder, &fragment)),
            }
        }
    }

    fn gain_records(
        &self,
        transaction: &Transaction,
        holder: &str,
        fragments: Vec<Fragment>,
        proceeds: Decimal,
    ) -> Result<Vec<GainRecord>> {
        let total: Decimal = fragments.iter().map(|f| f.quantity).sum();
        let mut unallocated = proceeds;
        let count = fragments.len();

        fragments
            .into_iter()
            .enumerate()
            .map(|(i, fragment)| {
                let share = if i + 1 == count {
                    unallocated
                } else {
                    proportion(proceeds, fragment.quantity, total).ok_or(Error::Overflow {
                        line: transaction.line(),
                        name: "proceeds",
                    })?
                };
                unallocated -= share;

                let held = transaction.timestamp().signed_duration_since(fragment.acquired_at);
                let record = GainRecord {
                    line: transaction.line(),
                    kind: transaction.kind(),
                    timestamp: *transaction.timestamp(),
                    asset: self.asset.to_string(),
                    holder: holder.to_string(),
                    acquired_line: fragment.line,
                    acquired_at: fragment.acquired_at,
                    quantity: fragment.quantity,
                    cost_basis: fragment.cost,
                    proceeds: share,
                    gain: share - fragment.cost,
                    holding_period: HoldingPeriod::classify(held, self.long_term),
                };
                log::debug!(
                    "{} {} line {} MATCH line {}: qty={}, cost={}, proceeds={}, gain={}",
                    record.asset,
                    record.holder,
                    record.line,
                    record.acquired_line,
                    record.quantity,
                    record.cost_basis,
                    record.proceeds,
                    record.gain
                );
                Ok(record)
            })
            .collect()
    }

    fn adjust_balance(&mut self, transaction: &Transaction, holder: &str, change: Decimal) -> Result<()> {
        let balance = self.book.balances.entry(holder.to_string()).or_default();
        *balance = balance.checked_add(change).ok_or(Error::Overflow {
            line: transaction.line(),
            name: "balance",
        })?;
        Ok(())
    }

    /// Lots and running balance of `holder` must agree after every event
    fn check_holder(&self, transaction: &Transaction, holder: &str) -> Result<()> {
        let balance = self.book.balances.get(holder).copied().unwrap_or_default();
        let lots = self.available(holder);
        if balance != lots {
            return Err(Error::Internal(format!(
                "{} at line {}: {} lots of {} total {} but balance is {}",
                transaction.kind().name(),
                transaction.line(),
                self.asset,
                holder,
                lots,
                balance
            )));
        }
        Ok(())
    }
}
