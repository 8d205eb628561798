//! Report command - resolved entries, gain records and totals

use super::{format_fiat, format_fiat_signed, format_quantity, InputArgs};
use crate::core::{format, Entry, GainRecord, Ledger, RenderFormat, Totals};
use chrono::Datelike;
use clap::Args;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Calendar year to report (e.g., 2021)
    #[arg(short, long)]
    year: Option<i32>,

    /// Print every transaction with its derived fields and matched lots
    #[arg(long, conflicts_with_all = ["json", "csv"])]
    detail: bool,

    /// Output as JSON instead of formatted tables
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output gain records as CSV
    #[arg(long)]
    csv: bool,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let ledger = self.input.read_ledger()?;

        if self.csv {
            return ledger.write_gains_csv(io::stdout(), self.year);
        }
        if self.json {
            return self.print_json(&ledger);
        }
        if self.detail {
            self.print_detail(&ledger);
        } else {
            self.print_tables(&ledger);
        }
        self.print_summary(&ledger.totals(self.year), ledger.method());
        Ok(())
    }

    fn entries<'a>(&self, ledger: &'a Ledger) -> impl Iterator<Item = &'a Entry> {
        let year = self.year;
        ledger
            .entries()
            .iter()
            .filter(move |e| year.map_or(true, |y| e.timestamp().year() == y))
    }

    fn year_display(&self) -> String {
        self.year.map_or("All Years".to_string(), |y| y.to_string())
    }

    fn print_tables(&self, ledger: &Ledger) {
        let entries: Vec<&Entry> = self.entries(ledger).collect();
        println!();
        println!("TRANSACTIONS ({})", self.year_display());
        println!();
        if entries.is_empty() {
            println!("No transactions found");
            return;
        }

        let rows: Vec<EntryRow> = entries.iter().map(|e| EntryRow::from(*e)).collect();
        print_table(rows);

        let gains: Vec<GainRow> = entries
            .iter()
            .flat_map(|e| e.gains())
            .map(GainRow::from)
            .collect();
        if !gains.is_empty() {
            println!();
            println!("GAINS ({})", ledger.method());
            println!();
            print_table(gains);
        }
    }

    fn print_detail(&self, ledger: &Ledger) {
        for entry in self.entries(ledger) {
            let matched: Vec<String> = entry
                .gains()
                .iter()
                .map(|g| {
                    format!(
                        "matched line {} ({}): qty={}, cost={}, proceeds={}, gain={}, {}",
                        g.acquired_line,
                        format::timestamp(&g.acquired_at),
                        format::crypto(g.quantity),
                        format::fiat(g.cost_basis),
                        format::fiat(g.proceeds),
                        format::fiat(g.gain),
                        g.holding_period
                    )
                })
                .collect();
            println!("{}", entry.transaction().render(0, RenderFormat::Plain, &matched));
        }
    }

    fn print_summary(&self, totals: &Totals, method: &str) {
        println!();
        println!("SUMMARY ({}, {})", self.year_display(), method);
        println!("  Disposals:         {:>14}", totals.disposal_count);
        println!("  Proceeds:          {:>14}", format_fiat(totals.proceeds));
        println!("  Cost basis:        {:>14}", format_fiat(totals.cost_basis));
        println!("  Gain/Loss:         {:>14}", format_fiat_signed(totals.gain));
        println!("    Short-term:      {:>14}", format_fiat_signed(totals.short_term_gain));
        println!("    Long-term:       {:>14}", format_fiat_signed(totals.long_term_gain));
        if !totals.unclassified_gain.is_zero() {
            println!("    Unclassified:    {:>14}", format_fiat_signed(totals.unclassified_gain));
        }
        println!("  Income:            {:>14}", format_fiat(totals.income));
        println!("  Transfer fees:     {:>14}", format_fiat(totals.transfer_fees));
    }

    fn print_json(&self, ledger: &Ledger) -> anyhow::Result<()> {
        let output = ReportOutput {
            year: self.year,
            method: ledger.method(),
            entries: self.entries(ledger).map(EntryView::from).collect(),
            totals: ledger.totals(self.year),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

#[derive(Debug, Clone, Tabled)]
struct EntryRow {
    #[tabled(rename = "Line")]
    line: u64,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Cat")]
    category: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Taxable")]
    taxable: String,
    #[tabled(rename = "Crypto Change")]
    crypto_change: String,
    #[tabled(rename = "Fiat Change")]
    fiat_change: String,
    #[tabled(rename = "Gain")]
    gain: String,
}

impl From<&Entry> for EntryRow {
    fn from(e: &Entry) -> Self {
        EntryRow {
            line: e.line(),
            date: e.timestamp().format("%Y-%m-%d").to_string(),
            category: e.category().to_string(),
            asset: e.asset().to_string(),
            taxable: if e.is_taxable() {
                format_fiat(e.fiat_taxable_amount())
            } else {
                "-".to_string()
            },
            crypto_change: format_quantity(e.crypto_balance_change()),
            fiat_change: format_fiat_signed(e.fiat_balance_change()),
            gain: if e.gains().is_empty() {
                "-".to_string()
            } else {
                format_fiat_signed(e.gain())
            },
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct GainRow {
    #[tabled(rename = "Line")]
    line: u64,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Holder")]
    holder: String,
    #[tabled(rename = "Lot")]
    acquired_line: u64,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Term")]
    term: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Gain")]
    gain: String,
}

impl From<&GainRecord> for GainRow {
    fn from(g: &GainRecord) -> Self {
        GainRow {
            line: g.line,
            date: g.timestamp.format("%Y-%m-%d").to_string(),
            asset: g.asset.clone(),
            holder: g.holder.clone(),
            acquired_line: g.acquired_line,
            acquired: g.acquired_at.format("%Y-%m-%d").to_string(),
            term: g.holding_period.to_string(),
            quantity: format_quantity(g.quantity),
            cost: format_fiat(g.cost_basis),
            proceeds: format_fiat(g.proceeds),
            gain: format_fiat_signed(g.gain),
        }
    }
}

#[derive(Debug, Serialize)]
struct EntryView<'a> {
    line: u64,
    timestamp: String,
    category: &'static str,
    kind: &'static str,
    asset: &'a str,
    is_taxable: bool,
    fiat_taxable_amount: String,
    crypto_balance_change: String,
    fiat_balance_change: String,
    gains: &'a [GainRecord],
}

impl<'a> From<&'a Entry> for EntryView<'a> {
    fn from(e: &'a Entry) -> Self {
        EntryView {
            line: e.line(),
            timestamp: format::timestamp(e.timestamp()),
            category: e.category().as_str(),
            kind: e.kind().name(),
            asset: e.asset(),
            is_taxable: e.is_taxable(),
            fiat_taxable_amount: format::fiat(e.fiat_taxable_amount()),
            crypto_balance_change: format::crypto(e.crypto_balance_change()),
            fiat_balance_change: format::fiat(e.fiat_balance_change()),
            gains: e.gains(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportOutput<'a> {
    year: Option<i32>,
    method: &'static str,
    entries: Vec<EntryView<'a>>,
    totals: Totals,
}
