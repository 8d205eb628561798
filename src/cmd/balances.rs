//! Balances command - final holdings and open lots

use super::{format_fiat, format_quantity, InputArgs};
use crate::core::{format, Ledger, Lot};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct BalancesCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Filter by asset (e.g., BTC, ETH)
    #[arg(short, long)]
    asset: Option<String>,

    /// Show every open lot, not just the totals
    #[arg(long)]
    lots: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

impl BalancesCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let ledger = self.input.read_ledger()?;
        let balances = self.balances(&ledger);

        if self.json {
            let output = BalancesOutput {
                balances,
                lots: self.open_lots(&ledger).map(LotView::from).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        self.print_balances(&balances);
        if self.lots {
            self.print_lots(&ledger);
        }
        Ok(())
    }

    fn matches_asset(&self, asset: &str) -> bool {
        self.asset
            .as_deref()
            .map_or(true, |a| asset.eq_ignore_ascii_case(a))
    }

    fn balances(&self, ledger: &Ledger) -> Vec<BalanceView> {
        ledger
            .balances()
            .iter()
            .filter(|((asset, _), _)| self.matches_asset(asset))
            .map(|((asset, holder), balance)| {
                let lots = ledger.open_lots(asset, holder);
                BalanceView {
                    asset: asset.clone(),
                    holder: holder.clone(),
                    balance: *balance,
                    open_lots: lots.len(),
                    cost_basis: lots.iter().map(Lot::remaining_cost).sum(),
                }
            })
            .collect()
    }

    fn open_lots<'a>(&'a self, ledger: &'a Ledger) -> impl Iterator<Item = &'a Lot> {
        ledger
            .all_open_lots()
            .filter(move |lot| self.matches_asset(lot.asset()))
    }

    fn print_balances(&self, balances: &[BalanceView]) {
        if balances.is_empty() {
            println!("No balances found matching filters");
            return;
        }

        println!();
        println!("BALANCES");
        println!();

        let rows: Vec<BalanceRow> = balances
            .iter()
            .map(|b| BalanceRow {
                asset: b.asset.clone(),
                holder: b.holder.clone(),
                balance: format_quantity(b.balance),
                open_lots: b.open_lots,
                cost_basis: format_fiat(b.cost_basis),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
    }

    fn print_lots(&self, ledger: &Ledger) {
        let rows: Vec<LotRow> = self
            .open_lots(ledger)
            .map(|lot| LotRow {
                asset: lot.asset().to_string(),
                holder: lot.holder().to_string(),
                line: lot.line(),
                acquired: lot.acquired_at().format("%Y-%m-%d").to_string(),
                remaining: format_quantity(lot.remaining()),
                cost: format_fiat(lot.remaining_cost()),
                cost_per_unit: format_fiat(lot.cost_per_unit()),
            })
            .collect();
        if rows.is_empty() {
            println!("No open lots");
            return;
        }

        println!();
        println!("OPEN LOTS");
        println!();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
    }
}

#[derive(Debug, Clone, Tabled)]
struct BalanceRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Holder")]
    holder: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Open Lots")]
    open_lots: usize,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
}

#[derive(Debug, Clone, Tabled)]
struct LotRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Holder")]
    holder: String,
    #[tabled(rename = "Line")]
    line: u64,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Cost/Unit")]
    cost_per_unit: String,
}

#[derive(Debug, Clone, Serialize)]
struct BalanceView {
    asset: String,
    holder: String,
    balance: Decimal,
    open_lots: usize,
    cost_basis: Decimal,
}

#[derive(Debug, Serialize)]
struct LotView<'a> {
    asset: &'a str,
    holder: &'a str,
    line: u64,
    acquired_at: String,
    quantity: Decimal,
    remaining: Decimal,
    remaining_cost: Decimal,
}

impl<'a> From<&'a Lot> for LotView<'a> {
    fn from(lot: &'a Lot) -> Self {
        LotView {
            asset: lot.asset(),
            holder: lot.holder(),
            line: lot.line(),
            acquired_at: format::timestamp(lot.acquired_at()),
            quantity: lot.quantity(),
            remaining: lot.remaining(),
            remaining_cost: lot.remaining_cost(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BalancesOutput<'a> {
    balances: Vec<BalanceView>,
    lots: Vec<LotView<'a>>,
}
