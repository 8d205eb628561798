//! Open acquisition lots and the methods that pick which lot a disposal consumes

use super::transaction::Transaction;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::Serialize;

/// Remaining, unconsumed part of an acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lot {
    asset: String,
    holder: String,
    /// Source line of the acquisition that opened the lot
    line: u64,
    acquired_at: DateTime<FixedOffset>,
    quantity: Decimal,
    remaining: Decimal,
    remaining_cost: Decimal,
    cost_per_unit: Decimal,
}

/// Part of a lot taken by [`Lot::take`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub line: u64,
    pub acquired_at: DateTime<FixedOffset>,
    pub quantity: Decimal,
    pub cost: Decimal,
}

impl Lot {
    /// Lot opened by an acquisition; the fee is part of its cost
    pub fn open(transaction: &Transaction) -> Option<Self> {
        let acquisition = transaction.as_acquisition()?;
        Some(Self::new(
            transaction.asset(),
            acquisition.holder(),
            transaction.line(),
            *transaction.timestamp(),
            acquisition.crypto_in(),
            acquisition.fiat_in_with_fee(),
        ))
    }

    fn new(
        asset: &str,
        holder: &str,
        line: u64,
        acquired_at: DateTime<FixedOffset>,
        quantity: Decimal,
        cost: Decimal,
    ) -> Self {
        Lot {
            asset: asset.to_string(),
            holder: holder.to_string(),
            line,
            acquired_at,
            quantity,
            remaining: quantity,
            remaining_cost: cost,
            cost_per_unit: if quantity.is_zero() {
                Decimal::ZERO
            } else {
                cost.checked_div(quantity).unwrap_or(Decimal::MAX)
            },
        }
    }

    /// Lot holding a migrated fragment, keeping its origin and per-unit basis
    pub(crate) fn from_fragment(asset: &str, holder: &str, fragment: &Fragment) -> Self {
        Self::new(
            asset,
            holder,
            fragment.line,
            fragment.acquired_at,
            fragment.quantity,
            fragment.cost,
        )
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn acquired_at(&self) -> &DateTime<FixedOffset> {
        &self.acquired_at
    }

    /// Quantity the lot was opened with
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn remaining(&self) -> Decimal {
        self.remaining
    }

    pub fn remaining_cost(&self) -> Decimal {
        self.remaining_cost
    }

    pub fn cost_per_unit(&self) -> Decimal {
        self.cost_per_unit
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Acquisition order: instant, then source line
    pub fn order_key(&self) -> (DateTime<FixedOffset>, u64) {
        (self.acquired_at, self.line)
    }

    /// Consume up to `quantity`, returning the consumed fragment with its proportional cost
    ///
    /// `None` when the proportional cost is not representable; the lot is then left untouched.
    pub fn take(&mut self, quantity: Decimal) -> Option<Fragment> {
        let (quantity, cost) = if quantity >= self.remaining {
            (self.remaining, self.remaining_cost)
        } else {
            (quantity, proportion(self.remaining_cost, quantity, self.remaining)?)
        };
        self.remaining -= quantity;
        self.remaining_cost -= cost;
        log::debug!(
            "Lot {} {} (line {}) TAKE: qty={}, cost={}. Remaining: qty={}, cost={}",
            self.asset,
            self.holder,
            self.line,
            quantity,
            cost,
            self.remaining,
            self.remaining_cost
        );
        Some(Fragment {
            line: self.line,
            acquired_at: self.acquired_at,
            quantity,
            cost,
        })
    }

    /// Fold a fragment of the same origin back into this lot
    pub(crate) fn absorb(&mut self, fragment: &Fragment) {
        self.quantity += fragment.quantity;
        self.remaining += fragment.quantity;
        self.remaining_cost += fragment.cost;
    }
}

/// `amount × part / whole`, multiplying first for exactness and dividing first when the product overflows
pub(crate) fn proportion(amount: Decimal, part: Decimal, whole: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(part)
        .and_then(|product| product.checked_div(whole))
        .or_else(|| part.checked_div(whole)?.checked_mul(amount))
}

/// Lot selection strategy
///
/// `lots` is never empty, holds only lots with a positive remaining quantity and is ordered
/// by acquisition (instant, then source line).
pub trait AccountingMethod: Send + Sync {
    fn name(&self) -> &'static str;

    /// Index of the lot to consume next
    fn select(&self, lots: &[Lot]) -> Option<usize>;
}

/// First in, first out
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl AccountingMethod for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn select(&self, lots: &[Lot]) -> Option<usize> {
        if lots.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Last in, first out
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifo;

impl AccountingMethod for Lifo {
    fn name(&self) -> &'static str {
        "LIFO"
    }

    fn select(&self, lots: &[Lot]) -> Option<usize> {
        lots.len().checked_sub(1)
    }
}

/// Highest cost per unit first; ties go to the earliest lot
#[derive(Debug, Clone, Copy, Default)]
pub struct Hifo;

impl AccountingMethod for Hifo {
    fn name(&self) -> &'static str {
        "HIFO"
    }

    fn select(&self, lots: &[Lot]) -> Option<usize> {
        let mut best: Option<(usize, Decimal)> = None;
        for (i, lot) in lots.iter().enumerate() {
            match best {
                Some((_, cost)) if lot.cost_per_unit() <= cost => {}
                _ => best = Some((i, lot.cost_per_unit())),
            }
        }
        best.map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn lot(line: u64, date: &str, quantity: Decimal, cost: Decimal) -> Lot {
        let acquired_at = DateTime::parse_from_rfc3339(&format!("{date}T00:00:00Z")).unwrap();
        Lot::new("BTC", "Alice", line, acquired_at, quantity, cost)
    }

    #[test]
    fn partial_take_is_proportional() {
        let mut lot = lot(1, "2020-01-01", dec!(2), dec!(200));
        let fragment = lot.take(dec!(1)).unwrap();
        assert_eq!(fragment.quantity, dec!(1));
        assert_eq!(fragment.cost, dec!(100));
        assert_eq!(lot.remaining(), dec!(1));
        assert_eq!(lot.remaining_cost(), dec!(100));
        assert!(!lot.is_exhausted());
    }

    #[test]
    fn fragments_sum_to_lot_cost() {
        let mut lot = lot(1, "2020-01-01", dec!(3), dec!(100));
        let a = lot.take(dec!(1)).unwrap();
        let b = lot.take(dec!(1)).unwrap();
        let c = lot.take(dec!(5)).unwrap();
        assert_eq!(c.quantity, dec!(1));
        assert_eq!(a.cost + b.cost + c.cost, dec!(100));
        assert!(lot.is_exhausted());
        assert_eq!(lot.remaining_cost(), Decimal::ZERO);
    }

    #[test]
    fn absorb_restores_fragment() {
        let mut lot = lot(1, "2020-01-01", dec!(4), dec!(400));
        let fragment = lot.take(dec!(1.5)).unwrap();
        lot.absorb(&fragment);
        assert_eq!(lot.remaining(), dec!(4));
        assert_eq!(lot.remaining_cost(), dec!(400));
    }

    #[test]
    fn partial_take_of_huge_lot_divides_first() {
        let mut lot = lot(1, "2020-01-01", dec!(3000000000000), dec!(30000000000000000000000000));
        let fragment = lot.take(dec!(1000000000000)).unwrap();
        assert_eq!(fragment.quantity, dec!(1000000000000));
        assert!(fragment.cost > dec!(9999999999999999999999999));
        assert!(fragment.cost <= dec!(10000000000000000000000000));
        assert_eq!(lot.remaining(), dec!(2000000000000));
    }

    #[test]
    fn proportion_is_exact_when_representable() {
        assert_eq!(proportion(dec!(300), dec!(1), dec!(3)), Some(dec!(100)));
        assert_eq!(proportion(dec!(1), dec!(1), Decimal::ZERO), None);
    }

    #[test]
    fn fifo_and_lifo_pick_ends() {
        let lots = vec![
            lot(1, "2020-01-01", dec!(1), dec!(10)),
            lot(2, "2020-02-01", dec!(1), dec!(30)),
            lot(3, "2020-03-01", dec!(1), dec!(20)),
        ];
        assert_eq!(Fifo.select(&lots), Some(0));
        assert_eq!(Lifo.select(&lots), Some(2));
        assert_eq!(Fifo.select(&[]), None);
        assert_eq!(Lifo.select(&[]), None);
    }

    #[test]
    fn hifo_picks_highest_unit_cost_earliest_on_tie() {
        let lots = vec![
            lot(1, "2020-01-01", dec!(2), dec!(20)),
            lot(2, "2020-02-01", dec!(1), dec!(30)),
            lot(3, "2020-03-01", dec!(2), dec!(60)),
            lot(4, "2020-04-01", dec!(1), dec!(5)),
        ];
        assert_eq!(Hifo.select(&lots), Some(1));
        assert_eq!(Hifo.select(&[]), None);
    }
}
