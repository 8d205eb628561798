//! Exact rendering of amounts and timestamps

use super::config::{CRYPTO_DECIMALS, FIAT_DECIMALS};
use chrono::{DateTime, FixedOffset, Timelike};
use rust_decimal::Decimal;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f %z";
const TIMESTAMP_FORMAT_NANOS: &str = "%Y-%m-%d %H:%M:%S%.9f %z";

/// Fiat amount with at least 4 decimal places; more only when the value is finer than that
pub fn fiat(value: Decimal) -> String {
    fixed_or_exact(value, FIAT_DECIMALS)
}

/// Asset amount with at least 8 decimal places; more only when the value is finer than that
pub fn crypto(value: Decimal) -> String {
    fixed_or_exact(value, CRYPTO_DECIMALS)
}

fn fixed_or_exact(value: Decimal, places: u32) -> String {
    if value.is_zero() {
        return format!("{:.*}", places as usize, Decimal::ZERO);
    }
    let normalized = value.normalize();
    if normalized.scale() > places {
        normalized.to_string()
    } else {
        format!("{:.*}", places as usize, value)
    }
}

pub fn timestamp(value: &DateTime<FixedOffset>) -> String {
    if value.nanosecond() % 1_000 == 0 {
        value.format(TIMESTAMP_FORMAT).to_string()
    } else {
        value.format(TIMESTAMP_FORMAT_NANOS).to_string()
    }
}
