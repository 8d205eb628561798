//! Diagnostic string forms of a [`Transaction`]
//!
//! The plain form lists one `key=value` per line under a header; the repr form
//! is a single `Kind(key=value, ...)` expression that [`Transaction::parse_repr`]
//! turns back into an equal record.

use super::config::Configuration;
use super::error::{Error, Result};
use super::format;
use super::row::TransactionRow;
use super::transaction::Transaction;
use std::collections::HashMap;
use std::fmt;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Plain,
    Repr,
}

enum Value {
    /// Free text, quoted in the repr form
    Text(String),
    /// Numbers, flags and tags, never quoted
    Bare(String),
}

impl Transaction {
    fn fields(&self) -> Vec<(&'static str, Value)> {
        use Value::{Bare, Text};

        let mut fields = vec![
            ("line", Bare(self.line().to_string())),
            ("timestamp", Text(format::timestamp(self.timestamp()))),
            ("asset", Text(self.asset().to_string())),
        ];
        match self {
            Transaction::Acquisition(t) => fields.extend([
                ("exchange", Text(t.exchange().to_string())),
                ("holder", Text(t.holder().to_string())),
                ("classification", Bare(t.kind().as_str().to_string())),
                ("spot_price", Bare(format::fiat(self.spot_price()))),
                ("crypto_in", Bare(format::crypto(t.crypto_in()))),
                ("crypto_fee", Bare(format::crypto(t.crypto_fee()))),
                ("fiat_in_no_fee", Bare(format::fiat(t.fiat_in_no_fee()))),
                ("fiat_in_with_fee", Bare(format::fiat(t.fiat_in_with_fee()))),
            ]),
            Transaction::Disposal(t) => fields.extend([
                ("exchange", Text(t.exchange().to_string())),
                ("holder", Text(t.holder().to_string())),
                ("classification", Bare(t.kind().as_str().to_string())),
                ("spot_price", Bare(format::fiat(self.spot_price()))),
                ("crypto_sent", Bare(format::crypto(t.crypto_sent()))),
                ("crypto_fee", Bare(format::crypto(t.crypto_fee()))),
                ("crypto_disposed", Bare(format::crypto(t.crypto_disposed()))),
                ("fiat_out_no_fee", Bare(format::fiat(t.fiat_out_no_fee()))),
                ("fiat_out_with_fee", Bare(format::fiat(t.fiat_out_with_fee()))),
            ]),
            Transaction::Transfer(t) => fields.extend([
                ("from_exchange", Text(t.from_exchange().to_string())),
                ("from_holder", Text(t.from_holder().to_string())),
                ("to_exchange", Text(t.to_exchange().to_string())),
                ("to_holder", Text(t.to_holder().to_string())),
                ("spot_price", Bare(format::fiat(self.spot_price()))),
                ("crypto_sent", Bare(format::crypto(t.crypto_sent()))),
                ("crypto_received", Bare(format::crypto(t.crypto_received()))),
                ("crypto_fee", Bare(format::crypto(self.crypto_fee()))),
            ]),
        }
        fields.extend([
            ("fiat_fee", Bare(format::fiat(self.fiat_fee()))),
            ("is_taxable", Bare(self.is_taxable().to_string())),
            ("fiat_taxable_amount", Bare(format::fiat(self.fiat_taxable_amount()))),
        ]);
        if let Some(notes) = self.notes() {
            fields.push(("notes", Text(notes.to_string())));
        }
        fields
    }

    /// Render at `indent` levels (two spaces each), followed by `extra` annotation lines
    pub fn render(&self, indent: usize, format: RenderFormat, extra: &[String]) -> String {
        let pad = INDENT.repeat(indent);
        let name = self.kind().name();
        let mut fields = self.fields();

        match format {
            RenderFormat::Plain => {
                let field_pad = INDENT.repeat(indent + 1);
                let mut out = format!("{pad}{name}:");
                for (key, value) in fields {
                    let value = match value {
                        Value::Text(s) | Value::Bare(s) => s,
                    };
                    out.push_str(&format!("\n{field_pad}{key}={value}"));
                }
                for line in extra {
                    out.push_str(&format!("\n{field_pad}{line}"));
                }
                out
            }
            RenderFormat::Repr => {
                if self.notes().is_none() {
                    fields.push(("notes", Value::Text(String::new())));
                }
                let parts: Vec<String> = fields
                    .into_iter()
                    .map(|(key, value)| match value {
                        Value::Text(s) => format!("{key}={}", quote(&s)),
                        Value::Bare(s) => format!("{key}={s}"),
                    })
                    .chain(extra.iter().cloned())
                    .collect();
                format!("{pad}{name}({})", parts.join(", "))
            }
        }
    }

    /// Rebuild a transaction from its repr form; derived fields are recomputed, not read
    pub fn parse_repr(config: &Configuration, s: &str) -> Result<Self> {
        let s = s.trim();
        let open = s
            .find('(')
            .ok_or_else(|| Error::InvalidRepr(format!("missing '(' in {s}")))?;
        let body = s[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| Error::InvalidRepr(format!("missing ')' in {s}")))?;
        let kind = &s[..open];

        let values = split_fields(body)?;
        let get = |key: &str| values.get(key).cloned();
        let line = match values.get("line") {
            Some(l) => l
                .parse::<u64>()
                .map_err(|_| Error::InvalidRepr(format!("line is not a positive integer: {l}")))?,
            None => return Err(Error::InvalidRepr("missing line".to_string())),
        };

        let mut row = TransactionRow {
            line,
            kind: Some(kind.to_string()),
            timestamp: get("timestamp"),
            asset: get("asset"),
            spot_price: get("spot_price"),
            notes: get("notes"),
            ..TransactionRow::default()
        };
        match kind {
            "Acquisition" => {
                row.exchange = get("exchange");
                row.holder = get("holder");
                row.classification = get("classification");
                row.crypto_amount = get("crypto_in");
                row.crypto_fee = get("crypto_fee");
            }
            "Disposal" => {
                row.exchange = get("exchange");
                row.holder = get("holder");
                row.classification = get("classification");
                row.crypto_amount = get("crypto_sent");
                row.crypto_fee = get("crypto_fee");
            }
            "Transfer" => {
                row.exchange = get("from_exchange");
                row.holder = get("from_holder");
                row.to_exchange = get("to_exchange");
                row.to_holder = get("to_holder");
                row.crypto_amount = get("crypto_sent");
                row.crypto_received = get("crypto_received");
            }
            other => return Err(Error::InvalidRepr(format!("unknown record kind '{other}'"))),
        }
        Transaction::from_row(config, &row)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(0, RenderFormat::Plain, &[]))
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Split `key=value, key='text', annotation` into a map; entries without `=` are annotations
///
/// The first occurrence of a key wins, so trailing annotations never replace a field.
fn split_fields(body: &str) -> Result<HashMap<String, String>> {
    let mut values = HashMap::new();
    let mut chars = body.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.next_if_eq(&'=').is_some() {
            let value = if chars.next_if_eq(&'\'').is_some() {
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(c) => text.push(c),
                            None => return Err(Error::InvalidRepr("dangling escape".to_string())),
                        },
                        Some('\'') => break,
                        Some(c) => text.push(c),
                        None => {
                            return Err(Error::InvalidRepr(format!(
                                "unterminated text for '{key}'"
                            )))
                        }
                    }
                }
                text
            } else {
                let mut bare = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    bare.push(c);
                    chars.next();
                }
                bare.trim().to_string()
            };
            values.entry(key.trim().to_string()).or_insert(value);
        }

        match chars.next() {
            Some(',') | None => {}
            Some(c) => return Err(Error::InvalidRepr(format!("unexpected '{c}'"))),
        }
    }
    Ok(values)
}
