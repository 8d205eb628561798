use rust_decimal::Decimal;

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value has the wrong shape (missing, not a number, not a timestamp, wrong variant)
    Type,
    /// A value has the right shape but breaks a domain rule
    Value,
    /// The engine broke one of its own invariants
    Internal,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("line {line}: parameter '{name}' is missing")]
    MissingField { line: u64, name: &'static str },
    #[error("line {line}: parameter '{name}' has non-numeric value: {value}")]
    NonNumeric {
        line: u64,
        name: &'static str,
        value: String,
    },
    #[error("line {line}: parameter '{name}' has non-timestamp value: {value}")]
    InvalidTimestamp {
        line: u64,
        name: &'static str,
        value: String,
    },
    #[error("parameter '{name}' is not of type {expected}: {found}")]
    WrongVariant {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid transaction representation: {0}")]
    InvalidRepr(String),

    #[error("parameter 'line' has non-positive value: {0}")]
    NonPositiveLine(u64),
    #[error("line {line}: parameter '{name}' value has no timezone info: {value}")]
    NoTimezone {
        line: u64,
        name: &'static str,
        value: String,
    },
    #[error("line {line}: parameter '{name}' value is not known: '{value}'")]
    Unknown {
        line: u64,
        name: &'static str,
        value: String,
    },
    #[error("line {line}: parameter '{name}' has zero value")]
    Zero { line: u64, name: &'static str },
    #[error("line {line}: parameter '{name}' has non-positive value: {value}")]
    NonPositive {
        line: u64,
        name: &'static str,
        value: Decimal,
    },
    #[error("line {line}: parameter '{name}' has negative value: {value}")]
    Negative {
        line: u64,
        name: &'static str,
        value: Decimal,
    },
    #[error("line {line}: value of '{name}' is too large to represent")]
    Overflow { line: u64, name: &'static str },
    #[error("Disposal at line {line}: crypto fee {fee} is not less than crypto amount {amount}")]
    FeeNotLessThanAmount {
        line: u64,
        fee: Decimal,
        amount: Decimal,
    },
    #[error("Transfer at line {line}: from/to exchanges/holders are the same: sending to self")]
    SendingToSelf { line: u64 },
    #[error("Transfer at line {line}: crypto sent < crypto received ({sent} < {received})")]
    SentLessThanReceived {
        line: u64,
        sent: Decimal,
        received: Decimal,
    },
    #[error(
        "{kind} at line {line}: insufficient lots for {required} {asset} held by {holder} (available {available})"
    )]
    InsufficientLots {
        kind: &'static str,
        line: u64,
        asset: String,
        holder: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingField { .. }
            | Error::NonNumeric { .. }
            | Error::InvalidTimestamp { .. }
            | Error::WrongVariant { .. }
            | Error::InvalidRepr(_) => ErrorKind::Type,
            Error::Internal(_) => ErrorKind::Internal,
            _ => ErrorKind::Value,
        }
    }

    /// True when the error points at bad input rather than a defect in the engine
    pub fn is_data_error(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }

    /// Source line the error refers to, when it refers to one
    pub fn line(&self) -> Option<u64> {
        match self {
            Error::MissingField { line, .. }
            | Error::NonNumeric { line, .. }
            | Error::InvalidTimestamp { line, .. }
            | Error::NoTimezone { line, .. }
            | Error::Unknown { line, .. }
            | Error::Zero { line, .. }
            | Error::NonPositive { line, .. }
            | Error::Negative { line, .. }
            | Error::Overflow { line, .. }
            | Error::FeeNotLessThanAmount { line, .. }
            | Error::SendingToSelf { line }
            | Error::SentLessThanReceived { line, .. }
            | Error::InsufficientLots { line, .. } => Some(*line),
            Error::NonPositiveLine(line) => Some(*line),
            Error::WrongVariant { .. } | Error::InvalidRepr(_) | Error::Internal(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn kinds_are_distinguishable() {
        let type_error = Error::NonNumeric {
            line: 3,
            name: "spot_price",
            value: "abc".to_string(),
        };
        let value_error = Error::NonPositive {
            line: 3,
            name: "spot_price",
            value: dec!(-1),
        };
        let internal = Error::Internal("lot totals disagree".to_string());

        assert_eq!(type_error.kind(), ErrorKind::Type);
        assert_eq!(value_error.kind(), ErrorKind::Value);
        assert_eq!(internal.kind(), ErrorKind::Internal);
        assert!(type_error.is_data_error());
        assert!(value_error.is_data_error());
        assert!(!internal.is_data_error());
    }

    #[test]
    fn messages_carry_line_and_field() {
        let err = Error::Unknown {
            line: 19,
            name: "from_exchange",
            value: "COinbase Pro".to_string(),
        };
        assert_eq!(err.line(), Some(19));
        assert_eq!(
            err.to_string(),
            "line 19: parameter 'from_exchange' value is not known: 'COinbase Pro'"
        );
    }

    #[test]
    fn insufficient_lots_is_a_data_error() {
        let err = Error::InsufficientLots {
            kind: "Disposal",
            line: 7,
            asset: "BTC".to_string(),
            holder: "Bob".to_string(),
            required: dec!(3),
            available: dec!(2),
        };
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.is_data_error());
        assert!(err.to_string().starts_with("Disposal at line 7: insufficient lots"));
    }
}
