pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod ledger;
pub mod lot;
pub mod render;
pub mod row;
pub mod transaction;

// Flat public surface for domain types and functions.
pub use config::{AccountingMethodKind, Configuration, DisposalFeePolicy};
pub use engine::{resolve, GainRecord, HoldingPeriod};
pub use error::{Error, ErrorKind, Result};
pub use ledger::{Entry, GainCsvRecord, Ledger, Totals};
pub use lot::{AccountingMethod, Fifo, Hifo, Lifo, Lot};
pub use render::RenderFormat;
pub use row::{read_rows_csv, CsvField, TransactionRow};
pub use transaction::{
    Acquisition, AcquisitionInput, AcquisitionKind, Category, CommonInput, Disposal,
    DisposalInput, DisposalKind, Transaction, TransactionKind, Transfer, TransferInput,
};
