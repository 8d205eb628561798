//! Schema command - print expected input formats

use crate::core::{AcquisitionKind, Configuration, DisposalKind, TransactionRow};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: config, csv-header or csv-fields
    #[arg(value_enum, default_value = "config")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the configuration file
    Config,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::Config => self.print_config_schema(),
            SchemaFormat::CsvHeader => self.print_csv_header(),
            SchemaFormat::CsvFields => self.print_csv_fields(),
        }
    }

    fn print_config_schema(&self) -> anyhow::Result<()> {
        let schema = schema_for!(Configuration);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn print_csv_header(&self) -> anyhow::Result<()> {
        println!("{}", TransactionRow::csv_header());
        Ok(())
    }

    fn print_csv_fields(&self) -> anyhow::Result<()> {
        println!("CSV Input Format");
        println!("================");
        println!();
        for field in TransactionRow::csv_schema() {
            let req = if field.required { "required" } else { "optional" };
            println!("{:20} ({:8})  {}", field.name, req, field.description);
        }
        println!();
        let acquisitions: Vec<&str> = AcquisitionKind::ALL.iter().map(|k| k.as_str()).collect();
        let disposals: Vec<&str> = DisposalKind::ALL.iter().map(|k| k.as_str()).collect();
        println!("Acquisition classifications: {}", acquisitions.join(", "));
        println!("Disposal classifications:    {}", disposals.join(", "));
        println!("Timestamps must carry a UTC offset (e.g. 2021-01-02T08:42:43Z)");
        Ok(())
    }
}
