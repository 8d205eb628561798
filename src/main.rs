use clap::{Parser, Subcommand};

mod cmd;
mod core;

#[derive(Parser, Debug)]
#[command(
    name = "lotc",
    version,
    about = "Crypto capital gains with tax-lot resolution"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve lots and report gains, taxable amounts and totals
    Report(cmd::report::ReportCommand),
    /// Final balances and open lots per asset and holder
    Balances(cmd::balances::BalancesCommand),
    /// Check every row and the lot resolution without reporting
    Validate(cmd::validate::ValidateCommand),
    /// Print expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Report(report) => report.exec(),
        Command::Balances(balances) => balances.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
