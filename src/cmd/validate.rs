//! Validate command - surface data problems without generating a report

use super::InputArgs;
use crate::core::{resolve, Error, ErrorKind, Transaction};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: &'static str,
    line: Option<u64>,
    message: String,
}

impl From<&Error> for ValidationIssue {
    fn from(err: &Error) -> Self {
        ValidationIssue {
            issue_type: match err.kind() {
                ErrorKind::Type => "TypeError",
                ErrorKind::Value => "ValueError",
                ErrorKind::Internal => "InternalError",
            },
            line: err.line(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ValidationOutput {
    row_count: usize,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = self.input.read_config()?;
        let rows = self.input.read_rows()?;

        let mut issues = Vec::new();
        let mut transactions = Vec::new();
        for row in &rows {
            match Transaction::from_row(&config, row) {
                Ok(transaction) => transactions.push(transaction),
                Err(err) => issues.push(ValidationIssue::from(&err)),
            }
        }

        // resolve only when every row constructs
        if issues.is_empty() {
            if let Err(err) = resolve(&config, transactions) {
                issues.push(ValidationIssue::from(&err));
            }
        }

        if self.json {
            self.print_json(rows.len(), &issues)?;
        } else {
            self.print_text(rows.len(), &issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }

    fn print_text(&self, row_count: usize, issues: &[ValidationIssue]) {
        println!();
        println!("VALIDATION RESULTS ({} rows)", row_count);
        println!();

        if issues.is_empty() {
            println!("\u{2713} No issues found.");
        } else {
            println!("\u{26A0} {} issue(s) found:", issues.len());
            println!();

            for (i, issue) in issues.iter().enumerate() {
                let line = issue
                    .line
                    .map_or("-".to_string(), |l| l.to_string());
                println!("  {}. [{}] line {}", i + 1, issue.issue_type, line);
                println!("     {}", issue.message);
                println!();
            }
        }
    }

    fn print_json(&self, row_count: usize, issues: &[ValidationIssue]) -> anyhow::Result<()> {
        let output = ValidationOutput {
            row_count,
            issue_count: issues.len(),
            issues: issues.to_vec(),
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
