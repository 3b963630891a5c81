use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use account_categorizer::logging::init_tracing;
use account_categorizer::{
    build_report, load_records, load_trial_balance, CategoryTree, ClassifierConfig,
};

#[derive(Parser)]
#[command(name = "account-categorizer", version, about = "Classify ledger accounts into a four-level taxonomy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single account name and print the resolution as JSON
    Classify {
        account_name: String,
        /// Category records (.csv or .json)
        #[arg(long, short)]
        categories: PathBuf,
        #[command(flatten)]
        classifier: ClassifierConfig,
    },
    /// Print the category tree built from a records file
    Tree {
        #[arg(long, short)]
        categories: PathBuf,
    },
    /// Classify every row of a trial balance CSV and total by account type
    Report {
        trial_balance: PathBuf,
        #[arg(long, short)]
        categories: PathBuf,
        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        classifier: ClassifierConfig,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Classify {
            account_name,
            categories,
            classifier,
        } => {
            let records = load_records(&categories)?;
            let resolver = classifier.build_resolver()?;
            let resolution = resolver.resolve_detailed(&account_name, &records).await;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Command::Tree { categories } => {
            let records = load_records(&categories)?;
            let tree = CategoryTree::build(&records);
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Command::Report {
            trial_balance,
            categories,
            json,
            classifier,
        } => run_report(trial_balance, categories, json, classifier).await?,
    }

    Ok(())
}

async fn run_report(
    trial_balance: PathBuf,
    categories: PathBuf,
    json: bool,
    classifier: ClassifierConfig,
) -> Result<()> {
    let records = load_records(&categories)?;
    let balance = load_trial_balance(&trial_balance)?;
    let resolver = classifier.build_resolver()?;

    let report = build_report(&resolver, balance, &records).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📊 Report Summary - {}", trial_balance.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for e in &report.entries {
        println!(
            "{:<32} {:<16} {:<28} {:>12.2} {:>12.2}",
            e.entry.account,
            e.classification.account_type,
            e.classification.primary,
            e.entry.debit,
            e.entry.credit
        );
    }

    println!("\nTotals by account type:");
    for (account_type, totals) in &report.totals_by_type {
        println!("  {:<20} debit {:>12.2}  credit {:>12.2}", account_type, totals.debit, totals.credit);
    }

    if !report.skipped.is_empty() {
        println!("\nSkipped rows: {}", report.skipped.join(", "));
    }

    if report.is_balanced() {
        println!("\n✓ Debits equal credits");
    } else {
        println!(
            "\n⚠️  Out of balance by {:.2}",
            report.total_debit() - report.total_credit()
        );
    }

    Ok(())
}
