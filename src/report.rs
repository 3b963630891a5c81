// 📊 Trial Balance Report - Import, classify, and total by account type
//
// Reads a trial balance CSV, skips subtotal/heading rows, classifies each
// account, and sums debits and credits per account type.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use crate::categories::CategoryRecord;
use crate::resolver::{Classification, Resolver};

const SKIP_KEYWORDS: &[&str] = &[
    "total",
    "subtotal",
    "classification",
    "balance sheet",
    "income statement",
];

// ============================================================================
// ENTRIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalanceEntry {
    pub account: String,
    pub debit: f64,
    pub credit: f64,
    /// CSV line the entry came from (1-indexed, header is line 1)
    pub line_number: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrialBalance {
    pub entries: Vec<TrialBalanceEntry>,
    pub skipped: Vec<String>,
}

/// Parse a monetary cell.
///
/// Handles `(100)` as -100, currency symbols, thousands separators,
/// embedded whitespace, and trailing `%`.
pub fn parse_amount(raw: &str) -> Result<f64> {
    let mut value = raw.trim().to_string();
    if value.is_empty() {
        return Err(anyhow!("Amount is required"));
    }

    if value.starts_with('(') && value.ends_with(')') {
        value = format!("-{}", &value[1..value.len() - 1]);
    }

    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | '£' | '€' | '¥' | ',') && !c.is_whitespace())
        .collect();

    let (number, scale) = match cleaned.strip_suffix('%') {
        Some(stripped) => (stripped, 100.0),
        None => (cleaned.as_str(), 1.0),
    };

    let parsed: f64 = number
        .parse()
        .map_err(|_| anyhow!("Invalid number format: {}", raw))?;
    if !parsed.is_finite() {
        return Err(anyhow!("Invalid number format: {}", raw));
    }

    Ok(parsed / scale)
}

fn is_summary_row(name: &str) -> bool {
    let lower = name.to_lowercase();
    SKIP_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[derive(Debug, Clone, Copy)]
enum AmountColumns {
    DebitCredit { debit: usize, credit: usize },
    Signed(usize),
}

/// Name column: a header containing `name` wins, otherwise the last header
/// mentioning `account` or `description` (so `Account Code` loses to a later
/// label column).
fn locate_columns(headers: &csv::StringRecord) -> (usize, AmountColumns) {
    let mut name = None;
    let mut label = None;
    let mut debit = None;
    let mut credit = None;
    let mut signed = None;

    for (idx, header) in headers.iter().enumerate() {
        let h = header.to_lowercase();
        if h.contains("debit") {
            debit.get_or_insert(idx);
        } else if h.contains("credit") {
            credit.get_or_insert(idx);
        } else if h.contains("amount") || h.contains("balance") || h.contains("value") {
            signed.get_or_insert(idx);
        } else if h.contains("name") {
            name.get_or_insert(idx);
        } else if h.contains("account") || h.contains("description") {
            label = Some(idx);
        }
    }

    let amounts = match (debit, credit, signed) {
        (Some(debit), Some(credit), _) => AmountColumns::DebitCredit { debit, credit },
        (_, _, Some(col)) => AmountColumns::Signed(col),
        (Some(col), None, None) | (None, Some(col), None) => AmountColumns::Signed(col),
        (None, None, None) => AmountColumns::Signed(1),
    };

    (name.or(label).unwrap_or(0), amounts)
}

fn optional_amount(cell: Option<&str>) -> Result<f64> {
    match cell.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(raw) => parse_amount(raw),
    }
}

/// Read a trial balance from any CSV reader
pub fn read_trial_balance<R: std::io::Read>(reader: R) -> Result<TrialBalance> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().context("Trial balance has no header row")?.clone();
    let (name_col, amount_cols) = locate_columns(&headers);

    let mut balance = TrialBalance::default();

    for (idx, result) in rdr.records().enumerate() {
        let line_number = idx + 2;
        let record = result.with_context(|| format!("Failed to parse CSV line {}", line_number))?;

        let account = record.get(name_col).unwrap_or("").trim().to_string();
        if account.is_empty() {
            continue;
        }
        if is_summary_row(&account) {
            balance.skipped.push(account);
            continue;
        }

        let (debit, credit) = match amount_cols {
            AmountColumns::DebitCredit { debit, credit } => (
                optional_amount(record.get(debit)),
                optional_amount(record.get(credit)),
            ),
            AmountColumns::Signed(col) => match record.get(col).map(parse_amount) {
                Some(Ok(v)) if v >= 0.0 => (Ok(v), Ok(0.0)),
                Some(Ok(v)) => (Ok(0.0), Ok(-v)),
                Some(Err(e)) => (Err(e), Ok(0.0)),
                None => (Err(anyhow!("Amount is required")), Ok(0.0)),
            },
        };

        let debit = debit.with_context(|| {
            format!("Invalid amount for \"{}\" (row {})", account, line_number)
        })?;
        let credit = credit.with_context(|| {
            format!("Invalid amount for \"{}\" (row {})", account, line_number)
        })?;

        balance.entries.push(TrialBalanceEntry {
            account,
            debit,
            credit,
            line_number,
        });
    }

    if balance.entries.is_empty() {
        if balance.skipped.is_empty() {
            return Err(anyhow!("No valid entries found in the trial balance"));
        }
        return Err(anyhow!(
            "No valid entries found. Skipped rows: {}",
            balance.skipped.join(", ")
        ));
    }

    Ok(balance)
}

/// Read a trial balance CSV file
pub fn load_trial_balance(path: &Path) -> Result<TrialBalance> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open trial balance: {}", path.display()))?;
    read_trial_balance(file)
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEntry {
    #[serde(flatten)]
    pub entry: TrialBalanceEntry,
    #[serde(flatten)]
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub debit: f64,
    pub credit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub entries: Vec<ClassifiedEntry>,
    #[serde(rename = "totalsByType")]
    pub totals_by_type: BTreeMap<String, Totals>,
    pub skipped: Vec<String>,
}

impl Report {
    /// Sum debits and credits per account type
    pub fn from_entries(entries: Vec<ClassifiedEntry>, skipped: Vec<String>) -> Self {
        let mut totals_by_type: BTreeMap<String, Totals> = BTreeMap::new();
        for e in &entries {
            let totals = totals_by_type
                .entry(e.classification.account_type.clone())
                .or_default();
            totals.debit += e.entry.debit;
            totals.credit += e.entry.credit;
        }

        Report {
            entries,
            totals_by_type,
            skipped,
        }
    }

    pub fn total_debit(&self) -> f64 {
        self.totals_by_type.values().map(|t| t.debit).sum()
    }

    pub fn total_credit(&self) -> f64 {
        self.totals_by_type.values().map(|t| t.credit).sum()
    }

    /// Debits equal credits to the cent
    pub fn is_balanced(&self) -> bool {
        (self.total_debit() - self.total_credit()).abs() < 0.005
    }
}

/// Classify every entry of a trial balance, one account at a time
pub async fn build_report(
    resolver: &Resolver,
    balance: TrialBalance,
    records: &[CategoryRecord],
) -> Report {
    let mut entries = Vec::with_capacity(balance.entries.len());
    for entry in balance.entries {
        let classification = resolver.resolve(&entry.account, records).await;
        entries.push(ClassifiedEntry {
            entry,
            classification,
        });
    }

    let report = Report::from_entries(entries, balance.skipped);
    if !report.is_balanced() {
        warn!(
            debit = report.total_debit(),
            credit = report.total_credit(),
            "trial balance does not balance"
        );
    }
    info!(entries = report.entries.len(), types = report.totals_by_type.len(), "report built");
    report
}

// ============================================================================
// TESTS
// ============================================================================
