// 🌳 Category Tree - Accounting taxonomy built from flat records
//
// accountType → primary → secondary → [tertiary, ...]
//
// The tree is rebuilt for every request from whatever records the caller
// sends; nothing here is cached or persisted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// CATEGORY RECORD
// ============================================================================

/// One row of the caller's chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    #[serde(rename = "accountType")]
    pub account_type: String,
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
}

impl CategoryRecord {
    pub fn new(
        account_type: impl Into<String>,
        primary: impl Into<String>,
        secondary: impl Into<String>,
        tertiary: impl Into<String>,
    ) -> Self {
        CategoryRecord {
            account_type: account_type.into(),
            primary: primary.into(),
            secondary: secondary.into(),
            tertiary: tertiary.into(),
        }
    }
}

// ============================================================================
// CATEGORY TREE
// ============================================================================

pub type SecondaryLevel = BTreeMap<String, Vec<String>>;
pub type PrimaryLevel = BTreeMap<String, SecondaryLevel>;

/// Four-level taxonomy.
///
/// Keys at the first three levels are unique by construction; tertiary
/// labels keep the order they were first seen in and never repeat under
/// the same (accountType, primary, secondary) path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryTree {
    nodes: BTreeMap<String, PrimaryLevel>,
}

impl CategoryTree {
    /// Build the tree from records in input order
    pub fn build(records: &[CategoryRecord]) -> Self {
        let mut tree = CategoryTree::default();
        for record in records {
            tree.insert(record);
        }
        tree
    }

    /// Add a single record, ignoring tertiary labels already present
    pub fn insert(&mut self, record: &CategoryRecord) {
        let tertiaries = self
            .nodes
            .entry(record.account_type.clone())
            .or_default()
            .entry(record.primary.clone())
            .or_default()
            .entry(record.secondary.clone())
            .or_default();

        if !tertiaries.contains(&record.tertiary) {
            tertiaries.push(record.tertiary.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ------------------------------------------------------------------------
    // Candidate sets, one per level. Missing paths yield an empty list.
    // ------------------------------------------------------------------------

    pub fn account_types(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn primaries(&self, account_type: &str) -> Vec<String> {
        self.nodes
            .get(account_type)
            .map(|level| level.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn secondaries(&self, account_type: &str, primary: &str) -> Vec<String> {
        self.nodes
            .get(account_type)
            .and_then(|level| level.get(primary))
            .map(|level| level.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tertiaries(&self, account_type: &str, primary: &str, secondary: &str) -> Vec<String> {
        self.nodes
            .get(account_type)
            .and_then(|level| level.get(primary))
            .and_then(|level| level.get(secondary))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of distinct (accountType, primary, secondary, tertiary) paths
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|primaries| primaries.values())
            .flat_map(|secondaries| secondaries.values())
            .map(|tertiaries| tertiaries.len())
            .sum()
    }
}

// ============================================================================
// LOADERS
// ============================================================================

/// Load records from a CSV file with `accountType,primary,secondary,tertiary` headers
pub fn load_records_csv(csv_path: &Path) -> Result<Vec<CategoryRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open categories file: {}", csv_path.display()))?;

    let mut records = Vec::new();
    for (line_num, result) in rdr.deserialize().enumerate() {
        let record: CategoryRecord = result.with_context(|| {
            format!(
                "Failed to parse category on line {} of {}",
                line_num + 2,
                csv_path.display()
            )
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Load records from a JSON array file
pub fn load_records_json(json_path: &Path) -> Result<Vec<CategoryRecord>> {
    let content = fs::read_to_string(json_path)
        .with_context(|| format!("Failed to read categories file: {}", json_path.display()))?;

    serde_json::from_str(&content).context("Failed to parse categories JSON")
}

/// Pick a loader from the file extension (`.json` → JSON, anything else → CSV)
pub fn load_records(path: &Path) -> Result<Vec<CategoryRecord>> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        load_records_json(path)
    } else {
        load_records_csv(path)
    }
}

// ============================================================================
// TESTS
// ============================================================================
