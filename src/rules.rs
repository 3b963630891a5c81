// 🏷️ Keyword Rules - Fast path as data
// Case-insensitive pattern rules that pin accountType and primary without
// asking the model

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Rule ID for tracking
    pub id: String,

    /// Pattern to match (substring, or wildcards with *)
    pub pattern: String,

    /// Account type this rule assigns
    #[serde(rename = "accountType")]
    pub account_type: String,

    /// Primary classification this rule assigns
    pub primary: String,

    /// Description/notes about this rule
    #[serde(default)]
    pub description: Option<String>,

    /// Priority (higher = applied first)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    0
}

impl KeywordRule {
    pub fn new(
        id: &str,
        pattern: &str,
        account_type: &str,
        primary: &str,
        priority: i32,
    ) -> Self {
        KeywordRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            account_type: account_type.to_string(),
            primary: primary.to_string(),
            description: None,
            priority,
        }
    }

    /// Check if pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        let pattern_lower = self.pattern.to_lowercase();
        let text_lower = text.to_lowercase();

        if !pattern_lower.contains('*') {
            return text_lower.contains(&pattern_lower);
        }

        let parts: Vec<&str> = pattern_lower.split('*').collect();
        let first = parts[0];
        let last = parts[parts.len() - 1];

        if !text_lower.starts_with(first) || !text_lower.ends_with(last) {
            return false;
        }
        if first.len() + last.len() > text_lower.len() {
            return false;
        }

        // Middle parts must appear in order between the anchored ends
        let end = text_lower.len() - last.len();
        let mut current_pos = first.len();
        for part in &parts[1..parts.len() - 1] {
            if part.is_empty() {
                continue;
            }
            match text_lower[current_pos..end].find(part) {
                Some(pos) => current_pos += pos + part.len(),
                None => return false,
            }
        }

        true
    }
}

// ============================================================================
// RULE MATCH
// ============================================================================

/// Fixed (accountType, primary) pair chosen by a keyword rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_id: String,
    pub account_type: String,
    pub primary: String,
}

// ============================================================================
// RULE ENGINE
// ============================================================================

pub const CASH_ACCOUNT_TYPE: &str = "Asset";
pub const CASH_PRIMARY: &str = "Cash and Cash Equivalents";
pub const INCOME_ACCOUNT_TYPE: &str = "Revenue/income";
pub const INCOME_PRIMARY: &str = "Other Income";
pub const EXPENSE_ACCOUNT_TYPE: &str = "Cost/Expense";
pub const EXPENSE_PRIMARY: &str = "Operational Expenses";

const CASH_TERMS: &[&str] = &["cash", "bank", "checking", "savings", "petty"];
const INCOME_TERMS: &[&str] = &["income"];
const EXPENSE_TERMS: &[&str] = &[
    "expense",
    "rent",
    "utilities",
    "salary",
    "salaries",
    "wages",
    "insurance",
    "fees",
];

#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<KeywordRule>,
}

impl RuleEngine {
    /// Create a new empty rule engine
    pub fn new() -> Self {
        RuleEngine { rules: Vec::new() }
    }

    /// Built-in fast paths: banking/cash, then income, then expenses
    pub fn with_defaults() -> Self {
        let mut rules = Vec::new();
        let groups = [
            ("cash", CASH_TERMS, CASH_ACCOUNT_TYPE, CASH_PRIMARY, 30),
            ("income", INCOME_TERMS, INCOME_ACCOUNT_TYPE, INCOME_PRIMARY, 20),
            ("expense", EXPENSE_TERMS, EXPENSE_ACCOUNT_TYPE, EXPENSE_PRIMARY, 10),
        ];

        for (group, terms, account_type, primary, priority) in groups {
            for term in terms {
                let id = format!("{}:{}", group, term);
                rules.push(KeywordRule::new(&id, term, account_type, primary, priority));
            }
        }

        RuleEngine::from_rules(rules)
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<KeywordRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        Ok(RuleEngine::from_rules(rules))
    }

    /// Create engine from a list of rules
    pub fn from_rules(mut rules: Vec<KeywordRule>) -> Self {
        // Stable sort keeps insertion order among equal priorities
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        RuleEngine { rules }
    }

    /// Add a single rule
    pub fn add_rule(&mut self, rule: KeywordRule) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// First matching rule by priority, if any
    pub fn match_name(&self, account_name: &str) -> Option<RuleMatch> {
        let normalized = account_name.trim().to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| RuleMatch {
                rule_id: rule.id.clone(),
                account_type: rule.account_type.clone(),
                primary: rule.primary.clone(),
            })
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// TESTS
// ============================================================================
