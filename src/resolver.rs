// 🧭 Classification Resolver - Staged narrowing down the taxonomy
//
// Keyword fast path first. Whatever levels are still open get resolved by
// the zero-shot classifier, one level at a time, where each level only
// offers the children of the label chosen one level up.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::categories::{CategoryRecord, CategoryTree};
use crate::classifier::{ClassifierError, ZeroShotClassifier};
use crate::rules::RuleEngine;

pub const UNCATEGORIZED: &str = "Uncategorized";

// ============================================================================
// RESULT TYPES
// ============================================================================

/// The four-level classification returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    #[serde(rename = "accountType")]
    pub account_type: String,
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
}

impl Classification {
    pub fn uncategorized() -> Self {
        Classification {
            account_type: UNCATEGORIZED.to_string(),
            primary: UNCATEGORIZED.to_string(),
            secondary: UNCATEGORIZED.to_string(),
            tertiary: UNCATEGORIZED.to_string(),
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self == &Self::uncategorized()
    }
}

/// How a classification was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Method {
    /// Fast path: a keyword rule fixed accountType and primary
    Keyword { rule_id: String },
    /// Every level came from the classifier
    Model,
    /// Resolution failed and was masked as Uncategorized
    Fallback { error: String },
    /// Blank account name; nothing was asked of the rules or the model
    EmptyName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    #[serde(flatten)]
    pub classification: Classification,
    pub method: Method,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("classifier failed at {level} level: {source}")]
    Classifier {
        level: Level,
        #[source]
        source: ClassifierError,
    },
    #[error("classifier returned no labels at {0} level")]
    EmptyRanking(Level),
    #[error("classifier chose '{label}' which is not a {level} candidate")]
    UnknownLabel { level: Level, label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    AccountType,
    Primary,
    Secondary,
    Tertiary,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::AccountType => "account type",
            Level::Primary => "primary",
            Level::Secondary => "secondary",
            Level::Tertiary => "tertiary",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PROMPTS
// ============================================================================

/// Text sent to the classifier at one level.
///
/// `parent` is the label chosen one level up (None at the account type level).
pub fn stage_prompt(account_name: &str, level: Level, parent: Option<&str>) -> String {
    match (level, parent) {
        (Level::AccountType, _) | (_, None) => {
            format!("Accounting ledger account named '{}'", account_name)
        }
        (_, Some(parent)) => format!(
            "Accounting ledger account named '{}', classified under {}, {} category",
            account_name,
            parent,
            level.as_str()
        ),
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct Resolver {
    classifier: Arc<dyn ZeroShotClassifier>,
    rules: RuleEngine,
}

impl Resolver {
    pub fn new(classifier: Arc<dyn ZeroShotClassifier>) -> Self {
        Self::with_rules(classifier, RuleEngine::with_defaults())
    }

    pub fn with_rules(classifier: Arc<dyn ZeroShotClassifier>, rules: RuleEngine) -> Self {
        Resolver { classifier, rules }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify an account name. Never fails: errors are logged and become
    /// the all-Uncategorized result.
    pub async fn resolve(&self, account_name: &str, records: &[CategoryRecord]) -> Classification {
        self.resolve_detailed(account_name, records).await.classification
    }

    /// Same as [`Resolver::resolve`] but reports how the answer was reached.
    pub async fn resolve_detailed(&self, account_name: &str, records: &[CategoryRecord]) -> Resolution {
        match self.try_resolve(account_name, records).await {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(account = %account_name, error = %e, "classification failed");
                Resolution {
                    classification: Classification::uncategorized(),
                    method: Method::Fallback {
                        error: e.to_string(),
                    },
                }
            }
        }
    }

    /// Classify without masking errors.
    pub async fn try_resolve(
        &self,
        account_name: &str,
        records: &[CategoryRecord],
    ) -> Result<Resolution, ResolveError> {
        let name = account_name.trim();
        if name.is_empty() {
            return Ok(Resolution {
                classification: Classification::uncategorized(),
                method: Method::EmptyName,
            });
        }

        let tree = CategoryTree::build(records);
        debug!(account = %name, leaves = tree.leaf_count(), "built category tree");

        let mut result = Classification::uncategorized();

        let method = match self.rules.match_name(name) {
            Some(rule) => {
                info!(account = %name, rule = %rule.rule_id, "keyword fast path");
                result.account_type = rule.account_type;
                result.primary = rule.primary;
                Method::Keyword {
                    rule_id: rule.rule_id,
                }
            }
            None => {
                let candidates = tree.account_types();
                match self.choose(name, Level::AccountType, None, &candidates).await? {
                    Some(account_type) => result.account_type = account_type,
                    None => return Ok(Resolution { classification: result, method: Method::Model }),
                }

                let candidates = tree.primaries(&result.account_type);
                match self
                    .choose(name, Level::Primary, Some(result.account_type.as_str()), &candidates)
                    .await?
                {
                    Some(primary) => result.primary = primary,
                    None => return Ok(Resolution { classification: result, method: Method::Model }),
                }
                Method::Model
            }
        };

        let candidates = tree.secondaries(&result.account_type, &result.primary);
        if let Some(secondary) = self
            .choose(name, Level::Secondary, Some(result.primary.as_str()), &candidates)
            .await?
        {
            result.secondary = secondary;

            let candidates =
                tree.tertiaries(&result.account_type, &result.primary, &result.secondary);
            if let Some(tertiary) = self
                .choose(name, Level::Tertiary, Some(result.secondary.as_str()), &candidates)
                .await?
            {
                result.tertiary = tertiary;
            }
        }

        info!(
            account = %name,
            account_type = %result.account_type,
            primary = %result.primary,
            secondary = %result.secondary,
            tertiary = %result.tertiary,
            "classified"
        );

        Ok(Resolution {
            classification: result,
            method,
        })
    }

    /// Run one stage. Returns None without calling the classifier when the
    /// level has no candidates.
    async fn choose(
        &self,
        account_name: &str,
        level: Level,
        parent: Option<&str>,
        candidates: &[String],
    ) -> Result<Option<String>, ResolveError> {
        if candidates.is_empty() {
            debug!(account = %account_name, %level, "no candidates, leaving uncategorized");
            return Ok(None);
        }

        let prompt = stage_prompt(account_name, level, parent);
        let ranked = self
            .classifier
            .classify(&prompt, candidates)
            .await
            .map_err(|source| ResolveError::Classifier { level, source })?;

        let top = ranked
            .into_iter()
            .next()
            .ok_or(ResolveError::EmptyRanking(level))?;

        if !candidates.contains(&top.label) {
            return Err(ResolveError::UnknownLabel {
                level,
                label: top.label,
            });
        }

        debug!(account = %account_name, %level, label = %top.label, score = top.score, "stage chosen");
        Ok(Some(top.label))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LabelScore, LexicalClassifier};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Picks the last candidate and records what it was offered
    #[derive(Default)]
    struct RecordingClassifier {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl ZeroShotClassifier for RecordingClassifier {
        async fn classify(
            &self,
            _text: &str,
            candidate_labels: &[String],
        ) -> Result<Vec<LabelScore>, ClassifierError> {
            self.calls.lock().unwrap().push(candidate_labels.to_vec());
            Ok(candidate_labels
                .iter()
                .rev()
                .enumerate()
                .map(|(i, label)| LabelScore {
                    label: label.clone(),
                    score: 1.0 / (i as f32 + 1.0),
                })
                .collect())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ZeroShotClassifier for FailingClassifier {
        async fn classify(&self, _: &str, _: &[String]) -> Result<Vec<LabelScore>, ClassifierError> {
            Err(ClassifierError::Server {
                status: 503,
                body: "model loading".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct OffListClassifier;

    #[async_trait]
    impl ZeroShotClassifier for OffListClassifier {
        async fn classify(&self, _: &str, _: &[String]) -> Result<Vec<LabelScore>, ClassifierError> {
            Ok(vec![LabelScore {
                label: "Something Else".to_string(),
                score: 0.9,
            }])
        }

        fn name(&self) -> &str {
            "off-list"
        }
    }

    fn chart() -> Vec<CategoryRecord> {
        vec![
            CategoryRecord::new("Asset", "Cash and Cash Equivalents", "Bank Accounts", "Checking"),
            CategoryRecord::new("Asset", "Cash and Cash Equivalents", "Bank Accounts", "Savings"),
            CategoryRecord::new("Asset", "Cash and Cash Equivalents", "Petty Cash", "Office Float"),
            CategoryRecord::new("Asset", "Receivables", "Trade Receivables", "Customers"),
            CategoryRecord::new("Asset", "Receivables", "Other Receivables", "Staff Advances"),
            CategoryRecord::new("Equity", "Owner's Equity", "Capital", "Paid-in Capital"),
            CategoryRecord::new("Equity", "Owner's Equity", "Retained Earnings", "Prior Years"),
        ]
    }

    #[tokio::test]
    async fn test_cash_fast_path_ignores_categories() {
        let resolver = Resolver::new(Arc::new(LexicalClassifier::new()));

        let result = resolver.resolve("Petty CASH box", &[]).await;
        assert_eq!(result.account_type, "Asset");
        assert_eq!(result.primary, "Cash and Cash Equivalents");
        assert_eq!(result.secondary, UNCATEGORIZED);
        assert_eq!(result.tertiary, UNCATEGORIZED);
    }

    #[tokio::test]
    async fn test_fast_path_narrows_secondary_and_tertiary() {
        let classifier = Arc::new(RecordingClassifier::default());
        let resolver = Resolver::new(classifier.clone());

        let resolution = resolver.try_resolve("Cash at bank", &chart()).await.unwrap();
        let result = resolution.classification;

        assert_eq!(resolution.method, Method::Keyword { rule_id: "cash:cash".to_string() });
        assert_eq!(result.account_type, "Asset");
        assert_eq!(result.primary, "Cash and Cash Equivalents");
        assert_eq!(result.secondary, "Petty Cash");
        assert_eq!(result.tertiary, "Office Float");

        let calls = classifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec!["Bank Accounts", "Petty Cash"]);
        assert_eq!(calls[1], vec!["Office Float"]);
    }

    #[tokio::test]
    async fn test_income_and_rent_fast_paths() {
        let resolver = Resolver::new(Arc::new(LexicalClassifier::new()));

        let income = resolver.resolve("Dividend income", &chart()).await;
        assert_eq!(income.account_type, "Revenue/income");
        assert_eq!(income.primary, "Other Income");

        let rent = resolver.resolve("Warehouse RENT", &chart()).await;
        assert_eq!(rent.account_type, "Cost/Expense");
        assert_eq!(rent.primary, "Operational Expenses");
    }

    #[tokio::test]
    async fn test_staged_narrowing_offers_only_children() {
        let classifier = Arc::new(RecordingClassifier::default());
        let resolver = Resolver::new(classifier.clone());

        let resolution = resolver.try_resolve("Goodwill", &chart()).await.unwrap();
        let result = resolution.classification;

        assert_eq!(resolution.method, Method::Model);
        assert_eq!(result.account_type, "Equity");
        assert_eq!(result.primary, "Owner's Equity");
        assert_eq!(result.secondary, "Retained Earnings");
        assert_eq!(result.tertiary, "Prior Years");

        let calls = classifier.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                vec!["Asset".to_string(), "Equity".to_string()],
                vec!["Owner's Equity".to_string()],
                vec!["Capital".to_string(), "Retained Earnings".to_string()],
                vec!["Prior Years".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_lexical_backend_end_to_end() {
        let resolver = Resolver::new(Arc::new(LexicalClassifier::new()));

        let result = resolver.resolve("Trade receivables - customers", &chart()).await;
        assert_eq!(result.account_type, "Asset");
        assert_eq!(result.primary, "Receivables");
        assert_eq!(result.secondary, "Trade Receivables");
        assert_eq!(result.tertiary, "Customers");
    }

    #[tokio::test]
    async fn test_classifier_failure_is_all_uncategorized() {
        let resolver = Resolver::new(Arc::new(FailingClassifier));

        // fast path still fails at the secondary stage
        let result = resolver.resolve("Cash", &chart()).await;
        assert_eq!(result, Classification::uncategorized());

        let result = resolver.resolve("Goodwill", &chart()).await;
        assert_eq!(result, Classification::uncategorized());
    }

    #[tokio::test]
    async fn test_failure_is_reported_in_detailed_resolution() {
        let resolver = Resolver::new(Arc::new(FailingClassifier));

        let resolution = resolver.resolve_detailed("Goodwill", &chart()).await;
        assert!(resolution.classification.is_uncategorized());
        match resolution.method {
            Method::Fallback { error } => assert!(error.contains("account type")),
            other => panic!("expected fallback, got {:?}", other),
        }

        let err = resolver.try_resolve("Goodwill", &chart()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Classifier { level: Level::AccountType, .. }));
    }

    #[tokio::test]
    async fn test_label_outside_candidates_is_rejected() {
        let resolver = Resolver::new(Arc::new(OffListClassifier));

        let err = resolver.try_resolve("Goodwill", &chart()).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownLabel { .. }));
        assert!(resolver.resolve("Goodwill", &chart()).await.is_uncategorized());
    }

    #[tokio::test]
    async fn test_empty_tree_without_fast_path_skips_classifier() {
        let resolver = Resolver::new(Arc::new(FailingClassifier));

        let resolution = resolver.try_resolve("Goodwill", &[]).await.unwrap();
        assert!(resolution.classification.is_uncategorized());
    }

    #[tokio::test]
    async fn test_blank_name_is_uncategorized() {
        let resolver = Resolver::new(Arc::new(FailingClassifier));
        assert!(resolver.resolve("   ", &chart()).await.is_uncategorized());

        let resolution = resolver.resolve_detailed("", &chart()).await;
        assert_eq!(resolution.method, Method::EmptyName);
        assert_eq!(
            serde_json::to_value(&resolution).unwrap()["method"]["kind"],
            "empty_name"
        );
    }

    #[test]
    fn test_stage_prompt_mentions_parent() {
        let prompt = stage_prompt("Office chairs", Level::Secondary, Some("Fixed Assets"));
        assert!(prompt.contains("Office chairs"));
        assert!(prompt.contains("Fixed Assets"));
        assert!(prompt.contains("secondary"));

        assert!(!stage_prompt("Office chairs", Level::AccountType, None).contains("under"));
    }

    #[test]
    fn test_classification_json_field_names() {
        let value = serde_json::to_value(Classification::uncategorized()).unwrap();
        assert_eq!(value["accountType"], UNCATEGORIZED);
        assert_eq!(value["tertiary"], UNCATEGORIZED);
    }
}
