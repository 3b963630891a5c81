// Account Categorizer - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod categories;  // Category Tree Builder
pub mod rules;       // Keyword fast paths
pub mod classifier;  // Zero-shot backends
pub mod resolver;    // Staged classification
pub mod report;      // Trial balance import + totals
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use categories::{
    CategoryRecord, CategoryTree,
    load_records, load_records_csv, load_records_json,
};
pub use rules::{
    KeywordRule, RuleEngine, RuleMatch,
};
pub use classifier::{
    ClassifierError, HttpZeroShotClassifier, LabelScore, LexicalClassifier, ZeroShotClassifier,
};
pub use resolver::{
    Classification, Level, Method, Resolution, ResolveError, Resolver, UNCATEGORIZED,
};
pub use report::{
    ClassifiedEntry, Report, Totals, TrialBalance, TrialBalanceEntry,
    build_report, load_trial_balance, parse_amount, read_trial_balance,
};
pub use config::{ClassifierConfig, ServerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
