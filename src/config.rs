// ⚙️ Configuration - Command-line flags with environment fallbacks
//
// Shared by the CLI and the API server. Every flag can also be set through a
// `CATEGORIZER_*` environment variable.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::classifier::{
    HttpZeroShotClassifier, LexicalClassifier, ZeroShotClassifier, DEFAULT_HYPOTHESIS_TEMPLATE,
};
use crate::resolver::Resolver;
use crate::rules::RuleEngine;

pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173";

/// Classifier and rule options
#[derive(Debug, Clone, Args)]
pub struct ClassifierConfig {
    /// Zero-shot inference endpoint. Without it the lexical scorer is used.
    #[arg(long, env = "CATEGORIZER_MODEL_URL")]
    pub model_url: Option<String>,

    /// Bearer token for the inference endpoint
    #[arg(long, env = "CATEGORIZER_MODEL_TOKEN", hide_env_values = true)]
    pub model_token: Option<String>,

    /// Per-request timeout for the inference endpoint
    #[arg(long, env = "CATEGORIZER_MODEL_TIMEOUT_SECS", default_value_t = 30)]
    pub model_timeout_secs: u64,

    /// NLI hypothesis template; `{}` is replaced by each candidate label
    #[arg(long, env = "CATEGORIZER_HYPOTHESIS_TEMPLATE", default_value = DEFAULT_HYPOTHESIS_TEMPLATE)]
    pub hypothesis_template: String,

    /// JSON file of keyword rules replacing the built-in fast paths
    #[arg(long, env = "CATEGORIZER_RULES")]
    pub rules: Option<PathBuf>,
}

impl ClassifierConfig {
    /// Load the classifier once; the handle is shared for the process lifetime
    pub fn build_classifier(&self) -> Result<Arc<dyn ZeroShotClassifier>> {
        match &self.model_url {
            Some(url) => {
                let mut classifier = HttpZeroShotClassifier::new(
                    url.clone(),
                    Duration::from_secs(self.model_timeout_secs),
                )
                .context("Failed to build inference client")?
                .with_hypothesis_template(self.hypothesis_template.clone());
                if let Some(token) = &self.model_token {
                    classifier = classifier.with_token(token.clone());
                }
                info!(url = %url, "using zero-shot inference endpoint");
                Ok(Arc::new(classifier))
            }
            None => {
                info!("no model URL configured, using lexical classifier");
                Ok(Arc::new(LexicalClassifier::new()))
            }
        }
    }

    pub fn build_rules(&self) -> Result<RuleEngine> {
        match &self.rules {
            Some(path) => {
                let engine = RuleEngine::from_file(path)?;
                info!(rules = engine.rule_count(), path = %path.display(), "loaded keyword rules");
                Ok(engine)
            }
            None => Ok(RuleEngine::with_defaults()),
        }
    }

    pub fn build_resolver(&self) -> Result<Resolver> {
        Ok(Resolver::with_rules(self.build_classifier()?, self.build_rules()?))
    }
}

/// API server options
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "CATEGORIZER_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Origins allowed by CORS (comma separated)
    #[arg(
        long = "allowed-origin",
        env = "CATEGORIZER_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_ORIGINS
    )]
    pub allowed_origins: Vec<String>,

    #[command(flatten)]
    pub classifier: ClassifierConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        server: ServerConfig,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["test"]).unwrap();

        assert_eq!(cli.server.addr, DEFAULT_ADDR);
        assert_eq!(cli.server.allowed_origins, vec![DEFAULT_ALLOWED_ORIGINS]);
        assert_eq!(cli.server.classifier.model_timeout_secs, 30);
        assert!(cli.server.classifier.rules.is_none());
    }

    #[test]
    fn test_origin_list_is_split() {
        let cli = TestCli::try_parse_from([
            "test",
            "--allowed-origin",
            "http://localhost:5173,http://127.0.0.1:5173",
        ])
        .unwrap();

        assert_eq!(cli.server.allowed_origins.len(), 2);
    }

    #[test]
    fn test_lexical_classifier_without_url() {
        let config = TestCli::try_parse_from(["test"]).unwrap().server.classifier;
        let classifier = config.build_classifier().unwrap();
        assert_eq!(classifier.name(), "lexical");
    }

    #[test]
    fn test_http_classifier_with_url() {
        let config = TestCli::try_parse_from(["test", "--model-url", "http://127.0.0.1:8080/zero-shot"])
            .unwrap()
            .server
            .classifier;
        let classifier = config.build_classifier().unwrap();
        assert_eq!(classifier.name(), "http");
    }
}
