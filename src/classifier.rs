//! Zero-shot classification backends.
//!
//! The resolver only sees [`ZeroShotClassifier`]: give it a piece of text and
//! a candidate label set, get the labels back ranked by confidence. Two
//! backends ship with the crate:
//!
//! - [`HttpZeroShotClassifier`] talks to a Hugging Face style inference
//!   endpoint (`{"inputs", "parameters": {"candidate_labels", ...}}`).
//! - [`LexicalClassifier`] scores labels by token overlap. It needs no model
//!   and is what the binaries fall back to when no endpoint is configured.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This account belongs to {}.";

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("no candidate labels supplied")]
    NoCandidates,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("malformed inference response: {0}")]
    Malformed(String),
}

/// A candidate label with the model's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    /// Rank `candidate_labels` for `text`, highest score first.
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassifierError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

// ============================================================================
// HTTP backend
// ============================================================================

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
}

#[derive(Serialize)]
struct InferenceParameters<'a> {
    candidate_labels: &'a [String],
    hypothesis_template: &'a str,
    multi_label: bool,
}

#[derive(Deserialize)]
struct InferenceResponse {
    labels: Vec<String>,
    scores: Vec<f32>,
}

/// Some deployments wrap the result in a single-element array.
#[derive(Deserialize)]
#[serde(untagged)]
enum InferencePayload {
    Single(InferenceResponse),
    Batch(Vec<InferenceResponse>),
}

/// Client for a remote zero-shot classification endpoint.
pub struct HttpZeroShotClassifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    hypothesis_template: String,
}

impl HttpZeroShotClassifier {
    /// Create a client for `url` (the full model endpoint, e.g.
    /// `https://api-inference.huggingface.co/models/facebook/bart-large-mnli`).
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            token: None,
            hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_hypothesis_template(mut self, template: impl Into<String>) -> Self {
        self.hypothesis_template = template.into();
        self
    }
}

#[async_trait]
impl ZeroShotClassifier for HttpZeroShotClassifier {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        if candidate_labels.is_empty() {
            return Err(ClassifierError::NoCandidates);
        }

        let body = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                candidate_labels,
                hypothesis_template: &self.hypothesis_template,
                multi_label: false,
            },
        };

        debug!(url = %self.url, labels = candidate_labels.len(), "zero-shot request");
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifierError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let payload: InferencePayload = resp.json().await?;
        rank_response(payload)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn rank_response(payload: InferencePayload) -> Result<Vec<LabelScore>, ClassifierError> {
    let response = match payload {
        InferencePayload::Single(r) => r,
        InferencePayload::Batch(mut batch) => {
            if batch.len() != 1 {
                return Err(ClassifierError::Malformed(format!(
                    "expected one result, got {}",
                    batch.len()
                )));
            }
            batch.remove(0)
        }
    };

    if response.labels.len() != response.scores.len() {
        return Err(ClassifierError::Malformed(format!(
            "{} labels but {} scores",
            response.labels.len(),
            response.scores.len()
        )));
    }

    let mut ranked: Vec<LabelScore> = response
        .labels
        .into_iter()
        .zip(response.scores)
        .map(|(label, score)| LabelScore { label, score })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(ranked)
}

// ============================================================================
// Lexical backend
// ============================================================================

/// Token-overlap scorer. Deterministic; ties keep candidate order.
#[derive(Debug, Clone, Default)]
pub struct LexicalClassifier;

impl LexicalClassifier {
    pub fn new() -> Self {
        LexicalClassifier
    }

    fn tokens(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
            .map(|t| t.to_lowercase())
            .collect()
    }

    /// Jaccard similarity between the token sets of `text` and `label`
    pub fn score(text: &str, label: &str) -> f32 {
        let a = Self::tokens(text);
        let b = Self::tokens(label);
        let union = a.union(&b).count();
        if union == 0 {
            return 0.0;
        }
        a.intersection(&b).count() as f32 / union as f32
    }
}

#[async_trait]
impl ZeroShotClassifier for LexicalClassifier {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        if candidate_labels.is_empty() {
            return Err(ClassifierError::NoCandidates);
        }

        let mut ranked: Vec<LabelScore> = candidate_labels
            .iter()
            .map(|label| LabelScore {
                label: label.clone(),
                score: Self::score(text, label),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn request_serializes_hf_shape() {
        let candidates = labels(&["Asset", "Equity"]);
        let req = InferenceRequest {
            inputs: "Petty cash",
            parameters: InferenceParameters {
                candidate_labels: &candidates,
                hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE,
                multi_label: false,
            },
        };
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["inputs"], "Petty cash");
        assert_eq!(value["parameters"]["candidate_labels"][1], "Equity");
        assert_eq!(value["parameters"]["multi_label"], false);
    }

    #[test]
    fn response_is_reranked_by_score() {
        let payload: InferencePayload = serde_json::from_str(
            r#"{"sequence":"x","labels":["Equity","Asset"],"scores":[0.2,0.8]}"#,
        )
        .unwrap();
        let ranked = rank_response(payload).unwrap();

        assert_eq!(ranked[0].label, "Asset");
        assert_eq!(ranked[1].label, "Equity");
    }

    #[test]
    fn batch_response_with_one_entry_is_accepted() {
        let payload: InferencePayload =
            serde_json::from_str(r#"[{"labels":["Asset"],"scores":[1.0]}]"#).unwrap();
        assert_eq!(rank_response(payload).unwrap()[0].label, "Asset");
    }

    #[test]
    fn mismatched_lengths_are_malformed() {
        let payload: InferencePayload =
            serde_json::from_str(r#"{"labels":["Asset","Equity"],"scores":[1.0]}"#).unwrap();
        assert!(matches!(
            rank_response(payload),
            Err(ClassifierError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn lexical_prefers_overlapping_label() {
        let ranked = LexicalClassifier::new()
            .classify(
                "Trade receivables - customers",
                &labels(&["Inventory", "Trade Receivables", "Prepayments"]),
            )
            .await
            .unwrap();

        assert_eq!(ranked[0].label, "Trade Receivables");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[tokio::test]
    async fn lexical_ties_keep_candidate_order() {
        let ranked = LexicalClassifier::new()
            .classify("Goodwill", &labels(&["Liability", "Equity"]))
            .await
            .unwrap();

        assert_eq!(ranked[0].label, "Liability");
        assert_eq!(ranked[0].score, 0.0);
    }

    #[tokio::test]
    async fn empty_candidates_is_an_error() {
        let result = LexicalClassifier::new().classify("Cash", &[]).await;
        assert!(matches!(result, Err(ClassifierError::NoCandidates)));
    }
}
