//! Embeddings: summary text, vector backends and similarity.

use crate::enrich::EnrichedRecord;
use anyhow::{ensure, Context, Result};
use matlab_syntax::text::truncate_chars;
use serde_json::{json, Value};
use std::time::Duration;

/// Longest summary sent to the embedding backend.
pub const SUMMARY_LIMIT: usize = 5000;

/// Vector backend.
pub trait Embedder {
    fn embed(&self, text: &str, title: Option<&str>) -> Result<Vec<f32>>;
    fn dimension(&self) -> usize;
}

/// `embedContent` endpoint of the Gemini API.
pub struct GeminiEmbedder {
    agent: ureq::Agent,
    url: String,
    model: String,
    dimension: usize,
}

impl GeminiEmbedder {
    pub fn new(api_base: &str, model: &str, api_key: &str, dimension: usize) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        GeminiEmbedder {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
            url: format!(
                "{}/v1beta/{}:embedContent?key={}",
                api_base.trim_end_matches('/'),
                model,
                api_key
            ),
            model,
            dimension,
        }
    }
}

impl Embedder for GeminiEmbedder {
    fn embed(&self, text: &str, title: Option<&str>) -> Result<Vec<f32>> {
        let mut body = json!({
            "model": self.model,
            "content": { "parts": [{ "text": text }] },
            "taskType": "RETRIEVAL_DOCUMENT",
        });
        if let Some(title) = title {
            body["title"] = json!(title);
        }

        let response: Value = self
            .agent
            .post(&self.url)
            .send_json(body)
            .context("embedContent request failed")?
            .into_json()
            .context("embedContent response is not JSON")?;

        let values = response
            .pointer("/embedding/values")
            .and_then(Value::as_array)
            .context("embedContent response carries no values")?;
        let vector: Vec<f32> = values
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect();
        ensure!(
            vector.len() == self.dimension,
            "expected {} dimensions, got {}",
            self.dimension,
            vector.len()
        );
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Offline backend: every text maps to the zero vector.
pub struct ZeroEmbedder {
    dimension: usize,
}

impl ZeroEmbedder {
    pub fn new(dimension: usize) -> Self {
        ZeroEmbedder { dimension }
    }
}

impl Embedder for ZeroEmbedder {
    fn embed(&self, _text: &str, _title: Option<&str>) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dimension])
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embed `text`, substituting the zero vector on failure.
pub fn embed_or_zero(embedder: &dyn Embedder, text: &str, title: Option<&str>) -> Vec<f32> {
    match embedder.embed(text, title) {
        Ok(vector) => vector,
        Err(e) => {
            tracing::warn!(title = title.unwrap_or(""), "embedding failed, storing zero vector: {:#}", e);
            vec![0.0; embedder.dimension()]
        }
    }
}

/// Text representation of a record for indexing.
pub fn summary_text(record: &EnrichedRecord) -> String {
    let mut parts = vec![
        format!("Function: {}", record.name),
        format!("Signature: {}", record.signature),
        format!("Description: {}", record.description),
    ];

    let params = &record.parameters;
    if !params.required.is_empty() {
        let names: Vec<&str> = params.required.iter().map(|p| p.name.as_str()).collect();
        parts.push(format!("Required parameters: {}", names.join(", ")));
    }
    if !params.optional.is_empty() {
        let info: Vec<String> = params
            .optional
            .iter()
            .map(|p| {
                let mut s = p.name.clone();
                if !p.units.is_empty() && p.units != "none" {
                    s.push_str(&format!(" ({})", p.units));
                }
                if let Some(default) = p.default.as_deref().filter(|d| !d.is_empty()) {
                    s.push_str(&format!(" default={}", default));
                }
                s
            })
            .collect();
        parts.push(format!("Optional parameters: {}", info.join(", ")));
    }
    if !record.returns.is_empty() {
        let info: Vec<String> = record
            .returns
            .iter()
            .map(|r| {
                if r.kind.is_empty() {
                    r.name.clone()
                } else {
                    format!("{} ({})", r.name, r.kind)
                }
            })
            .collect();
        parts.push(format!("Returns: {}", info.join(", ")));
    }

    truncate_chars(&parts.join(" | "), SUMMARY_LIMIT).to_string()
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Enricher;

    struct Broken;

    impl Embedder for Broken {
        fn embed(&self, _text: &str, _title: Option<&str>) -> Result<Vec<f32>> {
            anyhow::bail!("connection refused")
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn record() -> EnrichedRecord {
        let parsed = matlab_syntax::parse_source(
            "+mr/makeDelay.m",
            "function del = makeDelay(delay, tol)\n% makeDelay Create a delay event.\nif nargin < 2\n  tol = 1e-6;\nend\n",
        );
        let mut enriched = Enricher::new(None).enrich_file(&parsed).main_function.unwrap();
        enriched.parameters.optional[0].units = "seconds".to_string();
        enriched
    }

    #[test]
    fn summary_layout() {
        assert_eq!(
            summary_text(&record()),
            "Function: makeDelay | Signature: function del = makeDelay(delay, tol) | \
             Description: makeDelay Create a delay event. | Required parameters: delay | \
             Optional parameters: tol (seconds) default=1e-6 | Returns: del"
        );
    }

    #[test]
    fn summary_is_capped() {
        let mut rec = record();
        rec.description = "d".repeat(2 * SUMMARY_LIMIT);
        assert_eq!(summary_text(&rec).len(), SUMMARY_LIMIT);
    }

    #[test]
    fn failure_yields_zero_vector() {
        assert_eq!(embed_or_zero(&Broken, "text", Some("f")), vec![0.0; 4]);
    }

    #[test]
    fn cosine() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
