//! Per-topic TF-IDF query vectorizers
//!
//! Models are fitted offline on each topic's corpus and shipped as JSON
//! (`<dir>/<topic>_tfidf.json`). Only the query-side transform lives here.

use super::types::{RetrievalError, SparseVector};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

/// Topics that ship a sparse model
pub const SPARSE_TOPICS: [&str; 5] = [
    "tuition_fee",
    "graduate",
    "regulation_info",
    "undergraduate",
    "university_info",
];

/// Tokens of two or more word characters (Unicode-aware)
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid token pattern"));

#[derive(Debug, Clone, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
    #[serde(default = "default_true")]
    lowercase: bool,
    #[serde(default)]
    sublinear_tf: bool,
}

fn default_true() -> bool {
    true
}

impl TfidfVectorizer {
    pub fn new(vocabulary: HashMap<String, u32>, idf: Vec<f32>) -> Result<Self, RetrievalError> {
        let vectorizer = Self {
            vocabulary,
            idf,
            lowercase: true,
            sublinear_tf: false,
        };
        vectorizer.validate()?;
        Ok(vectorizer)
    }

    pub fn from_json(json: &str) -> Result<Self, RetrievalError> {
        let vectorizer: Self =
            serde_json::from_str(json).map_err(|e| RetrievalError::Sparse(e.to_string()))?;
        vectorizer.validate()?;
        Ok(vectorizer)
    }

    fn validate(&self) -> Result<(), RetrievalError> {
        match self.vocabulary.values().max() {
            Some(&max) if max as usize >= self.idf.len() => Err(RetrievalError::Sparse(format!(
                "vocabulary index {max} out of range for {} idf weights",
                self.idf.len()
            ))),
            _ => Ok(()),
        }
    }

    /// Transform a query into an L2-normalized TF-IDF vector.
    /// Returns `None` when no query term is in the vocabulary.
    pub fn encode(&self, text: &str) -> Option<SparseVector> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for token in TOKEN.find_iter(&text) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                *counts.entry(index).or_default() += 1;
            }
        }
        if counts.is_empty() {
            return None;
        }

        #[allow(clippy::cast_precision_loss)] // term counts are tiny
        let weighted: Vec<(u32, f32)> = counts
            .into_iter()
            .map(|(index, count)| {
                let tf = if self.sublinear_tf {
                    1.0 + (count as f32).ln()
                } else {
                    count as f32
                };
                (index, tf * self.idf[index as usize])
            })
            .collect();

        let norm = weighted.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
        if norm <= 0.0 || !norm.is_finite() {
            return None;
        }

        let (indices, values) = weighted.into_iter().map(|(i, v)| (i, v / norm)).unzip();
        Some(SparseVector { indices, values })
    }
}

/// Read-only set of sparse vectorizers keyed by retrieval tag
#[derive(Debug, Clone, Default)]
pub struct SparseVectorizerRegistry {
    models: HashMap<String, TfidfVectorizer>,
}

impl SparseVectorizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_model(mut self, topic: impl Into<String>, model: TfidfVectorizer) -> Self {
        self.models.insert(topic.into(), model);
        self
    }

    /// Load `<dir>/<topic>_tfidf.json` for each topic. Missing files are
    /// skipped with a warning and malformed files with an error log; the
    /// affected topics fall back to dense-only retrieval.
    pub fn load_dir(dir: &Path, topics: &[&str]) -> Self {
        let mut registry = Self::new();
        for topic in topics {
            let path = dir.join(format!("{topic}_tfidf.json"));
            let json = match std::fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(topic, path = %path.display(), error = %e, "No sparse model, using dense-only retrieval");
                    continue;
                }
            };
            match TfidfVectorizer::from_json(&json) {
                Ok(model) => {
                    tracing::info!(topic, terms = model.vocabulary.len(), "Loaded sparse model");
                    registry.models.insert((*topic).to_string(), model);
                }
                Err(e) => {
                    tracing::error!(topic, path = %path.display(), error = %e, "Malformed sparse model");
                }
            }
        }
        registry
    }

    #[cfg(test)]
    pub fn has_topic(&self, topic: &str) -> bool {
        self.models.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Sparse component for a query, if the topic has a model and the query
    /// shares at least one term with it
    pub fn encode(&self, topic: &str, text: &str) -> Option<SparseVector> {
        self.models.get(topic)?.encode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vocab(terms: &[(&str, u32)]) -> HashMap<String, u32> {
        terms.iter().map(|(t, i)| ((*t).to_string(), *i)).collect()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_encode_normalizes_and_sorts() {
        let model = TfidfVectorizer::new(
            vocab(&[("phí", 2), ("học", 0), ("ngành", 1)]),
            vec![1.0, 2.0, 2.0],
        )
        .unwrap();

        let v = model.encode("Học phí học kỳ").unwrap();
        assert_eq!(v.indices, vec![0, 2]);
        // tf(học)=2 * idf 1.0, tf(phí)=1 * idf 2.0 -> (2, 2) / sqrt(8)
        assert!(approx(v.values[0], 2.0 / 8f32.sqrt()));
        assert!(approx(v.values[1], 2.0 / 8f32.sqrt()));
        let norm: f32 = v.values.iter().map(|x| x * x).sum();
        assert!(approx(norm, 1.0));
    }

    #[test]
    fn test_single_char_tokens_ignored() {
        let model = TfidfVectorizer::new(vocab(&[("a", 0), ("ab", 1)]), vec![1.0, 1.0]).unwrap();
        let v = model.encode("a ab").unwrap();
        assert_eq!(v.indices, vec![1]);
    }

    #[test]
    fn test_no_known_terms_is_none() {
        let model = TfidfVectorizer::new(vocab(&[("học", 0)]), vec![1.0]).unwrap();
        assert!(model.encode("hello world").is_none());
        assert!(model.encode("").is_none());
    }

    #[test]
    fn test_sublinear_tf() {
        let json = r#"{"vocabulary": {"phí": 0, "ngành": 1}, "idf": [1.0, 1.0], "sublinear_tf": true}"#;
        let model = TfidfVectorizer::from_json(json).unwrap();
        let v = model.encode("phí phí phí ngành").unwrap();
        let expected = 1.0 + 3f32.ln();
        let norm = (expected * expected + 1.0).sqrt();
        assert!(approx(v.values[0], expected / norm));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let err = TfidfVectorizer::new(vocab(&[("học", 3)]), vec![1.0]).unwrap_err();
        assert!(matches!(err, RetrievalError::Sparse(_)));
    }

    #[test]
    fn test_load_dir_skips_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tuition_fee_tfidf.json"),
            r#"{"vocabulary": {"học": 0}, "idf": [1.5]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("graduate_tfidf.json"), "not json").unwrap();

        let registry = SparseVectorizerRegistry::load_dir(dir.path(), &SPARSE_TOPICS);
        assert_eq!(registry.len(), 1);
        assert!(registry.has_topic("tuition_fee"));
        assert!(!registry.has_topic("graduate"));
        assert!(registry.encode("tuition_fee", "học phí").is_some());
        assert!(registry.encode("regulation_info", "học phí").is_none());
    }
}
