//! Fitted TF-IDF vectorizer loaded from a JSON artifact.
//!
//! The vocabulary and per-term IDF weights are produced by an external
//! training pipeline; this module only reproduces the transform step the
//! fitted vectorizer applies at serving time.

use std::collections::HashMap;

use eyre::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Sparse feature vector: (column index, weight) pairs sorted by index.
pub type SparseVector = Vec<(usize, f64)>;

/// A fitted TF-IDF vectorizer.
///
/// `kind` is the descriptive artifact name recorded at training time
/// (e.g. "TfidfVectorizer") and is what the model-info endpoint reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    pub kind: String,
    /// Token -> column index. Indices are dense in `0..idf.len()`.
    pub vocabulary: HashMap<String, usize>,
    /// Inverse-document-frequency weight per column.
    pub idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Validate the fitted shape. Called once at load time so `transform`
    /// never has to handle a malformed artifact.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.vocabulary.len() == self.idf.len(),
            "vectorizer artifact malformed: vocabulary has {} terms but idf has {} weights",
            self.vocabulary.len(),
            self.idf.len()
        );
        for (token, &idx) in &self.vocabulary {
            ensure!(
                idx < self.idf.len(),
                "vectorizer artifact malformed: token {:?} maps to column {} (only {} columns)",
                token,
                idx,
                self.idf.len()
            );
        }
        Ok(())
    }

    /// Number of feature columns.
    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    /// Transform normalized text into an L2-normalized TF-IDF vector.
    ///
    /// Tokens are whitespace-separated runs of at least two characters
    /// (single-character tokens are dropped, matching the fitted tokenizer).
    /// Out-of-vocabulary tokens contribute nothing; empty or fully
    /// out-of-vocabulary input yields the empty vector.
    pub fn transform(&self, normalized: &str) -> SparseVector {
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for token in normalized.split_whitespace() {
            if token.chars().count() < 2 {
                continue;
            }
            if let Some(&idx) = self.vocabulary.get(token) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }

        let mut vec: SparseVector = counts
            .into_iter()
            .map(|(idx, count)| (idx, count as f64 * self.idf[idx]))
            .collect();
        vec.sort_unstable_by_key(|&(idx, _)| idx);

        let norm: f64 = vec.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for entry in &mut vec {
                entry.1 /= norm;
            }
        }

        vec
    }
}
