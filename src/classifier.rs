//! Pretrained linear classifier loaded from a JSON artifact.
//!
//! Holds the fitted weight matrix, intercepts, and ordered label set. The
//! probability mapping mirrors the reference model: a logistic sigmoid for
//! binary models (one weight row) and a max-subtracted softmax otherwise.

use eyre::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::vectorizer::SparseVector;

/// A fitted linear classifier.
///
/// `kind` is the descriptive artifact name recorded at training time
/// (e.g. "LogisticRegression"); `classes` is the internal label order fixed
/// when the model was fitted, which all probability vectors follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub kind: String,
    pub classes: Vec<String>,
    /// Weight rows: one row for binary models, one per class otherwise.
    pub coefficients: Vec<Vec<f64>>,
    /// Bias term per weight row.
    pub intercepts: Vec<f64>,
}

impl LinearClassifier {
    /// Validate the fitted shape. Called once at load time so inference
    /// never has to handle a malformed artifact.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.classes.len() >= 2,
            "classifier artifact malformed: needs at least 2 classes, has {}",
            self.classes.len()
        );
        let expected_rows = if self.classes.len() == 2 { 1 } else { self.classes.len() };
        ensure!(
            self.coefficients.len() == expected_rows,
            "classifier artifact malformed: {} classes imply {} weight rows, found {}",
            self.classes.len(),
            expected_rows,
            self.coefficients.len()
        );
        ensure!(
            self.intercepts.len() == self.coefficients.len(),
            "classifier artifact malformed: {} weight rows but {} intercepts",
            self.coefficients.len(),
            self.intercepts.len()
        );
        let width = self.num_features();
        for (i, row) in self.coefficients.iter().enumerate() {
            ensure!(
                row.len() == width,
                "classifier artifact malformed: weight row {} has {} columns, expected {}",
                i,
                row.len(),
                width
            );
        }
        Ok(())
    }

    /// Number of input feature columns the fitted weights expect.
    pub fn num_features(&self) -> usize {
        self.coefficients.first().map(Vec::len).unwrap_or(0)
    }

    /// Probability distribution over `classes` for one feature vector.
    ///
    /// The result has `classes.len()` entries and sums to 1 up to
    /// floating-point tolerance.
    pub fn predict_proba(&self, features: &SparseVector) -> Vec<f64> {
        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, &bias)| {
                features
                    .iter()
                    .map(|&(idx, value)| row[idx] * value)
                    .sum::<f64>()
                    + bias
            })
            .collect();

        if self.classes.len() == 2 {
            // Binary model: single decision score for the second class.
            let p = sigmoid(scores[0]);
            vec![1.0 - p, p]
        } else {
            softmax(&scores)
        }
    }
}

/// Index of the maximum probability. Exact ties resolve to the lowest index
/// (first occurrence), matching the reference argmax convention.
pub fn argmax(probs: &[f64]) -> usize {
    let mut best = 0;
    for (i, &p) in probs.iter().enumerate().skip(1) {
        if p > probs[best] {
            best = i;
        }
    }
    best
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max_val = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp_vals: Vec<f64> = scores.iter().map(|&z| (z - max_val).exp()).collect();
    let total: f64 = exp_vals.iter().sum();
    exp_vals.into_iter().map(|v| v / total).collect()
}
