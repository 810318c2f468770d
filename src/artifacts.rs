//! Model artifact loading and the shared inference bundle.
//!
//! The two artifacts (fitted vectorizer, fitted classifier) are produced by
//! an external training pipeline and read once at startup from fixed file
//! names inside the model directory. Any load failure is fatal: the process
//! must not begin serving traffic with a missing or malformed model.

use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::classifier::{argmax, LinearClassifier};
use crate::preprocess::normalize;
use crate::vectorizer::TfidfVectorizer;

/// Fixed artifact file name for the fitted vectorizer.
pub const VECTORIZER_FILE: &str = "tfidf_vectorizer.json";
/// Fixed artifact file name for the fitted classifier.
pub const CLASSIFIER_FILE: &str = "linear_classifier.json";

/// Version prefix for artifact digests. Bump when the artifact format changes.
const DIGEST_VERSION: &str = "v1";

/// A single classification result.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub intent: String,
    pub confidence: f64,
}

/// The loaded model artifacts, immutable after construction and shared
/// read-only across all request handlers.
#[derive(Debug)]
pub struct ModelBundle {
    vectorizer: TfidfVectorizer,
    classifier: LinearClassifier,
    digest: String,
}

impl ModelBundle {
    /// Assemble a bundle from already-deserialized artifacts, validating
    /// each artifact's shape and that the two agree on feature width.
    pub fn new(vectorizer: TfidfVectorizer, classifier: LinearClassifier) -> Result<Self> {
        vectorizer.validate()?;
        classifier.validate()?;
        ensure!(
            vectorizer.num_features() == classifier.num_features(),
            "artifact mismatch: vectorizer produces {} features but classifier expects {}",
            vectorizer.num_features(),
            classifier.num_features()
        );

        let digest = compute_digest(&vectorizer, &classifier)?;

        Ok(Self {
            vectorizer,
            classifier,
            digest,
        })
    }

    /// Load both artifacts from their fixed file names under `model_dir`.
    ///
    /// Called exactly once, before the HTTP layer accepts traffic. Errors
    /// here are startup-fatal by design.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let vectorizer_path = model_dir.join(VECTORIZER_FILE);
        let vectorizer: TfidfVectorizer = read_artifact(&vectorizer_path)?;

        let classifier_path = model_dir.join(CLASSIFIER_FILE);
        let classifier: LinearClassifier = read_artifact(&classifier_path)?;

        let bundle = Self::new(vectorizer, classifier)?;
        tracing::info!(
            model_name = %bundle.model_name(),
            vectorizer_type = %bundle.vectorizer_type(),
            num_classes = bundle.classes().len(),
            digest = %bundle.digest(),
            "model artifacts loaded"
        );
        Ok(bundle)
    }

    /// Classify raw text: normalize, vectorize, score, argmax.
    ///
    /// Infallible for a loaded bundle — every artifact shape error is
    /// rejected in [`ModelBundle::new`], so there is no per-request failure
    /// path. Empty text is classified as-is (the single-text HTTP endpoint
    /// rejects it before getting here; the batch endpoint does not).
    pub fn classify(&self, text: &str) -> Prediction {
        let normalized = normalize(text);
        let features = self.vectorizer.transform(&normalized);
        let probs = self.classifier.predict_proba(&features);

        let best = argmax(&probs);
        let prediction = Prediction {
            intent: self.classifier.classes[best].clone(),
            confidence: probs[best],
        };

        tracing::debug!(
            normalized = %normalized,
            active_features = features.len(),
            intent = %prediction.intent,
            confidence = prediction.confidence,
            "classified query"
        );

        prediction
    }

    /// Descriptive name recorded with the classifier artifact.
    pub fn model_name(&self) -> &str {
        &self.classifier.kind
    }

    /// Descriptive name recorded with the vectorizer artifact.
    pub fn vectorizer_type(&self) -> &str {
        &self.vectorizer.kind
    }

    /// Class labels in the classifier's internal order, fixed at load time.
    pub fn classes(&self) -> &[String] {
        &self.classifier.classes
    }

    /// SHA-256 digest over both serialized artifacts.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read model artifact {}", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("failed to deserialize model artifact {}", path.display()))
}

fn compute_digest(vectorizer: &TfidfVectorizer, classifier: &LinearClassifier) -> Result<String> {
    // Hash canonical re-serializations rather than raw file bytes so the
    // digest is stable across formatting differences in the artifact files.
    let mut hasher = Sha256::new();
    hasher.update(DIGEST_VERSION.as_bytes());
    hasher.update(serde_json::to_vec(&canonical_vectorizer(vectorizer))?);
    hasher.update(serde_json::to_vec(classifier)?);
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Vocabulary is a HashMap, so serialize it in sorted order for hashing.
fn canonical_vectorizer(v: &TfidfVectorizer) -> serde_json::Value {
    let mut vocab: Vec<(&String, &usize)> = v.vocabulary.iter().collect();
    vocab.sort();
    serde_json::json!({
        "kind": v.kind,
        "vocabulary": vocab,
        "idf": v.idf,
    })
}
