//! intentd — text intent classification served over HTTP.
//!
//! A pretrained TF-IDF vectorizer and linear classifier are loaded once at
//! startup and shared read-only across all request handlers. Raw text is
//! normalized, vectorized, and scored; the highest-confidence class label is
//! returned as the intent.
//!
//! Uses structured logging via [`tracing`]. Set the `RUST_LOG` environment
//! variable to control log verbosity (e.g., `RUST_LOG=intentd=debug`).

pub mod artifacts;
pub mod classifier;
pub mod preprocess;
pub mod server;
pub mod vectorizer;

pub use artifacts::{ModelBundle, Prediction};
