//! PII entity classification over extracted text.

mod patterns;

pub use patterns::PatternClassifier;

use crate::error::Result;
use crate::models::Entity;

/// Classifies text into PII entities.
///
/// Implementations are pure functions of their input: no network or
/// filesystem access. Empty text yields an empty list. Every returned entity
/// has a score in [0, 1] and at least the implementation's configured
/// minimum confidence.
pub trait EntityClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Vec<Entity>>;
}
