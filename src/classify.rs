//! Contract for the downstream classifier consuming canonical-frame output.
//!
//! The alignment/warp core hands a fixed-length numeric feature vector (see
//! [`crate::features::to_feature_vector`]) to an external learner. Only the
//! seam is typed here; the learner's internals live elsewhere.

use crate::error::{Error, Result};

/// A trainable scorer over fixed-length feature vectors.
pub trait Classifier {
    /// Fit the classifier to a labeled corpus. Every feature vector must
    /// have the same length.
    fn train(&mut self, features: &[Vec<f32>], labels: &[f32]) -> Result<()>;

    /// Score a single feature vector.
    fn predict(&self, features: &[f32]) -> Result<f32>;

    /// Confidence variant; by default the raw score.
    fn predict_confidence(&self, features: &[f32]) -> Result<f32> {
        self.predict(features)
    }
}

/// Verify that every vector in a corpus has the expected length.
pub fn check_dimensions(features: &[Vec<f32>], expected: usize) -> Result<()> {
    for row in features {
        if row.len() != expected {
            return Err(Error::FeatureDimensionMismatch {
                expected,
                found: row.len(),
            });
        }
    }
    Ok(())
}
