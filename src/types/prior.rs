//! Per-volume belief state for the content score distribution
//!
//! Normal-Inverse-Gamma conjugate prior over an unknown mean and variance.

use serde::{Deserialize, Serialize};

/// Bayesian belief about a volume's "normal" content score distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumePrior {
    /// Volume this belief belongs to (empty for the global default)
    #[serde(default)]
    pub volume_id: String,
    /// Posterior mean of the score distribution
    pub mean: f64,
    /// Pseudo-count of observations backing the mean
    pub support: f64,
    /// Inverse-gamma shape
    pub alpha: f64,
    /// Inverse-gamma scale
    pub beta: f64,
}

impl VolumePrior {
    /// Create a prior from its four parameters
    pub fn new(mean: f64, support: f64, alpha: f64, beta: f64) -> Self {
        Self {
            volume_id: String::new(),
            mean,
            support,
            alpha,
            beta,
        }
    }

    /// Same belief, attributed to a volume
    pub fn for_volume(mut self, volume_id: impl Into<String>) -> Self {
        self.volume_id = volume_id.into();
        self
    }

    /// A standard deviation exists only for shape > 1
    pub fn is_proper(&self) -> bool {
        self.alpha > 1.0
    }
}

impl Default for VolumePrior {
    fn default() -> Self {
        Self::new(
            crate::PRIOR_MEAN,
            crate::PRIOR_SUPPORT,
            crate::PRIOR_ALPHA,
            crate::PRIOR_BETA,
        )
    }
}
