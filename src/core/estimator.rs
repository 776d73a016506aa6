//! Threshold estimator: online per-volume calibration of the content threshold
//!
//! Content scores of a volume are modelled as Normal with unknown mean and
//! variance under a Normal-Inverse-Gamma prior. Each batch of observed scores
//! is folded in with the closed-form conjugate update; the pass threshold is
//! a low quantile of the resulting Normal.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::collaborators::PriorStore;
use crate::types::VolumePrior;
use crate::{Error, Result};

/// Conjugate posterior after observing `observations`
pub fn update(prior: &VolumePrior, observations: &[f64]) -> VolumePrior {
    if observations.is_empty() {
        return prior.clone();
    }

    let n = observations.len() as f64;
    let batch_mean = observations.iter().sum::<f64>() / n;
    let squared_dev: f64 = observations.iter().map(|x| (x - batch_mean).powi(2)).sum();
    let support = prior.support + n;
    let shift = batch_mean - prior.mean;

    VolumePrior {
        volume_id: prior.volume_id.clone(),
        mean: (prior.support * prior.mean + n * batch_mean) / support,
        support,
        alpha: prior.alpha + n / 2.0,
        beta: prior.beta + 0.5 * squared_dev + (prior.support * n / support) * shift * shift / 2.0,
    }
}

/// Expected standard deviation under the prior; needs shape > 1
pub fn sigma(prior: &VolumePrior) -> Result<f64> {
    if !prior.is_proper() {
        return Err(Error::Precondition(format!(
            "sigma undefined for alpha = {} (must exceed 1)",
            prior.alpha
        )));
    }
    Ok((prior.beta / (prior.alpha - 1.0)).sqrt())
}

/// Score below which a summary counts as failing for this prior
pub fn threshold(prior: &VolumePrior, target_percentile: f64) -> Result<f64> {
    if !(target_percentile > 0.0 && target_percentile < 1.0) {
        return Err(Error::Precondition(format!(
            "target percentile {} outside (0, 1)",
            target_percentile
        )));
    }
    Ok(prior.mean + sigma(prior)? * normal_quantile(target_percentile))
}

/// Standard normal quantile, Φ⁻¹(p)
///
/// Acklam's rational approximation: a central polynomial ratio for
/// `0.02425 <= p <= 0.97575` and a tail ratio in `sqrt(-2 ln p)` outside it.
/// Relative error stays below 1.15e-9.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01, 2.209460984245205e+02, -2.759285104469687e+02,
        1.383577518672690e+02, -3.066479806614716e+01, 2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01, 1.615858368580409e+02, -1.556989798598866e+02,
        6.680131188771972e+01, -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03, -3.223964580411365e-01, -2.400758277161838e+00,
        -2.549732539343734e+00, 4.374664141464968e+00, 2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03, 3.224671290700398e-01, 2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    // Lower tail; the upper tail mirrors it
    let tail = |p: f64| {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail(p)
    } else if p > 1.0 - P_LOW {
        -tail(1.0 - p)
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

/// Per-volume threshold estimator over a prior store
///
/// Read-modify-write of a volume's prior is serialized per volume key, so
/// concurrent observations never lose updates.
pub struct ThresholdEstimator {
    store: Arc<dyn PriorStore>,
    default_prior: VolumePrior,
    target_percentile: f64,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThresholdEstimator {
    pub fn new(store: Arc<dyn PriorStore>, default_prior: VolumePrior, target_percentile: f64) -> Self {
        Self {
            store,
            default_prior,
            target_percentile,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn target_percentile(&self) -> f64 {
        self.target_percentile
    }

    /// Volume override, or the global default when none exists
    pub async fn prior_for(&self, volume_id: &str) -> Result<VolumePrior> {
        match self.store.get_prior(volume_id).await? {
            Some(prior) => Ok(prior),
            None => Ok(self.default_prior.clone().for_volume(volume_id)),
        }
    }

    /// Current pass threshold for a volume
    pub async fn threshold_for(&self, volume_id: &str) -> Result<f64> {
        let prior = self.prior_for(volume_id).await?;
        threshold(&prior, self.target_percentile)
    }

    /// Fold observed scores into the volume's prior
    pub async fn observe(&self, volume_id: &str, observations: &[f64]) -> Result<VolumePrior> {
        let lock = self.key_lock(volume_id).await;
        let _guard = lock.lock().await;

        let prior = self.prior_for(volume_id).await?;
        let posterior = update(&prior, observations);
        self.store.put_prior(volume_id, posterior.clone()).await?;

        debug!(
            volume_id,
            observed = observations.len(),
            mean = posterior.mean,
            support = posterior.support,
            "prior updated"
        );
        Ok(posterior)
    }

    /// Overwrite the volume's prior with the global default
    pub async fn reset(&self, volume_id: &str) -> Result<VolumePrior> {
        let lock = self.key_lock(volume_id).await;
        let _guard = lock.lock().await;

        let prior = self.default_prior.clone().for_volume(volume_id);
        self.store.put_prior(volume_id, prior.clone()).await?;
        info!(volume_id, "prior reset to global default");
        Ok(prior)
    }

    /// Drop the volume override; lookups fall back to the global default
    pub async fn delete(&self, volume_id: &str) -> Result<()> {
        let lock = self.key_lock(volume_id).await;
        let _guard = lock.lock().await;

        self.store.delete_prior(volume_id).await?;
        info!(volume_id, "prior override deleted");
        Ok(())
    }

    async fn key_lock(&self, volume_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(volume_id.to_string()).or_default().clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::local::MemoryPriorStore;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_update_scenario() {
        let prior = VolumePrior::new(0.2, 10.0, 2.0, 1.0);
        let post = update(&prior, &[0.5, 0.6]);
        assert!(close(post.support, 12.0));
        assert!(close(post.alpha, 3.0));
        // (10 * 0.2 + 2 * 0.55) / 12
        assert!(close(post.mean, 3.1 / 12.0));
        // 1 + 0.5 * 0.005 + (20 / 12) * 0.35^2 / 2
        assert!(close(post.beta, 1.0 + 0.0025 + (20.0 / 12.0) * 0.1225 / 2.0));
    }

    #[test]
    fn test_update_is_associative() {
        let prior = VolumePrior::new(0.2, 10.0, 2.0, 1.0);
        let all = [0.1, -0.4, 1.3, 0.8, 0.25, 2.0, -1.0, -0.5, 0.0, 3.5];
        let single = update(&prior, &all);
        for split in 0..=all.len() {
            let (left, right) = all.split_at(split);
            let stepwise = update(&update(&prior, left), right);
            assert!(close(stepwise.mean, single.mean));
            assert!(close(stepwise.alpha, single.alpha));
            assert!(close(stepwise.beta, single.beta));
            assert!(close(stepwise.support, single.support));
        }
    }

    #[test]
    fn test_empty_batch_is_identity() {
        let prior = VolumePrior::new(0.2, 10.0, 2.0, 1.0);
        assert_eq!(update(&prior, &[]), prior);
    }

    #[test]
    fn test_sigma_requires_proper_prior() {
        let improper = VolumePrior::new(0.0, 1.0, 1.0, 1.0);
        assert!(matches!(sigma(&improper), Err(Error::Precondition(_))));
        let proper = VolumePrior::new(0.0, 1.0, 3.0, 8.0);
        assert!(close(sigma(&proper).unwrap(), 2.0));
    }

    #[test]
    fn test_threshold_sits_below_mean_for_low_percentile() {
        let prior = VolumePrior::new(0.2, 10.0, 2.0, 1.0);
        let t = threshold(&prior, 0.20).unwrap();
        // mean + 1.0 * z(0.2)
        assert!((t - (0.2 - 0.8416212335729143)).abs() < 1e-8, "got {}", t);
        assert!(threshold(&prior, 1.0).is_err());
    }

    #[test]
    fn test_normal_quantile() {
        assert!(normal_quantile(0.5).abs() < 1e-12);
        // Central region, both tails, and the region boundaries
        for (p, z) in [
            (0.2, -0.8416212335729143),
            (0.975, 1.959963984540054),
            (0.025, -1.959963984540054),
            (0.01, -2.3263478740408408),
            (0.999, 3.090232306167813),
            (1e-6, -4.753424308822899),
        ] {
            let got = normal_quantile(p);
            assert!((got - z).abs() < 1e-8, "quantile({}) = {}, expected {}", p, got, z);
            assert!((normal_quantile(1.0 - p) + got).abs() < 1e-8, "asymmetric at {}", p);
        }
        assert_eq!(normal_quantile(0.0), f64::NEG_INFINITY);
        assert_eq!(normal_quantile(1.0), f64::INFINITY);
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_default() {
        let estimator = ThresholdEstimator::new(
            Arc::new(MemoryPriorStore::new()),
            VolumePrior::default(),
            0.2,
        );
        let prior = estimator.prior_for("vol-1").await.unwrap();
        assert_eq!(prior.volume_id, "vol-1");
        assert!(close(prior.mean, crate::PRIOR_MEAN));
    }

    #[tokio::test]
    async fn test_reset_and_delete() {
        let estimator = ThresholdEstimator::new(
            Arc::new(MemoryPriorStore::new()),
            VolumePrior::default(),
            0.2,
        );
        estimator.observe("vol-1", &[3.0, 4.0, 5.0]).await.unwrap();
        let moved = estimator.prior_for("vol-1").await.unwrap();
        assert!(moved.mean > crate::PRIOR_MEAN);

        let reset = estimator.reset("vol-1").await.unwrap();
        assert!(close(reset.mean, crate::PRIOR_MEAN));
        assert!(close(estimator.prior_for("vol-1").await.unwrap().support, crate::PRIOR_SUPPORT));

        estimator.delete("vol-1").await.unwrap();
        assert!(matches!(estimator.delete("vol-1").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_observations_are_not_lost() {
        let estimator = Arc::new(ThresholdEstimator::new(
            Arc::new(MemoryPriorStore::new()),
            VolumePrior::default(),
            0.2,
        ));

        let mut handles = Vec::new();
        for i in 0..40 {
            let estimator = estimator.clone();
            handles.push(tokio::spawn(async move {
                estimator.observe("shared", &[i as f64 / 40.0]).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let prior = estimator.prior_for("shared").await.unwrap();
        assert!(close(prior.support, crate::PRIOR_SUPPORT + 40.0));
        assert!(close(prior.alpha, crate::PRIOR_ALPHA + 20.0));
    }
}
