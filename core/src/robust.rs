//! Robust Estimation Module
//!
//! Provides a generic RANSAC implementation that can be used for any model estimation task.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::marker::PhantomData;
use tracing::debug;

/// Configuration for robust estimation
#[derive(Debug, Clone)]
pub struct RobustConfig {
    pub threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    pub min_sample_size: usize,
    /// Fixed seed for reproducible sampling; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            max_iterations: 1000,
            confidence: 0.99,
            min_sample_size: 4,
            seed: None,
        }
    }
}

impl RobustConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Result of robust estimation
#[derive(Debug, Clone)]
pub struct RobustResult<M> {
    pub model: Option<M>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    pub residual: f64,
    pub iterations: usize,
}

impl<M> RobustResult<M> {
    fn empty(n: usize) -> Self {
        Self {
            model: None,
            inliers: vec![false; n],
            num_inliers: 0,
            residual: f64::INFINITY,
            iterations: 0,
        }
    }
}

/// Trait for models that can be estimated robustly
pub trait RobustModel<D> {
    type Model: Clone;

    /// Minimum number of data points required to estimate the model
    fn min_sample_size(&self) -> usize;

    /// Estimate model from a sample of at least `min_sample_size` points
    fn estimate(&self, data: &[&D]) -> Option<Self::Model>;

    /// Compute error for a single data point against the model
    fn compute_error(&self, model: &Self::Model, data: &D) -> f64;
}

/// Generic RANSAC engine
pub struct Ransac<D, M: RobustModel<D>> {
    config: RobustConfig,
    _phantom: PhantomData<(D, M)>,
}

impl<D, M: RobustModel<D>> Ransac<D, M> {
    pub fn new(config: RobustConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    pub fn config(&self) -> &RobustConfig {
        &self.config
    }

    pub fn run(&self, estimator: &M, data: &[D]) -> RobustResult<M::Model> {
        let n = data.len();
        let k = estimator.min_sample_size().max(self.config.min_sample_size);

        if n < k {
            return RobustResult::empty(n);
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best = RobustResult::empty(n);
        let mut required_iterations = self.config.max_iterations;
        let mut iteration = 0;

        while iteration < required_iterations {
            iteration += 1;

            // 1. Sample
            let sample: Vec<&D> = rand::seq::index::sample(&mut rng, n, k)
                .into_iter()
                .map(|i| &data[i])
                .collect();

            // 2. Estimate
            let Some(model) = estimator.estimate(&sample) else {
                continue;
            };

            // 3. Score
            let (inliers, num_inliers, residual) = self.score(estimator, &model, data);
            if num_inliers > best.num_inliers
                || (num_inliers == best.num_inliers && residual < best.residual)
            {
                best = RobustResult {
                    model: Some(model),
                    inliers,
                    num_inliers,
                    residual,
                    iterations: iteration,
                };
                required_iterations = self
                    .adaptive_iterations(num_inliers as f64 / n as f64, k)
                    .min(self.config.max_iterations);
            }
        }

        best.iterations = iteration;
        if best.num_inliers >= k {
            self.refit(estimator, data, best)
        } else {
            best
        }
    }

    /// Re-estimates the model from every inlier and keeps it when it does not
    /// lose support.
    fn refit(
        &self,
        estimator: &M,
        data: &[D],
        best: RobustResult<M::Model>,
    ) -> RobustResult<M::Model> {
        let support: Vec<&D> = data
            .iter()
            .zip(best.inliers.iter())
            .filter_map(|(d, &inlier)| inlier.then_some(d))
            .collect();

        let Some(model) = estimator.estimate(&support) else {
            return best;
        };

        let (inliers, num_inliers, residual) = self.score(estimator, &model, data);
        if num_inliers >= best.num_inliers {
            RobustResult {
                model: Some(model),
                inliers,
                num_inliers,
                residual,
                iterations: best.iterations,
            }
        } else {
            debug!(
                refit_inliers = num_inliers,
                sample_inliers = best.num_inliers,
                "refit lost support, keeping sampled model"
            );
            best
        }
    }

    fn score(&self, estimator: &M, model: &M::Model, data: &[D]) -> (Vec<bool>, usize, f64) {
        let mut inliers = vec![false; data.len()];
        let mut num_inliers = 0;
        let mut total_error = 0.0;

        for (j, d) in data.iter().enumerate() {
            let err = estimator.compute_error(model, d);
            if err < self.config.threshold {
                inliers[j] = true;
                num_inliers += 1;
                total_error += err;
            }
        }

        let residual = if num_inliers > 0 {
            total_error / num_inliers as f64
        } else {
            f64::INFINITY
        };
        (inliers, num_inliers, residual)
    }

    /// Iterations needed to draw one all-inlier sample with the configured confidence.
    fn adaptive_iterations(&self, inlier_ratio: f64, k: usize) -> usize {
        let p_good = inlier_ratio.powi(k as i32);
        if p_good >= 1.0 - f64::EPSILON {
            return 1;
        }
        if p_good <= f64::EPSILON {
            return self.config.max_iterations;
        }
        let needed = (1.0 - self.config.confidence).ln() / (1.0 - p_good).ln();
        if needed.is_finite() && needed > 0.0 {
            needed.ceil() as usize
        } else {
            self.config.max_iterations
        }
    }
}
