use cv_core::{Descriptor, Descriptors, Error, FeatureMatch, Matches, Result};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

/// Lowe's default ratio for SIFT-like descriptors.
pub const DEFAULT_RATIO: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Euclidean distance over descriptor components.
    BruteForce,
    /// Bit-count distance for binary descriptors.
    BruteForceHamming,
}

impl MatchType {
    pub fn distance(&self, a: &Descriptor, b: &Descriptor) -> f32 {
        match self {
            MatchType::BruteForce => a.l2_distance(b),
            MatchType::BruteForceHamming => a.hamming_distance(b) as f32,
        }
    }
}

/// For every query descriptor, its `k` nearest train descriptors in
/// ascending distance. Equal distances are ordered by train index.
pub fn knn_match(
    query: &Descriptors,
    train: &Descriptors,
    k: usize,
    match_type: MatchType,
) -> Vec<Vec<FeatureMatch>> {
    query
        .descriptors
        .par_iter()
        .enumerate()
        .map(|(query_idx, q_desc)| {
            let mut distances: Vec<(usize, f32)> = train
                .iter()
                .enumerate()
                .map(|(idx, t_desc)| (idx, match_type.distance(q_desc, t_desc)))
                .collect();

            distances.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });

            distances
                .into_iter()
                .take(k)
                .map(|(train_idx, distance)| FeatureMatch::new(query_idx, train_idx, distance))
                .collect()
        })
        .collect()
}

/// Lowe's ratio test: keeps a query's best candidate only when
/// `best < ratio * second_best`. Queries with fewer than two candidates are
/// ambiguous and dropped.
pub fn ratio_test(knn: &[Vec<FeatureMatch>], ratio: f32) -> Vec<FeatureMatch> {
    knn.iter()
        .filter_map(|candidates| match candidates.as_slice() {
            [best, second, ..] if best.distance < ratio * second.distance => Some(*best),
            _ => None,
        })
        .collect()
}

/// Ratio test followed by the minimum-support check a homography fit needs.
pub fn good_matches(
    knn: &[Vec<FeatureMatch>],
    ratio: f32,
    min_matches: usize,
) -> Result<Matches> {
    let good = ratio_test(knn, ratio);
    debug!(
        candidates = knn.len(),
        good = good.len(),
        ratio,
        "ratio test"
    );
    if good.len() < min_matches {
        return Err(Error::InsufficientMatches {
            found: good.len(),
            required: min_matches,
        });
    }
    Ok(good.into())
}
