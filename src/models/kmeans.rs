// Spherical k-means: clustering on the unit hypersphere.
//
// Points and centroids are unit vectors and closeness is the inner product
// (cosine similarity), not Euclidean distance. Each update sums a cluster's
// members and renormalizes the sum.
//
// Seeding is k-means++ on cosine distance (1 - similarity) drawn from a
// seeded StdRng, and the whole fit is sequential, so a fixed seed and input
// order always give the same clustering.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::{common_dimension, dot, normalize};

/// Clustering configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalKMeans {
    /// Requested number of clusters.
    pub k: usize,
    /// Upper bound on assign/update rounds per restart.
    pub max_iterations: usize,
    /// Independent seedings; the one with the highest total similarity wins.
    pub restarts: usize,
    pub seed: u64,
}

impl Default for SphericalKMeans {
    fn default() -> Self {
        Self {
            k: 1,
            max_iterations: 300,
            restarts: 10,
            seed: 0,
        }
    }
}

/// Result of a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Unit-length centroids. Some may have no members.
    pub centroids: Vec<Vec<f64>>,
    /// Cluster index per input point.
    pub assignments: Vec<usize>,
    /// Similarity of each point to its assigned centroid.
    pub similarities: Vec<f64>,
    /// Sum of `similarities`; higher is tighter.
    pub objective: f64,
}

impl SphericalKMeans {
    pub fn with_k(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            ..Self::default()
        }
    }

    /// Cluster `vectors`. Inputs are normalized here; zero vectors are an error.
    ///
    /// The effective cluster count is capped at half the number of points
    /// (at least 1), so every cluster can hold two or more members.
    pub fn fit(&self, vectors: &[Vec<f64>]) -> Result<Clustering> {
        if self.k == 0 {
            anyhow::bail!("Cluster count must be at least 1");
        }
        if self.max_iterations == 0 || self.restarts == 0 {
            anyhow::bail!("max_iterations and restarts must be at least 1");
        }
        if vectors.is_empty() {
            anyhow::bail!("Cannot cluster an empty corpus");
        }
        common_dimension(vectors)?;

        let points = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| {
                normalize(v).ok_or_else(|| {
                    anyhow::anyhow!("Embedding {i} has zero length and cannot be clustered")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let cap = (points.len() / 2).max(1);
        let k = if self.k > cap {
            warn!(
                requested = self.k,
                points = points.len(),
                effective = cap,
                "Too few points for the requested clusters; reducing cluster count"
            );
            cap
        } else {
            self.k
        };

        let mut best: Option<Clustering> = None;
        for restart in 0..self.restarts {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(restart as u64));
            let centroids = seed_centroids(&points, k, &mut rng);
            let run = self.lloyd(&points, centroids);
            if best.as_ref().map_or(true, |b| run.objective > b.objective) {
                best = Some(run);
            }
        }

        // restarts >= 1, so a run always exists
        best.ok_or_else(|| anyhow::anyhow!("Clustering produced no result"))
    }

    fn lloyd(&self, points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>) -> Clustering {
        let mut assignments: Vec<usize> = Vec::new();

        for iteration in 0..self.max_iterations {
            let next = assign(points, &centroids).0;
            if next == assignments {
                debug!(iteration, "Spherical k-means converged");
                break;
            }
            assignments = next;

            for (j, centroid) in centroids.iter_mut().enumerate() {
                let mut sum = vec![0.0_f64; centroid.len()];
                for (point, _) in points.iter().zip(&assignments).filter(|(_, a)| **a == j) {
                    for (s, x) in sum.iter_mut().zip(point) {
                        *s += x;
                    }
                }
                // Empty or self-cancelling clusters keep their previous centroid
                if let Some(unit) = normalize(&sum) {
                    *centroid = unit;
                }
            }
        }

        let (assignments, similarities) = assign(points, &centroids);
        let objective = similarities.iter().sum();
        Clustering {
            centroids,
            assignments,
            similarities,
            objective,
        }
    }
}

/// Nearest centroid (highest inner product, lowest index on ties) per point.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> (Vec<usize>, Vec<f64>) {
    points
        .iter()
        .map(|p| {
            let mut best = (0, f64::NEG_INFINITY);
            for (j, c) in centroids.iter().enumerate() {
                let sim = dot(p, c);
                if sim > best.1 {
                    best = (j, sim);
                }
            }
            best
        })
        .unzip()
}

/// k-means++ seeding on cosine distance.
///
/// Stops early if every remaining point already coincides with a chosen
/// centroid, so duplicate-heavy corpora get fewer, distinct seeds.
fn seed_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())].clone()];
    let mut nearest: Vec<f64> = points
        .iter()
        .map(|p| cosine_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let weights: Vec<f64> = nearest.iter().map(|d| d * d).collect();
        let total: f64 = weights.iter().sum();
        if total <= f64::EPSILON {
            break;
        }

        let mut target = rng.gen::<f64>() * total;
        let mut chosen = weights.iter().rposition(|w| *w > 0.0).unwrap_or(0);
        for (i, w) in weights.iter().enumerate() {
            if *w > 0.0 && target < *w {
                chosen = i;
                break;
            }
            target -= w;
        }

        let centroid = points[chosen].clone();
        for (d, p) in nearest.iter_mut().zip(points) {
            *d = d.min(cosine_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    (1.0 - dot(a, b)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 0.05, 0.0],
            vec![0.98, 0.0, 0.1],
            vec![0.95, 0.1, 0.05],
            vec![0.0, 1.0, 0.02],
            vec![0.05, 0.97, 0.0],
            vec![0.1, 0.95, 0.1],
        ]
    }

    #[test]
    fn test_separates_two_groups() {
        let clustering = SphericalKMeans::with_k(2, 0).fit(&two_groups()).unwrap();
        let a = &clustering.assignments;
        assert_eq!(a[0], a[1]);
        assert_eq!(a[1], a[2]);
        assert_eq!(a[3], a[4]);
        assert_eq!(a[4], a[5]);
        assert_ne!(a[0], a[3]);
    }

    #[test]
    fn test_centroids_unit_length() {
        let clustering = SphericalKMeans::with_k(2, 3).fit(&two_groups()).unwrap();
        for c in &clustering.centroids {
            assert!((crate::embedding::norm(c) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fixed_seed_is_bit_for_bit_reproducible() {
        let kmeans = SphericalKMeans::with_k(3, 42);
        let a = kmeans.fit(&two_groups()).unwrap();
        let b = kmeans.fit(&two_groups()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_capped_at_half_point_count() {
        let clustering = SphericalKMeans::with_k(5, 0)
            .fit(&[vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();
        assert_eq!(clustering.centroids.len(), 1);

        let five = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.7, 0.7, 0.0],
            vec![0.0, 0.7, 0.7],
        ];
        let clustering = SphericalKMeans::with_k(4, 0).fit(&five).unwrap();
        assert!(clustering.centroids.len() <= 2);
    }

    #[test]
    fn test_duplicates_get_one_seed() {
        let v = vec![0.6, 0.8];
        let clustering = SphericalKMeans::with_k(3, 0)
            .fit(&[v.clone(), v.clone(), v.clone()])
            .unwrap();
        assert_eq!(clustering.centroids.len(), 1);
        assert!(clustering.assignments.iter().all(|&a| a == 0));
    }

    #[test]
    fn test_zero_vector_rejected() {
        assert!(SphericalKMeans::with_k(1, 0)
            .fit(&[vec![0.0, 0.0], vec![1.0, 0.0]])
            .is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(SphericalKMeans::with_k(1, 0).fit(&[]).is_err());
    }
}
