// Clustered signature: the author as a handful of directions.
//
// People tweet about more than one thing, so a single mean vector can sit
// between topics and match none of them well. This model clusters the own
// corpus on the unit sphere and keeps each cluster's centroid along with how
// tightly its members hug it. A new sample only has to match one cluster.
//
// Clusters with a single member are dropped after fitting: they would match
// their own sample perfectly and nothing else.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::kmeans::SphericalKMeans;
use super::traits::{
    embeddings_of, not_characterized, AuthorshipModel, Hyperparameters, InputKind,
};
use crate::corpus::Sample;
use crate::embedding::{dot, normalize};

/// A retained cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureCluster {
    /// Unit-length centroid.
    pub centroid: Vec<f64>,
    /// Number of own-corpus samples assigned here (always >= 2).
    pub members: usize,
    /// Lowest member similarity to the centroid.
    pub edge: f64,
    /// Mean member similarity to the centroid.
    pub scale: f64,
}

/// The fitted clustered signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteredSignature {
    pub clusters: Vec<SignatureCluster>,
    /// Clusters discarded for having fewer than two members.
    pub pruned: usize,
}

impl ClusteredSignature {
    pub fn dimension(&self) -> usize {
        self.clusters.first().map_or(0, |c| c.centroid.len())
    }

    /// Best cluster score for one unit vector, optionally offset by each
    /// cluster's scale.
    fn best_score(&self, unit: &[f64], scaling: bool) -> f64 {
        self.clusters
            .iter()
            .map(|c| {
                let raw = dot(unit, &c.centroid);
                if scaling {
                    raw - c.scale
                } else {
                    raw
                }
            })
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteredCosSimModel {
    pub kmeans: SphericalKMeans,
    pub params: Hyperparameters,
    pub signature: Option<ClusteredSignature>,
}

impl ClusteredCosSimModel {
    /// A model that fits up to `clusters` clusters with a fixed seed.
    pub fn new(clusters: usize, seed: u64) -> Self {
        Self {
            kmeans: SphericalKMeans::with_k(clusters, seed),
            params: Hyperparameters::default(),
            signature: None,
        }
    }
}

impl Default for ClusteredCosSimModel {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl AuthorshipModel for ClusteredCosSimModel {
    fn name(&self) -> String {
        let base = format!("emb_{}", self.kmeans.k);
        if self.params.cluster_scaling {
            format!("{base}_scaled")
        } else {
            base
        }
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Embedding
    }

    fn characterize(&mut self, own: &[Sample], _context: Option<&[Sample]>) -> Result<()> {
        if own.is_empty() {
            anyhow::bail!("Cannot characterize the clustered model from an empty corpus");
        }
        let vectors = embeddings_of(own, "clustered")?;
        let clustering = self.kmeans.fit(&vectors)?;

        let mut clusters = Vec::new();
        let mut pruned = 0;
        for (j, centroid) in clustering.centroids.iter().enumerate() {
            let sims: Vec<f64> = clustering
                .assignments
                .iter()
                .zip(&clustering.similarities)
                .filter(|(a, _)| **a == j)
                .map(|(_, s)| *s)
                .collect();

            if sims.len() < 2 {
                pruned += 1;
                continue;
            }

            let edge = sims.iter().copied().fold(f64::INFINITY, f64::min);
            let scale = sims.iter().sum::<f64>() / sims.len() as f64;
            clusters.push(SignatureCluster {
                centroid: centroid.clone(),
                members: sims.len(),
                edge,
                scale,
            });
        }

        if clusters.is_empty() {
            anyhow::bail!(
                "No cluster kept two or more of the {} own-corpus samples; \
                 lower the cluster count or provide a larger corpus",
                own.len()
            );
        }

        info!(
            requested = self.kmeans.k,
            retained = clusters.len(),
            pruned,
            samples = own.len(),
            "Fitted clustered signature"
        );
        for (i, c) in clusters.iter().enumerate() {
            debug!(cluster = i, members = c.members, edge = c.edge, scale = c.scale);
        }

        self.signature = Some(ClusteredSignature { clusters, pruned });
        Ok(())
    }

    fn similarity_score(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| not_characterized("clustered"))?;
        let dim = signature.dimension();
        let vectors = embeddings_of(samples, "clustered")?;

        vectors
            .iter()
            .map(|v| {
                if v.len() != dim {
                    anyhow::bail!(
                        "Sample has {} dimensions but the signature has {}",
                        v.len(),
                        dim
                    );
                }
                // A zero vector has no direction: treat as similarity 0 to every cluster
                let unit = normalize(v).unwrap_or_else(|| vec![0.0; dim]);
                Ok(signature.best_score(&unit, self.params.cluster_scaling))
            })
            .collect()
    }

    /// Authentic as soon as any one cluster reaches the threshold.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    fn classify(&self, score: f64) -> bool {
        !(score >= self.params.threshold)
    }

    fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    fn set_hyperparameters(&mut self, params: Hyperparameters) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }
}
