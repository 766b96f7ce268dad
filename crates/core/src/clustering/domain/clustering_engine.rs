use crate::clustering::domain::cluster_error::ClusterError;
use crate::clustering::domain::cluster_store::{ClusterStore, Label};
use crate::clustering::domain::distance::{Embedding, Metric};

/// Maximum distance at which two embeddings are the same person.
pub const DEFAULT_TOLERANCE: f64 = 0.4;

/// Single-pass greedy identity clustering.
///
/// Each embedding joins the nearest existing cluster if its representative
/// lies within `tolerance` (inclusive), otherwise it founds a new cluster.
/// Only representatives of already-created clusters are compared, and they
/// never move, so the result depends on input order but is fully
/// reproducible for a given order.
#[derive(Debug, Clone)]
pub struct ClusteringEngine {
    store: ClusterStore,
    tolerance: f64,
}

impl ClusteringEngine {
    pub fn new(tolerance: f64, metric: Metric) -> Result<Self, ClusterError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ClusterError::InvalidTolerance(tolerance));
        }
        Ok(Self {
            store: ClusterStore::new(metric),
            tolerance,
        })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    pub fn cluster_count(&self) -> usize {
        self.store.len()
    }

    /// Assigns `v` to a cluster and returns its label.
    pub fn classify(&mut self, v: Embedding) -> Result<Label, ClusterError> {
        match self.store.find_nearest(&v)? {
            Some((label, distance)) if distance <= self.tolerance => {
                log::trace!("joined cluster {label} at distance {distance:.4}");
                Ok(label)
            }
            nearest => {
                let label = self.store.insert(v)?;
                match nearest {
                    Some((closest, distance)) => log::trace!(
                        "new cluster {label}: nearest was {closest} at distance {distance:.4}"
                    ),
                    None => log::trace!("seeded cluster {label}"),
                }
                Ok(label)
            }
        }
    }
}

impl Default for ClusteringEngine {
    fn default() -> Self {
        Self {
            store: ClusterStore::new(Metric::default()),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}
