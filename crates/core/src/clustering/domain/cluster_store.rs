use crate::clustering::domain::cluster_error::ClusterError;
use crate::clustering::domain::distance::{Embedding, Metric};

/// Cluster identifier. The first cluster is 1.
pub type Label = u32;

/// Insertion-ordered set of cluster representatives.
///
/// A representative is the embedding of the first item assigned to its
/// cluster and never changes afterwards; there is no centroid update, no
/// deletion and no relabelling. Label `n` is stored at index `n - 1`, so
/// scanning the store in index order is scanning in label order.
///
/// The dimensionality is fixed by the first inserted vector.
#[derive(Debug, Clone)]
pub struct ClusterStore {
    metric: Metric,
    representatives: Vec<Embedding>,
}

impl ClusterStore {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            representatives: Vec::new(),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }

    /// Dimensionality of stored vectors, or `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.representatives.first().map(|r| r.len())
    }

    /// Returns the representative of `label`, if that cluster exists.
    pub fn representative(&self, label: Label) -> Option<&[f32]> {
        let index = (label as usize).checked_sub(1)?;
        self.representatives.get(index).map(|r| r.as_slice())
    }

    /// All labels in creation order.
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        (1..=self.representatives.len()).map(|i| i as Label)
    }

    /// Finds the representative closest to `v`.
    ///
    /// Ties resolve to the lowest label: only a strictly smaller distance
    /// replaces the current best.
    pub fn find_nearest(&self, v: &[f32]) -> Result<Option<(Label, f64)>, ClusterError> {
        self.validate(v)?;

        let mut best: Option<(Label, f64)> = None;
        for (label, representative) in self.labels().zip(self.representatives.iter()) {
            let d = self.metric.distance(v, representative);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((label, d)),
            }
        }
        Ok(best)
    }

    /// Stores `v` as the representative of a new cluster and returns its label.
    pub fn insert(&mut self, v: Embedding) -> Result<Label, ClusterError> {
        self.validate(&v)?;
        self.representatives.push(v);
        Ok(self.representatives.len() as Label)
    }

    fn validate(&self, v: &[f32]) -> Result<(), ClusterError> {
        if v.is_empty() {
            return Err(ClusterError::EmptyVector);
        }
        if let Some(index) = v.iter().position(|x| !x.is_finite()) {
            return Err(ClusterError::NonFinite { index });
        }
        match self.dimension() {
            Some(expected) if expected != v.len() => Err(ClusterError::DimensionMismatch {
                expected,
                actual: v.len(),
            }),
            _ => Ok(()),
        }
    }
}
