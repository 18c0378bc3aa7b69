use faer::MatRef;
use num_traits::Float;
use rayon::prelude::*;
use std::cmp::Ordering;

use crate::error::{Result, UmapError};

////////////
// Metric //
////////////

/// A dissimilarity between two points of the input space
///
/// Must be non-negative, symmetric and zero for identical points. The
/// triangle inequality is not required. Thread-safety is needed because the
/// neighbour search runs in parallel over query points.
pub trait Semimetric<T>: Sync {
    /// Distance between `a` and `b`
    fn distance(&self, a: &[T], b: &[T]) -> T;
}

impl<T, F> Semimetric<T> for F
where
    F: Fn(&[T], &[T]) -> T + Sync,
{
    fn distance(&self, a: &[T], b: &[T]) -> T {
        self(a, b)
    }
}

/// Built-in distance metrics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// L2 distance
    #[default]
    Euclidean,
    /// L1 distance
    Manhattan,
    /// One minus the cosine similarity
    Cosine,
}

impl<T> Semimetric<T> for DistanceMetric
where
    T: Float,
{
    fn distance(&self, a: &[T], b: &[T]) -> T {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .fold(T::zero(), |acc, (&x, &y)| acc + (x - y) * (x - y))
                .sqrt(),
            DistanceMetric::Manhattan => a
                .iter()
                .zip(b)
                .fold(T::zero(), |acc, (&x, &y)| acc + (x - y).abs()),
            DistanceMetric::Cosine => {
                let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
                    (T::zero(), T::zero(), T::zero()),
                    |(d, na, nb), (&x, &y)| (d + x * y, na + x * x, nb + y * y),
                );
                if norm_a == T::zero() && norm_b == T::zero() {
                    T::zero()
                } else if norm_a == T::zero() || norm_b == T::zero() {
                    T::one()
                } else {
                    (T::one() - dot / (norm_a.sqrt() * norm_b.sqrt())).max(T::zero())
                }
            }
        }
    }
}

/// Parse the distance metric to use
///
/// ### Params
///
/// * `s` - One of `"euclidean"`, `"manhattan"` or `"cosine"`
///
/// ### Returns
///
/// Option of DistanceMetric
pub fn parse_dist_metric(s: &str) -> Option<DistanceMetric> {
    match s.to_lowercase().as_str() {
        "euclidean" => Some(DistanceMetric::Euclidean),
        "manhattan" => Some(DistanceMetric::Manhattan),
        "cosine" => Some(DistanceMetric::Cosine),
        _ => None,
    }
}

////////////
// Search //
////////////

/// k nearest neighbours of every point, self excluded
///
/// ### Fields
///
/// * `indices` - `indices[i]` holds the neighbour indices of point `i`,
///   ordered by ascending distance
/// * `distances` - `distances[i][j]` is the distance from point `i` to
///   `indices[i][j]`
#[derive(Clone, Debug, PartialEq)]
pub struct NeighbourTable<T> {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<T>>,
}

impl<T> NeighbourTable<T> {
    /// Number of points
    pub fn n_samples(&self) -> usize {
        self.indices.len()
    }

    /// Neighbours per point
    pub fn k(&self) -> usize {
        self.indices.first().map_or(0, |row| row.len())
    }
}

/// Anything that produces a k-nearest-neighbour table for a data matrix
pub trait NeighbourSearch<T> {
    /// Find the `k` nearest neighbours of every row of `data`
    ///
    /// ### Params
    ///
    /// * `data` - Samples x features
    /// * `k` - Number of neighbours per point, self excluded
    ///
    /// ### Returns
    ///
    /// The neighbour table
    fn search(&self, data: MatRef<T>, k: usize) -> Result<NeighbourTable<T>>;
}

/// Exhaustive neighbour search
///
/// Compares every pair of points, so it is exact but quadratic in the number
/// of samples. Ties in distance are broken by the smaller index.
#[derive(Clone, Debug, Default)]
pub struct ExactNeighbours<M> {
    pub metric: M,
}

impl<M> ExactNeighbours<M> {
    /// Generate a new exact search with the given metric
    pub fn new(metric: M) -> Self {
        Self { metric }
    }
}

impl<T, M> NeighbourSearch<T> for ExactNeighbours<M>
where
    T: Float + Send + Sync,
    M: Semimetric<T>,
{
    fn search(&self, data: MatRef<T>, k: usize) -> Result<NeighbourTable<T>> {
        let n = data.nrows();
        if k == 0 || k >= n {
            return Err(UmapError::InvalidArgument(format!(
                "need 0 < k < n_samples, got k = {} and n_samples = {}",
                k, n
            )));
        }

        // row-major copy, faer stores columns contiguously
        let points: Vec<Vec<T>> = (0..n)
            .map(|i| (0..data.ncols()).map(|j| data[(i, j)]).collect())
            .collect();

        let rows: Vec<(Vec<usize>, Vec<T>)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut candidates: Vec<(T, usize)> = Vec::with_capacity(n - 1);
                for j in (0..n).filter(|&j| j != i) {
                    let d = self.metric.distance(&points[i], &points[j]);
                    if !(d.is_finite() && d >= T::zero()) {
                        return Err(UmapError::InvalidArgument(format!(
                            "distance between points {} and {} is negative or not finite",
                            i, j
                        )));
                    }
                    candidates.push((d, j));
                }

                // distances are finite here, so the comparison is total
                let by_dist = |a: &(T, usize), b: &(T, usize)| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(Ordering::Equal)
                        .then(a.1.cmp(&b.1))
                };
                if k < candidates.len() {
                    candidates.select_nth_unstable_by(k - 1, by_dist);
                    candidates.truncate(k);
                }
                candidates.sort_unstable_by(by_dist);

                Ok(candidates.into_iter().map(|(d, j)| (j, d)).unzip())
            })
            .collect::<Result<Vec<_>>>()?;

        let (indices, distances) = rows.into_iter().unzip();

        Ok(NeighbourTable { indices, distances })
    }
}

///////////
// Tests //
///////////
