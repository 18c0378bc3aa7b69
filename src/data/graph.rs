use num_traits::Float;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::time::Instant;
use thousands::*;
use tracing::info;

use crate::data::structures::*;
use crate::error::{Result, UmapError};
use crate::training::UmapGraphParams;

/////////////
// Helpers //
/////////////

/// Distance to the `local_connectivity`-th closest neighbour at a non-zero
/// distance
///
/// Fractional values interpolate linearly between the two surrounding
/// non-zero distances. If fewer non-zero distances exist than requested, the
/// largest one is used.
///
/// ### Params
///
/// * `dists` - Distances of one point to its neighbours
/// * `local_connectivity` - Number of neighbours assumed fully connected
///
/// ### Returns
///
/// `None` if every distance is zero
fn local_rho<T>(dists: &[T], local_connectivity: T) -> Option<T>
where
    T: Float,
{
    let mut non_zero: Vec<T> = dists.iter().copied().filter(|&d| d > T::zero()).collect();
    if non_zero.is_empty() {
        return None;
    }
    non_zero.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let index = local_connectivity.floor().to_usize().unwrap_or(0);
    let interpolation = local_connectivity - local_connectivity.floor();

    if index > non_zero.len() {
        return non_zero.last().copied();
    }

    let rho = if index == 0 {
        interpolation * non_zero[0]
    } else {
        let base = non_zero[index - 1];
        if interpolation > T::epsilon() && index < non_zero.len() {
            base + interpolation * (non_zero[index] - base)
        } else {
            base
        }
    };

    Some(rho)
}

/// Sum of the membership strengths of one point for a given sigma
///
/// ### Params
///
/// * `dists` - Distances of the point to its neighbours
/// * `rho` - Offset distance of the point
/// * `sigma` - Candidate bandwidth
///
/// ### Returns
///
/// `Σ_j exp(-max(d_j - rho, 0) / sigma)`
pub fn membership_sum<T>(dists: &[T], rho: T, sigma: T) -> T
where
    T: Float,
{
    dists.iter().fold(T::zero(), |acc, &d| {
        let adjusted = (d - rho).max(T::zero());
        acc + (-(adjusted / sigma)).exp()
    })
}

//////////
// UMAP //
//////////

/// Smooth kNN distances via bisection to find sigma for each point
///
/// For each point, finds the bandwidth (sigma) such that the sum of
/// membership strengths to its neighbours approximates `log2(k) *
/// bandwidth`. The search starts at `sigma = 1` with an unbounded upper
/// limit, doubling until the target is bracketed and bisecting afterwards.
///
/// ### Params
///
/// * `dist` - kNN distance matrix where each row contains the distances of
///   one point to its neighbours
/// * `k` - Effective number of neighbours (may be fractional)
/// * `local_connectivity` - Number of nearest neighbours assumed to be fully
///   connected (typically 1.0)
/// * `bandwidth` - Scaling of the target sum (typically 1.0)
/// * `ktol` - Tolerance of the bisection (typically 1e-5)
/// * `n_iter` - Maximum number of bisection iterations (typically 64)
///
/// ### Returns
///
/// Tuple of `(sigmas, rhos)`, or an error naming the first point without a
/// single non-zero distance.
///
/// ### Notes
///
/// Running out of iterations is not an error; the last midpoint is used.
pub fn smooth_knn_dist<T>(
    dist: &[Vec<T>],
    k: T,
    local_connectivity: T,
    bandwidth: T,
    ktol: T,
    n_iter: usize,
) -> Result<(Vec<T>, Vec<T>)>
where
    T: Float + Send + Sync,
{
    let target = k.log2() * bandwidth;
    let two = T::one() + T::one();

    let results: Vec<Result<(T, T)>> = dist
        .par_iter()
        .enumerate()
        .map(|(point, dists)| {
            let rho = local_rho(dists, local_connectivity)
                .ok_or(UmapError::DegenerateDistances { point })?;

            let mut lo = T::zero();
            let mut hi = T::infinity();
            let mut mid = T::one();

            for _ in 0..n_iter {
                let val = membership_sum(dists, rho, mid);

                if (val - target).abs() < ktol {
                    break;
                }

                if val > target {
                    hi = mid;
                    mid = (lo + hi) / two;
                } else {
                    lo = mid;
                    if hi.is_infinite() {
                        mid = mid * two;
                    } else {
                        mid = (lo + hi) / two;
                    }
                }
            }

            Ok((mid, rho))
        })
        .collect();

    let mut sigmas = Vec::with_capacity(results.len());
    let mut rhos = Vec::with_capacity(results.len());
    for res in results {
        let (sigma, rho) = res?;
        sigmas.push(sigma);
        rhos.push(rho);
    }

    Ok((sigmas, rhos))
}

/// Convert kNN graph to sparse COO format with directed membership
/// strengths
///
/// The entry for point `i` and its neighbour `j` is stored at
/// `(j, i)`, i.e. each column holds the outgoing weights of one point.
/// Self edges have weight zero and are not stored.
///
/// ### Params
///
/// * `knn_indices` - Indices of the nearest neighbours of each point
/// * `knn_dists` - Distances to the nearest neighbours of each point
/// * `sigmas` - Smoothing bandwidth for each point (from `smooth_knn_dist`)
/// * `rhos` - Offset distance for each point (from `smooth_knn_dist`)
///
/// ### Returns
///
/// Directed graph where weights are `exp(-(max(0, dist - rho) / sigma))`
pub fn knn_to_coo<T>(
    knn_indices: &[Vec<usize>],
    knn_dists: &[Vec<T>],
    sigmas: &[T],
    rhos: &[T],
) -> Result<CoordinateList<T>>
where
    T: Float + Send + Sync,
{
    let n = knn_indices.len();
    for (what, actual) in [
        ("knn distance rows", knn_dists.len()),
        ("sigmas", sigmas.len()),
        ("rhos", rhos.len()),
    ] {
        if actual != n {
            return Err(UmapError::ShapeMismatch {
                what,
                expected: n,
                actual,
            });
        }
    }

    let capacity: usize = knn_indices.iter().map(|v| v.len()).sum();
    let mut graph = CoordinateList::with_capacity(n, capacity);

    for (i, (neighbours, dists)) in knn_indices.iter().zip(knn_dists.iter()).enumerate() {
        if neighbours.len() != dists.len() {
            return Err(UmapError::ShapeMismatch {
                what: "knn distances per point",
                expected: neighbours.len(),
                actual: dists.len(),
            });
        }

        let sigma = sigmas[i];
        let rho = rhos[i];

        for (&j, &dist) in neighbours.iter().zip(dists.iter()) {
            if j >= n {
                return Err(UmapError::InvalidArgument(format!(
                    "neighbour index {} of point {} is out of bounds for {} points",
                    j, i, n
                )));
            }
            if i == j {
                continue;
            }

            let adjusted = (dist - rho).max(T::zero());
            let weight = if sigma > T::zero() {
                (-(adjusted / sigma)).exp()
            } else if adjusted > T::zero() {
                T::zero()
            } else {
                T::one()
            };

            if weight > T::zero() {
                graph.push(j, i, weight);
            }
        }
    }

    Ok(graph)
}

/// Collapse a COO list into a map keyed by coordinate; duplicates keep the
/// largest weight
fn coo_to_map<T>(graph: &CoordinateList<T>) -> FxHashMap<(usize, usize), T>
where
    T: Float,
{
    let mut map = FxHashMap::with_capacity_and_hasher(graph.get_size(), Default::default());
    for ((&i, &j), &w) in graph
        .row_indices
        .iter()
        .zip(&graph.col_indices)
        .zip(&graph.values)
    {
        map.entry((i, j))
            .and_modify(|v: &mut T| *v = (*v).max(w))
            .or_insert(w);
    }
    map
}

/// Combine two fuzzy sets via a blend of fuzzy union and intersection
///
/// `ratio * (A + B - A∘B) + (1 - ratio) * (A∘B)`, where `∘` is the
/// element-wise product. `ratio = 1` is the pure probabilistic t-conorm
/// (union), `ratio = 0` the product t-norm (intersection). Structural zeros
/// are dropped and the output is sorted by row, then column.
///
/// ### Params
///
/// * `a` - First fuzzy set
/// * `b` - Second fuzzy set, same number of vertices
/// * `ratio` - Mixing weight in [0, 1]
///
/// ### Returns
///
/// The combined fuzzy set in COO format
pub fn combine_fuzzy_sets<T>(
    a: &CoordinateList<T>,
    b: &CoordinateList<T>,
    ratio: T,
) -> Result<CoordinateList<T>>
where
    T: Float + Send + Sync,
{
    if a.n_samples != b.n_samples {
        return Err(UmapError::ShapeMismatch {
            what: "fuzzy set vertices",
            expected: a.n_samples,
            actual: b.n_samples,
        });
    }
    if !(ratio >= T::zero() && ratio <= T::one()) {
        return Err(UmapError::InvalidArgument(
            "mix ratio must lie in [0, 1]".to_string(),
        ));
    }

    let map_a = coo_to_map(a);
    let map_b = coo_to_map(b);

    let mut keys: Vec<(usize, usize)> = map_a.keys().chain(map_b.keys()).copied().collect();
    keys.par_sort_unstable();
    keys.dedup();

    let combined: Vec<(usize, usize, T)> = keys
        .into_par_iter()
        .filter_map(|(i, j)| {
            let w_a = map_a.get(&(i, j)).copied().unwrap_or(T::zero());
            let w_b = map_b.get(&(i, j)).copied().unwrap_or(T::zero());

            let product = w_a * w_b;
            let union = w_a + w_b - product;
            let w = (ratio * union + (T::one() - ratio) * product)
                .max(T::zero())
                .min(T::one());

            (w > T::zero()).then_some((i, j, w))
        })
        .collect();

    let mut result = CoordinateList::with_capacity(a.n_samples, combined.len());
    for (i, j, w) in combined {
        result.push(i, j, w);
    }

    Ok(result)
}

/// Symmetrise a directed membership graph: `combine(M, Mᵗ, mix_weight)`
///
/// ### Params
///
/// * `graph` - Directed graph in COO format
/// * `mix_weight` - `1.0` for fuzzy union (standard UMAP), `0.0` for fuzzy
///   intersection
///
/// ### Returns
///
/// Symmetric graph in COO format
pub fn symmetrise_graph<T>(graph: &CoordinateList<T>, mix_weight: T) -> Result<CoordinateList<T>>
where
    T: Float + Send + Sync,
{
    combine_fuzzy_sets(graph, &graph.transpose(), mix_weight)
}

/// Build the fuzzy simplicial set from the output of a nearest neighbour
/// search
///
/// Calibrates sigma/rho per point, computes directed membership strengths
/// and symmetrises them.
///
/// ### Params
///
/// * `knn_indices` - Indices of the nearest neighbours of each point
/// * `knn_dists` - Distances to the nearest neighbours of each point
/// * `params` - Graph construction parameters
///
/// ### Returns
///
/// Tuple of `(graph, sigmas, rhos)`
pub fn fuzzy_simplicial_set<T>(
    knn_indices: &[Vec<usize>],
    knn_dists: &[Vec<T>],
    params: &UmapGraphParams<T>,
) -> Result<(FuzzySimplicialSet<T>, Vec<T>, Vec<T>)>
where
    T: Float + Send + Sync,
{
    let start = Instant::now();

    let k = knn_dists.first().map_or(0, |row| row.len());
    if k == 0 {
        return Err(UmapError::InvalidArgument(
            "need at least one neighbour per point".to_string(),
        ));
    }
    let k_t = T::from(k).ok_or_else(|| {
        UmapError::InvalidArgument("neighbour count not representable".to_string())
    })?;

    let (sigmas, rhos) = smooth_knn_dist(
        knn_dists,
        k_t,
        params.local_connectivity,
        params.bandwidth,
        params.ktol,
        params.n_iter,
    )?;

    let directed = knn_to_coo(knn_indices, knn_dists, &sigmas, &rhos)?;
    let symmetric = symmetrise_graph(&directed, params.mix_weight)?;
    let graph = FuzzySimplicialSet::from_coo(&symmetric)?;

    info!(
        "Built fuzzy simplicial set with {} stored entries ({} directed) in {:.2?}.",
        graph.n_entries().separate_with_underscores(),
        directed.get_size().separate_with_underscores(),
        start.elapsed()
    );

    Ok((graph, sigmas, rhos))
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test_graph {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_local_rho() {
        let dists = vec![0.0, 2.0, 1.0, 4.0];

        assert_eq!(local_rho(&dists, 1.0), Some(1.0));
        assert_eq!(local_rho(&dists, 2.0), Some(2.0));
        assert_relative_eq!(local_rho(&dists, 1.5).unwrap(), 1.5);
        assert_eq!(local_rho(&dists, 10.0), Some(4.0));
        assert_eq!(local_rho(&[0.0, 0.0], 1.0), None);
    }

    #[test]
    fn test_smooth_knn_dist_hits_target() {
        let dist = vec![vec![1.0, 1.5, 2.0, 3.0], vec![0.5, 0.7, 0.8, 2.5]];
        let k = 4.0;

        let (sigmas, rhos) = smooth_knn_dist(&dist, k, 1.0, 1.0, 1e-5, 64).unwrap();

        assert_eq!(rhos, vec![1.0, 0.5]);
        for (i, row) in dist.iter().enumerate() {
            assert!(sigmas[i] > 0.0);
            let val = membership_sum(row, rhos[i], sigmas[i]);
            assert_relative_eq!(val, 2.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_smooth_knn_dist_ignores_zero_distances() {
        let dist = vec![vec![0.0, 0.25, 1.0]];
        let (_, rhos) = smooth_knn_dist(&dist, 3.0, 1.0, 1.0, 1e-5, 64).unwrap();
        assert_eq!(rhos[0], 0.25);
    }

    #[test]
    fn test_smooth_knn_dist_degenerate_point() {
        let dist = vec![vec![1.0, 2.0], vec![0.0, 0.0]];
        let err = smooth_knn_dist(&dist, 2.0, 1.0, 1.0, 1e-5, 64).unwrap_err();
        assert_eq!(err, UmapError::DegenerateDistances { point: 1 });
    }

    #[test]
    fn test_smooth_knn_dist_iteration_cap() {
        // a single iteration returns the starting midpoint untouched
        let dist = vec![vec![1.0, 5.0, 9.0]];
        let (sigmas, _) = smooth_knn_dist(&dist, 3.0, 1.0, 1.0, 1e-5, 1).unwrap();
        assert!(sigmas[0] == 0.5 || sigmas[0] == 2.0);
    }

    #[test]
    fn test_membership_sum_monotone_in_sigma() {
        let dists = vec![0.3, 0.9, 1.4, 2.2, 3.0];
        let rho = 0.3;

        let mut previous = 0.0;
        for step in 1..200 {
            let sigma = step as f64 * 0.05;
            let val = membership_sum(&dists, rho, sigma);
            assert!(val >= previous);
            previous = val;
        }
    }

    #[test]
    fn test_knn_to_coo_weights() {
        let knn_indices = vec![vec![0, 1, 2], vec![1, 0, 2], vec![2, 1, 0]];
        let knn_dists = vec![
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0, 1.5],
            vec![0.0, 1.5, 2.0],
        ];
        let sigmas = vec![1.0, 0.5, 1.0];
        let rhos = vec![1.0, 1.0, 1.5];

        let graph = knn_to_coo(&knn_indices, &knn_dists, &sigmas, &rhos).unwrap();

        // self edges are never stored
        assert_eq!(graph.get_size(), 6);
        let edges = graph.to_edge_list();
        // (neighbour, source)
        assert_eq!(edges[0], (1, 0, 1.0));
        assert_eq!(edges[1].0, 2);
        assert_eq!(edges[1].1, 0);
        assert_relative_eq!(edges[1].2, (-1.0f64).exp());
        assert_relative_eq!(edges[3].2, (-1.0f64).exp());
    }

    #[test]
    fn test_knn_to_coo_shape_checks() {
        let err = knn_to_coo(&[vec![1]], &[vec![1.0], vec![1.0]], &[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, UmapError::ShapeMismatch { .. }));

        let err = knn_to_coo(&[vec![3]], &[vec![1.0]], &[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, UmapError::InvalidArgument(_)));
    }

    #[test]
    fn test_combine_fuzzy_sets_union_and_intersection() {
        let a = CoordinateList::from_dense(&[vec![1.0, 0.1], vec![0.4, 1.0]]);
        let a_t = a.transpose();

        let union = combine_fuzzy_sets(&a, &a_t, 1.0).unwrap();
        let union = union.to_edge_list();
        assert_eq!(union.len(), 4);
        assert_relative_eq!(union[0].2, 1.0, epsilon = 1e-6);
        assert_relative_eq!(union[1].2, 0.46, epsilon = 1e-6);
        assert_relative_eq!(union[2].2, 0.46, epsilon = 1e-6);
        assert_relative_eq!(union[3].2, 1.0, epsilon = 1e-6);

        let inter = combine_fuzzy_sets(&a, &a_t, 0.0).unwrap();
        let inter = inter.to_edge_list();
        assert_relative_eq!(inter[0].2, 1.0, epsilon = 1e-6);
        assert_relative_eq!(inter[1].2, 0.04, epsilon = 1e-6);
        assert_relative_eq!(inter[2].2, 0.04, epsilon = 1e-6);
        assert_relative_eq!(inter[3].2, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_combine_fuzzy_sets_drops_zeros() {
        // an edge only present in one direction vanishes under intersection
        let a = CoordinateList::from_dense(&[vec![0.0, 0.5], vec![0.0, 0.0]]);
        let inter = combine_fuzzy_sets(&a, &a.transpose(), 0.0).unwrap();
        assert_eq!(inter.get_size(), 0);

        let union = symmetrise_graph(&a, 1.0).unwrap();
        assert_eq!(union.to_edge_list(), vec![(0, 1, 0.5), (1, 0, 0.5)]);
    }

    #[test]
    fn test_combine_fuzzy_sets_rejects_bad_input() {
        let a = CoordinateList::from_dense(&[vec![0.0, 0.5], vec![0.0, 0.0]]);
        let b = CoordinateList::<f64>::with_capacity(3, 0);
        assert!(combine_fuzzy_sets(&a, &b, 1.0).is_err());
        assert!(combine_fuzzy_sets(&a, &a, 1.5).is_err());
    }

    #[test]
    fn test_fuzzy_simplicial_set_symmetric_and_in_range() {
        let knn_indices = vec![
            vec![1, 2],
            vec![0, 2],
            vec![1, 3],
            vec![2, 1],
            vec![3, 2],
        ];
        let knn_dists = vec![
            vec![0.5, 1.2],
            vec![0.5, 0.7],
            vec![0.7, 0.9],
            vec![0.9, 1.6],
            vec![0.4, 1.3],
        ];

        let params = UmapGraphParams::default();
        let (graph, sigmas, rhos) =
            fuzzy_simplicial_set(&knn_indices, &knn_dists, &params).unwrap();

        assert_eq!(sigmas.len(), 5);
        assert_eq!(rhos, vec![0.5, 0.5, 0.7, 0.9, 0.4]);

        let dense = graph.to_dense();
        for i in 0..5 {
            assert_eq!(dense[i][i], 0.0);
            for j in 0..5 {
                assert_eq!(dense[i][j], dense[j][i]);
                assert!((0.0..=1.0).contains(&dense[i][j]));
            }
        }
        // nearest neighbour always gets full membership
        assert_eq!(dense[0][1], 1.0);
    }
}
