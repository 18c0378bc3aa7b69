use num_traits::{Float, FromPrimitive};
use rand::Rng;
use std::ops::{AddAssign, SubAssign};
use tracing::debug;

use crate::data::structures::{Embedding, FuzzySimplicialSet};
use crate::error::{Result, UmapError};
use crate::training::curve_fit::{fit_ab_params, CurveParams};

/////////////
// Globals //
/////////////

/// Gradient clip value per coordinate
const CLIP_VAL: f64 = 4.0;
/// Offset of the squared distance in the repulsive gradient
const REP_EPS: f64 = 0.001;
/// Epoch interval of the progress messages
const LOG_EVERY: usize = 50;

//////////////////////////
// Structures and Enums //
//////////////////////////

/// UMAP optimisation parameters
///
/// `a` and `b` are always the curve fit of `min_dist` and `spread`, so these
/// four are only reachable through the constructors and the getters.
///
/// ### Fields
///
/// * `a` - Curve parameter of the low-dimensional kernel (~1.58 for the
///   default `min_dist` and `spread`)
/// * `b` - Curve parameter of the low-dimensional kernel (~0.90 for the
///   default `min_dist` and `spread`)
/// * `lr` - Initial learning rate (typically 1.0)
/// * `n_epochs` - Number of optimisation epochs (typically 300)
/// * `neg_sample_rate` - Number of negative samples per activated edge
///   (typically 5)
/// * `min_dist` - Minimum distance between points in embedding (typically 0.1)
/// * `spread` - Effective scale of embedded points (typically 1.0)
#[derive(Clone, Debug)]
pub struct UmapOptimParams<T> {
    a: T,
    b: T,
    pub lr: T,
    pub n_epochs: usize,
    pub neg_sample_rate: usize,
    min_dist: T,
    spread: T,
}

impl<T> UmapOptimParams<T>
where
    T: Float + FromPrimitive,
{
    /// Default parameters for 2D embedding
    ///
    /// ### Returns
    ///
    /// Self with `a` and `b` fitted to `min_dist = 0.1`, `spread = 1.0`. Falls
    /// back to the tabulated values of that fit should the fit fail.
    pub fn default_2d() -> Self {
        Self::from_min_dist_spread(
            T::from_f64(0.1).unwrap_or_else(T::zero),
            T::one(),
            None,
            None,
            None,
        )
        .unwrap_or_else(|_| Self {
            a: T::from_f64(1.577).unwrap_or_else(T::one),
            b: T::from_f64(0.895).unwrap_or_else(T::one),
            lr: T::one(),
            n_epochs: 300,
            neg_sample_rate: 5,
            min_dist: T::from_f64(0.1).unwrap_or_else(T::zero),
            spread: T::one(),
        })
    }

    /// Params from specified minimum distance and spread
    ///
    /// ### Params
    ///
    /// * `min_dist` - Minimum distance parameter
    /// * `spread` - Effective scale of embedded points
    /// * `lr` - Initial learning rate. Default `1.0`.
    /// * `n_epochs` - Number of optimisation epochs. Default `300`.
    /// * `neg_sample_rate` - Number of negative samples per activated edge.
    ///   Default `5`.
    ///
    /// ### Return
    ///
    /// Self with `a` and `b` from the curve fit. Fails with an argument error
    /// unless `min_dist > 0`, or with the curve fit error.
    pub fn from_min_dist_spread(
        min_dist: T,
        spread: T,
        lr: Option<T>,
        n_epochs: Option<usize>,
        neg_sample_rate: Option<usize>,
    ) -> Result<Self> {
        if !(min_dist > T::zero()) {
            return Err(UmapError::InvalidArgument(
                "min_dist must be > 0".to_string(),
            ));
        }
        let curve = fit_ab_params(min_dist, spread)?;

        Ok(Self {
            a: curve.a,
            b: curve.b,
            lr: lr.unwrap_or(T::one()),
            n_epochs: n_epochs.unwrap_or(300),
            neg_sample_rate: neg_sample_rate.unwrap_or(5),
            min_dist,
            spread,
        })
    }

    /// Curve parameter `a`
    pub fn a(&self) -> T {
        self.a
    }

    /// Curve parameter `b`
    pub fn b(&self) -> T {
        self.b
    }

    /// Minimum distance the curve was fitted to
    pub fn min_dist(&self) -> T {
        self.min_dist
    }

    /// Spread the curve was fitted to
    pub fn spread(&self) -> T {
        self.spread
    }

    /// Both curve parameters
    pub fn curve(&self) -> CurveParams<T> {
        CurveParams {
            a: self.a,
            b: self.b,
        }
    }
}

impl<T> Default for UmapOptimParams<T>
where
    T: Float + FromPrimitive,
{
    fn default() -> Self {
        Self::default_2d()
    }
}

/// Pre-cast constants of the gradient formulas
struct OptimConstants<T> {
    a: T,
    b: T,
    two_a_b: T,
    two_b: T,
    clip_val: T,
    rep_eps: T,
}

impl<T> OptimConstants<T>
where
    T: Float + FromPrimitive,
{
    fn new(a: T, b: T) -> Result<Self> {
        let cast = |x: f64| {
            T::from_f64(x).ok_or_else(|| {
                UmapError::InvalidArgument(format!("{} is not representable", x))
            })
        };
        let two = cast(2.0)?;
        Ok(Self {
            a,
            b,
            two_a_b: two * a * b,
            two_b: two * b,
            clip_val: cast(CLIP_VAL)?,
            rep_eps: cast(REP_EPS)?,
        })
    }

    #[inline(always)]
    fn clip(&self, x: T) -> T {
        x.max(-self.clip_val).min(self.clip_val)
    }

    /// `-2ab * d^(2(b-1)) / (1 + a * d^(2b))` for `dist_sq = d^2 > 0`, else 0
    #[inline(always)]
    fn attractive_coeff(&self, dist_sq: T) -> T {
        if dist_sq > T::zero() {
            -self.two_a_b * dist_sq.powf(self.b - T::one())
                / (T::one() + self.a * dist_sq.powf(self.b))
        } else {
            T::zero()
        }
    }

    /// `2b / ((0.001 + d^2) * (1 + a * d^(2b)))` for `dist_sq = d^2 > 0`, else 0
    #[inline(always)]
    fn repulsive_coeff(&self, dist_sq: T) -> T {
        if dist_sq > T::zero() {
            self.two_b / ((self.rep_eps + dist_sq) * (T::one() + self.a * dist_sq.powf(self.b)))
        } else {
            T::zero()
        }
    }
}

/////////////
// Helpers //
/////////////

/// Squared Euclidean distance between two points of a flat buffer
#[inline(always)]
fn squared_dist_flat<T>(embd: &[T], base_i: usize, base_j: usize, n_dim: usize) -> T
where
    T: Float,
{
    let mut sum = T::zero();
    for d in 0..n_dim {
        let diff = embd[base_i + d] - embd[base_j + d];
        sum = sum + diff * diff;
    }
    sum
}

////////////////
// Optimisers //
////////////////

/// Optimise the UMAP embedding with stochastic gradient descent
///
/// Each epoch visits every stored entry `(i, j, p)` of the fuzzy simplicial
/// set once and activates it with probability `p`. An active entry
///
/// 1. pulls `i` and `j` together with the clipped attractive gradient
///    `-2ab * d^(2(b-1)) / (1 + a * d^(2b))`
/// 2. pushes `i` away from `neg_sample_rate` uniformly drawn vertices with
///    the clipped repulsive gradient `2b / ((0.001 + d^2) * (1 + a * d^(2b)))`
///
/// The learning rate decays linearly from `lr` towards zero. All randomness
/// comes from `rng`, so a seeded generator makes the run reproducible.
///
/// ### Params
///
/// * `embd` - Initial embedding coordinates (modified in place)
/// * `graph` - The fuzzy simplicial set to lay out
/// * `params` - Optimisation parameters (a, b, lr, n_epochs,
///   neg_sample_rate)
/// * `rng` - Source of the edge activations and negative samples
///
/// ### Returns
///
/// Error on mismatching sizes, otherwise `Ok(())`.
pub fn optimise_embedding_sgd<T, R>(
    embd: &mut Embedding<T>,
    graph: &FuzzySimplicialSet<T>,
    params: &UmapOptimParams<T>,
    rng: &mut R,
) -> Result<()>
where
    T: Float + FromPrimitive + AddAssign + SubAssign + Send + Sync,
    R: Rng,
{
    let n = embd.n_samples();
    let n_dim = embd.n_components();

    if graph.n_vertices() != n {
        return Err(UmapError::ShapeMismatch {
            what: "graph vertices vs embedding points",
            expected: n,
            actual: graph.n_vertices(),
        });
    }
    if n == 0 || graph.n_entries() == 0 || params.n_epochs == 0 {
        return Ok(());
    }

    let consts = OptimConstants::new(params.a, params.b)?;
    let n_epochs_t = T::from_usize(params.n_epochs).ok_or_else(|| {
        UmapError::InvalidArgument("n_epochs is not representable".to_string())
    })?;

    // column-major (row, col, probability) triplets, gathered once
    let edges: Vec<(usize, usize, f64)> = graph
        .iter_entries()
        .map(|(i, j, w)| (i, j, w.to_f64().unwrap_or(0.0)))
        .collect();
    let embd_flat = embd.as_mut_slice();

    let mut alpha = params.lr;

    for epoch in 1..=params.n_epochs {
        for &(i, j, p) in &edges {
            let u: f64 = rng.random();
            if u > p {
                continue;
            }

            let base_i = i * n_dim;
            let base_j = j * n_dim;

            // Attraction
            let dist_sq = squared_dist_flat(embd_flat, base_i, base_j, n_dim);
            let grad_coeff = consts.attractive_coeff(dist_sq);

            for d in 0..n_dim {
                let diff = embd_flat[base_i + d] - embd_flat[base_j + d];
                let grad_d = consts.clip(grad_coeff * diff);
                embd_flat[base_i + d] += alpha * grad_d;
                embd_flat[base_j + d] -= alpha * grad_d;
            }

            // Negative sampling
            for _ in 0..params.neg_sample_rate {
                let k = rng.random_range(0..n);
                if k == i {
                    continue;
                }
                let base_k = k * n_dim;

                let dist_sq = squared_dist_flat(embd_flat, base_i, base_k, n_dim);
                let grad_coeff = consts.repulsive_coeff(dist_sq);

                for d in 0..n_dim {
                    let grad_d = if grad_coeff > T::zero() {
                        let diff = embd_flat[base_i + d] - embd_flat[base_k + d];
                        consts.clip(grad_coeff * diff)
                    } else {
                        consts.clip_val
                    };
                    embd_flat[base_i + d] += alpha * grad_d;
                }
            }
        }

        alpha = params.lr
            * (T::one() - T::from_usize(epoch).unwrap_or_else(T::zero) / n_epochs_t);

        if epoch % LOG_EVERY == 0 || epoch == params.n_epochs {
            debug!(" Completed epoch {}/{}", epoch, params.n_epochs);
        }
    }

    Ok(())
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test_umap_optimiser {
    use super::*;
    use crate::data::structures::CoordinateList;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_params(n_epochs: usize, neg_sample_rate: usize) -> UmapOptimParams<f64> {
        UmapOptimParams {
            a: 1.0,
            b: 1.0,
            lr: 1.0,
            n_epochs,
            neg_sample_rate,
            min_dist: 0.1,
            spread: 1.0,
        }
    }

    /// Two triangles of fully connected vertices without links between them
    fn two_triangles() -> FuzzySimplicialSet<f64> {
        let mut coo = CoordinateList::with_capacity(6, 12);
        for block in [0, 3] {
            for i in block..block + 3 {
                for j in block..block + 3 {
                    if i != j {
                        coo.push(i, j, 1.0);
                    }
                }
            }
        }
        FuzzySimplicialSet::from_coo(&coo).unwrap()
    }

    #[test]
    fn test_optim_params_default_2d() {
        let params = UmapOptimParams::<f64>::default_2d();

        assert_relative_eq!(params.a, 1.577, epsilon = 0.02);
        assert_relative_eq!(params.b, 0.895, epsilon = 0.01);
        assert_eq!(params.lr, 1.0);
        assert_eq!(params.n_epochs, 300);
        assert_eq!(params.neg_sample_rate, 5);
        assert_relative_eq!(params.min_dist(), 0.1, epsilon = 1e-6);
        assert_relative_eq!(params.spread(), 1.0, epsilon = 1e-6);
        assert_eq!(params.curve(), fit_ab_params(0.1, 1.0).unwrap());
    }

    #[test]
    fn test_optim_params_from_min_dist_spread() {
        let params =
            UmapOptimParams::<f64>::from_min_dist_spread(0.5, 2.0, Some(0.5), Some(100), Some(3))
                .unwrap();

        assert!(params.a > 0.0);
        assert!(params.b > 0.0);
        assert_eq!(params.lr, 0.5);
        assert_eq!(params.n_epochs, 100);
        assert_eq!(params.neg_sample_rate, 3);

        assert!(UmapOptimParams::<f64>::from_min_dist_spread(0.1, -1.0, None, None, None).is_err());
        assert!(matches!(
            UmapOptimParams::<f64>::from_min_dist_spread(0.0, 1.0, None, None, None),
            Err(UmapError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_gradient_coefficients() {
        let (a, b) = (1.577, 0.895);
        let consts = OptimConstants::new(a, b).unwrap();
        let dist_sq = 4.0f64;

        let rep = consts.repulsive_coeff(dist_sq);
        let expected_rep = 2.0 * b / ((0.001 + dist_sq) * (1.0 + a * dist_sq.powf(b)));
        assert_relative_eq!(rep, expected_rep, epsilon = 1e-12);
        assert_relative_eq!(rep, 0.0693, epsilon = 1e-3);

        let att = consts.attractive_coeff(dist_sq);
        let expected_att = -2.0 * a * b * dist_sq.powf(b - 1.0) / (1.0 + a * dist_sq.powf(b));
        assert_relative_eq!(att, expected_att, epsilon = 1e-12);
        assert_relative_eq!(att, -0.3782, epsilon = 1e-3);

        // repulsion fades with distance
        assert!(consts.repulsive_coeff(16.0) < rep);

        assert_eq!(consts.repulsive_coeff(0.0), 0.0);
        assert_eq!(consts.attractive_coeff(0.0), 0.0);
        assert_eq!(consts.clip(10.0), 4.0);
        assert_eq!(consts.clip(-10.0), -4.0);
    }

    #[test]
    fn test_optimise_embedding_empty_graph() {
        let graph = FuzzySimplicialSet::from_coo(&CoordinateList::with_capacity(3, 0)).unwrap();
        let mut embd =
            Embedding::from_points(&[vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]).unwrap();
        let before = embd.clone();
        let mut rng = StdRng::seed_from_u64(42);

        optimise_embedding_sgd(&mut embd, &graph, &test_params(10, 5), &mut rng).unwrap();

        assert_eq!(embd, before);
    }

    #[test]
    fn test_optimise_embedding_shape_mismatch() {
        let graph = two_triangles();
        let mut embd = Embedding::<f64>::zeros(2, 4);
        let mut rng = StdRng::seed_from_u64(42);

        let res = optimise_embedding_sgd(&mut embd, &graph, &test_params(10, 5), &mut rng);
        assert!(matches!(res, Err(UmapError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_optimise_embedding_convergence() {
        let mut coo = CoordinateList::with_capacity(2, 2);
        coo.push(0, 1, 1.0);
        coo.push(1, 0, 1.0);
        let graph = FuzzySimplicialSet::from_coo(&coo).unwrap();
        let mut embd = Embedding::from_points(&[vec![0.0, 0.0], vec![10.0, 0.0]]).unwrap();

        let initial_dist = embd.squared_dist(0, 1).sqrt();

        // no negative samples, so only attraction acts
        let mut rng = StdRng::seed_from_u64(42);
        optimise_embedding_sgd(&mut embd, &graph, &test_params(100, 0), &mut rng).unwrap();

        let final_dist = embd.squared_dist(0, 1).sqrt();
        assert!(final_dist < initial_dist);
        assert!(final_dist < 1.0);
    }

    #[test]
    fn test_sgd_reproducibility() {
        let graph = two_triangles();
        let start = Embedding::from_fn(2, 6, |d, i| (i as f64) * 0.7 - (d as f64) * 1.3);
        let params = test_params(50, 5);

        let mut embd_1 = start.clone();
        let mut embd_2 = start.clone();
        optimise_embedding_sgd(&mut embd_1, &graph, &params, &mut StdRng::seed_from_u64(7))
            .unwrap();
        optimise_embedding_sgd(&mut embd_2, &graph, &params, &mut StdRng::seed_from_u64(7))
            .unwrap();

        assert_eq!(embd_1, embd_2);
        assert_ne!(embd_1, start);
    }

    #[test]
    fn test_sgd_output_is_finite() {
        let graph = two_triangles();
        // coincident points exercise the zero-distance branches
        let mut embd = Embedding::from_fn(2, 6, |d, i| if i < 2 { 0.0 } else { (i + d) as f64 });
        let mut rng = StdRng::seed_from_u64(123);

        optimise_embedding_sgd(&mut embd, &graph, &test_params(100, 5), &mut rng).unwrap();

        assert!(embd.as_slice().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_optimisation_preserves_graph_structure_sgd() {
        let graph = two_triangles();
        let mut rng = StdRng::seed_from_u64(42);
        // interleave the two triangles on a line
        let mut embd = Embedding::from_fn(2, 6, |d, i| {
            let pos = [0.0, 2.0, 4.0, 1.0, 3.0, 5.0][i];
            if d == 0 { pos } else { 0.0 }
        });

        optimise_embedding_sgd(&mut embd, &graph, &test_params(200, 5), &mut rng).unwrap();

        let mean_dist = |pairs: &[(usize, usize)]| {
            pairs
                .iter()
                .map(|&(i, j)| embd.squared_dist(i, j).sqrt())
                .sum::<f64>()
                / pairs.len() as f64
        };

        let intra = mean_dist(&[(0, 1), (0, 2), (1, 2), (3, 4), (3, 5), (4, 5)]);
        let inter = mean_dist(&[(0, 3), (0, 4), (1, 4), (1, 5), (2, 3), (2, 5)]);

        assert!(
            intra < inter,
            "intra-triangle distance {:.3} should be below inter-triangle {:.3}",
            intra,
            inter
        );
    }
}
