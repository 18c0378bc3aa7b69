pub mod curve_fit;
pub mod umap_optimisers;

use num_traits::Float;

////////////
// Params //
////////////

/// Parameters of the fuzzy simplicial set construction
///
/// ### Fields
///
/// * `local_connectivity` - Number of nearest neighbours assumed to be fully
///   connected (typically 1.0). Larger values make the manifold more locally
///   connected.
/// * `bandwidth` - Scaling of the target membership sum `log2(k)` (typically
///   1.0).
/// * `mix_weight` - Blend between fuzzy union (1.0) and fuzzy intersection
///   (0.0) during symmetrisation.
/// * `ktol` - Convergence tolerance of the sigma bisection (typically 1e-5).
/// * `n_iter` - Maximum number of bisection steps (typically 64).
#[derive(Clone, Debug)]
pub struct UmapGraphParams<T> {
    pub local_connectivity: T,
    pub bandwidth: T,
    pub mix_weight: T,
    pub ktol: T,
    pub n_iter: usize,
}

impl<T> UmapGraphParams<T>
where
    T: Float,
{
    /// Generate new graph parameters
    ///
    /// ### Params
    ///
    /// * `local_connectivity` - Default `1.0`.
    /// * `bandwidth` - Default `1.0`.
    /// * `mix_weight` - Default `1.0` (fuzzy union).
    /// * `ktol` - Default `1e-5`.
    /// * `n_iter` - Default `64`.
    ///
    /// ### Returns
    ///
    /// Initialised self
    pub fn new(
        local_connectivity: Option<T>,
        bandwidth: Option<T>,
        mix_weight: Option<T>,
        ktol: Option<T>,
        n_iter: Option<usize>,
    ) -> Self {
        let default = Self::default();
        Self {
            local_connectivity: local_connectivity.unwrap_or(default.local_connectivity),
            bandwidth: bandwidth.unwrap_or(default.bandwidth),
            mix_weight: mix_weight.unwrap_or(default.mix_weight),
            ktol: ktol.unwrap_or(default.ktol),
            n_iter: n_iter.unwrap_or(default.n_iter),
        }
    }
}

impl<T> Default for UmapGraphParams<T>
where
    T: Float,
{
    /// Returns the standard UMAP graph settings
    ///
    /// ### Returns
    ///
    /// * `local_connectivity = 1.0` - Treat nearest neighbour as connected
    /// * `bandwidth = 1.0` - Target sum of `log2(k)`
    /// * `mix_weight = 1.0` - Standard symmetric fuzzy union
    /// * `ktol = 1e-5` - Tight convergence for sigma computation
    /// * `n_iter = 64` - Bisection steps
    fn default() -> Self {
        Self {
            local_connectivity: T::one(),
            bandwidth: T::one(),
            mix_weight: T::one(),
            ktol: T::from(1e-5).unwrap_or_else(T::epsilon),
            n_iter: 64,
        }
    }
}
