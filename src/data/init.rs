use num_traits::{Float, FromPrimitive};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::data::structures::*;
use crate::error::SpectralError;
use crate::utils::math::*;

// Both initialisations end up in a box of this half-width
pub const SPECTRAL_RANGE: f64 = 10.0;
pub const RANDOM_RANGE: f64 = 10.0;
/// Standard deviation of the jitter added after rescaling
pub const INIT_NOISE_STD: f64 = 1e-4;

/////////////
// Helpers //
/////////////

/// Different initialisation methods for the UMAP
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmbdInit {
    /// Spectral initialisation, random on failure
    #[default]
    Spectral,
    /// Random initialisation
    Random,
}

/// Parse the respective initialisation
///
/// ### Params
///
/// * `s` - String that defines the initialisation method. Choice of
///   `"spectral"` or `"random"`.
///
/// ### Returns
///
/// The Option of a EmbdInit
pub fn parse_initialisation(s: &str) -> Option<EmbdInit> {
    match s.to_lowercase().as_str() {
        "spectral" => Some(EmbdInit::Spectral),
        "random" => Some(EmbdInit::Random),
        _ => None,
    }
}

/// Parameters of the spectral initialisation
///
/// ### Fields
///
/// * `tol` - Residual tolerance of the eigenpairs (typically 1e-4)
/// * `max_iter` - Maximum number of solver restarts. `None` means
///   `5 * n_vertices`.
#[derive(Clone, Debug)]
pub struct SpectralParams {
    pub tol: f64,
    pub max_iter: Option<usize>,
}

impl SpectralParams {
    /// Generate new spectral parameters
    ///
    /// ### Params
    ///
    /// * `tol` - Default `1e-4`.
    /// * `max_iter` - Default `None`, i.e. `5 * n_vertices`.
    pub fn new(tol: Option<f64>, max_iter: Option<usize>) -> Self {
        Self {
            tol: tol.unwrap_or(1e-4),
            max_iter,
        }
    }
}

impl Default for SpectralParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Outcome of the spectral initialisation
///
/// A failed eigendecomposition is not an error for the pipeline: the layout
/// falls back to random coordinates and carries the reason along.
#[derive(Clone, Debug)]
pub enum SpectralLayout<T> {
    /// Eigenvector coordinates
    Converged(Embedding<T>),
    /// Random coordinates and why the spectral route failed
    Fallback {
        embedding: Embedding<T>,
        reason: SpectralError,
    },
}

impl<T> SpectralLayout<T> {
    /// Did the spectral route fail?
    pub fn is_fallback(&self) -> bool {
        matches!(self, SpectralLayout::Fallback { .. })
    }

    /// The coordinates, whichever route produced them
    pub fn embedding(&self) -> &Embedding<T> {
        match self {
            SpectralLayout::Converged(embedding) => embedding,
            SpectralLayout::Fallback { embedding, .. } => embedding,
        }
    }

    /// Split into the coordinates and the fallback reason, if any
    pub fn into_parts(self) -> (Embedding<T>, Option<SpectralError>) {
        match self {
            SpectralLayout::Converged(embedding) => (embedding, None),
            SpectralLayout::Fallback { embedding, reason } => (embedding, Some(reason)),
        }
    }
}

//////////////
// Spectral //
//////////////

/// Shifted normalised adjacency `B = I + D^(-1/2) S D^(-1/2) = 2I - L`
///
/// `L` is the symmetric normalised Laplacian, so the largest eigenpairs of `B`
/// are the smallest of `L` and all eigenvalues of `B` lie in `[0, 2]`.
///
/// ### Fields
///
/// * `indptr` - Column pointers of the fuzzy simplicial set
/// * `indices` - Row indices of the fuzzy simplicial set
/// * `data` - Entries scaled by `d_i^(-1/2) * d_j^(-1/2)`
struct ShiftedAdjacency {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl ShiftedAdjacency {
    /// Normalise the graph by its degrees
    ///
    /// ### Returns
    ///
    /// The operator, or `IsolatedVertex` for the first vertex with zero degree.
    fn new<T>(graph: &FuzzySimplicialSet<T>) -> Result<Self, SpectralError>
    where
        T: Float + Send + Sync,
    {
        let d_inv_sqrt = graph
            .degrees()
            .iter()
            .enumerate()
            .map(|(vertex, &d)| {
                let d = d.to_f64().unwrap_or(0.0);
                if d > 0.0 {
                    Ok(1.0 / d.sqrt())
                } else {
                    Err(SpectralError::IsolatedVertex { vertex })
                }
            })
            .collect::<Result<Vec<f64>, SpectralError>>()?;

        let csc = graph.as_csc();
        let mut data = Vec::with_capacity(csc.get_nnz());
        for col in 0..graph.n_vertices() {
            for idx in csc.indptr[col]..csc.indptr[col + 1] {
                let w = csc.data[idx].to_f64().unwrap_or(0.0);
                data.push(w * d_inv_sqrt[csc.indices[idx]] * d_inv_sqrt[col]);
            }
        }

        Ok(Self {
            indptr: csc.indptr.clone(),
            indices: csc.indices.clone(),
            data,
        })
    }

    /// `y = B x`
    ///
    /// The matrix is symmetric, so row `c` of the product is gathered from
    /// column `c` and every output element is computed independently.
    fn matvec(&self, x: &[f64], y: &mut [f64]) {
        y.par_iter_mut().enumerate().for_each(|(c, y_c)| {
            let mut acc = x[c];
            for idx in self.indptr[c]..self.indptr[c + 1] {
                acc += self.data[idx] * x[self.indices[idx]];
            }
            *y_c = acc;
        });
    }
}

/// Raw eigenvector coordinates of the spectral layout
///
/// ### Returns
///
/// `n_comp x N` coordinates from eigenvectors 2 to `n_comp + 1` of the
/// normalised Laplacian, or why they could not be computed.
fn spectral_coordinates<T, R>(
    graph: &FuzzySimplicialSet<T>,
    n_comp: usize,
    params: &SpectralParams,
    rng: &mut R,
) -> Result<Embedding<T>, SpectralError>
where
    T: Float + FromPrimitive + Send + Sync,
    R: Rng,
{
    let n = graph.n_vertices();
    let nev = n_comp + 1;

    if n <= nev {
        return Err(SpectralError::TooFewVertices {
            n_vertices: n,
            required: nev,
        });
    }

    let op = ShiftedAdjacency::new(graph)?;
    let krylov = KrylovParams {
        nev,
        basis_size: KrylovParams::basis_size_for(n, nev),
        tol: params.tol,
        max_iter: params.max_iter.unwrap_or(5 * n),
    };

    let pairs = largest_eigenpairs(|x: &[f64], y: &mut [f64]| op.matvec(x, y), n, &krylov, rng)?;

    debug!(
        "Spectral eigenvalues of the normalised Laplacian: {:?}",
        pairs.values.iter().map(|v| 2.0 - v).collect::<Vec<f64>>()
    );

    // first pair is the trivial sqrt(degree) direction
    let mut embd = Embedding::zeros(n_comp, n);
    for (d, evec) in pairs.vectors.iter().skip(1).enumerate() {
        for (i, &v) in evec.iter().enumerate() {
            embd.column_mut(i)[d] = T::from_f64(v)
                .filter(|v| v.is_finite())
                .ok_or(SpectralError::NonFinite)?;
        }
    }

    Ok(embd)
}

/// Rescale to `max |coord| = range` and add small Gaussian noise
///
/// ### Params
///
/// * `embd` - Raw coordinates
/// * `range` - Target maximum absolute coordinate
/// * `rng` - Source of the noise
///
/// ### Returns
///
/// Finalised embedding coordinates
fn finalise_layout<T, R>(mut embd: Embedding<T>, range: f64, rng: &mut R) -> Embedding<T>
where
    T: Float + FromPrimitive,
    R: Rng,
{
    let max_abs = embd.max_abs().to_f64().unwrap_or(0.0);
    let scale = if max_abs > 1e-8 { range / max_abs } else { 1.0 };

    for val in embd.as_mut_slice() {
        let noise = rng.sample::<f64, _>(StandardNormal) * INIT_NOISE_STD;
        let x = val.to_f64().unwrap_or(0.0) * scale + noise;
        *val = T::from_f64(x).unwrap_or_else(T::zero);
    }

    embd
}

/// Compute spectral layout initialisation for graph
///
/// Coordinates are the eigenvectors belonging to the 2nd to
/// `(n_comp + 1)`-th smallest eigenvalues of the symmetric normalised
/// Laplacian `I - D^(-1/2) S D^(-1/2)`. If they cannot be computed (isolated
/// vertex, too few vertices, no convergence, non-finite output) the layout
/// falls back to [`random_layout`] and logs a warning.
///
/// ### Params
///
/// * `graph` - The fuzzy simplicial set
/// * `n_comp` - Number of embedding dimensions
/// * `params` - Eigensolver parameters
/// * `rng` - Source of the start vectors, the noise and the fallback
///
/// ### Returns
///
/// The layout, scaled to `max |coord| = 10` with `N(0, 1e-4)` noise added.
pub fn spectral_layout<T, R>(
    graph: &FuzzySimplicialSet<T>,
    n_comp: usize,
    params: &SpectralParams,
    rng: &mut R,
) -> SpectralLayout<T>
where
    T: Float + FromPrimitive + Send + Sync,
    R: Rng,
{
    match spectral_coordinates(graph, n_comp, params, rng) {
        Ok(embd) => SpectralLayout::Converged(finalise_layout(embd, SPECTRAL_RANGE, rng)),
        Err(reason) => {
            warn!(
                "Spectral initialisation failed: {}. Falling back to random initialisation.",
                reason
            );
            SpectralLayout::Fallback {
                embedding: random_layout(graph.n_vertices(), n_comp, rng),
                reason,
            }
        }
    }
}

////////////
// Random //
////////////

/// Random initialisation
///
/// Uniform coordinates in `[-10, 10]`, then the same rescale and noise as the
/// spectral layout.
///
/// ### Params
///
/// * `n_samples` - Number of samples to initialise
/// * `n_comp` - Dimensionality of the embedding
/// * `rng` - Random number generator
///
/// ### Returns
///
/// Random embedding coordinates
pub fn random_layout<T, R>(n_samples: usize, n_comp: usize, rng: &mut R) -> Embedding<T>
where
    T: Float + FromPrimitive,
    R: Rng,
{
    let embd = Embedding::from_fn(n_comp, n_samples, |_, _| {
        T::from_f64(rng.random_range(-RANDOM_RANGE..RANDOM_RANGE)).unwrap_or_else(T::zero)
    });
    finalise_layout(embd, RANDOM_RANGE, rng)
}

//////////
// Main //
//////////

/// Initialise embedding coordinates using specified method
///
/// ### Params
///
/// * `init_method` - Initialisation strategy to use
/// * `graph` - Fuzzy simplicial set
/// * `n_comp` - Target embedding dimensionality (typically 2-3)
/// * `params` - Spectral solver parameters (ignored for random)
/// * `rng` - Random number generator
///
/// ### Returns
///
/// Tuple of `(embedding, fallback_reason)`. The reason is only set if the
/// spectral route was requested and failed.
pub fn initialise_embedding<T, R>(
    init_method: EmbdInit,
    graph: &FuzzySimplicialSet<T>,
    n_comp: usize,
    params: &SpectralParams,
    rng: &mut R,
) -> (Embedding<T>, Option<SpectralError>)
where
    T: Float + FromPrimitive + Send + Sync,
    R: Rng,
{
    match init_method {
        EmbdInit::Spectral => spectral_layout(graph, n_comp, params, rng).into_parts(),
        EmbdInit::Random => (random_layout(graph.n_vertices(), n_comp, rng), None),
    }
}

///////////
// Tests //
///////////
