#![allow(clippy::needless_range_loop)]

pub mod data;
pub mod error;
pub mod prelude;
pub mod training;
pub mod utils;

use faer::MatRef;
use num_traits::{Float, FromPrimitive};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    default::Default,
    marker::{Send, Sync},
    ops::{AddAssign, SubAssign},
    time::Instant,
};
use thousands::*;
use tracing::info;

use crate::data::graph::*;
use crate::data::init::*;
use crate::data::nearest_neighbours::*;
use crate::data::structures::*;
use crate::error::{Result, SpectralError, UmapError};
use crate::training::umap_optimisers::*;
use crate::training::*;

/////////////
// Helpers //
/////////////

/// Helper function to generate the UMAP graph
///
/// ### Params
///
/// * `data` - Input data matrix (samples × features)
/// * `k` - Number of nearest neighbours (typically 15-50)
/// * `search` - The nearest neighbour search to use
/// * `umap_params` - Graph parameters (local_connectivity, bandwidth,
///   mix_weight, ktol, n_iter)
///
/// ### Returns
///
/// Tuple of `(graph, neighbours, sigmas, rhos)`
pub fn construct_umap_graph<T, S>(
    data: MatRef<T>,
    k: usize,
    search: &S,
    umap_params: &UmapGraphParams<T>,
) -> Result<(FuzzySimplicialSet<T>, NeighbourTable<T>, Vec<T>, Vec<T>)>
where
    T: Float + Send + Sync,
    S: NeighbourSearch<T> + ?Sized,
{
    info!(
        "Running nearest neighbour search for {} samples with k = {}.",
        data.nrows().separate_with_underscores(),
        k
    );

    let start_knn = Instant::now();
    let neighbours = search.search(data, k)?;

    if neighbours.n_samples() != data.nrows() {
        return Err(UmapError::ShapeMismatch {
            what: "neighbour table rows",
            expected: data.nrows(),
            actual: neighbours.n_samples(),
        });
    }

    info!("kNN search done in: {:.2?}.", start_knn.elapsed());

    let (graph, sigmas, rhos) =
        fuzzy_simplicial_set(&neighbours.indices, &neighbours.distances, umap_params)?;

    Ok((graph, neighbours, sigmas, rhos))
}

////////////
// Params //
////////////

/// Main Config structure with all of the possible sub configurations
///
/// ### Fields
///
/// * `n_dim` - How many dimensions to return
/// * `k` - Number of neighbours
/// * `dist_metric` - Distance metric of the built-in neighbour search. One of
///   `"euclidean"`, `"manhattan"` or `"cosine"`.
/// * `initialisation` - Which embedding initialisation to use. One of
///   `"spectral"` or `"random"`.
/// * `umap_graph_params` - The graph parameters for the generation of the
///   fuzzy simplicial set.
/// * `optim_params` - The optimiser parameters.
/// * `spectral_params` - The eigensolver parameters of the spectral
///   initialisation.
#[derive(Debug, Clone)]
pub struct UmapParams<T> {
    pub n_dim: usize,
    pub k: usize,
    pub dist_metric: String,
    pub initialisation: String,
    pub umap_graph_params: UmapGraphParams<T>,
    pub optim_params: UmapOptimParams<T>,
    pub spectral_params: SpectralParams,
}

impl<T> UmapParams<T>
where
    T: Float + FromPrimitive,
{
    /// Generate new UMAP parameters
    ///
    /// If everything is set to `None`, the standard UMAP settings are used.
    ///
    /// ### Params
    ///
    /// * `n_dim` - How many dimensions to return. Default `2`.
    /// * `k` - How many neighbours to consider. Default `15`.
    /// * `dist_metric` - Distance metric. Default `"euclidean"`.
    /// * `initialisation` - Which initialisation of the embedding to use.
    ///   Default `"spectral"`.
    /// * `umap_graph_params` - Further graph generation parameters.
    /// * `optim_params` - Further optimiser parameters.
    /// * `spectral_params` - Further eigensolver parameters.
    ///
    /// ### Returns
    ///
    /// Initialised self
    pub fn new(
        n_dim: Option<usize>,
        k: Option<usize>,
        dist_metric: Option<String>,
        initialisation: Option<String>,
        umap_graph_params: Option<UmapGraphParams<T>>,
        optim_params: Option<UmapOptimParams<T>>,
        spectral_params: Option<SpectralParams>,
    ) -> Self {
        Self {
            n_dim: n_dim.unwrap_or(2),
            k: k.unwrap_or(15),
            dist_metric: dist_metric.unwrap_or("euclidean".to_string()),
            initialisation: initialisation.unwrap_or("spectral".to_string()),
            umap_graph_params: umap_graph_params.unwrap_or_default(),
            optim_params: optim_params.unwrap_or_default(),
            spectral_params: spectral_params.unwrap_or_default(),
        }
    }

    /// Default parameters with a custom curve
    ///
    /// ### Params
    ///
    /// * `n_dim` - How many dimensions to return. Default `2`.
    /// * `k` - How many neighbours to consider. Default `15`.
    /// * `min_dist` - Minimum distance between embedded points. Default `0.1`.
    /// * `spread` - Effective scale of embedded points. Default `1.0`.
    ///
    /// ### Returns
    ///
    /// Self with `a` and `b` fitted to `min_dist` and `spread`. Fails unless
    /// `min_dist > 0` and `spread > 0`.
    pub fn default_2d(
        n_dim: Option<usize>,
        k: Option<usize>,
        min_dist: Option<T>,
        spread: Option<T>,
    ) -> Result<Self> {
        let min_dist = min_dist.unwrap_or(T::from_f64(0.1).unwrap_or_else(T::zero));
        let spread = spread.unwrap_or(T::one());
        let optim_params = UmapOptimParams::from_min_dist_spread(min_dist, spread, None, None, None)?;

        Ok(Self::new(n_dim, k, None, None, None, Some(optim_params), None))
    }

    /// Check the parameters against the data dimensions
    ///
    /// ### Params
    ///
    /// * `n_samples` - Number of rows of the data
    /// * `n_features` - Number of columns of the data
    ///
    /// ### Returns
    ///
    /// The parsed metric and initialisation, or the first invalid argument.
    pub fn validate(
        &self,
        n_samples: usize,
        n_features: usize,
    ) -> Result<(DistanceMetric, EmbdInit)> {
        let invalid = |msg: String| Err(UmapError::InvalidArgument(msg));

        if self.k == 0 || self.k >= n_samples {
            return invalid(format!(
                "need 0 < k < n_samples, got k = {} and n_samples = {}",
                self.k, n_samples
            ));
        }
        if self.n_dim < 2 || self.n_dim >= n_features {
            return invalid(format!(
                "need 1 < n_dim < n_features, got n_dim = {} and n_features = {}",
                self.n_dim, n_features
            ));
        }
        if self.optim_params.n_epochs == 0 {
            return invalid("n_epochs must be > 0".to_string());
        }

        let metric = parse_dist_metric(&self.dist_metric).ok_or_else(|| {
            UmapError::InvalidArgument(format!("unknown distance metric '{}'", self.dist_metric))
        })?;
        let init = parse_initialisation(&self.initialisation).ok_or_else(|| {
            UmapError::InvalidArgument(format!(
                "unknown initialisation '{}'",
                self.initialisation
            ))
        })?;

        Ok((metric, init))
    }
}

impl<T> Default for UmapParams<T>
where
    T: Float + FromPrimitive,
{
    fn default() -> Self {
        Self::new(None, None, None, None, None, None, None)
    }
}

/// Result of a UMAP run
///
/// ### Fields
///
/// * `embedding` - Low-dimensional coordinates, `n_dim x n_samples`
/// * `graph` - The fuzzy simplicial set that was laid out
/// * `neighbours` - The k-nearest-neighbour table of the input
/// * `sigmas` - Per-point bandwidths of the smooth kNN calibration
/// * `rhos` - Per-point distance offsets of the smooth kNN calibration
/// * `init_fallback` - Why the spectral initialisation fell back to random
///   coordinates, if it did
#[derive(Debug, Clone)]
pub struct UmapOutput<T>
where
    T: Float,
{
    pub embedding: Embedding<T>,
    pub graph: FuzzySimplicialSet<T>,
    pub neighbours: NeighbourTable<T>,
    pub sigmas: Vec<T>,
    pub rhos: Vec<T>,
    pub init_fallback: Option<SpectralError>,
}

////////////////////////
// Main "normal" UMAP //
////////////////////////

/// Run UMAP with any neighbour search and random number generator
///
/// 1. Validate the parameters against the data
/// 2. Find the k nearest neighbours with `search`
/// 3. Calibrate, build and symmetrise the fuzzy simplicial set
/// 4. Initialise the embedding (spectral with random fallback, or random)
/// 5. Optimise the embedding with sampled SGD
///
/// ### Params
///
/// * `data` - Input data matrix (samples × features)
/// * `umap_params` - The UMAP parameters
/// * `search` - Nearest neighbour search
/// * `rng` - Source of all randomness of the run
///
/// ### Returns
///
/// The embedding plus the intermediate results, or the first fatal error.
pub fn umap_with_neighbours<T, S, R>(
    data: MatRef<T>,
    umap_params: &UmapParams<T>,
    search: &S,
    rng: &mut R,
) -> Result<UmapOutput<T>>
where
    T: Float + FromPrimitive + Send + Sync + AddAssign + SubAssign,
    S: NeighbourSearch<T> + ?Sized,
    R: Rng,
{
    let (_, init_type) = umap_params.validate(data.nrows(), data.ncols())?;
    let start = Instant::now();

    info!(
        "Running umap with a: {:.4} and b: {:.4}.",
        umap_params.optim_params.a().to_f64().unwrap_or(f64::NAN),
        umap_params.optim_params.b().to_f64().unwrap_or(f64::NAN)
    );

    let (graph, neighbours, sigmas, rhos) =
        construct_umap_graph(data, umap_params.k, search, &umap_params.umap_graph_params)?;

    let start_init = Instant::now();
    let (mut embedding, init_fallback) = initialise_embedding(
        init_type,
        &graph,
        umap_params.n_dim,
        &umap_params.spectral_params,
        rng,
    );
    info!(
        "Initialised embedding ({:?}) in {:.2?}.",
        init_type,
        start_init.elapsed()
    );

    let start_optim = Instant::now();
    optimise_embedding_sgd(&mut embedding, &graph, &umap_params.optim_params, rng)?;
    info!(
        "Optimised embedding over {} epochs in {:.2?}.",
        umap_params.optim_params.n_epochs,
        start_optim.elapsed()
    );
    info!("UMAP finished in {:.2?}.", start.elapsed());

    Ok(UmapOutput {
        embedding,
        graph,
        neighbours,
        sigmas,
        rhos,
        init_fallback,
    })
}

/// Run UMAP dimensionality reduction
///
/// Uses the exact neighbour search with `umap_params.dist_metric` and a
/// [`StdRng`] seeded from `seed`, so equal inputs give equal outputs.
///
/// ### Params
///
/// * `data` - Input data matrix (samples × features)
/// * `umap_params` - The UMAP parameters
/// * `seed` - Seed for reproducibility
///
/// ### Returns
///
/// The embedding plus the intermediate results, or the first fatal error.
/// `output.embedding.to_components()` gives the coordinates as
/// `[n_dim][n_samples]`.
///
/// ### Example
///
/// ```ignore
/// use faer::Mat;
/// let data = Mat::from_fn(1000, 128, |_, _| rand::random::<f32>());
/// let output = umap(data.as_ref(), &UmapParams::default(), 42)?;
/// let coords = output.embedding.to_components();
/// // coords[0] contains x-coordinates for all points
/// // coords[1] contains y-coordinates for all points
/// ```
pub fn umap<T>(data: MatRef<T>, umap_params: &UmapParams<T>, seed: u64) -> Result<UmapOutput<T>>
where
    T: Float + FromPrimitive + Send + Sync + AddAssign + SubAssign,
{
    let (metric, _) = umap_params.validate(data.nrows(), data.ncols())?;
    let search = ExactNeighbours::new(metric);
    let mut rng = StdRng::seed_from_u64(seed);

    umap_with_neighbours(data, umap_params, &search, &mut rng)
}

///////////
// Tests //
///////////
