pub use crate::data::graph::{fuzzy_simplicial_set, smooth_knn_dist};
pub use crate::data::init::{
    initialise_embedding, parse_initialisation, random_layout, spectral_layout, EmbdInit,
    SpectralLayout, SpectralParams,
};
pub use crate::data::nearest_neighbours::{
    parse_dist_metric, DistanceMetric, ExactNeighbours, NeighbourSearch, NeighbourTable,
    Semimetric,
};
pub use crate::data::structures::{Embedding, FuzzySimplicialSet};
pub use crate::error::{SpectralError, UmapError};
pub use crate::training::curve_fit::{fit_ab_params, CurveParams};
pub use crate::training::umap_optimisers::{optimise_embedding_sgd, UmapOptimParams};
pub use crate::training::UmapGraphParams;
pub use crate::{umap, umap_with_neighbours, UmapOutput, UmapParams};
