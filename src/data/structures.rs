use num_traits::Float;
use rayon::prelude::*;
use std::ops::{Add, Mul};

use crate::error::{Result, UmapError};

/////////////////////
// Data structures //
/////////////////////

/////////
// COO //
/////////

/// Coordinate list
///
/// Represents a (possibly directed) weighted graph in COO (Coordinate) format.
///
/// ### Fields
///
/// * `row_indices` - Row index
/// * `col_indices` - Column index
/// * `values` - The value stored here
/// * `n_samples` - The number of vertices in the graph
#[derive(Clone, Debug)]
pub struct CoordinateList<T> {
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<T>,
    pub n_samples: usize,
}

impl<T> CoordinateList<T>
where
    T: Float,
{
    /// Generate an empty coordinate list with pre-allocated storage
    ///
    /// ### Params
    ///
    /// * `n_samples` - Number of vertices
    /// * `capacity` - Expected number of entries
    pub fn with_capacity(n_samples: usize, capacity: usize) -> Self {
        Self {
            row_indices: Vec::with_capacity(capacity),
            col_indices: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            n_samples,
        }
    }

    /// Build a coordinate list from a dense square matrix, skipping zeros
    ///
    /// ### Params
    ///
    /// * `dense` - Row-major square matrix
    ///
    /// ### Returns
    ///
    /// The sparse version of the matrix
    pub fn from_dense(dense: &[Vec<T>]) -> Self {
        let n = dense.len();
        let mut coo = Self::with_capacity(n, n);
        for (i, row) in dense.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != T::zero() {
                    coo.push(i, j, v);
                }
            }
        }
        coo
    }

    /// Append one entry
    pub fn push(&mut self, row: usize, col: usize, value: T) {
        self.row_indices.push(row);
        self.col_indices.push(col);
        self.values.push(value);
    }

    /// Generate an edge list from the COO
    ///
    /// ### Returns
    ///
    /// A vector of tuples representing the edges and their weights
    pub fn to_edge_list(&self) -> Vec<(usize, usize, T)> {
        self.row_indices
            .iter()
            .zip(&self.col_indices)
            .zip(&self.values)
            .map(|((&r, &c), &v)| (r, c, v))
            .collect()
    }

    /// Returns the number of stored entries
    pub fn get_size(&self) -> usize {
        self.row_indices.len()
    }

    /// Returns the transpose (rows and columns swapped)
    pub fn transpose(&self) -> Self {
        Self {
            row_indices: self.col_indices.clone(),
            col_indices: self.row_indices.clone(),
            values: self.values.clone(),
            n_samples: self.n_samples,
        }
    }
}

/////////////
// CSR/CSC //
/////////////

/// Type to describe the CompressedSparseFormat
#[derive(Debug, Clone, PartialEq)]
pub enum CompressedSparseFormat {
    /// CSC-formatted data
    Csc,
    /// CSR-formatted data
    Csr,
}

impl CompressedSparseFormat {
    /// Returns boolean if it's CSC
    pub fn is_csc(&self) -> bool {
        matches!(self, CompressedSparseFormat::Csc)
    }
    /// Returns boolean if it's CSR
    pub fn is_csr(&self) -> bool {
        matches!(self, CompressedSparseFormat::Csr)
    }
}

/// Structure to store compressed sparse data of either type
///
/// ### Fields
///
/// * `data` - The values
/// * `indices` - The indices of the values
/// * `indptr` - The index pointers
/// * `cs_type` - Is the data stored in `Csr` or `Csc`.
/// * `shape` - The shape of the underlying matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedSparseData<T>
where
    T: Clone + Float,
{
    pub data: Vec<T>,
    pub indices: Vec<usize>,
    pub indptr: Vec<usize>,
    pub cs_type: CompressedSparseFormat,
    pub shape: (usize, usize),
}

impl<T> CompressedSparseData<T>
where
    T: Clone + Sync + Add + PartialEq + Mul + Float,
{
    /// Generate a new CSC version of the matrix
    ///
    /// ### Params
    ///
    /// * `data` - The underlying data
    /// * `indices` - The index positions (in this case row indices)
    /// * `indptr` - The index pointer (in this case the column index pointers)
    /// * `shape` - `(nrow, ncol)`
    pub fn new_csc(data: &[T], indices: &[usize], indptr: &[usize], shape: (usize, usize)) -> Self {
        Self {
            data: data.to_vec(),
            indices: indices.to_vec(),
            indptr: indptr.to_vec(),
            cs_type: CompressedSparseFormat::Csc,
            shape,
        }
    }

    /// Returns the shape of the matrix as `(nrow, ncol)`
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Returns the number of stored entries
    pub fn get_nnz(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of rows
    pub fn nrows(&self) -> usize {
        self.shape.0
    }

    /// Returns the number of columns
    pub fn ncols(&self) -> usize {
        self.shape.1
    }

    /// Number of compressed slices (columns for CSC, rows for CSR)
    fn n_major(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }
}

/// Transforms a CompressedSparseData that is CSC to CSR
///
/// Column indices within each output row come out sorted.
///
/// ### Params
///
/// * `sparse_data` - The CompressedSparseData you want to transform
///
/// ### Returns
///
/// The data in CSR format
pub fn csc_to_csr<T>(sparse_data: &CompressedSparseData<T>) -> CompressedSparseData<T>
where
    T: Clone + Sync + Add + PartialEq + Mul + Float,
{
    if sparse_data.cs_type.is_csr() {
        return sparse_data.clone();
    }

    let (nrow, _) = sparse_data.shape();
    let nnz = sparse_data.get_nnz();
    let mut row_ptr = vec![0; nrow + 1];

    for &r in &sparse_data.indices {
        row_ptr[r + 1] += 1;
    }

    for i in 0..nrow {
        row_ptr[i + 1] += row_ptr[i];
    }

    let mut csr_data = vec![T::zero(); nnz];
    let mut csr_col_ind = vec![0; nnz];
    let mut next = row_ptr[..nrow].to_vec();

    for col in 0..sparse_data.n_major() {
        for idx in sparse_data.indptr[col]..sparse_data.indptr[col + 1] {
            let row = sparse_data.indices[idx];
            let pos = next[row];

            csr_data[pos] = sparse_data.data[idx];
            csr_col_ind[pos] = col;

            next[row] += 1;
        }
    }

    CompressedSparseData {
        data: csr_data,
        indices: csr_col_ind,
        indptr: row_ptr,
        cs_type: CompressedSparseFormat::Csr,
        shape: sparse_data.shape(),
    }
}

////////////////
// Conversion //
////////////////

/// Convert a square COO CoordinateList to CSC CompressedSparseData
///
/// Entries are sorted by column, then by row. Duplicate coordinates are
/// kept as separate entries, so callers should pass deduplicated input.
///
/// ### Params
///
/// * `graph` - Input graph in COO format
///
/// ### Returns
///
/// Matrix in CSC format with shape (n_samples, n_samples), or an error if
/// the index arrays are ragged or point outside the matrix.
pub fn coo_to_csc<T>(graph: &CoordinateList<T>) -> Result<CompressedSparseData<T>>
where
    T: Float + Send + Sync,
{
    let n = graph.n_samples;
    let nnz = graph.values.len();

    for (what, actual) in [
        ("coo row indices", graph.row_indices.len()),
        ("coo column indices", graph.col_indices.len()),
    ] {
        if actual != nnz {
            return Err(UmapError::ShapeMismatch {
                what,
                expected: nnz,
                actual,
            });
        }
    }
    if let Some((r, c)) = graph
        .row_indices
        .iter()
        .zip(&graph.col_indices)
        .find(|(&r, &c)| r >= n || c >= n)
    {
        return Err(UmapError::InvalidArgument(format!(
            "coo entry ({}, {}) is out of bounds for {} vertices",
            r, c, n
        )));
    }

    let mut triplets: Vec<(usize, usize, T)> = (0..nnz)
        .into_par_iter()
        .map(|i| (graph.row_indices[i], graph.col_indices[i], graph.values[i]))
        .collect();

    triplets.par_sort_unstable_by(|(r1, c1, _), (r2, c2, _)| c1.cmp(c2).then(r1.cmp(r2)));

    let mut data = Vec::with_capacity(nnz);
    let mut indices = Vec::with_capacity(nnz);
    let mut indptr = vec![0; n + 1];

    for &(r, c, v) in triplets.iter() {
        data.push(v);
        indices.push(r);
        indptr[c + 1] += 1;
    }

    for i in 0..n {
        indptr[i + 1] += indptr[i];
    }

    Ok(CompressedSparseData::new_csc(&data, &indices, &indptr, (n, n)))
}

/////////////////////////
// FuzzySimplicialSet  //
/////////////////////////

/// The symmetric fuzzy topological representation of a dataset
///
/// An N x N sparse matrix in CSC format whose entry (i, j) is the probability
/// that i and j are locally connected. The only way to build one is through
/// [`FuzzySimplicialSet::new`], which checks that the matrix is exactly
/// symmetric, has an empty diagonal and only stores weights in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzySimplicialSet<T>
where
    T: Clone + Float,
{
    csc: CompressedSparseData<T>,
}

impl<T> FuzzySimplicialSet<T>
where
    T: Float + Send + Sync,
{
    /// Wrap a CSC matrix after validating the fuzzy simplicial set invariants
    ///
    /// ### Params
    ///
    /// * `csc` - Square matrix in CSC format with row indices sorted within
    ///   each column.
    ///
    /// ### Returns
    ///
    /// The validated set or the first violated invariant.
    pub fn new(csc: CompressedSparseData<T>) -> Result<Self> {
        if csc.cs_type.is_csr() {
            return Err(UmapError::InvalidArgument(
                "fuzzy simplicial set must be stored as CSC".to_string(),
            ));
        }

        let (nrow, ncol) = csc.shape();
        if nrow != ncol {
            return Err(UmapError::ShapeMismatch {
                what: "fuzzy simplicial set columns",
                expected: nrow,
                actual: ncol,
            });
        }
        let malformed = csc.indptr.len() != ncol + 1
            || csc.indices.len() != csc.data.len()
            || csc.indptr.first() != Some(&0)
            || csc.indptr.last() != Some(&csc.data.len())
            || csc.indptr.windows(2).any(|w| w[0] > w[1]);
        if malformed {
            return Err(UmapError::InvalidArgument(
                "malformed CSC structure: indptr must start at 0, be non-decreasing and end at nnz"
                    .to_string(),
            ));
        }

        for col in 0..ncol {
            let range = csc.indptr[col]..csc.indptr[col + 1];
            let mut prev: Option<usize> = None;
            for idx in range {
                let row = csc.indices[idx];
                if row >= nrow || prev.is_some_and(|p| p >= row) {
                    return Err(UmapError::InvalidArgument(format!(
                        "row indices of column {} must be sorted, unique and < {}",
                        col, nrow
                    )));
                }
                prev = Some(row);

                if row == col {
                    return Err(UmapError::NonZeroDiagonal { vertex: col });
                }
                let w = csc.data[idx];
                if !(w >= T::zero() && w <= T::one()) {
                    return Err(UmapError::WeightOutOfRange { row, col });
                }
            }
        }

        // a symmetric matrix has identical CSC and CSR arrays
        let csr = csc_to_csr(&csc);
        for major in 0..ncol {
            let a = csc.indptr[major]..csc.indptr[major + 1];
            let b = csr.indptr[major]..csr.indptr[major + 1];
            let a_len = a.len();
            let b_len = b.len();
            for k in 0..a_len.max(b_len) {
                let lhs = (k < a_len).then(|| (csc.indices[a.start + k], csc.data[a.start + k]));
                let rhs = (k < b_len).then(|| (csr.indices[b.start + k], csr.data[b.start + k]));
                if lhs != rhs {
                    let other = match (lhs, rhs) {
                        (Some((i, _)), Some((j, _))) => i.min(j),
                        (Some((i, _)), None) => i,
                        (None, Some((j, _))) => j,
                        (None, None) => major,
                    };
                    return Err(UmapError::AsymmetricGraph {
                        row: other,
                        col: major,
                    });
                }
            }
        }

        Ok(Self { csc })
    }

    /// Build from a COO list (which must not contain duplicate coordinates)
    pub fn from_coo(coo: &CoordinateList<T>) -> Result<Self> {
        Self::new(coo_to_csc(coo)?)
    }

    /// Number of vertices (points)
    pub fn n_vertices(&self) -> usize {
        self.csc.ncols()
    }

    /// Number of stored entries; every undirected edge is stored twice
    pub fn n_entries(&self) -> usize {
        self.csc.get_nnz()
    }

    /// Underlying compressed sparse column storage
    pub fn as_csc(&self) -> &CompressedSparseData<T> {
        &self.csc
    }

    /// Membership strength of (row, col); zero if not stored
    pub fn get(&self, row: usize, col: usize) -> T {
        let range = self.csc.indptr[col]..self.csc.indptr[col + 1];
        match self.csc.indices[range.clone()].binary_search(&row) {
            Ok(pos) => self.csc.data[range.start + pos],
            Err(_) => T::zero(),
        }
    }

    /// Iterate over stored entries as `(row, col, weight)` in column-major
    /// order
    pub fn iter_entries(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.n_vertices()).flat_map(move |col| {
            (self.csc.indptr[col]..self.csc.indptr[col + 1])
                .map(move |idx| (self.csc.indices[idx], col, self.csc.data[idx]))
        })
    }

    /// Weighted degree (row sum) of every vertex
    pub fn degrees(&self) -> Vec<T> {
        // symmetric, so column sums equal row sums
        (0..self.n_vertices())
            .map(|col| {
                self.csc.data[self.csc.indptr[col]..self.csc.indptr[col + 1]]
                    .iter()
                    .fold(T::zero(), |acc, &w| acc + w)
            })
            .collect()
    }

    /// Convert back to a coordinate list
    pub fn to_coo(&self) -> CoordinateList<T> {
        let mut coo = CoordinateList::with_capacity(self.n_vertices(), self.n_entries());
        for (i, j, w) in self.iter_entries() {
            coo.push(i, j, w);
        }
        coo
    }

    /// Dense row-major copy. Only sensible for small graphs.
    pub fn to_dense(&self) -> Vec<Vec<T>> {
        let n = self.n_vertices();
        let mut dense = vec![vec![T::zero(); n]; n];
        for (i, j, w) in self.iter_entries() {
            dense[i][j] = w;
        }
        dense
    }
}

///////////////
// Embedding //
///////////////

/// Dense low-dimensional coordinates, `n_components x n_samples`
///
/// Each point is one contiguous column of length `n_components`, so the
/// buffer is laid out point by point.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding<T> {
    data: Vec<T>,
    n_components: usize,
    n_samples: usize,
}

impl<T> Embedding<T>
where
    T: Float,
{
    /// Zero-initialised embedding
    pub fn zeros(n_components: usize, n_samples: usize) -> Self {
        Self {
            data: vec![T::zero(); n_components * n_samples],
            n_components,
            n_samples,
        }
    }

    /// Build from a function of `(component, sample)`
    pub fn from_fn<F>(n_components: usize, n_samples: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut data = Vec::with_capacity(n_components * n_samples);
        for i in 0..n_samples {
            for d in 0..n_components {
                data.push(f(d, i));
            }
        }
        Self {
            data,
            n_components,
            n_samples,
        }
    }

    /// Build from per-point coordinates (`points[i][d]`)
    ///
    /// ### Returns
    ///
    /// The embedding or a shape error if the points are ragged.
    pub fn from_points(points: &[Vec<T>]) -> Result<Self> {
        let n_components = points.first().map_or(0, |p| p.len());
        let mut data = Vec::with_capacity(n_components * points.len());
        for p in points {
            if p.len() != n_components {
                return Err(UmapError::ShapeMismatch {
                    what: "embedding point",
                    expected: n_components,
                    actual: p.len(),
                });
            }
            data.extend_from_slice(p);
        }
        Ok(Self {
            data,
            n_components,
            n_samples: points.len(),
        })
    }

    /// Number of output dimensions
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Number of points
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Coordinates of point `i`
    #[inline(always)]
    pub fn column(&self, i: usize) -> &[T] {
        let base = i * self.n_components;
        &self.data[base..base + self.n_components]
    }

    /// Mutable coordinates of point `i`
    #[inline(always)]
    pub fn column_mut(&mut self, i: usize) -> &mut [T] {
        let base = i * self.n_components;
        &mut self.data[base..base + self.n_components]
    }

    /// Coordinate `d` of point `i`
    #[inline(always)]
    pub fn get(&self, d: usize, i: usize) -> T {
        self.data[i * self.n_components + d]
    }

    /// Flat point-major buffer
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Flat point-major buffer, mutable
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Largest absolute coordinate value
    pub fn max_abs(&self) -> T {
        self.data
            .iter()
            .fold(T::zero(), |acc, &x| if x.abs() > acc { x.abs() } else { acc })
    }

    /// Squared Euclidean distance between points `i` and `j`
    #[inline(always)]
    pub fn squared_dist(&self, i: usize, j: usize) -> T {
        self.column(i)
            .iter()
            .zip(self.column(j))
            .fold(T::zero(), |acc, (&x, &y)| acc + (x - y) * (x - y))
    }

    /// Export as `[n_components][n_samples]`
    pub fn to_components(&self) -> Vec<Vec<T>> {
        (0..self.n_components)
            .map(|d| (0..self.n_samples).map(|i| self.get(d, i)).collect())
            .collect()
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test_data_struct {
    use super::*;

    fn triangle() -> CoordinateList<f64> {
        CoordinateList {
            row_indices: vec![0, 1, 0, 2, 1, 2],
            col_indices: vec![1, 0, 2, 0, 2, 1],
            values: vec![0.5, 0.5, 0.25, 0.25, 1.0, 1.0],
            n_samples: 3,
        }
    }

    #[test]
    fn test_coordinate_list_edge_list_and_transpose() {
        let graph = CoordinateList {
            row_indices: vec![0, 0, 1, 2],
            col_indices: vec![1, 2, 2, 0],
            values: vec![1.0, 2.0, 3.0, 4.0],
            n_samples: 3,
        };

        let edges = graph.to_edge_list();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[0], (0, 1, 1.0));
        assert_eq!(edges[3], (2, 0, 4.0));

        let t = graph.transpose();
        assert_eq!(t.to_edge_list()[3], (0, 2, 4.0));
        assert_eq!(t.get_size(), 4);
    }

    #[test]
    fn test_csc_to_csr_conversion() {
        // [1.0  0   2.0]
        // [0    3.0 0  ]
        // [4.0  0   5.0]
        let data = vec![1.0, 4.0, 3.0, 2.0, 5.0];
        let indices = vec![0, 2, 1, 0, 2];
        let indptr = vec![0, 2, 3, 5];

        let csc = CompressedSparseData::new_csc(&data, &indices, &indptr, (3, 3));
        let csr = csc_to_csr(&csc);

        assert!(csr.cs_type.is_csr());
        assert_eq!(csr.shape(), (3, 3));
        assert_eq!(csr.indptr, vec![0, 2, 3, 5]);
        assert_eq!(csr.indices, vec![0, 2, 1, 0, 2]);
        assert_eq!(csr.data, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_coo_to_csc_sorting_and_gaps() {
        let graph = CoordinateList {
            row_indices: vec![2, 0, 1],
            col_indices: vec![3, 3, 0],
            values: vec![3.0, 2.0, 1.0],
            n_samples: 4,
        };

        let csc = coo_to_csc(&graph).unwrap();

        assert!(csc.cs_type.is_csc());
        assert_eq!(csc.indptr, vec![0, 1, 1, 1, 3]);
        assert_eq!(csc.indices, vec![1, 0, 2]);
        assert_eq!(csc.data, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fuzzy_simplicial_set_accepts_symmetric() {
        let fss = FuzzySimplicialSet::from_coo(&triangle()).unwrap();

        assert_eq!(fss.n_vertices(), 3);
        assert_eq!(fss.n_entries(), 6);
        assert_eq!(fss.get(0, 1), 0.5);
        assert_eq!(fss.get(2, 1), 1.0);
        assert_eq!(fss.get(1, 1), 0.0);
        assert_eq!(fss.degrees(), vec![0.75, 1.5, 1.25]);

        let entries: Vec<_> = fss.iter_entries().collect();
        assert_eq!(entries[0], (1, 0, 0.5));
        assert_eq!(entries.len(), 6);
    }

    #[test]
    fn test_fuzzy_simplicial_set_rejects_asymmetric() {
        let mut coo = triangle();
        coo.values[0] = 0.75;

        let err = FuzzySimplicialSet::from_coo(&coo).unwrap_err();
        assert!(matches!(err, UmapError::AsymmetricGraph { .. }));

        // missing mirror entry
        let coo = CoordinateList {
            row_indices: vec![0],
            col_indices: vec![1],
            values: vec![0.5],
            n_samples: 2,
        };
        let err = FuzzySimplicialSet::from_coo(&coo).unwrap_err();
        assert_eq!(err, UmapError::AsymmetricGraph { row: 1, col: 0 });
    }

    #[test]
    fn test_fuzzy_simplicial_set_rejects_diagonal_and_range() {
        let mut coo = triangle();
        coo.push(1, 1, 0.5);
        let err = FuzzySimplicialSet::from_coo(&coo).unwrap_err();
        assert_eq!(err, UmapError::NonZeroDiagonal { vertex: 1 });

        let mut coo = triangle();
        coo.values[4] = 1.5;
        coo.values[5] = 1.5;
        let err = FuzzySimplicialSet::from_coo(&coo).unwrap_err();
        assert!(matches!(err, UmapError::WeightOutOfRange { .. }));
    }

    #[test]
    fn test_coo_to_csc_rejects_out_of_bounds() {
        let coo = CoordinateList {
            row_indices: vec![0, 5],
            col_indices: vec![5, 0],
            values: vec![0.5, 0.5],
            n_samples: 2,
        };

        assert!(matches!(
            coo_to_csc(&coo),
            Err(UmapError::InvalidArgument(_))
        ));
        assert!(matches!(
            FuzzySimplicialSet::from_coo(&coo),
            Err(UmapError::InvalidArgument(_))
        ));

        let ragged = CoordinateList {
            row_indices: vec![0, 1],
            col_indices: vec![1],
            values: vec![0.5, 0.5],
            n_samples: 2,
        };
        assert!(matches!(
            coo_to_csc(&ragged),
            Err(UmapError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_fuzzy_simplicial_set_rejects_malformed_csc() {
        // indptr does not end at nnz
        let csc = CompressedSparseData::new_csc(&[0.5, 0.5], &[1, 0], &[0, 1, 3], (2, 2));
        assert!(matches!(
            FuzzySimplicialSet::new(csc),
            Err(UmapError::InvalidArgument(_))
        ));

        // decreasing indptr
        let csc = CompressedSparseData::new_csc(&[0.5, 0.5], &[1, 0], &[0, 2, 1, 2], (3, 3));
        assert!(matches!(
            FuzzySimplicialSet::new(csc),
            Err(UmapError::InvalidArgument(_))
        ));

        // indptr not starting at zero
        let csc = CompressedSparseData::new_csc(&[0.5, 0.5], &[1, 0], &[1, 1, 2], (2, 2));
        assert!(matches!(
            FuzzySimplicialSet::new(csc),
            Err(UmapError::InvalidArgument(_))
        ));

        // CSR input is refused
        let csr = csc_to_csr(&CompressedSparseData::new_csc(
            &[0.5, 0.5],
            &[1, 0],
            &[0, 1, 2],
            (2, 2),
        ));
        assert!(matches!(
            FuzzySimplicialSet::new(csr),
            Err(UmapError::InvalidArgument(_))
        ));

        let valid = CompressedSparseData::new_csc(&[0.5, 0.5], &[1, 0], &[0, 1, 2], (2, 2));
        assert!(FuzzySimplicialSet::new(valid).is_ok());
    }

    #[test]
    fn test_embedding_layout() {
        let embd = Embedding::from_fn(2, 3, |d, i| (10 * i + d) as f64);

        assert_eq!(embd.n_components(), 2);
        assert_eq!(embd.n_samples(), 3);
        assert_eq!(embd.column(1), &[10.0, 11.0]);
        assert_eq!(embd.get(1, 2), 21.0);
        assert_eq!(embd.max_abs(), 21.0);
        assert_eq!(embd.squared_dist(0, 1), 200.0);
        assert_eq!(
            embd.to_components(),
            vec![vec![0.0, 10.0, 20.0], vec![1.0, 11.0, 21.0]]
        );

        let from_points = Embedding::from_points(&[vec![0.0, 1.0], vec![10.0, 11.0]]).unwrap();
        assert_eq!(from_points.column(1), &[10.0, 11.0]);
        assert!(Embedding::from_points(&[vec![0.0, 1.0], vec![1.0]]).is_err());
    }
}
