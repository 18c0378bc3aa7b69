use faer::Mat;
use rand::Rng;

use crate::debug_assert_same_len;
use crate::error::SpectralError;

/////////////
// Globals //
/////////////

/// Relative norm below which an orthogonalised vector counts as dependent
const BREAKDOWN_TOL: f64 = 1e-8;
/// Attempts at drawing a random vector that is independent of the basis
const MAX_RANDOM_DRAWS: usize = 16;

//////////////////////
// Vector utilities //
//////////////////////

/// Dot product of two vectors
///
/// Summation order is fixed; the eigensolver relies on it for reproducible
/// output.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_same_len!(a, b);
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

/// Euclidean norm of a vector
#[inline]
pub fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Scale `v` to unit length in place
///
/// ### Returns
///
/// The norm before scaling. Zero vectors are left untouched.
pub fn normalise(v: &mut [f64]) -> f64 {
    let n = norm(v);
    if n > 0.0 {
        v.iter_mut().for_each(|x| *x /= n);
    }
    n
}

/// `y += alpha * x`
#[inline]
fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_same_len!(x, y);
    y.iter_mut().zip(x).for_each(|(y, &x)| *y += alpha * x);
}

/// Orthogonalise `v` against an orthonormal basis
///
/// Classical Gram-Schmidt applied twice (CGS2).
///
/// ### Params
///
/// * `v` - Vector to orthogonalise in place
/// * `basis` - Orthonormal vectors of the same length as `v`
///
/// ### Returns
///
/// Norm of the remainder relative to the norm of the input (0 for a zero
/// input).
pub fn orthogonalise(v: &mut [f64], basis: &[Vec<f64>]) -> f64 {
    let start = norm(v);
    if start == 0.0 {
        return 0.0;
    }
    for _ in 0..2 {
        for b in basis {
            let c = dot(v, b);
            axpy(-c, b, v);
        }
    }
    norm(v) / start
}

/// Linear combinations `sum_r coeffs[c][r] * vectors[r]` for each column `c`
fn combine(vectors: &[Vec<f64>], coeffs: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = vectors.first().map_or(0, |v| v.len());
    coeffs
        .iter()
        .map(|col| {
            let mut out = vec![0.0; n];
            for (v, &c) in vectors.iter().zip(col) {
                axpy(c, v, &mut out);
            }
            out
        })
        .collect()
}

/////////////////////
// Symmetric eigen //
/////////////////////

/// Leading eigenpairs of a symmetric operator
///
/// ### Fields
///
/// * `values` - Eigenvalues in descending order
/// * `vectors` - Unit eigenvectors, `vectors[i]` belongs to `values[i]`
#[derive(Clone, Debug)]
pub struct EigenPairs {
    pub values: Vec<f64>,
    pub vectors: Vec<Vec<f64>>,
}

/// Parameters of the restarted block Krylov solver
///
/// ### Fields
///
/// * `nev` - Number of wanted eigenpairs
/// * `basis_size` - Maximum dimension of the search space before a restart
/// * `tol` - Residual norm `||A x - theta x||` below which a pair counts as
///   converged
/// * `max_iter` - Maximum number of Rayleigh-Ritz cycles
#[derive(Clone, Debug)]
pub struct KrylovParams {
    pub nev: usize,
    pub basis_size: usize,
    pub tol: f64,
    pub max_iter: usize,
}

impl KrylovParams {
    /// Default search space dimension `max(2 * nev + 1, round(sqrt(n)))`,
    /// capped at `n`
    pub fn basis_size_for(n: usize, nev: usize) -> usize {
        (2 * nev + 1)
            .max((n as f64).sqrt().round() as usize)
            .min(n)
    }
}

/// Dense Rayleigh-Ritz projection of the operator onto the current basis
///
/// ### Returns
///
/// Tuple of `(theta, coeffs)` with the Ritz values in descending order and
/// `coeffs[c]` the coordinates of Ritz vector `c` in the basis.
fn rayleigh_ritz(
    basis: &[Vec<f64>],
    images: &[Vec<f64>],
) -> Result<(Vec<f64>, Vec<Vec<f64>>), SpectralError> {
    let k = basis.len();
    let mut h = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in i..k {
            // average both triangles so rounding cannot break symmetry
            let v = 0.5 * (dot(&basis[i], &images[j]) + dot(&basis[j], &images[i]));
            h[i][j] = v;
            h[j][i] = v;
        }
    }

    let h = Mat::<f64>::from_fn(k, k, |i, j| h[i][j]);
    let eig = h
        .self_adjoint_eigen(faer::Side::Lower)
        .map_err(|e| SpectralError::DenseSolver(format!("{:?}", e)))?;
    let evals: Vec<f64> = eig.S().column_vector().iter().copied().collect();
    let evecs = eig.U().to_owned();

    // faer sorts ascending
    let theta: Vec<f64> = evals.iter().rev().copied().collect();
    let coeffs: Vec<Vec<f64>> = (0..k)
        .rev()
        .map(|c| (0..k).map(|r| evecs[(r, c)]).collect())
        .collect();

    Ok((theta, coeffs))
}

/// Orthonormalise `v` against `basis` and append it together with its image
///
/// ### Returns
///
/// `false` if `v` was numerically dependent on the basis.
fn extend_basis<F>(
    mut v: Vec<f64>,
    basis: &mut Vec<Vec<f64>>,
    images: &mut Vec<Vec<f64>>,
    matvec: &F,
) -> bool
where
    F: Fn(&[f64], &mut [f64]),
{
    if orthogonalise(&mut v, basis) <= BREAKDOWN_TOL {
        return false;
    }
    normalise(&mut v);
    let mut av = vec![0.0; v.len()];
    matvec(&v, &mut av);
    basis.push(v);
    images.push(av);
    true
}

/// Append a random direction drawn uniformly from `[-0.5, 0.5)^n`
fn extend_random<F, R>(
    n: usize,
    basis: &mut Vec<Vec<f64>>,
    images: &mut Vec<Vec<f64>>,
    matvec: &F,
    rng: &mut R,
) -> bool
where
    F: Fn(&[f64], &mut [f64]),
    R: Rng,
{
    (0..MAX_RANDOM_DRAWS).any(|_| {
        let v: Vec<f64> = (0..n).map(|_| rng.random::<f64>() - 0.5).collect();
        extend_basis(v, basis, images, matvec)
    })
}

/// Largest eigenpairs of a symmetric operator via restarted block Krylov
///
/// Starts from a block of `nev` random vectors, so eigenvalues of
/// multiplicity up to `nev` are resolved. Each cycle projects the operator
/// onto the orthonormal basis (Rayleigh-Ritz, solved densely with faer) and
/// extends the basis with the residuals of the unconverged wanted Ritz pairs.
/// Once the basis would exceed `basis_size`, it is compressed to its leading
/// `nev + (basis_size - nev) / 2` Ritz vectors.
///
/// ### Params
///
/// * `matvec` - Computes `y = A x` for the symmetric operator `A`
/// * `n` - Dimension of the operator
/// * `params` - Solver parameters
/// * `rng` - Source of the starting block
///
/// ### Returns
///
/// The `nev` largest eigenpairs, or why they could not be computed.
pub fn largest_eigenpairs<F, R>(
    matvec: F,
    n: usize,
    params: &KrylovParams,
    rng: &mut R,
) -> Result<EigenPairs, SpectralError>
where
    F: Fn(&[f64], &mut [f64]),
    R: Rng,
{
    let nev = params.nev;
    if nev == 0 || nev > n {
        return Err(SpectralError::TooFewVertices {
            n_vertices: n,
            required: nev,
        });
    }
    let m = params.basis_size.clamp(nev, n);
    let keep = nev + (m - nev) / 2;

    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(m);
    let mut images: Vec<Vec<f64>> = Vec::with_capacity(m);

    while basis.len() < nev {
        if !extend_random(n, &mut basis, &mut images, &matvec, rng) {
            return Err(SpectralError::NonFinite);
        }
    }

    let mut last_residual = f64::INFINITY;

    for _ in 0..params.max_iter {
        let (theta, coeffs) = rayleigh_ritz(&basis, &images)?;
        let n_ritz = keep.min(basis.len());
        let ritz = combine(&basis, &coeffs[..n_ritz]);
        let ritz_images = combine(&images, &coeffs[..n_ritz]);

        let mut residuals = Vec::with_capacity(nev);
        last_residual = 0.0;
        for i in 0..nev {
            let mut r = ritz_images[i].clone();
            axpy(-theta[i], &ritz[i], &mut r);
            let res = norm(&r);
            last_residual = last_residual.max(res);
            if !(res < params.tol) {
                residuals.push(r);
            }
        }

        if !last_residual.is_finite() {
            return Err(SpectralError::NonFinite);
        }

        if residuals.is_empty() {
            let vectors: Vec<Vec<f64>> = ritz.into_iter().take(nev).collect();
            if vectors.iter().flatten().any(|x| !x.is_finite()) {
                return Err(SpectralError::NonFinite);
            }
            return Ok(EigenPairs {
                values: theta[..nev].to_vec(),
                vectors,
            });
        }

        // thick restart on the leading Ritz vectors
        if basis.len() + residuals.len() > m {
            basis = ritz;
            images = ritz_images;
        }

        let mut added = 0;
        for r in residuals {
            if basis.len() >= m {
                break;
            }
            if extend_basis(r, &mut basis, &mut images, &matvec) {
                added += 1;
            }
        }
        if added == 0 && basis.len() < m {
            extend_random(n, &mut basis, &mut images, &matvec, rng);
        }
    }

    Err(SpectralError::NonConvergence {
        iterations: params.max_iter,
        residual: last_residual,
    })
}

///////////
// Tests //
///////////
