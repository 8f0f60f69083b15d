use crate::error::{SimError, SimResult};
use crate::utils::{check_mat, check_num};
use ndarray::Array2;

/// Build the fish dispersal coupling matrix.
///
/// Element `[i, j]` is the rate at which fish in patch `j` enter patch `i`.
/// Every patch sends the same fraction `(1 - frac_nomove) / n` to each other
/// patch, so the diagonal holds the matching net outflow and rows sum to zero.
pub fn dispersal_matrix(n: usize, frac_nomove: f64) -> SimResult<Array2<f64>> {
    if n < 1 {
        return Err(SimError::config("number of patches must be at least 1"));
    }
    check_num(frac_nomove, 0.0..=1.0).map_err(|e| e.prefixed("invalid no-movement fraction"))?;

    let frac_dispersed = (1.0 - frac_nomove) / n as f64;
    let outflow = -frac_dispersed * (n - 1) as f64;
    let mat = Array2::from_shape_fn((n, n), |(i, j)| if i == j { outflow } else { frac_dispersed });

    check_mat(mat.view(), (n, n), true)?;

    Ok(mat)
}
