use crate::error::{SimError, SimResult};
use ndarray::ArrayView2;
use std::{fmt::Debug, ops::RangeBounds};

pub fn check_num<T, R>(num: T, range: R) -> SimResult<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        return Err(SimError::config(format!(
            "number must be in the range {range:?}, but is {num:?}"
        )));
    }

    Ok(())
}

/// Check that a matrix has the expected shape and, for coupling matrices,
/// that every row sums to zero.
pub fn check_mat(mat: ArrayView2<f64>, exp_dim: (usize, usize), coupling: bool) -> SimResult<()> {
    let dim = mat.dim();
    if dim != exp_dim {
        return Err(SimError::config(format!(
            "matrix shape must be {exp_dim:?}, but is {dim:?}"
        )));
    }

    if !coupling {
        return Ok(());
    }
    let tol = 1e-12;
    for (i_row, row) in mat.outer_iter().enumerate() {
        let sum = row.sum();
        if sum.abs() > tol {
            return Err(SimError::config(format!(
                "row {i_row} must sum to 0.0 (tolerance: {tol}), but sums to {sum}"
            )));
        }
    }

    Ok(())
}

/// `num` evenly spaced values over `[start, end]`, endpoints included.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}
