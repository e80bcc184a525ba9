#[cfg_attr(test, macro_use)]
extern crate ndarray as nd;
extern crate num_traits;
extern crate thiserror;

use nd::{Array, ArrayBase, Data, Ix2, Zip};
use num_traits::Float;
use thiserror::Error;

pub use cholesky::*;
pub use lu::*;
pub use sqrt::*;
pub use symmetric_eigen::*;

pub mod cholesky;
pub mod lu;
pub mod sqrt;
pub mod symmetric_eigen;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinalgError {
  #[error("expected a square matrix, got {0}x{1}")]
  NotSquare(usize, usize),
  #[error("matrix is singular")]
  Singular,
  #[error("matrix is not positive definite")]
  NotPositiveDefinite,
  #[error("expected length {expected}, found {found}")]
  DimensionMismatch {
    expected: usize,
    found: usize,
  },
  #[error("eigenvalue iteration did not converge after {0} sweeps")]
  ConvergenceFailure(usize),
}

pub(crate) fn square_dim<S>(a: &ArrayBase<S, Ix2>) -> Result<usize, LinalgError>
  where S: Data,
{
  let (n, m) = a.dim();
  if n != m {
    return Err(LinalgError::NotSquare(n, m));
  }
  Ok(n)
}

/// `0.5 * (A + A^T)`. Used after every covariance recomputation so rounding
/// asymmetry can't leak into a square root.
pub fn symmetrize<S, F>(a: &ArrayBase<S, Ix2>) -> Result<Array<F, Ix2>, LinalgError>
  where S: Data<Elem = F>,
        F: Float + 'static,
{
  square_dim(a)?;
  let half = F::one() / (F::one() + F::one());
  let mut out = a.to_owned();
  Zip::from(&mut out)
    .and(&a.t())
    .for_each(|out, &at| {
      *out = (*out + at) * half;
    });
  Ok(out)
}

#[test]
fn symmetrize_averages_the_transpose() {
  use nd::arr2;

  let a = arr2(&[
    [1.0, 2.0],
    [4.0, 3.0],
  ]);
  let s = symmetrize(&a).expect("square");
  assert_eq!(s, arr2(&[[1.0, 3.0], [3.0, 3.0]]));

  let r = arr2(&[[1.0, 2.0, 3.0]]);
  assert_eq!(symmetrize(&r), Err(LinalgError::NotSquare(1, 3)));
}
