use nd::{Array, ArrayBase, Data, Ix2};
use num_traits::Float;

use super::{symmetrize, LinalgError, SymmetricEigen};

pub trait SymmetricSqrt {
  type Output;
  /// Symmetric square root `S` of a symmetric positive semi-definite
  /// matrix: `S S = S S^T = A`. Eigenvalues that rounding pushed below
  /// zero are clamped to zero.
  fn sqrt_psd(&self) -> Result<Self::Output, LinalgError>;
}

impl<S, F> SymmetricSqrt for ArrayBase<S, Ix2>
  where S: Data<Elem = F>,
        F: Float + 'static,
{
  type Output = Array<F, Ix2>;

  fn sqrt_psd(&self) -> Result<Array<F, Ix2>, LinalgError> {
    let sym = symmetrize(self)?;
    let eigen = SymmetricEigen::new(&sym)?;
    let root = eigen.reconstruct_with(|d| {
      if d > F::zero() { d.sqrt() } else { F::zero() }
    });
    // the reconstruction is symmetric only up to rounding
    symmetrize(&root)
  }
}
