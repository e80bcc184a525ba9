use nd::{Array, ArrayBase, ArrayView, Axis, Data, Ix1, Ix2};
use num_traits::{Float, NumCast};

use super::{square_dim, LinalgError};

/// LU decomposition with partial pivoting, L and U packed together:
/// upper triangle (with diagonal) is U, strict lower triangle is L (unit
/// diagonal implied).
#[derive(Debug, Clone)]
pub struct LuDecomposition<F> {
  lu: Array<F, Ix2>,
  perm: Vec<usize>,
}

impl<F> LuDecomposition<F>
  where F: Float + 'static,
{
  pub fn new<S>(a: &ArrayBase<S, Ix2>) -> Result<LuDecomposition<F>, LinalgError>
    where S: Data<Elem = F>,
  {
    let n = square_dim(a)?;
    let mut lu = a.to_owned();
    let mut perm: Vec<usize> = (0..n).collect();

    // pivots below this are treated as exact zeros
    let scale = lu.iter().fold(F::zero(), |m, v| m.max(v.abs()));
    let tol = scale * F::epsilon() * <F as NumCast>::from(n).unwrap_or_else(F::one);

    for col in 0..n {
      let mut max_row = col;
      let mut max_val = lu[[col, col]].abs();
      for row in col + 1..n {
        let v = lu[[row, col]].abs();
        if v > max_val {
          max_val = v;
          max_row = row;
        }
      }

      if !(max_val > tol) {
        return Err(LinalgError::Singular);
      }

      if max_row != col {
        perm.swap(col, max_row);
        for j in 0..n {
          lu.swap([col, j], [max_row, j]);
        }
      }

      let pivot = lu[[col, col]];
      for row in col + 1..n {
        let factor = lu[[row, col]] / pivot;
        lu[[row, col]] = factor;
        for j in col + 1..n {
          let t = lu[[col, j]];
          lu[[row, j]] = lu[[row, j]] - factor * t;
        }
      }
    }

    Ok(LuDecomposition {
      lu: lu,
      perm: perm,
    })
  }

  pub fn dim(&self) -> usize { self.perm.len() }

  /// Solve `A x = b`.
  pub fn solve_vec(&self, b: ArrayView<F, Ix1>) -> Result<Array<F, Ix1>, LinalgError> {
    let n = self.dim();
    if b.len() != n {
      return Err(LinalgError::DimensionMismatch { expected: n, found: b.len() });
    }
    let mut x: Array<F, Ix1> = Array::zeros(n);

    // forward substitution, Ly = Pb
    for i in 0..n {
      let mut sum = b[self.perm[i]];
      for j in 0..i {
        sum = sum - self.lu[[i, j]] * x[j];
      }
      x[i] = sum;
    }
    // back substitution, Ux = y
    for i in (0..n).rev() {
      let mut sum = x[i];
      for j in i + 1..n {
        sum = sum - self.lu[[i, j]] * x[j];
      }
      x[i] = sum / self.lu[[i, i]];
    }

    Ok(x)
  }

  /// Solve `A X = B` column by column.
  pub fn solve<S>(&self, b: &ArrayBase<S, Ix2>) -> Result<Array<F, Ix2>, LinalgError>
    where S: Data<Elem = F>,
  {
    let mut x = Array::zeros(b.dim());
    for (rhs, mut out) in b.axis_iter(Axis(1)).zip(x.axis_iter_mut(Axis(1))) {
      out.assign(&self.solve_vec(rhs)?);
    }
    Ok(x)
  }

  pub fn inverse(&self) -> Result<Array<F, Ix2>, LinalgError> {
    self.solve(&Array::eye(self.dim()))
  }
}

pub trait Inverse {
  type Output;
  fn inv(&self) -> Result<Self::Output, LinalgError>;
}

impl<S, F> Inverse for ArrayBase<S, Ix2>
  where S: Data<Elem = F>,
        F: Float + 'static,
{
  type Output = Array<F, Ix2>;
  fn inv(&self) -> Result<Array<F, Ix2>, LinalgError> {
    LuDecomposition::new(self)?.inverse()
  }
}
