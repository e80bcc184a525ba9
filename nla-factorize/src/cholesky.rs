use nd::{s, Array, ArrayBase, Data, Ix2};
use num_traits::Float;

use super::{square_dim, LinalgError};

pub trait Cholesky {
  type LMatrix: Sized;
  /// Returns the lower triangular factor, L, of A = L L^T.
  fn l_lt(&self) -> Result<Self::LMatrix, LinalgError>;
}

impl<S, F> Cholesky for ArrayBase<S, Ix2>
  where S: Data<Elem = F>,
        F: Float + 'static,
{
  type LMatrix = Array<F, Ix2>;

  fn l_lt(&self) -> Result<Self::LMatrix, LinalgError> {
    let n = square_dim(self)?;
    let mut l: Array<F, Ix2> = Array::zeros((n, n));

    for j in 0..n {
      let d = {
        let lj = l.row(j);
        let lj = lj.slice(s![..j]);
        self[[j, j]] - lj.dot(&lj)
      };
      // also catches NaN
      if !(d > F::zero()) {
        return Err(LinalgError::NotPositiveDefinite);
      }
      let d = d.sqrt();
      l[[j, j]] = d;

      for i in j + 1..n {
        let t = {
          let li = l.row(i);
          let lj = l.row(j);
          self[[i, j]] - li.slice(s![..j]).dot(&lj.slice(s![..j]))
        };
        l[[i, j]] = t / d;
      }
    }

    Ok(l)
  }
}

#[test]
fn cholesky_llt() {
  use nd::arr2;

  let a = arr2(&[
    [4.0, 12.0, -16.0],
    [12.0, 37.0, -43.0],
    [-16.0, -43.0, 98.0],
  ]);

  let l = a.l_lt().expect("cholesky factorization failed");

  let expected = arr2(&[
    [2.0, 0.0, 0.0],
    [6.0, 1.0, 0.0],
    [-8.0, 5.0, 3.0],
  ]);
  assert_eq!(l, expected);
  assert_eq!(l.dot(&l.t()), a);
}

#[test]
fn cholesky_rejects_indefinite() {
  use nd::arr2;

  let a = arr2(&[
    [1.0, 5.0],
    [5.0, 1.0],
  ]);
  assert_eq!(a.l_lt(), Err(LinalgError::NotPositiveDefinite));
}
