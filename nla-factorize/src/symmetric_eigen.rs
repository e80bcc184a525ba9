//! Cyclic Jacobi eigendecomposition for real symmetric matrices.
//!
//! The matrices here are small and dense (one row per grid point), so the
//! O(n^3)-per-sweep cost is irrelevant and Jacobi's accuracy on tiny
//! eigenvalues is worth having: covariance spectra decay by many orders of
//! magnitude.

use nd::{Array, ArrayBase, Data, Ix1, Ix2};
use num_traits::Float;

use super::{square_dim, LinalgError};

pub const MAX_SWEEPS: usize = 100;

#[derive(Debug, Clone)]
pub struct SymmetricEigen<F> {
  /// Ascending.
  pub values: Array<F, Ix1>,
  /// Column `k` is the eigenvector for `values[k]`.
  pub vectors: Array<F, Ix2>,
}

impl<F> SymmetricEigen<F>
  where F: Float + 'static,
{
  /// Only the lower triangle of `a` is trusted to be meaningful; the
  /// caller is expected to have symmetrized it.
  pub fn new<S>(a: &ArrayBase<S, Ix2>) -> Result<SymmetricEigen<F>, LinalgError>
    where S: Data<Elem = F>,
  {
    let n = square_dim(a)?;
    let mut w = a.to_owned();
    let mut v: Array<F, Ix2> = Array::eye(n);

    let two = F::one() + F::one();
    let eps = F::epsilon();
    let norm = w.iter().fold(F::zero(), |acc, &x| acc + x * x).sqrt();
    // off-diagonal entries below either threshold are rounding noise
    let floor = eps * eps * norm;

    let mut converged = false;
    for _ in 0..MAX_SWEEPS {
      let mut rotations = 0usize;

      for p in 0..n {
        for q in p + 1..n {
          let apq = w[[p, q]];
          if apq == F::zero() {
            continue;
          }
          let app = w[[p, p]];
          let aqq = w[[q, q]];
          if apq.abs() <= eps * (app * aqq).abs().sqrt() || apq.abs() <= floor {
            w[[p, q]] = F::zero();
            w[[q, p]] = F::zero();
            continue;
          }
          rotations += 1;

          let theta = (aqq - app) / (two * apq);
          let sign = if theta >= F::zero() { F::one() } else { -F::one() };
          let t = sign / (theta.abs() + (theta * theta + F::one()).sqrt());
          let c = F::one() / (t * t + F::one()).sqrt();
          let s = t * c;

          // W <- J^T W J, V <- V J
          for k in 0..n {
            let wkp = w[[k, p]];
            let wkq = w[[k, q]];
            w[[k, p]] = c * wkp - s * wkq;
            w[[k, q]] = s * wkp + c * wkq;
          }
          for k in 0..n {
            let wpk = w[[p, k]];
            let wqk = w[[q, k]];
            w[[p, k]] = c * wpk - s * wqk;
            w[[q, k]] = s * wpk + c * wqk;
          }
          w[[p, q]] = F::zero();
          w[[q, p]] = F::zero();
          for k in 0..n {
            let vkp = v[[k, p]];
            let vkq = v[[k, q]];
            v[[k, p]] = c * vkp - s * vkq;
            v[[k, q]] = s * vkp + c * vkq;
          }
        }
      }

      if rotations == 0 {
        converged = true;
        break;
      }
    }
    if !converged {
      return Err(LinalgError::ConvergenceFailure(MAX_SWEEPS));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&l, &r| {
      w[[l, l]].partial_cmp(&w[[r, r]])
        .unwrap_or(::std::cmp::Ordering::Equal)
    });

    let values = Array::from_shape_fn(n, |k| w[[order[k], order[k]]]);
    let vectors = Array::from_shape_fn((n, n), |(i, k)| v[[i, order[k]]]);

    Ok(SymmetricEigen {
      values: values,
      vectors: vectors,
    })
  }

  /// `V f(D) V^T`.
  pub fn reconstruct_with<G>(&self, f: G) -> Array<F, Ix2>
    where G: Fn(F) -> F,
  {
    let fd = self.values.mapv(f);
    let mut vd = self.vectors.clone();
    for (mut col, &d) in vd.columns_mut().into_iter().zip(fd.iter()) {
      col.mapv_inplace(|x| x * d);
    }
    vd.dot(&self.vectors.t())
  }
}
