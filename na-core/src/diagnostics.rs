//! Consistency checks for linearized models.

use nd::prelude::*;

use crate::error::{check_dim, Error, Result};
use crate::LinearizedModel;

/// Returns `(<M' du, ad>, <du, M'^T ad>)` linearized around `u`.
pub fn adjoint_inner_products<M>(model: &M,
                                 u: ArrayView1<f64>,
                                 du: ArrayView1<f64>,
                                 ad: ArrayView1<f64>) -> Result<(f64, f64)>
  where M: LinearizedModel<f64> + ?Sized,
{
  let n = model.state_dim();
  check_dim(n, u.len())?;
  check_dim(n, du.len())?;
  check_dim(n, ad.len())?;

  let tl = model.step_tan(u, du);
  let adj = model.step_adj(u, ad);
  Ok((tl.dot(&ad), du.dot(&adj)))
}

/// Fails with `NumericalInconsistency` when the tangent linear and adjoint
/// steps disagree by more than `tolerance`, relative to the larger inner product.
pub fn check_adjoint<M>(model: &M,
                        u: ArrayView1<f64>,
                        du: ArrayView1<f64>,
                        ad: ArrayView1<f64>,
                        tolerance: f64) -> Result<()>
  where M: LinearizedModel<f64> + ?Sized,
{
  let (lhs, rhs) = adjoint_inner_products(model, u, du, ad)?;
  let scale = lhs.abs().max(rhs.abs());
  debug!("adjoint check: lhs = {:e}, rhs = {:e}", lhs, rhs);
  if (lhs - rhs).abs() > tolerance * scale {
    return Err(Error::NumericalInconsistency {
      lhs: lhs,
      rhs: rhs,
      tolerance: tolerance,
    });
  }
  Ok(())
}

/// `||M(u + e du) - M(u)|| / ||e M'(u) du||` for each `e`. Tends to 1 as `e`
/// shrinks when the tangent linear step is consistent with the model.
pub fn tangent_linear_ratios<M>(model: &M,
                                u: ArrayView1<f64>,
                                du: ArrayView1<f64>,
                                epsilons: &[f64]) -> Result<Vec<f64>>
  where M: LinearizedModel<f64> + ?Sized,
{
  let n = model.state_dim();
  check_dim(n, u.len())?;
  check_dim(n, du.len())?;

  let base = model.step(u);
  let tl = model.step_tan(u, du);
  let tl_norm = tl.dot(&tl).sqrt();

  let ratios = epsilons.iter()
    .map(|&e| {
      let perturbed = &u + &(&du * e);
      let diff = model.step(perturbed.view()) - &base;
      diff.dot(&diff).sqrt() / (e.abs() * tl_norm)
    })
    .collect();
  Ok(ratios)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::Model;

  /// `u' = u^2` elementwise, with an optionally mis-scaled adjoint.
  struct Square {
    adj_scale: f64,
  }
  impl Model<f64> for Square {
    fn state_dim(&self) -> usize { 4 }
    fn step(&self, u: ArrayView1<f64>) -> Array1<f64> { u.mapv(|v| v * v) }
  }
  impl LinearizedModel<f64> for Square {
    fn step_tan(&self, u: ArrayView1<f64>, du: ArrayView1<f64>) -> Array1<f64> {
      &u * &du * 2.0
    }
    fn step_adj(&self, u: ArrayView1<f64>, ad: ArrayView1<f64>) -> Array1<f64> {
      &u * &ad * (2.0 * self.adj_scale)
    }
  }

  #[test]
  fn consistent_adjoint_passes() {
    let m = Square { adj_scale: 1.0 };
    let u = array![0.5, -1.0, 2.0, 0.25];
    let du = array![1.0, 0.5, -0.5, 2.0];
    let ad = array![0.3, -0.7, 1.1, 0.2];
    check_adjoint(&m, u.view(), du.view(), ad.view(), 1e-12).unwrap();
  }

  #[test]
  fn wrong_adjoint_is_reported() {
    let m = Square { adj_scale: 1.5 };
    let u = array![0.5, -1.0, 2.0, 0.25];
    let du = array![1.0, 0.5, -0.5, 2.0];
    let ad = array![0.3, -0.7, 1.1, 0.2];
    match check_adjoint(&m, u.view(), du.view(), ad.view(), 1e-8) {
      Err(Error::NumericalInconsistency { lhs, rhs, .. }) => {
        assert!((rhs - 1.5 * lhs).abs() < 1e-12);
      },
      r => panic!("unexpected: {:?}", r),
    }
  }

  #[test]
  fn tangent_linear_ratios_approach_one() {
    let m = Square { adj_scale: 1.0 };
    let u = array![0.5, -1.0, 2.0, 0.25];
    let du = array![1.0, 0.5, -0.5, 2.0];
    let r = tangent_linear_ratios(&m, u.view(), du.view(), &[1e-2, 1e-4, 1e-6])
      .unwrap();
    let err: Vec<f64> = r.iter().map(|r| (r - 1.0).abs()).collect();
    assert!(err[1] < err[0]);
    assert!(err[2] < 1e-4);
  }

  #[test]
  fn dimension_mismatch() {
    let m = Square { adj_scale: 1.0 };
    let u = array![0.5, -1.0];
    let r = check_adjoint(&m, u.view(), u.view(), u.view(), 1e-8);
    assert_eq!(r, Err(Error::DimensionMismatch { expected: 4, found: 2 }));
  }
}
