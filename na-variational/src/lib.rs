//! Strong-constraint 4D-Var: cost and adjoint gradient over an assimilation
//! window, and a minimizer to drive them.

#[cfg_attr(test, macro_use)]
extern crate ndarray as nd;
extern crate nla_factorize as nla;
#[macro_use]
extern crate log;
extern crate na_core;
extern crate na_discrete_filtering as na_df;
extern crate thiserror;

#[cfg(test)]
extern crate na_pde;
#[cfg(test)]
extern crate ndarray_rand;
#[cfg(test)]
extern crate rand;
#[cfg(test)]
extern crate rand_distr;
#[cfg(test)]
extern crate rand_isaac;

use nd::prelude::*;
use nla::{Inverse, LinalgError};

use na_core::{check_dim, Error, LinearizedModel, Result, Trajectory};
use na_df::{GaussianCovariance, ObservationOperator};

pub use minimize::{minimize_lbfgs, LbfgsSettings, MinimizeResult, OptimError};

pub mod minimize;

/// A differentiable scalar function of a vector.
pub trait Objective {
  fn dim(&self) -> usize;
  fn cost(&self, x: ArrayView1<f64>) -> Result<f64>;
  fn gradient(&self, x: ArrayView1<f64>) -> Result<Array1<f64>>;

  fn cost_and_gradient(&self, x: ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
    Ok((self.cost(x)?, self.gradient(x)?))
  }
}

pub struct Variational<'a, M>
  where M: LinearizedModel<f64> + ?Sized,
{
  model: &'a M,
  observations: &'a ObservationOperator,
  b: &'a GaussianCovariance,
  background: Array1<f64>,
  r_inv: Array2<f64>,
  precondition: bool,
}

impl<'a, M> Variational<'a, M>
  where M: LinearizedModel<f64> + ?Sized,
{
  /// With `precondition` the control is `v` in `u0 = S v + ub`, `S` the
  /// square root of `b`; otherwise `u0 = v + ub` and `b` must carry its
  /// inverse.
  pub fn new(model: &'a M,
             observations: &'a ObservationOperator,
             b: &'a GaussianCovariance,
             background: ArrayView1<f64>,
             r: ArrayView2<f64>,
             precondition: bool) -> Result<Variational<'a, M>> {
    let n = model.state_dim();
    check_dim(n, background.len())?;
    check_dim(n, observations.nx())?;
    check_dim(n, b.dim())?;
    check_dim(observations.nobs(), r.nrows())?;

    if precondition {
      b.sqrt()?;
    } else {
      b.inverse()?;
    }
    let r_inv = r.inv()
      .map_err(|e| match e {
        LinalgError::Singular => Error::SingularCovariance,
        e => Error::from(e),
      })?;

    Ok(Variational {
      model: model,
      observations: observations,
      b: b,
      background: background.to_owned(),
      r_inv: r_inv,
      precondition: precondition,
    })
  }

  pub fn is_preconditioned(&self) -> bool { self.precondition }
  pub fn background(&self) -> ArrayView1<f64> { self.background.view() }

  /// Initial state for the control `v`.
  pub fn control_to_state(&self, v: ArrayView1<f64>) -> Result<Array1<f64>> {
    check_dim(self.background.len(), v.len())?;
    if self.precondition {
      Ok(self.b.sqrt()?.dot(&v) + &self.background)
    } else {
      Ok(&v + &self.background)
    }
  }

  /// States at steps `0..=nt` starting from the initial state for `v`.
  pub fn analysis_trajectory(&self, v: ArrayView1<f64>) -> Result<Trajectory> {
    let mut u = self.control_to_state(v)?;
    let mut trj = Trajectory::new(u.len());
    trj.push(u.view())?;
    for _ in 0..self.observations.nt() {
      u = self.model.step(u.view());
      trj.push(u.view())?;
    }
    Ok(trj)
  }

  /// `misfit^T R^-1 misfit` at step `t`, zero if unobserved.
  fn observation_cost(&self, t: u64, u: ArrayView1<f64>) -> Result<f64> {
    if !self.observations.is_observed(t) {
      return Ok(0.0);
    }
    let misfit = self.observations.misfit(t, u)
      .ok_or(Error::NotObserved(t))?;
    Ok(misfit.dot(&self.r_inv.dot(&misfit)))
  }
  /// Adds `H^T R^-1 misfit` at step `t` to `ad`.
  fn add_adjoint_forcing(&self, t: u64, u: ArrayView1<f64>,
                         ad: &mut Array1<f64>) -> Result<()> {
    if !self.observations.is_observed(t) {
      return Ok(());
    }
    let misfit = self.observations.misfit(t, u)
      .ok_or(Error::NotObserved(t))?;
    let weighted = self.r_inv.dot(&misfit);
    if let Some(forcing) = self.observations.adjoint_project(t, weighted.view()) {
      *ad += &forcing;
    }
    Ok(())
  }

  /// Nonlinear sweep over the window from the state for `v`, recording the
  /// checkpoints the reverse sweep linearizes around.
  fn forward(&self, v: ArrayView1<f64>) -> Result<ForwardSweep> {
    let n = self.background.len();
    check_dim(n, v.len())?;
    let nt = self.observations.nt();

    let (mut u, jb, gb) = if self.precondition {
      let s = self.b.sqrt()?;
      (s.dot(&v) + &self.background, v.dot(&v), v.to_owned())
    } else {
      let gb = self.b.inverse()?.dot(&v);
      (&v + &self.background, v.dot(&gb), gb)
    };

    let mut checkpoints = Trajectory::new(n);
    let mut jo = 0.0;
    for t in 0..nt {
      checkpoints.push(u.view())?;
      jo += self.observation_cost(t, u.view())?;
      u = self.model.step(u.view());
    }
    jo += self.observation_cost(nt, u.view())?;

    Ok(ForwardSweep {
      cost: 0.5 * (jb + jo),
      background_gradient: gb,
      checkpoints: checkpoints,
      last: u,
    })
  }

  /// Forward sweep followed by the adjoint sweep. The checkpoints live for
  /// the duration of this call.
  fn simulate_with_gradient(&self, v: ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
    let sweep = self.forward(v)?;
    let nt = self.observations.nt();

    let mut ad = Array1::zeros(sweep.last.len());
    self.add_adjoint_forcing(nt, sweep.last.view(), &mut ad)?;
    for (t, u) in sweep.checkpoints.iter().enumerate().rev() {
      ad = self.model.step_adj(u, ad.view());
      self.add_adjoint_forcing(t as u64, u, &mut ad)?;
    }

    let g = if self.precondition {
      self.b.sqrt()?.t().dot(&ad) + &sweep.background_gradient
    } else {
      ad + &sweep.background_gradient
    };
    Ok((sweep.cost, g))
  }
}

struct ForwardSweep {
  cost: f64,
  /// `v` or `B^-1 v`.
  background_gradient: Array1<f64>,
  /// States at steps `0..nt`.
  checkpoints: Trajectory,
  /// State at step `nt`.
  last: Array1<f64>,
}

impl<'a, M> Objective for Variational<'a, M>
  where M: LinearizedModel<f64> + ?Sized,
{
  fn dim(&self) -> usize { self.background.len() }
  fn cost(&self, v: ArrayView1<f64>) -> Result<f64> {
    self.forward(v).map(|sweep| sweep.cost)
  }
  fn gradient(&self, v: ArrayView1<f64>) -> Result<Array1<f64>> {
    self.simulate_with_gradient(v).map(|(_, g)| g)
  }
  fn cost_and_gradient(&self, v: ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
    self.simulate_with_gradient(v)
  }
}

/// `(J(v + a g) - J(v)) / (a g^T g)` for `a = alpha0, alpha0 / 10, ...`;
/// tends to 1 when the gradient is consistent with the cost.
pub fn gradient_test<O>(objective: &O, v: ArrayView1<f64>,
                        alpha0: f64, count: usize) -> Result<Vec<(f64, f64)>>
  where O: Objective + ?Sized,
{
  let (j0, g) = objective.cost_and_gradient(v)?;
  let norm = g.dot(&g);
  let mut alpha = alpha0;
  let mut out = Vec::with_capacity(count);
  for _ in 0..count {
    let perturbed = &v + &(&g * alpha);
    let j = objective.cost(perturbed.view())?;
    let ratio = (j - j0) / (alpha * norm);
    debug!("gradient test: alpha = {:e}, ratio = {}", alpha, ratio);
    out.push((alpha, ratio));
    alpha /= 10.0;
  }
  Ok(out)
}

#[cfg(test)]
mod test {
  use super::*;
  use na_core::{ConfigurationError, GridConfig, ModelStats, ObservationConfig};
  use na_df::Factorization;
  use na_pde::Burgers;
  use ndarray_rand::RandomExt;
  use rand::SeedableRng;
  use rand_distr::Normal;
  use rand_isaac::Isaac64Rng;

  use std::f64::consts::PI;

  struct Twin {
    grid: GridConfig,
    model: ModelStats<Burgers>,
    obs: ObservationOperator,
    ub: Array1<f64>,
  }
  fn twin(obs: ObservationConfig) -> Twin {
    let grid = GridConfig::default();
    let model = ModelStats::from(Burgers::new(&grid).unwrap());
    let mut h = ObservationOperator::from_config(&grid, &obs).unwrap();
    let x = Array1::from_shape_fn(grid.nx, |i| i as f64 * grid.dx);
    let u0 = x.mapv(|x| (2.0 * PI * x).sin());
    let mut rng = Isaac64Rng::seed_from_u64(11);
    h.generate_synthetic(&model, u0.view(), 1e-3, &mut rng).unwrap();
    model.reset();
    Twin {
      grid: grid,
      model: model,
      obs: h,
      ub: x.mapv(|x| (2.0 * PI * x).cos()),
    }
  }

  fn ratio_errors<O: Objective>(objective: &O, v: ArrayView1<f64>, alpha0: f64) -> Vec<f64> {
    gradient_test(objective, v, alpha0, 6)
      .unwrap()
      .into_iter()
      .map(|(_, r)| (r - 1.0).abs())
      .collect()
  }

  #[test]
  fn preconditioned_gradient_matches_cost() {
    let t = twin(ObservationConfig::default());
    let b = GaussianCovariance::new(t.grid.nx, 1e-3, 0.05, Factorization::SquareRoot).unwrap();
    let r = t.obs.error_covariance(1e-3);
    let var = Variational::new(&t.model, &t.obs, &b, t.ub.view(), r.view(), true).unwrap();

    let mut rng = Isaac64Rng::seed_from_u64(5);
    let v = Array1::random_using(t.grid.nx, Normal::new(0.0, 1.0).unwrap(), &mut rng);
    let err = ratio_errors(&var, v.view(), 1e-3);
    assert!(err[1] < err[0], "{:?}", err);
    assert!(err[3] < 1e-3, "{:?}", err);
  }

  #[test]
  fn unpreconditioned_gradient_matches_cost() {
    let t = twin(ObservationConfig { xsub: 8, tsub: 5 });
    let b = GaussianCovariance::new(t.grid.nx, 1e-2, 0.02, Factorization::Inverse).unwrap();
    let r = t.obs.error_covariance(1e-3);
    let var = Variational::new(&t.model, &t.obs, &b, t.ub.view(), r.view(), false).unwrap();

    let mut rng = Isaac64Rng::seed_from_u64(5);
    let v = Array1::random_using(t.grid.nx, Normal::new(0.0, 1e-2).unwrap(), &mut rng);
    // the unscaled gradient is large; keep the perturbation small in state space
    let g = var.gradient(v.view()).unwrap();
    let err = ratio_errors(&var, v.view(), 1e-2 / g.dot(&g).sqrt());
    assert!(err[1] < err[0], "{:?}", err);
    assert!(err[3] < 1e-3, "{:?}", err);
  }

  #[test]
  fn cost_does_not_run_the_adjoint() {
    let t = twin(ObservationConfig::default());
    let b = GaussianCovariance::new(t.grid.nx, 1e-3, 0.05, Factorization::SquareRoot).unwrap();
    let r = t.obs.error_covariance(1e-3);
    let var = Variational::new(&t.model, &t.obs, &b, t.ub.view(), r.view(), true).unwrap();
    let v = Array1::zeros(t.grid.nx);

    var.cost(v.view()).unwrap();
    assert_eq!(t.model.steps(), 20);
    assert_eq!(t.model.adjoint_steps(), 0);

    var.cost_and_gradient(v.view()).unwrap();
    assert_eq!(t.model.steps(), 40);
    assert_eq!(t.model.adjoint_steps(), 20);
  }

  #[test]
  fn gradient_paths_agree() {
    let t = twin(ObservationConfig::default());
    let b = GaussianCovariance::new(t.grid.nx, 1e-3, 0.05, Factorization::SquareRoot).unwrap();
    let r = t.obs.error_covariance(1e-3);
    let var = Variational::new(&t.model, &t.obs, &b, t.ub.view(), r.view(), true).unwrap();
    let v = Array1::zeros(t.grid.nx);

    let (j, g) = var.cost_and_gradient(v.view()).unwrap();
    assert_eq!(j, var.cost(v.view()).unwrap());
    assert_eq!(g, var.gradient(v.view()).unwrap());
    // the background misfits the observations, so the gradient cannot vanish
    assert!(g.dot(&g) > 0.0);
    assert_eq!(t.model.adjoint_steps(), 40);
  }

  #[test]
  fn zero_control_is_the_background() {
    let t = twin(ObservationConfig::default());
    let b = GaussianCovariance::new(t.grid.nx, 1e-3, 0.05, Factorization::SquareRoot).unwrap();
    let r = t.obs.error_covariance(1e-3);
    let var = Variational::new(&t.model, &t.obs, &b, t.ub.view(), r.view(), true).unwrap();
    let v = Array1::zeros(t.grid.nx);

    assert_eq!(var.control_to_state(v.view()).unwrap(), t.ub);
    let trj = var.analysis_trajectory(v.view()).unwrap();
    assert_eq!(trj.len(), 21);
    assert_eq!(trj.state(0), Some(t.ub.view()));

    // with a zero control only the observation term remains
    let mut jo = 0.0;
    for (step, u) in trj.iter().enumerate() {
      if let Some(m) = t.obs.misfit(step as u64, u) {
        jo += m.dot(&m) / 1e-6;
      }
    }
    let j = var.cost(v.view()).unwrap();
    assert!((j - 0.5 * jo).abs() <= 1e-9 * j);
  }

  #[test]
  fn factor_must_match_preconditioning() {
    let t = twin(ObservationConfig::default());
    let b = GaussianCovariance::new(t.grid.nx, 1e-3, 0.02, Factorization::Cholesky).unwrap();
    let r = t.obs.error_covariance(1e-3);
    let err = Variational::new(&t.model, &t.obs, &b, t.ub.view(), r.view(), true)
      .err()
      .unwrap();
    assert!(err.is_configuration());
    match Variational::new(&t.model, &t.obs, &b, t.ub.view(), r.view(), false) {
      Err(Error::Configuration(ConfigurationError::FactorNotComputed { requested, .. })) => {
        assert_eq!(requested, "inverse");
      },
      Err(e) => panic!("unexpected: {:?}", e),
      Ok(_) => panic!("expected an error"),
    }
  }
}
