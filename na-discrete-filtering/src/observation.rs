//! Linear point-sampling observation operator with space/time subsampling.

use std::collections::BTreeMap;

use nd::prelude::*;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Normal;

use na_core::{check_dim, ConfigurationError, Error, GridConfig, Model,
              ObservationConfig, Operator, Result, Trajectory};

use super::Observer;

#[derive(Debug, Clone)]
pub struct ObservationOperator {
  nx: usize,
  nt: u64,
  xsub: usize,
  tsub: u64,
  /// `nobs x nx` selection matrix.
  mat: Array2<f64>,
  yo: BTreeMap<u64, Array1<f64>>,
}

impl ObservationOperator {
  /// Selects grid point `i` (1-based) whenever `i % xsub == 0`.
  pub fn new(nx: usize, nt: u64, config: &ObservationConfig) -> Result<ObservationOperator> {
    config.validate()?;
    let xsub = config.xsub;
    let locations: Vec<usize> = (1..nx + 1)
      .filter(|i| i % xsub == 0)
      .map(|i| i - 1)
      .collect();

    let mut mat = Array2::zeros((locations.len(), nx));
    for (row, &col) in locations.iter().enumerate() {
      mat[[row, col]] = 1.0;
    }
    debug!("observation operator: {} of {} points, every {} steps",
           locations.len(), nx, config.tsub);

    Ok(ObservationOperator {
      nx: nx,
      nt: nt,
      xsub: xsub,
      tsub: config.tsub,
      mat: mat,
      yo: BTreeMap::new(),
    })
  }
  pub fn from_config(grid: &GridConfig, config: &ObservationConfig) -> Result<ObservationOperator> {
    ObservationOperator::new(grid.nx, grid.nt, config)
  }

  pub fn nobs(&self) -> usize { self.mat.nrows() }
  pub fn nx(&self) -> usize { self.nx }
  pub fn nt(&self) -> u64 { self.nt }
  pub fn xsub(&self) -> usize { self.xsub }
  pub fn tsub(&self) -> u64 { self.tsub }
  pub fn matrix(&self) -> ArrayView2<f64> { self.mat.view() }

  pub fn is_observed(&self, t: u64) -> bool { t % self.tsub == 0 }

  /// Grid indices of the observed points.
  pub fn locations(&self) -> Vec<usize> {
    (0..self.nx)
      .filter(|i| (i + 1) % self.xsub == 0)
      .collect()
  }

  /// `R = sigma_o^2 I`.
  pub fn error_covariance(&self, sigma_o: f64) -> Array2<f64> {
    Array2::eye(self.nobs()) * (sigma_o * sigma_o)
  }

  /// Integrates `model` from `u0` for `nt` steps, recording `H (u + noise)`
  /// at every observed step, noise drawn per grid point. Returns the
  /// unperturbed trajectory, `nt + 1` states.
  pub fn generate_synthetic<M, R>(&mut self, model: &M, u0: ArrayView1<f64>,
                                  sigma_o: f64, rng: &mut R) -> Result<Trajectory>
    where M: Model<f64> + ?Sized,
          R: Rng + ?Sized,
  {
    check_dim(self.nx, u0.len())?;
    let normal = Normal::new(0.0, sigma_o)
      .map_err(|_| ConfigurationError::InvalidParameter("sigma_o must be finite and non-negative"))?;

    self.yo.clear();
    let mut truth = Trajectory::new(self.nx);
    let mut u = u0.to_owned();
    for t in 0..self.nt {
      truth.push(u.view())?;
      if self.is_observed(t) {
        self.record_noisy(t, u.view(), normal, rng)?;
      }
      u = model.step(u.view());
    }
    truth.push(u.view())?;
    if self.is_observed(self.nt) {
      self.record_noisy(self.nt, u.view(), normal, rng)?;
    }

    Ok(truth)
  }
  fn record_noisy<R>(&mut self, t: u64, u: ArrayView1<f64>,
                     normal: Normal<f64>, rng: &mut R) -> Result<()>
    where R: Rng + ?Sized,
  {
    let noise: Array1<f64> = Array1::random_using(self.nx, normal, rng);
    let perturbed = &u + &noise;
    let mut y = Array1::zeros(self.nobs());
    self.mat.eval_at(perturbed.view(), y.view_mut())?;
    self.yo.insert(t, y);
    Ok(())
  }

  pub fn observation(&self, t: u64) -> Option<ArrayView1<f64>> {
    self.yo.get(&t).map(|y| y.view())
  }
  pub fn set_observation(&mut self, t: u64, y: Array1<f64>) -> Result<()> {
    if !self.is_observed(t) {
      return Err(Error::NotObserved(t));
    }
    check_dim(self.nobs(), y.len())?;
    self.yo.insert(t, y);
    Ok(())
  }
  /// Steps with a recorded observation, ascending.
  pub fn observed_steps(&self) -> Vec<u64> {
    self.yo.keys().cloned().collect()
  }

  /// `H u`, or `None` at unobserved steps.
  pub fn project(&self, t: u64, u: ArrayView1<f64>) -> Option<Array1<f64>> {
    if self.is_observed(t) {
      Some(self.mat.dot(&u))
    } else {
      None
    }
  }
  /// `H^T y`, or `None` at unobserved steps.
  pub fn adjoint_project(&self, t: u64, y: ArrayView1<f64>) -> Option<Array1<f64>> {
    if self.is_observed(t) {
      Some(self.mat.t().dot(&y))
    } else {
      None
    }
  }
  /// `H u - yo[t]`; `None` unless step `t` is observed and has an observation.
  pub fn misfit(&self, t: u64, u: ArrayView1<f64>) -> Option<Array1<f64>> {
    let yo = self.yo.get(&t)?;
    self.project(t, u).map(|hu| hu - yo)
  }
}

impl Observer<f64> for ObservationOperator {
  fn observe_into(&self, idx: u64,
                  mut out: ArrayViewMut<f64, Ix1>) -> bool {
    match self.yo.get(&idx) {
      Some(y) if self.is_observed(idx) => {
        out.assign(y);
        true
      },
      _ => false,
    }
  }
  fn observation_dim(&self) -> usize { self.nobs() }
}
