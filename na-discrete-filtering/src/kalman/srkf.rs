//! Square-root Kalman filter: the covariance is carried as `S` with `P = S S^T`.

use nd::prelude::*;
use nla::{symmetrize, LinalgError, LuDecomposition, SymmetricSqrt};

use na_core::{check_dim, ConfigurationError, Error, Model, Result, Trajectory};

use crate::covariance::GaussianCovariance;
use crate::observation::ObservationOperator;
use crate::Observer;

/// Mean and covariance square root of a Gaussian state estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
  pub mean: Array1<f64>,
  pub root: Array2<f64>,
}

impl Estimate {
  pub fn new(mean: Array1<f64>, root: Array2<f64>) -> Result<Estimate> {
    check_dim(mean.len(), root.nrows())?;
    check_dim(mean.len(), root.ncols())?;
    Ok(Estimate {
      mean: mean,
      root: root,
    })
  }
  /// The background estimate: `mean` with the square root factor of `b`.
  pub fn from_background(mean: ArrayView1<f64>, b: &GaussianCovariance) -> Result<Estimate> {
    Estimate::new(mean.to_owned(), b.sqrt()?.to_owned())
  }

  pub fn dim(&self) -> usize { self.mean.len() }
  /// `S S^T`.
  pub fn covariance(&self) -> Array2<f64> { self.root.dot(&self.root.t()) }
  /// Diagonal of `S S^T`.
  pub fn variance(&self) -> Array1<f64> {
    self.root.map_axis(Axis(1), |row| row.dot(&row))
  }
}

/// Analysis of one observation vector `yo` against the prior.
pub fn analyse(prior: &Estimate,
               h: ArrayView2<f64>,
               yo: ArrayView1<f64>,
               r: ArrayView2<f64>) -> Result<Estimate> {
  let n = prior.dim();
  let nobs = yo.len();
  check_dim(n, h.ncols())?;
  check_dim(nobs, h.nrows())?;
  check_dim(nobs, r.nrows())?;
  check_dim(nobs, r.ncols())?;

  let sp = &prior.root;
  let hs = h.dot(sp);
  let innovation_cov = hs.dot(&hs.t()) + &r;
  let lu = LuDecomposition::new(&innovation_cov)
    .map_err(|e| match e {
      LinalgError::Singular => Error::SingularCovariance,
      e => Error::from(e),
    })?;
  let gain = sp.dot(&hs.t()).dot(&lu.inverse()?);

  let innovation = &yo - &h.dot(&prior.mean);
  let mean = &prior.mean + &gain.dot(&innovation);

  let p = (sp - &gain.dot(&hs)).dot(&sp.t());
  let p = symmetrize(&p)?;
  let root = p.sqrt_psd()?;

  Ok(Estimate {
    mean: mean,
    root: root,
  })
}

/// Advances the mean with one model step, and each error mode `S[:, k]`
/// by the finite difference `M(mean + S[:, k]) - M(mean)`.
pub fn forecast<M>(model: &M, prior: &Estimate) -> Estimate
  where M: Model<f64> + ?Sized,
{
  let mean = model.step(prior.mean.view());
  let mut root = Array2::zeros(prior.root.dim());
  for (mode, mut out) in prior.root.axis_iter(Axis(1)).zip(root.axis_iter_mut(Axis(1))) {
    let perturbed = &prior.mean + &mode;
    let stepped = model.step(perturbed.view());
    out.assign(&(stepped - &mean));
  }

  Estimate {
    mean: mean,
    root: root,
  }
}

/// Per-step record of a filter run. Every arena holds `nt + 1` states; the
/// forecast arenas start with the background.
#[derive(Debug, Clone)]
pub struct FilterRun {
  pub forecast: Trajectory,
  pub analysis: Trajectory,
  pub forecast_variance: Trajectory,
  pub analysis_variance: Trajectory,
  /// Posterior after the last analysis.
  pub last: Estimate,
}

pub struct SquareRootFilter<'a, M>
  where M: Model<f64> + ?Sized,
{
  model: &'a M,
  observations: &'a ObservationOperator,
  r: Array2<f64>,
}

impl<'a, M> SquareRootFilter<'a, M>
  where M: Model<f64> + ?Sized,
{
  pub fn new(model: &'a M, observations: &'a ObservationOperator,
             sigma_o: f64) -> Result<SquareRootFilter<'a, M>> {
    check_dim(model.state_dim(), observations.nx())?;
    if !(sigma_o > 0.0) {
      return Err(ConfigurationError::InvalidParameter("sigma_o must be positive").into());
    }
    Ok(SquareRootFilter {
      model: model,
      observations: observations,
      r: observations.error_covariance(sigma_o),
    })
  }

  pub fn error_covariance(&self) -> ArrayView2<f64> { self.r.view() }

  /// Analysis at step `t`; unobserved steps return the prior untouched.
  pub fn analysis_step(&self, t: u64, prior: Estimate) -> Result<Estimate> {
    if !self.observations.is_observed(t) {
      return Ok(prior);
    }
    let mut yo = Array1::zeros(self.observations.observation_dim());
    if !self.observations.observe_into(t, yo.view_mut()) {
      return Err(Error::NotObserved(t));
    }
    let post = analyse(&prior, self.observations.matrix(), yo.view(), self.r.view())?;
    let inc = &post.mean - &prior.mean;
    debug!("analysis at step {}: increment norm {:e}", t, inc.dot(&inc).sqrt());
    Ok(post)
  }
  pub fn forecast_step(&self, prior: &Estimate) -> Estimate {
    forecast(self.model, prior)
  }

  pub fn run(&self, background: Estimate) -> Result<FilterRun> {
    self.run_with(background, |_| {})
  }
  /// As `run`, calling `on_cycle(t)` after each forecast.
  pub fn run_with<F>(&self, background: Estimate, mut on_cycle: F) -> Result<FilterRun>
    where F: FnMut(u64),
  {
    let n = self.model.state_dim();
    check_dim(n, background.dim())?;
    let nt = self.observations.nt();

    let mut run = FilterRun {
      forecast: Trajectory::new(n),
      analysis: Trajectory::new(n),
      forecast_variance: Trajectory::new(n),
      analysis_variance: Trajectory::new(n),
      last: background.clone(),
    };
    run.forecast.push(background.mean.view())?;
    run.forecast_variance.push(background.variance().view())?;

    let mut est = background;
    for t in 0..nt {
      est = self.analysis_step(t, est)?;
      run.analysis.push(est.mean.view())?;
      run.analysis_variance.push(est.variance().view())?;

      est = self.forecast_step(&est);
      run.forecast.push(est.mean.view())?;
      run.forecast_variance.push(est.variance().view())?;
      on_cycle(t);
    }
    est = self.analysis_step(nt, est)?;
    run.analysis.push(est.mean.view())?;
    run.analysis_variance.push(est.variance().view())?;

    run.last = est;
    Ok(run)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::covariance::Factorization;
  use crate::utils::{asymmetry, PartialEqWithinTol};
  use na_core::{GridConfig, ObservationConfig};
  use na_pde::Burgers;
  use nla::SymmetricEigen;
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;

  use std::f64::consts::PI;

  fn rms(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let d = &a - &b;
    (d.dot(&d) / d.len() as f64).sqrt()
  }
  fn every_other(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n / 2, n), |(i, j)| if j == 2 * i + 1 { 1.0 } else { 0.0 })
  }

  #[test]
  fn posterior_covariance_is_symmetric_psd() {
    let b = GaussianCovariance::new(20, 1.0, 0.05, Factorization::SquareRoot).unwrap();
    let mean = Array1::from_shape_fn(20, |i| (i as f64 * 0.3).sin());
    let prior = Estimate::from_background(mean.view(), &b).unwrap();
    let h = every_other(20);
    let yo = Array1::from_elem(10, 0.5);
    let r = Array2::eye(10) * 0.1;

    let post = analyse(&prior, h.view(), yo.view(), r.view()).unwrap();
    let p = post.covariance();
    assert!(asymmetry(p.view()) < 1e-12);
    let eig = SymmetricEigen::new(&p).unwrap();
    assert!(eig.values[0] > -1e-12);
    // observations shrink the variance
    for (post, prior) in post.variance().iter().zip(prior.variance().iter()) {
      assert!(post <= &(prior + 1e-12));
    }
  }

  #[test]
  fn analysis_on_a_finer_grid() {
    let nx = 100;
    let b = GaussianCovariance::new(nx, 1.0, 0.05, Factorization::SquareRoot).unwrap();
    let prior = Estimate::from_background(Array1::zeros(nx).view(), &b).unwrap();
    let obs = ObservationOperator::new(nx, 1, &ObservationConfig { xsub: 10, tsub: 1 }).unwrap();
    let yo = Array1::from_elem(obs.nobs(), 1.0);
    let r = obs.error_covariance(0.1);

    let post = analyse(&prior, obs.matrix(), yo.view(), r.view()).unwrap();
    assert!(asymmetry(post.root.view()) < 1e-12);
    let var = post.variance();
    for i in obs.locations() {
      // 1 / (1 / 1 + 1 / 0.01) is the scalar posterior variance
      assert!(var[i] < 0.0100 && var[i] > 0.0098, "var[{}] = {}", i, var[i]);
      assert!((post.mean[i] - 1.0).abs() < 0.02);
    }
    assert!(var.iter().all(|&v| v <= 1.0 + 1e-12));
  }

  #[test]
  fn uninformative_observation_leaves_prior_unchanged() {
    let b = GaussianCovariance::new(20, 1.0, 0.05, Factorization::SquareRoot).unwrap();
    let mean = Array1::from_shape_fn(20, |i| (i as f64 * 0.3).cos());
    let prior = Estimate::from_background(mean.view(), &b).unwrap();
    let h = every_other(20);
    let yo = Array1::from_elem(10, 5.0);
    let r = Array2::eye(10) * 1e20;

    let post = analyse(&prior, h.view(), yo.view(), r.view()).unwrap();
    assert!(post.mean.view().partial_eq_within_tol(&prior.mean.view(), 1e-12));
    assert!(post.root.view().partial_eq_within_tol(&prior.root.view(), 1e-8));
  }

  #[test]
  fn singular_innovation_covariance() {
    let prior = Estimate::new(Array1::zeros(3), Array2::eye(3)).unwrap();
    let h = array![[1.0, 0.0, 0.0],
                   [1.0, 0.0, 0.0]];
    let r = Array2::zeros((2, 2));
    let err = analyse(&prior, h.view(), array![1.0, 1.0].view(), r.view()).unwrap_err();
    assert_eq!(err, Error::SingularCovariance);
  }

  #[test]
  fn forecast_propagates_modes_by_finite_differences() {
    let grid = GridConfig::default();
    let model = Burgers::new(&grid).unwrap();
    let mean = Array1::from_shape_fn(grid.nx, |i| (2.0 * PI * i as f64 * grid.dx).sin());
    let root = Array2::eye(grid.nx) * 1e-2;
    let prior = Estimate::new(mean.clone(), root).unwrap();

    let fc = forecast(&model, &prior);
    assert_eq!(fc.mean, model.step(mean.view()));
    let col = fc.root.column(3).to_owned();
    let mut e3 = Array1::zeros(grid.nx);
    e3[3] = 1e-2;
    let expected = model.step((&mean + &e3).view()) - &fc.mean;
    assert_eq!(col, expected);
    // the prior is not touched
    assert_eq!(prior.root[[3, 3]], 1e-2);
  }

  #[test]
  fn filter_reduces_background_error() {
    let grid = GridConfig::default();
    let obs = ObservationConfig::default();
    let model = Burgers::new(&grid).unwrap();
    let x = Array1::from_shape_fn(grid.nx, |i| i as f64 * grid.dx);
    let u0 = x.mapv(|x| (2.0 * PI * x).sin());
    let ub = x.mapv(|x| (2.0 * PI * x).cos());

    let mut h = ObservationOperator::from_config(&grid, &obs).unwrap();
    let mut rng = Isaac64Rng::seed_from_u64(3);
    let truth = h.generate_synthetic(&model, u0.view(), 1e-3, &mut rng).unwrap();

    let b = GaussianCovariance::new(grid.nx, 1e-3, 0.05, Factorization::SquareRoot).unwrap();
    let filter = SquareRootFilter::new(&model, &h, 1e-3).unwrap();
    let mut cycles = 0;
    let run = filter
      .run_with(Estimate::from_background(ub.view(), &b).unwrap(), |_| cycles += 1)
      .unwrap();
    assert_eq!(cycles, 20);
    assert_eq!(run.forecast.len(), 21);
    assert_eq!(run.analysis.len(), 21);
    assert_eq!(run.analysis_variance.len(), 21);
    assert_eq!(run.forecast.state(0), Some(ub.view()));

    let mut background = ub.clone();
    for _ in 0..grid.nt {
      background = model.step(background.view());
    }
    let nt = grid.nt as usize;
    let truth_nt = truth.state(nt).unwrap();
    let bkg_err = rms(background.view(), truth_nt);
    let ana_err = rms(run.analysis.state(nt).unwrap(), truth_nt);
    assert!(ana_err <= 0.5 * bkg_err, "analysis {} vs background {}", ana_err, bkg_err);
    assert_eq!(run.last.mean.view(), run.analysis.state(nt).unwrap());
  }

  #[test]
  fn missing_observation_is_an_error() {
    let grid = GridConfig {
      nt: 2,
      ..GridConfig::default()
    };
    let model = Burgers::new(&grid).unwrap();
    let h = ObservationOperator::from_config(&grid, &ObservationConfig::default()).unwrap();
    let filter = SquareRootFilter::new(&model, &h, 1e-3).unwrap();
    let prior = Estimate::new(Array1::zeros(grid.nx), Array2::eye(grid.nx)).unwrap();
    assert_eq!(filter.analysis_step(0, prior).unwrap_err(), Error::NotObserved(0));
  }
}
