//! Twin experiments: a known truth, a wrong background, and synthetic
//! observations of the truth.

use std::f64::consts::PI;

use nd::{Array1, ArrayView1};
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;

use na_core::{check_dim, ExperimentConfig, Model, ModelStats, Result, Trajectory};
use na_df::{GaussianCovariance, ObservationOperator};
use na_pde::Burgers;

use super::abscissa;

/// Integrates `model` from `u0` for `nt` steps; `nt + 1` states.
pub fn free_run<M>(model: &M, u0: ArrayView1<f64>, nt: u64) -> Result<Trajectory>
  where M: Model<f64> + ?Sized,
{
  check_dim(model.state_dim(), u0.len())?;
  let mut trj = Trajectory::new(u0.len());
  let mut u = u0.to_owned();
  trj.push(u.view())?;
  for _ in 0..nt {
    u = model.step(u.view());
    trj.push(u.view())?;
  }
  Ok(trj)
}

/// Truth `sin(2 pi x)`, background `cos(2 pi x)`, observations drawn from
/// the true trajectory.
pub struct TwinExperiment {
  pub config: ExperimentConfig,
  pub model: ModelStats<Burgers>,
  pub observations: ObservationOperator,
  pub x: Array1<f64>,
  /// True initial state.
  pub u0: Array1<f64>,
  /// Background initial state.
  pub ub: Array1<f64>,
  pub truth: Trajectory,
  /// Free run from the background initial state.
  pub background: Trajectory,
}

impl TwinExperiment {
  pub fn new(config: &ExperimentConfig) -> Result<TwinExperiment> {
    config.validate()?;
    let grid = &config.grid;
    let model = ModelStats::from(Burgers::new(grid)?);
    let mut observations = ObservationOperator::from_config(grid, &config.observations)?;

    let x = abscissa(grid.nx, grid.dx);
    let u0 = x.mapv(|x| (2.0 * PI * x).sin());
    let ub = x.mapv(|x| (2.0 * PI * x).cos());

    let mut rng = Isaac64Rng::seed_from_u64(config.seed);
    let truth = observations.generate_synthetic(&model, u0.view(),
                                                config.errors.sigma_o, &mut rng)?;
    let background = free_run(&model, ub.view(), grid.nt)?;
    model.reset();

    info!("twin experiment: nx = {}, nt = {}, {} observations per observed step",
          grid.nx, grid.nt, observations.nobs());

    Ok(TwinExperiment {
      config: *config,
      model: model,
      observations: observations,
      x: x,
      u0: u0,
      ub: ub,
      truth: truth,
      background: background,
    })
  }

  /// Background error covariance with the given factorization selector.
  pub fn background_covariance(&self, factorization: u32) -> Result<GaussianCovariance> {
    GaussianCovariance::background(&self.config.grid, &self.config.errors, factorization)
  }
}
