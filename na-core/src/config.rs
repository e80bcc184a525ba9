//! Experiment parameters, threaded explicitly through constructors.
//!
//! Every struct defaults to the reference twin experiment: 40 points on the
//! unit circle, 20 steps at half the grid spacing, one observation every 10
//! points at every step, and background/observation errors of 1e-3.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
  /// Number of grid points.
  pub nx: usize,
  pub dx: f64,
  pub dt: f64,
  /// Number of time steps in the assimilation window.
  pub nt: u64,
  /// Integration scheme selector; `0` is Lax-Friedrichs.
  pub scheme: u32,
}
impl GridConfig {
  pub fn cfl(&self) -> f64 { self.dt / self.dx }

  pub fn validate(&self) -> Result<()> {
    if self.nx == 0 {
      return Err(ConfigurationError::InvalidParameter("nx must be positive").into());
    }
    if !(self.dx > 0.0) {
      return Err(ConfigurationError::InvalidParameter("dx must be positive").into());
    }
    if !(self.dt > 0.0) {
      return Err(ConfigurationError::InvalidParameter("dt must be positive").into());
    }
    Ok(())
  }
}
impl Default for GridConfig {
  fn default() -> Self {
    let nx = 40;
    let dx = 1.0 / nx as f64;
    GridConfig {
      nx: nx,
      dx: dx,
      dt: 0.5 * dx,
      nt: 20,
      scheme: 0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorStatistics {
  /// Background error standard deviation.
  pub sigma_b: f64,
  /// Observation error standard deviation.
  pub sigma_o: f64,
  /// Correlation length of the background error covariance.
  pub correlation_length: f64,
}
impl ErrorStatistics {
  pub fn validate(&self) -> Result<()> {
    if !(self.sigma_b > 0.0) {
      return Err(ConfigurationError::InvalidParameter("sigma_b must be positive").into());
    }
    if !(self.sigma_o > 0.0) {
      return Err(ConfigurationError::InvalidParameter("sigma_o must be positive").into());
    }
    if !(self.correlation_length > 0.0) {
      return Err(ConfigurationError::InvalidParameter("correlation_length must be positive").into());
    }
    Ok(())
  }
}
impl Default for ErrorStatistics {
  fn default() -> Self {
    ErrorStatistics {
      sigma_b: 1e-3,
      sigma_o: 1e-3,
      correlation_length: 0.05,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
  /// Spatial stride; 1 observes every grid point.
  pub xsub: usize,
  /// Temporal stride; 1 observes every time step.
  pub tsub: u64,
}
impl ObservationConfig {
  pub fn validate(&self) -> Result<()> {
    if self.xsub == 0 {
      return Err(ConfigurationError::InvalidParameter("xsub must be positive").into());
    }
    if self.tsub == 0 {
      return Err(ConfigurationError::InvalidParameter("tsub must be positive").into());
    }
    Ok(())
  }
}
impl Default for ObservationConfig {
  fn default() -> Self {
    ObservationConfig {
      xsub: 10,
      tsub: 1,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationalConfig {
  /// Minimize over `v` with `u0 = S v + ub` instead of `u0 = v + ub`.
  pub precondition: bool,
  /// Factorization selector: 1 inverse, 2 square root, 3 Cholesky.
  pub factorization: u32,
  pub grad_tol: f64,
  pub max_iter: usize,
  /// Number of correction pairs kept by the limited-memory minimizer.
  pub memory: usize,
}
impl VariationalConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.grad_tol > 0.0) {
      return Err(ConfigurationError::InvalidParameter("grad_tol must be positive").into());
    }
    if self.max_iter == 0 {
      return Err(ConfigurationError::InvalidParameter("max_iter must be positive").into());
    }
    if self.memory == 0 {
      return Err(ConfigurationError::InvalidParameter("memory must be positive").into());
    }
    Ok(())
  }
}
impl Default for VariationalConfig {
  fn default() -> Self {
    VariationalConfig {
      precondition: true,
      factorization: 2,
      grad_tol: 1e-5,
      max_iter: 10000,
      memory: 10,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
  pub grid: GridConfig,
  pub errors: ErrorStatistics,
  pub observations: ObservationConfig,
  pub variational: VariationalConfig,
  pub seed: u64,
}
impl ExperimentConfig {
  pub fn validate(&self) -> Result<()> {
    self.grid.validate()?;
    self.errors.validate()?;
    self.observations.validate()?;
    self.variational.validate()
  }
}
impl Default for ExperimentConfig {
  fn default() -> Self {
    ExperimentConfig {
      grid: Default::default(),
      errors: Default::default(),
      observations: Default::default(),
      variational: Default::default(),
      seed: 1,
    }
  }
}
