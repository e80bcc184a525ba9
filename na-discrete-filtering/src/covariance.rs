//! Stationary Gaussian background error covariance on a periodic 1-D grid.

use std::convert::TryFrom;

use nd::prelude::*;
use nla::{symmetrize, Cholesky, Inverse, SymmetricSqrt};

use na_core::{ConfigurationError, ErrorStatistics, GridConfig, Result};

/// Which factor of the covariance matrix is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factorization {
  Inverse,
  SquareRoot,
  Cholesky,
}
impl Factorization {
  pub fn name(&self) -> &'static str {
    match self {
      &Factorization::Inverse => "inverse",
      &Factorization::SquareRoot => "square root",
      &Factorization::Cholesky => "cholesky",
    }
  }
}
impl TryFrom<u32> for Factorization {
  type Error = ConfigurationError;
  fn try_from(v: u32) -> ::std::result::Result<Factorization, ConfigurationError> {
    match v {
      1 => Ok(Factorization::Inverse),
      2 => Ok(Factorization::SquareRoot),
      3 => Ok(Factorization::Cholesky),
      _ => Err(ConfigurationError::UnsupportedFactorization(v)),
    }
  }
}

#[derive(Debug, Clone)]
pub enum Factor {
  Inverse(Array2<f64>),
  /// Symmetric `S` with `S S = B`.
  SquareRoot(Array2<f64>),
  /// Lower triangular `L` with `L L^T = B`.
  Cholesky(Array2<f64>),
}
impl Factor {
  pub fn factorization(&self) -> Factorization {
    match self {
      &Factor::Inverse(_) => Factorization::Inverse,
      &Factor::SquareRoot(_) => Factorization::SquareRoot,
      &Factor::Cholesky(_) => Factorization::Cholesky,
    }
  }
  pub fn view(&self) -> ArrayView2<f64> {
    match self {
      &Factor::Inverse(ref m) |
      &Factor::SquareRoot(ref m) |
      &Factor::Cholesky(ref m) => m.view(),
    }
  }
}

/// `B[i, j] = sigma^2 exp(-(k dx)^2 / (2 L^2))`, `k` the periodic distance
/// between `i` and `j`, `dx = 1 / nx`.
pub fn gaussian_matrix(nx: usize, sigma: f64, correlation_length: f64) -> Array2<f64> {
  let dx = 1.0 / nx as f64;
  let var = sigma * sigma;
  let denom = 2.0 * correlation_length * correlation_length;
  Array2::from_shape_fn((nx, nx), |(i, j)| {
    let d = if i > j { i - j } else { j - i };
    let k = d.min(nx - d) as f64;
    var * (-(k * dx).powi(2) / denom).exp()
  })
}

#[derive(Debug, Clone)]
pub struct GaussianCovariance {
  matrix: Array2<f64>,
  factor: Factor,
}

impl GaussianCovariance {
  pub fn new(nx: usize, sigma: f64, correlation_length: f64,
             factorization: Factorization) -> Result<GaussianCovariance> {
    if nx == 0 {
      return Err(ConfigurationError::InvalidParameter("nx must be positive").into());
    }
    if !(correlation_length > 0.0) {
      return Err(ConfigurationError::InvalidParameter("correlation_length must be positive").into());
    }

    let matrix = symmetrize(&gaussian_matrix(nx, sigma, correlation_length))?;
    let factor = match factorization {
      Factorization::Inverse => Factor::Inverse(matrix.inv()?),
      Factorization::SquareRoot => Factor::SquareRoot(matrix.sqrt_psd()?),
      Factorization::Cholesky => Factor::Cholesky(matrix.l_lt()?),
    };
    debug!("gaussian covariance: nx = {}, sigma = {:e}, L = {}, {} factor",
           nx, sigma, correlation_length, factorization.name());

    Ok(GaussianCovariance {
      matrix: matrix,
      factor: factor,
    })
  }

  /// Background error covariance, with the factorization given by its
  /// numeric selector.
  pub fn background(grid: &GridConfig, errors: &ErrorStatistics,
                    factorization: u32) -> Result<GaussianCovariance> {
    let f = Factorization::try_from(factorization)?;
    GaussianCovariance::new(grid.nx, errors.sigma_b, errors.correlation_length, f)
  }

  pub fn dim(&self) -> usize { self.matrix.nrows() }
  pub fn matrix(&self) -> ArrayView2<f64> { self.matrix.view() }
  pub fn factor(&self) -> &Factor { &self.factor }
  pub fn factorization(&self) -> Factorization { self.factor.factorization() }

  fn get(&self, requested: Factorization) -> Result<ArrayView2<f64>> {
    if self.factorization() != requested {
      return Err(ConfigurationError::FactorNotComputed {
        requested: requested.name(),
        computed: self.factorization().name(),
      }.into());
    }
    Ok(self.factor.view())
  }
  pub fn inverse(&self) -> Result<ArrayView2<f64>> { self.get(Factorization::Inverse) }
  pub fn sqrt(&self) -> Result<ArrayView2<f64>> { self.get(Factorization::SquareRoot) }
  pub fn cholesky(&self) -> Result<ArrayView2<f64>> { self.get(Factorization::Cholesky) }
}
