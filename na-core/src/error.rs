
use nla::LinalgError;
use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

/// Fatal setup problems. Raised at construction or first use, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
  #[error("unsupported integration scheme {0}")]
  UnsupportedScheme(u32),
  #[error("unsupported factorization mode {0}")]
  UnsupportedFactorization(u32),
  #[error("{requested} factor requested, but only the {computed} factor was computed")]
  FactorNotComputed {
    requested: &'static str,
    computed: &'static str,
  },
  #[error("invalid parameter: {0}")]
  InvalidParameter(&'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error(transparent)]
  Configuration(#[from] ConfigurationError),
  /// `H S (H S)^T + R` could not be inverted.
  #[error("innovation covariance is singular")]
  SingularCovariance,
  #[error("adjoint identity violated: <M dx, y> = {lhs:e}, <dx, M^T y> = {rhs:e} (tol {tolerance:e})")]
  NumericalInconsistency {
    lhs: f64,
    rhs: f64,
    tolerance: f64,
  },
  #[error("no observation at time step {0}")]
  NotObserved(u64),
  #[error("dimension mismatch: expected {expected}, found {found}")]
  DimensionMismatch {
    expected: usize,
    found: usize,
  },
  #[error(transparent)]
  Linalg(#[from] LinalgError),
}

impl Error {
  pub fn is_configuration(&self) -> bool {
    match self {
      &Error::Configuration(_) => true,
      _ => false,
    }
  }
}

pub fn check_dim(expected: usize, found: usize) -> Result<()> {
  if expected != found {
    return Err(Error::DimensionMismatch {
      expected: expected,
      found: found,
    });
  }
  Ok(())
}
