#[cfg_attr(test, macro_use)]
extern crate ndarray as nd;
extern crate ndarray_rand;
extern crate nla_factorize as nla;
#[macro_use]
extern crate log;
extern crate na_core;
extern crate rand;
extern crate rand_distr;

#[cfg(test)]
extern crate na_pde;
#[cfg(test)]
extern crate rand_isaac;

use nd::{ArrayViewMut, Ix1};

pub use na_core::{Error, Result};

pub use covariance::{Factor, Factorization, GaussianCovariance};
pub use observation::ObservationOperator;

pub mod covariance;
pub mod kalman;
pub mod observation;
pub mod utils;

/// Source of the observation vectors, indexed by time step.
pub trait Observer<E> {
  /// Writes the observation for step `idx` into `out`. Returns false if
  /// that step carries no observation.
  fn observe_into(&self, idx: u64,
                  out: ArrayViewMut<E, Ix1>) -> bool;

  fn observation_dim(&self) -> usize;
}
