#[cfg_attr(test, macro_use)]
extern crate ndarray as nd;
#[macro_use]
extern crate log;
extern crate na_core;
extern crate na_discrete_filtering as na_df;
extern crate na_pde;
extern crate pbr;
extern crate rand;
extern crate rand_isaac;

use nd::{Array1, ArrayView1};

use na_core::Trajectory;

pub use data::{free_run, TwinExperiment};

pub mod data;
pub mod progress;

/// Grid point abscissas `i dx`, `i` in `0..nx`.
pub fn abscissa(nx: usize, dx: f64) -> Array1<f64> {
  Array1::from_shape_fn(nx, |i| i as f64 * dx)
}

/// Root mean square of `a - b`.
pub fn rms(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
  debug_assert_eq!(a.len(), b.len());
  if a.is_empty() {
    return 0.0;
  }
  let d = &a - &b;
  (d.dot(&d) / d.len() as f64).sqrt()
}

/// Per-step RMS error of `estimate` against `truth`, over their common steps.
pub fn rms_series(estimate: &Trajectory, truth: &Trajectory) -> Vec<f64> {
  estimate.iter()
    .zip(truth.iter())
    .map(|(e, t)| rms(e, t))
    .collect()
}
