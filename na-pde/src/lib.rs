#[cfg_attr(test, macro_use)]
extern crate ndarray as nd;
#[macro_use]
extern crate log;
extern crate na_core;

#[cfg(test)]
extern crate ndarray_rand;
#[cfg(test)]
extern crate rand;
#[cfg(test)]
extern crate rand_distr;
#[cfg(test)]
extern crate rand_isaac;

use nd::prelude::*;

pub use burgers::{Burgers, Scheme};

pub mod burgers;

/// Periodic shift: `roll(u, k)[i] == u[(i - k) mod n]`.
///
/// `roll(u, 1)` is the upwind neighbour field, `roll(u, -1)` the downwind one.
pub fn roll(u: ArrayView1<f64>, shift: isize) -> Array1<f64> {
  let n = u.len();
  if n == 0 {
    return Array1::zeros(0);
  }
  let k = shift.rem_euclid(n as isize) as usize;
  Array1::from_shape_fn(n, |i| u[(i + n - k) % n])
}

#[test]
fn roll_is_periodic() {
  let u = array![0.0, 1.0, 2.0, 3.0];
  assert_eq!(roll(u.view(), 1), array![3.0, 0.0, 1.0, 2.0]);
  assert_eq!(roll(u.view(), -1), array![1.0, 2.0, 3.0, 0.0]);
  assert_eq!(roll(u.view(), 5), roll(u.view(), 1));
  assert_eq!(roll(u.view(), 0), u);
}
