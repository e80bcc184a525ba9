use nd::prelude::*;
use nd::iter::AxisIter;

use crate::error::{check_dim, Error, Result};

/// Per-step states stored contiguously, one row per time step.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
  states: Array2<f64>,
}

impl Trajectory {
  pub fn new(state_dim: usize) -> Trajectory {
    Trajectory {
      states: Array2::zeros((0, state_dim)),
    }
  }

  /// Append a state; returns its step index.
  pub fn push(&mut self, u: ArrayView1<f64>) -> Result<usize> {
    check_dim(self.state_dim(), u.len())?;
    self.states.push_row(u)
      .map_err(|_| Error::DimensionMismatch {
        expected: self.states.ncols(),
        found: u.len(),
      })?;
    Ok(self.states.nrows() - 1)
  }

  pub fn state(&self, step: usize) -> Option<ArrayView1<f64>> {
    if step < self.len() {
      Some(self.states.row(step))
    } else {
      None
    }
  }
  pub fn last(&self) -> Option<ArrayView1<f64>> {
    match self.len() {
      0 => None,
      n => self.state(n - 1),
    }
  }

  pub fn len(&self) -> usize { self.states.nrows() }
  pub fn is_empty(&self) -> bool { self.len() == 0 }
  pub fn state_dim(&self) -> usize { self.states.ncols() }

  pub fn iter(&self) -> AxisIter<f64, Ix1> { self.states.outer_iter() }
  pub fn view(&self) -> ArrayView2<f64> { self.states.view() }
  pub fn into_inner(self) -> Array2<f64> { self.states }
}

#[test]
fn trajectory_push_and_index() {
  let mut t = Trajectory::new(3);
  assert!(t.is_empty());
  assert_eq!(t.push(array![1.0, 2.0, 3.0].view()), Ok(0));
  assert_eq!(t.push(array![4.0, 5.0, 6.0].view()), Ok(1));
  assert_eq!(t.len(), 2);
  assert_eq!(t.state(1), Some(array![4.0, 5.0, 6.0].view()));
  assert_eq!(t.state(2), None);
  assert_eq!(t.last(), t.state(1));

  let err = t.push(array![1.0].view());
  assert_eq!(err, Err(Error::DimensionMismatch { expected: 3, found: 1 }));
  assert_eq!(t.len(), 2);
}
