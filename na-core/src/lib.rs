#[cfg_attr(test, macro_use)]
extern crate ndarray as nd;
extern crate nla_factorize as nla;
#[macro_use]
extern crate log;
extern crate num_traits;
extern crate serde;
extern crate thiserror;

#[cfg(test)]
extern crate ndarray_rand;
#[cfg(test)]
extern crate rand;
#[cfg(test)]
extern crate rand_distr;
#[cfg(test)]
extern crate rand_isaac;
#[cfg(test)]
extern crate serde_json;

use std::cell::Cell;

use nd::prelude::*;
use nd::linalg::general_mat_vec_mul;
use nd::{Data, LinalgScalar};

use num_traits::{One, Zero};

pub use config::*;
pub use error::{check_dim, ConfigurationError, Error, Result};
pub use trajectory::Trajectory;

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod trajectory;

/// A discrete-time forecast model `u(t+1) = M(u(t))`.
pub trait Model<E> {
  fn state_dim(&self) -> usize;
  fn step(&self, u: ArrayView<E, Ix1>) -> Array<E, Ix1>;
}
/// A model which also provides its tangent linear and adjoint steps.
///
/// Both are linearized around the *pre-step* state `u`. For any `u`, `du`
/// and `ad` the pair must satisfy `<step_tan(u, du), ad> = <du, step_adj(u, ad)>`.
pub trait LinearizedModel<E>: Model<E> {
  fn step_tan(&self, u: ArrayView<E, Ix1>,
              du: ArrayView<E, Ix1>) -> Array<E, Ix1>;
  fn step_adj(&self, u: ArrayView<E, Ix1>,
              ad: ArrayView<E, Ix1>) -> Array<E, Ix1>;
}

impl<'a, E, M> Model<E> for &'a M
  where M: Model<E> + ?Sized,
{
  fn state_dim(&self) -> usize { (**self).state_dim() }
  fn step(&self, u: ArrayView<E, Ix1>) -> Array<E, Ix1> { (**self).step(u) }
}
impl<'a, E, M> LinearizedModel<E> for &'a M
  where M: LinearizedModel<E> + ?Sized,
{
  fn step_tan(&self, u: ArrayView<E, Ix1>,
              du: ArrayView<E, Ix1>) -> Array<E, Ix1> {
    (**self).step_tan(u, du)
  }
  fn step_adj(&self, u: ArrayView<E, Ix1>,
              ad: ArrayView<E, Ix1>) -> Array<E, Ix1> {
    (**self).step_adj(u, ad)
  }
}

/// Counts calls made into the wrapped model.
#[derive(Debug)]
pub struct ModelStats<M> {
  pub model: M,
  steps: Cell<u64>,
  tangent_steps: Cell<u64>,
  adjoint_steps: Cell<u64>,
}
impl<M> ModelStats<M> {
  pub fn steps(&self) -> u64 { self.steps.get() }
  pub fn tangent_steps(&self) -> u64 { self.tangent_steps.get() }
  pub fn adjoint_steps(&self) -> u64 { self.adjoint_steps.get() }

  pub fn reset(&self) {
    self.steps.set(0);
    self.tangent_steps.set(0);
    self.adjoint_steps.set(0);
  }
  pub fn into_inner(self) -> M { self.model }
}
impl<M> From<M> for ModelStats<M> {
  fn from(v: M) -> ModelStats<M> {
    ModelStats {
      model: v,
      steps: Cell::new(0),
      tangent_steps: Cell::new(0),
      adjoint_steps: Cell::new(0),
    }
  }
}
impl<E, M> Model<E> for ModelStats<M>
  where M: Model<E>,
{
  fn state_dim(&self) -> usize { self.model.state_dim() }
  fn step(&self, u: ArrayView<E, Ix1>) -> Array<E, Ix1> {
    self.steps.set(self.steps.get() + 1);
    self.model.step(u)
  }
}
impl<E, M> LinearizedModel<E> for ModelStats<M>
  where M: LinearizedModel<E>,
{
  fn step_tan(&self, u: ArrayView<E, Ix1>,
              du: ArrayView<E, Ix1>) -> Array<E, Ix1> {
    self.tangent_steps.set(self.tangent_steps.get() + 1);
    self.model.step_tan(u, du)
  }
  fn step_adj(&self, u: ArrayView<E, Ix1>,
              ad: ArrayView<E, Ix1>) -> Array<E, Ix1> {
    self.adjoint_steps.set(self.adjoint_steps.get() + 1);
    self.model.step_adj(u, ad)
  }
}

pub trait Operator<E, Dim>
  where Dim: nd::Dimension,
{
  fn operator_input_dim(&self) -> usize;
  fn operator_output_dim(&self) -> usize;
  fn eval_at(&self, x: ArrayView<E, Dim>,
             out: ArrayViewMut<E, Dim>) -> Result<()>;
}
/// `out = A^T x` for a linear operator `A`.
pub trait AdjointOperator<E, Dim>: Operator<E, Dim>
  where Dim: nd::Dimension,
{
  fn eval_adjoint_at(&self, x: ArrayView<E, Dim>,
                     out: ArrayViewMut<E, Dim>) -> Result<()>;
}

impl<D, E> Operator<E, Ix1> for ArrayBase<D, Ix2>
  where D: Data<Elem = E>,
        E: LinalgScalar + One + Zero,
{
  fn operator_input_dim(&self) -> usize { self.ncols() }
  fn operator_output_dim(&self) -> usize { self.nrows() }
  fn eval_at(&self, x: ArrayView<E, Ix1>,
             mut out: ArrayViewMut<E, Ix1>) -> Result<()> {
    check_dim(self.ncols(), x.len())?;
    check_dim(self.nrows(), out.len())?;
    general_mat_vec_mul(One::one(),
                        self, &x, Zero::zero(),
                        &mut out);

    Ok(())
  }
}
impl<D, E> AdjointOperator<E, Ix1> for ArrayBase<D, Ix2>
  where D: Data<Elem = E>,
        E: LinalgScalar + One + Zero,
{
  fn eval_adjoint_at(&self, x: ArrayView<E, Ix1>,
                     mut out: ArrayViewMut<E, Ix1>) -> Result<()> {
    check_dim(self.nrows(), x.len())?;
    check_dim(self.ncols(), out.len())?;
    general_mat_vec_mul(One::one(),
                        &self.t(), &x, Zero::zero(),
                        &mut out);

    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  struct Shift;
  impl Model<f64> for Shift {
    fn state_dim(&self) -> usize { 3 }
    fn step(&self, u: ArrayView<f64, Ix1>) -> Array<f64, Ix1> {
      array![u[2], u[0], u[1]]
    }
  }
  impl LinearizedModel<f64> for Shift {
    fn step_tan(&self, _: ArrayView<f64, Ix1>,
                du: ArrayView<f64, Ix1>) -> Array<f64, Ix1> {
      self.step(du)
    }
    fn step_adj(&self, _: ArrayView<f64, Ix1>,
                ad: ArrayView<f64, Ix1>) -> Array<f64, Ix1> {
      array![ad[1], ad[2], ad[0]]
    }
  }

  #[test]
  fn model_stats_counts_calls() {
    let m = ModelStats::from(Shift);
    let u = array![1.0, 2.0, 3.0];
    let u1 = m.step(u.view());
    let _ = m.step(u1.view());
    let _ = m.step_tan(u.view(), u.view());
    let _ = m.step_adj(u.view(), u.view());
    let _ = m.step_adj(u.view(), u.view());

    assert_eq!(u1, array![3.0, 1.0, 2.0]);
    assert_eq!(m.steps(), 2);
    assert_eq!(m.tangent_steps(), 1);
    assert_eq!(m.adjoint_steps(), 2);

    m.reset();
    assert_eq!(m.steps(), 0);
  }

  #[test]
  fn matrix_operator_and_its_adjoint() {
    let a = array![[1.0, 2.0, 0.0],
                   [0.0, 1.0, -1.0]];
    let x = array![1.0, 1.0, 1.0];
    let mut y = Array1::zeros(2);
    a.eval_at(x.view(), y.view_mut()).unwrap();
    assert_eq!(y, array![3.0, 0.0]);

    let mut z = Array1::zeros(3);
    a.eval_adjoint_at(array![1.0, 2.0].view(), z.view_mut()).unwrap();
    assert_eq!(z, array![1.0, 4.0, -2.0]);

    let bad = a.eval_at(array![1.0, 2.0].view(), y.view_mut());
    assert_eq!(bad, Err(Error::DimensionMismatch { expected: 3, found: 2 }));
  }
}
