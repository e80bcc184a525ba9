use nd::{ArrayView, Axis, Ix0, Ix1, Ix2};

pub trait PartialEqWithinTol<Rhs, Tol> {
  const STD_TOL: Tol;
  fn partial_eq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool;

  fn partial_neq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool {
    !self.partial_eq_within_tol(rhs, tol)
  }

  fn partial_eq_within_std_tol(&self, rhs: &Rhs) -> bool {
    self.partial_eq_within_tol(rhs, Self::STD_TOL)
  }
  fn partial_neq_within_std_tol(&self, rhs: &Rhs) -> bool {
    !self.partial_eq_within_std_tol(rhs)
  }
}

impl PartialEqWithinTol<f64, f64> for f64 {
  const STD_TOL: Self = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &f64, tol: f64) -> bool {
    (self - rhs).abs() <= tol
  }
}
impl<'a> PartialEqWithinTol<ArrayView<'a, f64, Ix0>, f64> for ArrayView<'a, f64, Ix0> {
  const STD_TOL: f64 = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &ArrayView<'a, f64, Ix0>, tol: f64) -> bool {
    self[()].partial_eq_within_tol(&rhs[()], tol)
  }
}
impl<'a, 'b> PartialEqWithinTol<ArrayView<'b, f64, Ix1>, f64> for ArrayView<'a, f64, Ix1> {
  const STD_TOL: f64 = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &ArrayView<'b, f64, Ix1>, tol: f64) -> bool {
    self.len() == rhs.len() &&
      self.iter()
      .zip(rhs.iter())
      .all(|(l, r)| l.partial_eq_within_tol(r, tol))
  }
}
impl<'a, 'b> PartialEqWithinTol<ArrayView<'b, f64, Ix2>, f64> for ArrayView<'a, f64, Ix2> {
  const STD_TOL: f64 = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &ArrayView<'b, f64, Ix2>, tol: f64) -> bool {
    self.dim() == rhs.dim() &&
      self.axis_iter(Axis(0))
      .zip(rhs.axis_iter(Axis(0)))
      .all(|(l, r)| {
        l.partial_eq_within_tol(&r, tol)
      })
  }
}

/// Largest absolute entry of `a - a^T`.
pub fn asymmetry(a: ArrayView<f64, Ix2>) -> f64 {
  a.indexed_iter()
    .map(|((i, j), &v)| (v - a[[j, i]]).abs())
    .fold(0.0, f64::max)
}

#[test]
fn within_tol() {
  let a = array![[1.0, 2.0], [3.0, 4.0]];
  let b = array![[1.0, 2.0 + 1e-12], [3.0, 4.0]];
  assert!(a.view().partial_eq_within_tol(&b.view(), 1e-10));
  assert!(a.view().partial_neq_within_tol(&b.view(), 1e-14));
  assert!(a.row(0).partial_neq_within_std_tol(&b.row(0)));
  assert_eq!(asymmetry(a.view()), 1.0);
}
