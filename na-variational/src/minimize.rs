//! Limited-memory BFGS for unconstrained minimization.

use std::collections::VecDeque;

use nd::prelude::*;
use thiserror::Error;

use na_core::{ConfigurationError, VariationalConfig};

use super::Objective;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimError {
  #[error("no convergence after {0} iterations")]
  MaxIterations(usize),
  #[error("line search failed at iteration {iteration}")]
  LineSearchFailed {
    iteration: usize,
  },
  #[error(transparent)]
  Objective(#[from] na_core::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LbfgsSettings {
  /// Number of correction pairs kept.
  pub memory: usize,
  /// Converged once `||g||_2 <= grad_tol`.
  pub grad_tol: f64,
  pub max_iter: usize,
  pub max_line_search: usize,
  /// Sufficient decrease constant.
  pub c1: f64,
  /// Curvature constant of the approximate Wolfe test.
  pub c2: f64,
}
impl Default for LbfgsSettings {
  fn default() -> Self {
    LbfgsSettings::from(&VariationalConfig::default())
  }
}
impl<'a> From<&'a VariationalConfig> for LbfgsSettings {
  fn from(c: &'a VariationalConfig) -> LbfgsSettings {
    LbfgsSettings {
      memory: c.memory,
      grad_tol: c.grad_tol,
      max_iter: c.max_iter,
      max_line_search: 40,
      c1: 1e-4,
      c2: 0.9,
    }
  }
}

#[derive(Debug, Clone)]
pub struct MinimizeResult {
  pub x: Array1<f64>,
  pub cost: f64,
  pub gradient: Array1<f64>,
  pub iterations: usize,
  /// Cost/gradient evaluations, the initial one included.
  pub evaluations: usize,
}
impl MinimizeResult {
  pub fn gradient_norm(&self) -> f64 { norm(self.gradient.view()) }
}

fn norm(v: ArrayView1<f64>) -> f64 { v.dot(&v).sqrt() }

struct Correction {
  s: Array1<f64>,
  y: Array1<f64>,
  rho: f64,
}

/// Two-loop recursion: approximates `H^-1 g` from the stored corrections.
fn inverse_hessian_times(history: &VecDeque<Correction>, g: ArrayView1<f64>) -> Array1<f64> {
  let mut q = g.to_owned();
  let mut alphas = Vec::with_capacity(history.len());
  for c in history.iter().rev() {
    let a = c.rho * c.s.dot(&q);
    q.scaled_add(-a, &c.y);
    alphas.push(a);
  }

  let gamma = match history.back() {
    Some(c) => c.s.dot(&c.y) / c.y.dot(&c.y),
    None => 1.0,
  };
  let mut r = q * gamma;
  for (c, &a) in history.iter().zip(alphas.iter().rev()) {
    let b = c.rho * c.y.dot(&r);
    r.scaled_add(a - b, &c.s);
  }
  r
}

/// Minimizes `objective` from `x0`.
///
/// Steps are found by backtracking from `1` (or `1 / ||g||` with an empty
/// memory), accepting the Armijo condition or the approximate Wolfe
/// condition. The latter keeps progress possible once cost decreases fall
/// below the rounding level of a large cost.
pub fn minimize_lbfgs<O>(objective: &O, x0: ArrayView1<f64>,
                         settings: &LbfgsSettings) -> Result<MinimizeResult, OptimError>
  where O: Objective + ?Sized,
{
  if settings.memory == 0 {
    let e = na_core::Error::from(ConfigurationError::InvalidParameter("memory must be positive"));
    return Err(e.into());
  }

  let mut x = x0.to_owned();
  let (mut f, mut g) = objective.cost_and_gradient(x.view())?;
  let mut evaluations = 1;
  let mut history: VecDeque<Correction> = VecDeque::with_capacity(settings.memory);

  for iteration in 0..settings.max_iter {
    let gnorm = norm(g.view());
    debug!("lbfgs {}: f = {:e}, |g| = {:e}", iteration, f, gnorm);
    if gnorm <= settings.grad_tol {
      info!("lbfgs converged after {} iterations, {} evaluations: f = {:e}, |g| = {:e}",
            iteration, evaluations, f, gnorm);
      return Ok(MinimizeResult {
        x: x,
        cost: f,
        gradient: g,
        iterations: iteration,
        evaluations: evaluations,
      });
    }

    let mut d = -inverse_hessian_times(&history, g.view());
    let mut gp = g.dot(&d);
    if !(gp < 0.0) {
      warn!("lbfgs {}: not a descent direction, resetting memory", iteration);
      history.clear();
      d = -&g;
      gp = -gnorm * gnorm;
    }

    let mut alpha = if history.is_empty() { (1.0 / gnorm).min(1.0) } else { 1.0 };
    let mut accepted = None;
    for _ in 0..settings.max_line_search {
      let xn = &x + &(&d * alpha);
      let (fn_, gn) = objective.cost_and_gradient(xn.view())?;
      evaluations += 1;

      let gpn = gn.dot(&d);
      let armijo = fn_ <= f + settings.c1 * alpha * gp;
      let approx_wolfe = fn_ <= f + 1e-6 * f.abs() &&
        settings.c2 * gp <= gpn && gpn <= (2.0 * settings.c1 - 1.0) * gp;
      if armijo || approx_wolfe {
        accepted = Some((xn, fn_, gn));
        break;
      }
      alpha *= 0.5;
    }
    let (xn, fn_, gn) = match accepted {
      Some(v) => v,
      None => return Err(OptimError::LineSearchFailed { iteration: iteration }),
    };
    debug!("lbfgs {}: step {:e}", iteration, alpha);

    let s = &xn - &x;
    let y = &gn - &g;
    let ys = s.dot(&y);
    if ys > ::std::f64::EPSILON * y.dot(&y) {
      while history.len() >= settings.memory {
        history.pop_front();
      }
      history.push_back(Correction {
        s: s,
        y: y,
        rho: 1.0 / ys,
      });
    }

    x = xn;
    f = fn_;
    g = gn;
  }

  if norm(g.view()) <= settings.grad_tol {
    return Ok(MinimizeResult {
      x: x,
      cost: f,
      gradient: g,
      iterations: settings.max_iter,
      evaluations: evaluations,
    });
  }
  Err(OptimError::MaxIterations(settings.max_iter))
}

#[cfg(test)]
mod test {
  use super::*;
  use na_core::Result;

  /// `f(x) = 1/2 x^T A x - b^T x`.
  struct Quadratic {
    a: Array2<f64>,
    b: Array1<f64>,
  }
  impl Objective for Quadratic {
    fn dim(&self) -> usize { self.b.len() }
    fn cost(&self, x: ArrayView1<f64>) -> Result<f64> {
      Ok(0.5 * x.dot(&self.a.dot(&x)) - self.b.dot(&x))
    }
    fn gradient(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
      Ok(self.a.dot(&x) - &self.b)
    }
  }

  struct Rosenbrock;
  impl Objective for Rosenbrock {
    fn dim(&self) -> usize { 2 }
    fn cost(&self, x: ArrayView1<f64>) -> Result<f64> {
      Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
    }
    fn gradient(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
      let t = x[1] - x[0] * x[0];
      Ok(array![-2.0 * (1.0 - x[0]) - 400.0 * x[0] * t, 200.0 * t])
    }
  }

  #[test]
  fn quadratic() {
    let n = 10;
    let a = Array2::from_shape_fn((n, n), |(i, j)| {
      if i == j { 2.0 + i as f64 } else if i + 1 == j || j + 1 == i { -1.0 } else { 0.0 }
    });
    let b = Array1::from_shape_fn(n, |i| (i as f64).sin());
    let q = Quadratic { a: a.clone(), b: b.clone() };

    let res = minimize_lbfgs(&q, Array1::zeros(n).view(), &LbfgsSettings::default()).unwrap();
    assert!(res.gradient_norm() <= 1e-5);
    let residual = a.dot(&res.x) - &b;
    assert!(residual.dot(&residual).sqrt() <= 1e-5);
    assert!(res.iterations < 50);
  }

  #[test]
  fn rosenbrock() {
    let res = minimize_lbfgs(&Rosenbrock, array![-1.2, 1.0].view(), &LbfgsSettings::default())
      .unwrap();
    assert!((res.x[0] - 1.0).abs() < 1e-4);
    assert!((res.x[1] - 1.0).abs() < 1e-4);
  }

  #[test]
  fn iteration_budget() {
    let settings = LbfgsSettings {
      max_iter: 3,
      ..LbfgsSettings::default()
    };
    let err = minimize_lbfgs(&Rosenbrock, array![-1.2, 1.0].view(), &settings).unwrap_err();
    assert_eq!(err, OptimError::MaxIterations(3));
  }

  #[test]
  fn empty_memory_is_rejected() {
    let settings = LbfgsSettings {
      memory: 0,
      ..LbfgsSettings::default()
    };
    let err = minimize_lbfgs(&Rosenbrock, array![-1.2, 1.0].view(), &settings).unwrap_err();
    let expected = na_core::Error::from(ConfigurationError::InvalidParameter("memory must be positive"));
    assert_eq!(err, OptimError::Objective(expected));
  }

  #[test]
  fn single_correction_pair() {
    let settings = LbfgsSettings {
      memory: 1,
      ..LbfgsSettings::default()
    };
    let res = minimize_lbfgs(&Rosenbrock, array![-1.2, 1.0].view(), &settings).unwrap();
    assert!(res.gradient_norm() <= settings.grad_tol);
  }

  #[test]
  fn settings_follow_config() {
    let c = VariationalConfig {
      memory: 5,
      grad_tol: 1e-8,
      ..VariationalConfig::default()
    };
    let s = LbfgsSettings::from(&c);
    assert_eq!(s.memory, 5);
    assert_eq!(s.grad_tol, 1e-8);
    assert_eq!(s.max_iter, 10000);
  }
}
