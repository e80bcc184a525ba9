//! Inviscid 1-D Burgers equation `u_t + (u^2 / 2)_x = 0` on a periodic grid.

use std::convert::TryFrom;

use nd::prelude::*;
use nd::Zip;

use na_core::{ConfigurationError, GridConfig, LinearizedModel, Model, Result};

use super::roll;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
  LaxFriedrichs,
}
impl TryFrom<u32> for Scheme {
  type Error = ConfigurationError;
  fn try_from(v: u32) -> ::std::result::Result<Scheme, ConfigurationError> {
    match v {
      0 => Ok(Scheme::LaxFriedrichs),
      _ => Err(ConfigurationError::UnsupportedScheme(v)),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Burgers {
  nx: usize,
  cfl: f64,
  scheme: Scheme,
}

impl Burgers {
  pub fn new(grid: &GridConfig) -> Result<Burgers> {
    grid.validate()?;
    let scheme = Scheme::try_from(grid.scheme)?;
    debug!("burgers: nx = {}, cfl = {}, scheme = {:?}",
           grid.nx, grid.cfl(), scheme);
    Ok(Burgers {
      nx: grid.nx,
      cfl: grid.cfl(),
      scheme: scheme,
    })
  }

  pub fn nx(&self) -> usize { self.nx }
  pub fn cfl(&self) -> f64 { self.cfl }
  pub fn scheme(&self) -> Scheme { self.scheme }

  /// Advance one step:
  /// `u'[i] = (u[i-1] + u[i+1]) / 2 + cfl / 4 (u[i-1]^2 - u[i+1]^2)`.
  pub fn step(&self, u: ArrayView1<f64>) -> Array1<f64> {
    let um1 = roll(u, 1);
    let up1 = roll(u, -1);
    let q = 0.25 * self.cfl;
    match self.scheme {
      Scheme::LaxFriedrichs => {
        Zip::from(&um1)
          .and(&up1)
          .map_collect(|&m, &p| 0.5 * (m + p) + q * (m * m - p * p))
      },
    }
  }

  /// Tangent linear step around the pre-step state `u`.
  pub fn step_tan(&self, u: ArrayView1<f64>, du: ArrayView1<f64>) -> Array1<f64> {
    let um1 = roll(u, 1);
    let up1 = roll(u, -1);
    let dum1 = roll(du, 1);
    let dup1 = roll(du, -1);
    let q = 0.5 * self.cfl;
    match self.scheme {
      Scheme::LaxFriedrichs => {
        Zip::from(&um1)
          .and(&up1)
          .and(&dum1)
          .and(&dup1)
          .map_collect(|&m, &p, &dm, &dp| 0.5 * (dm + dp) + q * (m * dm - p * dp))
      },
    }
  }

  /// Exact transpose of `step_tan` around the pre-step state `u`.
  pub fn step_adj(&self, u: ArrayView1<f64>, ad: ArrayView1<f64>) -> Array1<f64> {
    let adm1 = roll(ad, 1);
    let adp1 = roll(ad, -1);
    let q = 0.5 * self.cfl;
    match self.scheme {
      Scheme::LaxFriedrichs => {
        Zip::from(&u)
          .and(&adm1)
          .and(&adp1)
          .map_collect(|&u, &m, &p| (0.5 + q * u) * p + (0.5 - q * u) * m)
      },
    }
  }

  /// Discretized adjoint of the continuous equation. Not the transpose of
  /// `step_tan`; only agrees with `step_adj` where `u` vanishes.
  pub fn step_adj_cont(&self, u: ArrayView1<f64>, ad: ArrayView1<f64>) -> Array1<f64> {
    let adm1 = roll(ad, 1);
    let adp1 = roll(ad, -1);
    let q = 0.25 * self.cfl;
    match self.scheme {
      Scheme::LaxFriedrichs => {
        Zip::from(&u)
          .and(&adm1)
          .and(&adp1)
          .map_collect(|&u, &m, &p| 0.5 * (m + p) - q * u * (p - m))
      },
    }
  }
}

impl Model<f64> for Burgers {
  fn state_dim(&self) -> usize { self.nx }
  fn step(&self, u: ArrayView1<f64>) -> Array1<f64> { Burgers::step(self, u) }
}
impl LinearizedModel<f64> for Burgers {
  fn step_tan(&self, u: ArrayView1<f64>, du: ArrayView1<f64>) -> Array1<f64> {
    Burgers::step_tan(self, u, du)
  }
  fn step_adj(&self, u: ArrayView1<f64>, ad: ArrayView1<f64>) -> Array1<f64> {
    Burgers::step_adj(self, u, ad)
  }
}
