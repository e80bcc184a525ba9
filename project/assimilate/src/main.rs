extern crate clap;
#[cfg_attr(test, macro_use)]
extern crate ndarray as nd;
extern crate na_core;
extern crate na_discrete_filtering as na_df;
extern crate na_variational;
extern crate serde_json;
extern crate util;

use std::borrow::Cow;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use nd::prelude::*;

use na_core::ExperimentConfig;
use na_df::kalman::{analyse, Estimate, SquareRootFilter};
use na_variational::{gradient_test, minimize_lbfgs, LbfgsSettings, Objective, Variational};
use util::progress::CycleReporter;
use util::{rms, rms_series, TwinExperiment};

/// The square root factorization selector; the filter and the BLUE need it
/// regardless of the variational settings.
const SQUARE_ROOT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
  /// Background free run only.
  Free,
  /// Single analysis of the first observation against the background.
  Blue,
  /// Square-root Kalman filter over the window.
  Filter,
  /// 4D-Var minimization over the window.
  Var,
  All,
}

#[derive(Debug, Parser)]
#[command(name = "assimilate")]
#[command(about = "Burgers twin experiments: square-root Kalman filter and 4D-Var")]
struct Cli {
  /// JSON experiment configuration; missing fields keep their defaults.
  #[arg(long)]
  config: Option<PathBuf>,
  #[arg(long, value_enum, default_value_t = Method::All)]
  method: Method,
  /// Overrides the configured seed.
  #[arg(long)]
  seed: Option<u64>,
  /// Print the effective configuration and exit.
  #[arg(long)]
  dump_config: bool,
  /// Run the gradient test before minimizing.
  #[arg(long)]
  gradient_test: bool,
}

fn print_series(name: &str, series: &[f64]) {
  println!("{} rms by step:", name);
  for (step, err) in series.iter().enumerate() {
    println!("  {:>3}  {:.6e}", step, err);
  }
}

fn run_free(twin: &TwinExperiment) {
  let series = rms_series(&twin.background, &twin.truth);
  print_series("background", &series);
}

fn run_blue(twin: &TwinExperiment) -> Result<(), Box<dyn Error>> {
  let b = twin.background_covariance(SQUARE_ROOT)?;
  let r = twin.observations.error_covariance(twin.config.errors.sigma_o);
  let yo = twin.observations.observation(0)
    .ok_or(na_core::Error::NotObserved(0))?;

  let prior = Estimate::from_background(twin.ub.view(), &b)?;
  let post = analyse(&prior, twin.observations.matrix(), yo, r.view())?;

  let increment = &post.mean - &prior.mean;
  println!("BLUE analysis at step 0:");
  println!("  increment rms   {:.6e}", rms(increment.view(), Array1::zeros(increment.len()).view()));
  println!("  background rms  {:.6e}", rms(twin.ub.view(), twin.u0.view()));
  println!("  analysis rms    {:.6e}", rms(post.mean.view(), twin.u0.view()));
  println!("  mean variance   {:.6e} -> {:.6e}",
           prior.variance().mean().unwrap_or(0.0),
           post.variance().mean().unwrap_or(0.0));
  Ok(())
}

fn run_filter(twin: &TwinExperiment) -> Result<(), Box<dyn Error>> {
  let b = twin.background_covariance(SQUARE_ROOT)?;
  let filter = SquareRootFilter::new(&twin.model, &twin.observations,
                                     twin.config.errors.sigma_o)?;
  twin.model.reset();

  let mut progress = CycleReporter::new(twin.config.grid.nt, Cow::Borrowed("filter"));
  let run = filter.run_with(Estimate::from_background(twin.ub.view(), &b)?,
                            |_| progress.tick())?;
  progress.finish();

  print_series("analysis", &rms_series(&run.analysis, &twin.truth));
  let nt = twin.config.grid.nt as usize;
  if let (Some(a), Some(bk), Some(t)) = (run.analysis.state(nt),
                                         twin.background.state(nt),
                                         twin.truth.state(nt)) {
    println!("filter at step {}: background rms {:.6e}, analysis rms {:.6e}",
             nt, rms(bk, t), rms(a, t));
  }
  if let Some(var) = run.analysis_variance.last() {
    println!("  mean analysis variance {:.6e}", var.mean().unwrap_or(0.0));
  }
  println!("  model steps: {}", twin.model.steps());
  Ok(())
}

fn run_var(twin: &TwinExperiment, check_gradient: bool) -> Result<(), Box<dyn Error>> {
  let config = &twin.config;
  let b = twin.background_covariance(config.variational.factorization)?;
  let r = twin.observations.error_covariance(config.errors.sigma_o);
  let var = Variational::new(&twin.model, &twin.observations, &b,
                             twin.ub.view(), r.view(),
                             config.variational.precondition)?;
  let v0 = Array1::zeros(var.dim());

  if check_gradient {
    println!("gradient test:");
    for (alpha, ratio) in gradient_test(&var, v0.view(), 1e-3, 8)? {
      println!("  {:.0e}  {:.12}", alpha, ratio);
    }
  }

  twin.model.reset();
  let settings = LbfgsSettings::from(&config.variational);
  let res = minimize_lbfgs(&var, v0.view(), &settings)?;
  println!("4D-Var: {} iterations, {} evaluations, J = {:.6e}, |g| = {:.3e}",
           res.iterations, res.evaluations, res.cost, res.gradient_norm());
  println!("  model steps: {}, adjoint steps: {}",
           twin.model.steps(), twin.model.adjoint_steps());

  let trj = var.analysis_trajectory(res.x.view())?;
  print_series("4D-Var analysis", &rms_series(&trj, &twin.truth));
  Ok(())
}

fn load_config(cli: &Cli) -> Result<ExperimentConfig, Box<dyn Error>> {
  let mut config: ExperimentConfig = match cli.config {
    Some(ref path) => serde_json::from_str(&fs::read_to_string(path)?)?,
    None => Default::default(),
  };
  if let Some(seed) = cli.seed {
    config.seed = seed;
  }
  config.validate()?;
  Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
  let cli = Cli::parse();
  let config = load_config(&cli)?;
  if cli.dump_config {
    println!("{}", serde_json::to_string_pretty(&config)?);
    return Ok(());
  }

  let twin = TwinExperiment::new(&config)?;
  println!("initial background rms {:.6e}", rms(twin.ub.view(), twin.u0.view()));

  match cli.method {
    Method::Free => run_free(&twin),
    Method::Blue => run_blue(&twin)?,
    Method::Filter => run_filter(&twin)?,
    Method::Var => run_var(&twin, cli.gradient_test)?,
    Method::All => {
      run_free(&twin);
      run_blue(&twin)?;
      run_filter(&twin)?;
      run_var(&twin, cli.gradient_test)?;
    },
  }

  Ok(())
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn cli_defaults() {
    let cli = Cli::parse_from(["assimilate"]);
    assert_eq!(cli.method, Method::All);
    assert!(cli.config.is_none());
    let config = load_config(&cli).unwrap();
    assert_eq!(config, ExperimentConfig::default());
  }

  #[test]
  fn cli_seed_override() {
    let cli = Cli::parse_from(["assimilate", "--method", "filter", "--seed", "9"]);
    assert_eq!(cli.method, Method::Filter);
    assert_eq!(load_config(&cli).unwrap().seed, 9);
  }

  #[test]
  fn blue_runs_on_reference_twin() {
    let twin = TwinExperiment::new(&ExperimentConfig::default()).unwrap();
    run_blue(&twin).unwrap();
    run_free(&twin);
  }

  #[test]
  fn increment_helper() {
    let a = array![1.0, -1.0];
    assert_eq!(rms(a.view(), Array1::zeros(2).view()), 1.0);
  }
}
