//! Benchmark and regression CLI for the nlp-core solvers.
//!
//! # Commands
//!
//! - `nlp-bench list` - List the registered test problems
//! - `nlp-bench run <name>` - Solve one problem and print the result
//! - `nlp-bench suite` - Solve every problem and summarize

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod config;
mod solver_choice;
mod test_problems;

use config::BenchConfig;
use nlp_core::{NlpProblem, SolveStatus};
use solver_choice::{solve_with_choice, SolverChoice};
use test_problems::TestProblem;

/// Benchmarks for the Filter-IPM and augmented-Lagrangian solvers
#[derive(Parser)]
#[command(name = "nlp-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Solver settings file (TOML with [ipm] and [auglagr] tables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Option override, e.g. `-o max_iter=100` or `-o auglagr.rho_max=1e8`
    #[arg(short = 'o', long = "option", global = true)]
    options: Vec<String>,

    /// Solver log level: 0 silent, 1 summary, 2 iterations, 3 scalars
    #[arg(short, long, global = true, default_value_t = 0)]
    verbosity: u8,

    /// Write a JSON summary to this file
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered test problems
    List,

    /// Solve one problem
    Run {
        /// Problem name (see `list`)
        name: String,

        #[arg(short, long, value_enum, default_value = "ipm")]
        solver: SolverChoice,
    },

    /// Solve every registered problem
    Suite {
        /// Solvers to run; repeat the flag for several
        #[arg(short, long, value_enum, default_values = ["ipm", "auglagr"])]
        solver: Vec<SolverChoice>,

        /// Relative objective error above which a solved case counts as wrong
        #[arg(long, default_value_t = 1e-4)]
        obj_tol: f64,
    },
}

/// One solved case.
#[derive(Debug, Serialize)]
struct CaseSummary {
    problem: String,
    solver: SolverChoice,
    status: SolveStatus,
    iters: usize,
    inner_iters: usize,
    obj_val: f64,
    obj_rel_err: f64,
    err_feas: f64,
    err_optim: f64,
    solve_time_ms: u64,
    error: Option<String>,
}

impl CaseSummary {
    fn passed(&self, obj_tol: f64) -> bool {
        self.error.is_none() && self.status.is_success() && self.obj_rel_err <= obj_tol
    }
}

fn run_case(tp: &TestProblem, config: &BenchConfig, solver: SolverChoice) -> CaseSummary {
    let start = Instant::now();
    let outcome = solve_with_choice(tp.problem.as_ref(), config, solver);
    let elapsed = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(res) => CaseSummary {
            problem: tp.name.to_string(),
            solver,
            status: res.status,
            iters: res.info.iters,
            inner_iters: res.info.inner_iters,
            obj_val: res.obj_val,
            obj_rel_err: tp.objective_error(res.obj_val),
            err_feas: res.info.err_feas,
            err_optim: res.info.err_optim,
            solve_time_ms: elapsed,
            error: None,
        },
        Err(e) => CaseSummary {
            problem: tp.name.to_string(),
            solver,
            status: SolveStatus::IncompleteInit,
            iters: 0,
            inner_iters: 0,
            obj_val: f64::NAN,
            obj_rel_err: f64::INFINITY,
            err_feas: f64::NAN,
            err_optim: f64::NAN,
            solve_time_ms: elapsed,
            error: Some(e.to_string()),
        },
    }
}

fn print_table(cases: &[CaseSummary], obj_tol: f64) {
    println!(
        "{:<14} {:<8} {:<26} {:>6} {:>6} {:>16} {:>10} {:>10} {:>8}",
        "problem", "solver", "status", "iters", "inner", "objective", "inf_pr", "inf_du", "ms"
    );
    println!("{}", "-".repeat(112));
    for c in cases {
        let mark = if c.passed(obj_tol) { "" } else { "  *" };
        println!(
            "{:<14} {:<8} {:<26} {:>6} {:>6} {:>16.8e} {:>10.3e} {:>10.3e} {:>8}{}",
            c.problem,
            format!("{:?}", c.solver).to_lowercase(),
            c.status.to_string(),
            c.iters,
            c.inner_iters,
            c.obj_val,
            c.err_feas,
            c.err_optim,
            c.solve_time_ms,
            mark
        );
        if let Some(e) = &c.error {
            println!("    error: {}", e);
        }
    }
}

fn write_json(path: &Path, cases: &[CaseSummary]) -> Result<()> {
    let text = serde_json::to_string_pretty(cases)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("wrote {} cases to {}", cases.len(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::default(),
    };
    config.set_verbosity(cli.verbosity);
    config.apply_overrides(&cli.options)?;

    match cli.command {
        Commands::List => {
            for tp in test_problems::registry() {
                let dims = tp.problem.dims();
                println!(
                    "{:<14} n = {:>3}  m_eq = {:>2}  m_ineq = {:>2}  f* = {:.8e}",
                    tp.name, dims.n, dims.m_eq, dims.m_ineq, tp.optimal_obj
                );
            }
        }
        Commands::Run { name, solver } => {
            let Some(tp) = test_problems::find(&name) else {
                bail!("unknown problem '{}'; try `nlp-bench list`", name);
            };
            let case = run_case(&tp, &config, solver);
            print_table(std::slice::from_ref(&case), 1e-4);
            if let Some(path) = &cli.json {
                write_json(path, std::slice::from_ref(&case))?;
            }
        }
        Commands::Suite { solver, obj_tol } => {
            let problems = test_problems::registry();
            let mut cases = Vec::new();
            for tp in &problems {
                for &choice in &solver {
                    cases.push(run_case(tp, &config, choice));
                }
            }
            print_table(&cases, obj_tol);

            let passed = cases.iter().filter(|c| c.passed(obj_tol)).count();
            println!("\n{}/{} cases solved to objective tolerance {:.0e}", passed, cases.len(), obj_tol);
            if let Some(path) = &cli.json {
                write_json(path, &cases)?;
            }
        }
    }
    Ok(())
}
