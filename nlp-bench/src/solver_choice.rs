use clap::ValueEnum;
use nlp_core::{solve_aug_lagr, solve_ipm, NlpProblem, NlpResult, SolveResult};
use serde::Serialize;

use crate::config::BenchConfig;

#[derive(ValueEnum, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SolverChoice {
    /// Filter line-search interior point method
    Ipm,
    /// Augmented Lagrangian with Filter-IPM subproblems
    Auglagr,
}

pub fn solve_with_choice(
    problem: &dyn NlpProblem,
    config: &BenchConfig,
    choice: SolverChoice,
) -> NlpResult<SolveResult> {
    match choice {
        SolverChoice::Ipm => solve_ipm(problem, &config.ipm),
        SolverChoice::Auglagr => solve_aug_lagr(problem, &config.auglagr),
    }
}
