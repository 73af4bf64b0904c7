//! vrp-pragmatic solver integration.

use std::io::BufWriter;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use vrp_cli::extensions::solve::config::{Config, TerminationConfig, create_builder_from_config};
use vrp_core::solver::Solver;
use vrp_pragmatic::format::problem::{Matrix, PragmaticProblem, Problem};
use vrp_pragmatic::format::solution::{PragmaticOutputType, Solution as PragmaticSolution, write_pragmatic};

use super::adapter::matrix_index;
use super::{
    build_pragmatic_matrix, build_pragmatic_problem, RouteSolver, RoutingProblem, SolverConfig, SolverError,
    DEFAULT_PROFILE,
};

/// Metaheuristic solver backed by vrp-pragmatic. Best effort, not guaranteed optimal.
/// Windows are hard constraints; a stop that cannot fit fails the solve.
pub struct PragmaticSolver {
    config: SolverConfig,
}

impl PragmaticSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl RouteSolver for PragmaticSolver {
    fn solve(&self, problem: &RoutingProblem) -> Result<Vec<usize>, SolverError> {
        solve_pragmatic(problem, &self.config).map_err(|err| SolverError::Failed(format!("{:#}", err)))
    }

    fn name(&self) -> &str {
        "vrp-pragmatic"
    }
}

/// Solve an open route and return matrix indices in visiting order
fn solve_pragmatic(problem: &RoutingProblem, config: &SolverConfig) -> Result<Vec<usize>> {
    if problem.stop_count() == 0 {
        return Ok(vec![]);
    }

    let problem_json = build_pragmatic_problem(problem);
    let problem_format: Problem = serde_json::from_value(problem_json)
        .context("Failed to deserialize pragmatic problem")?;

    let matrix: Matrix = build_pragmatic_matrix(&problem.matrices, DEFAULT_PROFILE);
    let core_problem = (problem_format, vec![matrix])
        .read_pragmatic()
        .context("Failed to build core problem from pragmatic format")?;

    let core_problem = Arc::new(core_problem);
    let solver_config = build_solver_config(core_problem.clone(), config)?;

    let solution = Solver::new(core_problem.clone(), solver_config)
        .solve()
        .context("Failed to solve VRP with vrp-pragmatic")?;

    let pragmatic = write_pragmatic_solution(core_problem.as_ref(), &solution)?;
    map_solution(&pragmatic)
}

fn build_solver_config(
    problem: Arc<vrp_core::models::Problem>,
    config: &SolverConfig,
) -> Result<vrp_core::rosomaxa::evolution::EvolutionConfig<
    vrp_core::solver::RefinementContext,
    vrp_core::models::GoalContext,
    vrp_core::construction::heuristics::InsertionContext,
>> {
    let config = Config {
        termination: Some(TerminationConfig {
            max_time: Some(config.max_time_seconds as usize),
            max_generations: Some(config.max_generations),
            variation: None,
        }),
        evolution: None,
        hyper: None,
        environment: None,
        telemetry: None,
        output: None,
    };

    let builder = create_builder_from_config(problem, Vec::new(), &config)
        .context("Failed to create solver builder")?;

    builder.build().context("Failed to build solver configuration")
}

fn write_pragmatic_solution(
    problem: &vrp_core::models::Problem,
    solution: &vrp_core::models::Solution,
) -> Result<PragmaticSolution> {
    let mut writer = BufWriter::new(Vec::new());
    write_pragmatic(problem, solution, PragmaticOutputType::default(), &mut writer)
        .context("Failed to serialize pragmatic solution")?;

    let bytes = writer.into_inner().context("Failed to flush solution writer")?;
    let json = String::from_utf8(bytes).context("Solution is not valid UTF-8")?;
    let parsed: PragmaticSolution = serde_json::from_str(&json)
        .context("Failed to parse pragmatic solution JSON")?;

    Ok(parsed)
}

/// Extract visiting order from the single tour; unassigned jobs fail the solve
fn map_solution(solution: &PragmaticSolution) -> Result<Vec<usize>> {
    if let Some(unassigned) = solution.unassigned.as_ref().filter(|jobs| !jobs.is_empty()) {
        let ids: Vec<&str> = unassigned.iter().map(|job| job.job_id.as_str()).collect();
        bail!("solver left jobs unassigned: {}", ids.join(", "));
    }

    let mut order = Vec::new();
    for tour in &solution.tours {
        for stop in &tour.stops {
            for activity in stop.activities() {
                if activity.activity_type == "departure" || activity.activity_type == "arrival" {
                    continue;
                }
                match matrix_index(&activity.job_id) {
                    Some(index) => order.push(index),
                    None => bail!("unknown job in solution: {}", activity.job_id),
                }
            }
        }
    }

    Ok(order)
}
