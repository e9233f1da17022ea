//! Table of known problem and solver implementations.
//!
//! Each entry maps an implementation identifier to a factory and the
//! capabilities it offers. A solver may only be paired with a problem it
//! shares at least one capability with.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use mlb_problems::{Circuit, Function};
use mlb_solver::optimizers::{BruteForce, Permutator, RandomSampler};
use mlb_solver::Algorithm;
use mlb_types::{Capability, ConfigurationError, Problem, ProblemConfig, SolverConfig};

pub type ProblemFactory = fn(&ProblemConfig) -> Result<Arc<dyn Problem>, ConfigurationError>;
pub type SolverFactory =
    fn(&SolverConfig, Arc<dyn Problem>) -> Result<Algorithm, ConfigurationError>;

#[derive(Clone)]
pub struct ProblemEntry {
    pub description: &'static str,
    pub capabilities: &'static [Capability],
    pub factory: ProblemFactory,
}

#[derive(Clone)]
pub struct SolverEntry {
    pub description: &'static str,
    pub capabilities: &'static [Capability],
    pub factory: SolverFactory,
}

#[derive(Clone, Default)]
pub struct Registry {
    problems: BTreeMap<String, ProblemEntry>,
    solvers: BTreeMap<String, SolverEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every implementation shipped with MLBench.
    pub fn with_builtins() -> Self {
        Self::new()
            .register_problem(
                Circuit::IMPLEMENTATION,
                ProblemEntry {
                    description: "Place components on a grid to minimize wire length",
                    capabilities: &[Capability::Optimization],
                    factory: build_circuit,
                },
            )
            .register_problem(
                Function::IMPLEMENTATION,
                ProblemEntry {
                    description: "Minimize an expression over a box of real values",
                    capabilities: &[Capability::Optimization],
                    factory: build_function,
                },
            )
            .register_solver(
                BruteForce::IMPLEMENTATION,
                SolverEntry {
                    description: "Evaluate every point of a regular grid",
                    capabilities: &[Capability::Optimization],
                    factory: BruteForce::from_config,
                },
            )
            .register_solver(
                Permutator::IMPLEMENTATION,
                SolverEntry {
                    description: "Evaluate every arrangement of distinct values",
                    capabilities: &[Capability::Optimization],
                    factory: Permutator::from_config,
                },
            )
            .register_solver(
                RandomSampler::IMPLEMENTATION,
                SolverEntry {
                    description: "Keep the best of uniformly drawn samples",
                    capabilities: &[Capability::Optimization],
                    factory: RandomSampler::from_config,
                },
            )
    }

    pub fn register_problem(mut self, implementation: &str, entry: ProblemEntry) -> Self {
        self.problems.insert(implementation.to_string(), entry);
        self
    }

    pub fn register_solver(mut self, implementation: &str, entry: SolverEntry) -> Self {
        self.solvers.insert(implementation.to_string(), entry);
        self
    }

    pub fn build_problem(&self, config: &ProblemConfig) -> Result<Arc<dyn Problem>, ConfigurationError> {
        let entry = self.problems.get(&config.implementation).ok_or_else(|| {
            ConfigurationError::UnknownProblem {
                implementation: config.implementation.clone(),
            }
        })?;
        (entry.factory)(config)
    }

    pub fn build_solver(
        &self,
        config: &SolverConfig,
        problem_config: &ProblemConfig,
        problem: Arc<dyn Problem>,
    ) -> Result<Algorithm, ConfigurationError> {
        let entry = self.solvers.get(&config.implementation).ok_or_else(|| {
            ConfigurationError::UnknownSolver {
                implementation: config.implementation.clone(),
            }
        })?;
        let offered = self
            .problems
            .get(&problem_config.implementation)
            .map_or(&[][..], |p| p.capabilities);
        if !entry.capabilities.iter().any(|c| offered.contains(c)) {
            return Err(ConfigurationError::IncompatibleSolver {
                solver: config.implementation.clone(),
                problem: problem_config.implementation.clone(),
            });
        }
        (entry.factory)(config, problem)
    }

    /// Entries grouped by capability:
    /// `{"optimization": {"problems": {...}, "solvers": {...}}, ...}`.
    pub fn catalog(&self) -> Value {
        let mut groups: BTreeMap<Capability, (Map<String, Value>, Map<String, Value>)> =
            BTreeMap::new();
        for (name, entry) in &self.problems {
            for capability in entry.capabilities {
                groups
                    .entry(*capability)
                    .or_default()
                    .0
                    .insert(name.clone(), json!(entry.description));
            }
        }
        for (name, entry) in &self.solvers {
            for capability in entry.capabilities {
                groups
                    .entry(*capability)
                    .or_default()
                    .1
                    .insert(name.clone(), json!(entry.description));
            }
        }
        let catalog: Map<String, Value> = groups
            .into_iter()
            .map(|(capability, (problems, solvers))| {
                (
                    capability.as_str().to_string(),
                    json!({ "problems": problems, "solvers": solvers }),
                )
            })
            .collect();
        Value::Object(catalog)
    }
}

fn build_circuit(config: &ProblemConfig) -> Result<Arc<dyn Problem>, ConfigurationError> {
    Ok(Arc::new(Circuit::from_config(config)?))
}

fn build_function(config: &ProblemConfig) -> Result<Arc<dyn Problem>, ConfigurationError> {
    Ok(Arc::new(Function::from_config(config)?))
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("problems", &self.problems.keys().collect::<Vec<_>>())
            .field("solvers", &self.solvers.keys().collect::<Vec<_>>())
            .finish()
    }
}
