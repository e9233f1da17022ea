use thiserror::Error;

/// Main error type for the MLBench system
#[derive(Error, Debug)]
pub enum MlbError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Bad or missing problem/solver parameters. A run never starts when one of
/// these is raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{component}: missing parameter '{parameter}'")]
    MissingParameter { component: String, parameter: String },

    #[error("{component}: invalid parameter '{parameter}': {message}")]
    InvalidParameter {
        component: String,
        parameter: String,
        message: String,
    },

    #[error("Unknown problem implementation: {implementation}")]
    UnknownProblem { implementation: String },

    #[error("Unknown solver implementation: {implementation}")]
    UnknownSolver { implementation: String },

    #[error("Solver {solver} cannot solve problem {problem}")]
    IncompatibleSolver { solver: String, problem: String },

    #[error("Invalid scope: {message}")]
    InvalidScope { message: String },

    #[error("Invalid expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ConfigurationError {
    pub fn missing(component: &str, parameter: &str) -> Self {
        Self::MissingParameter {
            component: component.to_string(),
            parameter: parameter.to_string(),
        }
    }

    pub fn invalid(component: &str, parameter: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            component: component.to_string(),
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}

/// Lifecycle misuse of a run or worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("A solver is already running in this session")]
    ConcurrentRun,

    #[error("Worker {worker} has already been started")]
    AlreadyRunning { worker: String },
}

/// Failures raised by solver code inside a worker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Worker fault: {message}")]
    WorkerFault { message: String },

    #[error("Evaluation failed: {message}")]
    Evaluation { message: String },
}

/// Result type alias for MLBench operations
pub type MlbResult<T> = Result<T, MlbError>;

/// Result type alias for solver code running inside a worker
pub type SolverResult<T> = Result<T, SolverError>;
