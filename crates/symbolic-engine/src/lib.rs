//! Symbolic Execution Engine with Z3 Backend
//!
//! Provides the symbolic half of WLang exploration:
//! - Symbolic states owning a path condition and a private Z3 solver
//! - Translation of WLang expressions into Z3 terms
//! - A forking symbolic executor with bounded loop unrolling
//!
//! All states of one exploration share a single `z3::Context`, which plays
//! the role of the term algebra. Solvers are never shared between states.

use std::collections::BTreeMap;
use z3::ast::Int;

pub mod constraint_builder;
pub mod executor;
pub mod solver;
pub mod state_model;

pub use constraint_builder::ConstraintBuilder;
pub use executor::SymExecutor;
pub use solver::SymbolicSolver;
pub use state_model::SymState;

/// Variable name -> symbolic integer term
pub type SymEnv<'ctx> = BTreeMap<String, Int<'ctx>>;

/// Loop iterations explored symbolically before a path is cut off
pub const DEFAULT_UNROLL_BOUND: usize = 10;

/// Symbolic executor configuration
#[derive(Debug, Clone)]
pub struct SymConfig {
    /// Maximum number of loop unrollings per `while`
    pub unroll_bound: usize,
    /// Per-query Z3 timeout in milliseconds
    pub solver_timeout_ms: Option<u32>,
}

impl Default for SymConfig {
    fn default() -> Self {
        Self {
            unroll_bound: DEFAULT_UNROLL_BOUND,
            solver_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolicError {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("model has no value for `{0}`")]
    ModelEvaluation(String),
    #[error("model value {value} for `{var}` does not fit in 64 bits")]
    ModelValueOutOfRange { var: String, value: String },
}
