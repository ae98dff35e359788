//! Concolic Execution Engine for WLang
//!
//! Combines concrete execution with symbolic constraint collection
//! to systematically explore program paths. Each path carries a concrete
//! witness alongside its symbolic path condition; the witness decides how
//! loops are finished once symbolic unrolling gives up.

use z3::{Config, Context};

use concrete_interpreter::{InterpConfig, InterpError, DEFAULT_FUEL, DEFAULT_HAVOC_VALUE};
use symbolic_engine::{SymConfig, SymExecutor, SymbolicError, DEFAULT_UNROLL_BOUND};
use wlang_syntax::Stmt;

pub mod executor;
pub mod report;
pub mod state;

pub use executor::ConcolicExecutor;
pub use report::{ExplorationReport, StateReport, StateStatus};
pub use state::ConcolicState;

/// Configuration for concolic execution
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Symbolic loop unrollings before a path is finished concretely
    pub unroll_bound: usize,
    /// Loop iterations the concrete interpreter may spend on a single run
    pub concrete_fuel: u64,
    /// Per-query Z3 timeout in milliseconds
    pub solver_timeout_ms: Option<u32>,
    /// Concrete value given to freshly havocked variables
    pub havoc_value: i64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            unroll_bound: DEFAULT_UNROLL_BOUND,
            concrete_fuel: DEFAULT_FUEL,
            solver_timeout_ms: None,
            havoc_value: DEFAULT_HAVOC_VALUE,
        }
    }
}

impl ExecConfig {
    pub fn interp_config(&self) -> InterpConfig {
        InterpConfig {
            havoc_value: self.havoc_value,
            fuel: self.concrete_fuel,
        }
    }

    pub fn sym_config(&self) -> SymConfig {
        SymConfig {
            unroll_bound: self.unroll_bound,
            solver_timeout_ms: self.solver_timeout_ms,
        }
    }
}

/// Fatal exploration errors. Assertion failures and infeasible assumptions
/// are not errors here; they end up as tagged states in the result.
#[derive(Debug, thiserror::Error)]
pub enum ConcolicError {
    #[error("concrete execution failed: {0}")]
    Concrete(#[from] InterpError),
    #[error("symbolic execution failed: {0}")]
    Symbolic(#[from] SymbolicError),
}

/// Run the concolic engine over `program` from the empty state
pub fn explore(
    program: &Stmt,
    config: &ExecConfig,
    include_smt2: bool,
) -> Result<ExplorationReport, ConcolicError> {
    let context = Context::new(&Config::new());
    let executor = ConcolicExecutor::new(&context, config.clone());
    let states = executor.run(program, executor.initial_state())?;

    let reports = states
        .iter()
        .map(|st| StateReport::from_state(st, include_smt2))
        .collect();
    Ok(ExplorationReport::from_states(reports))
}

/// Run the pure symbolic engine over `program` from the empty state.
/// Each surviving state is reported with a solver-picked witness.
pub fn explore_symbolic(
    program: &Stmt,
    config: &ExecConfig,
    include_smt2: bool,
) -> Result<ExplorationReport, ConcolicError> {
    let context = Context::new(&Config::new());
    let executor = SymExecutor::new(&context, config.sym_config());
    let mut states = executor.run(program, executor.initial_state())?;

    let reports = states
        .iter_mut()
        .map(|st| StateReport::from_symbolic(st, include_smt2))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExplorationReport::from_states(reports))
}
