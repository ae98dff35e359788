//! Z3 Solver Oracle
//!
//! Thin wrapper over a single `z3::Solver`. Symbolic states use it purely as
//! a satisfiability and model oracle; each state owns its own instance.

use z3::ast::Bool;
use z3::{Context, Model, SatResult, Solver};

pub struct SymbolicSolver<'ctx> {
    context: &'ctx Context,
    solver: Solver<'ctx>,
    timeout_ms: Option<u32>,
}

impl<'ctx> SymbolicSolver<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        Self {
            context,
            solver: Solver::new(context),
            timeout_ms: None,
        }
    }

    /// Create a solver whose queries give up after `timeout_ms`
    pub fn with_timeout(context: &'ctx Context, timeout_ms: Option<u32>) -> Self {
        let mut solver = Self::new(context);
        if let Some(ms) = timeout_ms {
            solver.set_timeout(ms);
        }
        solver
    }

    /// Set solver timeout in milliseconds
    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = Some(timeout_ms);
        let mut params = z3::Params::new(self.context);
        params.set_u32("timeout", timeout_ms);
        self.solver.set_params(&params);
    }

    /// Timeout set through `set_timeout`, if any
    pub fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms
    }

    /// Add assertion to the solver
    pub fn assert(&self, constraint: &Bool<'ctx>) {
        self.solver.assert(constraint);
    }

    /// Push a new scope onto the solver stack
    pub fn push(&self) {
        self.solver.push();
    }

    /// Pop scopes from the solver stack
    pub fn pop(&self, num_scopes: u32) {
        self.solver.pop(num_scopes);
    }

    /// Check satisfiability of the current assertions
    pub fn check(&self) -> SatResult {
        self.solver.check()
    }

    /// Model of the last `check`, if it was SAT
    pub fn model(&self) -> Option<Model<'ctx>> {
        self.solver.get_model()
    }

    /// Current assertions as an SMT-LIB2 script
    pub fn to_smt2(&self) -> String {
        self.solver.to_string()
    }

    /// Context the solver's terms live in
    pub fn context(&self) -> &'ctx Context {
        self.context
    }
}
