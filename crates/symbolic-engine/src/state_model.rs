//! Symbolic State Model
//!
//! A symbolic state is a symbolic environment plus a path condition. The
//! path condition is kept twice: as an ordered log of `add_pc` scopes, and as
//! the assertions of the state's own solver. Every mutation updates both, so
//! the two never diverge.

use std::fmt;
use tracing::{debug, trace};
use z3::ast::{Bool, Int};
use z3::{Context, SatResult};

use concrete_interpreter::ConcreteEnv;

use crate::solver::SymbolicSolver;
use crate::{SymEnv, SymbolicError};

pub struct SymState<'ctx> {
    context: &'ctx Context,
    env: SymEnv<'ctx>,
    /// Flattened path condition, in insertion order
    path: Vec<Bool<'ctx>>,
    /// Number of constraints contributed by each `add_pc` call
    scopes: Vec<usize>,
    solver: SymbolicSolver<'ctx>,
    error: bool,
}

impl<'ctx> SymState<'ctx> {
    /// Empty environment, empty path condition
    pub fn new(context: &'ctx Context) -> Self {
        Self::with_timeout(context, None)
    }

    pub fn with_timeout(context: &'ctx Context, timeout_ms: Option<u32>) -> Self {
        Self {
            context,
            env: SymEnv::new(),
            path: Vec::new(),
            scopes: Vec::new(),
            solver: SymbolicSolver::with_timeout(context, timeout_ms),
            error: false,
        }
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    pub fn env(&self) -> &SymEnv<'ctx> {
        &self.env
    }

    pub fn get(&self, name: &str) -> Result<&Int<'ctx>, SymbolicError> {
        self.env
            .get(name)
            .ok_or_else(|| SymbolicError::UndefinedVariable(name.to_string()))
    }

    pub fn assign(&mut self, name: impl Into<String>, value: Int<'ctx>) {
        self.env.insert(name.into(), value);
    }

    /// Rebind `name` to a fresh, never-before-used integer constant
    pub fn havoc(&mut self, name: &str) -> Int<'ctx> {
        let fresh = Int::fresh_const(self.context, name);
        self.env.insert(name.to_string(), fresh.clone());
        fresh
    }

    pub fn path(&self) -> &[Bool<'ctx>] {
        &self.path
    }

    /// Append constraints to the path condition as one solver scope
    pub fn add_pc<I>(&mut self, constraints: I)
    where
        I: IntoIterator<Item = Bool<'ctx>>,
    {
        self.solver.push();
        let before = self.path.len();
        for constraint in constraints {
            self.solver.assert(&constraint);
            self.path.push(constraint);
        }
        self.scopes.push(self.path.len() - before);
    }

    /// Undo the most recent `add_pc`. Returns `false` if there was none.
    pub fn pop_pc(&mut self) -> bool {
        match self.scopes.pop() {
            Some(count) => {
                self.path.truncate(self.path.len() - count);
                self.solver.pop(1);
                true
            }
            None => false,
        }
    }

    /// Whether an assertion failed on this path
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Tag the state as an error state. Satisfiability is unaffected.
    pub fn mark_error(&mut self) {
        self.error = true;
    }

    /// True iff the path condition is UNSAT, i.e. no concrete state lies on
    /// this path. An `unknown` answer is not treated as empty.
    pub fn is_empty(&self) -> bool {
        let result = self.solver.check();
        trace!(?result, constraints = self.path.len(), "feasibility check");
        result == SatResult::Unsat
    }

    /// A concrete environment satisfying the path condition, or `None` if
    /// the solver cannot produce one
    pub fn pick_concrete(&self) -> Result<Option<ConcreteEnv>, SymbolicError> {
        if self.solver.check() != SatResult::Sat {
            return Ok(None);
        }
        let Some(model) = self.solver.model() else {
            return Ok(None);
        };

        let mut concrete = ConcreteEnv::new();
        for (name, term) in &self.env {
            let value = model
                .eval(term, true)
                .ok_or_else(|| SymbolicError::ModelEvaluation(name.clone()))?;
            let value = value
                .as_i64()
                .ok_or_else(|| SymbolicError::ModelValueOutOfRange {
                    var: name.clone(),
                    value: value.to_string(),
                })?;
            concrete.insert(name.clone(), value);
        }
        Ok(Some(concrete))
    }

    /// Like `pick_concrete`, but a model that does not fit in `i64` is
    /// retried with every variable constrained to the `i64` range. `None`
    /// means no witness of that range exists on this path.
    pub fn pick_concrete_i64(&mut self) -> Result<Option<ConcreteEnv>, SymbolicError> {
        match self.pick_concrete() {
            Err(SymbolicError::ModelValueOutOfRange { var, value }) => {
                debug!(%var, %value, "model out of i64 range, retrying with bounded variables");
            }
            picked => return picked,
        }

        let min = Int::from_i64(self.context, i64::MIN);
        let max = Int::from_i64(self.context, i64::MAX);
        let bounds: Vec<Bool<'ctx>> = self
            .env
            .values()
            .flat_map(|term| [term.ge(&min), term.le(&max)])
            .collect();

        self.add_pc(bounds);
        let picked = self.pick_concrete();
        self.pop_pc();
        picked
    }

    /// Split into two independent states. The child gets a copy of the
    /// environment and a fresh solver into which the scope log is replayed.
    pub fn fork(self) -> (Self, Self) {
        let mut child = Self::with_timeout(self.context, self.solver.timeout_ms());
        child.env = self.env.clone();

        let mut offset = 0;
        for &count in &self.scopes {
            child.add_pc(self.path[offset..offset + count].iter().cloned());
            offset += count;
        }
        child.error = self.error;

        (self, child)
    }

    /// The solver's assertions in SMT-LIB2 format
    pub fn to_smt2(&self) -> String {
        self.solver.to_smt2()
    }
}

impl fmt::Display for SymState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, term) in &self.env {
            writeln!(f, "{}: {}", name, term)?;
        }
        write!(f, "pc: [")?;
        for (i, constraint) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", constraint)?;
        }
        writeln!(f, "]")
    }
}

impl fmt::Debug for SymState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymState")
            .field("env", &self.env)
            .field("path", &self.path)
            .field("error", &self.error)
            .finish()
    }
}
