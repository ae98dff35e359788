//! Concolic execution state: one concrete witness paired with one symbolic
//! state.
//!
//! Whenever the executor hands a state back, `concrete` satisfies the path
//! condition of `symbolic`, or the state is tagged infeasible.

use std::fmt;
use z3::Context;

use concrete_interpreter::{ConcreteEnv, EnvDisplay};
use symbolic_engine::SymState;

use crate::report::StateStatus;
use crate::ConcolicError;

pub struct ConcolicState<'ctx> {
    pub concrete: ConcreteEnv,
    pub symbolic: SymState<'ctx>,
    infeasible: bool,
    error: bool,
}

impl<'ctx> ConcolicState<'ctx> {
    pub fn new(context: &'ctx Context, solver_timeout_ms: Option<u32>) -> Self {
        Self::from_parts(
            ConcreteEnv::new(),
            SymState::with_timeout(context, solver_timeout_ms),
        )
    }

    pub fn from_parts(concrete: ConcreteEnv, symbolic: SymState<'ctx>) -> Self {
        Self {
            concrete,
            symbolic,
            infeasible: false,
            error: false,
        }
    }

    /// Split into two independent copies
    pub fn fork(self) -> (Self, Self) {
        let Self {
            concrete,
            symbolic,
            infeasible,
            error,
        } = self;
        let (parent_sym, child_sym) = symbolic.fork();

        let child = Self {
            concrete: concrete.clone(),
            symbolic: child_sym,
            infeasible,
            error,
        };
        let parent = Self {
            concrete,
            symbolic: parent_sym,
            infeasible,
            error,
        };
        (parent, child)
    }

    /// Replace the concrete environment with a model of the path condition.
    /// Tags the state infeasible and returns `false` when no model with
    /// `i64` values exists.
    pub fn refresh_witness(&mut self) -> Result<bool, ConcolicError> {
        match self.symbolic.pick_concrete_i64()? {
            Some(witness) => {
                self.concrete = witness;
                Ok(true)
            }
            None => {
                self.mark_infeasible();
                Ok(false)
            }
        }
    }

    pub fn mark_infeasible(&mut self) {
        self.infeasible = true;
    }

    pub fn mark_error(&mut self) {
        self.error = true;
    }

    pub fn is_infeasible(&self) -> bool {
        self.infeasible
    }

    pub fn is_error(&self) -> bool {
        self.error || self.symbolic.is_error()
    }

    pub fn is_valid(&self) -> bool {
        !(self.infeasible || self.error || self.symbolic.is_error())
    }

    /// Error wins over infeasible when both tags are set
    pub fn status(&self) -> StateStatus {
        if self.is_error() {
            StateStatus::Error
        } else if self.infeasible {
            StateStatus::Infeasible
        } else {
            StateStatus::Valid
        }
    }
}

impl fmt::Display for ConcolicState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Concrete State:")?;
        write!(f, "{}", EnvDisplay(&self.concrete))?;
        writeln!(f, "Symbolic State:")?;
        write!(f, "{}", self.symbolic)
    }
}

impl fmt::Debug for ConcolicState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcolicState")
            .field("concrete", &self.concrete)
            .field("symbolic", &self.symbolic)
            .field("infeasible", &self.infeasible)
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::{Ast, Int};
    use z3::Config;

    #[test]
    fn test_new_state_is_valid() {
        let ctx = Context::new(&Config::new());
        let state = ConcolicState::new(&ctx, None);
        assert!(state.is_valid());
        assert_eq!(state.status(), StateStatus::Valid);
    }

    #[test]
    fn test_flags_are_distinct() {
        let ctx = Context::new(&Config::new());

        let mut infeasible = ConcolicState::new(&ctx, None);
        infeasible.mark_infeasible();
        assert!(!infeasible.is_valid());
        assert!(!infeasible.is_error());
        assert_eq!(infeasible.status(), StateStatus::Infeasible);

        let mut error = ConcolicState::new(&ctx, None);
        error.mark_error();
        assert!(!error.is_infeasible());
        assert_eq!(error.status(), StateStatus::Error);

        let mut sym_error = ConcolicState::new(&ctx, None);
        sym_error.symbolic.mark_error();
        assert!(!sym_error.is_valid());
        assert_eq!(sym_error.status(), StateStatus::Error);
    }

    #[test]
    fn test_fork_copies_environments() {
        let ctx = Context::new(&Config::new());
        let mut state = ConcolicState::new(&ctx, None);
        state.concrete.insert("x".to_string(), 0);
        state.symbolic.havoc("x");

        let (mut parent, child) = state.fork();
        parent.concrete.insert("x".to_string(), 5);
        assert_eq!(child.concrete["x"], 0);
        assert_eq!(
            parent.symbolic.get("x").unwrap().to_string(),
            child.symbolic.get("x").unwrap().to_string()
        );
    }

    #[test]
    fn test_refresh_witness() {
        let ctx = Context::new(&Config::new());
        let mut state = ConcolicState::new(&ctx, None);
        state.concrete.insert("x".to_string(), 0);
        let x = state.symbolic.havoc("x");

        state
            .symbolic
            .add_pc([x._eq(&Int::from_i64(&ctx, 7))]);
        assert!(state.refresh_witness().unwrap());
        assert_eq!(state.concrete["x"], 7);
        assert!(state.is_valid());

        state
            .symbolic
            .add_pc([x._eq(&Int::from_i64(&ctx, 8))]);
        assert!(!state.refresh_witness().unwrap());
        assert_eq!(state.status(), StateStatus::Infeasible);
    }

    #[test]
    fn test_refresh_witness_outside_i64() {
        let ctx = Context::new(&Config::new());
        let mut state = ConcolicState::new(&ctx, None);
        state.concrete.insert("x".to_string(), 0);
        let x = state.symbolic.havoc("x");

        let max = Int::from_i64(&ctx, i64::MAX);
        state.symbolic.add_pc([x.gt(&max)]);
        assert!(!state.refresh_witness().unwrap());
        assert_eq!(state.status(), StateStatus::Infeasible);
        assert_eq!(state.concrete["x"], 0);
    }

    #[test]
    fn test_display_has_both_halves() {
        let ctx = Context::new(&Config::new());
        let mut state = ConcolicState::new(&ctx, None);
        state.concrete.insert("x".to_string(), 10);
        state.symbolic.assign("x", Int::from_i64(&ctx, 10));

        assert_eq!(
            state.to_string(),
            "Concrete State:\nx: 10\nSymbolic State:\nx: 10\npc: []\n"
        );
    }
}
