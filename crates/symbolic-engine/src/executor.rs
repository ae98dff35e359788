//! Symbolic executor
//!
//! Walks a WLang program and returns every feasible symbolic state reached
//! at its end. Branches fork the current state; a branch is explored only if
//! its path condition is satisfiable.
//!
//! Loops are unrolled up to `SymConfig::unroll_bound` times. Paths that would
//! need more iterations are dropped, so the result under-approximates the
//! program's behaviour for long-running loops.

use tracing::{debug, info, warn};
use z3::ast::{Bool, Int};
use z3::Context;

use wlang_syntax::{AExp, BExp, Stmt};

use crate::constraint_builder::ConstraintBuilder;
use crate::state_model::SymState;
use crate::{SymConfig, SymbolicError};

pub struct SymExecutor<'ctx> {
    builder: ConstraintBuilder<'ctx>,
    config: SymConfig,
}

impl<'ctx> SymExecutor<'ctx> {
    pub fn new(context: &'ctx Context, config: SymConfig) -> Self {
        Self {
            builder: ConstraintBuilder::new(context),
            config,
        }
    }

    pub fn config(&self) -> &SymConfig {
        &self.config
    }

    /// Empty state wired to this executor's solver settings
    pub fn initial_state(&self) -> SymState<'ctx> {
        SymState::with_timeout(self.builder.context(), self.config.solver_timeout_ms)
    }

    pub fn run(
        &self,
        program: &Stmt,
        state: SymState<'ctx>,
    ) -> Result<Vec<SymState<'ctx>>, SymbolicError> {
        let states = self.exec(program, state)?;
        debug!(states = states.len(), "symbolic exploration finished");
        Ok(states)
    }

    pub fn eval_aexp(
        &self,
        exp: &AExp,
        state: &SymState<'ctx>,
    ) -> Result<Int<'ctx>, SymbolicError> {
        self.builder.aexp(exp, state.env())
    }

    pub fn eval_bexp(
        &self,
        exp: &BExp,
        state: &SymState<'ctx>,
    ) -> Result<Bool<'ctx>, SymbolicError> {
        self.builder.bexp(exp, state.env())
    }

    pub fn exec(
        &self,
        stmt: &Stmt,
        mut state: SymState<'ctx>,
    ) -> Result<Vec<SymState<'ctx>>, SymbolicError> {
        match stmt {
            Stmt::Skip => Ok(vec![state]),
            Stmt::PrintState => {
                info!("state reached:\n{}", state);
                Ok(vec![state])
            }
            Stmt::Assign { name, rhs } => {
                let value = self.eval_aexp(rhs, &state)?;
                state.assign(name.clone(), value);
                Ok(vec![state])
            }
            Stmt::Havoc(vars) => {
                for var in vars {
                    state.havoc(var);
                }
                Ok(vec![state])
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval_bexp(cond, &state)?;
                let (mut then_st, mut else_st) = state.fork();
                then_st.add_pc([cond.clone()]);
                else_st.add_pc([cond.not()]);

                let mut states = Vec::new();
                if !then_st.is_empty() {
                    states.extend(self.exec(then_branch, then_st)?);
                }
                if !else_st.is_empty() {
                    match else_branch {
                        Some(else_branch) => states.extend(self.exec(else_branch, else_st)?),
                        None => states.push(else_st),
                    }
                }
                Ok(states)
            }
            Stmt::While { cond, body, .. } => self.exec_while(cond, body, state, 0),
            Stmt::Assert(cond) => {
                let cond = self.eval_bexp(cond, &state)?;
                let (mut true_st, mut false_st) = state.fork();

                let mut states = Vec::new();
                false_st.add_pc([cond.not()]);
                if !false_st.is_empty() {
                    warn!(node = %stmt, "assertion may fail\n{}", false_st);
                    false_st.mark_error();
                    states.push(false_st);
                }

                true_st.add_pc([cond]);
                if !true_st.is_empty() {
                    states.push(true_st);
                }
                Ok(states)
            }
            Stmt::Assume(cond) => {
                let cond = self.eval_bexp(cond, &state)?;
                state.add_pc([cond]);
                if state.is_empty() {
                    debug!(node = %stmt, "assumption prunes path");
                    Ok(Vec::new())
                } else {
                    Ok(vec![state])
                }
            }
            Stmt::Block(stmts) => {
                let mut states = vec![state];
                for stmt in stmts {
                    let mut next = Vec::with_capacity(states.len());
                    for st in states {
                        if st.is_error() {
                            next.push(st);
                        } else {
                            next.extend(self.exec(stmt, st)?);
                        }
                    }
                    states = next;
                }
                Ok(states)
            }
        }
    }

    /// One unrolling step. The exit state comes first, followed by every
    /// state produced by running the body and looping again.
    fn exec_while(
        &self,
        cond: &BExp,
        body: &Stmt,
        state: SymState<'ctx>,
        depth: usize,
    ) -> Result<Vec<SymState<'ctx>>, SymbolicError> {
        let sym_cond = self.eval_bexp(cond, &state)?;
        let (mut true_st, mut false_st) = state.fork();
        true_st.add_pc([sym_cond.clone()]);
        false_st.add_pc([sym_cond.not()]);

        let mut states = Vec::new();
        if !false_st.is_empty() {
            states.push(false_st);
        }

        if true_st.is_empty() {
            return Ok(states);
        }
        if depth >= self.config.unroll_bound {
            debug!(depth, "unroll bound reached, dropping path");
            return Ok(states);
        }

        for st in self.exec(body, true_st)? {
            if st.is_error() {
                states.push(st);
            } else {
                states.extend(self.exec_while(cond, body, st, depth + 1)?);
            }
        }
        Ok(states)
    }
}
