//! Concolic executor
//!
//! Drives the concrete interpreter and the symbolic executor in lockstep.
//! Every live path carries one concrete witness that satisfies its path
//! condition. At a branch the state is forked, each half gets the condition
//! (or its negation), and any feasible half whose truth value differs from
//! the concrete run is handed a freshly solved witness.
//!
//! Loops are unrolled symbolically up to `ExecConfig::unroll_bound` times.
//! A path still inside the loop at that depth is pinned to its current
//! witness and the rest of the loop is run concretely; afterwards every
//! variable is rebound to a fresh constant equal to its final value.
//!
//! Concrete arithmetic is `i64`. A path whose concrete run overflows, or
//! whose loop outlives the fuel budget, is tagged as an error and the rest of
//! the exploration carries on.

use tracing::{debug, info, warn};
use z3::ast::Bool;
use z3::Context;

use concrete_interpreter::{InterpError, Interpreter};
use symbolic_engine::{ConstraintBuilder, SymExecutor};
use wlang_syntax::{BExp, Stmt};

use crate::report::StateStatus;
use crate::state::ConcolicState;
use crate::{ConcolicError, ExecConfig};

/// Feasible halves of a fork, each with a witness for its own path
struct Split<'ctx> {
    passed: Option<ConcolicState<'ctx>>,
    failed: Option<ConcolicState<'ctx>>,
}

pub struct ConcolicExecutor<'ctx> {
    config: ExecConfig,
    interp: Interpreter,
    sym: SymExecutor<'ctx>,
    builder: ConstraintBuilder<'ctx>,
}

impl<'ctx> ConcolicExecutor<'ctx> {
    pub fn new(context: &'ctx Context, config: ExecConfig) -> Self {
        Self {
            interp: Interpreter::new(config.interp_config()),
            sym: SymExecutor::new(context, config.sym_config()),
            builder: ConstraintBuilder::new(context),
            config,
        }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Empty concrete and symbolic environments, no constraints
    pub fn initial_state(&self) -> ConcolicState<'ctx> {
        ConcolicState::new(self.builder.context(), self.config.solver_timeout_ms)
    }

    /// Explore `program` from `state`, returning every terminal state.
    /// Error and infeasible states are part of the result.
    pub fn run(
        &self,
        program: &Stmt,
        state: ConcolicState<'ctx>,
    ) -> Result<Vec<ConcolicState<'ctx>>, ConcolicError> {
        let states = self.exec(program, state)?;
        info!(
            total = states.len(),
            valid = states.iter().filter(|s| s.is_valid()).count(),
            "concolic exploration finished"
        );
        Ok(states)
    }

    pub fn exec(
        &self,
        stmt: &Stmt,
        mut st: ConcolicState<'ctx>,
    ) -> Result<Vec<ConcolicState<'ctx>>, ConcolicError> {
        match stmt {
            Stmt::Skip => Ok(vec![st]),
            Stmt::PrintState => {
                info!("state reached:\n{}", st);
                Ok(vec![st])
            }
            Stmt::Assign { name, rhs } => {
                let value = self.sym.eval_aexp(rhs, &st.symbolic)?;
                match self.interp.eval_aexp(rhs, &st.concrete) {
                    Ok(concrete) => {
                        st.symbolic.assign(name.clone(), value);
                        st.concrete.insert(name.clone(), concrete);
                    }
                    Err(err) => self.halt_path(stmt, &mut st, err)?,
                }
                Ok(vec![st])
            }
            Stmt::Havoc(vars) => {
                for var in vars {
                    st.symbolic.havoc(var);
                }
                st.concrete = self.interp.execute(stmt, std::mem::take(&mut st.concrete))?;
                Ok(vec![st])
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let Some(taken) = self.eval_guard(stmt, cond, &mut st)? else {
                    return Ok(vec![st]);
                };
                let Split { passed, failed } = self.split(cond, taken, st)?;

                let mut states = Vec::new();
                if let Some(passed) = passed {
                    states.extend(self.exec_if_valid(then_branch, passed)?);
                }
                if let Some(failed) = failed {
                    match else_branch {
                        Some(else_branch) => {
                            states.extend(self.exec_if_valid(else_branch, failed)?)
                        }
                        None => states.push(failed),
                    }
                }
                Ok(states)
            }
            Stmt::While { cond, body, .. } => self.exec_while(stmt, cond, body, st, 0),
            Stmt::Assert(cond) => {
                let Some(taken) = self.eval_guard(stmt, cond, &mut st)? else {
                    return Ok(vec![st]);
                };
                let Split { passed, failed } = self.split(cond, taken, st)?;
                let always_fails = passed.is_none();

                let mut states = Vec::new();
                states.extend(passed);
                if let Some(mut failed) = failed {
                    if always_fails {
                        warn!(node = %stmt, "[assert error] assertion always fails\n{}", failed);
                    } else {
                        warn!(node = %stmt, "[assert error] assertion can fail\n{}", failed);
                    }
                    failed.mark_error();
                    states.push(failed);
                }
                Ok(states)
            }
            Stmt::Assume(cond) => {
                let Some(holds) = self.eval_guard(stmt, cond, &mut st)? else {
                    return Ok(vec![st]);
                };
                let sym_cond = self.sym.eval_bexp(cond, &st.symbolic)?;
                st.symbolic.add_pc([sym_cond]);

                if st.symbolic.is_empty() {
                    warn!(node = %stmt, "[assume error] assumption cannot be satisfied\n{}", st);
                    st.mark_infeasible();
                } else if !holds && !st.refresh_witness()? {
                    warn!(node = %stmt, "[assume error] no witness for assumption\n{}", st);
                }
                Ok(vec![st])
            }
            Stmt::Block(stmts) => {
                let mut states = vec![st];
                for stmt in stmts {
                    let mut next = Vec::with_capacity(states.len());
                    for state in states {
                        next.extend(self.exec_if_valid(stmt, state)?);
                    }
                    states = next;
                }
                Ok(states)
            }
        }
    }

    /// Invalid states pass through untouched so they reach the final report
    fn exec_if_valid(
        &self,
        stmt: &Stmt,
        st: ConcolicState<'ctx>,
    ) -> Result<Vec<ConcolicState<'ctx>>, ConcolicError> {
        if st.is_valid() {
            self.exec(stmt, st)
        } else {
            Ok(vec![st])
        }
    }

    /// Concrete failures that only concern the current path tag it as an
    /// error; anything else aborts the exploration
    fn halt_path(
        &self,
        node: &Stmt,
        st: &mut ConcolicState<'ctx>,
        err: InterpError,
    ) -> Result<(), ConcolicError> {
        match err {
            InterpError::Overflow(_) | InterpError::FuelExhausted(_) => {
                warn!(node = %node, "[exec error] {}, abandoning path\n{}", err, st);
                st.mark_error();
                Ok(())
            }
            err => Err(err.into()),
        }
    }

    /// Concrete truth value of `cond`, or `None` if evaluating it halted the path
    fn eval_guard(
        &self,
        node: &Stmt,
        cond: &BExp,
        st: &mut ConcolicState<'ctx>,
    ) -> Result<Option<bool>, ConcolicError> {
        match self.interp.eval_bexp(cond, &st.concrete) {
            Ok(taken) => Ok(Some(taken)),
            Err(err) => self.halt_path(node, st, err).map(|()| None),
        }
    }

    /// Fork `st` on `cond`, whose concrete value is `taken`, and keep the
    /// satisfiable halves
    fn split(
        &self,
        cond: &BExp,
        taken: bool,
        st: ConcolicState<'ctx>,
    ) -> Result<Split<'ctx>, ConcolicError> {
        let sym_cond = self.sym.eval_bexp(cond, &st.symbolic)?;

        let (mut passed, mut failed) = st.fork();
        passed.symbolic.add_pc([sym_cond.clone()]);
        failed.symbolic.add_pc([sym_cond.not()]);

        let passed_sat = !passed.symbolic.is_empty();
        let failed_sat = !failed.symbolic.is_empty();
        let both = passed_sat && failed_sat;
        debug!(%cond, taken, passed_sat, failed_sat, "branch");

        let passed = if passed_sat {
            Some(self.align_witness(passed, taken, both)?)
        } else {
            None
        };
        let failed = if failed_sat {
            Some(self.align_witness(failed, !taken, both)?)
        } else {
            None
        };
        Ok(Split { passed, failed })
    }

    /// The old witness is only known to satisfy the branch the concrete run
    /// took; the other half needs its own
    fn align_witness(
        &self,
        mut st: ConcolicState<'ctx>,
        agrees: bool,
        both_feasible: bool,
    ) -> Result<ConcolicState<'ctx>, ConcolicError> {
        if !agrees {
            if !both_feasible {
                warn!("concrete run disagrees with the only feasible branch, re-solving witness");
            }
            if !st.refresh_witness()? {
                warn!("solver produced no witness for a feasible branch\n{}", st);
            }
        }
        Ok(st)
    }

    /// One unrolling step. The loop-exit state comes first, then everything
    /// reached by running the body and re-entering the loop.
    fn exec_while(
        &self,
        node: &Stmt,
        cond: &BExp,
        body: &Stmt,
        mut st: ConcolicState<'ctx>,
        depth: usize,
    ) -> Result<Vec<ConcolicState<'ctx>>, ConcolicError> {
        let Some(taken) = self.eval_guard(node, cond, &mut st)? else {
            return Ok(vec![st]);
        };
        let Split { passed, failed } = self.split(cond, taken, st)?;

        let mut states = Vec::new();
        states.extend(failed);

        let Some(passed) = passed else {
            return Ok(states);
        };
        if !passed.is_valid() {
            states.push(passed);
        } else if depth >= self.config.unroll_bound {
            states.push(self.finish_concretely(node, passed)?);
        } else {
            for st in self.exec(body, passed)? {
                if st.is_valid() {
                    states.extend(self.exec_while(node, cond, body, st, depth + 1)?);
                } else {
                    states.push(st);
                }
            }
        }
        Ok(states)
    }

    /// Give up on symbolic unrolling: run the rest of the loop on the
    /// concrete witness and re-synchronise the symbolic state with the result
    fn finish_concretely(
        &self,
        node: &Stmt,
        mut st: ConcolicState<'ctx>,
    ) -> Result<ConcolicState<'ctx>, ConcolicError> {
        debug!(
            bound = self.config.unroll_bound,
            "unroll bound reached, completing loop concretely"
        );

        // the concrete run below is only representative of this entry witness
        let entry: Vec<Bool<'ctx>> = st
            .symbolic
            .env()
            .iter()
            .filter_map(|(name, term)| {
                st.concrete
                    .get(name)
                    .map(|value| self.builder.build_pin(term, *value))
            })
            .collect();
        st.symbolic.add_pc(entry);

        let (env, failure) = match self.interp.execute(node, st.concrete.clone()) {
            Ok(env) => (env, None),
            Err(InterpError::AssertionFailed { cond, env }) => (env, Some((StateStatus::Error, cond))),
            Err(InterpError::AssumptionViolated { cond, env }) => {
                (env, Some((StateStatus::Infeasible, cond)))
            }
            Err(err) => {
                self.halt_path(node, &mut st, err)?;
                return Ok(st);
            }
        };

        let exit: Vec<Bool<'ctx>> = env
            .iter()
            .map(|(name, value)| {
                let fresh = st.symbolic.havoc(name);
                self.builder.build_pin(&fresh, *value)
            })
            .collect();
        st.symbolic.add_pc(exit);
        st.concrete = env;

        match failure {
            Some((StateStatus::Error, cond)) => {
                warn!(
                    node = %node,
                    "[assert error] `assert {}` fails while completing loop concretely\n{}",
                    cond,
                    st
                );
                st.mark_error();
            }
            Some((_, cond)) => {
                warn!(
                    node = %node,
                    "[assume error] `assume {}` violated while completing loop concretely\n{}",
                    cond,
                    st
                );
                st.mark_infeasible();
            }
            None => {}
        }
        Ok(st)
    }
}
