//! Concrete Interpreter for WLang
//!
//! Evaluates expressions and executes statements over a single concrete
//! integer environment. Execution is deterministic and never forks.
//!
//! Integer division follows the SMT-LIB `div` convention (Euclidean, the
//! remainder is never negative) and `x / 0` evaluates to `0`, so that the
//! concrete and symbolic sides agree on every input.

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};
use wlang_syntax::{AExp, ArithOp, BExp, RelOp, Stmt};

/// Variable name -> concrete value
pub type ConcreteEnv = BTreeMap<String, i64>;

/// Value assigned to every havoc'd variable unless configured otherwise
pub const DEFAULT_HAVOC_VALUE: i64 = 0;

/// Loop iterations allowed per `execute` call unless configured otherwise
pub const DEFAULT_FUEL: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("integer overflow evaluating `{0}`")]
    Overflow(String),
    #[error("assertion `{cond}` failed")]
    AssertionFailed { cond: String, env: ConcreteEnv },
    #[error("assumption `{cond}` does not hold")]
    AssumptionViolated { cond: String, env: ConcreteEnv },
    #[error("loop iteration budget of {0} exhausted")]
    FuelExhausted(u64),
}

/// Interpreter configuration
#[derive(Debug, Clone)]
pub struct InterpConfig {
    pub havoc_value: i64,
    pub fuel: u64,
}

impl Default for InterpConfig {
    fn default() -> Self {
        Self {
            havoc_value: DEFAULT_HAVOC_VALUE,
            fuel: DEFAULT_FUEL,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: InterpConfig,
}

impl Interpreter {
    pub fn new(config: InterpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpConfig {
        &self.config
    }

    pub fn eval_aexp(&self, exp: &AExp, env: &ConcreteEnv) -> Result<i64, InterpError> {
        match exp {
            AExp::Num(n) => Ok(*n),
            AExp::Var(name) => env
                .get(name)
                .copied()
                .ok_or_else(|| InterpError::UndefinedVariable(name.clone())),
            AExp::Bin(op, lhs, rhs) => {
                let l = self.eval_aexp(lhs, env)?;
                let r = self.eval_aexp(rhs, env)?;
                apply_arith(*op, l, r).ok_or_else(|| InterpError::Overflow(exp.to_string()))
            }
        }
    }

    /// Evaluates every operand; `and`/`or` do not short-circuit
    pub fn eval_bexp(&self, exp: &BExp, env: &ConcreteEnv) -> Result<bool, InterpError> {
        match exp {
            BExp::Const(b) => Ok(*b),
            BExp::Rel(op, lhs, rhs) => {
                let l = self.eval_aexp(lhs, env)?;
                let r = self.eval_aexp(rhs, env)?;
                Ok(apply_rel(*op, l, r))
            }
            BExp::Not(inner) => Ok(!self.eval_bexp(inner, env)?),
            BExp::And(args) => args
                .iter()
                .map(|arg| self.eval_bexp(arg, env))
                .try_fold(true, |acc, value| value.map(|v| acc & v)),
            BExp::Or(args) => args
                .iter()
                .map(|arg| self.eval_bexp(arg, env))
                .try_fold(false, |acc, value| value.map(|v| acc | v)),
        }
    }

    /// Execute a statement, returning the updated environment
    pub fn execute(&self, stmt: &Stmt, env: ConcreteEnv) -> Result<ConcreteEnv, InterpError> {
        let mut fuel = self.config.fuel;
        self.exec(stmt, env, &mut fuel)
    }

    /// Same as [`Interpreter::execute`], wrapped in a one-element sequence
    /// to line up with executors that fork
    pub fn run(&self, stmt: &Stmt, env: ConcreteEnv) -> Result<Vec<ConcreteEnv>, InterpError> {
        Ok(vec![self.execute(stmt, env)?])
    }

    fn exec(
        &self,
        stmt: &Stmt,
        mut env: ConcreteEnv,
        fuel: &mut u64,
    ) -> Result<ConcreteEnv, InterpError> {
        match stmt {
            Stmt::Skip => Ok(env),
            Stmt::PrintState => {
                debug!(state = %EnvDisplay(&env), "print_state");
                Ok(env)
            }
            Stmt::Assign { name, rhs } => {
                let value = self.eval_aexp(rhs, &env)?;
                env.insert(name.clone(), value);
                Ok(env)
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_bexp(cond, &env)? {
                    self.exec(then_branch, env, fuel)
                } else if let Some(else_branch) = else_branch {
                    self.exec(else_branch, env, fuel)
                } else {
                    Ok(env)
                }
            }
            Stmt::While { cond, body, .. } => {
                while self.eval_bexp(cond, &env)? {
                    if *fuel == 0 {
                        return Err(InterpError::FuelExhausted(self.config.fuel));
                    }
                    *fuel -= 1;
                    env = self.exec(body, env, fuel)?;
                }
                trace!(remaining_fuel = *fuel, "loop exited");
                Ok(env)
            }
            Stmt::Assert(cond) => {
                if self.eval_bexp(cond, &env)? {
                    Ok(env)
                } else {
                    Err(InterpError::AssertionFailed {
                        cond: cond.to_string(),
                        env,
                    })
                }
            }
            Stmt::Assume(cond) => {
                if self.eval_bexp(cond, &env)? {
                    Ok(env)
                } else {
                    Err(InterpError::AssumptionViolated {
                        cond: cond.to_string(),
                        env,
                    })
                }
            }
            Stmt::Havoc(vars) => {
                for var in vars {
                    env.insert(var.clone(), self.config.havoc_value);
                }
                Ok(env)
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    env = self.exec(stmt, env, fuel)?;
                }
                Ok(env)
            }
        }
    }
}

/// `None` on overflow
pub fn apply_arith(op: ArithOp, l: i64, r: i64) -> Option<i64> {
    match op {
        ArithOp::Add => l.checked_add(r),
        ArithOp::Sub => l.checked_sub(r),
        ArithOp::Mul => l.checked_mul(r),
        ArithOp::Div if r == 0 => Some(0),
        ArithOp::Div => l.checked_div_euclid(r),
    }
}

pub fn apply_rel(op: RelOp, l: i64, r: i64) -> bool {
    match op {
        RelOp::Le => l <= r,
        RelOp::Lt => l < r,
        RelOp::Eq => l == r,
        RelOp::Ge => l >= r,
        RelOp::Gt => l > r,
    }
}

/// Renders an environment as `name: value` lines
pub struct EnvDisplay<'a>(pub &'a ConcreteEnv);

impl fmt::Display for EnvDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.0 {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}
