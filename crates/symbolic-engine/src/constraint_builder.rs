//! Constraint Builder for Symbolic Execution
//!
//! Translates WLang expressions into Z3 terms over a symbolic environment.

use z3::ast::{Ast, Bool, Int};
use z3::Context;

use wlang_syntax::{AExp, ArithOp, BExp, RelOp};

use crate::{SymEnv, SymbolicError};

pub struct ConstraintBuilder<'ctx> {
    context: &'ctx Context,
}

impl<'ctx> ConstraintBuilder<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    pub fn aexp(&self, exp: &AExp, env: &SymEnv<'ctx>) -> Result<Int<'ctx>, SymbolicError> {
        match exp {
            AExp::Num(n) => Ok(Int::from_i64(self.context, *n)),
            AExp::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| SymbolicError::UndefinedVariable(name.clone())),
            AExp::Bin(op, lhs, rhs) => {
                let l = self.aexp(lhs, env)?;
                let r = self.aexp(rhs, env)?;
                Ok(match op {
                    ArithOp::Add => Int::add(self.context, &[&l, &r]),
                    ArithOp::Sub => Int::sub(self.context, &[&l, &r]),
                    ArithOp::Mul => Int::mul(self.context, &[&l, &r]),
                    ArithOp::Div => self.build_div(&l, &r),
                })
            }
        }
    }

    pub fn bexp(&self, exp: &BExp, env: &SymEnv<'ctx>) -> Result<Bool<'ctx>, SymbolicError> {
        match exp {
            BExp::Const(b) => Ok(Bool::from_bool(self.context, *b)),
            BExp::Rel(op, lhs, rhs) => {
                let l = self.aexp(lhs, env)?;
                let r = self.aexp(rhs, env)?;
                Ok(match op {
                    RelOp::Le => l.le(&r),
                    RelOp::Lt => l.lt(&r),
                    RelOp::Eq => l._eq(&r),
                    RelOp::Ge => l.ge(&r),
                    RelOp::Gt => l.gt(&r),
                })
            }
            BExp::Not(inner) => Ok(self.bexp(inner, env)?.not()),
            BExp::And(args) => {
                let mut acc = Bool::from_bool(self.context, true);
                for arg in args {
                    acc = Bool::and(self.context, &[&acc, &self.bexp(arg, env)?]);
                }
                Ok(acc)
            }
            BExp::Or(args) => {
                let mut acc = Bool::from_bool(self.context, false);
                for arg in args {
                    acc = Bool::or(self.context, &[&acc, &self.bexp(arg, env)?]);
                }
                Ok(acc)
            }
        }
    }

    /// Euclidean division, with `x / 0 = 0` to match the concrete interpreter.
    /// SMT-LIB leaves division by zero unspecified, hence the guard.
    pub fn build_div(&self, dividend: &Int<'ctx>, divisor: &Int<'ctx>) -> Int<'ctx> {
        let zero = Int::from_i64(self.context, 0);
        divisor._eq(&zero).ite(&zero, &dividend.div(divisor))
    }

    /// `term = value`, used to pin a symbolic term to a concrete witness
    pub fn build_pin(&self, term: &Int<'ctx>, value: i64) -> Bool<'ctx> {
        term._eq(&Int::from_i64(self.context, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlang_syntax::{parse_aexp, parse_bexp};
    use z3::{SatResult, Solver};

    fn env_with<'ctx>(ctx: &'ctx Context, names: &[&str]) -> SymEnv<'ctx> {
        names
            .iter()
            .map(|n| (n.to_string(), Int::new_const(ctx, *n)))
            .collect()
    }

    #[test]
    fn test_division_agrees_with_concrete_semantics() {
        let cfg = z3::Config::new();
        let ctx = Context::new(&cfg);
        let builder = ConstraintBuilder::new(&ctx);
        let env = SymEnv::new();

        for (source, expected) in [("-7 / 2", -4), ("7 / -2", -3), ("5 / 0", 0)] {
            let term = builder.aexp(&parse_aexp(source).unwrap(), &env).unwrap();
            let solver = Solver::new(&ctx);
            solver.assert(&builder.build_pin(&term, expected));
            assert_eq!(solver.check(), SatResult::Sat, "{}", source);
            solver.assert(&builder.build_pin(&term, expected).not());
            assert_eq!(solver.check(), SatResult::Unsat, "{}", source);
        }
    }

    #[test]
    fn test_boolean_encoding() {
        let cfg = z3::Config::new();
        let ctx = Context::new(&cfg);
        let builder = ConstraintBuilder::new(&ctx);
        let env = env_with(&ctx, &["x"]);

        let exp = parse_bexp("x > 0 and x < 5 or x > 10").unwrap();
        let cond = builder.bexp(&exp, &env).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&cond);
        solver.assert(&builder.build_pin(&env["x"], 7));
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn test_undefined_variable() {
        let cfg = z3::Config::new();
        let ctx = Context::new(&cfg);
        let builder = ConstraintBuilder::new(&ctx);

        let err = builder
            .aexp(&parse_aexp("y + 1").unwrap(), &SymEnv::new())
            .unwrap_err();
        assert!(matches!(err, SymbolicError::UndefinedVariable(ref v) if v == "y"));
    }
}
