//! Abstract syntax tree for WLang programs
//!
//! Expressions are split into integer-valued [`AExp`] and boolean-valued
//! [`BExp`] trees, so every consumer matches exhaustively over a closed set
//! of node kinds.

use std::fmt;

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

/// Relational operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Le,
    Lt,
    Eq,
    Ge,
    Gt,
}

impl RelOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelOp::Le => "<=",
            RelOp::Lt => "<",
            RelOp::Eq => "=",
            RelOp::Ge => ">=",
            RelOp::Gt => ">",
        }
    }
}

/// Integer-valued expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AExp {
    Num(i64),
    Var(String),
    Bin(ArithOp, Box<AExp>, Box<AExp>),
}

impl AExp {
    pub fn var(name: impl Into<String>) -> Self {
        AExp::Var(name.into())
    }

    pub fn bin(op: ArithOp, lhs: AExp, rhs: AExp) -> Self {
        AExp::Bin(op, Box::new(lhs), Box::new(rhs))
    }
}

/// Boolean-valued expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BExp {
    Const(bool),
    Rel(RelOp, AExp, AExp),
    Not(Box<BExp>),
    /// Conjunction of all operands; empty means `true`
    And(Vec<BExp>),
    /// Disjunction of all operands; empty means `false`
    Or(Vec<BExp>),
}

impl BExp {
    pub fn rel(op: RelOp, lhs: AExp, rhs: AExp) -> Self {
        BExp::Rel(op, lhs, rhs)
    }

    pub fn negate(inner: BExp) -> Self {
        BExp::Not(Box::new(inner))
    }
}

/// Statement node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Skip,
    PrintState,
    Assign {
        name: String,
        rhs: AExp,
    },
    If {
        cond: BExp,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: BExp,
        /// Accepted by the parser, ignored by every executor
        invariant: Option<BExp>,
        body: Box<Stmt>,
    },
    Assert(BExp),
    Assume(BExp),
    Havoc(Vec<String>),
    Block(Vec<Stmt>),
}

impl Stmt {
    pub fn has_else(&self) -> bool {
        matches!(
            self,
            Stmt::If {
                else_branch: Some(_),
                ..
            }
        )
    }
}

impl fmt::Display for AExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AExp::Num(n) => write!(f, "{}", n),
            AExp::Var(name) => write!(f, "{}", name),
            AExp::Bin(op, lhs, rhs) => {
                write_operand(f, lhs)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, rhs)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, exp: &AExp) -> fmt::Result {
    match exp {
        AExp::Bin(..) => write!(f, "({})", exp),
        _ => write!(f, "{}", exp),
    }
}

impl fmt::Display for BExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BExp::Const(b) => write!(f, "{}", b),
            BExp::Rel(op, lhs, rhs) => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            BExp::Not(inner) => write!(f, "not ({})", inner),
            BExp::And(args) => write_connective(f, "and", args, |arg| {
                matches!(arg, BExp::Or(_) | BExp::And(_))
            }),
            BExp::Or(args) => {
                write_connective(f, "or", args, |arg| matches!(arg, BExp::Or(_)))
            }
        }
    }
}

fn write_connective(
    f: &mut fmt::Formatter<'_>,
    keyword: &str,
    args: &[BExp],
    needs_parens: impl Fn(&BExp) -> bool,
) -> fmt::Result {
    match args {
        // identity elements
        [] if keyword == "and" => write!(f, "true"),
        [] => write!(f, "false"),
        _ => {
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", keyword)?;
                }
                if needs_parens(arg) {
                    write!(f, "({})", arg)?;
                } else {
                    write!(f, "{}", arg)?;
                }
            }
            Ok(())
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Skip => write!(f, "skip"),
            Stmt::PrintState => write!(f, "print_state"),
            Stmt::Assign { name, rhs } => write!(f, "{} := {}", name, rhs),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                // an else-less `if` in then position would capture our `else`
                if else_branch.is_some() && matches!(**then_branch, Stmt::If { .. }) {
                    write!(f, "if {} then {{ {} }}", cond, then_branch)?;
                } else {
                    write!(f, "if {} then {}", cond, then_branch)?;
                }
                if let Some(else_branch) = else_branch {
                    write!(f, " else {}", else_branch)?;
                }
                Ok(())
            }
            Stmt::While {
                cond,
                invariant,
                body,
            } => {
                write!(f, "while {}", cond)?;
                if let Some(inv) = invariant {
                    write!(f, " inv {}", inv)?;
                }
                write!(f, " do {}", body)
            }
            Stmt::Assert(cond) => write!(f, "assert {}", cond),
            Stmt::Assume(cond) => write!(f, "assume {}", cond),
            Stmt::Havoc(vars) => write!(f, "havoc {}", vars.join(", ")),
            Stmt::Block(stmts) => {
                write!(f, "{{ ")?;
                for (i, stmt) in stmts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", stmt)?;
                }
                write!(f, " }}")
            }
        }
    }
}
