//! Recursive-descent parser for WLang
//!
//! The parser works over a pre-tokenized buffer and backtracks in one place:
//! a `(` in boolean position may open either a parenthesised boolean or the
//! left operand of a relation such as `(x + 1) > 2`.

use crate::ast::{AExp, ArithOp, BExp, RelOp, Stmt};
use crate::lexer::{tokenize, Spanned, Token};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid token {text:?} at offset {offset}")]
    InvalidToken { offset: usize, text: String },
    #[error("expected {expected} but found {found:?} at offset {offset}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },
    #[error("expected {expected} but reached end of input")]
    UnexpectedEof { expected: String },
    #[error("integer literal {text} at offset {offset} does not fit in 64 bits")]
    IntegerOutOfRange { text: String, offset: usize },
}

/// Parse a complete program
pub fn parse_program(source: &str) -> Result<Stmt, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let program = parser.stmt_list()?;
    parser.expect_end()?;
    Ok(program)
}

/// Parse a standalone boolean expression
pub fn parse_bexp(source: &str) -> Result<BExp, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let exp = parser.bexp()?;
    parser.expect_end()?;
    Ok(exp)
}

/// Parse a standalone arithmetic expression
pub fn parse_aexp(source: &str) -> Result<AExp, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let exp = parser.aexp()?;
    parser.expect_end()?;
    Ok(exp)
}

struct Parser<'t, 'src> {
    tokens: &'t [Spanned<'src>],
    pos: usize,
}

impl<'t, 'src> Parser<'t, 'src> {
    fn new(tokens: &'t [Spanned<'src>]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).map(|s| s.token)
    }

    fn bump(&mut self) -> Option<Token<'src>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: Token<'src>) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(spanned) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: spanned.token.to_string(),
                offset: spanned.span.start,
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }

    fn expect(&mut self, expected: Token<'src>) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("'{}'", expected)))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.error("end of input"))
        }
    }

    fn name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Name(name)) => {
                self.pos += 1;
                Ok(name.to_string())
            }
            _ => Err(self.error("identifier")),
        }
    }

    /// `stmt (';' stmt)* [';']`
    fn stmt_list(&mut self) -> Result<Stmt, ParseError> {
        let mut stmts = vec![self.stmt()?];
        while self.eat(Token::Semi) {
            match self.peek() {
                None | Some(Token::RBrace) => break,
                _ => stmts.push(self.stmt()?),
            }
        }
        Ok(Stmt::Block(stmts))
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::LBrace) => {
                self.pos += 1;
                let block = self.stmt_list()?;
                self.expect(Token::RBrace)?;
                Ok(block)
            }
            Some(Token::Skip) => {
                self.pos += 1;
                Ok(Stmt::Skip)
            }
            Some(Token::PrintState) => {
                self.pos += 1;
                Ok(Stmt::PrintState)
            }
            Some(Token::Name(_)) => {
                let name = self.name()?;
                self.expect(Token::Assign)?;
                let rhs = self.aexp()?;
                Ok(Stmt::Assign { name, rhs })
            }
            Some(Token::If) => {
                self.pos += 1;
                let cond = self.bexp()?;
                self.expect(Token::Then)?;
                let then_branch = Box::new(self.stmt()?);
                let else_branch = if self.eat(Token::Else) {
                    Some(Box::new(self.stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            Some(Token::While) => {
                self.pos += 1;
                let cond = self.bexp()?;
                let invariant = if self.eat(Token::Inv) {
                    Some(self.bexp()?)
                } else {
                    None
                };
                self.expect(Token::Do)?;
                let body = Box::new(self.stmt()?);
                Ok(Stmt::While {
                    cond,
                    invariant,
                    body,
                })
            }
            Some(Token::Assert) => {
                self.pos += 1;
                Ok(Stmt::Assert(self.bexp()?))
            }
            Some(Token::Assume) => {
                self.pos += 1;
                Ok(Stmt::Assume(self.bexp()?))
            }
            Some(Token::Havoc) => {
                self.pos += 1;
                let mut vars = vec![self.name()?];
                while self.eat(Token::Comma) {
                    vars.push(self.name()?);
                }
                Ok(Stmt::Havoc(vars))
            }
            _ => Err(self.error("statement")),
        }
    }

    /// `bterm ('or' bterm)*`
    fn bexp(&mut self) -> Result<BExp, ParseError> {
        let first = self.bterm()?;
        if self.peek() != Some(Token::Or) {
            return Ok(first);
        }
        let mut args = vec![first];
        while self.eat(Token::Or) {
            args.push(self.bterm()?);
        }
        Ok(BExp::Or(args))
    }

    /// `bfactor ('and' bfactor)*`
    fn bterm(&mut self) -> Result<BExp, ParseError> {
        let first = self.bfactor()?;
        if self.peek() != Some(Token::And) {
            return Ok(first);
        }
        let mut args = vec![first];
        while self.eat(Token::And) {
            args.push(self.bfactor()?);
        }
        Ok(BExp::And(args))
    }

    fn bfactor(&mut self) -> Result<BExp, ParseError> {
        if self.eat(Token::Not) {
            Ok(BExp::negate(self.batom()?))
        } else {
            self.batom()
        }
    }

    fn batom(&mut self) -> Result<BExp, ParseError> {
        match self.peek() {
            Some(Token::True) => {
                self.pos += 1;
                Ok(BExp::Const(true))
            }
            Some(Token::False) => {
                self.pos += 1;
                Ok(BExp::Const(false))
            }
            Some(Token::LParen) => {
                let checkpoint = self.pos;
                self.pos += 1;
                if let Ok(inner) = self.bexp() {
                    if self.eat(Token::RParen) && !self.at_rel_op() {
                        return Ok(inner);
                    }
                }
                self.pos = checkpoint;
                self.rexp()
            }
            _ => self.rexp(),
        }
    }

    fn at_rel_op(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Le | Token::Lt | Token::Eq | Token::Ge | Token::Gt)
        )
    }

    /// `aexp RELOP aexp`
    fn rexp(&mut self) -> Result<BExp, ParseError> {
        let lhs = self.aexp()?;
        let op = match self.peek() {
            Some(Token::Le) => RelOp::Le,
            Some(Token::Lt) => RelOp::Lt,
            Some(Token::Eq) => RelOp::Eq,
            Some(Token::Ge) => RelOp::Ge,
            Some(Token::Gt) => RelOp::Gt,
            _ => return Err(self.error("relational operator")),
        };
        self.pos += 1;
        let rhs = self.aexp()?;
        Ok(BExp::rel(op, lhs, rhs))
    }

    /// `term (('+'|'-') term)*`, left associative
    fn aexp(&mut self) -> Result<AExp, ParseError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = AExp::bin(op, lhs, rhs);
        }
    }

    /// `factor (('*'|'/') factor)*`, left associative
    fn term(&mut self) -> Result<AExp, ParseError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = AExp::bin(op, lhs, rhs);
        }
    }

    fn factor(&mut self) -> Result<AExp, ParseError> {
        match self.peek() {
            Some(Token::Number(_)) => self.number(false),
            Some(Token::Minus) => {
                self.pos += 1;
                match self.peek() {
                    Some(Token::Number(_)) => self.number(true),
                    _ => Err(self.error("integer literal")),
                }
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                Ok(AExp::var(name))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.aexp()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.error("arithmetic expression")),
        }
    }

    fn number(&mut self, negative: bool) -> Result<AExp, ParseError> {
        let offset = self.tokens[self.pos].span.start;
        let Some(Token::Number(text)) = self.bump() else {
            return Err(self.error("integer literal"));
        };
        let literal = if negative {
            format!("-{}", text)
        } else {
            text.to_string()
        };
        literal
            .parse::<i64>()
            .map(AExp::Num)
            .map_err(|_| ParseError::IntegerOutOfRange {
                text: literal,
                offset,
            })
    }
}
