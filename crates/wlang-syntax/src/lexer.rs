//! WLang lexer
//!
//! Tokenizes WLang source using the logos crate.

use logos::Logos;
use std::fmt;
use std::ops::Range;

use crate::parser::ParseError;

/// WLang tokens
#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"[ \t\n\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token<'a> {
    #[token("skip")]
    Skip,
    #[token("print_state")]
    PrintState,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("inv")]
    Inv,
    #[token("do")]
    Do,
    #[token("assert")]
    Assert,
    #[token("assume")]
    Assume,
    #[token("havoc")]
    Havoc,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    #[token(":=")]
    Assign,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("<=")]
    Le,
    #[token("<")]
    Lt,
    #[token("=")]
    Eq,
    #[token(">=")]
    Ge,
    #[token(">")]
    Gt,

    /// Non-negative decimal literal, range-checked by the parser
    #[regex(r"[0-9]+", |lex| lex.slice())]
    Number(&'a str),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice())]
    Name(&'a str),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Skip => "skip",
            Token::PrintState => "print_state",
            Token::If => "if",
            Token::Then => "then",
            Token::Else => "else",
            Token::While => "while",
            Token::Inv => "inv",
            Token::Do => "do",
            Token::Assert => "assert",
            Token::Assume => "assume",
            Token::Havoc => "havoc",
            Token::True => "true",
            Token::False => "false",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Assign => ":=",
            Token::Semi => ";",
            Token::Comma => ",",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Le => "<=",
            Token::Lt => "<",
            Token::Eq => "=",
            Token::Ge => ">=",
            Token::Gt => ">",
            Token::Number(s) | Token::Name(s) => s,
        };
        f.write_str(text)
    }
}

/// A token together with its byte span in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    pub span: Range<usize>,
}

/// Tokenize the whole input up front so the parser can backtrack
pub fn tokenize(source: &str) -> Result<Vec<Spanned<'_>>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(Spanned { token, span }),
            Err(()) => {
                return Err(ParseError::InvalidToken {
                    offset: span.start,
                    text: lexer.slice().to_string(),
                })
            }
        }
    }

    Ok(tokens)
}
