//! Travel-fee formula evaluation.
//!
//! Formulas are arithmetic over one variable, `miles`:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := number | "miles" | '(' expr ')'
//! ```
//!
//! Nothing else is accepted. There is no name lookup beyond `miles` and no
//! function calls.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

const VARIABLE: &str = "miles";
const MAX_DEPTH: usize = 64;
const MAX_LEN: usize = 512;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("formula is longer than {MAX_LEN} characters")]
    TooLong,
    #[error("unexpected character `{found}` at position {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("unknown identifier `{0}` (only `miles` is allowed)")]
    UnknownIdentifier(String),
    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("formula nests deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Expr {
    Number(Decimal),
    Miles,
    Neg(Box<Expr>),
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Number(Decimal),
    Miles,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Number(value) => format!("number `{value}`"),
            Self::Miles => "`miles`".to_string(),
            Self::Plus => "`+`".to_string(),
            Self::Minus => "`-`".to_string(),
            Self::Star => "`*`".to_string(),
            Self::Slash => "`/`".to_string(),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
        }
    }
}

/// A parsed formula, ready to be evaluated for any mileage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        if source.len() > MAX_LEN {
            return Err(FormulaError::TooLong);
        }
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }

        let mut parser = Parser { tokens: &tokens, cursor: 0, depth: 0 };
        let expr = parser.expr()?;
        if let Some((token, position)) = parser.peek() {
            return Err(FormulaError::UnexpectedToken { found: token.describe(), position });
        }

        Ok(Self { expr })
    }

    pub fn evaluate(&self, miles: Decimal) -> Result<Decimal, FormulaError> {
        eval(&self.expr, miles)
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

/// Parses and evaluates in one step.
pub fn evaluate(source: &str, miles: Decimal) -> Result<Decimal, FormulaError> {
    Formula::parse(source)?.evaluate(miles)
}

fn eval(expr: &Expr, miles: Decimal) -> Result<Decimal, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Miles => Ok(miles),
        Expr::Neg(inner) => Ok(-eval(inner, miles)?),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, miles)?;
            let rhs = eval(rhs, miles)?;
            match op {
                BinaryOp::Add => lhs.checked_add(rhs).ok_or(FormulaError::Overflow),
                BinaryOp::Sub => lhs.checked_sub(rhs).ok_or(FormulaError::Overflow),
                BinaryOp::Mul => lhs.checked_mul(rhs).ok_or(FormulaError::Overflow),
                BinaryOp::Div => {
                    if rhs.is_zero() {
                        return Err(FormulaError::DivisionByZero);
                    }
                    lhs.checked_div(rhs).ok_or(FormulaError::Overflow)
                }
            }
        }
    }
}

/// Tokens paired with their byte offset in the source.
fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        literal.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = Decimal::from_str(&literal)
                    .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
                Token::Number(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if ident != VARIABLE {
                    return Err(FormulaError::UnknownIdentifier(ident));
                }
                Token::Miles
            }
            found => return Err(FormulaError::UnexpectedChar { found, position }),
        };
        tokens.push((token, position));
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [(Token, usize)],
    cursor: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<(&'a Token, usize)> {
        self.tokens.get(self.cursor).map(|(token, position)| (token, *position))
    }

    fn advance(&mut self) -> Option<(&'a Token, usize)> {
        let next = self.tokens.get(self.cursor).map(|(token, position)| (token, *position));
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some((Token::Plus, _)) => BinaryOp::Add,
                Some((Token::Minus, _)) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some((Token::Star, _)) => BinaryOp::Mul,
                Some((Token::Slash, _)) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek() {
            Some((Token::Minus, _)) => {
                self.cursor += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some((Token::Plus, _)) => {
                self.cursor += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let (token, position) = self.advance().ok_or(FormulaError::UnexpectedEnd)?;
        match token {
            Token::Number(value) => Ok(Expr::Number(*value)),
            Token::Miles => Ok(Expr::Miles),
            Token::LParen => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((other, position)) => Err(FormulaError::UnexpectedToken {
                        found: other.describe(),
                        position,
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            other => Err(FormulaError::UnexpectedToken { found: other.describe(), position }),
        }
    }
}
