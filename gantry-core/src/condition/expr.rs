// Guard expression tree
// Guards are parsed once into a typed AST instead of being re-interpreted as
// strings at every evaluation site.

use crate::condition::ConditionError;

use std::fmt;

/// Typed guard expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// Literal value: 'string', true, false
    Literal(Literal),

    /// Bare identifier: an axis name, `os`, or a status name in comparisons
    Ident(String),

    /// Reference to a prior step's outcome: outcome('step-id')
    Outcome(String),

    /// Logical negation: !expr
    Not(Box<Guard>),

    /// Logical conjunction: a && b
    And(Box<Guard>, Box<Guard>),

    /// Logical disjunction: a || b
    Or(Box<Guard>, Box<Guard>),

    /// Equality comparison: a == b, a != b
    Compare {
        op: CompareOp,
        left: Box<Guard>,
        right: Box<Guard>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Ne => write!(f, "!="),
        }
    }
}

impl Guard {
    /// Parse a guard expression from its source string.
    pub fn parse(input: &str) -> Result<Guard, ConditionError> {
        let tokens = tokenize(input)?;
        let mut parser = GuardParser {
            tokens,
            position: 0,
        };
        parser.parse()
    }

    // Constructors for building guards in code without going through the
    // string form.

    pub fn ident(name: impl Into<String>) -> Guard {
        Guard::Ident(name.into())
    }

    pub fn string(value: impl Into<String>) -> Guard {
        Guard::Literal(Literal::Str(value.into()))
    }

    pub fn outcome(step: impl Into<String>) -> Guard {
        Guard::Outcome(step.into())
    }

    pub fn eq(left: Guard, right: Guard) -> Guard {
        Guard::Compare {
            op: CompareOp::Eq,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn ne(left: Guard, right: Guard) -> Guard {
        Guard::Compare {
            op: CompareOp::Ne,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Guard, right: Guard) -> Guard {
        Guard::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Guard, right: Guard) -> Guard {
        Guard::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: Guard) -> Guard {
        Guard::Not(Box::new(inner))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
    Eof,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => pos += 1,
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            '&' => {
                if bytes.get(pos + 1) == Some(&b'&') {
                    tokens.push(Token::AndAnd);
                    pos += 2;
                } else {
                    return Err(parse_error("expected '&&'", pos));
                }
            }
            '|' => {
                if bytes.get(pos + 1) == Some(&b'|') {
                    tokens.push(Token::OrOr);
                    pos += 2;
                } else {
                    return Err(parse_error("expected '||'", pos));
                }
            }
            '=' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::EqEq);
                    pos += 2;
                } else {
                    return Err(parse_error("expected '=='", pos));
                }
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::NotEq);
                    pos += 2;
                } else {
                    tokens.push(Token::Bang);
                    pos += 1;
                }
            }
            '\'' => {
                let start = pos + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != b'\'' {
                    end += 1;
                }
                if end >= bytes.len() {
                    return Err(parse_error("unterminated string literal", pos));
                }
                tokens.push(Token::Str(input[start..end].to_string()));
                pos = end + 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < bytes.len() {
                    let b = bytes[pos] as char;
                    if b.is_ascii_alphanumeric() || b == '_' || b == '-' || b == '.' {
                        pos += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[start..pos].to_string()));
            }
            _ => return Err(parse_error(&format!("unexpected character '{}'", c), pos)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn parse_error(message: &str, position: usize) -> ConditionError {
    ConditionError::Parse {
        message: message.to_string(),
        position,
    }
}

/// Recursive descent parser for guard expressions.
///
/// Precedence (lowest to highest): `||`, `&&`, `==`/`!=`, `!`, primary.
struct GuardParser {
    tokens: Vec<Token>,
    position: usize,
}

impl GuardParser {
    fn parse(&mut self) -> Result<Guard, ConditionError> {
        let expr = self.parse_or()?;
        if self.peek() != &Token::Eof {
            return Err(parse_error(
                &format!("unexpected token {:?}", self.peek()),
                self.position,
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Guard, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::OrOr {
            self.advance();
            let right = self.parse_and()?;
            left = Guard::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Guard, ConditionError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == &Token::AndAnd {
            self.advance();
            let right = self.parse_comparison()?;
            left = Guard::and(left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Guard, ConditionError> {
        let left = self.parse_unary()?;
        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::Ne,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_unary()?;
        Ok(Guard::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_unary(&mut self) -> Result<Guard, ConditionError> {
        if self.peek() == &Token::Bang {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Guard::not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Guard, ConditionError> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::Str(s) => {
                self.advance();
                Ok(Guard::Literal(Literal::Str(s)))
            }
            Token::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Ok(Guard::Literal(Literal::Bool(true))),
                    "false" => Ok(Guard::Literal(Literal::Bool(false))),
                    "outcome" => {
                        self.expect(Token::LParen)?;
                        let step = match self.peek().clone() {
                            Token::Str(s) => {
                                self.advance();
                                s
                            }
                            other => {
                                return Err(parse_error(
                                    &format!("outcome() expects a step name, found {:?}", other),
                                    self.position,
                                ))
                            }
                        };
                        self.expect(Token::RParen)?;
                        Ok(Guard::Outcome(step))
                    }
                    _ => Ok(Guard::Ident(name)),
                }
            }
            other => Err(parse_error(
                &format!("unexpected token {:?}", other),
                self.position,
            )),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn expect(&mut self, token: Token) -> Result<(), ConditionError> {
        if self.peek() == &token {
            self.advance();
            Ok(())
        } else {
            Err(parse_error(
                &format!("expected {:?}, found {:?}", token, self.peek()),
                self.position,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_equality() {
        let guard = Guard::parse("os == 'linux'").unwrap();
        assert_eq!(guard, Guard::eq(Guard::ident("os"), Guard::string("linux")));
    }

    #[test]
    fn test_parse_inequality() {
        let guard = Guard::parse("toolchain != 'nightly'").unwrap();
        assert_eq!(
            guard,
            Guard::ne(Guard::ident("toolchain"), Guard::string("nightly"))
        );
    }

    #[test]
    fn test_parse_outcome_reference() {
        let guard = Guard::parse("outcome('install') == succeeded").unwrap();
        assert_eq!(
            guard,
            Guard::eq(Guard::outcome("install"), Guard::ident("succeeded"))
        );
    }

    #[test]
    fn test_parse_precedence_and_over_or() {
        // a || b && c parses as a || (b && c)
        let guard = Guard::parse("a == 'x' || b == 'y' && c == 'z'").unwrap();
        match guard {
            Guard::Or(_, right) => assert!(matches!(*right, Guard::And(_, _))),
            other => panic!("expected Or at top, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_parens_override_precedence() {
        let guard = Guard::parse("(a == 'x' || b == 'y') && c == 'z'").unwrap();
        assert!(matches!(guard, Guard::And(_, _)));
    }

    #[test]
    fn test_parse_negation() {
        let guard = Guard::parse("!(os == 'windows')").unwrap();
        assert_eq!(
            guard,
            Guard::not(Guard::eq(Guard::ident("os"), Guard::string("windows")))
        );
    }

    #[test]
    fn test_parse_bool_literals() {
        assert_eq!(Guard::parse("true").unwrap(), Guard::Literal(Literal::Bool(true)));
        assert_eq!(
            Guard::parse("false").unwrap(),
            Guard::Literal(Literal::Bool(false))
        );
    }

    #[test]
    fn test_parse_ident_with_dash() {
        let guard = Guard::parse("node-version == '20'").unwrap();
        assert_eq!(
            guard,
            Guard::eq(Guard::ident("node-version"), Guard::string("20"))
        );
    }

    #[test]
    fn test_parse_unterminated_string() {
        let err = Guard::parse("os == 'linux").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_parse_trailing_tokens() {
        assert!(Guard::parse("os == 'linux' extra").is_err());
    }

    #[test]
    fn test_parse_single_ampersand() {
        assert!(Guard::parse("a & b").is_err());
    }

    #[test]
    fn test_parse_outcome_requires_string_argument() {
        assert!(Guard::parse("outcome(install)").is_err());
    }
}
