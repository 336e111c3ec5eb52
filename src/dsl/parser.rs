use super::ast::{BinOp, Expr, UnaryOp};
use super::error::CompileError;
use super::lexer::{lex, Token};

/// Parse an arithmetic right-hand side into an expression tree.
///
/// Only numbers, names, placeholders, unary `+`/`-`, binary `+ - * /` and
/// parentheses are accepted. Everything else is reported as an unsupported
/// expression, never approximated.
pub fn parse_formula(source: &str) -> Result<Expr, CompileError> {
    let tokens = lex(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_add()?;
    if let Some(tok) = parser.peek() {
        return Err(unsupported(tok, source));
    }
    Ok(expr)
}

/// Whether a right-hand side should go through the expression compiler.
/// Quoted text and wrapped values never do.
pub fn looks_like_formula(source: &str) -> bool {
    let s = source.trim();
    if s.starts_with('"') || s.starts_with('\'') {
        return false;
    }
    match lex(s) {
        Ok(tokens) => tokens.iter().any(Token::is_operator),
        Err(_) => false,
    }
}

fn unsupported(tok: &Token, source: &str) -> CompileError {
    let what = match tok {
        Token::Power => "power operator is not supported".to_string(),
        Token::Percent => "remainder operator is not supported".to_string(),
        Token::Str(_) => "text literal in arithmetic".to_string(),
        other => format!("unexpected {}", other.describe()),
    };
    CompileError::unsupported_expression(format!("{what} in `{}`", source.trim()))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn source(&self) -> String {
        self.tokens.iter().map(Token::describe).collect::<Vec<_>>().join(" ")
    }

    // ── Precedence levels ──────────────────────────────────────────

    fn parse_add(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_mul()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_mul(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(tok @ (Token::Percent | Token::Power)) => {
                    return Err(unsupported(tok, &self.source()));
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        // A negative literal is a constant, not a multiplication.
        if let (UnaryOp::Neg, Expr::Number(v)) = (op, &operand) {
            return Ok(Expr::Number(-v));
        }
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let Some(tok) = self.advance() else {
            return Err(CompileError::syntax(format!(
                "expression ends early: {}",
                self.source()
            )));
        };
        match tok {
            Token::Number(v) => Ok(Expr::Number(v)),
            Token::Placeholder(p) => Ok(Expr::Placeholder(p)),
            Token::Name(name) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    return Err(CompileError::unsupported_expression(format!(
                        "call `{name}(...)` inside arithmetic; assign it to a variable first"
                    )));
                }
                Ok(Expr::Name(name))
            }
            Token::LParen => {
                let inner = self.parse_add()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(CompileError::syntax(format!(
                        "unclosed `(` in expression: {}",
                        self.source()
                    ))),
                }
            }
            other => Err(unsupported(&other, &self.source())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    #[test]
    fn multiplication_binds_tighter() {
        let expr = parse_formula("2 + 3 * 4").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinOp::Add,
                left: Box::new(Expr::Number(2.0)),
                right: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    left: Box::new(Expr::Number(3.0)),
                    right: Box::new(Expr::Number(4.0)),
                }),
            }
        );
        assert_eq!(expr.constant_value(), Some(14.0));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = parse_formula("a - b - c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinOp::Sub,
                left: Box::new(Expr::Binary { op: BinOp::Sub, left: name("a"), right: name("b") }),
                right: name("c"),
            }
        );
    }

    #[test]
    fn negative_literal_folds() {
        assert_eq!(parse_formula("-5").unwrap(), Expr::Number(-5.0));
        assert!(matches!(parse_formula("-x").unwrap(), Expr::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn parentheses_group() {
        let expr = parse_formula("(a + 1) * 2").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn rejects_power_and_remainder() {
        let err = parse_formula("a ** 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedExpression);
        let err = parse_formula("a % 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedExpression);
    }

    #[test]
    fn rejects_nested_calls() {
        let err = parse_formula("f(1) + 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedExpression);
        assert!(err.message.contains("f(...)"));
    }

    #[test]
    fn unclosed_paren_is_syntax() {
        let err = parse_formula("(a + 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn formula_detection() {
        assert!(looks_like_formula("a + 1"));
        assert!(looks_like_formula("-x"));
        assert!(!looks_like_formula("\"a + b\""));
        assert!(!looks_like_formula("5"));
        assert!(!looks_like_formula("%selected%name"));
    }
}
