/// Formula text → AST parser.
///
/// A small precedence-climbing parser for the spreadsheet formula language:
/// literals, `{Braced Column}` or bare identifiers, calls, prefix `- + !`,
/// and left-associative binary operators. Errors carry the byte offset
/// where parsing stopped.
use thiserror::Error;

use super::types::*;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Deepest nesting of parentheses, calls and prefix operators accepted.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parse formula text into an expression tree.
pub fn parse_formula(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    if parser.peek().kind == TokenKind::End {
        return Err(ParseError::new(0, "Empty formula"));
    }
    let expr = parser.parse_expression(1)?;
    let next = parser.peek();
    if next.kind != TokenKind::End {
        return Err(ParseError::new(
            next.position,
            format!("Unexpected {}", next.kind.describe()),
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Str(String),
    Name(String),
    Braced(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    End,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {}", format_number(*n)),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Name(n) => format!("identifier '{}'", n),
            TokenKind::Braced(n) => format!("column '{{{}}}'", n),
            TokenKind::Op(op) => format!("operator '{}'", op),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::End => "end of formula".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

// Longest symbols first.
const OPERATORS: &[&str] = &[
    "||", "&&", "==", "!=", "<=", ">=", "=", "<", ">", "&", "+", "-", "*", "/", "%", "!",
];

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = match c {
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'\'' | b'"' => {
                let (value, end) = lex_string(input, i)?;
                i = end;
                TokenKind::Str(value)
            }
            b'{' => {
                let close = input[i + 1..]
                    .find('}')
                    .ok_or_else(|| ParseError::new(i, "Unterminated column reference"))?;
                let name = &input[i + 1..i + 1 + close];
                i += close + 2;
                TokenKind::Braced(name.to_string())
            }
            b'0'..=b'9' | b'.' => {
                let (value, end) = lex_number(input, i)?;
                i = end;
                TokenKind::Number(value)
            }
            _ if c == b'_' || c == b'$' || c.is_ascii_alphabetic() || c >= 0x80 => {
                let rest = &input[i..];
                let len = rest
                    .char_indices()
                    .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_' || *ch == '$'))
                    .map(|(idx, _)| idx)
                    .unwrap_or(rest.len());
                if len == 0 {
                    let ch = rest.chars().next().unwrap_or('?');
                    return Err(ParseError::new(i, format!("Unexpected character '{}'", ch)));
                }
                i += len;
                TokenKind::Name(rest[..len].to_string())
            }
            _ => {
                let rest = &input[i..];
                match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                    Some(op) => {
                        i += op.len();
                        TokenKind::Op(op)
                    }
                    None => {
                        let ch = rest.chars().next().unwrap_or('?');
                        return Err(ParseError::new(i, format!("Unexpected character '{}'", ch)));
                    }
                }
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: input.len(),
    });
    Ok(tokens)
}

fn lex_string(input: &str, start: usize) -> Result<(String, usize), ParseError> {
    let mut chars = input[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(ParseError::new(start, "Unterminated string")),
    };
    let mut value = String::new();
    while let Some((idx, ch)) = chars.next() {
        if ch == quote {
            return Ok((value, start + idx + ch.len_utf8()));
        }
        if ch == '\\' {
            match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, other)) => value.push(other),
                None => break,
            }
        } else {
            value.push(ch);
        }
    }
    Err(ParseError::new(start, "Unterminated string"))
}

fn lex_number(input: &str, start: usize) -> Result<(f64, usize), ParseError> {
    let bytes = input.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    let text = &input[start..i];
    text.parse::<f64>()
        .map(|n| (n, i))
        .map_err(|_| ParseError::new(start, format!("Invalid number '{}'", text)))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with `End`.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        let token = self.advance();
        if token.kind == kind {
            Ok(())
        } else {
            Err(ParseError::new(
                token.position,
                format!(
                    "Expected {} but found {}",
                    kind.describe(),
                    token.kind.describe()
                ),
            ))
        }
    }

    fn parse_expression(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Op(symbol) if *symbol != "!" => BinaryOperator::from_symbol(symbol),
                _ => break,
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_expression(precedence + 1)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                self.peek().position,
                format!("Formula is nested more than {} levels deep", MAX_NESTING_DEPTH),
            ));
        }
        self.depth += 1;
        let result = self.parse_operand();
        self.depth -= 1;
        result
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        if let TokenKind::Op(symbol @ ("-" | "+" | "!")) = self.peek().kind {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::unary(UnaryOperator::from_symbol(symbol), operand));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::number(n)),
            TokenKind::Str(s) => Ok(Expr::string(s)),
            TokenKind::Braced(name) => Ok(Expr::Identifier(name)),
            TokenKind::Name(name) => {
                if self.peek().kind == TokenKind::LParen {
                    self.advance();
                    let args = self.parse_arguments()?;
                    return Ok(Expr::call(name, args));
                }
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Literal::Boolean(true)),
                    "false" => Expr::Literal(Literal::Boolean(false)),
                    "null" => Expr::Literal(Literal::Null),
                    _ => Expr::Identifier(name),
                })
            }
            TokenKind::LParen => {
                let inner = self.parse_expression(1)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(ParseError::new(
                token.position,
                format!("Unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression(1)?);
            let token = self.advance();
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                other => {
                    return Err(ParseError::new(
                        token.position,
                        format!("Expected ',' or ')' but found {}", other.describe()),
                    ))
                }
            }
        }
    }
}
