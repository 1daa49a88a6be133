//! Formula parser
//!
//! Tokenizes and parses formula text into an [`Expr`] tree using classic
//! recursive descent with precedence climbing. Structural security limits
//! (length, node budget, nesting depth, blocked property names) are enforced
//! while the tree is being built, so a pathological formula fails fast
//! instead of exhausting memory or stack mid-parse.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ParseError;
use std::iter::Peekable;
use std::str::Chars;

/// Property path segments that are never allowed, screened during parsing
/// and re-checked during evaluation.
pub const BLOCKED_PROPERTY_NAMES: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Returns true if a path segment is on the blocked-name list.
#[must_use]
pub fn is_blocked_property(segment: &str) -> bool {
    BLOCKED_PROPERTY_NAMES.contains(&segment)
}

/// Structural limits enforced by the parser
#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    /// Maximum formula length in characters
    pub max_length: usize,
    /// Maximum number of composite nodes in the tree
    pub max_nodes: usize,
    /// Maximum nesting depth
    pub max_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_length: 10_000,
            max_nodes: 500,
            max_depth: 20,
        }
    }
}

/// Token types for the formula tokenizer
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Identifier(String),
    Boolean(bool),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,

    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,

    And,
    Or,
    Not,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,

    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Str(s) => format!("\"{s}\""),
            Token::Identifier(name) => name.clone(),
            Token::Boolean(b) => b.to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::Percent => "%".to_string(),
            Token::Caret => "^".to_string(),
            Token::Equal => "==".to_string(),
            Token::NotEqual => "!=".to_string(),
            Token::Less => "<".to_string(),
            Token::Greater => ">".to_string(),
            Token::LessEqual => "<=".to_string(),
            Token::GreaterEqual => ">=".to_string(),
            Token::And => "and".to_string(),
            Token::Or => "or".to_string(),
            Token::Not => "not".to_string(),
            Token::LeftParen => "(".to_string(),
            Token::RightParen => ")".to_string(),
            Token::LeftBracket => "[".to_string(),
            Token::RightBracket => "]".to_string(),
            Token::Comma => ",".to_string(),
            Token::Dot => ".".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Tokenizer for breaking formula text into tokens
struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();

        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            '+' => {
                self.advance();
                Ok(Token::Plus)
            }
            '-' => {
                self.advance();
                Ok(Token::Minus)
            }
            '*' => {
                self.advance();
                Ok(Token::Star)
            }
            '/' => {
                self.advance();
                Ok(Token::Slash)
            }
            '%' => {
                self.advance();
                Ok(Token::Percent)
            }
            '^' => {
                self.advance();
                Ok(Token::Caret)
            }
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            '[' => {
                self.advance();
                Ok(Token::LeftBracket)
            }
            ']' => {
                self.advance();
                Ok(Token::RightBracket)
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            '.' => {
                self.advance();
                Ok(Token::Dot)
            }
            '"' | '\'' => self.read_string(ch),
            '0'..='9' => self.read_number(),
            'a'..='z' | 'A'..='Z' | '_' => Ok(self.read_identifier()),
            '=' => {
                self.advance();
                if self.chars.peek() == Some(&'=') {
                    self.advance();
                    Ok(Token::Equal)
                } else {
                    Err(ParseError::UnexpectedToken {
                        token: "=".to_string(),
                        position: self.position - 1,
                    })
                }
            }
            '!' => {
                self.advance();
                if self.chars.peek() == Some(&'=') {
                    self.advance();
                    Ok(Token::NotEqual)
                } else {
                    Err(ParseError::UnexpectedToken {
                        token: "!".to_string(),
                        position: self.position - 1,
                    })
                }
            }
            '<' => {
                self.advance();
                if self.chars.peek() == Some(&'=') {
                    self.advance();
                    Ok(Token::LessEqual)
                } else {
                    Ok(Token::Less)
                }
            }
            '>' => {
                self.advance();
                if self.chars.peek() == Some(&'=') {
                    self.advance();
                    Ok(Token::GreaterEqual)
                } else {
                    Ok(Token::Greater)
                }
            }
            _ => Err(ParseError::UnexpectedToken {
                token: ch.to_string(),
                position: self.position,
            }),
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        let mut num_str = String::new();

        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Consume a fraction only when a digit actually follows the dot, so
        // the dot in a path like `items.0` stays a separate token.
        if self.chars.peek() == Some(&'.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek().is_some_and(char::is_ascii_digit) {
                num_str.push('.');
                self.advance();
                while let Some(&ch) = self.chars.peek() {
                    if ch.is_ascii_digit() {
                        num_str.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        match num_str.parse::<f64>() {
            Ok(num) => Ok(Token::Number(num)),
            Err(_) => Err(ParseError::InvalidNumber {
                value: num_str,
                position: start,
            }),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.position;
        self.advance(); // opening quote

        let mut string = String::new();

        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(Token::Str(string)),
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(ParseError::InvalidString {
                                position: self.position,
                                reason: format!("invalid escape sequence \\{other}"),
                            });
                        }
                        None => {
                            return Err(ParseError::InvalidString {
                                position: start,
                                reason: "unterminated string".to_string(),
                            });
                        }
                    };
                    string.push(escaped);
                }
                Some(ch) => string.push(ch),
                None => {
                    return Err(ParseError::InvalidString {
                        position: start,
                        reason: "unterminated string".to_string(),
                    });
                }
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(&ch) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Keywords match only as whole identifiers; `andover` stays one
        // identifier because the loop above consumed it greedily.
        match ident.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Identifier(ident),
        }
    }
}

/// Formula parser
#[derive(Debug, Clone)]
pub struct Parser {
    limits: ParserLimits,
}

impl Parser {
    /// Create a parser with the default security limits
    #[must_use]
    pub fn new() -> Self {
        Self {
            limits: ParserLimits::default(),
        }
    }

    /// Create a parser with custom limits
    #[must_use]
    pub fn with_limits(limits: ParserLimits) -> Self {
        Self { limits }
    }

    /// Parse formula text into an expression tree
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the formula exceeds a structural limit,
    /// references a blocked property name, or is syntactically malformed.
    pub fn parse(&self, input: &str) -> Result<Expr, ParseError> {
        let length = input.chars().count();
        if length > self.limits.max_length {
            return Err(ParseError::TooLong {
                length,
                max: self.limits.max_length,
            });
        }

        let tokenizer = Tokenizer::new(input);
        let mut state = ParserState {
            tokenizer,
            current: Token::Eof,
            depth: 0,
            nodes: 0,
            limits: self.limits,
        };

        state.advance()?;
        let expr = state.parse_expression()?;

        if state.current != Token::Eof {
            return Err(ParseError::TrailingInput {
                input: state.current.describe(),
            });
        }

        Ok(expr)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal parser state
struct ParserState<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
    depth: usize,
    nodes: usize,
    limits: ParserLimits,
}

impl ParserState<'_> {
    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.tokenizer.next_token()?;
        Ok(())
    }

    /// Count a freshly constructed composite node against the budget.
    fn node(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(ParseError::TooComplex {
                nodes: self.nodes,
                max: self.limits.max_nodes,
            });
        }
        Ok(expr)
    }

    /// Run a recursive descent one level deeper. The counter is restored on
    /// the way out regardless of whether the inner parse failed.
    fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            let depth = self.depth;
            self.depth -= 1;
            return Err(ParseError::TooDeep {
                depth,
                max: self.limits.max_depth,
            });
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.current == Token::Or {
            let right = self.descend(|p| {
                p.advance()?;
                p.parse_and()
            })?;
            left = self.node(Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;

        while self.current == Token::And {
            let right = self.descend(|p| {
                p.advance()?;
                p.parse_comparison()
            })?;
            left = self.node(Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_addition()?;

        loop {
            let op = match self.current {
                Token::Equal => BinaryOp::Equal,
                Token::NotEqual => BinaryOp::NotEqual,
                Token::Less => BinaryOp::Less,
                Token::Greater => BinaryOp::Greater,
                Token::LessEqual => BinaryOp::LessOrEqual,
                Token::GreaterEqual => BinaryOp::GreaterOrEqual,
                _ => break,
            };

            let right = self.descend(|p| {
                p.advance()?;
                p.parse_addition()
            })?;
            left = self.node(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }

        Ok(left)
    }

    fn parse_addition(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplication()?;

        loop {
            let op = match self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };

            let right = self.descend(|p| {
                p.advance()?;
                p.parse_multiplication()
            })?;
            left = self.node(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }

        Ok(left)
    }

    fn parse_multiplication(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_power()?;

        loop {
            let op = match self.current {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                _ => break,
            };

            let right = self.descend(|p| {
                p.advance()?;
                p.parse_power()
            })?;
            left = self.node(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }

        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        while self.current == Token::Caret {
            let right = self.descend(|p| {
                p.advance()?;
                p.parse_unary()
            })?;
            left = self.node(Expr::Binary {
                op: BinaryOp::Power,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current {
            Token::Minus => UnaryOp::Negate,
            Token::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };

        let operand = self.descend(|p| {
            p.advance()?;
            p.parse_unary()
        })?;
        self.node(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        while self.current == Token::LeftBracket {
            let index = self.descend(|p| {
                p.advance()?;
                let index = p.parse_expression()?;
                if p.current != Token::RightBracket {
                    return Err(ParseError::MissingDelimiter {
                        delimiter: ']',
                        position: p.tokenizer.position,
                    });
                }
                p.advance()?;
                Ok(index)
            })?;
            expr = self.node(Expr::Index {
                array: Box::new(expr),
                index: Box::new(index),
            })?;
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current.clone() {
            Token::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Expr::Boolean(b))
            }
            Token::Identifier(name) => {
                self.advance()?;

                if self.current == Token::LeftParen {
                    self.parse_function_call(name)
                } else {
                    self.parse_property_path(name)
                }
            }
            Token::LeftParen => self.descend(|p| {
                p.advance()?;
                let expr = p.parse_expression()?;

                if p.current != Token::RightParen {
                    return Err(ParseError::MissingDelimiter {
                        delimiter: ')',
                        position: p.tokenizer.position,
                    });
                }
                p.advance()?;
                Ok(expr)
            }),
            Token::Eof => Err(ParseError::UnexpectedEof {
                position: self.tokenizer.position,
            }),
            other => Err(ParseError::UnexpectedToken {
                token: other.describe(),
                position: self.tokenizer.position,
            }),
        }
    }

    fn parse_property_path(&mut self, first: String) -> Result<Expr, ParseError> {
        if is_blocked_property(&first) {
            return Err(ParseError::BlockedProperty { name: first });
        }

        let mut path = vec![first];

        while self.current == Token::Dot {
            self.advance()?;
            let segment = match self.current.clone() {
                Token::Identifier(name) => name,
                // numeric segments address array elements: inventory.0.weight
                Token::Number(n) if n.fract() == 0.0 && n >= 0.0 => format!("{}", n as u64),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        token: other.describe(),
                        position: self.tokenizer.position,
                    });
                }
            };
            if is_blocked_property(&segment) {
                return Err(ParseError::BlockedProperty { name: segment });
            }
            self.advance()?;
            path.push(segment);
        }

        Ok(Expr::Property(path))
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        let args = self.descend(|p| {
            p.advance()?; // skip '('

            let mut args = Vec::new();

            if p.current != Token::RightParen {
                loop {
                    args.push(p.parse_expression()?);

                    match p.current {
                        Token::Comma => {
                            p.advance()?;
                        }
                        Token::RightParen => break,
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                token: p.current.describe(),
                                position: p.tokenizer.position,
                            });
                        }
                    }
                }
            }

            p.advance()?; // skip ')'
            Ok(args)
        })?;

        self.node(Expr::Function { name, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals() {
        let parser = Parser::new();

        assert_eq!(parser.parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parser.parse("3.14").unwrap(), Expr::Number(3.14));
        assert_eq!(parser.parse("true").unwrap(), Expr::Boolean(true));
        assert_eq!(parser.parse("false").unwrap(), Expr::Boolean(false));
        assert_eq!(
            parser.parse("\"hello\"").unwrap(),
            Expr::String("hello".to_string())
        );
        assert_eq!(
            parser.parse("'single'").unwrap(),
            Expr::String("single".to_string())
        );
    }

    #[test]
    fn test_parse_string_escapes() {
        let parser = Parser::new();

        assert_eq!(
            parser.parse(r#""a\"b""#).unwrap(),
            Expr::String("a\"b".to_string())
        );
        assert_eq!(
            parser.parse(r"'don\'t'").unwrap(),
            Expr::String("don't".to_string())
        );
        assert!(matches!(
            parser.parse("\"unterminated"),
            Err(ParseError::InvalidString { .. })
        ));
    }

    #[test]
    fn test_parse_property_paths() {
        let parser = Parser::new();

        assert_eq!(
            parser.parse("abilities.strength.value").unwrap(),
            Expr::Property(vec![
                "abilities".to_string(),
                "strength".to_string(),
                "value".to_string()
            ])
        );

        assert_eq!(
            parser.parse("inventory.0.weight").unwrap(),
            Expr::Property(vec![
                "inventory".to_string(),
                "0".to_string(),
                "weight".to_string()
            ])
        );
        assert!(parser.parse("inventory.-1").is_err());
    }

    #[test]
    fn test_precedence() {
        let parser = Parser::new();

        let expr = parser.parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Number(1.0)),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Multiply,
                    left: Box::new(Expr::Number(2.0)),
                    right: Box::new(Expr::Number(3.0)),
                }),
            }
        );

        let expr = parser.parse("2 * 3 ^ 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Multiply,
                left: Box::new(Expr::Number(2.0)),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Power,
                    left: Box::new(Expr::Number(3.0)),
                    right: Box::new(Expr::Number(2.0)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_idempotent() {
        let parser = Parser::new();
        let source = "floor((abilities.strength.value - 10) / 2) + proficiency";

        let first = parser.parse(source).unwrap();
        let second = parser.parse(source).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        let parser = Parser::new();

        assert_eq!(
            parser.parse("andover").unwrap(),
            Expr::Property(vec!["andover".to_string()])
        );
        assert_eq!(
            parser.parse("notable.value").unwrap(),
            Expr::Property(vec!["notable".to_string(), "value".to_string()])
        );
    }

    #[test]
    fn test_array_indexing() {
        let parser = Parser::new();

        let expr = parser.parse("inventory[0]").unwrap();
        assert_eq!(
            expr,
            Expr::Index {
                array: Box::new(Expr::Property(vec!["inventory".to_string()])),
                index: Box::new(Expr::Number(0.0)),
            }
        );

        assert!(matches!(
            parser.parse("inventory[0"),
            Err(ParseError::MissingDelimiter { delimiter: ']', .. })
        ));
    }

    #[test]
    fn test_function_call() {
        let parser = Parser::new();

        let expr = parser.parse("max(1, 2, 3)").unwrap();
        assert_eq!(
            expr,
            Expr::Function {
                name: "max".to_string(),
                args: vec![Expr::Number(1.0), Expr::Number(2.0), Expr::Number(3.0)],
            }
        );
    }

    #[test]
    fn test_blocked_property_names() {
        let parser = Parser::new();

        assert!(matches!(
            parser.parse("__proto__.x"),
            Err(ParseError::BlockedProperty { name }) if name == "__proto__"
        ));
        assert!(matches!(
            parser.parse("a.constructor.b"),
            Err(ParseError::BlockedProperty { name }) if name == "constructor"
        ));
        assert!(matches!(
            parser.parse("a.b.prototype"),
            Err(ParseError::BlockedProperty { name }) if name == "prototype"
        ));
        assert!(parser.parse("safeName.b").is_ok());
    }

    #[test]
    fn test_length_limit() {
        let parser = Parser::new();

        // 10,001 chars of otherwise-valid syntax
        let mut long = "1".to_string();
        while long.len() < 10_001 {
            long.push_str("+1");
        }
        let long: String = long.chars().take(10_001).collect();
        assert!(matches!(
            parser.parse(&long),
            Err(ParseError::TooLong {
                length: 10_001,
                max: 10_000
            })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let parser = Parser::new();

        let nested_20 = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parser.parse(&nested_20).is_ok());

        let nested_21 = format!("{}1{}", "(".repeat(21), ")".repeat(21));
        assert!(matches!(
            parser.parse(&nested_21),
            Err(ParseError::TooDeep { max: 20, .. })
        ));
    }

    #[test]
    fn test_node_limit() {
        let parser = Parser::new();

        // 500 chained additions stay within the budget
        let ok = format!("1{}", "+1".repeat(500));
        assert!(parser.parse(&ok).is_ok());

        // one more addition exceeds it
        let too_many = format!("1{}", "+1".repeat(501));
        assert!(matches!(
            parser.parse(&too_many),
            Err(ParseError::TooComplex { max: 500, .. })
        ));
    }

    #[test]
    fn test_syntax_errors() {
        let parser = Parser::new();

        assert!(matches!(
            parser.parse("1 +"),
            Err(ParseError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parser.parse("1 + 2 extra"),
            Err(ParseError::TrailingInput { .. })
        ));
        assert!(matches!(
            parser.parse("(1 + 2"),
            Err(ParseError::MissingDelimiter { delimiter: ')', .. })
        ));
        assert!(matches!(
            parser.parse("a = 1"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parser.parse("a & b"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_unary_operators() {
        let parser = Parser::new();

        assert_eq!(
            parser.parse("-5").unwrap(),
            Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(Expr::Number(5.0)),
            }
        );
        assert_eq!(
            parser.parse("not flag").unwrap(),
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Expr::Property(vec!["flag".to_string()])),
            }
        );
    }
}
