use super::ast::{Argument, Expr, SignatureSyntax};
use crate::runtime::error::{Result, RuntimeError};

/// Deepest call nesting accepted in one action expression.
pub const MAX_NESTING: usize = 64;

/// Parse one action expression, e.g. `speak_number(add(1, 2))`.
///
/// The whole input must form a single invocation; trailing text is an error.
pub fn parse_action(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_expr()?;
    parser.skip_ws();
    if !parser.eof() {
        return Err(parser.error("unexpected trailing input"));
    }
    if expr.action_name().is_none() {
        return Err(parser.error("expected an action invocation"));
    }
    Ok(expr)
}

/// Parse a declaration signature such as `add(a: int, b: int) -> int`.
pub fn parse_signature(source: &str) -> Result<SignatureSyntax> {
    let mut parser = Parser::new(source);
    parser.skip_ws();
    let name = parser.parse_identifier()?;
    let mut params = Vec::new();
    parser.skip_ws();
    if parser.current() == Some(b'(') {
        parser.advance();
        loop {
            parser.skip_ws();
            if parser.current() == Some(b')') {
                parser.advance();
                break;
            }
            let param = parser.parse_identifier()?;
            parser.expect(b':')?;
            parser.skip_ws();
            let tag = parser.parse_identifier()?;
            params.push((param, tag));
            if !parser.list_separator()? {
                break;
            }
        }
    }

    parser.skip_ws();
    let mut returns = None;
    if parser.current() == Some(b'-') && parser.peek_char() == Some(b'>') {
        parser.advance();
        parser.advance();
        parser.skip_ws();
        returns = Some(parser.parse_identifier()?);
        parser.skip_ws();
    }
    if !parser.eof() {
        return Err(parser.error("unexpected trailing input"));
    }

    Ok(SignatureSyntax {
        name,
        params,
        returns,
    })
}

/// Whether `text` is a valid action or parameter identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut bytes = text.bytes();
    match bytes.next() {
        Some(first) if is_identifier_start(first) => bytes.all(is_identifier_char),
        _ => false,
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: 0,
            depth: 0,
        }
    }

    fn eof(&self) -> bool {
        self.index >= self.bytes.len()
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        self.skip_ws();
        if self.current() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected as char)))
        }
    }

    /// Consume `,` or `)` after a list item; returns whether more items follow.
    fn list_separator(&mut self) -> Result<bool> {
        self.skip_ws();
        match self.current() {
            Some(b',') => {
                self.advance();
                Ok(true)
            }
            Some(b')') => {
                self.advance();
                Ok(false)
            }
            None => Err(self.error("unterminated argument list")),
            Some(_) => Err(self.error("expected ',' or ')'")),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.skip_ws();
        match self.current() {
            None => Err(self.error("unexpected end of input")),
            Some(b'"') | Some(b'\'') => self.parse_string(),
            Some(b'-') | Some(b'+') | Some(b'0'..=b'9') => self.parse_integer(),
            Some(ch) if is_identifier_start(ch) => self.parse_call_or_identifier(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn parse_call_or_identifier(&mut self) -> Result<Expr> {
        let name = self.parse_identifier()?;
        self.skip_ws();
        if self.current() != Some(b'(') {
            return Ok(Expr::Identifier(name));
        }
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        // consume '('
        self.advance();
        self.depth += 1;
        let args = self.parse_arguments();
        self.depth -= 1;
        Ok(Expr::Call { name, args: args? })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>> {
        let mut args = Vec::new();
        loop {
            self.skip_ws();
            if self.current() == Some(b')') {
                self.advance();
                break;
            }
            args.push(self.parse_argument()?);
            if !self.list_separator()? {
                break;
            }
        }
        Ok(args)
    }

    fn parse_argument(&mut self) -> Result<Argument> {
        let start = self.index;
        if self.current().is_some_and(is_identifier_start) {
            let name = self.parse_identifier()?;
            self.skip_ws();
            // `name=value`, but not `name==...`
            if self.current() == Some(b'=') && self.peek_char() != Some(b'=') {
                self.advance();
                let value = self.parse_expr()?;
                return Ok(Argument::keyword(name, value));
            }
            self.index = start;
        }
        Ok(Argument::positional(self.parse_expr()?))
    }

    fn parse_identifier(&mut self) -> Result<String> {
        let start = self.index;
        match self.current() {
            Some(ch) if is_identifier_start(ch) => self.advance(),
            _ => return Err(self.error("expected identifier")),
        }
        while let Some(ch) = self.current() {
            if is_identifier_char(ch) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(self.src[start..self.index].to_string())
    }

    fn parse_string(&mut self) -> Result<Expr> {
        let quote = self.current().ok_or_else(|| self.error("expected string"))?;
        self.advance();
        let mut buf = Vec::new();
        while let Some(ch) = self.current() {
            self.advance();
            match ch {
                c if c == quote => {
                    let text = String::from_utf8(buf)
                        .map_err(|_| self.error("invalid UTF-8 in string literal"))?;
                    return Ok(Expr::String(text));
                }
                b'\\' => {
                    let escaped = self
                        .current()
                        .ok_or_else(|| self.error("incomplete escape"))?;
                    self.advance();
                    let value = match escaped {
                        b'"' => b'"',
                        b'\'' => b'\'',
                        b'\\' => b'\\',
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        other => {
                            return Err(self.error(&format!("unknown escape: \\{}", other as char)));
                        }
                    };
                    buf.push(value);
                }
                _ => buf.push(ch),
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn parse_integer(&mut self) -> Result<Expr> {
        let start = self.index;
        if self.current() == Some(b'-') || self.current() == Some(b'+') {
            self.advance();
        }
        let digits = self.index;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        if digits == self.index {
            return Err(self.error("expected digits"));
        }
        let text = &self.src[start..self.index];
        text.parse::<i64>()
            .map(Expr::Integer)
            .map_err(|_| self.error("invalid integer literal"))
    }

    fn error(&self, message: &str) -> RuntimeError {
        RuntimeError::Parse(format!("{} at byte {}", message, self.index))
    }
}

fn is_identifier_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_identifier_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
