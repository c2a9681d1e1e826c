//! A small XPath front end.
//!
//! The real expression engine hands the compiler an AST directly; this
//! parser exists so the CLI and tests can write path expressions as text.
//! It covers the subset the compiler can do something useful with: location
//! paths with `/`, `//`, `@` and predicates, the core functions, `|` unions,
//! comparisons, and `and`/`or`/arithmetic, but not the full XPath grammar.

use crate::error::Error;
use crate::xpath::ast::{Axis, BinaryOp, Expr, NodeTest, Step};

/// Parse an XPath expression string.
pub fn parse_xpath(input: &str) -> Result<Expr, Error> {
    let mut parser = XPathParser { input, pos: 0 };
    let expr = parser.parse_expr()?;
    parser.skip_whitespace();
    if !parser.is_eof() {
        return Err(Error::parse(
            format!("unexpected '{}'", parser.peek_char().unwrap()),
            parser.pos,
        ));
    }
    Ok(expr)
}

struct XPathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> XPathParser<'a> {
    fn parse_expr(&mut self) -> Result<Expr, Error> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_and()?;
        while self.consume_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_comparison()?;
        while self.consume_keyword("and") {
            let right = self.parse_comparison()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Error> {
        let left = self.parse_additive()?;
        self.skip_whitespace();
        let op = if self.consume_str("!=") {
            BinaryOp::Neq
        } else if self.consume_str("<=") {
            BinaryOp::Lte
        } else if self.consume_str(">=") {
            BinaryOp::Gte
        } else if self.consume_str("=") {
            BinaryOp::Eq
        } else if self.consume_str("<") {
            BinaryOp::Lt
        } else if self.consume_str(">") {
            BinaryOp::Gt
        } else {
            return Ok(left);
        };
        let right = self.parse_additive()?;
        Ok(Expr::binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_whitespace();
            if self.consume_str("+") {
                let right = self.parse_multiplicative()?;
                left = Expr::binary(BinaryOp::Add, left, right);
            } else if self.peek_char() == Some('-') && !self.input[self.pos + 1..].starts_with('-')
            {
                self.advance();
                let right = self.parse_multiplicative()?;
                left = Expr::binary(BinaryOp::Sub, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_union()?;
        loop {
            if self.consume_keyword("div") {
                let right = self.parse_union()?;
                left = Expr::binary(BinaryOp::Div, left, right);
            } else if self.consume_keyword("mod") {
                let right = self.parse_union()?;
                left = Expr::binary(BinaryOp::Mod, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_union(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            if self.consume_str("|") {
                let right = self.parse_unary()?;
                left = Expr::Union(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        self.skip_whitespace();
        if self.consume_str("-") {
            let inner = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_path_or_primary()
    }

    fn parse_path_or_primary(&mut self) -> Result<Expr, Error> {
        self.skip_whitespace();

        match self.peek_char() {
            None => Err(Error::parse("unexpected end of expression", self.pos)),
            Some('\'') | Some('"') => self.parse_string_literal(),
            Some('$') => {
                self.advance();
                let name = self.read_name();
                if name.is_empty() {
                    return Err(Error::parse("expected variable name after '$'", self.pos));
                }
                Ok(Expr::Variable(name))
            }
            Some('(') => {
                self.advance();
                let inner = self.parse_expr()?;
                self.skip_whitespace();
                if !self.consume_str(")") {
                    return Err(Error::parse("expected ')'", self.pos));
                }
                let predicates = self.parse_predicates()?;
                if predicates.is_empty() {
                    Ok(inner)
                } else {
                    Ok(Expr::Filter {
                        expr: Box::new(inner),
                        predicates,
                    })
                }
            }
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            _ => self.parse_path(),
        }
    }

    fn parse_path(&mut self) -> Result<Expr, Error> {
        let mut steps = Vec::new();
        let absolute = self.peek_char() == Some('/');

        let mut descendant = false;
        if absolute {
            self.advance();
            if self.consume_str("/") {
                descendant = true;
            } else if self.is_path_end() {
                // Bare `/` selects the document node.
                return Ok(Expr::Path {
                    absolute: true,
                    steps,
                });
            }
        } else {
            // A name followed by `(` is a function call, not a step.
            let checkpoint = self.pos;
            let name = self.read_name();
            if !name.is_empty() && self.peek_char() == Some('(') && !is_node_test_name(&name) {
                return self.parse_function_call(name);
            }
            self.pos = checkpoint;
        }

        loop {
            let step = self.parse_step(descendant)?;
            steps.push(step);

            if self.consume_str("//") {
                descendant = true;
            } else if self.consume_str("/") {
                descendant = false;
            } else {
                break;
            }
        }

        Ok(Expr::Path { absolute, steps })
    }

    fn parse_step(&mut self, descendant: bool) -> Result<Step, Error> {
        if self.consume_str("..") {
            let mut step = Step::new(Axis::Parent, NodeTest::Node);
            step.predicates = self.parse_predicates()?;
            return Ok(step);
        }
        if self.peek_char() == Some('.') {
            self.advance();
            let mut step = Step::new(Axis::Self_, NodeTest::Node);
            step.predicates = self.parse_predicates()?;
            return Ok(step);
        }

        let attribute = self.consume_str("@");
        let axis = match (attribute, descendant) {
            (true, _) => Axis::Attribute,
            (false, true) => Axis::Descendant,
            (false, false) => Axis::Child,
        };

        let node_test = if self.consume_str("*") {
            NodeTest::Wildcard
        } else {
            let name = self.read_name();
            if name.is_empty() {
                return Err(Error::parse("expected a step", self.pos));
            }
            if self.peek_char() == Some('(') {
                self.advance();
                self.skip_whitespace();
                let target = if matches!(self.peek_char(), Some('\'') | Some('"')) {
                    let Expr::Literal(s) = self.parse_string_literal()? else {
                        unreachable!()
                    };
                    Some(s)
                } else {
                    None
                };
                self.skip_whitespace();
                if !self.consume_str(")") {
                    return Err(Error::parse("expected ')' after node test", self.pos));
                }
                match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => NodeTest::ProcessingInstruction(target),
                    other => {
                        return Err(Error::parse(
                            format!("unknown node test '{other}()'"),
                            self.pos,
                        ));
                    }
                }
            } else if name.ends_with(':') && self.peek_char() == Some('*') {
                self.advance();
                NodeTest::PrefixWildcard(name.trim_end_matches(':').to_string())
            } else {
                NodeTest::Name(name)
            }
        };

        let mut step = Step::new(axis, node_test);
        step.predicates = self.parse_predicates()?;
        Ok(step)
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, Error> {
        let mut predicates = Vec::new();
        loop {
            self.skip_whitespace();
            if !self.consume_str("[") {
                return Ok(predicates);
            }
            let pred = self.parse_expr()?;
            self.skip_whitespace();
            if !self.consume_str("]") {
                return Err(Error::parse("expected ']'", self.pos));
            }
            predicates.push(pred);
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr, Error> {
        // Caller saw the '('.
        self.advance();
        let mut args = Vec::new();
        self.skip_whitespace();
        if !self.consume_str(")") {
            loop {
                args.push(self.parse_expr()?);
                self.skip_whitespace();
                if self.consume_str(",") {
                    continue;
                }
                if self.consume_str(")") {
                    break;
                }
                return Err(Error::parse("expected ',' or ')' in arguments", self.pos));
            }
        }
        Ok(Expr::FunctionCall { name, args })
    }

    fn parse_number(&mut self) -> Result<Expr, Error> {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos]
            .parse()
            .map(Expr::Number)
            .map_err(|_| Error::parse("malformed number", start))
    }

    fn parse_string_literal(&mut self) -> Result<Expr, Error> {
        let quote = self.peek_char().unwrap();
        self.advance();
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch == quote {
                let text = self.input[start..self.pos].to_string();
                self.advance();
                return Ok(Expr::Literal(text));
            }
            self.advance();
        }
        Err(Error::parse("unterminated string literal", self.pos))
    }

    /// A QName-ish name: NCName chars plus an optional single prefix colon.
    fn read_name(&mut self) -> String {
        let start = self.pos;
        let mut seen_colon = false;
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.') {
                self.advance();
            } else if ch == ':' && !seen_colon && !self.input[self.pos + 1..].starts_with(':') {
                seen_colon = true;
                self.advance();
            } else {
                break;
            }
        }
        let mut name = &self.input[start..self.pos];
        // Trailing '.' belongs to an enclosing expression, not the name.
        while name.ends_with('.') {
            self.pos -= 1;
            name = &self.input[start..self.pos];
        }
        name.to_string()
    }

    fn is_path_end(&self) -> bool {
        match self.clone_peek() {
            None => true,
            Some(c) => !(c.is_alphanumeric() || matches!(c, '_' | '@' | '*' | '.' | '(')),
        }
    }

    fn clone_peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let rest = &self.input[self.pos..];
        if let Some(after) = rest.strip_prefix(keyword) {
            let boundary = after
                .chars()
                .next()
                .map(|c| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(true);
            if boundary {
                self.pos += keyword.len();
                return true;
            }
        }
        false
    }

    fn consume_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self
            .peek_char()
            .map(|c| c.is_whitespace())
            .unwrap_or(false)
        {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }
}

fn is_node_test_name(name: &str) -> bool {
    matches!(name, "text" | "node" | "comment" | "processing-instruction")
}
