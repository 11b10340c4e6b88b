//! Hand-rolled recursive-descent parser for the embedded expression
//! language: `$.func(args).chain()` calls and `$root`/`$parent`/`$this`
//! path references. Mirrors the cursor style (`pos`/`peek`/`advance`) used
//! elsewhere in this codebase for other small embedded grammars.

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Int(i64),
    Null,
    /// `key=value` form used by `.add(days=N, 'fmt')`.
    KeyValue(String, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Root,
    Parent,
    This,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: String,
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallStep {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Call(Vec<CallStep>),
    Path { scope: Scope, segments: Vec<PathSegment> },
}

/// Try to parse one expression starting at byte offset `start` in `src`
/// (where `src.as_bytes()[start] == b'$'`). Returns the expression and the
/// end offset (exclusive) on success, or `None` if what follows `$` is not
/// a recognized expression — callers treat that `$` as a literal character.
pub fn parse_at(src: &str, start: usize) -> Option<(Expr, usize)> {
    let mut p = Parser::new(src, start);
    p.parse_expr()
}

/// Byte length of the UTF-8 character starting with lead byte `b`.
fn utf8_len(b: u8) -> usize {
    if b & 0xE0 == 0xC0 {
        2
    } else if b & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, start: usize) -> Self {
        Parser {
            bytes: src.as_bytes(),
            pos: start,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            self.pos += 1;
        }
    }

    fn parse_name(&mut self) -> Option<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        Some(std::str::from_utf8(&self.bytes[start..self.pos]).ok()?.to_string())
    }

    fn parse_int(&mut self) -> Option<i64> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()?.parse().ok()
    }

    fn parse_string_literal(&mut self) -> Option<String> {
        if !self.eat(b'\'') {
            return None;
        }
        let mut s = String::new();
        loop {
            match self.advance()? {
                b'\'' => break,
                b'\\' => {
                    let escaped = self.advance()?;
                    s.push(escaped as char);
                }
                b if b.is_ascii() => s.push(b as char),
                lead => {
                    // Multi-byte UTF-8 character: pull the remaining
                    // continuation bytes and decode the whole thing, since
                    // a lone byte cast to `char` would corrupt it.
                    let len = utf8_len(lead);
                    let start = self.pos - 1;
                    for _ in 1..len {
                        self.advance()?;
                    }
                    s.push_str(std::str::from_utf8(&self.bytes[start..self.pos]).ok()?);
                }
            }
        }
        Some(s)
    }

    fn parse_expr(&mut self) -> Option<(Expr, usize)> {
        if !self.eat(b'$') {
            return None;
        }
        if self.eat(b'.') {
            let steps = self.parse_call_chain()?;
            return Some((Expr::Call(steps), self.pos));
        }
        let scope = if self.consume_keyword("root") {
            Scope::Root
        } else if self.consume_keyword("parent") {
            Scope::Parent
        } else if self.consume_keyword("this") {
            Scope::This
        } else {
            return None;
        };
        if !self.eat(b'.') {
            return None;
        }
        let segments = self.parse_segments()?;
        Some((Expr::Path { scope, segments }, self.pos))
    }

    fn consume_keyword(&mut self, kw: &str) -> bool {
        if self.bytes[self.pos..].starts_with(kw.as_bytes()) {
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    fn parse_call_chain(&mut self) -> Option<Vec<CallStep>> {
        let mut steps = vec![self.parse_call_step()?];
        loop {
            let checkpoint = self.pos;
            if self.eat(b'.') {
                match self.parse_call_step() {
                    Some(step) => steps.push(step),
                    None => {
                        self.pos = checkpoint;
                        break;
                    }
                }
            } else {
                break;
            }
        }
        Some(steps)
    }

    fn parse_call_step(&mut self) -> Option<CallStep> {
        let name = self.parse_name()?;
        if !self.eat(b'(') {
            return None;
        }
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() != Some(b')') {
            loop {
                self.skip_ws();
                args.push(self.parse_arg()?);
                self.skip_ws();
                if !self.eat(b',') {
                    break;
                }
            }
        }
        self.skip_ws();
        if !self.eat(b')') {
            return None;
        }
        Some(CallStep { name, args })
    }

    fn parse_arg(&mut self) -> Option<Arg> {
        if self.peek() == Some(b'\'') {
            return self.parse_string_literal().map(Arg::Str);
        }
        if self.bytes[self.pos..].starts_with(b"null") {
            self.pos += 4;
            return Some(Arg::Null);
        }
        let checkpoint = self.pos;
        if let Some(name) = self.parse_name() {
            if self.eat(b'=') {
                let value = self.parse_int()?;
                return Some(Arg::KeyValue(name, value));
            }
            self.pos = checkpoint;
        }
        self.parse_int().map(Arg::Int)
    }

    fn parse_segments(&mut self) -> Option<Vec<PathSegment>> {
        let mut segments = vec![self.parse_segment()?];
        while self.eat(b'.') {
            segments.push(self.parse_segment()?);
        }
        Some(segments)
    }

    fn parse_segment(&mut self) -> Option<PathSegment> {
        let name = self.parse_name()?;
        let index = if self.eat(b'[') {
            let n = self.parse_int()?;
            if !self.eat(b']') {
                return None;
            }
            Some(n)
        } else {
            None
        };
        Some(PathSegment { name, index })
    }
}
