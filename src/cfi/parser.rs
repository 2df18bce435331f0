//! CFI Parser
//!
//! Parses CFI strings into structured [`ParsedCfi`] values.
//!
//! Grammar (simplified):
//! ```text
//! cfi       = "epubcfi(" part ("!" part)* ["," steps ["," steps]] ")"
//! part      = step+
//! step      = "/" digits [vendor] ["[" id "]"] [qualifier]
//! qualifier = ":" digits ["[" assertion "]"]
//!           | "~" number ["@" number ":" number] ["[" assertion "]"]
//!           | "@" number ":" number ["[" assertion "]"]
//! assertion = [pre] ["," post] [";s=" ("a" | "b")]
//! ```
//!
//! Each step is scanned by a small state machine ([`StepScanner`]) whose
//! per-state transitions are plain functions of the current character. The
//! scanner stops, without consuming, at `/`, `!` and `,` so the top-level
//! loop can decide between a new step, a document hop and range structure.

use std::mem;

use super::escape::ESCAPE_CHAR;
use super::types::*;
use crate::error::ParseError;

/// Parse-time options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Collapse a range into its start location
    pub flatten_range: bool,
    /// Only allow terminal qualifiers on the final step of a Part
    pub stricter: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            flatten_range: false,
            stricter: true,
        }
    }
}

/// The token currently being accumulated inside a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    /// Between tokens, after a closing bracket
    None,
    /// `/` digits
    NodeIndex,
    /// Vendor extension text after the digits, skipped
    Vendor,
    /// `:` digits
    Offset,
    /// `~` number
    Temporal,
    /// `@` x `:` y
    Spatial,
    /// `[...]` after a qualifier
    Assertion,
    /// `[...]` after the node index
    NodeId,
}

/// What the driver should do after feeding a character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// The character was consumed
    Continue,
    /// The step ended; the character belongs to the caller
    Stop,
}

/// Accumulated bracket content for a text location assertion
#[derive(Debug, Default)]
struct AssertionScan {
    text: String,
    pre: Option<String>,
    params: Option<String>,
}

/// State machine for a single step, fed one character at a time
#[derive(Debug)]
pub(crate) struct StepScanner {
    token: Token,
    escaped: bool,
    stricter: bool,
    buf: String,
    token_start: usize,
    assertion: AssertionScan,
    step: Step,
}

impl StepScanner {
    /// Start scanning right after the step's `/`
    pub(crate) fn new(stricter: bool, start: usize) -> Self {
        Self {
            token: Token::NodeIndex,
            escaped: false,
            stricter,
            buf: String::new(),
            token_start: start,
            assertion: AssertionScan::default(),
            step: Step::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn token(&self) -> Token {
        self.token
    }

    /// Feed one character at byte position `pos`
    pub(crate) fn feed(&mut self, ch: char, pos: usize) -> Result<Flow, ParseError> {
        if !self.escaped && ch == ESCAPE_CHAR {
            self.escaped = true;
            return Ok(Flow::Continue);
        }
        let escaped = mem::take(&mut self.escaped);

        match self.token {
            Token::NodeIndex => self.on_node_index(ch, escaped, pos),
            Token::Vendor => self.on_vendor(ch, escaped, pos),
            Token::Offset => self.on_offset(ch, escaped, pos),
            Token::Temporal => self.on_temporal(ch, escaped, pos),
            Token::Spatial => self.on_spatial(ch, escaped, pos),
            Token::NodeId => self.on_node_id(ch, escaped, pos),
            Token::Assertion => self.on_assertion(ch, escaped, pos),
            Token::None => self.on_none(ch, escaped, pos),
        }
    }

    /// Finish the step at end of input
    pub(crate) fn finish(mut self, pos: usize) -> Result<Step, ParseError> {
        match self.token {
            Token::NodeId | Token::Assertion => {
                return Err(ParseError::UnclosedBracket(self.token_start))
            }
            _ => self.commit(pos)?,
        }
        Ok(self.step)
    }

    fn enter(&mut self, token: Token, pos: usize) {
        self.token = token;
        self.token_start = pos;
        self.buf.clear();
    }

    /// Store the numeric token being accumulated
    fn commit(&mut self, pos: usize) -> Result<(), ParseError> {
        match self.token {
            Token::NodeIndex => {
                if self.buf.is_empty() {
                    return Err(ParseError::MissingNodeIndex(pos));
                }
                self.step.node_index = self
                    .buf
                    .parse()
                    .map_err(|_| ParseError::MissingNodeIndex(self.token_start))?;
            }
            Token::Offset => {
                let offset = self
                    .buf
                    .parse()
                    .map_err(|_| ParseError::InvalidOffset(self.token_start))?;
                self.step.offset = Some(offset);
            }
            Token::Temporal => {
                let temporal = self
                    .buf
                    .parse()
                    .map_err(|_| ParseError::InvalidTemporal(self.token_start))?;
                self.step.temporal = Some(temporal);
            }
            Token::Spatial => {
                let (x, y) = self
                    .buf
                    .split_once(':')
                    .ok_or(ParseError::InvalidSpatial(self.token_start))?;
                let x = x
                    .parse()
                    .map_err(|_| ParseError::InvalidSpatial(self.token_start))?;
                let y = y
                    .parse()
                    .map_err(|_| ParseError::InvalidSpatial(self.token_start))?;
                self.step.spatial = Some(Spatial { x, y });
            }
            Token::None | Token::Vendor | Token::NodeId | Token::Assertion => {}
        }
        self.buf.clear();
        Ok(())
    }

    /// Handle a structural character once the node index is known.
    /// Shared by every state that may be followed by another qualifier.
    fn dispatch(&mut self, ch: char, pos: usize) -> Result<Flow, ParseError> {
        match ch {
            '/' | '!' | ',' => Ok(Flow::Stop),
            '[' => {
                let next = if self.step.has_qualifiers() || self.step.node_id.is_some() {
                    Token::Assertion
                } else {
                    Token::NodeId
                };
                self.enter(next, pos);
                self.assertion = AssertionScan::default();
                Ok(Flow::Continue)
            }
            ':' => {
                if self.stricter && (self.step.temporal.is_some() || self.step.spatial.is_some()) {
                    return Err(ParseError::IllegalQualifier(pos));
                }
                self.enter(Token::Offset, pos);
                Ok(Flow::Continue)
            }
            '~' => {
                if self.stricter && self.step.offset.is_some() {
                    return Err(ParseError::IllegalQualifier(pos));
                }
                self.enter(Token::Temporal, pos);
                Ok(Flow::Continue)
            }
            '@' => {
                if self.stricter && self.step.offset.is_some() {
                    return Err(ParseError::IllegalQualifier(pos));
                }
                self.enter(Token::Spatial, pos);
                Ok(Flow::Continue)
            }
            other => Err(ParseError::UnexpectedChar(other, pos)),
        }
    }

    fn on_node_index(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        if escaped {
            return Err(ParseError::UnexpectedChar(ch, pos));
        }
        if ch.is_ascii_digit() {
            self.buf.push(ch);
            return Ok(Flow::Continue);
        }
        self.commit(pos)?;
        if ch.is_ascii_alphabetic() {
            self.enter(Token::Vendor, pos);
            return Ok(Flow::Continue);
        }
        self.token = Token::None;
        self.dispatch(ch, pos)
    }

    fn on_vendor(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        if escaped {
            return Ok(Flow::Continue);
        }
        match ch {
            '/' | '!' | ',' | '[' | ':' | '~' | '@' => {
                self.token = Token::None;
                self.dispatch(ch, pos)
            }
            _ => Ok(Flow::Continue),
        }
    }

    fn on_offset(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        if !escaped && ch.is_ascii_digit() {
            self.buf.push(ch);
            return Ok(Flow::Continue);
        }
        if escaped {
            return Err(ParseError::InvalidOffset(pos));
        }
        self.commit(pos)?;
        self.token = Token::None;
        self.dispatch(ch, pos)
    }

    fn on_temporal(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        if escaped {
            return Err(ParseError::InvalidTemporal(pos));
        }
        if ch.is_ascii_digit() {
            self.buf.push(ch);
            return Ok(Flow::Continue);
        }
        if ch == '.' {
            if self.buf.contains('.') {
                return Err(ParseError::InvalidTemporal(pos));
            }
            self.buf.push(ch);
            return Ok(Flow::Continue);
        }
        self.commit(pos)?;
        self.token = Token::None;
        self.dispatch(ch, pos)
    }

    fn on_spatial(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        if escaped {
            return Err(ParseError::InvalidSpatial(pos));
        }
        if ch.is_ascii_digit() || ch == '.' {
            self.buf.push(ch);
            return Ok(Flow::Continue);
        }
        if ch == ':' && !self.buf.is_empty() && !self.buf.contains(':') {
            self.buf.push(ch);
            return Ok(Flow::Continue);
        }
        self.commit(pos)?;
        self.token = Token::None;
        self.dispatch(ch, pos)
    }

    fn on_node_id(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        if escaped {
            self.buf.push(ch);
            return Ok(Flow::Continue);
        }
        match ch {
            ']' => {
                self.step.node_id = Some(mem::take(&mut self.buf));
                self.token = Token::None;
                Ok(Flow::Continue)
            }
            '[' => Err(ParseError::UnexpectedChar(ch, pos)),
            _ => {
                self.buf.push(ch);
                Ok(Flow::Continue)
            }
        }
    }

    fn on_assertion(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        let in_params = self.assertion.params.is_some();
        if !escaped {
            match ch {
                ']' => {
                    self.close_assertion();
                    return Ok(Flow::Continue);
                }
                '[' => return Err(ParseError::UnexpectedChar(ch, pos)),
                ',' if !in_params && self.assertion.pre.is_none() => {
                    let text = mem::take(&mut self.assertion.text);
                    self.assertion.pre = Some(text);
                    return Ok(Flow::Continue);
                }
                ';' if !in_params => {
                    self.assertion.params = Some(String::new());
                    return Ok(Flow::Continue);
                }
                _ => {}
            }
        }
        match self.assertion.params {
            Some(ref mut params) => params.push(ch),
            None => self.assertion.text.push(ch),
        }
        Ok(Flow::Continue)
    }

    fn close_assertion(&mut self) {
        let scan = mem::take(&mut self.assertion);
        if let Some(params) = scan.params {
            for param in params.split(';') {
                if let Some(("s", code)) = param.split_once('=') {
                    self.step.side_bias = SideBias::from_code(code.trim());
                }
            }
        }
        self.step.text_location_assertion = match scan.pre {
            Some(pre) => Some(TextLocationAssertion::Context {
                pre,
                post: (!scan.text.is_empty()).then_some(scan.text),
            }),
            None if !scan.text.is_empty() => Some(TextLocationAssertion::Plain(scan.text)),
            None => None,
        };
        self.token = Token::None;
    }

    fn on_none(&mut self, ch: char, escaped: bool, pos: usize) -> Result<Flow, ParseError> {
        if escaped {
            return Err(ParseError::UnexpectedChar(ch, pos));
        }
        self.dispatch(ch, pos)
    }
}

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Byte position of the closing `)`
    end: usize,
    options: ParseOptions,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, options: ParseOptions) -> Self {
        Self {
            input,
            pos: 0,
            end: input.len(),
            options,
        }
    }

    fn peek(&self) -> Option<char> {
        if self.pos >= self.end {
            return None;
        }
        self.input[self.pos..self.end].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    /// Scan one step; the leading `/` is already consumed
    fn scan_step(&mut self) -> Result<Step, ParseError> {
        let mut scanner = StepScanner::new(self.options.stricter, self.pos);
        while let Some(ch) = self.peek() {
            match scanner.feed(ch, self.pos)? {
                Flow::Continue => {
                    self.advance();
                }
                Flow::Stop => break,
            }
        }
        scanner.finish(self.pos)
    }

    /// Byte position of the unescaped `)` closing the wrapper
    fn closing_paren(&self) -> Result<usize, ParseError> {
        let close = match self.input.rfind(')') {
            Some(close) if close >= self.pos => close,
            _ => return Err(ParseError::MissingWrapper),
        };
        let carets = self.input[self.pos..close]
            .chars()
            .rev()
            .take_while(|&c| c == ESCAPE_CHAR)
            .count();
        if carets % 2 == 1 {
            return Err(ParseError::MissingWrapper);
        }
        if close + 1 != self.input.len() {
            return Err(ParseError::TrailingInput(close + 1));
        }
        Ok(close)
    }

    /// Parse a complete CFI
    fn parse_cfi(&mut self) -> Result<ParsedCfi, ParseError> {
        if !self.skip_str("epubcfi(") {
            return Err(ParseError::MissingWrapper);
        }
        self.end = self.closing_paren()?;
        if self.at_end() {
            return Err(ParseError::EmptyPath);
        }

        let mut path = Path::default();
        let mut current: Vec<Step> = Vec::new();
        let mut from_suffix: Vec<Step> = Vec::new();
        let mut to_suffix: Vec<Step> = Vec::new();
        // 0 = shared prefix, 1 = from suffix, 2 = to suffix
        let mut commas = 0u8;

        loop {
            if !self.skip_if('/') {
                return Err(ParseError::ExpectedStep(self.pos));
            }
            current.push(self.scan_step()?);

            match self.peek() {
                Some('/') => {}
                Some('!') => {
                    if commas > 0 {
                        return Err(ParseError::RangeSpansDocuments(self.pos));
                    }
                    self.advance();
                    path.parts.push(Part::new(mem::take(&mut current)));
                }
                Some(',') => {
                    match commas {
                        0 => path.parts.push(Part::new(mem::take(&mut current))),
                        1 => from_suffix = mem::take(&mut current),
                        _ => return Err(ParseError::TooManyCommas(self.pos)),
                    }
                    commas += 1;
                    self.advance();
                }
                Some(ch) => return Err(ParseError::UnexpectedChar(ch, self.pos)),
                None => break,
            }
        }

        match commas {
            0 => path.parts.push(Part::new(current)),
            1 => from_suffix = current,
            _ => to_suffix = current,
        }

        let mut parsed = if from_suffix.is_empty() {
            ParsedCfi::Location(path)
        } else if self.options.flatten_range || to_suffix.is_empty() {
            path.extend_last(&from_suffix);
            ParsedCfi::Location(path)
        } else {
            ParsedCfi::Range(Range {
                common_parts: path,
                from_suffix,
                to_suffix,
            })
        };

        if self.options.stricter {
            strip_non_terminal(&mut parsed);
        }
        Ok(parsed)
    }
}

/// Remove terminal-only qualifiers from every step that is not a terminus
fn strip_non_terminal(parsed: &mut ParsedCfi) {
    fn strip_all_but_last(steps: &mut [Step]) {
        if let Some((_, init)) = steps.split_last_mut() {
            init.iter_mut().for_each(Step::strip_qualifiers);
        }
    }

    match parsed {
        ParsedCfi::Location(path) => {
            for part in &mut path.parts {
                strip_all_but_last(&mut part.steps);
            }
        }
        ParsedCfi::Range(range) => {
            if let Some((last, init)) = range.common_parts.parts.split_last_mut() {
                for part in init {
                    strip_all_but_last(&mut part.steps);
                }
                last.steps.iter_mut().for_each(Step::strip_qualifiers);
            }
            strip_all_but_last(&mut range.from_suffix);
            strip_all_but_last(&mut range.to_suffix);
        }
    }
}

/// Parse a CFI string with default options
pub fn parse(input: &str) -> Result<ParsedCfi, ParseError> {
    parse_with(input, ParseOptions::default())
}

/// Parse a CFI string
pub fn parse_with(input: &str, options: ParseOptions) -> Result<ParsedCfi, ParseError> {
    let input = input.trim();
    let input = input.strip_prefix('#').unwrap_or(input);
    Parser::new(input, options).parse_cfi()
}
