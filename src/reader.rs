//! The S-expression reader: characters in, [`Syntax`] trees out.
//!
//! Reading is incremental. The REPL pushes whole lines into a
//! [`SyntaxReader`] and asks for one top-level item at a time; the reader
//! answers with an item, with "need more input", or with end-of-stream.
//! Internally the grammar is built from nom's *streaming* combinators, so
//! running off the end of the buffered input surfaces as
//! [`nom::Err::Incomplete`] rather than a parse failure.

use nom::branch::alt;
use nom::bytes::streaming::take_while1;
use nom::character::streaming::{char, one_of};
use nom::{IResult, Needed, Parser};

use crate::RuntimeError;

/// One node of the concrete syntax: an atom or a bracketed list.
///
/// Rationals store their numerator and a strictly positive denominator.
/// Symbols carry their text verbatim, which includes names like `+`,
/// `eq?`, `set-car!`, and the lone `.` that marks a dotted tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syntax {
    Integer(i64),
    Rational(i64, i64),
    Boolean(bool),
    Str(String),
    Symbol(String),
    List(Vec<Syntax>),
}

impl Syntax {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Syntax::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

/// Characters that terminate an atom.
fn is_delimiter(c: char) -> bool {
    c.is_ascii_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ';')
}

/// Skip whitespace and `;`-to-end-of-line comments.
///
/// Streaming: an input that ends inside the skipped region is incomplete,
/// because more whitespace or comment text may still arrive.
fn skip_atmosphere(input: &str) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        if rest.is_empty() {
            return Err(nom::Err::Incomplete(Needed::new(1)));
        }
        if let Some(comment) = rest.strip_prefix(';') {
            match comment.find('\n') {
                Some(end) => rest = &comment[end + 1..],
                None => return Err(nom::Err::Incomplete(Needed::new(1))),
            }
        } else {
            return Ok((rest, ()));
        }
    }
}

/// Read exactly one item: a list, a quoted form, a string, or an atom.
fn read_item(input: &str) -> IResult<&str, Syntax> {
    let (input, ()) = skip_atmosphere(input)?;
    alt((read_list, read_quoted, read_string, read_atom)).parse(input)
}

/// `(` or `[` opens a list; either `)` or `]` closes it. A mismatched pair
/// is not diagnosed.
fn read_list(input: &str) -> IResult<&str, Syntax> {
    let (mut input, _) = one_of("([").parse(input)?;
    let mut items = Vec::new();
    loop {
        let (rest, ()) = skip_atmosphere(input)?;
        if let Some(after) = rest.strip_prefix([')', ']']) {
            return Ok((after, Syntax::List(items)));
        }
        let (rest, item) = read_item(rest)?;
        items.push(item);
        input = rest;
    }
}

/// `'x` reads as `(quote x)`.
fn read_quoted(input: &str) -> IResult<&str, Syntax> {
    let (input, _) = char('\'').parse(input)?;
    let (input, quoted) = read_item(input)?;
    Ok((
        input,
        Syntax::List(vec![Syntax::Symbol("quote".to_owned()), quoted]),
    ))
}

/// A `"`-delimited string literal. `\n`, `\t`, `\r`, `\\`, and `\"` decode
/// to their usual characters; any other escaped character decodes to
/// itself. Strings may span lines.
fn read_string(input: &str) -> IResult<&str, Syntax> {
    let (input, _) = char('"').parse(input)?;
    let mut text = String::new();
    let mut chars = input.chars();
    loop {
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), Syntax::Str(text))),
            Some('\\') => match chars.next() {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some('r') => text.push('\r'),
                Some(other) => text.push(other),
                None => return Err(nom::Err::Incomplete(Needed::new(1))),
            },
            Some(ch) => text.push(ch),
            None => return Err(nom::Err::Incomplete(Needed::new(1))),
        }
    }
}

/// Consume one token up to the next delimiter and classify it.
fn read_atom(input: &str) -> IResult<&str, Syntax> {
    let (input, token) = take_while1(|c: char| !is_delimiter(c)).parse(input)?;
    Ok((input, classify_atom(token)))
}

fn classify_atom(token: &str) -> Syntax {
    match token {
        "#t" => Syntax::Boolean(true),
        "#f" => Syntax::Boolean(false),
        _ => {
            if let Some((numerator, denominator)) = parse_rational(token) {
                Syntax::Rational(numerator, denominator)
            } else if let Some(n) = parse_integer(token) {
                Syntax::Integer(n)
            } else {
                Syntax::Symbol(token.to_owned())
            }
        }
    }
}

/// A signed decimal integer. A bare sign is not a number.
fn parse_integer(token: &str) -> Option<i64> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// `num/den` where both sides are signed decimal integers and the
/// denominator is strictly positive. Anything else (a second slash, an
/// empty side) falls through to a symbol.
fn parse_rational(token: &str) -> Option<(i64, i64)> {
    let (num, den) = token.split_once('/')?;
    let numerator = parse_integer(num)?;
    let denominator = parse_integer(den)?;
    (denominator > 0).then_some((numerator, denominator))
}

/// Outcome of one [`SyntaxReader::read`] attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One complete top-level item.
    Item(Syntax),
    /// The buffered input does not yet hold a complete item.
    NeedMore,
    /// The input stream is exhausted.
    Done,
}

/// Incremental reader over buffered lines of input.
#[derive(Debug, Default)]
pub struct SyntaxReader {
    buffer: String,
    eof: bool,
}

impl SyntaxReader {
    pub fn new() -> SyntaxReader {
        SyntaxReader::default()
    }

    /// Append one line of input. The newline the line source stripped is
    /// restored, so comments and atoms terminate exactly as they would in
    /// the raw character stream.
    pub fn push_line(&mut self, line: &str) {
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    /// Mark the end of the input stream.
    pub fn finish(&mut self) {
        self.eof = true;
        self.buffer.push('\n');
    }

    /// Try to read the next top-level item from the buffered input.
    ///
    /// A form still structurally open when the stream ends is dropped and
    /// reported as [`ReadOutcome::Done`]. A character that cannot begin any
    /// item (a stray closing bracket) is consumed so the session can make
    /// progress, and reported as an error.
    pub fn read(&mut self) -> Result<ReadOutcome, RuntimeError> {
        enum Parsed {
            Item(usize, Syntax),
            Incomplete,
            Bad(usize),
        }
        let parsed = match read_item(&self.buffer) {
            Ok((rest, item)) => Parsed::Item(self.buffer.len() - rest.len(), item),
            Err(nom::Err::Incomplete(_)) => Parsed::Incomplete,
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                Parsed::Bad(self.buffer.len() - e.input.len())
            }
        };
        match parsed {
            Parsed::Item(consumed, item) => {
                self.buffer.drain(..consumed);
                Ok(ReadOutcome::Item(item))
            }
            Parsed::Incomplete if self.eof => Ok(ReadOutcome::Done),
            Parsed::Incomplete => Ok(ReadOutcome::NeedMore),
            Parsed::Bad(offset) => {
                let bad = self.buffer[offset..].chars().next().map_or(0, char::len_utf8);
                self.buffer.drain(..offset + bad);
                Err(RuntimeError::new("Unknown syntax node"))
            }
        }
    }
}

/// Read every top-level item from a complete input string.
pub fn read_all(input: &str) -> Result<Vec<Syntax>, RuntimeError> {
    let mut reader = SyntaxReader::new();
    reader.push_line(input);
    reader.finish();
    let mut items = Vec::new();
    loop {
        match reader.read()? {
            ReadOutcome::Item(item) => items.push(item),
            ReadOutcome::Done => return Ok(items),
            ReadOutcome::NeedMore => unreachable!("stream already finished"),
        }
    }
}
