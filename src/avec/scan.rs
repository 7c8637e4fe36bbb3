//! Byte-level preparation of delimited text before tokenization.
//!
//! [`Scanner`] sits between a reader and the [`csv`] tokenizer. It tracks
//! field and quote boundaries to apply the parts of [`Options`] that the
//! tokenizer has no setting for:
//!
//! - leading whitespace of each field is dropped before any quote is read, so
//!   that a quoted field may follow a space;
//! - comment lines are recognized only when the comment character starts the
//!   line, before any whitespace;
//! - unless quotes are lazy, a quote inside an unquoted field, a lone quote
//!   inside a quoted field, and an unclosed quoted field are errors.
//!
//! The scanner hands the tokenizer at most one line per read, so an error
//! surfaces when the row containing it is reached.

use std::io::{self, Read};

use thiserror::Error;

use super::reader::Options;

/// A quote in a position where quotes are not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// A quote in a field that did not begin with one.
    #[error("Bare quote in an unquoted field on line {line}.")]
    Bare { line: u64 },
    /// A quote inside a quoted field, neither doubled nor closing the field.
    #[error("Extraneous or missing quote in a quoted field on line {line}.")]
    Extraneous { line: u64 },
    /// Reached the end of input inside a quoted field.
    #[error("Quoted field opened on line {line} is never closed.")]
    Unterminated { line: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RowStart,
    /// `blank_row` is set when whitespace was dropped from the start of the
    /// row and nothing has been written since.
    FieldStart {
        blank_row: bool,
    },
    Unquoted,
    Quoted,
    Escaped,
    QuoteInQuoted,
    Comment,
}

/// A reader applying trimming, comment, and quote rules ahead of the
/// tokenizer.
pub struct Scanner<R> {
    inner: R,
    input: Box<[u8]>,
    pos: usize,
    len: usize,
    output: Vec<u8>,
    served: usize,
    state: State,
    line: u64,
    quote_line: u64,
    delimiter: u8,
    quote: u8,
    quoting: bool,
    escape: Option<u8>,
    comment: Option<u8>,
    trim: bool,
    lazy: bool,
}

impl<R: Read> Scanner<R> {
    /// Wrap a reader, taking the delimiter, quote, comment, trimming, and
    /// laziness settings from `options`.
    pub fn new(inner: R, options: &Options) -> Self {
        Self {
            inner,
            input: vec![0; 8 * 1024].into_boxed_slice(),
            pos: 0,
            len: 0,
            output: Vec::new(),
            served: 0,
            state: State::RowStart,
            line: 1,
            quote_line: 1,
            delimiter: options.delimiter,
            quote: options.quote,
            quoting: options.quoting,
            escape: options.escape,
            comment: options.comment,
            trim: options.trim_leading_space,
            lazy: options.lazy_quotes,
        }
    }

    /// Scan input up to the end of the next line into the output buffer.
    ///
    /// Returns `false` once input is exhausted and nothing remains to serve.
    fn fill_line(&mut self) -> io::Result<bool> {
        self.output.clear();
        self.served = 0;

        loop {
            if self.pos == self.len {
                self.len = self.inner.read(&mut self.input)?;
                self.pos = 0;

                if self.len == 0 {
                    self.finish().map_err(invalid)?;
                    return Ok(!self.output.is_empty());
                }
            }

            let b = self.input[self.pos];
            self.pos += 1;
            self.step(b).map_err(invalid)?;

            if b == b'\n' {
                self.line += 1;
                return Ok(true);
            }
        }
    }

    fn step(&mut self, b: u8) -> Result<(), QuoteError> {
        match self.state {
            State::Comment => {
                // The newline is kept so the tokenizer sees an empty line.
                if b == b'\n' {
                    self.output.push(b);
                    self.state = State::RowStart;
                }
            }
            State::RowStart if Some(b) == self.comment => self.state = State::Comment,
            State::RowStart if self.trim && is_blank(b) => {
                self.state = State::FieldStart { blank_row: true };
            }
            State::RowStart => self.field_start(b, false),
            State::FieldStart { blank_row } => self.field_start(b, blank_row),
            State::Unquoted => {
                if b == self.delimiter {
                    self.state = State::FieldStart { blank_row: false };
                } else if is_terminator(b) {
                    self.state = State::RowStart;
                } else if self.quoting && b == self.quote && !self.lazy {
                    Err(QuoteError::Bare { line: self.line })?;
                }
                self.output.push(b);
            }
            State::Quoted => {
                if Some(b) == self.escape {
                    self.state = State::Escaped;
                } else if b == self.quote {
                    self.state = State::QuoteInQuoted;
                }
                self.output.push(b);
            }
            State::Escaped => {
                self.state = State::Quoted;
                self.output.push(b);
            }
            State::QuoteInQuoted => {
                if b == self.quote && self.escape.is_none() {
                    self.state = State::Quoted;
                } else if b == self.delimiter {
                    self.state = State::FieldStart { blank_row: false };
                } else if is_terminator(b) {
                    self.state = State::RowStart;
                } else if self.lazy {
                    self.state = State::Unquoted;
                } else {
                    Err(QuoteError::Extraneous { line: self.line })?;
                }
                self.output.push(b);
            }
        }

        Ok(())
    }

    fn field_start(&mut self, b: u8, blank_row: bool) {
        if self.trim && is_blank(b) {
            self.state = State::FieldStart { blank_row };
            return;
        }

        if b == self.delimiter {
            self.state = State::FieldStart { blank_row: false };
        } else if is_terminator(b) {
            // A row of whitespace still holds one empty field.
            if blank_row && self.quoting {
                self.output.extend_from_slice(&[self.quote, self.quote]);
            }
            self.state = State::RowStart;
        } else if self.quoting && b == self.quote {
            self.quote_line = self.line;
            self.state = State::Quoted;
        } else {
            self.state = State::Unquoted;
        }

        self.output.push(b);
    }

    fn finish(&mut self) -> Result<(), QuoteError> {
        match self.state {
            State::Quoted | State::Escaped if !self.lazy => Err(QuoteError::Unterminated {
                line: self.quote_line,
            })?,
            State::FieldStart { blank_row: true } if self.quoting => {
                self.output.extend_from_slice(&[self.quote, self.quote]);
                self.state = State::RowStart;
            }
            _ => {}
        }

        Ok(())
    }
}

impl<R: Read> Read for Scanner<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.served == self.output.len() {
            if !self.fill_line()? {
                return Ok(0);
            }
        }

        let n = buf.len().min(self.output.len() - self.served);
        buf[..n].copy_from_slice(&self.output[self.served..self.served + n]);
        self.served += n;

        Ok(n)
    }
}

fn is_blank(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\x0b' | b'\x0c')
}

fn is_terminator(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

fn invalid(err: QuoteError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn scan(input: &[u8], options: &Options) -> Result<Vec<u8>, QuoteError> {
        let mut output = Vec::new();
        match Scanner::new(input, options).read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(err) => Err(*err.into_inner().unwrap().downcast::<QuoteError>().unwrap()),
        }
    }

    #[rstest]
    #[case(&b"Bob, \"Oslo, Norway\"\n"[..], &b"Bob,\"Oslo, Norway\"\n"[..])]
    #[case(&b"  a,\t b\r\n"[..], &b"a,b\r\n"[..])]
    #[case(&b"a\n   \nb"[..], &b"a\n\"\"\nb"[..])]
    #[case(&b"a,  "[..], &b"a,"[..])]
    #[case(&b"a\n\nb\n"[..], &b"a\n\nb\n"[..])]
    #[case(&b"# note, \"quoted\n x\n"[..], &b"\nx\n"[..])]
    #[case(&b" # kept\n"[..], &b"# kept\n"[..])]
    fn trims_fields_and_drops_comments(#[case] input: &[u8], #[case] expected: &[u8]) {
        let options = Options::builder()
            .trim_leading_space(true)
            .comment(b'#')
            .build();
        assert_eq!(scan(input, &options).unwrap(), expected);
    }

    #[test]
    fn untrimmed_input_passes_through() {
        let input = b" a,\"b \"\"c\"\"\"\n\"multi\nline\",d\n";
        assert_eq!(scan(input, &Options::default()).unwrap(), input);
    }

    #[rstest]
    #[case(&b"Bo\"b,Oslo\n"[..], QuoteError::Bare { line: 1 })]
    #[case(&b"x\n\"Al\"ice\",Bergen\n"[..], QuoteError::Extraneous { line: 2 })]
    #[case(&b"a\n\"open,\nstill open\n"[..], QuoteError::Unterminated { line: 2 })]
    fn strict_quotes_reject(#[case] input: &[u8], #[case] expected: QuoteError) {
        assert_eq!(scan(input, &Options::default()), Err(expected));

        let lazy = Options::builder().lazy_quotes(true).build();
        assert_eq!(scan(input, &lazy).unwrap(), input);
    }

    #[test]
    fn escape_keeps_quote_in_field() {
        let options = Options::builder().escape(b'\\').build();
        let input = b"\"say \\\"hi\\\"\",x\n";
        assert_eq!(scan(input, &options).unwrap(), input);
    }

    #[test]
    fn quotes_are_content_without_quoting() {
        let options = Options::builder().quoting(false).build();
        let input = b"Bo\"b,\"x\n";
        assert_eq!(scan(input, &options).unwrap(), input);
    }
}
