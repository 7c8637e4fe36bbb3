//! Reader-based decoder implementation.

use std::io::Read;

use csv::{ByteRecord, ReaderBuilder};
use either::Either::{Left, Right};
use thiserror::Error;

use crate::sans::{
    Decoder,
    bind::BindError,
    header::{HeaderError, HeaderMap},
    plan::{DecodeError, PlanCache, PlanError},
    row::{Row, RowSource},
    stream::{HeaderResolved, PlanBuilt},
};

use super::{
    Record,
    scan::{QuoteError, Scanner},
};

/// Errors occurring while decoding from a reader.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid options.
    #[error("Invalid options: {0}")]
    Config(#[from] ConfigError),
    /// Malformed input.
    #[error("Malformed input: {0}")]
    Parse(#[from] ParseError),
    /// The record type does not fit the header.
    #[error("Cannot decode records from this header: {0}")]
    Plan(PlanError),
    /// A custom decoder could not be bound to a field.
    #[error("Failed to bind the decoder of field `{field}`: {source}")]
    Bind {
        field: String,
        #[source]
        source: BindError,
    },
    /// A row could not be decoded.
    #[error("Failed to decode the row on line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: DecodeError,
    },
}

impl From<PlanError> for Error {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Bind { field, source } => Self::Bind { field, source },
            err => Self::Plan(err),
        }
    }
}

impl From<HeaderError<ParseError>> for Error {
    fn from(err: HeaderError<ParseError>) -> Self {
        match err {
            HeaderError::Source(err) => Self::Parse(err),
            HeaderError::MissingHeader => Self::Parse(ParseError::MissingHeader),
        }
    }
}

/// Invalid tokenizer options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A delimiter, quote, or comment character is a line terminator.
    #[error("The {0} character must not be a line terminator.")]
    LineTerminator(&'static str),
    /// The comment character is the delimiter.
    #[error("The comment character must differ from the delimiter.")]
    CommentIsDelimiter,
    /// A fixed field count of zero.
    #[error("A fixed field count must be positive.")]
    ZeroFieldCount,
}

/// Malformed input found by the tokenizer.
#[derive(Debug, Error)]
pub enum ParseError {
    /// An error from the underlying reader or tokenizer.
    #[error(transparent)]
    Csv(csv::Error),
    /// A misplaced quote, when quotes are not lazy.
    #[error(transparent)]
    Quote(#[from] QuoteError),
    /// A row has an unexpected number of fields.
    #[error("Expected {expected} fields on line {line}, found {found}.")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },
    /// Reached the end of input before a header row.
    #[error("Reached the end of input before a header row.")]
    MissingHeader,
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let quote = match err.kind() {
            csv::ErrorKind::Io(io) => io
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<QuoteError>())
                .copied(),
            _ => None,
        };

        match quote {
            Some(quote) => Self::Quote(quote),
            None => Self::Csv(err),
        }
    }
}

/// The number of fields each row must have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldCount {
    /// Rows may have any number of fields.
    Unchecked,
    /// Rows must have as many fields as the first row read (the header row,
    /// when the header is not supplied explicitly).
    #[default]
    FirstRow,
    /// Rows must have exactly this many fields.
    Fixed(usize),
}

/// Options for tokenizing and decoding delimited text.
///
/// ```
/// let options = Options::builder()
///     .delimiter(b';')
///     .comment(b'#')
///     .trim_leading_space(true)
///     .build();
/// ```
#[derive(bon::Builder, Debug, Clone)]
pub struct Options {
    /// Column names, used in place of a header row.
    ///
    /// When absent, the first row is read as the header.
    pub headers: Option<Vec<String>>,
    /// The field delimiter.
    #[builder(default = b',')]
    pub delimiter: u8,
    /// Lines beginning with this character are skipped. A comment character
    /// after leading whitespace is field content.
    pub comment: Option<u8>,
    /// The number of fields each row must have.
    #[builder(default)]
    pub field_count: FieldCount,
    /// Strip leading whitespace from each field, before any opening quote.
    #[builder(default)]
    pub trim_leading_space: bool,
    /// The quote character.
    #[builder(default = b'"')]
    pub quote: u8,
    /// Interpret quotes. When disabled, quotes are field content.
    #[builder(default = true)]
    pub quoting: bool,
    /// An escape character for quotes within quoted fields, in place of
    /// doubled quotes.
    pub escape: Option<u8>,
    /// Accept a quote inside an unquoted field, and a lone quote inside a
    /// quoted field, as content. Otherwise these are parse errors.
    #[builder(default)]
    pub lazy_quotes: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Options {
    /// Check the options for contradictions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_terminator = |c: u8| c == b'\r' || c == b'\n';

        if is_terminator(self.delimiter) {
            Err(ConfigError::LineTerminator("delimiter"))?;
        }
        if is_terminator(self.quote) {
            Err(ConfigError::LineTerminator("quote"))?;
        }
        if let Some(comment) = self.comment {
            if is_terminator(comment) {
                Err(ConfigError::LineTerminator("comment"))?;
            }
            if comment == self.delimiter {
                Err(ConfigError::CommentIsDelimiter)?;
            }
        }
        if self.field_count == FieldCount::Fixed(0) {
            Err(ConfigError::ZeroFieldCount)?;
        }

        Ok(())
    }
}

impl Row for ByteRecord {
    fn len(&self) -> usize {
        ByteRecord::len(self)
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        ByteRecord::get(self, index)
    }
}

/// A source of rows from a reader of delimited text.
///
/// Splitting is performed by the [`csv`] crate, behind a [`Scanner`] applying
/// trimming, comment, and quote rules. This type adds the field count policy
/// of [`Options`].
pub struct Tokenizer<R> {
    reader: csv::Reader<Scanner<R>>,
    record: ByteRecord,
    field_count: FieldCount,
}

impl<R: Read> Tokenizer<R> {
    /// Create a tokenizer reading from `r`.
    pub fn new(r: R, options: &Options) -> Result<Self, ConfigError> {
        options.validate()?;

        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter)
            .quote(options.quote)
            .quoting(options.quoting)
            .double_quote(options.escape.is_none())
            .escape(options.escape)
            .from_reader(Scanner::new(r, options));

        Ok(Self {
            reader,
            record: ByteRecord::new(),
            field_count: options.field_count,
        })
    }
}

impl<R: Read> RowSource for Tokenizer<R> {
    type Row = ByteRecord;
    type Error = ParseError;

    fn read_row(&mut self) -> Result<Option<&ByteRecord>, ParseError> {
        if !self.reader.read_byte_record(&mut self.record)? {
            return Ok(None);
        }

        let found = self.record.len();
        let line = self.record.position().map_or(0, |p| p.line());

        match self.field_count {
            FieldCount::Unchecked => {}
            FieldCount::FirstRow => self.field_count = FieldCount::Fixed(found),
            FieldCount::Fixed(expected) if expected != found => Err(ParseError::FieldCount {
                line,
                expected,
                found,
            })?,
            FieldCount::Fixed(_) => {}
        }

        Ok(Some(&self.record))
    }
}

/// A decoder of records from a reader, with its header resolved.
pub struct Reader<R> {
    tokenizer: Tokenizer<R>,
    header: HeaderResolved,
}

impl<R: Read> Reader<R> {
    /// Create a decoder reading from `r`.
    ///
    /// Unless the options supply column names, the first row is read as the
    /// header.
    pub fn new(r: R, options: &Options) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::new(r, options)?;
        let header = Decoder::default().advance(options.headers.as_deref(), &mut tokenizer)?;

        Ok(Self { tokenizer, header })
    }

    /// The resolved header.
    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    /// Decode all remaining rows into records of type `T`.
    ///
    /// Returns every record, or the first error encountered.
    pub fn decode<T: Record>(&mut self) -> Result<Vec<T>, Error> {
        let state = self.header.clone().advance::<T>()?;
        drain(&mut self.tokenizer, state)
    }

    /// Decode all remaining rows into records of type `T`, with a decoder plan
    /// taken from a cache.
    pub fn decode_cached<T: Record>(&mut self, cache: &mut PlanCache) -> Result<Vec<T>, Error> {
        let state = self.header.clone().advance_cached::<T>(cache)?;
        drain(&mut self.tokenizer, state)
    }
}

/// Decode records from a reader of delimited text.
///
/// This method is also re-exported as `rowbind::avec::decode_reader`.
pub fn decode<T: Record>(r: impl Read, options: &Options) -> Result<Vec<T>, Error> {
    Reader::new(r, options)?.decode()
}

fn drain<R: Read, T: Record>(
    tokenizer: &mut Tokenizer<R>,
    mut state: PlanBuilt<T>,
) -> Result<Vec<T>, Error> {
    let mut records = Vec::new();

    loop {
        let row = tokenizer.read_row()?;
        let line = row.and_then(ByteRecord::position).map_or(0, |p| p.line());

        state = match state.advance(row) {
            Ok(Left((record, state))) => {
                records.push(record);
                state
            }
            Ok(Right(_)) => break,
            Err(source) => Err(Error::Decode { line, source })?,
        };
    }

    Ok(records)
}
