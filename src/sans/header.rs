//! Resolution of column names to column indices.

use std::collections::HashMap;

use log::warn;
use thiserror::Error;

use super::row::{Row, RowSource};

/// An error resolving a header.
#[derive(Debug, Error)]
pub enum HeaderError<E> {
    /// An error from the row source.
    #[error(transparent)]
    Source(E),
    /// Reached the end of input before a header row.
    #[error("Reached the end of input before a header row.")]
    MissingHeader,
}

/// A mapping from column name to zero-based column index.
///
/// When a name occurs more than once, its last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl HeaderMap {
    /// Build a header map from an ordered list of column names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut indices = HashMap::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            if let Some(previous) = indices.insert(name.clone(), i) {
                warn!("Column `{name}` appears at {previous} and {i}; using {i}.");
            }
        }

        Self { names, indices }
    }

    /// Resolve a header, either from an explicit list of column names or by
    /// reading exactly one row from a source.
    ///
    /// No row is consumed when an explicit list is supplied.
    pub fn resolve<S: RowSource>(
        explicit: Option<&[String]>,
        rows: &mut S,
    ) -> Result<Self, HeaderError<S::Error>> {
        if let Some(names) = explicit {
            return Ok(Self::from_names(names.iter().cloned()));
        }

        let row = rows
            .read_row()
            .map_err(HeaderError::Source)?
            .ok_or(HeaderError::MissingHeader)?;

        let names = (0..row.len()).map(|i| {
            let bytes = row.get(i).unwrap_or_default();
            let name = String::from_utf8_lossy(bytes);
            if let std::borrow::Cow::Owned(_) = name {
                warn!("Column {i} has a name that is not valid UTF-8.");
            }
            name.into_owned()
        });

        Ok(Self::from_names(names))
    }

    /// The index of a column, if the header names it.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// The column names, in header order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Iterate over column names and their resolved indices, in header order.
    ///
    /// Names shadowed by a later duplicate are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.names
            .iter()
            .enumerate()
            .filter(|(i, name)| self.indices.get(name.as_str()) == Some(i))
            .map(|(i, name)| (name.as_str(), i))
    }

    /// The number of columns in the header.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the header has no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rows {
        rows: Vec<Vec<&'static str>>,
        next: usize,
    }

    impl Rows {
        fn new(rows: Vec<Vec<&'static str>>) -> Self {
            Self { rows, next: 0 }
        }
    }

    impl RowSource for Rows {
        type Row = Vec<&'static str>;
        type Error = ();

        fn read_row(&mut self) -> Result<Option<&Self::Row>, ()> {
            let row = self.rows.get(self.next);
            self.next += 1;
            Ok(row)
        }
    }

    #[test]
    fn names_map_to_positions() {
        let names = ["one", "two", "three"];
        let headers = HeaderMap::from_names(names);

        for (i, name) in names.iter().enumerate() {
            assert_eq!(headers.get(name), Some(i));
        }
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("four"), None);
    }

    #[test]
    fn duplicate_names_resolve_to_last() {
        let headers = HeaderMap::from_names(["a", "b", "a"]);

        assert_eq!(headers.get("a"), Some(2));
        assert_eq!(headers.iter().collect::<Vec<_>>(), [("b", 1), ("a", 2)]);
    }

    #[test]
    fn explicit_names_consume_no_row() {
        let mut rows = Rows::new(vec![vec!["x", "y"]]);
        let explicit = vec!["Name".to_string(), "Age".to_string()];

        let headers = HeaderMap::resolve(Some(explicit.as_slice()), &mut rows).unwrap();

        assert_eq!(headers.get("Age"), Some(1));
        assert_eq!(rows.read_row().unwrap(), Some(&vec!["x", "y"]));
    }

    #[test]
    fn first_row_becomes_header() {
        let mut rows = Rows::new(vec![vec!["Name", "Age"]]);

        let headers = HeaderMap::resolve(None, &mut rows).unwrap();

        assert_eq!(headers.names(), ["Name", "Age"]);
    }

    #[test]
    fn empty_source_has_no_header() {
        let mut rows = Rows::new(vec![]);

        let result = HeaderMap::resolve(None, &mut rows);

        assert!(matches!(result, Err(HeaderError::MissingHeader)));
    }
}
