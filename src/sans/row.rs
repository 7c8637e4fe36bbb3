//! Raw rows and their suppliers.

/// An ordered sequence of raw fields for one input line.
///
/// Rows are borrowed for the duration of a single decode; routines never
/// retain their bytes.
pub trait Row {
    /// The number of fields in the row.
    fn len(&self) -> usize;

    /// The raw bytes of a field, if the row has one at this index.
    fn get(&self, index: usize) -> Option<&[u8]>;

    /// Whether the row has no fields.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<F: AsRef<[u8]>> Row for [F] {
    fn len(&self) -> usize {
        <[F]>::len(self)
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        <[F]>::get(self, index).map(AsRef::as_ref)
    }
}

impl<F: AsRef<[u8]>> Row for Vec<F> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        self.as_slice().get(index).map(AsRef::as_ref)
    }
}

/// A pull-based supplier of rows, such as a tokenizer.
pub trait RowSource {
    /// The row type produced.
    type Row: Row + ?Sized;
    /// The error produced when a row cannot be read.
    type Error;

    /// Read the next row, or `None` at the end of input.
    fn read_row(&mut self) -> Result<Option<&Self::Row>, Self::Error>;
}
