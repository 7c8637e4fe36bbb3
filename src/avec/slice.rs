//! Slice-based decoder implementation.

use super::{
    Record,
    reader::{self, Error, Options},
};

/// Decode records from a slice of delimited text.
///
/// Returns every record, or the first error encountered; a malformed row
/// anywhere in the slice yields no records at all.
///
/// This method is also re-exported as `rowbind::avec::decode_slice`.
pub fn decode<T: Record>(r: &[u8], options: &Options) -> Result<Vec<T>, Error> {
    reader::decode(r, options)
}
