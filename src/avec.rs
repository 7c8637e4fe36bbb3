//! Convenience interfaces for common decoding patterns.
//!
//! The functions in this module are suited to decoding records from readers
//! and byte slices of delimited text, into any type implementing [`Record`].
//!
//! In most cases, this trait can be derived. See the
//! [`Record`](macro@Record) macro for details.

use std::any::Any;

use crate::sans::{bind::Method, field::FieldDescriptor};

pub mod reader;
pub mod scan;
pub mod slice;

pub use reader::decode as decode_reader;
pub use reader::{Options, Reader};
pub use slice::decode as decode_slice;

/// Derive [`Record`] for a struct with named fields.
///
/// _Requires Cargo feature `derive`._
///
/// # Examples
///
/// Without attributes, each field is read from the column sharing its name.
/// The struct must implement [`Default`]; fields whose column is absent from
/// the header keep their default value.
///
/// ```
/// #[derive(Debug, Default, Record)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
/// ```
///
/// A tag, in the form `column,decoder,encoder,requiredness`, renames the
/// column, names a custom decoder, and marks the field as required. Trailing
/// components may be omitted, and blank components take their default.
///
/// ```
/// #[derive(Debug, Default, Record)]
/// struct Person {
///     #[csv("Name,,,required")]
///     name: String,
///     #[csv("Years,decode_years")]
///     age: u32,
/// }
///
/// impl Person {
///     fn decode_years(age: &mut u32, raw: &[u8]) -> Result<(), BoxError> {
///         *age = std::str::from_utf8(raw)?.trim_end_matches(" years").parse()?;
///         Ok(())
///     }
/// }
/// ```
///
/// A custom decoder is an associated function of the record taking the
/// destination field and the raw column bytes, and returning a result whose
/// error converts into a [`BoxError`](crate::BoxError). A decoder of the wrong
/// shape is a compile error. A field with a custom decoder needs no default
/// decoding, so its type need not implement `Deserialize`.
///
/// Fields of type `String`, `char`, `PathBuf`, or `Cow<str>` (or an `Option`
/// or `Box` of one) are decoded as text: the column is quoted before being
/// handed to the JSON decoder, so it may contain any characters. All other
/// fields are decoded from the column as a literal JSON token, which suits
/// numbers, booleans, and nested JSON values. Mark a field `text` to decode a
/// custom type from a JSON string (for example, a unit-variant enum), or
/// `from_str` to parse it with [`FromStr`](std::str::FromStr). A field marked
/// `skip` is never read and keeps its default value.
///
/// ```
/// #[derive(Debug, Default, Record)]
/// struct Host {
///     #[csv(from_str)]
///     version: Version,
///     #[csv("Role", text)]
///     role: Role,
///     #[csv(skip)]
///     seen: bool,
/// }
/// ```
///
/// A field marked `flatten` holds another record, whose fields are read from
/// the same header as if declared in place. The column names of all fields
/// without an explicit name can be adjusted with `rename_all`.
///
/// ```
/// #[derive(Debug, Default, Record)]
/// #[csv(rename_all = "PascalCase")]
/// struct Order {
///     order_id: u64,
///     #[csv(flatten)]
///     customer: Customer,
/// }
/// ```
#[cfg(feature = "derive")]
pub use rowbind_derive::Record;

/// A type whose fields can be decoded from the columns of a row.
///
/// See the [`Record`](macro@Record) derive macro for an automatic
/// implementation of this trait.
pub trait Record: Default + 'static {
    /// Describe the fields of the record, in declaration order.
    fn fields() -> Vec<FieldDescriptor>;

    /// Address a field by its location: the index of the field in
    /// [`Record::fields`], followed by the location within a flattened record.
    fn field_mut(&mut self, location: &[usize]) -> Option<&mut dyn Any>;

    /// Look up a custom decoder by name.
    ///
    /// The default implementation has no decoders.
    #[allow(unused_variables)]
    fn decoder(name: &str) -> Option<Method> {
        None
    }
}
