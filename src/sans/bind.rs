//! Selection and binding of field decode routines.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    str::FromStr,
    sync::Arc,
};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::BoxError;

use super::field::FieldMetadata;

/// An error binding a custom decoder to a field.
#[derive(Debug, Error)]
pub enum BindError {
    /// The record type has no decoder method of this name.
    #[error("No decoder method named `{0}`.")]
    MissingMethod(String),
    /// The field's type has no default routine, and no decoder is named.
    #[error("Field of type `{0}` has no default decoding, and must name a decoder.")]
    NoDefault(&'static str),
    /// The decoder method writes a type other than the field's.
    #[error("Decoder method `{name}` writes `{found}`, but the field holds `{expected}`.")]
    Signature {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// A default decode routine, writing into a type-erased field.
pub type DecodeFn = fn(&mut dyn Any, &[u8]) -> Result<(), BoxError>;

type CustomFn = Arc<dyn Fn(&mut dyn Any, &[u8]) -> Result<(), BoxError> + Send + Sync>;

/// How a default routine hands raw bytes to the scalar decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    /// Quote and escape the text, then decode it as a JSON string.
    Quoted,
    /// Decode the bytes as a literal JSON token.
    Unquoted,
    /// Parse the text with [`FromStr`].
    Parsed,
}

/// The static type of a field, with its default decode routine, if any.
#[derive(Clone, Copy)]
pub struct FieldType {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) default: Option<(Decoding, DecodeFn)>,
}

impl FieldType {
    /// A textual field, decoded from quoted text.
    pub fn quoted<T: DeserializeOwned + 'static>() -> Self {
        Self::new::<T>(Some((Decoding::Quoted, quoted::<T>)))
    }

    /// A field decoded from a literal token.
    pub fn unquoted<T: DeserializeOwned + 'static>() -> Self {
        Self::new::<T>(Some((Decoding::Unquoted, unquoted::<T>)))
    }

    /// A field parsed from text.
    pub fn parsed<T>() -> Self
    where
        T: FromStr + 'static,
        T::Err: Into<BoxError>,
    {
        Self::new::<T>(Some((Decoding::Parsed, parsed::<T>)))
    }

    /// A field decoded only by a custom decoder.
    pub fn custom<T: 'static>() -> Self {
        Self::new::<T>(None)
    }

    fn new<T: 'static>(default: Option<(Decoding, DecodeFn)>) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            default,
        }
    }

    /// The name of the field's type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// How the default routine decodes this type, if it has one.
    pub fn decoding(&self) -> Option<Decoding> {
        self.default.map(|(decoding, _)| decoding)
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("name", &self.name)
            .field("decoding", &self.decoding())
            .finish()
    }
}

/// A custom decoder function, registered under a name by a record type.
///
/// The function receives the destination field and the raw column bytes.
#[derive(Clone)]
pub struct Method {
    field_type: TypeId,
    field_type_name: &'static str,
    call: CustomFn,
}

impl Method {
    /// Wrap a decoder function for fields of type `T`.
    pub fn new<T, E>(f: fn(&mut T, &[u8]) -> Result<(), E>) -> Self
    where
        T: 'static,
        E: Into<BoxError> + 'static,
    {
        let call: CustomFn =
            Arc::new(move |field: &mut dyn Any, raw: &[u8]| -> Result<(), BoxError> {
                f(downcast::<T>(field)?, raw).map_err(Into::into)
            });

        Self {
            field_type: TypeId::of::<T>(),
            field_type_name: type_name::<T>(),
            call,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("field_type", &self.field_type_name)
            .finish_non_exhaustive()
    }
}

/// A bound decode routine for one field.
#[derive(Clone)]
pub enum Routine {
    /// The default routine for the field's static type.
    Default(Decoding, DecodeFn),
    /// A named custom decoder.
    Custom(String, CustomFn),
}

impl Routine {
    /// Decode raw bytes into a field.
    pub fn call(&self, field: &mut dyn Any, raw: &[u8]) -> Result<(), BoxError> {
        match self {
            Routine::Default(_, f) => f(field, raw),
            Routine::Custom(_, f) => f(field, raw),
        }
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Routine::Default(decoding, _) => f.debug_tuple("Default").field(decoding).finish(),
            Routine::Custom(name, _) => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}

/// Produce the decode routine for a field.
///
/// Fields without a custom decoder name use the default routine of their type,
/// which must have one. Otherwise the name is looked up among the decoder
/// methods of the type declaring the field, and the method must write the
/// field's type.
pub fn bind(field: &FieldMetadata) -> Result<Routine, BindError> {
    let Some(name) = &field.decoder else {
        let Some((decoding, default)) = field.ty.default else {
            Err(BindError::NoDefault(field.ty.name))?
        };
        return Ok(Routine::Default(decoding, default));
    };

    let Some(method) = (field.methods)(name) else {
        Err(BindError::MissingMethod(name.clone()))?
    };

    if method.field_type != field.ty.id {
        Err(BindError::Signature {
            name: name.clone(),
            expected: field.ty.name,
            found: method.field_type_name,
        })?;
    }

    Ok(Routine::Custom(name.clone(), method.call))
}

/// The destination of a routine does not hold the expected type.
#[derive(Debug, Error)]
#[error("Field does not hold a `{0}`.")]
struct FieldTypeMismatch(&'static str);

fn downcast<T: 'static>(field: &mut dyn Any) -> Result<&mut T, FieldTypeMismatch> {
    field
        .downcast_mut::<T>()
        .ok_or(FieldTypeMismatch(type_name::<T>()))
}

/// Decode text as a JSON string, so that any characters it contains are taken
/// literally.
pub fn quoted<T: DeserializeOwned + 'static>(
    field: &mut dyn Any,
    raw: &[u8],
) -> Result<(), BoxError> {
    let text = std::str::from_utf8(raw)?;
    let quoted = serde_json::to_string(text)?;
    *downcast::<T>(field)? = serde_json::from_str(&quoted)?;
    Ok(())
}

/// Decode bytes as a literal JSON token, such as a number or boolean.
pub fn unquoted<T: DeserializeOwned + 'static>(
    field: &mut dyn Any,
    raw: &[u8],
) -> Result<(), BoxError> {
    *downcast::<T>(field)? = serde_json::from_slice(raw)?;
    Ok(())
}

/// Parse text with the field type's [`FromStr`] implementation.
pub fn parsed<T>(field: &mut dyn Any, raw: &[u8]) -> Result<(), BoxError>
where
    T: FromStr + 'static,
    T::Err: Into<BoxError>,
{
    let text = std::str::from_utf8(raw)?;
    *downcast::<T>(field)? = text.parse::<T>().map_err(Into::<BoxError>::into)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode<T: Default + 'static>(f: DecodeFn, raw: &[u8]) -> Result<T, BoxError> {
        let mut value = T::default();
        f(&mut value, raw)?;
        Ok(value)
    }

    #[test]
    fn quoted_text_keeps_special_characters() {
        let raw = br#"say "hi", \o/"#;
        let value: String = decode(quoted::<String>, raw).unwrap();
        assert_eq!(value, r#"say "hi", \o/"#);
    }

    #[test]
    fn unquoted_tokens_decode_as_json() {
        assert_eq!(decode::<i64>(unquoted::<i64>, b" 12").unwrap(), 12);
        assert!(decode::<bool>(unquoted::<bool>, b"true").unwrap());
        assert_eq!(decode::<Vec<u8>>(unquoted::<Vec<u8>>, b"[1,2]").unwrap(), [1, 2]);
        assert!(decode::<i64>(unquoted::<i64>, b"three").is_err());
    }

    #[test]
    fn parsed_text_uses_from_str() {
        assert_eq!(decode::<u16>(parsed::<u16>, b"42").unwrap(), 42);
        assert!(decode::<u16>(parsed::<u16>, b" 42").is_err());
    }

    #[test]
    fn mismatched_destination_is_an_error() {
        let mut value = 0u8;
        assert!(quoted::<String>(&mut value, b"x").is_err());
    }

    #[test]
    fn method_writes_through_field() {
        fn length(v: &mut usize, raw: &[u8]) -> Result<(), BoxError> {
            *v = raw.len();
            Ok(())
        }

        let method = Method::new(length);
        let mut value = 0usize;
        (method.call)(&mut value, &b"four"[..]).unwrap();
        assert_eq!(value, 4);
    }
}
