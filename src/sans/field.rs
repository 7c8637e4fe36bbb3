//! Field descriptors, tags, and metadata extraction.

use std::{any::type_name, fmt, str::FromStr};

use serde::de::DeserializeOwned;

use crate::{BoxError, avec::Record};

use super::bind::{FieldType, Method};

/// A field declared by a record type, as reported by [`Record::fields`].
///
/// The position of a descriptor in the list is the field's index in
/// [`Record::field_mut`] locations.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The declared name of the field.
    pub name: &'static str,
    /// The field's tag, in the form `column,decoder,encoder,requiredness`.
    pub tag: &'static str,
    /// Whether the field holds a value or a nested record.
    pub kind: FieldKind,
}

/// The contents of a declared field.
#[derive(Clone)]
pub enum FieldKind {
    /// A value decoded from one column.
    Value(FieldType),
    /// A nested record whose fields are decoded as if declared in place.
    Flatten {
        fields: fn() -> Vec<FieldDescriptor>,
        methods: fn(&str) -> Option<Method>,
        owner: &'static str,
    },
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Value(ty) => f.debug_tuple("Value").field(ty).finish(),
            FieldKind::Flatten { owner, .. } => f.debug_tuple("Flatten").field(owner).finish(),
        }
    }
}

impl FieldDescriptor {
    /// A textual field, decoded from quoted text.
    pub fn quoted<T: DeserializeOwned + 'static>(name: &'static str, tag: &'static str) -> Self {
        Self::value(name, tag, FieldType::quoted::<T>())
    }

    /// A field decoded from a literal token.
    pub fn unquoted<T: DeserializeOwned + 'static>(name: &'static str, tag: &'static str) -> Self {
        Self::value(name, tag, FieldType::unquoted::<T>())
    }

    /// A field parsed from text with [`FromStr`].
    pub fn parsed<T>(name: &'static str, tag: &'static str) -> Self
    where
        T: FromStr + 'static,
        T::Err: Into<BoxError>,
    {
        Self::value(name, tag, FieldType::parsed::<T>())
    }

    /// A field without a default routine, decoded by the custom decoder its
    /// tag names.
    pub fn custom<T: 'static>(name: &'static str, tag: &'static str) -> Self {
        Self::value(name, tag, FieldType::custom::<T>())
    }

    /// A nested record, flattened into the enclosing one.
    pub fn flatten<T: Record>(name: &'static str) -> Self {
        Self {
            name,
            tag: "",
            kind: FieldKind::Flatten {
                fields: T::fields,
                methods: T::decoder,
                owner: type_name::<T>(),
            },
        }
    }

    fn value(name: &'static str, tag: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            tag,
            kind: FieldKind::Value(ty),
        }
    }
}

/// The components of a field tag.
///
/// Components are separated by commas and trimmed of surrounding whitespace. A
/// blank or omitted component takes its default. Only the literal `required`
/// in the fourth component marks a field as required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tags<'a> {
    /// The header column, in place of the field's declared name.
    pub column: Option<&'a str>,
    /// The name of a custom decoder method.
    pub decoder: Option<&'a str>,
    /// The name of a custom encoder method.
    pub encoder: Option<&'a str>,
    /// Whether a missing column is an error.
    pub required: bool,
}

impl<'a> Tags<'a> {
    /// Parse a field tag.
    pub fn parse(tag: &'a str) -> Self {
        let parts: Vec<&str> = tag.split(',').collect();

        let component = |i: usize| {
            parts
                .get(i)
                .map(|part| part.trim())
                .filter(|part| !part.is_empty())
        };

        Self {
            column: component(0),
            decoder: component(1),
            encoder: component(2),
            required: component(3) == Some("required"),
        }
    }
}

/// A path of field indices from a record to one of its (possibly nested)
/// fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location(pub Vec<usize>);

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut indices = self.0.iter();
        if let Some(first) = indices.next() {
            write!(f, "{first}")?;
        }
        for index in indices {
            write!(f, ".{index}")?;
        }
        Ok(())
    }
}

/// Decoding metadata of a single field.
#[derive(Debug, Clone)]
pub struct FieldMetadata {
    /// Where the field lives within the record.
    pub location: Location,
    /// The dotted path of declared names leading to the field.
    pub path: String,
    /// The header column the field is read from.
    pub column: String,
    /// The name of a custom decoder method, if any.
    pub decoder: Option<String>,
    /// The name of a custom encoder method, if any. Retained but unused.
    pub encoder: Option<String>,
    /// Whether a missing column is an error.
    pub required: bool,
    /// The field's type and default routine.
    pub ty: FieldType,
    /// Decoder methods of the type declaring the field.
    pub methods: fn(&str) -> Option<Method>,
}

/// Extract the metadata of every field of a record type, in declaration order.
///
/// Fields of flattened records are included in place of the field holding
/// them.
pub fn extract<R: Record>() -> Vec<FieldMetadata> {
    let mut fields = Vec::new();
    collect(&mut fields, R::fields(), R::decoder, &[], "");
    fields
}

fn collect(
    o: &mut Vec<FieldMetadata>,
    descriptors: Vec<FieldDescriptor>,
    methods: fn(&str) -> Option<Method>,
    location: &[usize],
    path: &str,
) {
    for (i, descriptor) in descriptors.into_iter().enumerate() {
        let mut location = location.to_vec();
        location.push(i);
        let path = if path.is_empty() {
            descriptor.name.to_string()
        } else {
            format!("{path}.{}", descriptor.name)
        };

        match descriptor.kind {
            FieldKind::Value(ty) => {
                let tags = Tags::parse(descriptor.tag);

                o.push(FieldMetadata {
                    location: Location(location),
                    path,
                    column: tags.column.unwrap_or(descriptor.name).to_string(),
                    decoder: tags.decoder.map(str::to_string),
                    encoder: tags.encoder.map(str::to_string),
                    required: tags.required,
                    ty,
                    methods,
                });
            }
            FieldKind::Flatten {
                fields, methods, ..
            } => collect(o, fields(), methods, &location, &path),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", Tags::default())]
    #[case("MyName", Tags { column: Some("MyName"), ..Default::default() })]
    #[case(
        "MyName,MyUnmarshal,MyMarshal",
        Tags {
            column: Some("MyName"),
            decoder: Some("MyUnmarshal"),
            encoder: Some("MyMarshal"),
            required: false,
        },
    )]
    #[case(
        "MyName,MyUnmarshal,MyMarshal,required",
        Tags {
            column: Some("MyName"),
            decoder: Some("MyUnmarshal"),
            encoder: Some("MyMarshal"),
            required: true,
        },
    )]
    #[case(",,,required", Tags { required: true, ..Default::default() })]
    #[case(" Name , decode_name ", Tags { column: Some("Name"), decoder: Some("decode_name"), ..Default::default() })]
    #[case("Name,,,optional", Tags { column: Some("Name"), ..Default::default() })]
    #[case("Name,,,Required", Tags { column: Some("Name"), ..Default::default() })]
    #[case(" ,x", Tags { decoder: Some("x"), ..Default::default() })]
    fn parse_tags(#[case] tag: &str, #[case] expected: Tags) {
        assert_eq!(Tags::parse(tag), expected);
    }

    #[test]
    fn location_displays_dotted() {
        assert_eq!(Location(vec![2, 0, 1]).to_string(), "2.0.1");
        assert_eq!(Location(vec![]).to_string(), "");
    }
}
