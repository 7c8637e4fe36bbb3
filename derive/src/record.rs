use std::collections::BTreeMap;

use proc_macro::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Result, Token, Type,
    ext::IdentExt,
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
};

use crate::case::RenameRule;

pub(crate) fn expand_record(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        Err(Error::new(
            input.span(),
            "`Record` may only be derived on structs.",
        ))?
    };

    let Fields::Named(fields) = &data.fields else {
        Err(Error::new(
            input.span(),
            "`Record` may only be derived on structs with named fields.",
        ))?
    };

    let mut container_attrs = input.attrs.iter().filter(|a| a.path().is_ident("csv"));

    let container = match container_attrs.next() {
        Some(attr) => attr.parse_args::<ContainerAttribute>()?,
        None => ContainerAttribute::default(),
    };

    if let Some(attr) = container_attrs.next() {
        Err(Error::new_spanned(
            attr,
            "A struct may only have one `csv` attribute.",
        ))?
    }

    let fields = fields
        .named
        .iter()
        .map(|field| FieldMetadata::parse(field, container.rename_all))
        .map(Result::transpose)
        .flatten() // Skip fields marked `skip`.
        .collect::<Result<Vec<_>>>()?;

    let mut decoders: BTreeMap<String, (Ident, Type)> = BTreeMap::new();

    for field in &fields {
        let Some((method, lit)) = &field.decoder else {
            continue;
        };

        if let Some((_, existing)) = decoders.get(&method.to_string()) {
            if existing.to_token_stream().to_string() != field.ty.to_token_stream().to_string() {
                Err(Error::new_spanned(
                    lit,
                    format!("Decoder `{method}` is bound to fields of different types."),
                ))?
            }
            continue;
        }

        decoders.insert(method.to_string(), (method.clone(), field.ty.clone()));
    }

    let descriptors = fields.iter().map(|field| {
        let ty = &field.ty;
        let name = &field.declared;
        let tag = &field.tag;

        match field.mode {
            Mode::Flatten => quote! {
                ::rowbind::sans::field::FieldDescriptor::flatten::<#ty>(#name)
            },
            Mode::Quoted => quote! {
                ::rowbind::sans::field::FieldDescriptor::quoted::<#ty>(#name, #tag)
            },
            Mode::Unquoted => quote! {
                ::rowbind::sans::field::FieldDescriptor::unquoted::<#ty>(#name, #tag)
            },
            Mode::Parsed => quote! {
                ::rowbind::sans::field::FieldDescriptor::parsed::<#ty>(#name, #tag)
            },
            Mode::Custom => quote! {
                ::rowbind::sans::field::FieldDescriptor::custom::<#ty>(#name, #tag)
            },
        }
    });

    let locations = fields.iter().enumerate().map(|(i, field)| {
        let ident = &field.ident;

        if field.mode == Mode::Flatten {
            quote! {
                [#i, rest @ ..] => ::rowbind::avec::Record::field_mut(&mut self.#ident, rest),
            }
        } else {
            quote! {
                [#i] => ::core::option::Option::Some(&mut self.#ident as &mut dyn ::core::any::Any),
            }
        }
    });

    let methods = decoders.values().map(|(method, ty)| {
        let name = method.to_string();
        quote! {
            #name => ::core::option::Option::Some(
                ::rowbind::sans::bind::Method::new::<#ty, _>(Self::#method),
            ),
        }
    });

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::rowbind::avec::Record for #name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::rowbind::sans::field::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            fn field_mut(
                &mut self,
                location: &[usize],
            ) -> ::core::option::Option<&mut dyn ::core::any::Any> {
                match location {
                    #(#locations)*
                    _ => ::core::option::Option::None,
                }
            }

            fn decoder(name: &str) -> ::core::option::Option<::rowbind::sans::bind::Method> {
                match name {
                    #(#methods)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    };

    Ok(expanded.into())
}

#[derive(Debug, Default)]
struct ContainerAttribute {
    rename_all: RenameRule,
}

impl Parse for ContainerAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: Ident = input.parse()?;

        if key != "rename_all" {
            Err(Error::new_spanned(
                &key,
                "Unknown container option; expected `rename_all`.",
            ))?
        }

        input.parse::<Token![=]>()?;
        let rename_all = RenameRule::parse(&input.parse()?)?;

        Ok(Self { rename_all })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Quoted,
    Unquoted,
    Parsed,
    Custom,
    Flatten,
}

#[derive(Debug)]
struct FieldMetadata {
    ident: Ident,
    declared: String,
    ty: Type,
    tag: String,
    mode: Mode,
    decoder: Option<(Ident, LitStr)>,
}

impl FieldMetadata {
    fn parse(field: &Field, rename_all: RenameRule) -> Result<Option<Self>> {
        let Some(ident) = field.ident.clone() else {
            Err(Error::new_spanned(field, "Field must be named."))?
        };

        let attribute = FieldAttribute::parse(&field.attrs)?;

        if attribute.skip {
            return Ok(None);
        }

        let declared = ident.unraw().to_string();

        let mut mode = if attribute.flatten {
            if let Some(tag) = &attribute.tag {
                Err(Error::new_spanned(
                    tag,
                    "A flattened field takes its columns from the nested record, and cannot have a tag.",
                ))?
            }
            if attribute.text || attribute.from_str {
                Err(Error::new(
                    field.span(),
                    "A flattened field cannot be marked `text` or `from_str`.",
                ))?
            }
            Mode::Flatten
        } else if attribute.text && attribute.from_str {
            Err(Error::new(
                field.span(),
                "A field cannot be marked both `text` and `from_str`.",
            ))?
        } else if attribute.from_str {
            Mode::Parsed
        } else if attribute.text || is_textual(&field.ty) {
            Mode::Quoted
        } else {
            Mode::Unquoted
        };

        let tag_value = attribute.tag.as_ref().map(LitStr::value).unwrap_or_default();
        let mut components = tag_value.splitn(2, ',');
        let column = components.next().unwrap_or_default().trim();
        let rest = components.next();

        let tag = match (column.is_empty(), rename_all) {
            (true, RenameRule::None) | (false, _) => tag_value.clone(),
            (true, rule) => match rest {
                Some(rest) => format!("{},{rest}", rule.apply(&declared)),
                None => rule.apply(&declared),
            },
        };

        let decoder = match (rest, &attribute.tag) {
            (Some(rest), Some(lit)) => {
                let name = rest.split(',').next().unwrap_or_default().trim();
                if name.is_empty() {
                    None
                } else {
                    let Ok(method) = syn::parse_str::<Ident>(name) else {
                        Err(Error::new_spanned(
                            lit,
                            format!("Decoder `{name}` must be the name of an associated function."),
                        ))?
                    };
                    Some((method, lit.clone()))
                }
            }
            _ => None,
        };

        if decoder.is_some() && !attribute.text && !attribute.from_str {
            mode = Mode::Custom;
        }

        Ok(Some(Self {
            ident,
            declared,
            ty: field.ty.clone(),
            tag,
            mode,
            decoder,
        }))
    }
}

#[derive(Debug, Default)]
struct FieldAttribute {
    tag: Option<LitStr>,
    text: bool,
    from_str: bool,
    flatten: bool,
    skip: bool,
}

enum FieldOption {
    Tag(LitStr),
    Flag(Ident),
}

impl Parse for FieldOption {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.peek(LitStr) {
            Ok(Self::Tag(input.parse()?))
        } else {
            Ok(Self::Flag(input.parse()?))
        }
    }
}

impl FieldAttribute {
    /// Merge the options of every `csv` attribute on a field.
    fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut attribute = Self::default();

        for attr in attrs.iter().filter(|a| a.path().is_ident("csv")) {
            let options =
                attr.parse_args_with(Punctuated::<FieldOption, Token![,]>::parse_terminated)?;

            for option in options {
                attribute.apply(option)?;
            }
        }

        Ok(attribute)
    }

    fn apply(&mut self, option: FieldOption) -> Result<()> {
        match option {
            FieldOption::Tag(lit) => {
                if self.tag.replace(lit.clone()).is_some() {
                    Err(Error::new_spanned(lit, "A field may only have one tag."))?
                }
            }
            FieldOption::Flag(flag) => {
                let slot = match flag.to_string().as_str() {
                    "text" => &mut self.text,
                    "from_str" => &mut self.from_str,
                    "flatten" => &mut self.flatten,
                    "skip" => &mut self.skip,
                    _ => Err(Error::new_spanned(
                        &flag,
                        "Field option must be a tag string, `text`, `from_str`, `flatten`, or `skip`.",
                    ))?,
                };

                if *slot {
                    Err(Error::new_spanned(
                        &flag,
                        format!("Field option `{flag}` is repeated."),
                    ))?
                }
                *slot = true;
            }
        }

        Ok(())
    }
}

/// Whether values of a type are written as text, and so must be quoted before
/// JSON decoding.
fn is_textual(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };

    let Some(segment) = path.path.segments.last() else {
        return false;
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" | "char" | "PathBuf" | "Cow" => true,
        "Option" | "Box" => {
            let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
                return false;
            };

            arguments.args.iter().any(|argument| match argument {
                GenericArgument::Type(inner) => is_textual(inner),
                _ => false,
            })
        }
        _ => false,
    }
}
