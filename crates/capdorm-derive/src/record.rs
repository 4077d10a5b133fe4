//! `#[derive(Record)]` implementation.
//!
//! # Example input
//!
//! ```rust,ignore
//! #[derive(Default, Record)]
//! pub struct Post {
//!     #[record(embed)]
//!     pub meta: Metadata,
//!     #[record(primary_key)]
//!     pub id: i64,
//!     #[record(read_by(User, id))]
//!     pub author_id: i64,
//!     cache: Vec<u8>,
//! }
//! ```
//!
//! # Generated output (simplified)
//!
//! ```rust,ignore
//! impl ::capdorm::Record for Post {
//!     const NAME: &'static str = "Post";
//!
//!     fn shape() -> Vec<FieldShape> {
//!         vec![
//!             FieldShape::embedded::<Metadata>("meta"),
//!             FieldShape::primary_key("id"),
//!             FieldShape::column("author_id").read_by::<User>("id"),
//!             FieldShape::private("cache"),
//!         ]
//!     }
//!
//!     fn field_value(&self, path: &[&'static str]) -> Option<Value> {
//!         match path {
//!             ["meta", rest @ ..] => Record::field_value(&self.meta, rest),
//!             ["id"] => Some(FieldValue::to_value(&self.id)),
//!             ["author_id"] => Some(FieldValue::to_value(&self.author_id)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set_field_value(
//!         &mut self,
//!         path: &[&'static str],
//!         value: Value,
//!     ) -> Result<(), FieldError> {
//!         // mirrors field_value
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Ident, Token, Type, Visibility};

pub fn derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// How a single field is mapped, after attribute parsing.
enum Mapping {
    Column {
        primary_key: bool,
        read_by: Option<Reference>,
        write_by: Option<Reference>,
    },
    Embedded,
    Private,
    Skipped,
}

/// `Type, field` inside `read_by(...)` / `write_by(...)`.
struct Reference {
    record: Type,
    field: Ident,
}

impl syn::parse::Parse for Reference {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let record = input.parse()?;
        input.parse::<Token![,]>()?;
        let field = input.parse()?;
        Ok(Self { record, field })
    }
}

/// Options collected from one field's `#[record(...)]` attributes.
#[derive(Default)]
struct FieldOptions {
    primary_key: bool,
    embed: bool,
    skip: bool,
    read_by: Option<Reference>,
    write_by: Option<Reference>,
    first_span: Option<proc_macro2::Span>,
}

impl FieldOptions {
    fn parse(field: &Field) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("record")) {
            options.first_span.get_or_insert(attr.span());
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    options.primary_key = true;
                } else if meta.path.is_ident("embed") {
                    options.embed = true;
                } else if meta.path.is_ident("skip") {
                    options.skip = true;
                } else if meta.path.is_ident("read_by") {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    if options.read_by.replace(content.parse()?).is_some() {
                        return Err(meta.error("duplicate `read_by`"));
                    }
                } else if meta.path.is_ident("write_by") {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    if options.write_by.replace(content.parse()?).is_some() {
                        return Err(meta.error("duplicate `write_by`"));
                    }
                } else {
                    return Err(meta.error(
                        "expected one of `primary_key`, `embed`, `skip`, `read_by`, `write_by`",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(options)
    }

    fn is_empty(&self) -> bool {
        self.first_span.is_none()
    }

    fn into_mapping(self, field: &Field) -> syn::Result<Mapping> {
        if !matches!(field.vis, Visibility::Public(_)) {
            if let Some(span) = self.first_span {
                return Err(syn::Error::new(
                    span,
                    "#[record] has no effect on a non-pub field; non-pub fields are never mapped",
                ));
            }
            return Ok(Mapping::Private);
        }

        let annotated = self.primary_key || self.read_by.is_some() || self.write_by.is_some();
        if self.skip {
            if self.embed || annotated {
                return Err(syn::Error::new_spanned(
                    field,
                    "`skip` cannot be combined with other record options",
                ));
            }
            return Ok(Mapping::Skipped);
        }
        if self.embed {
            if annotated {
                return Err(syn::Error::new_spanned(
                    field,
                    "an embedded record cannot be a primary key or carry `read_by`/`write_by`",
                ));
            }
            return Ok(Mapping::Embedded);
        }

        Ok(Mapping::Column {
            primary_key: self.primary_key,
            read_by: self.read_by,
            write_by: self.write_by,
        })
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[derive(Record)] does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "#[derive(Record)] requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Record)] can only be used on structs",
            ));
        }
    };

    let mut shape = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();
    let mut assertions = Vec::new();

    let mut primary_key: Option<&Ident> = None;
    let mut read_by: Option<&Ident> = None;
    let mut write_by: Option<&Ident> = None;

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = ident.unraw().to_string();
        let ty = &field.ty;

        let options = FieldOptions::parse(field)?;
        let mapping = if options.is_empty() && !matches!(field.vis, Visibility::Public(_)) {
            Mapping::Private
        } else {
            options.into_mapping(field)?
        };

        match mapping {
            Mapping::Column {
                primary_key: is_primary_key,
                read_by: field_read_by,
                write_by: field_write_by,
            } => {
                if is_primary_key {
                    claim(&mut primary_key, ident, "primary_key")?;
                }

                let mut entry = if is_primary_key {
                    quote! { ::capdorm::FieldShape::primary_key(#name) }
                } else {
                    quote! { ::capdorm::FieldShape::column(#name) }
                };
                if let Some(reference) = &field_read_by {
                    claim(&mut read_by, ident, "read_by")?;
                    let (record, target) = reference_tokens(reference);
                    entry = quote! { #entry.read_by::<#record>(#target) };
                    assertions.push(assert_record(record));
                }
                if let Some(reference) = &field_write_by {
                    claim(&mut write_by, ident, "write_by")?;
                    let (record, target) = reference_tokens(reference);
                    entry = quote! { #entry.write_by::<#record>(#target) };
                    assertions.push(assert_record(record));
                }
                shape.push(entry);

                getters.push(quote! {
                    [#name] => ::std::option::Option::Some(
                        ::capdorm::FieldValue::to_value(&self.#ident)
                    ),
                });
                setters.push(quote! {
                    [#name] => {
                        self.#ident = ::capdorm::FieldValue::from_value(value)?;
                        ::std::result::Result::Ok(())
                    }
                });
                assertions.push(quote_spanned! {ty.span()=>
                    __assert_field_value::<#ty>();
                });
            }
            Mapping::Embedded => {
                shape.push(quote! { ::capdorm::FieldShape::embedded::<#ty>(#name) });
                getters.push(quote! {
                    [#name, rest @ ..] => ::capdorm::Record::field_value(&self.#ident, rest),
                });
                setters.push(quote! {
                    [#name, rest @ ..] => {
                        ::capdorm::Record::set_field_value(&mut self.#ident, rest, value)
                    }
                });
                assertions.push(assert_record(ty));
            }
            Mapping::Private => {
                shape.push(quote! { ::capdorm::FieldShape::private(#name) });
            }
            Mapping::Skipped => {
                shape.push(quote! { ::capdorm::FieldShape::skipped(#name) });
            }
        }
    }

    let record_name = struct_name.unraw().to_string();

    Ok(quote! {
        #[allow(dead_code)]
        const _: () = {
            fn __assert_field_value<T: ::capdorm::FieldValue>() {}
            fn __assert_record<T: ::capdorm::Record>() {}

            fn __assertions() {
                #(#assertions)*
            }

            impl ::capdorm::Record for #struct_name {
                const NAME: &'static str = #record_name;

                fn shape() -> ::std::vec::Vec<::capdorm::FieldShape> {
                    ::std::vec![#(#shape),*]
                }

                #[allow(unused_variables)]
                fn field_value(
                    &self,
                    path: &[&'static str],
                ) -> ::std::option::Option<::capdorm::Value> {
                    match path {
                        #(#getters)*
                        _ => ::std::option::Option::None,
                    }
                }

                #[allow(unused_variables)]
                fn set_field_value(
                    &mut self,
                    path: &[&'static str],
                    value: ::capdorm::Value,
                ) -> ::std::result::Result<(), ::capdorm::FieldError> {
                    match path {
                        #(#setters)*
                        _ => ::std::result::Result::Err(::capdorm::FieldError::UnknownField),
                    }
                }
            }
        };
    })
}

/// Record the field carrying a once-per-struct option, rejecting a second one.
fn claim<'a>(slot: &mut Option<&'a Ident>, ident: &'a Ident, option: &str) -> syn::Result<()> {
    if let Some(previous) = slot.replace(ident) {
        return Err(syn::Error::new_spanned(
            ident,
            format!("`{option}` is already declared on field `{previous}`"),
        ));
    }
    Ok(())
}

fn reference_tokens(reference: &Reference) -> (&Type, String) {
    (&reference.record, reference.field.unraw().to_string())
}

fn assert_record(ty: &Type) -> TokenStream2 {
    quote_spanned! {ty.span()=>
        __assert_record::<#ty>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expanded(input: DeriveInput) -> String {
        expand(&input)
            .unwrap()
            .to_string()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    fn error_of(input: DeriveInput) -> String {
        match expand(&input) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_expands_plain_struct() {
        let input: DeriveInput = parse_quote! {
            pub struct UserComment {
                #[record(primary_key)]
                pub id: i64,
                #[record(read_by(User, id))]
                pub user_id: i64,
                pub body: String,
                draft: bool,
            }
        };

        let tokens = expanded(input);
        assert!(tokens.contains("constNAME:&'staticstr=\"UserComment\""));
        assert!(tokens.contains("FieldShape::primary_key(\"id\")"));
        assert!(tokens.contains("FieldShape::column(\"user_id\").read_by::<User>(\"id\")"));
        assert!(tokens.contains("FieldShape::private(\"draft\")"));
        assert!(!tokens.contains("[\"draft\"]"));
    }

    #[test]
    fn test_expands_embedded_and_skipped() {
        let input: DeriveInput = parse_quote! {
            pub struct Post {
                #[record(embed)]
                pub meta: Metadata,
                #[record(skip)]
                pub cached: Vec<String>,
            }
        };

        let tokens = expanded(input);
        assert!(tokens.contains("FieldShape::embedded::<Metadata>(\"meta\")"));
        assert!(tokens.contains("FieldShape::skipped(\"cached\")"));
        assert!(tokens.contains("[\"meta\",rest@..]"));
        assert!(!tokens.contains("[\"cached\"]"));
    }

    #[test]
    fn test_raw_identifiers_are_unraw() {
        let input: DeriveInput = parse_quote! {
            pub struct Entry {
                pub r#type: String,
            }
        };

        let tokens = expanded(input);
        assert!(tokens.contains("FieldShape::column(\"type\")"));
    }

    #[test]
    fn test_rejects_enums_and_tuple_structs() {
        let err = error_of(parse_quote! { pub enum Kind { A, B } });
        assert!(err.contains("can only be used on structs"));

        let err = error_of(parse_quote! { pub struct Pair(pub i64, pub i64); });
        assert!(err.contains("named fields"));
    }

    #[test]
    fn test_rejects_generics() {
        let err = error_of(parse_quote! {
            pub struct Wrapper<T> { pub inner: T }
        });
        assert!(err.contains("generic"));
    }

    #[test]
    fn test_rejects_second_read_by() {
        let err = error_of(parse_quote! {
            pub struct Reply {
                #[record(read_by(User, id))]
                pub author_id: i64,
                #[record(read_by(Thread, id))]
                pub thread_id: i64,
            }
        });
        assert!(err.contains("`read_by` is already declared on field `author_id`"));
    }

    #[test]
    fn test_rejects_second_primary_key() {
        let err = error_of(parse_quote! {
            pub struct Pair {
                #[record(primary_key)]
                pub a: i64,
                #[record(primary_key)]
                pub b: i64,
            }
        });
        assert!(err.contains("`primary_key` is already declared"));
    }

    #[test]
    fn test_rejects_attribute_on_private_field() {
        let err = error_of(parse_quote! {
            pub struct Hidden {
                #[record(primary_key)]
                id: i64,
            }
        });
        assert!(err.contains("non-pub field"));
    }

    #[test]
    fn test_rejects_conflicting_options() {
        let err = error_of(parse_quote! {
            pub struct Post {
                #[record(embed, primary_key)]
                pub meta: Metadata,
            }
        });
        assert!(err.contains("embedded record"));

        let err = error_of(parse_quote! {
            pub struct Post {
                #[record(skip, read_by(User, id))]
                pub owner: i64,
            }
        });
        assert!(err.contains("`skip` cannot be combined"));
    }

    #[test]
    fn test_rejects_unknown_option() {
        let err = error_of(parse_quote! {
            pub struct Post {
                #[record(index)]
                pub title: String,
            }
        });
        assert!(err.contains("expected one of"));
    }
}
