use std::collections::HashMap;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Attribute macro that derives everything a record type needs.
///
/// This is syntax sugar that expands to:
/// ```ignore
/// #[derive(Debug, Default, Record)]
/// ```
///
/// # Example
///
/// ```ignore
/// use chelate_core::record_struct;
///
/// #[record_struct]
/// struct MyStruct {
///     name: String,
///     count: u32,
/// }
/// ```
#[proc_macro_attribute]
pub fn record_struct(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let output = quote! {
        #[derive(
            ::std::fmt::Debug,
            ::std::default::Default,
            ::chelate_core::Record
        )]
        #input
    };

    output.into()
}

/// Derive macro for the `Record` trait.
///
/// Generates `fields()`, one descriptor per named field in declaration order.
/// Only structs with named fields can be records.
///
/// # Example
///
/// ```ignore
/// use chelate_core::Record;
///
/// #[derive(Default, Record)]
/// struct MyStruct {
///     name: String,
///     count: u32,
/// }
/// ```
///
/// # Attributes
///
/// - `#[record(skip)]` - Leave this field out: never encoded, untouched by decode
/// - `#[record(rename = "name")]` - Use another source name for the document key
///
/// Two fields whose names lower-case to the same key are rejected here.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_record_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_record_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let where_clause = build_where_clause(generics, where_clause);

    let fields = named_fields(input)?;
    let descriptors = generate_descriptors(fields)?;

    Ok(quote! {
        impl #impl_generics ::chelate_core::Record for #name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::chelate_core::Field<Self>> {
                ::std::vec![#(#descriptors),*]
            }
        }
    })
}

fn named_fields(
    input: &DeriveInput,
) -> syn::Result<&syn::punctuated::Punctuated<syn::Field, syn::token::Comma>> {
    match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => Ok(&named.named),
            syn::Fields::Unnamed(_) => Err(syn::Error::new_spanned(
                input,
                "Record cannot be derived for tuple structs",
            )),
            syn::Fields::Unit => Err(syn::Error::new_spanned(
                input,
                "Record cannot be derived for unit structs",
            )),
        },
        syn::Data::Enum(_) => Err(syn::Error::new_spanned(
            input,
            "Record cannot be derived for enums",
        )),
        syn::Data::Union(_) => Err(syn::Error::new_spanned(
            input,
            "Record cannot be derived for unions",
        )),
    }
}

fn generate_descriptors<'a>(
    fields: impl IntoIterator<Item = &'a syn::Field>,
) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut descriptors = Vec::new();

    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        let source = get_field_name(ident, &attrs);
        let key = source.to_lowercase();
        if let Some(previous) = seen.insert(key.clone(), source.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("field `{source}` and field `{previous}` both map to document key `{key}`"),
            ));
        }

        let ty = &field.ty;
        descriptors.push(quote! {
            ::chelate_core::Field::new::<#ty>(
                #source,
                |r: &Self| &r.#ident,
                |r: &mut Self| &mut r.#ident,
            )
        });
    }

    Ok(descriptors)
}

fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
) -> proc_macro2::TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let record_bounds = type_params.iter().map(|p| {
        quote! { #p: 'static + ::std::marker::Send + ::std::marker::Sync }
    });

    let existing_predicates = existing
        .map(|w| {
            let predicates = &w.predicates;
            quote! { #predicates, }
        })
        .unwrap_or_default();

    quote! {
        where
            #existing_predicates
            #(#record_bounds),*
    }
}

/// Source name of a field: the rename if given, else the identifier without
/// any `r#` prefix.
fn get_field_name(ident: &syn::Ident, attrs: &FieldAttrs) -> String {
    match &attrs.rename {
        Some(rename) => rename.clone(),
        None => {
            let name = ident.to_string();
            name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
        }
    }
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    rename: Option<String>,
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `rename = \"...\"`"))
            }
        })?;
    }

    Ok(result)
}
