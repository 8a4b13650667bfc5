//! Derive macro for oxide-pg record descriptions.
//!
//! This crate provides `#[derive(Record)]`, which implements
//! `oxide_pg::Record` for a struct with named fields: a cached field list
//! for schema reconciliation plus conversion to and from `oxide_pg::Row`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitStr, Meta, Type};

/// Derives `oxide_pg::Record`.
///
/// # Field Attributes
///
/// - `#[field(name = "column")]` - Column name (defaults to the field name);
///   `name = "-"` leaves the field out
/// - `#[field(skip)]` - Leaves the field out; it is read back as
///   `Default::default()`
/// - `#[field(key)]` - Part of the primary key
/// - `#[field(required)]` - Declared `NOT NULL` even when the type is an
///   `Option`
/// - `#[field(db_type = "varchar(32)")]` - Explicit SQL type
/// - `#[field(default = "'n/a'")]` - Explicit default literal
/// - `#[field(flatten)]` - The field is itself a `Record`; its columns are
///   inlined into this one
///
/// Every other field type must implement `ToValue` and `FromValue`.
#[proc_macro_derive(Record, attributes(field))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_record_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_record_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record derive does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record derive only supports structs",
            ));
        }
    };

    let mut infos = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.flatten && attrs.name.is_some() {
            return Err(syn::Error::new_spanned(
                field,
                "`flatten` fields cannot be renamed",
            ));
        }
        infos.push(FieldInfo {
            ident,
            ty: field.ty.clone(),
            attrs,
        });
    }

    let schema_entries = infos.iter().map(schema_entry);
    let to_row_entries = infos.iter().map(to_row_entry);
    let from_row_entries = infos.iter().map(from_row_entry);
    let record_name = struct_name.to_string();

    Ok(quote! {
        impl ::oxide_pg::Record for #struct_name {
            fn schema() -> &'static ::oxide_pg::RecordSchema {
                static SCHEMA: ::std::sync::OnceLock<::oxide_pg::RecordSchema> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    let mut fields: ::std::vec::Vec<::oxide_pg::FieldDescriptor> =
                        ::std::vec::Vec::new();
                    #(#schema_entries)*
                    ::oxide_pg::RecordSchema::new(#record_name, fields)
                })
            }

            fn to_row(&self) -> ::oxide_pg::Row {
                let mut row = ::oxide_pg::Row::new();
                #(#to_row_entries)*
                row
            }

            fn from_row(row: &::oxide_pg::Row) -> ::oxide_pg::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#from_row_entries),*
                })
            }
        }
    })
}

struct FieldInfo {
    ident: Ident,
    ty: Type,
    attrs: FieldAttrs,
}

impl FieldInfo {
    fn is_skipped(&self) -> bool {
        self.attrs.skip || self.attrs.name.as_deref() == Some("-")
    }

    fn column_name(&self) -> String {
        self.attrs
            .name
            .clone()
            .unwrap_or_else(|| self.ident.to_string())
    }
}

#[derive(Default)]
struct FieldAttrs {
    name: Option<String>,
    skip: bool,
    key: bool,
    required: bool,
    flatten: bool,
    db_type: Option<String>,
    default: Option<String>,
}

fn schema_entry(info: &FieldInfo) -> TokenStream2 {
    if info.is_skipped() {
        return TokenStream2::new();
    }
    let ty = &info.ty;
    if info.attrs.flatten {
        return quote! {
            fields.extend(
                <#ty as ::oxide_pg::Record>::schema().fields().iter().cloned()
            );
        };
    }

    let field_name = info.ident.to_string();
    let rust_type = quote!(#ty).to_string().replace(' ', "");
    let alias = info.attrs.name.as_ref().map(|name| quote! { .alias(#name) });
    let key = info.attrs.key.then(|| quote! { .key() });
    let required = info.attrs.required.then(|| quote! { .required() });
    let db_type = info.attrs.db_type.as_ref().map(|t| quote! { .db_type(#t) });
    let default = info
        .attrs
        .default
        .as_ref()
        .map(|d| quote! { .default_literal(#d) });

    quote! {
        fields.push(
            ::oxide_pg::FieldDescriptor::new(#field_name, #rust_type)
                #alias #key #required #db_type #default
        );
    }
}

fn to_row_entry(info: &FieldInfo) -> TokenStream2 {
    if info.is_skipped() {
        return TokenStream2::new();
    }
    let ident = &info.ident;
    if info.attrs.flatten {
        return quote! {
            row.extend(::oxide_pg::Record::to_row(&self.#ident));
        };
    }
    let column = info.column_name();
    quote! {
        row.insert(#column, ::oxide_pg::ToValue::to_value(&self.#ident));
    }
}

fn from_row_entry(info: &FieldInfo) -> TokenStream2 {
    let ident = &info.ident;
    let ty = &info.ty;
    if info.is_skipped() {
        return quote! { #ident: ::std::default::Default::default() };
    }
    if info.attrs.flatten {
        return quote! { #ident: <#ty as ::oxide_pg::Record>::from_row(row)? };
    }
    let column = info.column_name();
    quote! { #ident: row.get_as::<#ty>(#column)? }
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("field") {
            continue;
        }
        // Handle empty attribute like #[field]
        if matches!(attr.meta, Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("key") {
                result.key = true;
            } else if meta.path.is_ident("required") {
                result.required = true;
            } else if meta.path.is_ident("flatten") {
                result.flatten = true;
            } else if meta.path.is_ident("name") {
                result.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("db_type") {
                result.db_type = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                result.default = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unknown field attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}
