//! Derive macro for persisted entities.
//!
//! This crate provides the `#[derive(Entity)]` macro, which generates the
//! entity descriptor and positional field accessors used by
//! `oxide-persist-core` to build statements and scan rows.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, Lit,
    Meta, PathArguments, Type,
};

/// Derives the `Entity` trait for a struct with named fields.
///
/// Only fields carrying a `#[column]` attribute are mapped to columns; the
/// other fields keep their position in the descriptor but are never read or
/// written. The struct must also implement `Default`.
///
/// # Field Attributes
///
/// - `#[column]` - Maps the field to a column of the same name
/// - `#[column(name = "column_name")]` - Sets the persisted column name
/// - `#[column(json = "externalName")]` - Sets the external (wire) name used
///   by patches and composite keys
/// - `#[column(primary_key)]` - Marks the column as part of the key
/// - `#[column(version)]` - Marks the integer column as the optimistic-lock
///   version counter
/// - `#[column(nullable)]` - Marks the column as nullable (implied by `Option`)
/// - `#[column(ignore)]` - Excludes the field from mapping
/// - `#[column(skip_insert)]` / `#[column(skip_update)]` - Excludes the column
///   from inserts or updates
/// - `#[column(scale = 2)]` - Writes a float with a fixed number of decimals
/// - `#[column(true_value = "Y", false_value = "N")]` - Stores a bool as tokens
#[proc_macro_derive(Entity, attributes(column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_entity_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_entity_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity derive only supports structs",
            ));
        }
    };

    let mut infos = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "field must be named"));
        };
        let attrs = parse_column_attrs(&field.attrs)?;
        if attrs.true_value.is_some() != attrs.false_value.is_some() {
            return Err(syn::Error::new_spanned(
                field,
                "true_value and false_value must be given together",
            ));
        }
        let (kind, optional) = infer_kind(&field.ty);
        infos.push(FieldInfo {
            ident,
            kind,
            optional,
            attrs,
        });
    }

    let core = quote!(::oxide_persist_core);

    let descriptors: Vec<TokenStream2> = infos
        .iter()
        .map(|info| field_descriptor(info, &core))
        .collect();

    let mapped: Vec<(usize, &FieldInfo)> = infos
        .iter()
        .enumerate()
        .filter(|(_, info)| info.attrs.mapped && !info.attrs.ignore)
        .collect();

    let getters = mapped.iter().map(|(index, info)| {
        let ident = &info.ident;
        quote! {
            #index => #core::ToSqlValue::to_sql_value(::core::clone::Clone::clone(&self.#ident)),
        }
    });
    let setters = mapped.iter().map(|(index, info)| {
        let ident = &info.ident;
        quote! {
            #index => self.#ident = #core::FromSqlValue::from_sql_value(value)?,
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #core::Entity for #struct_name #ty_generics #where_clause {
            fn descriptor() -> #core::EntityDescriptor {
                #core::EntityDescriptor::record(#type_name, ::std::vec![#(#descriptors),*])
            }

            #[allow(clippy::match_single_binding)]
            fn field_value(&self, field: usize) -> #core::SqlValue {
                match field {
                    #(#getters)*
                    _ => #core::SqlValue::Null,
                }
            }

            #[allow(clippy::match_single_binding, unreachable_code, unused_variables)]
            fn set_field_value(
                &mut self,
                field: usize,
                value: #core::SqlValue,
            ) -> ::core::result::Result<(), #core::ValueError> {
                match field {
                    #(#setters)*
                    other => return ::core::result::Result::Err(#core::ValueError::UnknownField(other)),
                }
                ::core::result::Result::Ok(())
            }
        }
    })
}

struct FieldInfo {
    ident: Ident,
    kind: Kind,
    optional: bool,
    attrs: ColumnAttrs,
}

#[derive(Default)]
struct ColumnAttrs {
    mapped: bool,
    name: Option<String>,
    json: Option<String>,
    primary_key: bool,
    version: bool,
    nullable: bool,
    ignore: bool,
    skip_insert: bool,
    skip_update: bool,
    scale: Option<u32>,
    true_value: Option<String>,
    false_value: Option<String>,
}

#[derive(Clone, Copy)]
enum Kind {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
    Bytes,
    Other,
}

impl Kind {
    fn tokens(self, core: &TokenStream2) -> TokenStream2 {
        match self {
            Self::Bool => quote!(#core::FieldKind::Bool),
            Self::Int => quote!(#core::FieldKind::Int),
            Self::Float => quote!(#core::FieldKind::Float),
            Self::Text => quote!(#core::FieldKind::Text),
            Self::Timestamp => quote!(#core::FieldKind::Timestamp),
            Self::Bytes => quote!(#core::FieldKind::Bytes),
            Self::Other => quote!(#core::FieldKind::Other),
        }
    }
}

fn field_descriptor(info: &FieldInfo, core: &TokenStream2) -> TokenStream2 {
    let field_name = info.ident.to_string();
    let attrs = &info.attrs;

    if !attrs.mapped {
        let kind = Kind::Other.tokens(core);
        return quote!(#core::FieldDescriptor::unmapped(#field_name, #kind));
    }

    let kind = info.kind.tokens(core);
    let mut chain = quote!(#core::FieldDescriptor::new(#field_name, #kind));
    if let Some(name) = &attrs.name {
        chain.extend(quote!(.column(#name)));
    }
    if let Some(json) = &attrs.json {
        chain.extend(quote!(.external(#json)));
    }
    if attrs.primary_key {
        chain.extend(quote!(.primary_key()));
    }
    if attrs.version {
        chain.extend(quote!(.version()));
    }
    if attrs.nullable || info.optional {
        chain.extend(quote!(.nullable()));
    }
    if attrs.ignore {
        chain.extend(quote!(.ignore()));
    }
    if attrs.skip_insert {
        chain.extend(quote!(.skip_insert()));
    }
    if attrs.skip_update {
        chain.extend(quote!(.skip_update()));
    }
    if let Some(scale) = attrs.scale {
        chain.extend(quote!(.scale(#scale)));
    }
    if let (Some(on), Some(off)) = (&attrs.true_value, &attrs.false_value) {
        chain.extend(quote!(.bool_tokens(#on, #off)));
    }
    chain
}

/// Infers the field kind from its type, unwrapping `Option`.
fn infer_kind(ty: &Type) -> (Kind, bool) {
    let Type::Path(path) = ty else {
        return (Kind::Other, false);
    };
    let Some(segment) = path.path.segments.last() else {
        return (Kind::Other, false);
    };

    let ident = segment.ident.to_string();
    if ident == "Option" {
        return match first_type_argument(&segment.arguments) {
            Some(inner) => (infer_kind(inner).0, true),
            None => (Kind::Other, true),
        };
    }

    let kind = match ident.as_str() {
        "bool" => Kind::Bool,
        "i8" | "i16" | "i32" | "i64" | "i128" | "u8" | "u16" | "u32" | "u64" | "u128" => Kind::Int,
        "f32" | "f64" => Kind::Float,
        "String" => Kind::Text,
        "DateTime" | "NaiveDateTime" => Kind::Timestamp,
        "Vec" => match first_type_argument(&segment.arguments) {
            Some(Type::Path(inner)) if inner.path.is_ident("u8") => Kind::Bytes,
            _ => Kind::Other,
        },
        _ => Kind::Other,
    };
    (kind, false)
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

fn string_value(value: &Expr) -> Option<String> {
    match value {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        _ => None,
    }
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        result.mapped = true;
        // Handle empty attribute like #[column]
        if matches!(attr.meta, Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                result.primary_key = true;
            } else if meta.path.is_ident("version") {
                result.version = true;
            } else if meta.path.is_ident("nullable") {
                result.nullable = true;
            } else if meta.path.is_ident("ignore") {
                result.ignore = true;
            } else if meta.path.is_ident("skip_insert") {
                result.skip_insert = true;
            } else if meta.path.is_ident("skip_update") {
                result.skip_update = true;
            } else if meta.path.is_ident("scale") {
                let value: Expr = meta.value()?.parse()?;
                let scale = match &value {
                    Expr::Lit(lit) => match &lit.lit {
                        Lit::Int(i) => i.base10_parse::<u32>()?,
                        _ => return Err(meta.error("scale must be an integer")),
                    },
                    _ => return Err(meta.error("scale must be an integer")),
                };
                result.scale = Some(scale);
            } else {
                let target = if meta.path.is_ident("name") {
                    &mut result.name
                } else if meta.path.is_ident("json") {
                    &mut result.json
                } else if meta.path.is_ident("true_value") {
                    &mut result.true_value
                } else if meta.path.is_ident("false_value") {
                    &mut result.false_value
                } else {
                    return Err(meta.error("unknown column attribute"));
                };
                let value: Expr = meta.value()?.parse()?;
                *target = Some(
                    string_value(&value).ok_or_else(|| meta.error("expected a string literal"))?,
                );
            }
            Ok(())
        })?;
    }

    Ok(result)
}
