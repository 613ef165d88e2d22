use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Field, Fields};

/// Derives the `PropertySet` trait for a struct with named fields.
///
/// Every field is a property keyed by its name. The field type must implement
/// `PropertyType`, except for flattened and skipped fields.
///
/// # Attributes
///
/// - `#[property(default)]`: Uses `Default::default()` when the input lacks the key.
/// - `#[property(default = expr)]`: Uses `expr` when the input lacks the key.
/// - `#[property(rename = "...")]`: Uses a different property key than the field name.
/// - `#[property(flatten)]`: Inherits the properties of a field whose type is itself
///   a `PropertySet`. This is how a model extends a "supertype". A key the struct
///   declares itself overrides the supertype's declaration, and both fields are
///   built from the same value.
/// - `#[property(skip)]`: Not a property; the field is built with `Default::default()`.
///
/// # Examples
///
/// ```ignore
/// use model_mapper::PropertySet;
///
/// #[derive(Debug, PropertySet)]
/// pub struct Base {
///     pub id: String,
/// }
///
/// #[derive(Debug, PropertySet)]
/// pub struct User {
///     #[property(flatten)]
///     pub base: Base,
///     pub name: String,
///     #[property(default = 10)]
///     pub limit: u32,
///     #[property(skip)]
///     pub cache: Vec<String>,
/// }
/// // User::schema() declares "id", "name" and "limit"
/// ```
#[proc_macro_derive(PropertySet, attributes(property))]
pub fn derive_property_set(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}

enum FieldRole {
    Property {
        key: String,
        default: Option<DefaultValue>,
    },
    Flatten,
    Skip,
}

enum DefaultValue {
    Trait,
    Expr(Expr),
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "PropertySet only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "PropertySet only supports structs",
            ))
        }
    };

    let mut schema_steps = Vec::new();
    let mut field_inits = Vec::new();
    let mut property_puts = Vec::new();
    let mut flatten_puts = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let ty = &field.ty;

        match field_role(field)? {
            FieldRole::Property { key, default } => {
                let decl = match default {
                    None => quote! {
                        ::model_mapper::PropertyDecl::of::<#ty>(#key)
                    },
                    Some(default) => {
                        let value = match default {
                            DefaultValue::Trait => quote! {
                                <#ty as ::std::default::Default>::default()
                            },
                            DefaultValue::Expr(expr) => quote! { #expr },
                        };
                        quote! {
                            ::model_mapper::PropertyDecl::of::<#ty>(#key).with_default({
                                let value: #ty = #value;
                                ::model_mapper::PropertyType::to_property(&value)
                            })
                        }
                    }
                };
                schema_steps.push(quote! { let schema = schema.property(#decl); });
                field_inits.push(quote! {
                    #ident: properties.take::<#ty>(model, #key)?
                });
                property_puts.push(quote! {
                    properties.insert(#key, ::model_mapper::PropertyType::to_property(&self.#ident));
                });
            }
            FieldRole::Flatten => {
                schema_steps.push(quote! {
                    let schema = schema.inherit(<#ty as ::model_mapper::PropertySet>::schema());
                });
                field_inits.push(quote! {
                    #ident: <#ty as ::model_mapper::PropertySet>::from_properties(
                        &mut ::std::clone::Clone::clone(&inherited),
                    )?
                });
                flatten_puts.push(quote! {
                    properties.extend(<#ty as ::model_mapper::PropertySet>::properties(&self.#ident));
                });
            }
            FieldRole::Skip => {
                field_inits.push(quote! {
                    #ident: ::std::default::Default::default()
                });
            }
        }
    }

    // Supertypes read from the bag as it was before any own field took its key.
    let inherited = (!flatten_puts.is_empty()).then(|| {
        quote! { let inherited = ::std::clone::Clone::clone(&*properties); }
    });

    Ok(quote! {
        impl #impl_generics ::model_mapper::PropertySet for #name #ty_generics #where_clause {
            fn schema() -> ::model_mapper::Schema {
                let schema = ::model_mapper::Schema::new();
                #(#schema_steps)*
                schema
            }

            #[allow(unused_variables)]
            fn from_properties(
                properties: &mut ::model_mapper::Properties,
            ) -> ::std::result::Result<Self, ::model_mapper::MappingError> {
                let model = ::std::any::type_name::<Self>();
                #inherited
                ::std::result::Result::Ok(Self {
                    #(#field_inits,)*
                })
            }

            #[allow(unused_mut)]
            fn properties(&self) -> ::model_mapper::Properties {
                let mut properties = ::model_mapper::Properties::new();
                #(#flatten_puts)*
                #(#property_puts)*
                properties
            }
        }
    })
}

fn field_role(field: &Field) -> syn::Result<FieldRole> {
    let mut key = None;
    let mut default = None;
    let mut flatten = false;
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("property") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                if meta.input.peek(syn::Token![=]) {
                    default = Some(DefaultValue::Expr(meta.value()?.parse()?));
                } else {
                    default = Some(DefaultValue::Trait);
                }
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                key = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("flatten") {
                flatten = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported property attribute"))
            }
        })?;
    }

    if flatten && skip {
        return Err(syn::Error::new_spanned(
            field,
            "a field cannot be both flattened and skipped",
        ));
    }
    if (flatten || skip) && (default.is_some() || key.is_some()) {
        return Err(syn::Error::new_spanned(
            field,
            "`default` and `rename` only apply to property fields",
        ));
    }

    if flatten {
        return Ok(FieldRole::Flatten);
    }
    if skip {
        return Ok(FieldRole::Skip);
    }

    let key = match key {
        Some(key) => key,
        None => {
            let ident = field
                .ident
                .as_ref()
                .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
            let name = ident.to_string();
            name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
        }
    };
    Ok(FieldRole::Property { key, default })
}
