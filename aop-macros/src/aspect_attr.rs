//! Entry point for the `#[aspectize]` impl-block weaver: a compile-time
//! trampoline-table rewrite rather than runtime subtype synthesis.

use crate::codegen::weave_method;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{ImplItem, ItemImpl, Result, Type};

/// Weave every `#[pointcut(...)]`-annotated method in `input`, leaving
/// every other item untouched.
///
/// Rejects open generic `impl` blocks at expansion time: if `T` is an open
/// generic type, this fails with a `ConfigurationError`-flavored compile
/// error, since Rust's monomorphization means there is no single
/// synthesized method to weave for an unbound type parameter.
pub fn transform(input: ItemImpl) -> Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[aspectize] does not support generic impl blocks (ConfigurationError: open generic type)",
        ));
    }

    let type_name = self_type_name(&input.self_ty)?;

    let mut woven_items = Vec::with_capacity(input.items.len());
    let mut pointcut_seq = 0usize;

    for item in &input.items {
        match item {
            ImplItem::Fn(method) => {
                let pointcut_attrs: Vec<_> = method
                    .attrs
                    .iter()
                    .filter(|a| a.path().is_ident("pointcut"))
                    .collect();

                if pointcut_attrs.is_empty() {
                    woven_items.push(quote! { #item });
                } else {
                    let woven = weave_method(&type_name, pointcut_seq, method, &pointcut_attrs)?;
                    pointcut_seq += 1;
                    woven_items.push(woven);
                }
            }
            other => woven_items.push(quote! { #other }),
        }
    }

    let attrs = &input.attrs;
    let unsafety = &input.unsafety;
    let self_ty = &input.self_ty;

    let assembled = if let Some((bang, path, for_token)) = &input.trait_ {
        quote! {
            #(#attrs)*
            #unsafety impl #bang #path #for_token #self_ty {
                #(#woven_items)*
            }
        }
    } else {
        quote! {
            #(#attrs)*
            #unsafety impl #self_ty {
                #(#woven_items)*
            }
        }
    };

    Ok(assembled)
}

fn self_type_name(self_ty: &Type) -> Result<String> {
    if let Type::Path(type_path) = self_ty {
        if let Some(segment) = type_path.path.segments.last() {
            return Ok(segment.ident.to_string());
        }
    }
    Err(syn::Error::new_spanned(
        self_ty,
        "#[aspectize] requires a plain named type (`impl MyType { .. }`)",
    ))
}
