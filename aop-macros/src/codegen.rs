//! Per-method code generation for `#[aspectize]`: a hand-written trampoline
//! table. For every `#[pointcut(...)]`-annotated method, rename the
//! original body into a private, non-virtual executor and replace the
//! original name with a trampoline that builds an invocation and forwards
//! to the dispatcher.

use crate::parsing::PointcutAttr;
use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{Attribute, FnArg, Ident, ImplItemFn, Pat, ReturnType, Type};

/// One intercepted method's declared arguments: the binding identifier and
/// its declared type. Destructuring patterns are not supported: a pointcut
/// method's parameters must bind to simple identifiers, since each argument
/// is boxed individually and looked up by position.
struct Argument {
    ident: Ident,
    ty: Type,
}

/// Rewrite one `#[pointcut(...)]`-annotated method into an executor/
/// trampoline pair. `type_name` is the declaring type's simple name, used
/// to build the method's [`aop_core::MethodDescriptor`]; `seq` disambiguates
/// the generated executor's name when more than one `#[aspectize]` impl
/// block processes the same type: synthetic helper names are uniquified
/// with a stable numeric suffix keyed on declaration order.
pub fn weave_method(
    type_name: &str,
    seq: usize,
    method: &ImplItemFn,
    pointcut_attrs: &[&Attribute],
) -> syn::Result<TokenStream> {
    let method_name = &method.sig.ident;
    let method_name_str = method_name.to_string();
    let vis = &method.vis;
    let generics = &method.sig.generics;
    let where_clause = &method.sig.generics.where_clause;
    let asyncness = method.sig.asyncness;
    let receiver = receiver_of(method)?;
    if asyncness.is_some() && receiver_is_mut(method) {
        return Err(syn::Error::new(
            method.sig.span(),
            "async #[pointcut] methods must take `&self`, not `&mut self` \
             (the generated trampoline moves the receiver into a boxed future, \
             which a unique reference cannot survive more than one `proceed`)",
        ));
    }
    let args = arguments_of(method)?;
    let output = &method.sig.output;
    let carried_attrs: Vec<&Attribute> = method
        .attrs
        .iter()
        .filter(|a| !a.path().is_ident("pointcut"))
        .collect();

    let executor_name = format_ident!("__aop_exec_{}_{}", method_name, seq);

    let mut executor_sig = method.sig.clone();
    executor_sig.ident = executor_name.clone();
    let executor_body = &method.block;

    let sources = pointcut_attrs
        .iter()
        .map(|a| PointcutAttr::parse(a.meta.require_list()?.tokens.clone()))
        .collect::<syn::Result<Vec<_>>>()?;

    if asyncness.is_some() {
        build_async_trampoline(
            type_name,
            &method_name_str,
            vis,
            generics,
            where_clause,
            &receiver,
            &args,
            output,
            &executor_name,
            executor_body,
            &executor_sig,
            &carried_attrs,
            &sources,
        )
    } else {
        build_sync_trampoline(
            type_name,
            &method_name_str,
            vis,
            generics,
            where_clause,
            &receiver,
            &args,
            output,
            &executor_name,
            executor_body,
            &executor_sig,
            &carried_attrs,
            &sources,
        )
    }
}

fn receiver_of(method: &ImplItemFn) -> syn::Result<TokenStream> {
    match method.sig.inputs.first() {
        Some(FnArg::Receiver(r)) => Ok(quote! { #r }),
        _ => Err(syn::Error::new(
            method.sig.span(),
            "#[pointcut] methods must take `&self` or `&mut self`",
        )),
    }
}

fn receiver_is_mut(method: &ImplItemFn) -> bool {
    matches!(
        method.sig.inputs.first(),
        Some(FnArg::Receiver(r)) if r.mutability.is_some()
    )
}

fn arguments_of(method: &ImplItemFn) -> syn::Result<Vec<Argument>> {
    method
        .sig
        .inputs
        .iter()
        .skip(1)
        .map(|arg| match arg {
            FnArg::Typed(pat_type) => match pat_type.pat.as_ref() {
                Pat::Ident(pat_ident) => Ok(Argument {
                    ident: pat_ident.ident.clone(),
                    ty: (*pat_type.ty).clone(),
                }),
                other => Err(syn::Error::new(
                    other.span(),
                    "#[pointcut] method arguments must be simple identifiers (no destructuring)",
                )),
            },
            FnArg::Receiver(r) => Err(syn::Error::new(
                r.span(),
                "unexpected receiver after the first argument",
            )),
        })
        .collect()
}

/// `Some(inner)` when `ty` is exactly `Result<inner, AspectError>`, the one
/// fallible-trampoline shape this port supports, since propagating an
/// arbitrary user error type `E` back out through a type-erased
/// `AspectError` has no general answer (see DESIGN.md).
fn result_of_aspect_error(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let mut iter = args.args.iter();
    let ok_ty = match iter.next()? {
        syn::GenericArgument::Type(t) => t,
        _ => return None,
    };
    let err_ty = match iter.next()? {
        syn::GenericArgument::Type(Type::Path(p)) => p,
        _ => return None,
    };
    if err_ty.path.segments.last()?.ident == "AspectError" {
        Some(ok_ty)
    } else {
        None
    }
}

fn build_sources_expr(sources: &[PointcutAttr]) -> syn::Result<TokenStream> {
    let has_type_list = sources.iter().any(|s| s.types.is_some());
    let has_direct = sources
        .iter()
        .any(|s| s.advice.is_some() || s.bundle.is_some());
    if has_type_list && has_direct {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "a #[pointcut] method may not combine `advice`/`bundle` with `types` (ConfigurationError)",
        ));
    }

    let entries: Vec<TokenStream> = sources
        .iter()
        .map(|s| {
            let order = s.order;
            let swallow = s.swallow_exceptions;
            if let Some(expr) = &s.advice {
                quote! {
                    aop_core::AdviceSource::Single {
                        advice: ::std::sync::Arc::new(
                            aop_core::WithSwallow::new(#expr, #swallow)
                        ) as ::std::sync::Arc<dyn aop_core::Advice>,
                        order: #order,
                    }
                }
            } else if let Some(exprs) = &s.bundle {
                let children = exprs.iter().map(|e| {
                    quote! {
                        aop_core::AdviceSource::Single {
                            advice: ::std::sync::Arc::new(#e) as ::std::sync::Arc<dyn aop_core::Advice>,
                            order: 0,
                        }
                    }
                });
                quote! {
                    aop_core::AdviceSource::Bundle {
                        sources: vec![ #(#children),* ],
                        order: #order,
                    }
                }
            } else if let Some(paths) = &s.types {
                let entries = paths.iter().map(|p| {
                    let name = quote!(#p).to_string();
                    quote! {
                        aop_core::TypeEntry::Type(::std::any::TypeId::of::<#p>(), #name)
                    }
                });
                quote! {
                    aop_core::AdviceSource::TypeList {
                        entries: vec![ #(#entries),* ],
                        order: #order,
                    }
                }
            } else {
                quote! { compile_error!("a #[pointcut] attribute needs `advice`, `bundle`, or `types`") }
            }
        })
        .collect();

    Ok(quote! { vec![ #(#entries),* ] })
}

fn build_async_advices_expr(sources: &[PointcutAttr]) -> syn::Result<TokenStream> {
    for s in sources {
        if s.bundle.is_some() || s.types.is_some() {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                "async #[pointcut] methods only support the direct `advice = ..` form",
            ));
        }
    }
    let entries: Vec<TokenStream> = sources
        .iter()
        .map(|s| {
            let expr = s.advice.as_ref().expect("checked above");
            quote! { ::std::sync::Arc::new(#expr) as ::std::sync::Arc<dyn aop_core::AsyncAdvice> }
        })
        .collect();
    Ok(quote! { vec![ #(#entries),* ] })
}

#[allow(clippy::too_many_arguments)]
fn build_sync_trampoline(
    type_name: &str,
    method_name: &str,
    vis: &syn::Visibility,
    generics: &syn::Generics,
    where_clause: &Option<syn::WhereClause>,
    receiver: &TokenStream,
    args: &[Argument],
    output: &ReturnType,
    executor_name: &Ident,
    executor_body: &syn::Block,
    executor_sig: &syn::Signature,
    carried_attrs: &[&Attribute],
    sources: &[PointcutAttr],
) -> syn::Result<TokenStream> {
    let method_ident = Ident::new(method_name, proc_macro2::Span::call_site());
    let arg_idents: Vec<&Ident> = args.iter().map(|a| &a.ident).collect();
    let arg_types: Vec<&Type> = args.iter().map(|a| &a.ty).collect();
    let box_args = arg_idents
        .iter()
        .map(|ident| quote! { Box::new(#ident) as aop_core::BoxedValue });
    let downcast_args = (0..args.len()).map(|i| {
        let ident = arg_idents[i];
        let ty = arg_types[i];
        quote_spanned! { ty.span() =>
            let #ident = __aop_args[#i]
                .downcast_ref::<#ty>()
                .expect("aop: argument type mismatch")
                .clone();
        }
    });

    let sources_expr = build_sources_expr(sources)?;

    let exec_call = quote! { self.#executor_name(#(#arg_idents),*) };

    let fallible_inner = match output {
        ReturnType::Type(_, ty) => result_of_aspect_error(ty),
        ReturnType::Default => None,
    };

    let (executor_closure_body, dispatch_and_unbox) = if let Some(inner_ty) = fallible_inner {
        let closure = quote! {
            move |__aop_args: &mut Vec<aop_core::BoxedValue>| -> Result<aop_core::BoxedValue, aop_core::AspectError> {
                #(#downcast_args)*
                match #exec_call {
                    Ok(__v) => Ok(Box::new(__v) as aop_core::BoxedValue),
                    Err(__e) => Err(aop_core::AspectError::user(__e)),
                }
            }
        };
        let unbox = quote! {
            if let Err(__e) = aop_runtime::global_dispatcher().dispatch(&mut __aop_inv, || #sources_expr) {
                return Err(__e);
            }
            Ok(*__aop_inv
                .take_return_value()
                .expect("aop: no return value produced")
                .downcast::<#inner_ty>()
                .expect("aop: return type mismatch"))
        };
        (closure, unbox)
    } else {
        let closure = quote! {
            move |__aop_args: &mut Vec<aop_core::BoxedValue>| -> Result<aop_core::BoxedValue, aop_core::AspectError> {
                #(#downcast_args)*
                let __result = #exec_call;
                Ok(Box::new(__result) as aop_core::BoxedValue)
            }
        };
        let unbox = match output {
            ReturnType::Default => quote! {
                aop_runtime::global_dispatcher()
                    .dispatch(&mut __aop_inv, || #sources_expr)
                    .unwrap_or_else(|e| panic!("aop dispatch failed for {}::{}: {e}", #type_name, #method_name));
            },
            ReturnType::Type(_, ty) => quote! {
                aop_runtime::global_dispatcher()
                    .dispatch(&mut __aop_inv, || #sources_expr)
                    .unwrap_or_else(|e| panic!("aop dispatch failed for {}::{}: {e}", #type_name, #method_name));
                *__aop_inv
                    .take_return_value()
                    .expect("aop: no return value produced")
                    .downcast::<#ty>()
                    .expect("aop: return type mismatch")
            },
        };
        (closure, unbox)
    };

    Ok(quote! {
        #executor_sig #executor_body

        #(#carried_attrs)*
        #vis fn #method_ident #generics (#receiver #(, #arg_idents: #arg_types)*) #output #where_clause {
            let __aop_descriptor = aop_core::MethodDescriptor::new(#type_name, #method_name);
            let __aop_args: Vec<aop_core::BoxedValue> = vec![ #(#box_args),* ];
            let mut __aop_inv = aop_core::Invocation::new(
                __aop_descriptor,
                __aop_args,
                #executor_closure_body,
            );
            #dispatch_and_unbox
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn build_async_trampoline(
    type_name: &str,
    method_name: &str,
    vis: &syn::Visibility,
    generics: &syn::Generics,
    where_clause: &Option<syn::WhereClause>,
    receiver: &TokenStream,
    args: &[Argument],
    output: &ReturnType,
    executor_name: &Ident,
    executor_body: &syn::Block,
    executor_sig: &syn::Signature,
    carried_attrs: &[&Attribute],
    sources: &[PointcutAttr],
) -> syn::Result<TokenStream> {
    let method_ident = Ident::new(method_name, proc_macro2::Span::call_site());
    let arg_idents: Vec<&Ident> = args.iter().map(|a| &a.ident).collect();
    let arg_types: Vec<&Type> = args.iter().map(|a| &a.ty).collect();
    let box_args = arg_idents
        .iter()
        .map(|ident| quote! { Box::new(#ident) as aop_core::BoxedValue });
    let downcast_args = (0..args.len()).map(|i| {
        let ident = arg_idents[i];
        let ty = arg_types[i];
        quote_spanned! { ty.span() =>
            let #ident = __aop_args[#i]
                .downcast_ref::<#ty>()
                .expect("aop: argument type mismatch")
                .clone();
        }
    });

    let advices_expr = build_async_advices_expr(sources)?;
    let exec_call = quote! { self.#executor_name(#(#arg_idents),*) };

    let unbox = match output {
        ReturnType::Default => quote! { } ,
        ReturnType::Type(_, ty) => quote! {
            *__aop_inv
                .take_return_value()
                .expect("aop: no return value produced")
                .downcast::<#ty>()
                .expect("aop: return type mismatch")
        },
    };

    Ok(quote! {
        #executor_sig #executor_body

        #(#carried_attrs)*
        #vis async fn #method_ident #generics (#receiver #(, #arg_idents: #arg_types)*) #output #where_clause {
            let __aop_descriptor = aop_core::MethodDescriptor::new(#type_name, #method_name);
            let __aop_args: Vec<aop_core::BoxedValue> = vec![ #(#box_args),* ];
            let mut __aop_inv = aop_core::AsyncInvocation::new(
                __aop_descriptor,
                __aop_args,
                move |__aop_args: &mut Vec<aop_core::BoxedValue>| -> aop_core::BoxFuture<'_, Result<aop_core::BoxedValue, aop_core::AspectError>> {
                    #(#downcast_args)*
                    Box::pin(async move {
                        let __result = #exec_call.await;
                        Ok(Box::new(__result) as aop_core::BoxedValue)
                    })
                },
            );
            let __aop_advices: Vec<::std::sync::Arc<dyn aop_core::AsyncAdvice>> = #advices_expr;
            let __aop_result = match aop_core::build_async_chain(__aop_advices) {
                Some(chain) => chain.apply(&mut __aop_inv).await,
                None => __aop_inv.proceed().await,
            };
            __aop_result.unwrap_or_else(|e| panic!("aop dispatch failed for {}::{}: {e}", #type_name, #method_name));
            #unbox
        }
    })
}
