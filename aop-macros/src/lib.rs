//! # aop-macros
//!
//! Procedural macros for the aop-rs runtime.
//!
//! This crate provides the `#[aspectize]` impl-block attribute, a
//! compile-time weaver that rewrites every `#[pointcut(...)]`-annotated
//! method in the block into an executor (the original body, renamed) plus a
//! trampoline (the original name, now calling into
//! `aop_runtime::global_dispatcher`). `#[pointcut(...)]` itself is never
//! registered as a macro; it is parsed directly out of the raw attribute
//! tokens by `aspectize`. See `aspect_attr` and `parsing` for the details.

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemImpl};

mod aspect_attr;
mod codegen;
mod parsing;

/// Weaves every `#[pointcut(...)]`-annotated method in an `impl` block into
/// an executor/trampoline pair dispatched through the global `Dispatcher`.
///
/// # Example
///
/// ```ignore
/// use aop_macros::aspectize;
///
/// struct Greeter;
///
/// #[aspectize]
/// impl Greeter {
///     #[pointcut(advice = LoggingAdvice::default(), order = 10)]
///     fn greet(&self, name: String) -> String {
///         format!("hello, {name}")
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn aspectize(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);

    aspect_attr::transform(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
