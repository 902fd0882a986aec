//! Parsing for the `#[pointcut(...)]` annotation surface.
//!
//! `#[pointcut(...)]` is never expanded as a macro in its own right; it is
//! inert syntax that only ever appears nested inside a `#[aspectize]` impl
//! block, where it is parsed straight out of the raw token tree before
//! `aspectize` emits its replacement for the whole block. See
//! `aspect_attr::transform` for why that ordering means `pointcut` needs no
//! separate registration.

use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Expr, ExprLit, Lit, MetaNameValue, Path, Token};

/// One parsed `#[pointcut(...)]` attribute.
///
/// Mirrors the three mutually-interacting annotation forms: `advice = ..`
/// for `SingleAdvice`, `bundle = [..]` for `AdviceBundle`, and
/// `types = [..]` for `TypeList`. Exactly one of `advice`/`bundle`/`types`
/// is expected to be set per attribute instance; a method may stack several
/// `#[pointcut(advice = ..)]` attributes (allowed multiple times on the
/// same method), but `types`/`bundle` are mutually exclusive with the
/// direct forms at the whole-method level, enforced in `codegen`, not
/// here, since that check spans every attribute on the method.
pub struct PointcutAttr {
    /// `advice = EXPR`: a single advice instance expression.
    pub advice: Option<Expr>,
    /// `bundle = [EXPR, EXPR, ...]`: an `AdviceBundle`, flattened at
    /// chain-build time.
    pub bundle: Option<Vec<Expr>>,
    /// `types = [Path, Path, ...]`: a `TypeList`, resolved through the
    /// instance provider at first dispatch.
    pub types: Option<Vec<Path>>,
    /// Declaration-site order override. Defaults to `0`.
    pub order: i32,
    /// Whether a failure surfacing through this advice's position in the
    /// chain should be swallowed rather than rethrown. Defaults to `false`.
    pub swallow_exceptions: bool,
}

impl PointcutAttr {
    /// Parse the token stream inside `#[pointcut(...)]`'s parentheses.
    pub fn parse(tokens: proc_macro2::TokenStream) -> syn::Result<Self> {
        let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated.parse2(tokens)?;

        let mut out = PointcutAttr {
            advice: None,
            bundle: None,
            types: None,
            order: 0,
            swallow_exceptions: false,
        };

        for pair in pairs {
            let Some(key) = pair.path.get_ident().map(|i| i.to_string()) else {
                continue;
            };
            match key.as_str() {
                "advice" => out.advice = Some(pair.value),
                "order" => out.order = int_literal(&pair.value)?,
                "swallow_exceptions" => out.swallow_exceptions = bool_literal(&pair.value)?,
                "bundle" => out.bundle = Some(array_of_exprs(&pair.value)?),
                "types" => out.types = Some(array_of_paths(&pair.value)?),
                other => {
                    return Err(syn::Error::new_spanned(
                        &pair.path,
                        format!("unrecognized `#[pointcut]` key `{other}`"),
                    ))
                }
            }
        }

        Ok(out)
    }
}

fn int_literal(expr: &Expr) -> syn::Result<i32> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Int(lit), ..
    }) = expr
    {
        lit.base10_parse()
    } else {
        Err(syn::Error::new_spanned(expr, "expected an integer literal"))
    }
}

fn bool_literal(expr: &Expr) -> syn::Result<bool> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Bool(lit), ..
    }) = expr
    {
        Ok(lit.value)
    } else {
        Err(syn::Error::new_spanned(expr, "expected `true` or `false`"))
    }
}

fn array_of_exprs(expr: &Expr) -> syn::Result<Vec<Expr>> {
    if let Expr::Array(array) = expr {
        Ok(array.elems.iter().cloned().collect())
    } else {
        Err(syn::Error::new_spanned(expr, "expected a bracketed list `[..]`"))
    }
}

fn array_of_paths(expr: &Expr) -> syn::Result<Vec<Path>> {
    let elems = array_of_exprs(expr)?;
    elems
        .into_iter()
        .map(|elem| match elem {
            Expr::Path(p) => Ok(p.path),
            other => Err(syn::Error::new_spanned(
                other,
                "expected a bare type name inside `types = [..]`",
            )),
        })
        .collect()
}
