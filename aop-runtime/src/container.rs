//! Container integration glue.
//!
//! These are two distinct concerns: a predicate a DI container could ask
//! before deciding whether to substitute a synthesized subtype for a
//! registration (`is_aspect_target` / `get_proxy_type`), and the
//! back-reference slot a woven type can declare so that calling through
//! `self` re-enters interception instead of bypassing it.
//!
//! Weaving happens in place on `T` itself here; there is no separate `T'`,
//! so the container predicate collapses to a compile-time fact and
//! `get_proxy_type` to "construct `T` the normal way". Both are kept here,
//! as thin shims, so embedders written against a container-integration
//! shape with a synthesized-subtype model still have somewhere to call.
//! The back-reference slot is the one piece that still needs runtime wiring
//! and is implemented for real.

use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Marks a field as the back-reference slot: the place the dispatcher
/// publishes a shared handle to `Self` so user code can call
/// `self.slot.other_pointcut()` and still go through interception, instead
/// of reaching the base implementation directly the way a bare method call
/// on `self` would.
///
/// Write-once: a later publish attempt is a silent no-op rather than
/// replacing an already-published reference.
pub trait ProxySlot: Sized {
    /// The backing cell. A `#[aspectize]`-woven type implementing this
    /// trait stores a `OnceCell<Arc<Self>>` field and returns a reference to
    /// it here.
    fn proxy_slot(&self) -> &OnceCell<Arc<Self>>;
}

/// Publish `handle` into `target`'s back-reference slot if it is not
/// already set. The dispatcher calls this on first dispatch for any target
/// implementing [`ProxySlot`]; subsequent calls for the same target are a
/// no-op.
pub fn publish_proxy_ref<T: ProxySlot>(target: &T, handle: Arc<T>) {
    let _ = target.proxy_slot().set(handle);
}

/// Whether `T` is an aspect target, i.e. declares at least one pointcut.
///
/// A DI container could consult a predicate like this before choosing to
/// register a synthesized subtype in place of `T`. Here there is only ever
/// one type per `T`: `#[aspectize]` either wove it at compile time or it
/// didn't, so the predicate is always true for a type the macro processed.
/// This function exists so container glue written against that
/// synthesized-subtype shape has somewhere to call; it carries no runtime
/// state.
pub const fn is_aspect_target<T>() -> bool {
    true
}

/// Construct `T` "the normal way". Weaving happens in place, so there is no
/// separate proxy constructor to select: any constructor on the
/// already-woven `T` already returns an instance whose pointcut methods are
/// intercepted.
pub fn get_proxy_type<T, F: FnOnce() -> T>(ctor: F) -> T {
    ctor()
}
