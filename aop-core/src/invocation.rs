//! The Invocation Record and the method descriptor used to key advice
//! chains and the dispatcher's cache.

use crate::error::AspectError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Identifies the method a pointcut was declared on.
///
/// Used only as a lookup key and for diagnostics, never to invoke the
/// method directly. Two methods with the same simple name on different
/// types, or overloads disambiguated by the proxy generator, produce
/// distinct descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// The declaring type's name, as given to `#[aspectize]`.
    pub type_name: &'static str,
    /// The method's name as declared on the user type (not a mangled
    /// trampoline/executor name).
    pub method_name: &'static str,
}

impl MethodDescriptor {
    /// Construct a descriptor.
    pub const fn new(type_name: &'static str, method_name: &'static str) -> Self {
        Self {
            type_name,
            method_name,
        }
    }

    /// The fully qualified name, e.g. `MyService::process`.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.type_name, self.method_name)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// A boxed value flowing through an invocation: an argument, a return
/// value, or an item in the user-extensible data map.
pub type BoxedValue = Box<dyn Any + Send>;

/// The mutable per-call state threaded through an advice chain.
///
/// `target` and `method` are fixed at construction; every other field may
/// be read or written by any advice on the chain. An `Invocation` is never
/// shared across concurrent invocations of the same target; it is built
/// fresh, once, per call, inside the generated trampoline.
pub struct Invocation<'a> {
    method: MethodDescriptor,
    arguments: Vec<BoxedValue>,
    return_value: Option<BoxedValue>,
    exception: Option<AspectError>,
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
    proceed_thunk: Box<dyn FnMut(&mut Vec<BoxedValue>) -> Result<BoxedValue, AspectError> + 'a>,
    await_hooks: Vec<Box<dyn FnOnce() + Send + 'a>>,
    await_fired: bool,
}

impl<'a> Invocation<'a> {
    /// Build a new invocation record.
    ///
    /// `executor` is the non-virtual re-entry point into the original
    /// method body: the closure the generated trampoline hands in is
    /// exactly `MethodDescriptor`'s executor twin, called against the
    /// boxed argument tuple currently held by the invocation.
    pub fn new<F>(method: MethodDescriptor, arguments: Vec<BoxedValue>, executor: F) -> Self
    where
        F: FnMut(&mut Vec<BoxedValue>) -> Result<BoxedValue, AspectError> + 'a,
    {
        Self {
            method,
            arguments,
            return_value: None,
            exception: None,
            data: HashMap::new(),
            proceed_thunk: Box::new(executor),
            await_hooks: Vec::new(),
            await_fired: false,
        }
    }

    /// The method descriptor this invocation targets.
    pub fn method(&self) -> MethodDescriptor {
        self.method
    }

    /// The boxed argument tuple, in declared parameter order.
    pub fn arguments(&self) -> &[BoxedValue] {
        &self.arguments
    }

    /// Mutable access to the boxed argument tuple, so an advice may rewrite
    /// arguments before a later `proceed()`.
    pub fn arguments_mut(&mut self) -> &mut Vec<BoxedValue> {
        &mut self.arguments
    }

    /// The most recent return value, if the executor has run at least once
    /// and no advice has since cleared it.
    pub fn return_value(&self) -> Option<&BoxedValue> {
        self.return_value.as_ref()
    }

    /// Set the return value directly, the way an advice short-circuits without
    /// calling `proceed`.
    pub fn set_return_value(&mut self, value: BoxedValue) {
        self.return_value = Some(value);
    }

    /// Take ownership of the return value, consuming it.
    pub fn take_return_value(&mut self) -> Option<BoxedValue> {
        self.return_value.take()
    }

    /// The most recently recorded failure, if any advice chose to swallow
    /// an exception raised further down the chain.
    pub fn exception(&self) -> Option<&AspectError> {
        self.exception.as_ref()
    }

    /// The user-extensible key/value map for cross-cutting state such as
    /// timing or correlation IDs.
    pub fn data(&self) -> &HashMap<String, Box<dyn Any + Send + Sync>> {
        &self.data
    }

    /// Mutable access to the user-extensible data map.
    pub fn data_mut(&mut self) -> &mut HashMap<String, Box<dyn Any + Send + Sync>> {
        &mut self.data
    }

    /// Invoke the executor against the current argument tuple, write the
    /// result into `return_value`, and return it.
    ///
    /// May be called zero, one, or more than once from within an advice.
    /// Each call re-invokes the executor and overwrites `return_value`;
    /// `return_value` after the chain finishes equals whatever the *last*
    /// call produced. Each call re-runs only the executor itself, not the
    /// chain again, matching the documented reading of "proceed re-enters
    /// the tail from the current advice, not the prefix" (see
    /// `crate::advice::Cursor::proceed`, which is what advice code actually
    /// calls; this method is its terminal case).
    pub fn proceed(&mut self) -> Result<(), AspectError> {
        match (self.proceed_thunk)(&mut self.arguments) {
            Ok(value) => {
                self.return_value = Some(value);
                Ok(())
            }
            Err(err) => {
                self.exception = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Record that an advice swallowed an exception, without propagating
    /// it further. `return_value` is left as whatever it already held
    /// (typically unset, i.e. the language default for the return type).
    pub fn record_swallowed(&mut self, err: AspectError) {
        self.exception = Some(err);
    }

    /// Register a listener that fires the first time any async advice
    /// announces it is about to suspend. Fires at most once per
    /// invocation; registering after the hook has already fired runs the
    /// listener immediately so late registrants still observe the event.
    pub fn on_first_await<F>(&mut self, listener: F)
    where
        F: FnOnce() + Send + 'a,
    {
        if self.await_fired {
            listener();
        } else {
            self.await_hooks.push(Box::new(listener));
        }
    }

    /// Called by the async advice adapter immediately before its first
    /// await. Fires every registered listener exactly once; subsequent
    /// calls are no-ops.
    pub fn initialize_await(&mut self) {
        if self.await_fired {
            return;
        }
        self.await_fired = true;
        for hook in self.await_hooks.drain(..) {
            hook();
        }
    }
}

impl<'a> fmt::Debug for Invocation<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method)
            .field("arguments_len", &self.arguments.len())
            .field("has_return_value", &self.return_value.is_some())
            .field("has_exception", &self.exception.is_some())
            .finish()
    }
}
