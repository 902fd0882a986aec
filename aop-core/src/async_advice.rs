//! The async advice adapter: advice for methods whose declared return type
//! is an asynchronous task, either untyped or `Task<R>`.

use crate::error::AspectError;
use crate::invocation::{BoxedValue, MethodDescriptor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, `Send` future: what the generated trampoline hands the
/// invocation as its executor when the intercepted method is `async`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The invocation record for an asynchronous pointcut.
///
/// Structurally the async counterpart of [`crate::invocation::Invocation`]:
/// same target/method/arguments/return-value/exception/data shape, but the
/// executor returns a future instead of a value, and `initialize_await`
/// fires the same single-shot suspension hook before the first await
/// performed by any advice on the chain.
pub struct AsyncInvocation<'a> {
    method: MethodDescriptor,
    arguments: Vec<BoxedValue>,
    return_value: Option<BoxedValue>,
    exception: Option<AspectError>,
    data: HashMap<String, Box<dyn std::any::Any + Send + Sync>>,
    executor: Box<dyn FnMut(&mut Vec<BoxedValue>) -> BoxFuture<'a, Result<BoxedValue, AspectError>> + Send + 'a>,
    await_hooks: Vec<Box<dyn FnOnce() + Send + 'a>>,
    await_fired: bool,
}

impl<'a> AsyncInvocation<'a> {
    /// Build a new async invocation record from the future-returning
    /// executor generated for an `async fn` pointcut.
    pub fn new<F>(method: MethodDescriptor, arguments: Vec<BoxedValue>, executor: F) -> Self
    where
        F: FnMut(&mut Vec<BoxedValue>) -> BoxFuture<'a, Result<BoxedValue, AspectError>> + Send + 'a,
    {
        Self {
            method,
            arguments,
            return_value: None,
            exception: None,
            data: HashMap::new(),
            executor: Box::new(executor),
            await_hooks: Vec::new(),
            await_fired: false,
        }
    }

    /// The method descriptor this invocation targets.
    pub fn method(&self) -> MethodDescriptor {
        self.method
    }

    /// The boxed argument tuple.
    pub fn arguments(&self) -> &[BoxedValue] {
        &self.arguments
    }

    /// Mutable access to the boxed argument tuple.
    pub fn arguments_mut(&mut self) -> &mut Vec<BoxedValue> {
        &mut self.arguments
    }

    /// The most recent return value.
    pub fn return_value(&self) -> Option<&BoxedValue> {
        self.return_value.as_ref()
    }

    /// Short-circuit by setting the return value directly.
    pub fn set_return_value(&mut self, value: BoxedValue) {
        self.return_value = Some(value);
    }

    /// Take ownership of the return value.
    pub fn take_return_value(&mut self) -> Option<BoxedValue> {
        self.return_value.take()
    }

    /// The most recently recorded failure, if swallowed by an advice.
    pub fn exception(&self) -> Option<&AspectError> {
        self.exception.as_ref()
    }

    /// The user-extensible data map.
    pub fn data_mut(&mut self) -> &mut HashMap<String, Box<dyn std::any::Any + Send + Sync>> {
        &mut self.data
    }

    /// Await the underlying task, write its result into `return_value`,
    /// and return it. May be awaited more than once, exactly like the
    /// synchronous `Invocation::proceed`.
    pub async fn proceed(&mut self) -> Result<(), AspectError> {
        let fut = (self.executor)(&mut self.arguments);
        match fut.await {
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

    /// Record a swallowed exception without propagating it.
    pub fn record_swallowed(&mut self, err: AspectError) {
        self.exception = Some(err);
    }

    /// Register a listener for the first-suspension event. If the event
    /// already fired, the listener runs immediately.
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

    /// Called by an async advice immediately before its first await, so
    /// listeners can capture/propagate ambient context. Fires at most once
    /// per invocation.
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

/// Advice for an asynchronous pointcut.
///
/// Dispatch on the declared result type `R` happens in the generated
/// trampoline (which knows `R` statically and downcasts
/// `invocation.return_value()` back into it after the chain completes), so
/// the adapter itself is generic only over "the invocation", dispatching
/// on `R` at the edge and running advice bodies uniformly in between.
///
/// Only the direct list annotation form is supported for async pointcuts
/// (no bundles, no type-list resolution); see DESIGN.md for why this is
/// narrower than the full `AdviceSource` machinery.
#[async_trait]
pub trait AsyncAdvice: Send + Sync {
    /// Ascending precedence, exactly like [`crate::advice::Advice::order`].
    fn order(&self) -> i32 {
        0
    }

    /// Run this advice's body. May call `cursor.proceed(invocation).await`
    /// zero, one, or more than once, mirroring the synchronous contract.
    async fn apply(
        &self,
        invocation: &mut AsyncInvocation<'_>,
        cursor: AsyncCursor<'_>,
    ) -> Result<(), AspectError>;
}

/// The async counterpart of [`crate::advice::Cursor`].
pub struct AsyncCursor<'c> {
    next: Option<&'c AsyncChainLink>,
}

impl<'c> AsyncCursor<'c> {
    /// Proceed to the next advice, or await the underlying task if this is
    /// the last advice on the chain.
    pub async fn proceed(&self, invocation: &mut AsyncInvocation<'_>) -> Result<(), AspectError> {
        match self.next {
            Some(link) => link.apply(invocation).await,
            None => invocation.proceed().await,
        }
    }
}

/// One link in a flattened async advice chain.
pub struct AsyncChainLink {
    advice: Arc<dyn AsyncAdvice>,
    next: Option<Box<AsyncChainLink>>,
}

impl AsyncChainLink {
    /// Run this link's advice.
    pub fn apply<'s, 'i, 'f>(
        &'s self,
        invocation: &'i mut AsyncInvocation<'_>,
    ) -> BoxFuture<'f, Result<(), AspectError>>
    where
        's: 'f,
        'i: 'f,
    {
        let cursor = AsyncCursor {
            next: self.next.as_deref(),
        };
        Box::pin(self.advice.apply(invocation, cursor))
    }
}

/// Build the flattened async advice chain from a declaration-ordered list,
/// stable-sorted by `order` exactly like [`crate::advice::build_chain`].
pub fn build_async_chain(advices: Vec<Arc<dyn AsyncAdvice>>) -> Option<AsyncChainLink> {
    let mut indexed: Vec<(usize, i32, Arc<dyn AsyncAdvice>)> = advices
        .into_iter()
        .enumerate()
        .map(|(i, a)| (i, a.order(), a))
        .collect();
    indexed.sort_by_key(|(i, order, _)| (*order, *i));

    let mut head: Option<Box<AsyncChainLink>> = None;
    for (_, _, advice) in indexed.into_iter().rev() {
        head = Some(Box::new(AsyncChainLink { advice, next: head }));
    }
    head.map(|boxed| *boxed)
}
