//! # aop-core
//!
//! Core abstractions for the aspect runtime: the invocation record, the
//! advice trait and its chaining machinery, the async advice adapter, and
//! the error taxonomy shared by every other crate in the workspace.
//!
//! This crate owns no code generation and no registry state beyond the
//! single instance-provider slot advice chains consult when resolving a
//! type-list annotation (see [`advice::install_instance_provider`]). Code
//! generation lives in `aop-macros`; the dispatcher and its cache live in
//! `aop-runtime`.
//!
//! ## Core Concepts
//!
//! - **Invocation**: the mutable per-call record threaded through a chain:
//!   arguments, return value, exception, and a user-extensible data map.
//! - **Advice**: a cross-cutting behavior applied around a method. An advice
//!   chooses whether, when, and how many times to re-enter the method body
//!   via `Cursor::proceed`.
//! - **Chain**: a declaration-and-order-sorted linked list of advices,
//!   flattened from bundles and type-list annotations.
//!
//! ## Example
//!
//! ```rust
//! use aop_core::prelude::*;
//!
//! struct Logger;
//!
//! impl Advice for Logger {
//!     fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
//!         println!("enter {}", invocation.method());
//!         cursor.proceed(invocation)?;
//!         println!("exit {}", invocation.method());
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Thread Safety
//!
//! Advices must implement `Send + Sync` to be installed on a dispatcher
//! shared across threads.

#![deny(missing_docs)]

pub mod advice;
pub mod async_advice;
pub mod error;
pub mod invocation;

pub use advice::{
    build_chain, install_instance_provider, reset_instance_provider, Advice, AdviceSource,
    ChainLink, Cursor, InstanceProvider, TypeEntry, WithSwallow,
};
pub use async_advice::{
    build_async_chain, AsyncAdvice, AsyncChainLink, AsyncCursor, AsyncInvocation, BoxFuture,
};
pub use error::AspectError;
pub use invocation::{BoxedValue, Invocation, MethodDescriptor};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::advice::{Advice, Cursor};
    pub use crate::async_advice::{AsyncAdvice, AsyncCursor, AsyncInvocation};
    pub use crate::error::AspectError;
    pub use crate::invocation::{BoxedValue, Invocation, MethodDescriptor};
}
