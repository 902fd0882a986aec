//! # aop-runtime
//!
//! The Dispatcher and the runtime half of the external interfaces: the
//! back-reference slot and the container-integration shims.
//!
//! `aop-macros` generates the trampoline/executor pair for each pointcut;
//! every generated trampoline calls into [`Dispatcher::dispatch`] here to
//! locate (or build, on first call) the method's advice chain and run it.
//! The dispatcher's cache is process-wide and keyed by `MethodDescriptor`,
//! a build-once, read-many cache: there is no synthesized type to cache,
//! only a chain.

pub mod container;
pub mod dispatcher;

pub use container::{get_proxy_type, is_aspect_target, publish_proxy_ref, ProxySlot};
pub use dispatcher::{global_dispatcher, Dispatcher, GLOBAL_DISPATCHER};

// Re-exported so macro-generated code can reach `once_cell` without the
// woven crate needing its own direct dependency.
pub use once_cell;
