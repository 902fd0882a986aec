//! # aop-std
//!
//! A small library of ready-made [`aop_core::Advice`] implementations
//! exercised by the worked scenarios in the runtime's specification:
//!
//! - **Logging**: brackets a call with entry/exit log lines.
//! - **Timing**: measures and accumulates per-method call duration.
//! - **Caching**: memoizes a method's return value, short-circuiting the
//!   rest of the chain on a hit.
//! - **Validation**: runs precondition checks before a call proceeds.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use aop_macros::aspectize;
//! use aop_std::logging::LoggingAdvice;
//!
//! struct Greeter;
//!
//! #[aspectize]
//! impl Greeter {
//!     #[pointcut(advice = LoggingAdvice::new())]
//!     fn greet(&self, name: String) -> String {
//!         format!("hello, {name}")
//!     }
//! }
//! ```

pub mod caching;
pub mod logging;
pub mod timing;
pub mod validation;

pub use caching::CachingAdvice;
pub use logging::{LogLevel, LoggingAdvice};
pub use timing::{MethodStats, TimingAdvice};
pub use validation::{CustomRule, RangeRule, ValidationAdvice, ValidationRule};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::caching::CachingAdvice;
    pub use crate::logging::{LogLevel, LoggingAdvice};
    pub use crate::timing::{MethodStats, TimingAdvice};
    pub use crate::validation::{CustomRule, RangeRule, ValidationAdvice, ValidationRule};
}
