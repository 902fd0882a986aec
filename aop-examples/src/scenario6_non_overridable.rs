//! Scenario 6: a target that cannot be registered.
//!
//! A method whose pointcut is not overridable must fail at first dispatch
//! with `ConfigurationError`, and the dispatcher must not cache a partial
//! chain for it, so the very next call gets the same honest failure rather
//! than silently running half a chain.

use aop_core::{reset_instance_provider, AspectError};
use aop_macros::aspectize;
use aop_std::logging::LoggingAdvice;

struct Service;

#[aspectize]
impl Service {
    #[pointcut(types = [LoggingAdvice])]
    fn unregisterable(&self) -> Result<(), AspectError> {
        Ok(())
    }
}

fn main() {
    reset_instance_provider();

    println!("=== Scenario 6: a target that cannot be registered ===\n");

    let svc = Service;

    let before = aop_runtime::global_dispatcher().cached_chain_count();
    let first = svc.unregisterable();
    let after_first = aop_runtime::global_dispatcher().cached_chain_count();

    println!("first dispatch: {first:?}");
    assert!(matches!(first, Err(AspectError::ConfigurationError { .. })));
    assert_eq!(
        before, after_first,
        "a failed chain build must not publish a partial chain"
    );

    let second = svc.unregisterable();
    println!("second dispatch: {second:?}");
    assert!(matches!(second, Err(AspectError::ConfigurationError { .. })));

    println!("\nPASS");
}
