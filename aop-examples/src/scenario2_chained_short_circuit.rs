//! Scenario 2: chained advices with short-circuit.
//!
//! `chained` is annotated with `[Caching, Logging(order=1), Validation(order=2)]`.
//! On the first call, validation accepts, logging brackets the call, and
//! caching populates. On the second call with the same arguments, caching
//! short-circuits: logging and validation, both ordered after it, never run,
//! and the returned value is the identical object from the first call.

use aop_macros::aspectize;
use aop_std::caching::CachingAdvice;
use aop_std::logging::LoggingAdvice;
use aop_std::validation::{RangeRule, ValidationAdvice};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

static LOG_SINK: Lazy<Arc<Mutex<Vec<String>>>> = Lazy::new(|| Arc::new(Mutex::new(Vec::new())));

#[derive(Debug)]
struct Contract {
    x: f64,
}

#[aspectize]
impl Contract {
    #[pointcut(advice = CachingAdvice::<Arc<Contract>>::new(|inv| {
        let y = inv.arguments()[0].downcast_ref::<f64>().copied().unwrap_or(0.0);
        format!("y={y}")
    }))]
    #[pointcut(advice = LoggingAdvice::new().with_sink(LOG_SINK.clone()), order = 1)]
    #[pointcut(advice = ValidationAdvice::new().add_rule(Box::new(RangeRule::new(
        "y", 1.0, f64::MAX, |inv| inv.arguments()[0].downcast_ref::<f64>().copied(),
    ))), order = 2)]
    fn chained(&self, y: f64) -> Arc<Contract> {
        Arc::new(Contract { x: self.x * y })
    }
}

fn main() {
    println!("=== Scenario 2: chained advices with short-circuit ===\n");

    let a = Contract { x: 10.0 };

    let first = a.chained(10.0);
    println!("first call -> {first:?}, log so far: {:?}", LOG_SINK.lock().unwrap());
    assert_eq!(first.x, 100.0);
    assert_eq!(LOG_SINK.lock().unwrap().len(), 2);

    let second = a.chained(10.0);
    println!("second call -> {second:?}, log so far: {:?}", LOG_SINK.lock().unwrap());

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        LOG_SINK.lock().unwrap().len(),
        2,
        "logging must not run again once caching short-circuits"
    );

    println!("\nPASS");
}
