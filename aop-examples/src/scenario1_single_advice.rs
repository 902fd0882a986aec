//! Scenario 1: single advice, synchronous.
//!
//! A `Contract` whose `one_advice` method divides `x` by `y` and clamps the
//! result to `>= 1.0`. A single `LoggingAdvice` brackets the call; the log
//! must contain exactly two entries, "Entering one_advice" then "Exiting
//! one_advice", in that order.

use aop_macros::aspectize;
use aop_std::logging::LoggingAdvice;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

static LOG_SINK: Lazy<Arc<Mutex<Vec<String>>>> = Lazy::new(|| Arc::new(Mutex::new(Vec::new())));

#[derive(Debug, Clone)]
struct Contract {
    x: f64,
}

#[aspectize]
impl Contract {
    #[pointcut(advice = LoggingAdvice::new().with_sink(LOG_SINK.clone()))]
    fn one_advice(&self, y: f64) -> Contract {
        let divided = self.x / y;
        Contract { x: divided.max(1.0) }
    }
}

fn main() {
    println!("=== Scenario 1: single advice, synchronous ===\n");

    let a = Contract { x: 1000.0 };
    let result = a.one_advice(1000.0);
    println!("one_advice(a{{x: 1000.0}}, 1000.0) = {result:?}");
    assert_eq!(result.x, 1.0);

    let entries = LOG_SINK.lock().unwrap().clone();
    println!("log entries: {entries:?}");
    assert_eq!(
        entries,
        vec!["Entering one_advice".to_string(), "Exiting one_advice".to_string()]
    );

    println!("\nPASS");
}
