//! Scenario 3: bundle flattening.
//!
//! A method annotated with a bundle of `[Logging, Logging(context="2nd")]`
//! must log exactly four entries, in order: enter (no context), enter
//! "2nd", exit "2nd", exit (no context); the bundle's advices nest inside
//! one another rather than running back to back.

use aop_macros::aspectize;
use aop_std::logging::LoggingAdvice;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

static LOG_SINK: Lazy<Arc<Mutex<Vec<String>>>> = Lazy::new(|| Arc::new(Mutex::new(Vec::new())));

struct Service;

#[aspectize]
impl Service {
    #[pointcut(bundle = [
        LoggingAdvice::new().with_sink(LOG_SINK.clone()),
        LoggingAdvice::new().with_context("2nd").with_sink(LOG_SINK.clone()),
    ])]
    fn bundled(&self) -> u32 {
        42
    }
}

fn main() {
    println!("=== Scenario 3: bundle flattening ===\n");

    let svc = Service;
    let result = svc.bundled();
    println!("bundled() = {result}");

    let entries = LOG_SINK.lock().unwrap().clone();
    println!("log entries: {entries:?}");
    assert_eq!(
        entries,
        vec![
            "Entering bundled".to_string(),
            "Entering bundled (2nd)".to_string(),
            "Exiting bundled (2nd)".to_string(),
            "Exiting bundled".to_string(),
        ]
    );

    println!("\nPASS");
}
