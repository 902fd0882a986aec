//! Scenario 5: async with a typed result.
//!
//! `get_value_async` is annotated with `[Async1, Async2(order = 1)]`.
//! `Async1` sleeps briefly before proceeding; `Async2`, ordered after it,
//! proceeds immediately and then waits on a task of its own. Across both
//! advices the body runs exactly once, and the returned value is the
//! body's own result.

use aop_core::{AspectError, AsyncAdvice, AsyncCursor, AsyncInvocation};
use aop_macros::aspectize;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

static TRACE: once_cell::sync::Lazy<Arc<Mutex<Vec<(String, Instant)>>>> =
    once_cell::sync::Lazy::new(|| Arc::new(Mutex::new(Vec::new())));

fn trace(label: &str) {
    TRACE.lock().unwrap().push((label.to_string(), Instant::now()));
}

struct Async1;

#[async_trait]
impl AsyncAdvice for Async1 {
    fn order(&self) -> i32 {
        0
    }

    async fn apply(
        &self,
        invocation: &mut AsyncInvocation<'_>,
        cursor: AsyncCursor<'_>,
    ) -> Result<(), AspectError> {
        invocation.initialize_await();
        trace("Async1.enter");
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = cursor.proceed(invocation).await;
        trace("Async1.exit");
        result
    }
}

struct Async2;

#[async_trait]
impl AsyncAdvice for Async2 {
    fn order(&self) -> i32 {
        1
    }

    async fn apply(
        &self,
        invocation: &mut AsyncInvocation<'_>,
        cursor: AsyncCursor<'_>,
    ) -> Result<(), AspectError> {
        trace("Async2.enter");
        let result = cursor.proceed(invocation).await;
        trace("body_complete");
        tokio::time::sleep(Duration::from_millis(20)).await;
        trace("Async2.exit");
        result
    }
}

static BODY_CALLS: AtomicUsize = AtomicUsize::new(0);

struct Service;

#[aspectize]
impl Service {
    #[pointcut(advice = Async1)]
    #[pointcut(advice = Async2, order = 1)]
    async fn get_value_async(&self) -> f64 {
        BODY_CALLS.fetch_add(1, Ordering::SeqCst);
        0.5
    }
}

#[tokio::main]
async fn main() {
    println!("=== Scenario 5: async with a typed result ===\n");

    let svc = Service;
    let value = svc.get_value_async().await;
    println!("get_value_async() = {value}");
    assert_eq!(value, 0.5);
    assert_eq!(BODY_CALLS.load(Ordering::SeqCst), 1, "body must run exactly once");

    let trace = TRACE.lock().unwrap();
    for (label, _) in trace.iter() {
        println!("  {label}");
    }
    let labels: Vec<&str> = trace.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "Async1.enter",
            "Async2.enter",
            "body_complete",
            "Async2.exit",
            "Async1.exit",
        ]
    );

    println!("\nPASS");
}
