//! Benchmarks for advice-chain overhead measurement.
//!
//! Measures the cost of dispatching through a chain of advices compared to
//! calling the underlying function directly.

use aop_core::{Advice, AspectError, BoxedValue, Cursor, Invocation, MethodDescriptor};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

/// Advice that does nothing around `proceed`.
struct NoOpAdvice;

impl Advice for NoOpAdvice {
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        cursor.proceed(invocation)
    }
}

/// Advice with minimal counter bookkeeping on entry and exit.
struct CountingAdvice {
    counter: std::sync::atomic::AtomicUsize,
}

impl CountingAdvice {
    fn new() -> Self {
        Self {
            counter: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl Advice for CountingAdvice {
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        self.counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        cursor.proceed(invocation)?;
        self.counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }
}

/// Advice that does real work on both sides of `proceed`.
struct ComplexAdvice;

impl Advice for ComplexAdvice {
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        let _sum: u64 = (0..10).sum();
        cursor.proceed(invocation)?;
        let _product: u64 = (1..5).product();
        Ok(())
    }
}

#[inline(never)]
fn baseline_function(x: i32) -> i32 {
    x * 2
}

fn descriptor() -> MethodDescriptor {
    MethodDescriptor::new("Benchmark", "scale")
}

fn invocation_for(x: i32) -> Invocation<'static> {
    Invocation::new(descriptor(), Vec::new(), move |_args| {
        Ok(Box::new(baseline_function(x)) as BoxedValue)
    })
}

fn run_through(advice: &dyn Advice, invocation: &mut Invocation<'_>) -> i32 {
    let cursor = Cursor::terminal();
    advice.apply(invocation, &cursor).unwrap();
    *invocation.take_return_value().unwrap().downcast::<i32>().unwrap()
}

fn bench_baseline(c: &mut Criterion) {
    c.bench_function("baseline_no_advice", |b| {
        b.iter(|| baseline_function(black_box(42)))
    });
}

fn bench_noop_advice(c: &mut Criterion) {
    let advice = NoOpAdvice;
    c.bench_function("noop_advice", |b| {
        b.iter(|| {
            let mut inv = invocation_for(black_box(42));
            run_through(&advice, &mut inv)
        })
    });
}

fn bench_counting_advice(c: &mut Criterion) {
    let advice = CountingAdvice::new();
    c.bench_function("counting_advice", |b| {
        b.iter(|| {
            let mut inv = invocation_for(black_box(42));
            run_through(&advice, &mut inv)
        })
    });
}

fn bench_complex_advice(c: &mut Criterion) {
    let advice = ComplexAdvice;
    c.bench_function("complex_advice", |b| {
        b.iter(|| {
            let mut inv = invocation_for(black_box(42));
            run_through(&advice, &mut inv)
        })
    });
}

fn bench_advice_overhead_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("advice_overhead");
    let noop = NoOpAdvice;
    let counting = CountingAdvice::new();
    let complex = ComplexAdvice;

    group.bench_function("baseline", |b| {
        b.iter(|| baseline_function(black_box(42)))
    });
    group.bench_function("noop", |b| {
        b.iter(|| {
            let mut inv = invocation_for(black_box(42));
            run_through(&noop, &mut inv)
        })
    });
    group.bench_function("counting", |b| {
        b.iter(|| {
            let mut inv = invocation_for(black_box(42));
            run_through(&counting, &mut inv)
        })
    });
    group.bench_function("complex", |b| {
        b.iter(|| {
            let mut inv = invocation_for(black_box(42));
            run_through(&complex, &mut inv)
        })
    });

    group.finish();
}

fn bench_invocation_creation(c: &mut Criterion) {
    c.bench_function("invocation_creation", |b| {
        b.iter(|| black_box(invocation_for(42)))
    });
}

fn bench_chain_of_three(c: &mut Criterion) {
    use aop_core::{build_chain, AdviceSource};

    let sources = vec![
        AdviceSource::Single {
            advice: Arc::new(CountingAdvice::new()) as Arc<dyn Advice>,
            order: 0,
        },
        AdviceSource::Single {
            advice: Arc::new(NoOpAdvice),
            order: 1,
        },
        AdviceSource::Single {
            advice: Arc::new(ComplexAdvice),
            order: 2,
        },
    ];
    let head = build_chain(sources).unwrap().unwrap();

    c.bench_function("chain_of_three_advices", |b| {
        b.iter(|| {
            let mut inv = invocation_for(black_box(42));
            head.apply(&mut inv).unwrap();
            black_box(inv.take_return_value())
        })
    });
}

criterion_group!(
    benches,
    bench_baseline,
    bench_noop_advice,
    bench_counting_advice,
    bench_complex_advice,
    bench_advice_overhead_comparison,
    bench_invocation_creation,
    bench_chain_of_three,
);

criterion_main!(benches);
