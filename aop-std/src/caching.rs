//! Memoizing advice that short-circuits the rest of the chain on a cache
//! hit: a later advice such as logging or validation never runs for that
//! call.

use aop_core::{Advice, AspectError, Cursor, Invocation};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry<T> {
    value: T,
    inserted_at: Instant,
}

/// Caches a method's return value, keyed by a caller-supplied function of
/// its arguments.
///
/// `T` is the method's return type. Because `Invocation::return_value` is
/// type-erased, `CachingAdvice` must know `T` to downcast and re-box a hit.
/// The generated trampoline's call site already names the concrete type,
/// so `T` is fixed per attachment site, the same way any other advice
/// attached to a specific pointcut is instantiated for that site, just with
/// a type parameter instead of a bare struct. Returning a cheaply-`Clone`-
/// able handle (an `Arc<_>`) makes a cache hit return the *same* object,
/// not merely an equal one.
///
/// On a cache hit, this advice sets the invocation's return value directly
/// and returns `Ok(())` without calling `cursor.proceed`, which means any
/// advice later in the chain never runs for that call. Placing
/// `CachingAdvice` first (the lowest `order`) is what makes the
/// short-circuit observable to advices attached after it.
pub struct CachingAdvice<T> {
    store: Arc<Mutex<HashMap<String, Entry<T>>>>,
    key_fn: Arc<dyn Fn(&Invocation<'_>) -> String + Send + Sync>,
    ttl: Option<Duration>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CachingAdvice<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key_fn: self.key_fn.clone(),
            ttl: self.ttl,
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> CachingAdvice<T> {
    /// Create a caching advice keyed by `key_fn`, applied to the
    /// invocation's boxed arguments before the target body runs.
    pub fn new<F>(key_fn: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            key_fn: Arc::new(key_fn),
            ttl: None,
            _marker: PhantomData,
        }
    }

    /// Expire entries older than `ttl`. Checked at lookup time; there is no
    /// background eviction.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Number of live entries (expired entries are not purged until the
    /// next lookup touches them).
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard every cached entry.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    fn lookup(&self, key: &str) -> Option<T> {
        let mut store = self.store.lock();
        let entry = store.get(key)?;
        if let Some(ttl) = self.ttl {
            if entry.inserted_at.elapsed() > ttl {
                store.remove(key);
                return None;
            }
        }
        Some(store.get(key).expect("checked above").value.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> Advice for CachingAdvice<T> {
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        let key = (self.key_fn)(invocation);

        if let Some(cached) = self.lookup(&key) {
            invocation.set_return_value(Box::new(cached));
            return Ok(());
        }

        cursor.proceed(invocation)?;

        if let Some(value) = invocation.return_value().and_then(|v| v.downcast_ref::<T>()) {
            self.store.lock().insert(
                key,
                Entry {
                    value: value.clone(),
                    inserted_at: Instant::now(),
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aop_core::{build_chain, AdviceSource, MethodDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Contract {
        x: f64,
    }

    #[test]
    fn second_call_with_same_key_short_circuits_the_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let caching = CachingAdvice::<Arc<Contract>>::new(|_inv| "10.0:10.0".to_string());

        let chain = build_chain(vec![AdviceSource::Single {
            advice: Arc::new(caching),
            order: 0,
        }])
        .unwrap()
        .unwrap();

        let descriptor = MethodDescriptor::new("Widget", "chained");
        let run = |calls: Arc<AtomicUsize>| {
            let calls = calls.clone();
            Invocation::new(descriptor, Vec::new(), move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Arc::new(Contract { x: 100.0 })) as aop_core::BoxedValue)
            })
        };

        let mut first = run(calls.clone());
        chain.apply(&mut first).unwrap();
        let first_value = first
            .return_value()
            .unwrap()
            .downcast_ref::<Arc<Contract>>()
            .unwrap()
            .clone();

        let mut second = run(calls.clone());
        chain.apply(&mut second).unwrap();
        let second_value = second
            .return_value()
            .unwrap()
            .downcast_ref::<Arc<Contract>>()
            .unwrap()
            .clone();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first_value, &second_value));
    }

    #[test]
    fn ttl_expiry_forces_a_recompute() {
        let caching = CachingAdvice::<i32>::new(|_| "k".to_string()).with_ttl(Duration::from_millis(1));
        let chain = build_chain(vec![AdviceSource::Single {
            advice: Arc::new(caching),
            order: 0,
        }])
        .unwrap()
        .unwrap();
        let descriptor = MethodDescriptor::new("Widget", "ttl");

        let mut first = Invocation::new(descriptor, Vec::new(), |_| Ok(Box::new(1_i32) as aop_core::BoxedValue));
        chain.apply(&mut first).unwrap();

        std::thread::sleep(Duration::from_millis(5));

        let mut second = Invocation::new(descriptor, Vec::new(), |_| Ok(Box::new(2_i32) as aop_core::BoxedValue));
        chain.apply(&mut second).unwrap();

        assert_eq!(
            *second.return_value().unwrap().downcast_ref::<i32>().unwrap(),
            2
        );
    }
}
