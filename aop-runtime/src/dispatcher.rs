//! The Dispatcher: given a method descriptor and an invocation, locates (or
//! builds) the method's advice chain and either runs the chain's head or
//! calls the invocation's own `proceed` directly if the method carries no
//! pointcut annotations.

use aop_core::{build_chain, AdviceSource, AspectError, ChainLink, Invocation, MethodDescriptor};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Caches `MethodDescriptor -> Option<ChainLink>` across the process
/// lifetime: memoized after first construction, with no eviction needed.
/// `dashmap`'s per-shard locking gives a key-scoped-mutex insertion
/// discipline without a single map-wide lock serializing dispatch of
/// unrelated methods.
pub struct Dispatcher {
    chains: DashMap<MethodDescriptor, Option<Arc<ChainLink>>>,
}

impl Dispatcher {
    /// An empty dispatcher with no memoized chains.
    pub fn new() -> Self {
        Self {
            chains: DashMap::new(),
        }
    }

    /// Look up, or build on first call, the advice chain for `descriptor`.
    ///
    /// `build_sources` is evaluated at most once per descriptor in the
    /// uncontended case. Under a race between two first dispatches of the
    /// same method, both may evaluate `build_sources`, but only one
    /// resulting chain is published to the cache; every caller, including
    /// the one whose build was discarded, observes the same chain
    /// afterwards.
    pub fn method_chain(
        &self,
        descriptor: MethodDescriptor,
        build_sources: impl FnOnce() -> Vec<AdviceSource>,
    ) -> Result<Option<Arc<ChainLink>>, AspectError> {
        if let Some(cached) = self.chains.get(&descriptor) {
            return Ok(cached.clone());
        }
        let chain = build_chain(build_sources())?;
        let entry = self.chains.entry(descriptor).or_insert(chain);
        Ok(entry.clone())
    }

    /// Run `invocation` through the chain for its method, or call
    /// `invocation.proceed()` directly if the method has no pointcut
    /// annotations (an empty chain); the two are observationally
    /// identical.
    pub fn dispatch(
        &self,
        invocation: &mut Invocation<'_>,
        build_sources: impl FnOnce() -> Vec<AdviceSource>,
    ) -> Result<(), AspectError> {
        match self.method_chain(invocation.method(), build_sources)? {
            Some(chain) => chain.apply(invocation),
            None => invocation.proceed(),
        }
    }

    /// Number of method descriptors with a memoized chain. For tests and
    /// diagnostics only.
    pub fn cached_chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Discard every memoized chain. Production dispatch never needs this,
    /// since the cache has no eviction; it exists for test isolation
    /// between cases that reuse the same `MethodDescriptor` names.
    pub fn clear(&self) {
        self.chains.clear();
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide dispatcher shared by every `#[aspectize]`-woven trampoline
/// that does not carry its own `Dispatcher` handle, the common case, since
/// advice chains are keyed by `MethodDescriptor` rather than by instance.
pub static GLOBAL_DISPATCHER: Lazy<Dispatcher> = Lazy::new(Dispatcher::new);

/// Borrow the global dispatcher.
pub fn global_dispatcher() -> &'static Dispatcher {
    &GLOBAL_DISPATCHER
}

#[cfg(test)]
mod tests {
    use super::*;
    use aop_core::{Advice, Cursor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingAdvice {
        calls: Arc<AtomicUsize>,
    }

    impl Advice for CountingAdvice {
        fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            cursor.proceed(invocation)
        }
    }

    fn descriptor(name: &'static str) -> MethodDescriptor {
        MethodDescriptor::new("Widget", name)
    }

    #[test]
    fn dispatch_with_no_sources_is_equivalent_to_proceed() {
        let dispatcher = Dispatcher::new();
        let mut executed = false;
        let mut invocation = Invocation::new(descriptor("plain"), Vec::new(), |_args| {
            Ok(Box::new(()) as aop_core::BoxedValue)
        });

        dispatcher.dispatch(&mut invocation, Vec::new).unwrap();
        let _ = &mut executed;
        assert!(invocation.return_value().is_some());
    }

    #[test]
    fn method_chain_is_memoized_after_first_build() {
        let dispatcher = Dispatcher::new();
        let build_calls = Arc::new(AtomicUsize::new(0));

        let sources_for = |build_calls: Arc<AtomicUsize>| {
            move || {
                build_calls.fetch_add(1, Ordering::SeqCst);
                vec![AdviceSource::Single {
                    advice: Arc::new(CountingAdvice {
                        calls: Arc::new(AtomicUsize::new(0)),
                    }),
                    order: 0,
                }]
            }
        };

        let d = descriptor("memoized");
        dispatcher
            .method_chain(d, sources_for(build_calls.clone()))
            .unwrap();
        dispatcher
            .method_chain(d, sources_for(build_calls.clone()))
            .unwrap();
        dispatcher
            .method_chain(d, sources_for(build_calls.clone()))
            .unwrap();

        assert_eq!(build_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.cached_chain_count(), 1);
    }

    #[test]
    fn concurrent_first_dispatch_observes_one_published_chain() {
        let dispatcher = Arc::new(Dispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = descriptor("racy");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                let log = log.clone();
                std::thread::spawn(move || {
                    let chain = dispatcher
                        .method_chain(d, move || {
                            vec![AdviceSource::Single {
                                advice: Arc::new(CountingAdvice {
                                    calls: Arc::new(AtomicUsize::new(0)),
                                }),
                                order: i,
                            }]
                        })
                        .unwrap()
                        .unwrap();
                    log.lock().unwrap().push(Arc::as_ptr(&chain) as usize);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let entries = log.lock().unwrap();
        assert!(entries.iter().all(|ptr| *ptr == entries[0]));
        assert_eq!(dispatcher.cached_chain_count(), 1);
    }

    #[test]
    fn configuration_error_from_chain_build_is_not_cached() {
        let dispatcher = Dispatcher::new();
        let d = descriptor("broken");

        let err = dispatcher
            .method_chain(d, || {
                vec![
                    AdviceSource::Single {
                        advice: Arc::new(CountingAdvice {
                            calls: Arc::new(AtomicUsize::new(0)),
                        }),
                        order: 0,
                    },
                    AdviceSource::TypeList {
                        entries: vec![],
                        order: 1,
                    },
                ]
            })
            .unwrap_err();

        assert!(matches!(err, AspectError::ConfigurationError { .. }));
        assert_eq!(dispatcher.cached_chain_count(), 0);
    }
}
