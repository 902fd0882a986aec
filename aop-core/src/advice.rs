//! The `Advice` trait and Advice Chain construction.

use crate::error::AspectError;
use crate::invocation::Invocation;
use std::any::TypeId;
use std::sync::Arc;

/// A unit of cross-cutting behavior that runs around an intercepted method
/// call.
///
/// Implementations must be `Send + Sync`: advice instances are typically
/// singletons shared across every invocation of every method they are
/// attached to, so they may be invoked concurrently from different
/// threads. Chain links (`next`) are fixed at chain-build time and never
/// mutated afterwards, which is what makes chain traversal itself
/// lock-free.
pub trait Advice: Send + Sync {
    /// Ascending precedence: lower values run first (outermost). Ties are
    /// broken by declaration order. Defaults to `0`.
    fn order(&self) -> i32 {
        0
    }

    /// When set, a failure surfacing from `cursor.proceed()` while this
    /// advice is on the stack is recorded into `Invocation::exception` and
    /// swallowed rather than rethrown. `Invocation::return_value` is left
    /// as whatever it already held. Defaults to `false`.
    fn swallow_exceptions(&self) -> bool {
        false
    }

    /// Run this advice's body.
    ///
    /// An implementation may call `cursor.proceed(invocation)` zero, one,
    /// or more than once; each call re-enters the remainder of the chain
    /// (or the executor, for the tail position) and overwrites
    /// `invocation.return_value()`. An advice short-circuits by calling
    /// `invocation.set_return_value(..)` directly and returning without
    /// proceeding.
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError>;
}

/// Passed to `Advice::apply`, representing "the rest of the chain from
/// here". Exposes the `swallow_exceptions` guard belonging to the advice
/// currently executing, per the error handling design: the guard is a
/// property of the advice that calls `proceed`, not of whatever it calls
/// into.
pub struct Cursor {
    next: Option<Arc<ChainLink>>,
    swallow_exceptions: bool,
}

impl Cursor {
    /// Build a cursor with no further links, i.e. `proceed` goes straight to
    /// the executor. Useful for running a single advice in isolation
    /// (tests, benchmarks) without building a full chain.
    pub fn terminal() -> Self {
        Self {
            next: None,
            swallow_exceptions: false,
        }
    }

    /// Proceed to the next advice on the chain, or to the executor if this
    /// is the last advice. Wraps the call in an exception guard: on
    /// failure, the error is recorded into `invocation.exception` and
    /// rethrown unless `swallow_exceptions` is set on the advice that owns
    /// this cursor.
    pub fn proceed(&self, invocation: &mut Invocation<'_>) -> Result<(), AspectError> {
        let result = match &self.next {
            Some(link) => link.apply(invocation),
            None => invocation.proceed(),
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                invocation.record_swallowed(err.clone());
                if self.swallow_exceptions {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// One link in a flattened, order-stable advice chain.
pub struct ChainLink {
    advice: Arc<dyn Advice>,
    next: Option<Arc<ChainLink>>,
}

impl ChainLink {
    /// Run this link's advice, handing it a cursor scoped to its own
    /// `swallow_exceptions` setting and pointing at the next link.
    pub fn apply(&self, invocation: &mut Invocation<'_>) -> Result<(), AspectError> {
        let cursor = Cursor {
            next: self.next.clone(),
            swallow_exceptions: self.advice.swallow_exceptions(),
        };
        self.advice.apply(invocation, &cursor)
    }
}

/// Overrides an advice's `swallow_exceptions` bit at the attachment site,
/// independent of the wrapped advice's own default.
///
/// `swallow_exceptions` is a parameter of the advice attachment site itself
/// (attach one advice, with an optional `order` and `swallow_exceptions`),
/// not only a property of the advice type: the same advice instance might
/// be swallowed at one attachment point and rethrown at another.
/// `#[pointcut(advice = .., swallow_exceptions = ..)]` wraps the advice
/// expression in this type to carry that per-site bit.
pub struct WithSwallow<A> {
    inner: A,
    swallow: bool,
}

impl<A> WithSwallow<A> {
    /// Wrap `inner`, overriding its `swallow_exceptions()` with `swallow`.
    pub fn new(inner: A, swallow: bool) -> Self {
        Self { inner, swallow }
    }
}

impl<A: Advice> Advice for WithSwallow<A> {
    fn order(&self) -> i32 {
        self.inner.order()
    }

    fn swallow_exceptions(&self) -> bool {
        self.swallow
    }

    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        self.inner.apply(invocation, cursor)
    }
}

/// Resolves advice-type descriptors to advice instances for the type-list
/// annotation form. The typical provider is a dependency-injection
/// container; the embedder installs one process-wide with
/// [`install_instance_provider`] before any `#[pointcut(types(...))]`
/// method is first dispatched.
pub trait InstanceProvider: Send + Sync {
    /// Resolve a single advice type to an instance, or `None` if this
    /// provider has nothing registered for that type.
    fn resolve(&self, advice_type: TypeId) -> Option<Arc<dyn Advice>>;
}

static INSTANCE_PROVIDER: once_cell::sync::Lazy<std::sync::RwLock<Option<Arc<dyn InstanceProvider>>>> =
    once_cell::sync::Lazy::new(|| std::sync::RwLock::new(None));

/// Install the process-wide instance provider. Must be called before any
/// method using the type-list annotation form is first dispatched;
/// dispatching such a method beforehand fails with `ConfigurationError`.
///
/// Overwrites any previously installed provider rather than failing, so
/// tests may call this repeatedly after [`reset_instance_provider`].
pub fn install_instance_provider(provider: Arc<dyn InstanceProvider>) {
    *INSTANCE_PROVIDER.write().unwrap() = Some(provider);
}

/// Explicit teardown, primarily for test isolation: subsequent type-list
/// dispatch fails with `ConfigurationError` until a provider is installed
/// again.
pub fn reset_instance_provider() {
    *INSTANCE_PROVIDER.write().unwrap() = None;
}

fn installed_provider() -> Option<Arc<dyn InstanceProvider>> {
    INSTANCE_PROVIDER.read().unwrap().clone()
}

/// An entry in a type-list annotation: either a single advice type to be
/// resolved through the instance provider, or an opaque bundle that itself
/// resolves, through the provider, into a nested list of entries.
pub enum TypeEntry {
    /// A single advice type, identified by `TypeId`, with the display name
    /// kept around for diagnostics.
    Type(TypeId, &'static str),
    /// A `TypeBundle`: opaque grouping resolved through the provider.
    Bundle(Vec<TypeEntry>),
}

/// One source contributing to a method's advice chain, before flattening.
///
/// Mirrors the annotation surface vocabulary: `SingleAdvice` (`Single`),
/// `AdviceBundle` (`Bundle`), and the type-list form (`TypeList`), which is
/// mutually exclusive with the first two on a given method.
pub enum AdviceSource {
    /// A directly-instantiated advice, as `SingleAdvice` produces.
    Single {
        /// The advice instance.
        advice: Arc<dyn Advice>,
        /// Declaration-site order. Set by `#[pointcut(order = ..)]`,
        /// defaulting to `0` when the attachment site does not specify one.
        /// Sorting uses this field directly; an advice's own `order()`
        /// trait method is not consulted here (it only matters when the
        /// advice is used without a site override at all, e.g. directly
        /// through `ChainLink`/`Cursor` in a test).
        order: i32,
    },
    /// An `AdviceBundle`: flattened into its children at chain-build time.
    /// `apply` is never called directly on a bundle.
    Bundle {
        /// The bundle's children, flattened depth-first in place.
        sources: Vec<AdviceSource>,
        /// Declaration-site order of the bundle itself.
        order: i32,
    },
    /// A `TypeList`: advice types resolved through the instance provider
    /// at first dispatch.
    TypeList {
        /// The type entries to resolve, in declaration order.
        entries: Vec<TypeEntry>,
        /// Declaration-site order of the type-list annotation itself.
        order: i32,
    },
}

impl AdviceSource {
    fn order(&self) -> i32 {
        match self {
            Self::Single { order, .. } => *order,
            Self::Bundle { order, .. } => *order,
            Self::TypeList { order, .. } => *order,
        }
    }
}

/// Build the flattened, order-stable advice chain for one method from its
/// declared sources, returning the head link (or `None` for an
/// unintercepted method).
///
/// Fails with `ConfigurationError` if `sources` mixes a `TypeList` entry
/// with a `Single`/`Bundle` entry (the direct and type-list annotation
/// forms are mutually exclusive on a single method), or if a `TypeList`
/// entry cannot be resolved because no instance provider has been
/// installed.
pub fn build_chain(sources: Vec<AdviceSource>) -> Result<Option<Arc<ChainLink>>, AspectError> {
    let has_type_list = sources
        .iter()
        .any(|s| matches!(s, AdviceSource::TypeList { .. }));
    let has_direct = sources
        .iter()
        .any(|s| matches!(s, AdviceSource::Single { .. } | AdviceSource::Bundle { .. }));

    if has_type_list && has_direct {
        return Err(AspectError::configuration(
            "a method may not combine the direct advice form with the type-list form",
        ));
    }

    let mut indexed: Vec<(usize, i32, AdviceSource)> = sources
        .into_iter()
        .enumerate()
        .map(|(i, s)| (i, s.order(), s))
        .collect();
    indexed.sort_by_key(|(i, order, _)| (*order, *i));

    let mut flattened = Vec::new();
    for (_, _, source) in indexed {
        flatten_into(source, &mut flattened)?;
    }

    if flattened.is_empty() {
        return Ok(None);
    }

    let mut head: Option<Arc<ChainLink>> = None;
    for advice in flattened.into_iter().rev() {
        head = Some(Arc::new(ChainLink { advice, next: head }));
    }
    Ok(head)
}

fn flatten_into(source: AdviceSource, out: &mut Vec<Arc<dyn Advice>>) -> Result<(), AspectError> {
    match source {
        AdviceSource::Single { advice, .. } => out.push(advice),
        AdviceSource::Bundle { sources, .. } => {
            let mut indexed: Vec<(usize, i32, AdviceSource)> = sources
                .into_iter()
                .enumerate()
                .map(|(i, s)| (i, s.order(), s))
                .collect();
            indexed.sort_by_key(|(i, order, _)| (*order, *i));
            for (_, _, inner) in indexed {
                flatten_into(inner, out)?;
            }
        }
        AdviceSource::TypeList { entries, .. } => {
            let provider = installed_provider().ok_or_else(|| {
                AspectError::configuration(
                    "a type-list advice annotation was used but no instance provider has been installed",
                )
            })?;
            for entry in entries {
                resolve_type_entry(entry, provider.as_ref(), out)?;
            }
        }
    }
    Ok(())
}

fn resolve_type_entry(
    entry: TypeEntry,
    provider: &dyn InstanceProvider,
    out: &mut Vec<Arc<dyn Advice>>,
) -> Result<(), AspectError> {
    match entry {
        TypeEntry::Type(type_id, name) => {
            let advice = provider.resolve(type_id).ok_or_else(|| {
                AspectError::configuration(format!(
                    "instance provider has no registration for advice type `{name}`"
                ))
            })?;
            out.push(advice);
        }
        TypeEntry::Bundle(children) => {
            for child in children {
                resolve_type_entry(child, provider, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

    struct RecordingAdvice {
        name: &'static str,
        order: i32,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Advice for RecordingAdvice {
        fn order(&self) -> i32 {
            self.order
        }

        fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
            self.log.lock().unwrap().push(format!("enter:{}", self.name));
            let result = cursor.proceed(invocation);
            self.log.lock().unwrap().push(format!("exit:{}", self.name));
            result
        }
    }

    fn executor_counting(counter: Arc<AtomicI32>) -> impl FnMut(&mut Vec<crate::invocation::BoxedValue>) -> Result<crate::invocation::BoxedValue, AspectError> {
        move |_args| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Box::new(n) as crate::invocation::BoxedValue)
        }
    }

    #[test]
    fn chain_runs_in_ascending_order_and_unwinds_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = crate::invocation::MethodDescriptor::new("Widget", "spin");
        let counter = Arc::new(AtomicI32::new(0));
        let mut invocation = Invocation::new(descriptor, Vec::new(), executor_counting(counter));

        let sources = vec![
            AdviceSource::Single {
                advice: Arc::new(RecordingAdvice { name: "validation", order: 2, log: log.clone() }),
                order: 2,
            },
            AdviceSource::Single {
                advice: Arc::new(RecordingAdvice { name: "logging", order: 1, log: log.clone() }),
                order: 1,
            },
        ];

        let head = build_chain(sources).unwrap().unwrap();
        head.apply(&mut invocation).unwrap();

        let entries = log.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec!["enter:logging", "enter:validation", "exit:validation", "exit:logging"]
        );
    }

    #[test]
    fn bundle_flattens_depth_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = crate::invocation::MethodDescriptor::new("Widget", "spin");
        let counter = Arc::new(AtomicI32::new(0));
        let mut invocation = Invocation::new(descriptor, Vec::new(), executor_counting(counter));

        let sources = vec![AdviceSource::Bundle {
            order: 0,
            sources: vec![
                AdviceSource::Single {
                    advice: Arc::new(RecordingAdvice { name: "a", order: 0, log: log.clone() }),
                    order: 0,
                },
                AdviceSource::Single {
                    advice: Arc::new(RecordingAdvice { name: "b", order: 0, log: log.clone() }),
                    order: 1,
                },
            ],
        }];

        let head = build_chain(sources).unwrap().unwrap();
        head.apply(&mut invocation).unwrap();

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, vec!["enter:a", "enter:b", "exit:b", "exit:a"]);
    }

    #[test]
    fn empty_sources_produce_no_chain() {
        assert!(build_chain(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn mixing_direct_and_type_list_is_a_configuration_error() {
        let sources = vec![
            AdviceSource::Single {
                advice: Arc::new(RecordingAdvice {
                    name: "a",
                    order: 0,
                    log: Arc::new(Mutex::new(Vec::new())),
                }),
                order: 0,
            },
            AdviceSource::TypeList {
                entries: vec![],
                order: 1,
            },
        ];

        let err = build_chain(sources).unwrap_err();
        assert!(matches!(err, AspectError::ConfigurationError { .. }));
    }

    #[test]
    fn type_list_without_provider_fails() {
        reset_instance_provider();
        let sources = vec![AdviceSource::TypeList {
            entries: vec![TypeEntry::Type(TypeId::of::<RecordingAdvice>(), "Recording")],
            order: 0,
        }];

        let err = build_chain(sources).unwrap_err();
        assert!(matches!(err, AspectError::ConfigurationError { .. }));
    }

    #[test]
    fn double_proceed_reruns_executor_and_keeps_last_value() {
        let descriptor = crate::invocation::MethodDescriptor::new("Widget", "spin");
        let counter = Arc::new(AtomicI32::new(0));
        let mut invocation = Invocation::new(descriptor, Vec::new(), executor_counting(counter.clone()));

        struct DoubleProceed;
        impl Advice for DoubleProceed {
            fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
                cursor.proceed(invocation)?;
                cursor.proceed(invocation)?;
                Ok(())
            }
        }

        let sources = vec![AdviceSource::Single {
            advice: Arc::new(DoubleProceed),
            order: 0,
        }];
        let head = build_chain(sources).unwrap().unwrap();
        head.apply(&mut invocation).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        let value = *invocation.take_return_value().unwrap().downcast::<i32>().unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn swallow_exceptions_suppresses_rethrow() {
        let descriptor = crate::invocation::MethodDescriptor::new("Widget", "spin");
        let mut invocation = Invocation::new(descriptor, Vec::new(), |_args| {
            Err(AspectError::user(std::io::Error::new(
                std::io::ErrorKind::Other,
                "boom",
            )))
        });

        struct Swallower;
        impl Advice for Swallower {
            fn swallow_exceptions(&self) -> bool {
                true
            }
            fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
                cursor.proceed(invocation)
            }
        }

        let sources = vec![AdviceSource::Single {
            advice: Arc::new(Swallower),
            order: 0,
        }];
        let head = build_chain(sources).unwrap().unwrap();
        let result = head.apply(&mut invocation);
        assert!(result.is_ok());
        assert!(invocation.exception().is_some());
    }

    #[test]
    fn with_swallow_overrides_the_wrapped_advice_at_the_attachment_site() {
        struct NeverSwallows;
        impl Advice for NeverSwallows {
            fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
                cursor.proceed(invocation)
            }
        }

        let mut invocation = Invocation::new(
            crate::invocation::MethodDescriptor::new("Widget", "spin"),
            Vec::new(),
            |_args| {
                Err(AspectError::user(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "boom",
                )))
            },
        );

        let sources = vec![AdviceSource::Single {
            advice: Arc::new(WithSwallow::new(NeverSwallows, true)),
            order: 0,
        }];
        let head = build_chain(sources).unwrap().unwrap();
        assert!(head.apply(&mut invocation).is_ok());
        assert!(invocation.exception().is_some());
    }
}
