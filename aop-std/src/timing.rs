//! Execution-time measurement advice with per-method statistics.

use aop_core::{Advice, AspectError, Cursor, Invocation};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics accumulated for a single method.
#[derive(Debug, Clone)]
pub struct MethodStats {
    /// The method's qualified name.
    pub name: String,
    /// Number of calls observed.
    pub count: u64,
    /// Sum of every observed call duration.
    pub total_duration: Duration,
    /// Shortest observed call duration.
    pub min_duration: Duration,
    /// Longest observed call duration.
    pub max_duration: Duration,
}

impl MethodStats {
    fn new(name: String) -> Self {
        Self {
            name,
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
        }
    }

    fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
    }

    /// Mean call duration, or zero if no calls have been recorded.
    pub fn average_duration(&self) -> Duration {
        if self.count > 0 {
            self.total_duration / self.count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Measures wall-clock time spent in `cursor.proceed` (i.e. in the rest of
/// the chain and the target body), regardless of where in the chain this
/// advice is attached.
///
/// Unlike the logging and validation advices, `TimingAdvice` never inspects
/// or mutates the invocation's arguments or return value; it is a pure
/// side observer and is always safe to add to or remove from a chain
/// without affecting the advertised behavior of the method being timed.
#[derive(Clone)]
pub struct TimingAdvice {
    stats: Arc<Mutex<HashMap<String, MethodStats>>>,
    warn_threshold: Option<Duration>,
}

impl TimingAdvice {
    /// Create a timing advice with no warning threshold.
    pub fn new() -> Self {
        Self {
            stats: Arc::new(Mutex::new(HashMap::new())),
            warn_threshold: None,
        }
    }

    /// Log a warning (via the `log` facade) whenever a call exceeds
    /// `threshold`.
    pub fn with_warn_threshold(mut self, threshold: Duration) -> Self {
        self.warn_threshold = Some(threshold);
        self
    }

    /// Statistics recorded for `method`, if any calls have been observed.
    pub fn stats_for(&self, method: &str) -> Option<MethodStats> {
        self.stats.lock().get(method).cloned()
    }

    /// All recorded statistics.
    pub fn all_stats(&self) -> Vec<MethodStats> {
        self.stats.lock().values().cloned().collect()
    }

    /// Discard every recorded statistic.
    pub fn clear(&self) {
        self.stats.lock().clear();
    }
}

impl Default for TimingAdvice {
    fn default() -> Self {
        Self::new()
    }
}

impl Advice for TimingAdvice {
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        let name = invocation.method().qualified_name();
        let start = Instant::now();
        let result = cursor.proceed(invocation);
        let elapsed = start.elapsed();

        self.stats
            .lock()
            .entry(name.clone())
            .or_insert_with(|| MethodStats::new(name.clone()))
            .record(elapsed);

        if let Some(threshold) = self.warn_threshold {
            if elapsed > threshold {
                log::warn!("{name} took {elapsed:?}, exceeding threshold {threshold:?}");
            }
        }

        result
    }
}
