//! Structured logging advice with configurable levels.

use aop_core::{Advice, AspectError, Cursor, Invocation};
use std::sync::{Arc, Mutex};

/// Log level for [`LoggingAdvice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

/// Brackets a method call with an entry and an exit log line.
///
/// Entries are both forwarded to the `log` facade (so a host binary's
/// logger renders them normally) and appended to an in-process `sink`
/// (`entries()`) so tests can assert on exact log content without
/// installing a logger.
///
/// A single target method may carry more than one `LoggingAdvice`;
/// `with_context` distinguishes them by appending a parenthesized suffix to
/// both lines.
#[derive(Clone)]
pub struct LoggingAdvice {
    level: LogLevel,
    context: Option<String>,
    sink: Arc<Mutex<Vec<String>>>,
}

impl LoggingAdvice {
    /// Create a logging advice at `Info` level with no context suffix.
    pub fn new() -> Self {
        Self {
            level: LogLevel::Info,
            context: None,
            sink: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Tag this advice's entry/exit lines with a context suffix, so that
    /// several `LoggingAdvice` instances on the same method stay
    /// distinguishable in the log.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Share a sink across several `LoggingAdvice` instances, so their
    /// entry/exit lines interleave in call order rather than landing in
    /// separate buffers.
    pub fn with_sink(mut self, sink: Arc<Mutex<Vec<String>>>) -> Self {
        self.sink = sink;
        self
    }

    /// A clone of the shared sink, for a caller that wants to observe log
    /// entries without holding a direct reference to this advice.
    pub fn sink(&self) -> Arc<Mutex<Vec<String>>> {
        self.sink.clone()
    }

    /// The entries recorded so far, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.sink.lock().expect("logging advice sink poisoned").clone()
    }

    fn label(&self, method: &str) -> String {
        match &self.context {
            Some(ctx) => format!("{method} ({ctx})"),
            None => method.to_string(),
        }
    }

    fn record(&self, line: String) {
        match self.level {
            LogLevel::Trace => log::trace!("{line}"),
            LogLevel::Debug => log::debug!("{line}"),
            LogLevel::Info => log::info!("{line}"),
            LogLevel::Warn => log::warn!("{line}"),
            LogLevel::Error => log::error!("{line}"),
        }
        self.sink.lock().expect("logging advice sink poisoned").push(line);
    }
}

impl Default for LoggingAdvice {
    fn default() -> Self {
        Self::new()
    }
}

impl Advice for LoggingAdvice {
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        let label = self.label(invocation.method().method_name);
        self.record(format!("Entering {label}"));
        let result = cursor.proceed(invocation);
        self.record(format!("Exiting {label}"));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aop_core::{build_chain, AdviceSource, MethodDescriptor};

    fn descriptor() -> MethodDescriptor {
        MethodDescriptor::new("Widget", "one_advice")
    }

    #[test]
    fn single_advice_brackets_entry_and_exit() {
        let logging = LoggingAdvice::new();
        let chain = build_chain(vec![AdviceSource::Single {
            advice: Arc::new(logging.clone()),
            order: 0,
        }])
        .unwrap()
        .unwrap();

        let mut invocation =
            Invocation::new(descriptor(), Vec::new(), |_| Ok(Box::new(1.0_f64) as aop_core::BoxedValue));
        chain.apply(&mut invocation).unwrap();

        assert_eq!(
            logging.entries(),
            vec!["Entering one_advice".to_string(), "Exiting one_advice".to_string()]
        );
    }

    #[test]
    fn bundle_of_two_logging_advices_interleaves_by_context() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let outer = LoggingAdvice::new().with_sink(sink.clone());
        let inner = LoggingAdvice::new().with_context("2nd").with_sink(sink.clone());

        let chain = build_chain(vec![AdviceSource::Bundle {
            sources: vec![
                AdviceSource::Single {
                    advice: Arc::new(outer),
                    order: 0,
                },
                AdviceSource::Single {
                    advice: Arc::new(inner),
                    order: 1,
                },
            ],
            order: 0,
        }])
        .unwrap()
        .unwrap();

        let mut invocation = Invocation::new(
            MethodDescriptor::new("Widget", "chained"),
            Vec::new(),
            |_| Ok(Box::new(()) as aop_core::BoxedValue),
        );
        chain.apply(&mut invocation).unwrap();

        let entries = sink.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec![
                "Entering chained".to_string(),
                "Entering chained (2nd)".to_string(),
                "Exiting chained (2nd)".to_string(),
                "Exiting chained".to_string(),
            ]
        );
    }
}
