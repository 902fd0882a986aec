//! Scenario 4: type-list with provider.
//!
//! A method annotated with `types = [LoggingAdvice, ValidationAdvice]`
//! resolves its advice instances through the process-wide instance
//! provider at first dispatch. Before a provider is installed, the first
//! call fails with `ConfigurationError`. After installing one, a call
//! produces exactly one Logging enter/exit pair and runs validation.

use aop_core::{install_instance_provider, reset_instance_provider, Advice, AspectError, InstanceProvider};
use aop_macros::aspectize;
use aop_std::logging::LoggingAdvice;
use aop_std::validation::{RangeRule, ValidationAdvice};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::sync::{Arc, Mutex};

static LOG_SINK: Lazy<Arc<Mutex<Vec<String>>>> = Lazy::new(|| Arc::new(Mutex::new(Vec::new())));

struct Provider {
    logging: Arc<LoggingAdvice>,
    validation: Arc<ValidationAdvice>,
}

impl InstanceProvider for Provider {
    fn resolve(&self, advice_type: TypeId) -> Option<Arc<dyn Advice>> {
        if advice_type == TypeId::of::<LoggingAdvice>() {
            Some(self.logging.clone() as Arc<dyn Advice>)
        } else if advice_type == TypeId::of::<ValidationAdvice>() {
            Some(self.validation.clone() as Arc<dyn Advice>)
        } else {
            None
        }
    }
}

struct Service;

#[aspectize]
impl Service {
    #[pointcut(types = [LoggingAdvice, ValidationAdvice])]
    fn typed(&self, y: f64) -> Result<f64, AspectError> {
        Ok(y * 2.0)
    }
}

fn main() {
    reset_instance_provider();

    println!("=== Scenario 4: type-list with provider ===\n");

    let svc = Service;

    println!("1. dispatching before a provider is installed:");
    match svc.typed(3.0) {
        Ok(v) => panic!("expected ConfigurationError, got Ok({v})"),
        Err(err) => {
            println!("   failed as expected: {err}");
            assert!(matches!(err, AspectError::ConfigurationError { .. }));
        }
    }

    println!("\n2. installing a provider and dispatching again:");
    install_instance_provider(Arc::new(Provider {
        logging: Arc::new(LoggingAdvice::new().with_sink(LOG_SINK.clone())),
        validation: Arc::new(ValidationAdvice::new().add_rule(Box::new(RangeRule::new(
            "y",
            1.0,
            f64::MAX,
            |inv| inv.arguments()[0].downcast_ref::<f64>().copied(),
        )))),
    }));

    let value = svc.typed(3.0).expect("provider installed, dispatch should succeed");
    println!("   typed(3.0) = {value}");
    assert_eq!(value, 6.0);

    let entries = LOG_SINK.lock().unwrap().clone();
    println!("   log entries: {entries:?}");
    assert_eq!(
        entries,
        vec!["Entering typed".to_string(), "Exiting typed".to_string()]
    );

    reset_instance_provider();
    println!("\nPASS");
}
