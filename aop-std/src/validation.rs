//! Pre-condition checking advice: runs before the guarded call and records
//! whether validation passed, with a timestamp, for later advice to read.

use aop_core::{Advice, AspectError, Cursor, Invocation};
use std::sync::Arc;
use std::time::SystemTime;

/// A single precondition check over an invocation's boxed arguments.
///
/// Implement this to validate a method's inputs before it (and the rest of
/// the chain below this advice) runs. Returning `Err` aborts the call:
/// `cursor.proceed` is never reached and no later advice sees the call.
pub trait ValidationRule: Send + Sync {
    /// Check `invocation`'s arguments, returning a failure message on
    /// rejection.
    fn validate(&self, invocation: &Invocation<'_>) -> Result<(), String>;

    /// A short description used in generated error messages.
    fn description(&self) -> &str {
        "validation rule"
    }
}

/// Runs a list of [`ValidationRule`]s before the guarded call, recording
/// `"validated" = true` and a `"validated_at"` timestamp into the
/// invocation's data map on success, so a later advice (or a test) can
/// observe that validation ran and when.
pub struct ValidationAdvice {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationAdvice {
    /// Create a validation advice with no rules; always passes.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. Rules run in the order they were added; the first
    /// failure is reported.
    pub fn add_rule(mut self, rule: Box<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    fn check(&self, invocation: &Invocation<'_>) -> Result<(), AspectError> {
        for rule in &self.rules {
            if let Err(message) = rule.validate(invocation) {
                return Err(AspectError::from(format!(
                    "validation failed for {}: {message}",
                    invocation.method().qualified_name()
                )));
            }
        }
        Ok(())
    }
}

impl Default for ValidationAdvice {
    fn default() -> Self {
        Self::new()
    }
}

impl Advice for ValidationAdvice {
    fn apply(&self, invocation: &mut Invocation<'_>, cursor: &Cursor) -> Result<(), AspectError> {
        self.check(invocation)?;
        invocation
            .data_mut()
            .insert("validated".to_string(), Box::new(true));
        invocation
            .data_mut()
            .insert("validated_at".to_string(), Box::new(SystemTime::now()));
        cursor.proceed(invocation)
    }
}

/// Rejects a numeric argument outside `[min, max]`.
///
/// `getter` downcasts the argument this rule is responsible for out of the
/// invocation's boxed argument tuple; argument position is the only
/// binding mechanism available once arguments are type-erased.
pub struct RangeRule {
    field_name: String,
    min: f64,
    max: f64,
    getter: Arc<dyn Fn(&Invocation<'_>) -> Option<f64> + Send + Sync>,
}

impl RangeRule {
    /// Create a range check named `field_name`, rejecting values outside
    /// `[min, max]` as extracted by `getter`.
    pub fn new<F>(field_name: &str, min: f64, max: f64, getter: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Option<f64> + Send + Sync + 'static,
    {
        Self {
            field_name: field_name.to_string(),
            min,
            max,
            getter: Arc::new(getter),
        }
    }
}

impl ValidationRule for RangeRule {
    fn validate(&self, invocation: &Invocation<'_>) -> Result<(), String> {
        if let Some(value) = (self.getter)(invocation) {
            if value < self.min || value > self.max {
                return Err(format!(
                    "{} must be between {} and {}, got {value}",
                    self.field_name, self.min, self.max
                ));
            }
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "range check"
    }
}

/// A custom rule built from a closure, for checks that don't fit
/// [`RangeRule`]'s shape.
pub struct CustomRule {
    description: String,
    check: Arc<dyn Fn(&Invocation<'_>) -> Result<(), String> + Send + Sync>,
}

impl CustomRule {
    /// Create a custom rule from a closure over the invocation.
    pub fn new<F>(description: &str, check: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            description: description.to_string(),
            check: Arc::new(check),
        }
    }
}

impl ValidationRule for CustomRule {
    fn validate(&self, invocation: &Invocation<'_>) -> Result<(), String> {
        (self.check)(invocation)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aop_core::{build_chain, AdviceSource, MethodDescriptor};

    fn descriptor() -> MethodDescriptor {
        MethodDescriptor::new("Widget", "chained")
    }

    #[test]
    fn passing_rule_marks_validated_and_proceeds() {
        let advice = ValidationAdvice::new().add_rule(Box::new(RangeRule::new(
            "y",
            1.0,
            f64::MAX,
            |inv| inv.arguments()[0].downcast_ref::<f64>().copied(),
        )));
        let chain = build_chain(vec![AdviceSource::Single {
            advice: Arc::new(advice),
            order: 0,
        }])
        .unwrap()
        .unwrap();

        let mut invocation = Invocation::new(
            descriptor(),
            vec![Box::new(10.0_f64)],
            |_| Ok(Box::new(100.0_f64) as aop_core::BoxedValue),
        );
        chain.apply(&mut invocation).unwrap();

        assert_eq!(
            invocation
                .data()
                .get("validated")
                .and_then(|v| v.downcast_ref::<bool>())
                .copied(),
            Some(true)
        );
        assert!(invocation.data().contains_key("validated_at"));
    }

    #[test]
    fn failing_rule_rejects_before_proceed() {
        let advice = ValidationAdvice::new().add_rule(Box::new(RangeRule::new(
            "y",
            1.0,
            f64::MAX,
            |inv| inv.arguments()[0].downcast_ref::<f64>().copied(),
        )));
        let chain = build_chain(vec![AdviceSource::Single {
            advice: Arc::new(advice),
            order: 0,
        }])
        .unwrap()
        .unwrap();

        let mut invocation = Invocation::new(
            descriptor(),
            vec![Box::new(0.5_f64)],
            |_| panic!("body must not run when validation rejects"),
        );
        let err = chain.apply(&mut invocation).unwrap_err();
        assert!(matches!(err, AspectError::UserError { .. }));
    }
}
