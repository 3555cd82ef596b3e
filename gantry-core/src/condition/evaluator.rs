// Guard evaluation against an execution context
// Resolves identifiers to axis values, the runner OS family, and prior step
// outcomes, then folds the typed tree down to a boolean.

use crate::condition::expr::{CompareOp, Guard, Literal};
use crate::condition::ConditionError;
use crate::execution::context::ExecutionContext;
use crate::execution::report::StepOutcome;
use crate::platform::OsFamily;

/// Evaluates parsed guards against a job's execution context.
///
/// Evaluation is pure: the evaluator never mutates the context, so a guard
/// can be re-evaluated at any point without side effects.
pub struct ConditionEvaluator<'a> {
    ctx: &'a ExecutionContext,
}

/// Intermediate value produced while folding a guard.
#[derive(Debug, Clone, PartialEq)]
enum GuardValue {
    Str(String),
    Bool(bool),
    Family(OsFamily),
    Outcome(StepOutcome),
}

/// One side of a comparison. Bare identifiers that do not resolve in the
/// context are kept as words so that `outcome('x') == succeeded` and
/// `os == linux` can interpret them against the other side's type.
#[derive(Debug, Clone, PartialEq)]
enum Side {
    Value(GuardValue),
    Word(String),
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        ConditionEvaluator { ctx }
    }

    /// Evaluate a guard to its boolean result.
    pub fn evaluate(&self, guard: &Guard) -> Result<bool, ConditionError> {
        match self.eval(guard)? {
            Side::Value(GuardValue::Bool(b)) => Ok(b),
            Side::Value(other) => Err(ConditionError::TypeMismatch(format!(
                "guard must evaluate to a boolean, got {:?}",
                other
            ))),
            Side::Word(word) => Err(ConditionError::UnknownIdentifier(word)),
        }
    }

    fn eval(&self, guard: &Guard) -> Result<Side, ConditionError> {
        match guard {
            Guard::Literal(Literal::Str(s)) => Ok(Side::Value(GuardValue::Str(s.clone()))),
            Guard::Literal(Literal::Bool(b)) => Ok(Side::Value(GuardValue::Bool(*b))),
            Guard::Ident(name) => Ok(self.resolve_ident(name)),
            Guard::Outcome(step) => match self.ctx.outcome_of(step) {
                Some(outcome) => Ok(Side::Value(GuardValue::Outcome(outcome))),
                None => Err(ConditionError::UnknownIdentifier(format!(
                    "outcome('{}') references a step that has not run",
                    step
                ))),
            },
            Guard::Not(inner) => {
                let value = self.require_bool(inner)?;
                Ok(Side::Value(GuardValue::Bool(!value)))
            }
            Guard::And(left, right) => {
                // Short-circuit: the right side is only evaluated when needed
                if !self.require_bool(left)? {
                    return Ok(Side::Value(GuardValue::Bool(false)));
                }
                let right = self.require_bool(right)?;
                Ok(Side::Value(GuardValue::Bool(right)))
            }
            Guard::Or(left, right) => {
                if self.require_bool(left)? {
                    return Ok(Side::Value(GuardValue::Bool(true)));
                }
                let right = self.require_bool(right)?;
                Ok(Side::Value(GuardValue::Bool(right)))
            }
            Guard::Compare { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let equal = self.compare(left, right)?;
                let result = match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                };
                Ok(Side::Value(GuardValue::Bool(result)))
            }
        }
    }

    fn require_bool(&self, guard: &Guard) -> Result<bool, ConditionError> {
        match self.eval(guard)? {
            Side::Value(GuardValue::Bool(b)) => Ok(b),
            Side::Value(other) => Err(ConditionError::TypeMismatch(format!(
                "expected a boolean operand, got {:?}",
                other
            ))),
            Side::Word(word) => Err(ConditionError::UnknownIdentifier(word)),
        }
    }

    fn resolve_ident(&self, name: &str) -> Side {
        if name == "os" {
            return Side::Value(GuardValue::Family(self.ctx.os_family));
        }
        if let Some(value) = self.ctx.axes.get(name) {
            return Side::Value(GuardValue::Str(value.to_string()));
        }
        Side::Word(name.to_string())
    }

    fn compare(&self, left: Side, right: Side) -> Result<bool, ConditionError> {
        use GuardValue::*;

        match (left, right) {
            (Side::Value(Outcome(o)), other) | (other, Side::Value(Outcome(o))) => {
                let word = match other {
                    Side::Value(Str(s)) => s,
                    Side::Word(w) => w,
                    Side::Value(v) => {
                        return Err(ConditionError::TypeMismatch(format!(
                            "cannot compare a step outcome with {:?}",
                            v
                        )))
                    }
                };
                let expected = parse_outcome(&word)?;
                Ok(o == expected)
            }
            (Side::Value(Family(f)), other) | (other, Side::Value(Family(f))) => {
                let word = match other {
                    Side::Value(Str(s)) => s,
                    Side::Word(w) => w,
                    Side::Value(v) => {
                        return Err(ConditionError::TypeMismatch(format!(
                            "cannot compare an os family with {:?}",
                            v
                        )))
                    }
                };
                // Accept both bare family names and runner labels
                match OsFamily::parse_name(&word).or_else(|| OsFamily::classify(&word)) {
                    Some(family) => Ok(f == family),
                    None => Err(ConditionError::TypeMismatch(format!(
                        "'{}' is not an os family name",
                        word
                    ))),
                }
            }
            (Side::Value(Str(a)), Side::Value(Str(b))) => Ok(a == b),
            (Side::Value(Bool(a)), Side::Value(Bool(b))) => Ok(a == b),
            (Side::Word(w), _) | (_, Side::Word(w)) => {
                Err(ConditionError::UnknownIdentifier(w))
            }
            (a, b) => Err(ConditionError::TypeMismatch(format!(
                "cannot compare {:?} with {:?}",
                a, b
            ))),
        }
    }
}

fn parse_outcome(word: &str) -> Result<StepOutcome, ConditionError> {
    match word {
        "succeeded" | "success" => Ok(StepOutcome::Succeeded),
        "failed" | "failure" => Ok(StepOutcome::Failed),
        "skipped" => Ok(StepOutcome::Skipped),
        other => Err(ConditionError::TypeMismatch(format!(
            "'{}' is not a step outcome",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::matrix::JobId;
    use crate::execution::report::StepResult;
    use crate::workflow::models::AxisValue;

    use indexmap::IndexMap;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_context(os: OsFamily, axes: &[(&str, &str)]) -> ExecutionContext {
        let mut axis_map = IndexMap::new();
        for (key, value) in axes {
            axis_map.insert(key.to_string(), AxisValue::String(value.to_string()));
        }
        ExecutionContext {
            job_id: JobId::new("test"),
            axes: axis_map,
            os_family: os,
            env: HashMap::new(),
            working_dir: PathBuf::from("."),
            step_results: Vec::new(),
        }
    }

    #[test]
    fn test_axis_equality() {
        let ctx = test_context(OsFamily::Linux, &[("toolchain", "stable")]);
        let evaluator = ConditionEvaluator::new(&ctx);

        let guard = Guard::parse("toolchain == 'stable'").unwrap();
        assert!(evaluator.evaluate(&guard).unwrap());

        let guard = Guard::parse("toolchain == 'nightly'").unwrap();
        assert!(!evaluator.evaluate(&guard).unwrap());
    }

    #[test]
    fn test_os_family_comparison() {
        let ctx = test_context(OsFamily::Linux, &[]);
        let evaluator = ConditionEvaluator::new(&ctx);

        assert!(evaluator
            .evaluate(&Guard::parse("os == 'linux'").unwrap())
            .unwrap());
        assert!(!evaluator
            .evaluate(&Guard::parse("os == 'windows'").unwrap())
            .unwrap());
        assert!(evaluator
            .evaluate(&Guard::parse("os != 'macos'").unwrap())
            .unwrap());
    }

    #[test]
    fn test_os_family_accepts_runner_labels() {
        let ctx = test_context(OsFamily::MacOs, &[]);
        let evaluator = ConditionEvaluator::new(&ctx);

        // Runner label forms resolve to the same family
        assert!(evaluator
            .evaluate(&Guard::parse("os == 'macos-latest'").unwrap())
            .unwrap());
    }

    #[test]
    fn test_os_family_rejects_unknown_name() {
        let ctx = test_context(OsFamily::Linux, &[]);
        let evaluator = ConditionEvaluator::new(&ctx);

        let guard = Guard::parse("os == 'solaris'").unwrap();
        assert!(matches!(
            evaluator.evaluate(&guard),
            Err(ConditionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_outcome_comparison() {
        let mut ctx = test_context(OsFamily::Linux, &[]);
        ctx.record_step(StepResult::succeeded(
            Some("install".to_string()),
            "Install deps".to_string(),
            String::new(),
            String::new(),
            Some(0),
            Duration::from_secs(1),
        ));
        let evaluator = ConditionEvaluator::new(&ctx);

        assert!(evaluator
            .evaluate(&Guard::parse("outcome('install') == succeeded").unwrap())
            .unwrap());
        assert!(evaluator
            .evaluate(&Guard::parse("outcome('install') != failed").unwrap())
            .unwrap());
    }

    #[test]
    fn test_outcome_unknown_step() {
        let ctx = test_context(OsFamily::Linux, &[]);
        let evaluator = ConditionEvaluator::new(&ctx);

        let guard = Guard::parse("outcome('missing') == succeeded").unwrap();
        assert!(matches!(
            evaluator.evaluate(&guard),
            Err(ConditionError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_unknown_identifier() {
        let ctx = test_context(OsFamily::Linux, &[]);
        let evaluator = ConditionEvaluator::new(&ctx);

        let guard = Guard::parse("nonexistent == 'value'").unwrap();
        assert!(matches!(
            evaluator.evaluate(&guard),
            Err(ConditionError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_bare_string_is_not_boolean() {
        let ctx = test_context(OsFamily::Linux, &[("os", "linux")]);
        let evaluator = ConditionEvaluator::new(&ctx);

        let guard = Guard::parse("'linux'").unwrap();
        assert!(matches!(
            evaluator.evaluate(&guard),
            Err(ConditionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_logical_operators() {
        let ctx = test_context(OsFamily::Linux, &[("toolchain", "stable")]);
        let evaluator = ConditionEvaluator::new(&ctx);

        let guard = Guard::parse("os == 'linux' && toolchain == 'stable'").unwrap();
        assert!(evaluator.evaluate(&guard).unwrap());

        let guard = Guard::parse("os == 'windows' || toolchain == 'stable'").unwrap();
        assert!(evaluator.evaluate(&guard).unwrap());

        let guard = Guard::parse("!(os == 'windows')").unwrap();
        assert!(evaluator.evaluate(&guard).unwrap());
    }

    #[test]
    fn test_short_circuit_skips_bad_right_side() {
        let ctx = test_context(OsFamily::Linux, &[]);
        let evaluator = ConditionEvaluator::new(&ctx);

        // Right side would fail with UnknownIdentifier, but the left side
        // already decides the result.
        let guard = Guard::parse("os == 'linux' || bogus == 'x'").unwrap();
        assert!(evaluator.evaluate(&guard).unwrap());

        let guard = Guard::parse("os == 'windows' && bogus == 'x'").unwrap();
        assert!(!evaluator.evaluate(&guard).unwrap());
    }

    #[test]
    fn test_boolean_literals() {
        let ctx = test_context(OsFamily::Linux, &[]);
        let evaluator = ConditionEvaluator::new(&ctx);

        assert!(evaluator.evaluate(&Guard::parse("true").unwrap()).unwrap());
        assert!(!evaluator.evaluate(&Guard::parse("false").unwrap()).unwrap());
        assert!(evaluator
            .evaluate(&Guard::parse("true != false").unwrap())
            .unwrap());
    }
}
