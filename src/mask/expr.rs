//! Boolean expression evaluation for expression-driven masks.
//!
//! Each epoch contributes a transient variable environment ([`Bindings`]);
//! an [`ExpressionEvaluator`] compiles the expression once and evaluates it
//! against every environment.  [`RhaiEvaluator`] is the default backend.
use std::collections::BTreeMap;

use rhai::{Dynamic, Engine, Scope};

use super::MatchResult;
use crate::error::{Result, TimelineError};

/// One bound variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Variable name → value, for one epoch.
pub type Bindings = BTreeMap<String, Binding>;

/// Generic expression backend.
pub trait ExpressionEvaluator {
    /// Evaluate `expr` once per environment.
    ///
    /// A compile (parse) error is a configuration error and fails the whole
    /// call.  Runtime errors and non-boolean results for an individual
    /// environment yield [`MatchResult::Invalid`].
    fn evaluate(&self, expr: &str, envs: &[Bindings]) -> Result<Vec<MatchResult>>;
}

/// Rhai-backed evaluator with conservative resource limits.
pub struct RhaiEvaluator {
    engine: Engine,
}

impl std::fmt::Debug for RhaiEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiEvaluator").finish_non_exhaustive()
    }
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(100_000);
        engine.set_max_string_size(100_000);
        Self { engine }
    }
}

impl ExpressionEvaluator for RhaiEvaluator {
    fn evaluate(&self, expr: &str, envs: &[Bindings]) -> Result<Vec<MatchResult>> {
        let ast = self
            .engine
            .compile_expression(expr)
            .map_err(|e| TimelineError::Expression(format!("{expr}: {e}")))?;

        let mut out = Vec::with_capacity(envs.len());
        for env in envs {
            let mut scope = Scope::new();
            for (name, value) in env {
                let v = match value {
                    Binding::Bool(b) => Dynamic::from(*b),
                    Binding::Int(i) => Dynamic::from(*i),
                    Binding::Float(x) => Dynamic::from(*x),
                    Binding::Text(s) => Dynamic::from(s.clone()),
                };
                scope.push_dynamic(name.as_str(), v);
            }
            let r = match self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast) {
                Ok(v) => match v.as_bool() {
                    Ok(true) => MatchResult::Match,
                    Ok(false) => MatchResult::NoMatch,
                    Err(_) => MatchResult::Invalid,
                },
                Err(_) => MatchResult::Invalid,
            };
            out.push(r);
        }
        Ok(out)
    }
}

/// Turn an annotation class name into a legal variable identifier.
///
/// Non-alphanumeric characters become `_`; a leading digit gets a `_` prefix.
pub fn identifier(name: &str) -> String {
    let mut s: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() || s.starts_with(|c: char| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, Binding)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn boolean_results() {
        let ev = RhaiEvaluator::new();
        let envs = vec![
            env(&[("N2", Binding::Bool(true)), ("n_arousal", Binding::Int(0))]),
            env(&[("N2", Binding::Bool(true)), ("n_arousal", Binding::Int(2))]),
            env(&[("N2", Binding::Bool(false)), ("n_arousal", Binding::Int(0))]),
        ];
        let r = ev.evaluate("N2 && n_arousal == 0", &envs).unwrap();
        assert_eq!(r, vec![MatchResult::Match, MatchResult::NoMatch, MatchResult::NoMatch]);
    }

    #[test]
    fn non_boolean_and_missing_vars_are_invalid() {
        let ev = RhaiEvaluator::new();
        let envs = vec![env(&[("x", Binding::Int(3))]), env(&[])];
        assert_eq!(ev.evaluate("x + 1", &envs).unwrap()[0], MatchResult::Invalid);
        assert_eq!(ev.evaluate("x > 1", &envs).unwrap(), vec![MatchResult::Match, MatchResult::Invalid]);
    }

    #[test]
    fn parse_error_is_fatal() {
        let ev = RhaiEvaluator::new();
        assert!(matches!(ev.evaluate("x &&", &[]), Err(TimelineError::Expression(_))));
    }

    #[test]
    fn identifiers() {
        assert_eq!(identifier("Sleep stage N2"), "Sleep_stage_N2");
        assert_eq!(identifier("3d"), "_3d");
        assert_eq!(identifier("arousal:resp"), "arousal_resp");
    }
}
