//! The Failure Sink: where safety obligations land.
//!
//! `FailureSink` is a trait the core depends on but does not own — a real model checker backs it
//! with its own verification-condition builder. The two check-suppression flags are consulted
//! right at the point of emission, so a caller can turn off pointer or bounds checking entirely
//! without the rest of the resolver needing to know.

use crate::config::CheckConfig;
use crate::expr::Expr;

/// One emitted safety obligation: a `(category, message)` pair from a closed enumeration, plus
/// the guard under which it must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Obligation {
    pub category: Category,
    pub message: &'static str,
    /// The conjunction of the path guard in effect at the dereference site and the bad predicate
    /// itself (e.g. `path_guard && pointer == NULL`). A solver discharges the obligation by
    /// proving this expression unsatisfiable; the core never negates it itself.
    pub condition: Expr,
}

/// The closed category enumeration this resolver's obligations are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    PointerDereference,
    ArrayBounds,
    PointerAlignment,
    CodeSeparation,
    MemoryModel,
}

impl Category {
    fn is_bounds(self) -> bool {
        matches!(self, Category::ArrayBounds)
    }
}

/// Collaborator obligations are emitted to. A real model checker backs this with its own
/// verification-condition builder; `ObligationLog` below is the in-crate, `Vec`-backed
/// implementation used by tests and the demo binary.
pub trait FailureSink {
    fn emit(&mut self, category: Category, message: &'static str, condition: Expr);
}

/// `Vec`-backed `FailureSink`, applying the two check-suppression flags from `CheckConfig` at the
/// point of emission (mirroring the original consulting `options` right inside
/// `dereference_failure`, rather than filtering afterwards).
#[derive(Debug, Default)]
pub struct ObligationLog {
    checks: CheckConfig,
    obligations: Vec<Obligation>,
}

impl ObligationLog {
    pub fn new(checks: CheckConfig) -> ObligationLog {
        ObligationLog { checks, obligations: Vec::new() }
    }

    pub fn obligations(&self) -> &[Obligation] {
        &self.obligations
    }

    pub fn into_obligations(self) -> Vec<Obligation> {
        self.obligations
    }
}

impl FailureSink for ObligationLog {
    fn emit(&mut self, category: Category, message: &'static str, condition: Expr) {
        if self.checks.no_pointer_check {
            return;
        }
        if self.checks.no_bounds_check && category.is_bounds() {
            return;
        }
        tracing::debug!(?category, message, "emitting safety obligation");
        self.obligations.push(Obligation { category, message, condition });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn no_pointer_check_drops_everything() {
        let mut log = ObligationLog::new(CheckConfig { no_pointer_check: true, no_bounds_check: false });
        log.emit(Category::PointerDereference, "NULL pointer", Expr::bool_lit(true));
        assert!(log.obligations().is_empty());
    }

    #[test]
    fn no_bounds_check_drops_only_bounds() {
        let mut log = ObligationLog::new(CheckConfig { no_pointer_check: false, no_bounds_check: true });
        log.emit(Category::ArrayBounds, "array bounds violated", Expr::bool_lit(true));
        log.emit(Category::PointerDereference, "NULL pointer", Expr::bool_lit(true));
        assert_eq!(log.obligations().len(), 1);
        assert_eq!(log.obligations()[0].category, Category::PointerDereference);
    }

    #[test]
    fn default_config_keeps_everything() {
        let mut log = ObligationLog::new(CheckConfig::default());
        log.emit(Category::MemoryModel, "Object accessed with illegal offset", Expr::symbol(Type::Bool, "g"));
        assert_eq!(log.obligations().len(), 1);
    }
}
