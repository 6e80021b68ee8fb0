//! The Guard Stack: a conjunctive path condition with scoped push/pop, used to guard safety
//! obligations emitted from inside short-circuiting `&&`/`||` and `if` branches so they don't
//! fire on paths where the guarded expression is never evaluated.
//!
//! A plain size-stamped stack that conjuncts are pushed onto and later truncated back off, rather
//! than a persistent/immutable structure — the traversal is a straightforward recursion, not a
//! tree of snapshots that need to coexist.

use crate::expr::Expr;

/// A stack of boolean conditions, implicitly conjoined. `as_expr()` folds the whole stack into a
/// single `And` (or `true` when empty).
#[derive(Debug, Default, Clone)]
pub struct GuardStack {
    conditions: Vec<Expr>,
}

/// An opaque mark returned by [`GuardStack::mark`], used to restore the stack to a previous depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

impl GuardStack {
    pub fn new() -> GuardStack {
        GuardStack::default()
    }

    pub fn mark(&self) -> Mark {
        Mark(self.conditions.len())
    }

    /// Truncate back to a previously taken `Mark`. Panics if `mark` refers to a depth deeper than
    /// the stack's current size — that would mean a caller restored to a point later than where
    /// it started, a programming error in the walker, not a runtime condition.
    pub fn restore(&mut self, mark: Mark) {
        assert!(mark.0 <= self.conditions.len(), "guard restore mark past current depth");
        self.conditions.truncate(mark.0);
    }

    /// Push `cond` itself onto the stack (the "didn't short-circuit" guard for `&&`'s later
    /// operands, or the taken-branch guard for `if`'s true arm).
    pub fn push(&mut self, cond: Expr) {
        self.conditions.push(cond);
    }

    /// Push `not(cond)` onto the stack (the guard for `||`'s later operands, or `if`'s false arm).
    pub fn push_negated(&mut self, cond: Expr) {
        self.conditions.push(Expr::not(cond));
    }

    pub fn depth(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Fold the stack into a single boolean expression, `And`ing every pushed condition. An empty
    /// stack folds to `true` (no path restriction in effect).
    pub fn as_expr(&self) -> Expr {
        match self.conditions.len() {
            0 => Expr::bool_lit(true),
            1 => self.conditions[0].clone(),
            _ => Expr::and(self.conditions.clone()),
        }
    }

    /// Guard an obligation expression `e` by the current stack: `guard_1 && guard_2 && ... => e`,
    /// expressed in disjunctive form as `!guard || e` so the final assertion is a single
    /// top-level expression rather than an implication node.
    pub fn implies(&self, e: Expr) -> Expr {
        if self.is_empty() {
            return e;
        }
        Expr::or(vec![Expr::not(self.as_expr()), e])
    }
}
